//! Four-sink structured logging (SPEC_FULL.md §10.2).
//!
//! `server.log`, `lobby.log`, and `game.log` each receive only events
//! tagged with the matching `target`; `all.log` receives everything,
//! exactly mirroring the original four-file layout (`original_source/
//! server/src/logger.c`) without hand-rolling its timestamp formatting —
//! `tracing-subscriber`'s own time formatter takes that job instead. A
//! plain stdout layer mirrors `all.log` for interactive runs.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::filter_fn, fmt, prelude::*, EnvFilter};

use crate::error::PigServerError;

/// Keeps the non-blocking writers' background threads alive. Drop this
/// only once the process is shutting down, or buffered lines are lost.
pub struct LogGuards(#[allow(dead_code)] Vec<WorkerGuard>);

pub fn init(log_dir: &str) -> Result<LogGuards, PigServerError> {
    std::fs::create_dir_all(log_dir)
        .map_err(|source| PigServerError::Logging { dir: log_dir.to_string(), source })?;

    let (server_writer, server_guard) = tracing_appender::non_blocking(open(log_dir, "server.log")?);
    let (lobby_writer, lobby_guard) = tracing_appender::non_blocking(open(log_dir, "lobby.log")?);
    let (game_writer, game_guard) = tracing_appender::non_blocking(open(log_dir, "game.log")?);
    let (all_writer, all_guard) = tracing_appender::non_blocking(open(log_dir, "all.log")?);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let server_layer = fmt::layer()
        .with_ansi(false)
        .with_writer(server_writer)
        .with_filter(filter_fn(|meta| meta.target() == "server"));
    let lobby_layer = fmt::layer()
        .with_ansi(false)
        .with_writer(lobby_writer)
        .with_filter(filter_fn(|meta| meta.target() == "lobby"));
    let game_layer = fmt::layer()
        .with_ansi(false)
        .with_writer(game_writer)
        .with_filter(filter_fn(|meta| meta.target() == "game"));
    let all_layer = fmt::layer().with_ansi(false).with_writer(all_writer);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(server_layer)
        .with(lobby_layer)
        .with(game_layer)
        .with(all_layer)
        .with(stdout_layer)
        .init();

    Ok(LogGuards(vec![server_guard, lobby_guard, game_guard, all_guard]))
}

fn open(dir: &str, name: &str) -> Result<std::fs::File, PigServerError> {
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(Path::new(dir).join(name))
        .map_err(|source| PigServerError::Logging { dir: dir.to_string(), source })
}
