//! The accept loop: binds the listening socket and spawns one connection
//! handler task per accepted client (SPEC_FULL.md §5, §6).

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info};

use pigserver_session::{run_connection, SharedState};

use crate::cli::Args;
use crate::error::PigServerError;

/// Bind the listener and run the accept loop until the process is killed.
/// Only the initial bind can fail outright here — once listening, a single
/// `accept()` failure is logged and the loop continues, since it says
/// nothing about the health of matches already in progress.
pub async fn run(args: Args) -> Result<(), PigServerError> {
    let addr = SocketAddr::new(args.address, args.port);
    let listener =
        TcpListener::bind(addr).await.map_err(|source| PigServerError::Bind { addr, source })?;

    info!(
        target: "server",
        %addr, max_players = args.max_players, max_rooms = args.max_rooms,
        "server listening"
    );

    let shared = Arc::new(SharedState::<TcpStream>::new(args.max_players, args.max_rooms));
    accept_loop(listener, shared).await;
    Ok(())
}

async fn accept_loop(listener: TcpListener, shared: Arc<SharedState<TcpStream>>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                info!(target: "server", %peer, "accepted connection");
                let shared = Arc::clone(&shared);
                tokio::spawn(async move {
                    run_connection(stream, shared).await;
                });
            }
            Err(e) => {
                error!(target: "server", error = %e, "accept failed");
            }
        }
    }
}
