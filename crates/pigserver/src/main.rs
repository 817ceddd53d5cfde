use clap::Parser;

use pigserver::{cli::Args, logging, server};

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let args = Args::parse();

    let _log_guards = match logging::init(&args.log_dir) {
        Ok(guards) => guards,
        Err(e) => {
            eprintln!("failed to initialize logging: {e}");
            return std::process::ExitCode::FAILURE;
        }
    };

    if let Err(e) = server::run(args).await {
        tracing::error!(target: "server", error = %e, "server failed to start");
        return std::process::ExitCode::FAILURE;
    }

    std::process::ExitCode::SUCCESS
}
