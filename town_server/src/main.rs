use std::time::Duration;

use tokio::net::TcpListener;
use town_server::config::parse_cli_args;
use town_server::shutdown::{self, shutdown_channel};

#[tokio::main]
async fn main() {
    observability::init_logging("info");

    let config = parse_cli_args();
    tracing::info!("Town server starting...");

    let listener = match TcpListener::bind(&config.net.ws_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", config.net.ws_addr, e);
            std::process::exit(1);
        }
    };

    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let server = town_server::serve(config, listener, shutdown_rx);
    tokio::pin!(server);

    let finished = tokio::select! {
        _ = shutdown::wait_for_signal() => None,
        res = &mut server => Some(res),
    };
    let result = match finished {
        Some(res) => res,
        None => {
            tracing::info!("Shutdown signal received, stopping server...");
            shutdown_tx.trigger();
            match tokio::time::timeout(Duration::from_secs(5), &mut server).await {
                Ok(res) => res,
                Err(_) => {
                    tracing::warn!("Server did not stop in time");
                    Ok(())
                }
            }
        }
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
    tracing::info!("Server stopped.");
}
