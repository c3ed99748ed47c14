//! Server-wide stop signal. `main` owns the trigger; `serve` hands a
//! receiver to the web server and another to the task that closes every
//! town.

use tokio::sync::watch;

#[derive(Clone)]
pub struct ShutdownTx(watch::Sender<bool>);

#[derive(Clone)]
pub struct ShutdownRx(watch::Receiver<bool>);

pub fn shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTx(tx), ShutdownRx(rx))
}

impl ShutdownTx {
    pub fn trigger(&self) {
        let _ = self.0.send(true);
    }
}

impl ShutdownRx {
    /// Resolves once shutdown is triggered, or when the trigger is dropped.
    /// A receiver cloned after the trigger resolves at once.
    pub async fn wait(&mut self) {
        let _ = self.0.wait_for(|stopped| *stopped).await;
    }
}

/// Resolves on SIGINT/SIGTERM, or Ctrl+C off Unix. Never resolves if the
/// handlers cannot be installed, so the server keeps running.
pub async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let (mut sigint, mut sigterm) = match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
            (Ok(i), Ok(t)) => (i, t),
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!("failed to register signal handlers: {}", e);
                return std::future::pending().await;
            }
        };
        let name = tokio::select! {
            _ = sigint.recv() => "SIGINT",
            _ = sigterm.recv() => "SIGTERM",
        };
        tracing::info!(signal = name, "stop requested");
    }
    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {}", e);
            return std::future::pending().await;
        }
        tracing::info!(signal = "ctrl-c", "stop requested");
    }
}
