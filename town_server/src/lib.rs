pub mod actor;
pub mod areas;
pub mod broadcast;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod map;
pub mod protocol;
pub mod registry;
pub mod shutdown;
pub mod town;
pub mod video;

use std::path::PathBuf;
use std::sync::Arc;

use session::TownId;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

pub use config::ServerConfig;
pub use error::{ConfigError, RegistryError, ServerError, TownError};
pub use registry::TownRegistry;
pub use town::Town;

use crate::shutdown::ShutdownRx;
use crate::video::{DisabledVideoProvider, LocalVideoTokenProvider, VideoTokenProvider};

/// Wire up the output router, the registry with its default town, the
/// dispatcher and the web server, then serve on `listener` until shutdown.
/// Every town is closed before this returns.
pub async fn serve(config: ServerConfig, listener: TcpListener, shutdown_rx: ShutdownRx) -> Result<(), ServerError> {
    let map = map::load_map(&config.town.map_file)?;

    let (router_tx, router_rx) = mpsc::unbounded_channel();
    tokio::spawn(net::output_router::run_output_router(router_rx));

    let registry = Arc::new(
        TownRegistry::new(router_tx.clone(), map.areas, config.town.capacity)
            .with_master_password(config.admin.master_password.clone()),
    );
    let lobby = match &config.town.default_town_id {
        Some(id) => {
            registry
                .create_town_with_id(
                    TownId::from(id.as_str()),
                    &config.town.default_town_name,
                    config.town.default_town_public,
                )
                .await?
        }
        None => {
            registry
                .create_town(&config.town.default_town_name, config.town.default_town_public)
                .await?
        }
    };
    tracing::info!(
        town = %lobby.town_id,
        update_password = %lobby.update_password,
        "default town ready"
    );

    let video: Arc<dyn VideoTokenProvider> = if config.video.enabled {
        Arc::new(LocalVideoTokenProvider)
    } else {
        Arc::new(DisabledVideoProvider)
    };

    let (net_tx, net_rx) = mpsc::unbounded_channel();
    tokio::spawn(dispatch::run_dispatcher(
        net_rx,
        Arc::clone(&registry),
        router_tx.clone(),
        video,
    ));

    let closer = {
        let registry = Arc::clone(&registry);
        let mut rx = shutdown_rx.clone();
        tokio::spawn(async move {
            rx.wait().await;
            registry.shutdown().await;
        })
    };

    let static_dir = {
        let p = PathBuf::from(&config.net.web_static_dir);
        if p.is_dir() {
            Some(p)
        } else {
            None
        }
    };
    let app = net::web_server::app(net_tx, router_tx, config.to_rate_limit_config(), static_dir);
    let mut rx = shutdown_rx;
    net::web_server::run_web_server(listener, app, async move { rx.wait().await }).await?;

    if let Err(e) = closer.await {
        tracing::warn!("town shutdown task failed: {}", e);
    }
    Ok(())
}
