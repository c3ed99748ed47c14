use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{ConnectInfo, Query, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use session::TownId;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};

use crate::channels::{
    ConnectRequest, ConnectionId, ConnectionWriteRx, NetToTown, NetTx, RouterMsg, RouterTx,
};
use crate::rate_limiter::{CommandThrottle, ConnectionLimiter, ConnectionPermit, RateLimitConfig};

/// Query string of the upgrade request: `/ws?townId=..&userName=..`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HandshakeQuery {
    town_id: String,
    user_name: String,
}

/// Shared state for the axum WebSocket handler.
#[derive(Clone)]
struct AppState {
    next_connection_id: Arc<AtomicU64>,
    net_tx: NetTx,
    router_tx: RouterTx,
    limiter: ConnectionLimiter,
}

/// Build the HTTP application: `/ws` upgrades, plus static files from
/// `static_dir` (SPA fallback to index.html) when given.
pub fn app(
    net_tx: NetTx,
    router_tx: RouterTx,
    limits: RateLimitConfig,
    static_dir: Option<PathBuf>,
) -> Router {
    let state = AppState {
        next_connection_id: Arc::new(AtomicU64::new(1)),
        net_tx,
        router_tx,
        limiter: ConnectionLimiter::new(limits),
    };

    let mut app = Router::new()
        .route("/ws", get(ws_upgrade_handler))
        .with_state(state)
        .layer(CorsLayer::permissive());

    if let Some(dir) = static_dir {
        let index_path = dir.join("index.html");
        let serve_dir = ServeDir::new(&dir).not_found_service(ServeFile::new(index_path));
        app = app.fallback_service(serve_dir);
        tracing::info!(dir = %dir.display(), "Serving static files");
    }
    app
}

/// Serve `app` on an already-bound listener until `shutdown` resolves.
pub async fn run_web_server<F>(listener: TcpListener, app: Router, shutdown: F) -> Result<(), std::io::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Web server listening on {}", addr);
    }
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown.await;
        tracing::info!("Web server shutting down gracefully");
    })
    .await
}

async fn ws_upgrade_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<HandshakeQuery>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    let permit = match state.limiter.try_admit(peer.ip()) {
        Ok(permit) => permit,
        Err(rejection) => {
            tracing::warn!(%peer, "Connection rejected: {}", rejection);
            return (StatusCode::SERVICE_UNAVAILABLE, rejection.to_string()).into_response();
        }
    };
    let request = ConnectRequest {
        town_id: TownId(query.town_id),
        user_name: query.user_name,
    };
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state, request, permit))
        .into_response()
}

async fn handle_ws_connection(
    socket: WebSocket,
    state: AppState,
    request: ConnectRequest,
    permit: ConnectionPermit,
) {
    let connection_id = ConnectionId(state.next_connection_id.fetch_add(1, Ordering::Relaxed));
    tracing::info!(%connection_id, town = %request.town_id, "New WebSocket connection");

    let (mut ws_writer, mut ws_reader) = socket.split();
    let (write_tx, mut write_rx): (_, ConnectionWriteRx) = tokio::sync::mpsc::unbounded_channel();

    // Register before announcing, so the dispatcher's first reply has a writer.
    let _ = state.router_tx.send(RouterMsg::Register {
        connection_id,
        write_tx,
    });
    let _ = state.net_tx.send(NetToTown::NewConnection {
        connection_id,
        request,
    });

    // Ends when the router drops our writer, which closes the socket.
    let mut writer_handle = tokio::spawn(async move {
        while let Some(text) = write_rx.recv().await {
            if ws_writer.send(Message::Text(text.into())).await.is_err() {
                return;
            }
        }
        let _ = ws_writer.send(Message::Close(None)).await;
    });

    let limits = state.limiter.config().clone();
    let mut throttle = CommandThrottle::new(limits.max_commands_per_second);

    loop {
        tokio::select! {
            frame = ws_reader.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if text.as_str().len() > limits.max_input_length {
                        tracing::debug!(%connection_id, len = text.as_str().len(), "Dropping oversized frame");
                        continue;
                    }
                    if !throttle.try_consume() {
                        tracing::debug!(%connection_id, "Throttled inbound frame");
                        continue;
                    }
                    let _ = state.net_tx.send(NetToTown::Input {
                        connection_id,
                        text: text.as_str().to_owned(),
                    });
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {} // binary, ping, pong
                Some(Err(e)) => {
                    tracing::debug!(%connection_id, "WebSocket read error: {}", e);
                    break;
                }
            },
            _ = &mut writer_handle => break,
        }
    }

    let _ = state.net_tx.send(NetToTown::Disconnected { connection_id });
    let _ = state.router_tx.send(RouterMsg::Unregister(connection_id));

    writer_handle.abort();
    drop(permit);
    tracing::info!(%connection_id, "WebSocket connection ended");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    #[test]
    fn handshake_query_is_camel_case() {
        let q: HandshakeQuery =
            serde_json::from_str(r#"{"townId":"ABCD1234","userName":"Alice"}"#).unwrap();
        assert_eq!(q.town_id, "ABCD1234");
        assert_eq!(q.user_name, "Alice");
    }
}
