//! Glue between the network layer and the towns: admits new connections,
//! parses their frames and forwards them to the right town actor.

use std::collections::HashMap;
use std::sync::Arc;

use net::channels::{Audience, ConnectRequest, ConnectionId, NetRx, NetToTown, RouterMsg, RouterTx};
use session::{PlayerId, TownId};
use tokio::sync::mpsc;

use crate::actor::TownHandle;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::registry::TownRegistry;
use crate::video::VideoTokenProvider;

enum Connection {
    /// Join in flight; frames that arrive meanwhile are replayed after it.
    Pending { buffered: Vec<String>, closed: bool },
    Joined { town: TownHandle, player_id: PlayerId },
}

struct JoinOutcome {
    connection_id: ConnectionId,
    town_id: TownId,
    result: Result<(TownHandle, PlayerId), String>,
}

pub async fn run_dispatcher(
    mut net_rx: NetRx,
    registry: Arc<TownRegistry>,
    router_tx: RouterTx,
    video: Arc<dyn VideoTokenProvider>,
) {
    let (join_tx, mut join_rx) = mpsc::unbounded_channel::<JoinOutcome>();
    let mut connections: HashMap<ConnectionId, Connection> = HashMap::new();

    loop {
        tokio::select! {
            msg = net_rx.recv() => {
                let Some(msg) = msg else { break };
                match msg {
                    NetToTown::NewConnection { connection_id, request } => {
                        connections.insert(
                            connection_id,
                            Connection::Pending { buffered: Vec::new(), closed: false },
                        );
                        tokio::spawn(admit(
                            connection_id,
                            request,
                            Arc::clone(&registry),
                            Arc::clone(&video),
                            join_tx.clone(),
                        ));
                    }
                    NetToTown::Input { connection_id, text } => match connections.get_mut(&connection_id) {
                        Some(Connection::Pending { buffered, .. }) => buffered.push(text),
                        Some(Connection::Joined { town, player_id }) => forward(town, player_id, &text),
                        None => tracing::debug!(%connection_id, "input from unknown connection"),
                    },
                    NetToTown::Disconnected { connection_id } => match connections.remove(&connection_id) {
                        Some(Connection::Pending { buffered, .. }) => {
                            // Remember the close so the join result is undone.
                            connections.insert(connection_id, Connection::Pending { buffered, closed: true });
                        }
                        Some(Connection::Joined { town, player_id }) => leave(&town, player_id),
                        None => {}
                    },
                }
            }
            Some(outcome) = join_rx.recv() => {
                complete_join(&mut connections, &router_tx, outcome);
            }
        }
    }
    tracing::info!("dispatcher stopped");
}

async fn admit(
    connection_id: ConnectionId,
    request: ConnectRequest,
    registry: Arc<TownRegistry>,
    video: Arc<dyn VideoTokenProvider>,
    join_tx: mpsc::UnboundedSender<JoinOutcome>,
) {
    let result = async {
        let town = registry
            .get(&request.town_id)
            .await
            .ok_or_else(|| "Town not found".to_string())?;
        let video_token = match video.token_for(request.town_id.as_str(), &request.user_name).await {
            Ok(token) => Some(token),
            Err(e) => {
                tracing::warn!(town = %request.town_id, "video token unavailable: {}", e);
                None
            }
        };
        let player_id = town
            .join(request.user_name.clone(), video_token, connection_id)
            .await
            .map_err(|e| e.to_string())?;
        Ok::<_, String>((town, player_id))
    }
    .await;
    let _ = join_tx.send(JoinOutcome {
        connection_id,
        town_id: request.town_id,
        result,
    });
}

fn complete_join(
    connections: &mut HashMap<ConnectionId, Connection>,
    router_tx: &RouterTx,
    outcome: JoinOutcome,
) {
    let JoinOutcome {
        connection_id,
        town_id,
        result,
    } = outcome;
    let Some(Connection::Pending { buffered, closed }) = connections.remove(&connection_id) else {
        return;
    };
    match result {
        Ok((town, player_id)) if closed => leave(&town, player_id),
        Ok((town, player_id)) => {
            tracing::debug!(%connection_id, town = %town.id(), player = %player_id, "connection joined");
            for text in &buffered {
                forward(&town, &player_id, text);
            }
            connections.insert(connection_id, Connection::Joined { town, player_id });
        }
        Err(message) => {
            tracing::info!(%connection_id, "join refused: {}", message);
            if !closed {
                let _ = router_tx.send(RouterMsg::Output {
                    town_id,
                    audience: Audience::Connection(connection_id),
                    text: ServerMessage::Error { message }.to_json(),
                    disconnect: true,
                });
            }
        }
    }
}

fn forward(town: &TownHandle, player_id: &PlayerId, text: &str) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => {
            if town.input(player_id.clone(), message).is_err() {
                tracing::debug!(town = %town.id(), player = %player_id, "town closed, input dropped");
            }
        }
        Err(e) => tracing::debug!(player = %player_id, "malformed client message: {}", e),
    }
}

fn leave(town: &TownHandle, player_id: PlayerId) {
    if town.leave(player_id).is_err() {
        tracing::debug!(town = %town.id(), "town already closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::{DisabledVideoProvider, LocalVideoTokenProvider};
    use net::channels::RouterRx;
    use std::time::Duration;

    async fn next_text(rx: &mut RouterRx) -> Option<(Audience, String, bool)> {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.ok()??;
            if let RouterMsg::Output {
                audience,
                text,
                disconnect,
                ..
            } = msg
            {
                return Some((audience, text, disconnect));
            }
        }
    }

    #[tokio::test]
    async fn unknown_town_gets_error_and_disconnect() {
        let (router_tx, mut router_rx) = mpsc::unbounded_channel();
        let registry = Arc::new(TownRegistry::new(router_tx.clone(), Vec::new(), 5));
        let (net_tx, net_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_dispatcher(
            net_rx,
            registry,
            router_tx,
            Arc::new(DisabledVideoProvider),
        ));

        net_tx
            .send(NetToTown::NewConnection {
                connection_id: ConnectionId(1),
                request: ConnectRequest {
                    town_id: TownId::from("NOPE"),
                    user_name: "alice".into(),
                },
            })
            .unwrap();

        let (audience, text, disconnect) = next_text(&mut router_rx).await.unwrap();
        assert_eq!(audience, Audience::Connection(ConnectionId(1)));
        assert!(text.contains("Town not found"));
        assert!(disconnect);
    }

    #[tokio::test]
    async fn join_replays_buffered_input_and_leaves_on_disconnect() {
        let (router_tx, mut router_rx) = mpsc::unbounded_channel();
        let registry = Arc::new(TownRegistry::new(router_tx.clone(), Vec::new(), 5));
        let town = registry.create_town("Town", true).await.unwrap();
        let (net_tx, net_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_dispatcher(
            net_rx,
            Arc::clone(&registry),
            router_tx,
            Arc::new(LocalVideoTokenProvider),
        ));

        net_tx
            .send(NetToTown::NewConnection {
                connection_id: ConnectionId(1),
                request: ConnectRequest {
                    town_id: town.town_id.clone(),
                    user_name: "alice".into(),
                },
            })
            .unwrap();
        // Sent before the join completes; must not be lost.
        net_tx
            .send(NetToTown::Input {
                connection_id: ConnectionId(1),
                text: r#"{"type":"emote","emoteId":"wave"}"#.into(),
            })
            .unwrap();
        net_tx
            .send(NetToTown::Input {
                connection_id: ConnectionId(1),
                text: "not json".into(),
            })
            .unwrap();

        let mut saw_init = false;
        let mut saw_emote = false;
        while !(saw_init && saw_emote) {
            let (_, text, _) = next_text(&mut router_rx).await.unwrap();
            saw_init |= text.contains(r#""type":"initialize""#) && text.contains("providerVideoToken");
            saw_emote |= text.contains(r#""emoteId":"wave""#);
        }

        let handle = registry.get(&town.town_id).await.unwrap();
        assert_eq!(handle.summary().await.unwrap().current_occupancy, 1);

        net_tx
            .send(NetToTown::Disconnected {
                connection_id: ConnectionId(1),
            })
            .unwrap();
        let mut occupancy = 1;
        for _ in 0..50 {
            occupancy = handle.summary().await.unwrap().current_occupancy;
            if occupancy == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(occupancy, 0);
    }
}
