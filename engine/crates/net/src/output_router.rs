use std::collections::{BTreeMap, HashMap};

use session::{PlayerId, TownId};

use crate::channels::{Audience, ConnectionId, ConnectionWriteTx, RouterMsg, RouterRx};

#[derive(Default)]
struct RouterState {
    writers: HashMap<ConnectionId, ConnectionWriteTx>,
    towns: HashMap<TownId, BTreeMap<PlayerId, ConnectionId>>,
    bindings: HashMap<ConnectionId, (TownId, PlayerId)>,
}

impl RouterState {
    fn unbind_connection(&mut self, connection_id: ConnectionId) {
        if let Some((town_id, player_id)) = self.bindings.remove(&connection_id) {
            if let Some(members) = self.towns.get_mut(&town_id) {
                members.remove(&player_id);
                if members.is_empty() {
                    self.towns.remove(&town_id);
                }
            }
        }
    }

    fn drop_connection(&mut self, connection_id: ConnectionId) {
        // Dropping the sender ends the socket's writer task.
        self.writers.remove(&connection_id);
        self.unbind_connection(connection_id);
    }

    fn targets(&self, town_id: &TownId, audience: &Audience) -> Vec<ConnectionId> {
        match audience {
            Audience::Town => self
                .towns
                .get(town_id)
                .map(|m| m.values().copied().collect())
                .unwrap_or_default(),
            Audience::Player(player_id) => self
                .towns
                .get(town_id)
                .and_then(|m| m.get(player_id))
                .copied()
                .into_iter()
                .collect(),
            Audience::Connection(connection_id) => vec![*connection_id],
        }
    }

    fn apply(&mut self, msg: RouterMsg) {
        match msg {
            RouterMsg::Register {
                connection_id,
                write_tx,
            } => {
                tracing::debug!(%connection_id, "Output router: connection registered");
                self.writers.insert(connection_id, write_tx);
            }
            RouterMsg::Unregister(connection_id) => {
                tracing::debug!(%connection_id, "Output router: connection unregistered");
                self.drop_connection(connection_id);
            }
            RouterMsg::Bind {
                town_id,
                player_id,
                connection_id,
            } => {
                self.unbind_connection(connection_id);
                self.towns
                    .entry(town_id.clone())
                    .or_default()
                    .insert(player_id.clone(), connection_id);
                self.bindings.insert(connection_id, (town_id, player_id));
            }
            RouterMsg::Unbind { town_id, player_id } => {
                let connection_id = self
                    .towns
                    .get(&town_id)
                    .and_then(|m| m.get(&player_id))
                    .copied();
                if let Some(connection_id) = connection_id {
                    self.unbind_connection(connection_id);
                }
            }
            RouterMsg::Output {
                town_id,
                audience,
                text,
                disconnect,
            } => {
                for connection_id in self.targets(&town_id, &audience) {
                    let Some(tx) = self.writers.get(&connection_id) else {
                        continue;
                    };
                    if tx.send(text.clone()).is_err() {
                        tracing::debug!(%connection_id, "Output router: write channel closed");
                        self.drop_connection(connection_id);
                    } else if disconnect {
                        tracing::debug!(%connection_id, "Output router: disconnect requested, dropping writer");
                        self.drop_connection(connection_id);
                    }
                }
            }
        }
    }
}

/// Routes outbound frames to per-connection write channels, tracking which
/// connections belong to which town.
pub async fn run_output_router(mut router_rx: RouterRx) {
    let mut state = RouterState::default();
    while let Some(msg) = router_rx.recv().await {
        state.apply(msg);
    }
    tracing::info!("Output router shutting down");
}
