use std::sync::{Arc, Mutex};

use net::channels::{Audience, ConnectionId, RouterMsg, RouterTx};
use session::{PlayerId, TownId};

use crate::protocol::ServerMessage;

/// Outbound capability handed to a town. Core code never touches a
/// transport directly.
pub trait Broadcaster: Send + Sync {
    /// Deliver to every player of the town.
    fn publish(&self, msg: &ServerMessage);
    /// Deliver to one player of the town.
    fn send_to(&self, player_id: &PlayerId, msg: &ServerMessage);
    /// Start delivering town traffic to `player_id` over `connection_id`.
    fn attach(&self, player_id: &PlayerId, connection_id: ConnectionId);
    /// Stop delivering town traffic to `player_id`.
    fn detach(&self, player_id: &PlayerId);
    /// Deliver a final message to every player, then drop their connections.
    fn close_all(&self, msg: &ServerMessage);
}

/// Broadcaster backed by the output router.
#[derive(Debug, Clone)]
pub struct RouterBroadcaster {
    town_id: TownId,
    router_tx: RouterTx,
}

impl RouterBroadcaster {
    pub fn new(town_id: TownId, router_tx: RouterTx) -> Self {
        Self { town_id, router_tx }
    }

    fn send(&self, msg: RouterMsg) {
        if self.router_tx.send(msg).is_err() {
            tracing::debug!(town = %self.town_id, "output router gone, dropping message");
        }
    }
}

impl Broadcaster for RouterBroadcaster {
    fn publish(&self, msg: &ServerMessage) {
        self.send(RouterMsg::to_town(&self.town_id, msg.to_json()));
    }

    fn send_to(&self, player_id: &PlayerId, msg: &ServerMessage) {
        self.send(RouterMsg::to_player(&self.town_id, player_id, msg.to_json()));
    }

    fn attach(&self, player_id: &PlayerId, connection_id: ConnectionId) {
        self.send(RouterMsg::Bind {
            town_id: self.town_id.clone(),
            player_id: player_id.clone(),
            connection_id,
        });
    }

    fn detach(&self, player_id: &PlayerId) {
        self.send(RouterMsg::Unbind {
            town_id: self.town_id.clone(),
            player_id: player_id.clone(),
        });
    }

    fn close_all(&self, msg: &ServerMessage) {
        self.send(RouterMsg::Output {
            town_id: self.town_id.clone(),
            audience: Audience::Town,
            text: msg.to_json(),
            disconnect: true,
        });
    }
}

/// One delivery observed by a `RecordingBroadcaster`.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Town(ServerMessage),
    Player(PlayerId, ServerMessage),
    Attached(PlayerId, ConnectionId),
    Detached(PlayerId),
    Closed(ServerMessage),
}

/// Broadcaster that keeps everything it is asked to send, for tests and
/// offline tooling.
#[derive(Debug, Clone, Default)]
pub struct RecordingBroadcaster {
    log: Arc<Mutex<Vec<Delivery>>>,
}

impl RecordingBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, delivery: Delivery) {
        self.log.lock().unwrap_or_else(|e| e.into_inner()).push(delivery);
    }

    /// Everything recorded since the last `take`.
    pub fn take(&self) -> Vec<Delivery> {
        std::mem::take(&mut *self.log.lock().unwrap_or_else(|e| e.into_inner()))
    }

    /// Town-wide messages recorded since the last `take`.
    pub fn take_published(&self) -> Vec<ServerMessage> {
        self.take()
            .into_iter()
            .filter_map(|d| match d {
                Delivery::Town(msg) => Some(msg),
                _ => None,
            })
            .collect()
    }
}

impl Broadcaster for RecordingBroadcaster {
    fn publish(&self, msg: &ServerMessage) {
        self.push(Delivery::Town(msg.clone()));
    }

    fn send_to(&self, player_id: &PlayerId, msg: &ServerMessage) {
        self.push(Delivery::Player(player_id.clone(), msg.clone()));
    }

    fn attach(&self, player_id: &PlayerId, connection_id: ConnectionId) {
        self.push(Delivery::Attached(player_id.clone(), connection_id));
    }

    fn detach(&self, player_id: &PlayerId) {
        self.push(Delivery::Detached(player_id.clone()));
    }

    fn close_all(&self, msg: &ServerMessage) {
        self.push(Delivery::Closed(msg.clone()));
    }
}
