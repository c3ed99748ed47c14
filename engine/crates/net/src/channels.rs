use std::fmt;

use session::{PlayerId, TownId};
use tokio::sync::mpsc;

/// Transport-level identity of one WebSocket connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Handshake parameters taken from the upgrade request query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub town_id: TownId,
    pub user_name: String,
}

/// Messages from the network layer to the town dispatcher.
#[derive(Debug)]
pub enum NetToTown {
    /// A WebSocket upgrade completed.
    NewConnection {
        connection_id: ConnectionId,
        request: ConnectRequest,
    },
    /// A text frame arrived.
    Input {
        connection_id: ConnectionId,
        text: String,
    },
    /// The socket closed.
    Disconnected { connection_id: ConnectionId },
}

pub type NetTx = mpsc::UnboundedSender<NetToTown>;
pub type NetRx = mpsc::UnboundedReceiver<NetToTown>;

/// Per-connection write channel (output router -> socket writer task).
pub type ConnectionWriteTx = mpsc::UnboundedSender<String>;
pub type ConnectionWriteRx = mpsc::UnboundedReceiver<String>;

/// Who an outbound frame is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// Every player bound to the town.
    Town,
    /// One player in the town.
    Player(PlayerId),
    /// A connection that is not (or no longer) bound to a player.
    Connection(ConnectionId),
}

/// Everything the output router needs, on a single channel so that
/// registration, membership, and output are applied in send order.
#[derive(Debug)]
pub enum RouterMsg {
    Register {
        connection_id: ConnectionId,
        write_tx: ConnectionWriteTx,
    },
    Unregister(ConnectionId),
    /// Attach a connection to a player of a town; town-wide frames reach it
    /// from now on.
    Bind {
        town_id: TownId,
        player_id: PlayerId,
        connection_id: ConnectionId,
    },
    Unbind {
        town_id: TownId,
        player_id: PlayerId,
    },
    Output {
        town_id: TownId,
        audience: Audience,
        text: String,
        /// Drop the receiving connection(s) after delivery.
        disconnect: bool,
    },
}

impl RouterMsg {
    pub fn to_player(town_id: &TownId, player_id: &PlayerId, text: impl Into<String>) -> Self {
        Self::Output {
            town_id: town_id.clone(),
            audience: Audience::Player(player_id.clone()),
            text: text.into(),
            disconnect: false,
        }
    }

    pub fn to_town(town_id: &TownId, text: impl Into<String>) -> Self {
        Self::Output {
            town_id: town_id.clone(),
            audience: Audience::Town,
            text: text.into(),
            disconnect: false,
        }
    }
}

pub type RouterTx = mpsc::UnboundedSender<RouterMsg>;
pub type RouterRx = mpsc::UnboundedReceiver<RouterMsg>;
