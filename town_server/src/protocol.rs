use std::collections::BTreeMap;

use games::{ConnectFourColor, GameId, GameInstanceModel, MoveRequest, TicTacToeMark};
use serde::{Deserialize, Serialize};
use session::{PlayerId, PlayerModel, SessionToken};
use space::{AreaId, PlayerLocation};

/// Client-to-server message (internally tagged JSON).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    Move {
        location: PlayerLocation,
    },
    #[serde(rename_all = "camelCase")]
    InteractableCommand {
        command_id: String,
        interactable_id: AreaId,
        command: InteractableCommand,
    },
    #[serde(rename_all = "camelCase")]
    Emote {
        emote_id: String,
    },
}

/// Payload of an `interactableCommand`, one variant per command kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InteractableCommand {
    JoinGame,
    #[serde(rename_all = "camelCase")]
    StartGame { game_id: GameId },
    #[serde(rename_all = "camelCase")]
    LeaveGame { game_id: GameId },
    #[serde(rename_all = "camelCase")]
    GameMove {
        game_id: GameId,
        #[serde(rename = "move")]
        game_move: MoveRequest<String>,
    },
    ViewingAreaUpdate { update: ViewingAreaUpdate },
}

impl InteractableCommand {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::JoinGame => "JoinGame",
            Self::StartGame { .. } => "StartGame",
            Self::LeaveGame { .. } => "LeaveGame",
            Self::GameMove { .. } => "GameMove",
            Self::ViewingAreaUpdate { .. } => "ViewingAreaUpdate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewingAreaUpdate {
    #[serde(default)]
    pub video: Option<String>,
    pub is_playing: bool,
    pub elapsed_time_sec: f64,
}

/// Server-to-client message (internally tagged JSON).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Sent once, to the joining connection only.
    #[serde(rename_all = "camelCase")]
    Initialize {
        user_id: PlayerId,
        session_token: SessionToken,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        provider_video_token: Option<String>,
        current_players: Vec<PlayerModel>,
        friendly_name: String,
        is_publicly_listed: bool,
        interactables: Vec<InteractableModel>,
    },
    PlayerJoined {
        player: PlayerModel,
    },
    PlayerMoved {
        player: PlayerModel,
    },
    PlayerDisconnected {
        player: PlayerModel,
    },
    InteractableUpdate {
        interactable: InteractableModel,
    },
    #[serde(rename_all = "camelCase")]
    CommandResponse {
        command_id: String,
        interactable_id: AreaId,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        game_id: Option<GameId>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        error: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Emote {
        player_id: PlayerId,
        emote_id: String,
    },
    #[serde(rename_all = "camelCase")]
    TownSettingsUpdated {
        #[serde(skip_serializing_if = "Option::is_none", default)]
        friendly_name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        is_publicly_listed: Option<bool>,
    },
    TownClosing,
    Error {
        message: String,
    },
}

impl ServerMessage {
    /// Serialize for the wire. Every variant is plain data, so this cannot
    /// fail in practice; a failure is logged and yields an empty object.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::error!("failed to serialize server message: {}", e);
            "{}".to_string()
        })
    }
}

/// Wire form of an area, tagged by its kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InteractableModel {
    ConversationArea(ConversationAreaModel),
    ViewingArea(ViewingAreaModel),
    ConnectFourArea(GameAreaModel<ConnectFourColor>),
    TicTacToeArea(GameAreaModel<TicTacToeMark>),
}

impl InteractableModel {
    pub fn id(&self) -> &AreaId {
        match self {
            Self::ConversationArea(m) => &m.id,
            Self::ViewingArea(m) => &m.id,
            Self::ConnectFourArea(m) => &m.id,
            Self::TicTacToeArea(m) => &m.id,
        }
    }

    pub fn occupants(&self) -> &[PlayerId] {
        match self {
            Self::ConversationArea(m) => &m.occupants,
            Self::ViewingArea(m) => &m.occupants,
            Self::ConnectFourArea(m) => &m.occupants,
            Self::TicTacToeArea(m) => &m.occupants,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationAreaModel {
    pub id: AreaId,
    #[serde(default)]
    pub occupants: Vec<PlayerId>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub topic: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewingAreaModel {
    pub id: AreaId,
    #[serde(default)]
    pub occupants: Vec<PlayerId>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub video: Option<String>,
    #[serde(default)]
    pub is_playing: bool,
    #[serde(default)]
    pub elapsed_time_sec: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameAreaModel<P> {
    pub id: AreaId,
    pub occupants: Vec<PlayerId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game: Option<GameInstanceModel<P>>,
    pub history: Vec<HistoryEntry>,
}

/// Final scores of one concluded game, keyed by display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub game_id: GameId,
    pub scores: BTreeMap<String, u32>,
}

/// Public listing entry for one town.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TownSummary {
    pub town_id: String,
    pub friendly_name: String,
    pub current_occupancy: usize,
    pub maximum_occupancy: usize,
    #[serde(skip)]
    pub is_publicly_listed: bool,
}
