use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use session::PlayerId;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(pub String);

impl GameId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GameId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lifecycle of a game. `Over` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameStatus {
    WaitingForPlayers,
    WaitingToStart,
    InProgress,
    Over,
}

/// A move that has been accepted and placed on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameMove<P> {
    pub game_piece: P,
    pub row: usize,
    pub col: usize,
}

/// A move as requested by a client. The piece, if given, is advisory only:
/// the server always places the piece of the requesting player's seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest<P> {
    pub row: usize,
    pub col: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_piece: Option<P>,
}

/// Immutable snapshot of a game; replaced wholesale on every transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState<P> {
    pub status: GameStatus,
    /// Seat holders, in canonical seat order.
    pub seats: [Option<PlayerId>; 2],
    pub ready: [bool; 2],
    pub first_player: P,
    pub moves: Vec<GameMove<P>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<PlayerId>,
}

/// Final outcome of a concluded game. `winner == None` is a tie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameResult {
    pub game_id: GameId,
    pub winner: Option<PlayerId>,
    pub scores: BTreeMap<PlayerId, u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameInstanceModel<P> {
    pub id: GameId,
    pub state: GameState<P>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<GameResult>,
    pub players: Vec<PlayerId>,
}
