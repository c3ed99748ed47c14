//! Interactable areas: rectangles on the map that track which players are
//! inside them, optionally hosting shared state such as a topic, a video, or
//! a game.

mod conversation;
mod factory;
mod game_area;
mod viewing;

pub use conversation::ConversationArea;
pub use game_area::GameArea;
pub use viewing::ViewingArea;

use games::{ConnectFour, GameId, TicTacToe};
use session::{Player, PlayerDirectory, PlayerId};
use space::{AreaId, PlayerLocation, Rect};

use crate::broadcast::Broadcaster;
use crate::error::TownError;
use crate::protocol::{InteractableCommand, InteractableModel, ServerMessage};

/// Geometry and occupant roster shared by every area kind. Occupants are
/// player ids only; the town owns the players.
#[derive(Debug, Clone)]
pub struct InteractableArea {
    id: AreaId,
    rect: Rect,
    occupants: Vec<PlayerId>,
}

impl InteractableArea {
    pub fn new(id: AreaId, rect: Rect) -> Self {
        Self {
            id,
            rect,
            occupants: Vec::new(),
        }
    }

    pub fn id(&self) -> &AreaId {
        &self.id
    }

    pub fn rect(&self) -> &Rect {
        &self.rect
    }

    pub fn occupants(&self) -> &[PlayerId] {
        &self.occupants
    }

    pub fn is_occupant(&self, player_id: &PlayerId) -> bool {
        self.occupants.contains(player_id)
    }

    pub fn is_empty(&self) -> bool {
        self.occupants.is_empty()
    }

    pub fn contains(&self, location: &PlayerLocation) -> bool {
        self.rect.contains(location)
    }

    pub fn overlaps(&self, other: &InteractableArea) -> bool {
        self.rect.overlaps(&other.rect)
    }

    fn add(&mut self, player: &mut Player) {
        if !self.is_occupant(player.id()) {
            self.occupants.push(player.id().clone());
        }
        player.location.interactable_id = Some(self.id.clone());
    }

    fn remove(&mut self, player: &mut Player) {
        self.occupants.retain(|p| p != player.id());
        player.location.interactable_id = None;
    }
}

/// Every area kind a town can host.
#[derive(Debug)]
pub enum Area {
    Conversation(ConversationArea),
    Viewing(ViewingArea),
    ConnectFour(GameArea<ConnectFour>),
    TicTacToe(GameArea<TicTacToe>),
}

impl Area {
    pub fn base(&self) -> &InteractableArea {
        match self {
            Self::Conversation(a) => a.base(),
            Self::Viewing(a) => a.base(),
            Self::ConnectFour(a) => a.base(),
            Self::TicTacToe(a) => a.base(),
        }
    }

    fn base_mut(&mut self) -> &mut InteractableArea {
        match self {
            Self::Conversation(a) => a.base_mut(),
            Self::Viewing(a) => a.base_mut(),
            Self::ConnectFour(a) => a.base_mut(),
            Self::TicTacToe(a) => a.base_mut(),
        }
    }

    pub fn id(&self) -> &AreaId {
        self.base().id()
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Conversation(_) => "ConversationArea",
            Self::Viewing(_) => "ViewingArea",
            Self::ConnectFour(_) => GameArea::<ConnectFour>::kind(),
            Self::TicTacToe(_) => GameArea::<TicTacToe>::kind(),
        }
    }

    pub fn contains(&self, location: &PlayerLocation) -> bool {
        self.base().contains(location)
    }

    pub fn overlaps(&self, other: &Area) -> bool {
        self.base().overlaps(other.base())
    }

    pub fn to_model(&self) -> InteractableModel {
        match self {
            Self::Conversation(a) => InteractableModel::ConversationArea(a.to_model()),
            Self::Viewing(a) => InteractableModel::ViewingArea(a.to_model()),
            Self::ConnectFour(a) => InteractableModel::ConnectFourArea(a.to_model()),
            Self::TicTacToe(a) => InteractableModel::TicTacToeArea(a.to_model()),
        }
    }

    pub fn emit_changed(&self, out: &dyn Broadcaster) {
        out.publish(&ServerMessage::InteractableUpdate {
            interactable: self.to_model(),
        });
    }

    /// Make `player` an occupant and announce the new location and area state.
    pub fn add(&mut self, player: &mut Player, out: &dyn Broadcaster) {
        self.base_mut().add(player);
        out.publish(&ServerMessage::PlayerMoved {
            player: player.to_model(),
        });
        self.emit_changed(out);
    }

    /// Drop `player` from the occupants. A game in progress is left first,
    /// and state that only lives while the area is occupied is cleared when
    /// the last occupant goes.
    pub fn remove(&mut self, player: &mut Player, directory: &dyn PlayerDirectory, out: &dyn Broadcaster) {
        match self {
            Self::ConnectFour(a) => a.player_leaving(player.id(), directory),
            Self::TicTacToe(a) => a.player_leaving(player.id(), directory),
            Self::Conversation(_) | Self::Viewing(_) => {}
        }
        self.base_mut().remove(player);
        if self.base().is_empty() {
            match self {
                Self::Conversation(a) => a.clear_topic(),
                Self::Viewing(a) => a.clear_video(),
                Self::ConnectFour(_) | Self::TicTacToe(_) => {}
            }
        }
        out.publish(&ServerMessage::PlayerMoved {
            player: player.to_model(),
        });
        self.emit_changed(out);
    }

    /// Add every given player whose location already lies inside this area.
    pub fn add_players_within_bounds<'a>(
        &mut self,
        players: impl IntoIterator<Item = &'a mut Player>,
        out: &dyn Broadcaster,
    ) {
        for player in players {
            if self.contains(&player.location) && !self.base().is_occupant(player.id()) {
                self.add(player, out);
            }
        }
    }

    /// Route a command to this area. Game areas return the id of the game a
    /// `JoinGame` landed in. On success the new area state is broadcast.
    pub fn handle_command(
        &mut self,
        player_id: &PlayerId,
        command: &InteractableCommand,
        directory: &dyn PlayerDirectory,
        out: &dyn Broadcaster,
    ) -> Result<Option<GameId>, TownError> {
        let game_id = match self {
            Self::ConnectFour(a) => a.handle_command(player_id, command, directory)?,
            Self::TicTacToe(a) => a.handle_command(player_id, command, directory)?,
            Self::Viewing(a) => match command {
                InteractableCommand::ViewingAreaUpdate { update } => {
                    a.apply_update(update);
                    None
                }
                _ => return Ok(None),
            },
            // Conversation areas carry no commands.
            Self::Conversation(_) => return Ok(None),
        };
        self.emit_changed(out);
        Ok(game_id)
    }
}
