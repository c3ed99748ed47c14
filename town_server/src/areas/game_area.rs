use games::{Game, GameError, GameId, GameRules, MoveRequest};
use session::{PlayerDirectory, PlayerId};

use crate::error::TownError;
use crate::protocol::{GameAreaModel, HistoryEntry, InteractableCommand};

use super::InteractableArea;

/// Area hosting at most one live game of kind `R`, plus the results of every
/// game that concluded here.
#[derive(Debug)]
pub struct GameArea<R: GameRules> {
    base: InteractableArea,
    game: Option<Game<R>>,
    history: Vec<HistoryEntry>,
}

impl<R: GameRules> GameArea<R> {
    pub fn new(base: InteractableArea) -> Self {
        Self {
            base,
            game: None,
            history: Vec::new(),
        }
    }

    pub fn kind() -> &'static str {
        R::AREA_KIND
    }

    pub fn base(&self) -> &InteractableArea {
        &self.base
    }

    pub(super) fn base_mut(&mut self) -> &mut InteractableArea {
        &mut self.base
    }

    pub fn game(&self) -> Option<&Game<R>> {
        self.game.as_ref()
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    fn current_game_mut(&mut self, game_id: &GameId) -> Result<&mut Game<R>, GameError> {
        let game = self.game.as_mut().ok_or(GameError::GameNotInProgress)?;
        if game.id() != game_id {
            return Err(GameError::GameIdMismatch);
        }
        Ok(game)
    }

    /// Apply a game command on behalf of `player_id`. Nothing changes when an
    /// error is returned.
    pub fn handle_command(
        &mut self,
        player_id: &PlayerId,
        command: &InteractableCommand,
        directory: &dyn PlayerDirectory,
    ) -> Result<Option<GameId>, TownError> {
        let joined = match command {
            InteractableCommand::JoinGame => {
                if self.game.as_ref().map_or(true, Game::is_over) {
                    let next = Game::new(self.game.as_ref());
                    tracing::debug!(area = %self.base.id(), game = %next.id(), "new game");
                    self.game = Some(next);
                }
                let game = self.game.as_mut().ok_or(GameError::GameNotInProgress)?;
                game.join(player_id)?;
                Some(game.id().clone())
            }
            InteractableCommand::StartGame { game_id } => {
                self.current_game_mut(game_id)?.start_game(player_id)?;
                None
            }
            InteractableCommand::LeaveGame { game_id } => {
                self.current_game_mut(game_id)?.leave(player_id)?;
                None
            }
            InteractableCommand::GameMove { game_id, game_move } => {
                let game = self.current_game_mut(game_id)?;
                let game_piece = match &game_move.game_piece {
                    Some(piece) => Some(
                        piece
                            .parse::<R::Piece>()
                            .map_err(|_| GameError::InvalidMove)?,
                    ),
                    None => None,
                };
                game.apply_move(
                    player_id,
                    MoveRequest {
                        row: game_move.row,
                        col: game_move.col,
                        game_piece,
                    },
                )?;
                None
            }
            InteractableCommand::ViewingAreaUpdate { .. } => {
                return Err(GameError::InvalidCommand.into());
            }
        };
        self.record_outcome(directory);
        Ok(joined)
    }

    /// Called before an occupant leaves the area: they leave the game too.
    pub(super) fn player_leaving(&mut self, player_id: &PlayerId, directory: &dyn PlayerDirectory) {
        let Some(game) = self.game.as_mut() else {
            return;
        };
        match game.leave(player_id) {
            Ok(()) | Err(GameError::PlayerNotInGame) => {}
            Err(e) => tracing::warn!(area = %self.base.id(), player = %player_id, "leave failed: {}", e),
        }
        self.record_outcome(directory);
    }

    /// Append one history entry for the current game once it is over.
    fn record_outcome(&mut self, directory: &dyn PlayerDirectory) {
        let Some(game) = self.game.as_ref() else {
            return;
        };
        if !game.is_over() || self.history.iter().any(|h| h.game_id == *game.id()) {
            return;
        }
        let winner = game.state().winner.as_ref();
        let scores = game
            .state()
            .seats
            .iter()
            .flatten()
            .map(|seat| {
                let name = self
                    .base
                    .is_occupant(seat)
                    .then(|| directory.display_name(seat))
                    .flatten()
                    .unwrap_or_else(|| seat.to_string());
                (name, u32::from(winner == Some(seat)))
            })
            .collect();
        tracing::info!(area = %self.base.id(), game = %game.id(), "game concluded");
        self.history.push(HistoryEntry {
            game_id: game.id().clone(),
            scores,
        });
    }

    pub fn to_model(&self) -> GameAreaModel<R::Piece> {
        GameAreaModel {
            id: self.base.id().clone(),
            occupants: self.base.occupants().to_vec(),
            game: self.game.as_ref().map(Game::to_model),
            history: self.history.clone(),
        }
    }
}
