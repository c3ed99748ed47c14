use std::collections::BTreeMap;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::Serialize;
use session::PlayerId;

use crate::board::Board;
use crate::error::GameError;
use crate::model::{
    GameId, GameInstanceModel, GameMove, GameResult, GameState, GameStatus, MoveRequest,
};

/// Per-game rules plugged into the shared two-seat turn-based contract.
pub trait GameRules {
    type Piece: Copy + Eq + Debug + Serialize + DeserializeOwned + FromStr + Send + Sync + 'static;

    /// Wire type tag of the area hosting this game.
    const AREA_KIND: &'static str;
    const ROWS: usize;
    const COLS: usize;
    const WIN_LENGTH: usize;
    /// Piece held by each seat, in seat order.
    const PIECES: [Self::Piece; 2];

    /// Game-specific placement rule. Bounds and turn order are already checked.
    fn validate_move(board: &Board<Self::Piece>, row: usize, col: usize) -> Result<(), GameError>;

    /// Pick a seat for a joining player. `preferred` holds the seat holders of
    /// the previous game in the same area, if any.
    fn choose_seat(
        seats: &[Option<PlayerId>; 2],
        preferred: &[Option<PlayerId>; 2],
        player: &PlayerId,
    ) -> Result<usize, GameError> {
        if let Some(seat) = preferred.iter().position(|p| p.as_ref() == Some(player)) {
            if seats[seat].is_none() {
                return Ok(seat);
            }
        }
        seats
            .iter()
            .position(Option::is_none)
            .ok_or(GameError::GameFull)
    }

    fn is_winning_move(board: &Board<Self::Piece>, mv: &GameMove<Self::Piece>) -> bool {
        board.has_line_through(mv.row, mv.col, Self::WIN_LENGTH)
    }
}

/// One game instance. Every successful transition swaps in a fresh
/// `GameState`; failed operations leave the state untouched.
#[derive(Debug, Clone)]
pub struct Game<R: GameRules> {
    id: GameId,
    state: GameState<R::Piece>,
    players: Vec<PlayerId>,
    preferred: [Option<PlayerId>; 2],
    prior_first_seat: Option<usize>,
    /// Seat whose holder left mid-game. It stays filled for the result but
    /// carries no claim into the next game.
    forfeited: Option<usize>,
    result: Option<GameResult>,
    rules: PhantomData<fn() -> R>,
}

impl<R: GameRules> Default for Game<R> {
    fn default() -> Self {
        Self::new(None)
    }
}

impl<R: GameRules> Game<R> {
    /// Create a game, optionally linked to the game that preceded it in the
    /// same area so seats and first-mover alternate across rematches.
    pub fn new(prior: Option<&Game<R>>) -> Self {
        let preferred = prior
            .map(|g| {
                let mut seats = g.state.seats.clone();
                if let Some(seat) = g.forfeited {
                    seats[seat] = None;
                }
                seats
            })
            .unwrap_or_default();
        let prior_first_seat = prior.map(|g| g.first_seat());
        let opening = prior_first_seat.map(|s| 1 - s).unwrap_or(0);
        Self {
            id: GameId::generate(),
            state: GameState {
                status: GameStatus::WaitingForPlayers,
                seats: [None, None],
                ready: [false, false],
                first_player: R::PIECES[opening],
                moves: Vec::new(),
                winner: None,
            },
            players: Vec::new(),
            preferred,
            prior_first_seat,
            forfeited: None,
            result: None,
            rules: PhantomData,
        }
    }

    pub fn id(&self) -> &GameId {
        &self.id
    }

    pub fn state(&self) -> &GameState<R::Piece> {
        &self.state
    }

    pub fn status(&self) -> GameStatus {
        self.state.status
    }

    pub fn is_over(&self) -> bool {
        self.state.status == GameStatus::Over
    }

    pub fn players(&self) -> &[PlayerId] {
        &self.players
    }

    pub fn result(&self) -> Option<&GameResult> {
        self.result.as_ref()
    }

    pub fn seat_of(&self, player: &PlayerId) -> Option<usize> {
        self.state
            .seats
            .iter()
            .position(|p| p.as_ref() == Some(player))
    }

    fn first_seat(&self) -> usize {
        R::PIECES
            .iter()
            .position(|p| *p == self.state.first_player)
            .unwrap_or(0)
    }

    pub fn join(&mut self, player: &PlayerId) -> Result<(), GameError> {
        if self.seat_of(player).is_some() {
            return Err(GameError::PlayerAlreadyInGame);
        }
        if self.is_over() {
            return Err(GameError::GameOver);
        }
        let seat = R::choose_seat(&self.state.seats, &self.preferred, player)?;

        let mut seats = self.state.seats.clone();
        seats[seat] = Some(player.clone());
        let status = if seats.iter().all(Option::is_some) {
            GameStatus::WaitingToStart
        } else {
            GameStatus::WaitingForPlayers
        };
        self.state = GameState {
            status,
            seats,
            ..self.state.clone()
        };
        self.players.push(player.clone());
        tracing::debug!(game = %self.id, player = %player, seat, "joined game");
        Ok(())
    }

    pub fn start_game(&mut self, player: &PlayerId) -> Result<(), GameError> {
        if self.state.status != GameStatus::WaitingToStart {
            return Err(GameError::GameNotStartable);
        }
        let seat = self.seat_of(player).ok_or(GameError::PlayerNotInGame)?;

        let mut ready = self.state.ready;
        ready[seat] = true;
        let mut next = GameState {
            ready,
            ..self.state.clone()
        };
        if ready.iter().all(|r| *r) {
            next.status = GameStatus::InProgress;
            next.first_player = R::PIECES[self.opening_seat(&next.seats)];
        }
        self.state = next;
        Ok(())
    }

    // Alternate the opening seat when a returning player kept their seat.
    fn opening_seat(&self, seats: &[Option<PlayerId>; 2]) -> usize {
        let Some(prior_first) = self.prior_first_seat else {
            return 0;
        };
        let kept_seat = self
            .preferred
            .iter()
            .zip(seats.iter())
            .any(|(before, now)| before.is_some() && before == now);
        if kept_seat {
            1 - prior_first
        } else {
            0
        }
    }

    /// Leave the game. Leaving mid-game forfeits to the other seat; leaving
    /// a concluded game is a no-op.
    pub fn leave(&mut self, player: &PlayerId) -> Result<(), GameError> {
        if self.is_over() {
            return Ok(());
        }
        let seat = self.seat_of(player).ok_or(GameError::PlayerNotInGame)?;

        if self.state.status == GameStatus::InProgress {
            self.state = GameState {
                status: GameStatus::Over,
                winner: self.state.seats[1 - seat].clone(),
                ..self.state.clone()
            };
            self.forfeited = Some(seat);
            self.result = Some(self.compute_result());
            tracing::debug!(game = %self.id, player = %player, "forfeit");
            return Ok(());
        }

        let mut seats = self.state.seats.clone();
        let mut ready = self.state.ready;
        seats[seat] = None;
        ready[seat] = false;
        self.state = GameState {
            status: GameStatus::WaitingForPlayers,
            seats,
            ready,
            ..self.state.clone()
        };
        self.players.retain(|p| p != player);
        Ok(())
    }

    pub fn apply_move(
        &mut self,
        player: &PlayerId,
        request: MoveRequest<R::Piece>,
    ) -> Result<(), GameError> {
        if self.state.status != GameStatus::InProgress {
            return Err(GameError::GameNotInProgress);
        }
        let seat = self.seat_of(player).ok_or(GameError::PlayerNotInGame)?;
        let piece = R::PIECES[seat];
        if let Some(claimed) = request.game_piece {
            if claimed != piece {
                tracing::debug!(game = %self.id, ?claimed, ?piece, "ignoring client-declared piece");
            }
        }

        let to_move = (self.first_seat() + self.state.moves.len()) % 2;
        if seat != to_move {
            return Err(GameError::MoveNotYourTurn);
        }

        let mut board = Board::from_moves(R::ROWS, R::COLS, &self.state.moves);
        if !board.in_bounds(request.row, request.col) {
            return Err(GameError::BoardPositionNotValid);
        }
        R::validate_move(&board, request.row, request.col)?;

        let mv = GameMove {
            game_piece: piece,
            row: request.row,
            col: request.col,
        };
        board.place(mv.row, mv.col, mv.game_piece);

        let mut moves = self.state.moves.clone();
        moves.push(mv);
        let mut next = GameState {
            moves,
            ..self.state.clone()
        };
        if R::is_winning_move(&board, &mv) {
            next.status = GameStatus::Over;
            next.winner = Some(player.clone());
        } else if board.is_full() {
            next.status = GameStatus::Over;
            next.winner = None;
        }
        self.state = next;

        if self.is_over() {
            self.result = Some(self.compute_result());
            tracing::debug!(game = %self.id, winner = ?self.state.winner, "game over");
        }
        Ok(())
    }

    fn compute_result(&self) -> GameResult {
        let scores: BTreeMap<PlayerId, u32> = self
            .state
            .seats
            .iter()
            .flatten()
            .map(|p| {
                let score = u32::from(self.state.winner.as_ref() == Some(p));
                (p.clone(), score)
            })
            .collect();
        GameResult {
            game_id: self.id.clone(),
            winner: self.state.winner.clone(),
            scores,
        }
    }

    pub fn to_model(&self) -> GameInstanceModel<R::Piece> {
        GameInstanceModel {
            id: self.id.clone(),
            state: self.state.clone(),
            result: self.result.clone(),
            players: self.players.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connect_four::{ConnectFour, ConnectFourColor};
    use crate::tic_tac_toe::{TicTacToe, TicTacToeMark};

    fn pid(s: &str) -> PlayerId {
        PlayerId::from(s)
    }

    fn at(row: usize, col: usize) -> MoveRequest<TicTacToeMark> {
        MoveRequest {
            row,
            col,
            game_piece: None,
        }
    }

    fn started(a: &str, b: &str) -> Game<TicTacToe> {
        let mut game = Game::<TicTacToe>::new(None);
        game.join(&pid(a)).unwrap();
        game.join(&pid(b)).unwrap();
        game.start_game(&pid(a)).unwrap();
        game.start_game(&pid(b)).unwrap();
        game
    }

    #[test]
    fn join_fills_seats_in_order() {
        let mut game = Game::<TicTacToe>::new(None);
        game.join(&pid("a")).unwrap();
        assert_eq!(game.status(), GameStatus::WaitingForPlayers);
        game.join(&pid("b")).unwrap();
        assert_eq!(game.status(), GameStatus::WaitingToStart);
        assert_eq!(game.seat_of(&pid("a")), Some(0));
        assert_eq!(game.seat_of(&pid("b")), Some(1));
        assert_eq!(game.players(), &[pid("a"), pid("b")]);
    }

    #[test]
    fn join_rejects_duplicates_and_third_player() {
        let mut game = Game::<TicTacToe>::new(None);
        game.join(&pid("a")).unwrap();
        assert_eq!(game.join(&pid("a")), Err(GameError::PlayerAlreadyInGame));
        game.join(&pid("b")).unwrap();
        assert_eq!(game.join(&pid("c")), Err(GameError::GameFull));
        assert_eq!(game.players().len(), 2);
    }

    #[test]
    fn start_requires_both_seats_ready() {
        let mut game = Game::<TicTacToe>::new(None);
        game.join(&pid("a")).unwrap();
        assert_eq!(game.start_game(&pid("a")), Err(GameError::GameNotStartable));
        game.join(&pid("b")).unwrap();
        assert_eq!(game.start_game(&pid("c")), Err(GameError::PlayerNotInGame));
        game.start_game(&pid("a")).unwrap();
        assert_eq!(game.status(), GameStatus::WaitingToStart);
        game.start_game(&pid("b")).unwrap();
        assert_eq!(game.status(), GameStatus::InProgress);
        assert_eq!(game.state().first_player, TicTacToeMark::X);
    }

    #[test]
    fn turns_alternate_from_first_player() {
        let mut game = started("a", "b");
        assert_eq!(game.apply_move(&pid("b"), at(0, 0)), Err(GameError::MoveNotYourTurn));
        game.apply_move(&pid("a"), at(0, 0)).unwrap();
        assert_eq!(game.apply_move(&pid("a"), at(0, 1)), Err(GameError::MoveNotYourTurn));
        game.apply_move(&pid("b"), at(1, 1)).unwrap();
        assert_eq!(game.state().moves.len(), 2);
        assert_eq!(game.state().moves[1].game_piece, TicTacToeMark::O);
    }

    #[test]
    fn failed_move_leaves_state_untouched() {
        let mut game = started("a", "b");
        game.apply_move(&pid("a"), at(0, 0)).unwrap();
        let before = game.state().clone();
        assert_eq!(
            game.apply_move(&pid("b"), at(3, 0)),
            Err(GameError::BoardPositionNotValid)
        );
        assert_eq!(game.state(), &before);
    }

    #[test]
    fn client_piece_is_ignored() {
        let mut game = started("a", "b");
        let req = MoveRequest {
            row: 0,
            col: 0,
            game_piece: Some(TicTacToeMark::O),
        };
        game.apply_move(&pid("a"), req).unwrap();
        assert_eq!(game.state().moves[0].game_piece, TicTacToeMark::X);
    }

    #[test]
    fn moves_before_start_are_rejected() {
        let mut game = Game::<TicTacToe>::new(None);
        game.join(&pid("a")).unwrap();
        assert_eq!(
            game.apply_move(&pid("a"), at(0, 0)),
            Err(GameError::GameNotInProgress)
        );
    }

    #[test]
    fn leave_before_start_vacates_seat() {
        let mut game = Game::<TicTacToe>::new(None);
        game.join(&pid("a")).unwrap();
        game.join(&pid("b")).unwrap();
        game.start_game(&pid("a")).unwrap();
        game.leave(&pid("a")).unwrap();
        assert_eq!(game.status(), GameStatus::WaitingForPlayers);
        assert_eq!(game.seat_of(&pid("a")), None);
        assert_eq!(game.state().ready, [false, false]);
        assert_eq!(game.players(), &[pid("b")]);
        assert_eq!(game.leave(&pid("a")), Err(GameError::PlayerNotInGame));
    }

    #[test]
    fn leave_in_progress_forfeits() {
        let mut game = started("a", "b");
        game.apply_move(&pid("a"), at(0, 0)).unwrap();
        game.leave(&pid("a")).unwrap();
        assert!(game.is_over());
        assert_eq!(game.state().winner, Some(pid("b")));
        let result = game.result().unwrap();
        assert_eq!(result.scores[&pid("b")], 1);
        assert_eq!(result.scores[&pid("a")], 0);
        // Seats are kept so the outcome stays attributable.
        assert_eq!(game.seat_of(&pid("a")), Some(0));
    }

    #[test]
    fn leave_after_over_is_noop() {
        let mut game = started("a", "b");
        game.leave(&pid("b")).unwrap();
        let before = game.state().clone();
        game.leave(&pid("a")).unwrap();
        assert_eq!(game.state(), &before);
        assert_eq!(game.join(&pid("c")), Err(GameError::GameOver));
    }

    #[test]
    fn rematch_keeps_seats_and_alternates_first_mover() {
        let first = started("a", "b");
        assert_eq!(first.state().first_player, TicTacToeMark::X);

        let mut second = Game::<TicTacToe>::new(Some(&first));
        // Join in the opposite order; preferred seats still win.
        second.join(&pid("b")).unwrap();
        second.join(&pid("a")).unwrap();
        assert_eq!(second.seat_of(&pid("a")), Some(0));
        assert_eq!(second.seat_of(&pid("b")), Some(1));
        second.start_game(&pid("a")).unwrap();
        second.start_game(&pid("b")).unwrap();
        assert_eq!(second.state().first_player, TicTacToeMark::O);
        assert_eq!(second.apply_move(&pid("a"), at(0, 0)), Err(GameError::MoveNotYourTurn));
        second.apply_move(&pid("b"), at(0, 0)).unwrap();
    }

    #[test]
    fn rematch_with_new_players_opens_with_seat_zero() {
        let first = started("a", "b");
        let mut second = Game::<TicTacToe>::new(Some(&first));
        second.join(&pid("c")).unwrap();
        second.join(&pid("d")).unwrap();
        second.start_game(&pid("c")).unwrap();
        second.start_game(&pid("d")).unwrap();
        assert_eq!(second.state().first_player, TicTacToeMark::X);
    }

    #[test]
    fn forfeiter_rejoins_as_new_player() {
        let mut first = Game::<ConnectFour>::new(None);
        first.join(&pid("red")).unwrap();
        first.join(&pid("yellow")).unwrap();
        first.start_game(&pid("red")).unwrap();
        first.start_game(&pid("yellow")).unwrap();
        first.leave(&pid("yellow")).unwrap();
        assert_eq!(first.result().unwrap().scores[&pid("red")], 1);

        let mut second = Game::<ConnectFour>::new(Some(&first));
        second.join(&pid("newbie")).unwrap();
        second.join(&pid("yellow")).unwrap();
        assert_eq!(second.seat_of(&pid("newbie")), Some(0));
        assert_eq!(second.seat_of(&pid("yellow")), Some(1));
        second.start_game(&pid("newbie")).unwrap();
        second.start_game(&pid("yellow")).unwrap();
        // No one kept a seat from the last game, so seat zero opens.
        assert_eq!(second.state().first_player, ConnectFourColor::Red);
    }

    #[test]
    fn player_who_stayed_keeps_seat_after_opponent_forfeits() {
        let mut first = started("a", "b");
        first.leave(&pid("a")).unwrap();

        let mut second = Game::<TicTacToe>::new(Some(&first));
        second.join(&pid("a")).unwrap();
        second.join(&pid("b")).unwrap();
        assert_eq!(second.seat_of(&pid("b")), Some(1));
        assert_eq!(second.seat_of(&pid("a")), Some(0));
        second.start_game(&pid("a")).unwrap();
        second.start_game(&pid("b")).unwrap();
        assert_eq!(second.state().first_player, TicTacToeMark::O);
    }

    #[test]
    fn model_carries_result() {
        let mut game = started("a", "b");
        game.leave(&pid("a")).unwrap();
        let model = game.to_model();
        assert_eq!(model.id, *game.id());
        assert_eq!(model.state.status, GameStatus::Over);
        assert_eq!(model.result.unwrap().winner, Some(pid("b")));
    }
}
