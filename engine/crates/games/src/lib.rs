pub mod board;
pub mod connect_four;
pub mod error;
pub mod game;
pub mod model;
pub mod tic_tac_toe;

pub use connect_four::{ConnectFour, ConnectFourColor};
pub use error::GameError;
pub use game::{Game, GameRules};
pub use model::{GameId, GameInstanceModel, GameMove, GameResult, GameState, GameStatus, MoveRequest};
pub use tic_tac_toe::{TicTacToe, TicTacToeMark};
