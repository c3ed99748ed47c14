use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::error::GameError;
use crate::game::GameRules;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TicTacToeMark {
    X,
    O,
}

impl fmt::Display for TicTacToeMark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X => f.write_str("X"),
            Self::O => f.write_str("O"),
        }
    }
}

impl FromStr for TicTacToeMark {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "X" => Ok(Self::X),
            "O" => Ok(Self::O),
            _ => Err(GameError::InvalidMove),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TicTacToe;

impl GameRules for TicTacToe {
    type Piece = TicTacToeMark;

    const AREA_KIND: &'static str = "TicTacToeArea";
    const ROWS: usize = 3;
    const COLS: usize = 3;
    const WIN_LENGTH: usize = 3;
    const PIECES: [TicTacToeMark; 2] = [TicTacToeMark::X, TicTacToeMark::O];

    fn validate_move(board: &Board<TicTacToeMark>, row: usize, col: usize) -> Result<(), GameError> {
        if board.get(row, col).is_some() {
            return Err(GameError::BoardPositionNotValid);
        }
        Ok(())
    }
}
