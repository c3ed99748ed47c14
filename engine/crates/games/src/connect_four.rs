use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::error::GameError;
use crate::game::GameRules;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectFourColor {
    Red,
    Yellow,
}

impl fmt::Display for ConnectFourColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Red => f.write_str("Red"),
            Self::Yellow => f.write_str("Yellow"),
        }
    }
}

impl FromStr for ConnectFourColor {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Red" => Ok(Self::Red),
            "Yellow" => Ok(Self::Yellow),
            _ => Err(GameError::InvalidMove),
        }
    }
}

/// 6x7 gravity board; row 5 is the bottom row. Four in a row wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectFour;

impl GameRules for ConnectFour {
    type Piece = ConnectFourColor;

    const AREA_KIND: &'static str = "ConnectFourArea";
    const ROWS: usize = 6;
    const COLS: usize = 7;
    const WIN_LENGTH: usize = 4;
    const PIECES: [ConnectFourColor; 2] = [ConnectFourColor::Red, ConnectFourColor::Yellow];

    fn validate_move(board: &Board<ConnectFourColor>, row: usize, col: usize) -> Result<(), GameError> {
        match board.lowest_empty_row(col) {
            Some(lowest) if lowest == row => Ok(()),
            _ => Err(GameError::BoardPositionNotValid),
        }
    }
}
