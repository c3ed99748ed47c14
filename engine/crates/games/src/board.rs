use crate::model::GameMove;

/// The four line axes: horizontal, vertical, and both diagonals.
const AXES: [(isize, isize); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];

/// Rectangular grid of optional pieces, row 0 at the top.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board<P> {
    rows: usize,
    cols: usize,
    cells: Vec<Option<P>>,
}

impl<P: Copy + PartialEq> Board<P> {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![None; rows * cols],
        }
    }

    /// Rebuild a board by replaying accepted moves in order.
    pub fn from_moves(rows: usize, cols: usize, moves: &[GameMove<P>]) -> Self {
        let mut board = Self::new(rows, cols);
        for mv in moves {
            board.place(mv.row, mv.col, mv.game_piece);
        }
        board
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn in_bounds(&self, row: usize, col: usize) -> bool {
        row < self.rows && col < self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> Option<P> {
        if !self.in_bounds(row, col) {
            return None;
        }
        self.cells[row * self.cols + col]
    }

    /// Place a piece. Out-of-bounds placements are ignored.
    pub fn place(&mut self, row: usize, col: usize, piece: P) {
        if self.in_bounds(row, col) {
            self.cells[row * self.cols + col] = Some(piece);
        }
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }

    /// Lowest empty row of a column (largest row index), or None if the column
    /// is full or out of bounds.
    pub fn lowest_empty_row(&self, col: usize) -> Option<usize> {
        if col >= self.cols {
            return None;
        }
        (0..self.rows).rev().find(|&row| self.get(row, col).is_none())
    }

    /// True if the piece at `(row, col)` is part of a run of at least `len`
    /// equal pieces along any axis.
    pub fn has_line_through(&self, row: usize, col: usize, len: usize) -> bool {
        let Some(piece) = self.get(row, col) else {
            return false;
        };
        AXES.iter().any(|&(dr, dc)| {
            let run = 1 + self.run_length(row, col, dr, dc, piece) + self.run_length(row, col, -dr, -dc, piece);
            run >= len
        })
    }

    fn run_length(&self, row: usize, col: usize, dr: isize, dc: isize, piece: P) -> usize {
        let mut count = 0;
        let (mut r, mut c) = (row as isize, col as isize);
        loop {
            r += dr;
            c += dc;
            if r < 0 || c < 0 {
                break;
            }
            match self.get(r as usize, c as usize) {
                Some(p) if p == piece => count += 1,
                _ => break,
            }
        }
        count
    }
}
