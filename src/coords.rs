//! Translation between board squares and screen cells.
//!
//! A `Square` is a file/rank pair in board space (a1 = file 0, rank 0).
//! A `Cell` is a column/row pair in screen space, row 0 at the top.
//! The mapping depends only on whether the board is flipped.

use std::fmt;

use crate::error::InvalidCoordinate;

/// A board square, file and rank both in `0..8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Square {
    file: u8,
    rank: u8,
}

impl Square {
    /// Creates a square, rejecting anything off the board.
    pub fn new(file: u8, rank: u8) -> Result<Self, InvalidCoordinate> {
        if file < 8 && rank < 8 {
            Ok(Square { file, rank })
        } else {
            Err(InvalidCoordinate::Square { file, rank })
        }
    }

    /// Builds a square from an engine-native index (a1 = 0, h8 = 63).
    pub fn from_index(index: u8) -> Result<Self, InvalidCoordinate> {
        if index < 64 {
            Ok(Square { file: index % 8, rank: index / 8 })
        } else {
            Err(InvalidCoordinate::Index(index))
        }
    }

    /// Index that is known to be on the board, e.g. from the rules engine.
    pub(crate) fn from_board_index(index: u8) -> Self {
        debug_assert!(index < 64);
        Square { file: index & 7, rank: (index >> 3) & 7 }
    }

    pub fn file(self) -> u8 {
        self.file
    }

    pub fn rank(self) -> u8 {
        self.rank
    }

    pub fn index(self) -> u8 {
        self.rank * 8 + self.file
    }

    /// Parses algebraic notation such as `e4`.
    pub fn parse(name: &str) -> Option<Self> {
        let bytes = name.as_bytes();
        if bytes.len() != 2 {
            return None;
        }
        let file = bytes[0].checked_sub(b'a')?;
        let rank = bytes[1].checked_sub(b'1')?;
        Square::new(file, rank).ok()
    }

    /// All 64 squares, a1 first.
    pub fn all() -> impl Iterator<Item = Square> {
        (0..64u8).map(|i| Square { file: i % 8, rank: i / 8 })
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", (b'a' + self.file) as char, self.rank + 1)
    }
}

/// A screen cell, column and row both in `0..8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    col: u8,
    row: u8,
}

impl Cell {
    pub fn new(col: u8, row: u8) -> Result<Self, InvalidCoordinate> {
        if col < 8 && row < 8 {
            Ok(Cell { col, row })
        } else {
            Err(InvalidCoordinate::Cell { col, row })
        }
    }

    pub fn col(self) -> u8 {
        self.col
    }

    pub fn row(self) -> u8 {
        self.row
    }
}

/// A point in board-widget pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Point { x, y }
    }
}

/// Maps squares to cells and cells to pixels for a given square size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
    square_size: f32,
}

impl CoordinateMapper {
    pub fn new(square_size: f32) -> Self {
        debug_assert!(square_size > 0.0);
        CoordinateMapper { square_size }
    }

    pub fn square_size(&self) -> f32 {
        self.square_size
    }

    /// Screen cell showing `square`.
    ///
    /// Unflipped, White's first rank is the bottom row. Flipped, files and
    /// ranks are both mirrored so Black's first rank is at the bottom.
    pub fn square_to_cell(square: Square, flipped: bool) -> Cell {
        if flipped {
            Cell { col: 7 - square.file, row: square.rank }
        } else {
            Cell { col: square.file, row: 7 - square.rank }
        }
    }

    /// Board square shown in `cell`; the inverse of [`square_to_cell`].
    ///
    /// [`square_to_cell`]: CoordinateMapper::square_to_cell
    pub fn cell_to_square(cell: Cell, flipped: bool) -> Square {
        if flipped {
            Square { file: 7 - cell.col, rank: cell.row }
        } else {
            Square { file: cell.col, rank: 7 - cell.row }
        }
    }

    /// Top-left pixel of `square`.
    pub fn square_origin(&self, square: Square, flipped: bool) -> Point {
        let cell = Self::square_to_cell(square, flipped);
        Point::new(cell.col as f32 * self.square_size, cell.row as f32 * self.square_size)
    }

    /// Centre pixel of `square`, used as arrow endpoints.
    pub fn square_center(&self, square: Square, flipped: bool) -> Point {
        let origin = self.square_origin(square, flipped);
        let half = self.square_size / 2.0;
        Point::new(origin.x + half, origin.y + half)
    }

    /// Cell under a pixel, or `None` when the point is off the board.
    pub fn cell_at(&self, point: Point) -> Option<Cell> {
        if point.x < 0.0 || point.y < 0.0 {
            return None;
        }
        let col = (point.x / self.square_size).floor();
        let row = (point.y / self.square_size).floor();
        if col < 8.0 && row < 8.0 {
            Cell::new(col as u8, row as u8).ok()
        } else {
            None
        }
    }

    /// Square under a pixel, or `None` when the point is off the board.
    pub fn square_at(&self, point: Point, flipped: bool) -> Option<Square> {
        self.cell_at(point).map(|cell| Self::cell_to_square(cell, flipped))
    }
}

impl Default for CoordinateMapper {
    fn default() -> Self {
        CoordinateMapper::new(70.0)
    }
}
