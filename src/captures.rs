//! Captured-piece accounting for display.

use crate::history::MoveRecord;
use crate::rules::{PieceKind, Side};

/// Pieces taken by each side, in the order they were taken.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedPieceTally {
    pub by_white: Vec<PieceKind>,
    pub by_black: Vec<PieceKind>,
}

impl CapturedPieceTally {
    pub fn taken_by(&self, side: Side) -> &[PieceKind] {
        match side {
            Side::White => &self.by_white,
            Side::Black => &self.by_black,
        }
    }

    /// Material White has taken minus material Black has taken.
    pub fn material_balance(&self) -> i32 {
        let sum = |kinds: &[PieceKind]| kinds.iter().map(|k| k.value() as i32).sum::<i32>();
        sum(&self.by_white) - sum(&self.by_black)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CapturedPiecesTracker {
    tally: CapturedPieceTally,
}

impl CapturedPiecesTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `kind` to the pieces taken by `captor`.
    pub fn add_capture(&mut self, captor: Side, kind: PieceKind) {
        match captor {
            Side::White => self.tally.by_white.push(kind),
            Side::Black => self.tally.by_black.push(kind),
        }
    }

    /// Recomputes the tally from scratch over `records`, which must be the
    /// moves from the start of the game up to the shown position.
    pub fn rebuild(&mut self, records: &[MoveRecord]) {
        self.tally = CapturedPieceTally::default();
        for record in records {
            if let Some(piece) = record.captured {
                self.add_capture(record.side, piece.kind);
            }
        }
    }

    pub fn clear(&mut self) {
        self.tally = CapturedPieceTally::default();
    }

    pub fn tally(&self) -> &CapturedPieceTally {
        &self.tally
    }
}
