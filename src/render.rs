//! The drawing seam between the controller and a front end.
//!
//! The controller pushes state into a [`RenderSurface`] after every change
//! and never reads anything back. [`Scene`] is a surface that just keeps the
//! latest frame, which is what the canvas front end draws from.

use crate::captures::CapturedPieceTally;
use crate::coords::Square;
use crate::history::MoveRow;
use crate::overlay::{OverlayKind, OverlayManager};
use crate::rules::{Piece, RulesEngine, Side};

/// A snapshot of the pieces on the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardView {
    squares: [Option<Piece>; 64],
    side_to_move: Side,
}

impl BoardView {
    pub fn capture(rules: &dyn RulesEngine) -> Self {
        let mut squares = [None; 64];
        for square in Square::all() {
            squares[square.index() as usize] = rules.piece_at(square);
        }
        BoardView { squares, side_to_move: rules.side_to_move() }
    }

    pub fn piece_at(&self, square: Square) -> Option<Piece> {
        self.squares[square.index() as usize]
    }

    pub fn side_to_move(&self) -> Side {
        self.side_to_move
    }

    pub fn pieces(&self) -> impl Iterator<Item = (Square, Piece)> + '_ {
        Square::all().filter_map(move |sq| self.piece_at(sq).map(|p| (sq, p)))
    }
}

impl Default for BoardView {
    fn default() -> Self {
        BoardView { squares: [None; 64], side_to_move: Side::White }
    }
}

pub trait RenderSurface {
    fn draw_squares(&mut self, flipped: bool);

    fn draw_pieces(&mut self, board: &BoardView, flipped: bool);

    fn draw_overlays(&mut self, overlays: &OverlayManager, flipped: bool);

    fn clear_overlays(&mut self, kind: OverlayKind);

    fn draw_selection(&mut self, _selected: Option<Square>) {}

    /// Move table rows and the index of the shown move.
    fn draw_move_list(&mut self, _rows: &[MoveRow], _current: Option<usize>) {}

    fn draw_captured(&mut self, _tally: &CapturedPieceTally) {}

    /// Called once all parts of a frame have been drawn.
    fn present(&mut self) {}
}

/// The most recent frame, kept as data.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub flipped: bool,
    pub board: BoardView,
    pub overlays: OverlayManager,
    pub selected: Option<Square>,
    pub rows: Vec<MoveRow>,
    pub current: Option<usize>,
    pub captured: CapturedPieceTally,
    frames: u64,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of completed frames.
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl RenderSurface for Scene {
    fn draw_squares(&mut self, flipped: bool) {
        self.flipped = flipped;
    }

    fn draw_pieces(&mut self, board: &BoardView, _flipped: bool) {
        self.board = board.clone();
    }

    fn draw_overlays(&mut self, overlays: &OverlayManager, _flipped: bool) {
        self.overlays = overlays.clone();
    }

    fn clear_overlays(&mut self, kind: OverlayKind) {
        match kind {
            OverlayKind::LastMove => self.overlays.clear_last_move(),
            OverlayKind::LegalMoves => self.overlays.clear_legal_markers(),
            OverlayKind::Marks => self.overlays.clear_marks(),
            OverlayKind::Arrows => self.overlays.clear_arrows(),
        }
    }

    fn draw_selection(&mut self, selected: Option<Square>) {
        self.selected = selected;
    }

    fn draw_move_list(&mut self, rows: &[MoveRow], current: Option<usize>) {
        self.rows = rows.to_vec();
        self.current = current;
    }

    fn draw_captured(&mut self, tally: &CapturedPieceTally) {
        self.captured = tally.clone();
    }

    fn present(&mut self) {
        self.frames += 1;
    }
}
