//! Transient annotations drawn over the board.
//!
//! Four stores with separate lifecycles: the last-move highlight, the legal
//! destination markers of the current selection, persistent coloured square
//! marks, and user-drawn arrows. Everything is kept in board squares and
//! mapped to pixels at draw time; only the arrow being dragged holds a raw
//! pointer position.

use std::collections::BTreeMap;

use crate::coords::{CoordinateMapper, Point, Square};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MarkColor {
    Blue,
    Red,
    Orange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverlayKind {
    LastMove,
    LegalMoves,
    Marks,
    Arrows,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arrow {
    pub from: Square,
    pub to: Square,
    pub color: MarkColor,
}

impl Arrow {
    /// Pixel endpoints, square centre to square centre.
    pub fn endpoints(&self, mapper: &CoordinateMapper, flipped: bool) -> (Point, Point) {
        (mapper.square_center(self.from, flipped), mapper.square_center(self.to, flipped))
    }
}

/// An arrow still following the pointer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DraftArrow {
    pub from: Square,
    pub end: Point,
    pub color: MarkColor,
}

/// What releasing the pointer did to the arrow list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrowCommit {
    Added(Arrow),
    Removed(Arrow),
    Discarded,
}

#[derive(Debug, Clone, Default)]
pub struct OverlayManager {
    last_move: Option<(Square, Square)>,
    legal_markers: Vec<Square>,
    marks: BTreeMap<Square, MarkColor>,
    arrows: Vec<Arrow>,
    draft: Option<DraftArrow>,
}

impl OverlayManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_last_move(&mut self, from: Square, to: Square) {
        self.last_move = Some((from, to));
    }

    pub fn clear_last_move(&mut self) {
        self.last_move = None;
    }

    pub fn last_move(&self) -> Option<(Square, Square)> {
        self.last_move
    }

    /// Replaces the destination markers. Promotions put the same square in
    /// the list several times; each square is kept once.
    pub fn set_legal_markers<I>(&mut self, squares: I)
    where
        I: IntoIterator<Item = Square>,
    {
        self.legal_markers.clear();
        for square in squares {
            if !self.legal_markers.contains(&square) {
                self.legal_markers.push(square);
            }
        }
    }

    pub fn clear_legal_markers(&mut self) {
        self.legal_markers.clear();
    }

    pub fn legal_markers(&self) -> &[Square] {
        &self.legal_markers
    }

    /// Removes the mark when `square` already carries `color`, otherwise
    /// puts `color` there. Returns whether the square is marked afterwards.
    pub fn toggle_mark(&mut self, square: Square, color: MarkColor) -> bool {
        if self.marks.get(&square) == Some(&color) {
            self.marks.remove(&square);
            false
        } else {
            self.marks.insert(square, color);
            true
        }
    }

    pub fn remove_mark(&mut self, square: Square) -> bool {
        self.marks.remove(&square).is_some()
    }

    pub fn clear_marks(&mut self) {
        self.marks.clear();
    }

    pub fn mark_at(&self, square: Square) -> Option<MarkColor> {
        self.marks.get(&square).copied()
    }

    pub fn marks(&self) -> impl Iterator<Item = (Square, MarkColor)> + '_ {
        self.marks.iter().map(|(sq, color)| (*sq, *color))
    }

    /// Starts an arrow gesture anchored at the centre of `square`.
    pub fn begin_arrow(&mut self, square: Square, color: MarkColor, mapper: &CoordinateMapper, flipped: bool) {
        self.draft = Some(DraftArrow {
            from: square,
            end: mapper.square_center(square, flipped),
            color,
        });
    }

    pub fn update_arrow_end(&mut self, point: Point) {
        if let Some(draft) = self.draft.as_mut() {
            draft.end = point;
        }
    }

    /// Ends the gesture. The end point snaps to the square under it; an
    /// arrow that starts and ends on one square or leaves the board is
    /// dropped, and drawing an existing arrow again erases it.
    pub fn commit_arrow(&mut self, mapper: &CoordinateMapper, flipped: bool) -> ArrowCommit {
        let Some(draft) = self.draft.take() else {
            return ArrowCommit::Discarded;
        };
        let Some(to) = mapper.square_at(draft.end, flipped) else {
            return ArrowCommit::Discarded;
        };
        if to == draft.from {
            return ArrowCommit::Discarded;
        }
        let arrow = Arrow { from: draft.from, to, color: draft.color };
        if let Some(pos) = self.arrows.iter().position(|a| *a == arrow) {
            self.arrows.remove(pos);
            ArrowCommit::Removed(arrow)
        } else {
            self.arrows.push(arrow);
            ArrowCommit::Added(arrow)
        }
    }

    pub fn discard_arrow(&mut self) {
        self.draft = None;
    }

    pub fn clear_arrows(&mut self) {
        self.arrows.clear();
        self.draft = None;
    }

    pub fn arrows(&self) -> &[Arrow] {
        &self.arrows
    }

    pub fn draft(&self) -> Option<&DraftArrow> {
        self.draft.as_ref()
    }

    pub fn is_drawing_arrow(&self) -> bool {
        self.draft.is_some()
    }
}
