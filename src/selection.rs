//! Which square the user picked up and where it may go.

use crate::coords::Square;
use crate::overlay::OverlayManager;
use crate::rules::RulesEngine;

/// What a click on the board means for the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionStep {
    /// A piece of the side to move is now selected.
    Selected(Square),
    /// The selected square was clicked again.
    Cleared,
    /// Empty square or enemy piece with nothing selected.
    Ignored,
    /// A piece was selected and the click names its target.
    MoveRequested { from: Square, to: Square },
}

#[derive(Debug, Clone, Default)]
pub struct SelectionController {
    selected: Option<Square>,
    destinations: Vec<Square>,
}

impl SelectionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> Option<Square> {
        self.selected
    }

    pub fn destinations(&self) -> &[Square] {
        &self.destinations
    }

    /// Selects `square` if it holds a piece of the side to move and fills
    /// the legal-move markers. Anything else leaves the selection alone.
    pub fn select(&mut self, square: Square, rules: &dyn RulesEngine, overlays: &mut OverlayManager) -> bool {
        match rules.piece_at(square) {
            Some(piece) if piece.side == rules.side_to_move() => {}
            _ => return false,
        }
        self.selected = Some(square);
        self.destinations.clear();
        for mv in rules.legal_moves().into_iter().filter(|m| m.from == square) {
            if !self.destinations.contains(&mv.to) {
                self.destinations.push(mv.to);
            }
        }
        overlays.set_legal_markers(self.destinations.iter().copied());
        true
    }

    pub fn clear(&mut self, overlays: &mut OverlayManager) {
        self.selected = None;
        self.destinations.clear();
        overlays.clear_legal_markers();
    }

    /// Interprets a click on `square`.
    ///
    /// A legal destination of the selected piece always requests the move;
    /// another piece of the side to move takes over the selection.
    pub fn click(&mut self, square: Square, rules: &dyn RulesEngine, overlays: &mut OverlayManager) -> SelectionStep {
        let Some(from) = self.selected else {
            return if self.select(square, rules, overlays) {
                SelectionStep::Selected(square)
            } else {
                SelectionStep::Ignored
            };
        };
        if from == square {
            self.clear(overlays);
            return SelectionStep::Cleared;
        }
        if !self.destinations.contains(&square) && self.select(square, rules, overlays) {
            return SelectionStep::Selected(square);
        }
        SelectionStep::MoveRequested { from, to: square }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{Move, ShakmatyRules};

    fn sq(name: &str) -> Square {
        Square::parse(name).unwrap()
    }

    #[test]
    fn test_select_own_piece_fills_markers() {
        let rules = ShakmatyRules::new();
        let mut overlays = OverlayManager::new();
        let mut selection = SelectionController::new();
        assert!(selection.select(sq("g1"), &rules, &mut overlays));
        let mut dests = selection.destinations().to_vec();
        dests.sort();
        assert_eq!(dests, vec![sq("f3"), sq("h3")]);
        assert_eq!(overlays.legal_markers().len(), 2);
    }

    #[test]
    fn test_select_rejects_empty_and_enemy_squares() {
        let rules = ShakmatyRules::new();
        let mut overlays = OverlayManager::new();
        let mut selection = SelectionController::new();
        assert!(!selection.select(sq("e4"), &rules, &mut overlays));
        assert!(!selection.select(sq("e7"), &rules, &mut overlays));
        assert_eq!(selection.selected(), None);
        assert!(overlays.legal_markers().is_empty());
    }

    #[test]
    fn test_click_same_square_toggles_off() {
        let rules = ShakmatyRules::new();
        let mut overlays = OverlayManager::new();
        let mut selection = SelectionController::new();
        assert_eq!(selection.click(sq("e2"), &rules, &mut overlays), SelectionStep::Selected(sq("e2")));
        assert_eq!(selection.click(sq("e2"), &rules, &mut overlays), SelectionStep::Cleared);
        assert_eq!(selection.selected(), None);
        assert!(overlays.legal_markers().is_empty());
    }

    #[test]
    fn test_click_other_own_piece_reselects() {
        let rules = ShakmatyRules::new();
        let mut overlays = OverlayManager::new();
        let mut selection = SelectionController::new();
        selection.click(sq("e2"), &rules, &mut overlays);
        assert_eq!(selection.click(sq("d2"), &rules, &mut overlays), SelectionStep::Selected(sq("d2")));
        assert_eq!(
            selection.click(sq("d4"), &rules, &mut overlays),
            SelectionStep::MoveRequested { from: sq("d2"), to: sq("d4") }
        );
    }

    #[test]
    fn test_enemy_side_cannot_be_selected_after_move() {
        let mut rules = ShakmatyRules::new();
        rules.push(Move::from_uci("e2e4").unwrap()).unwrap();
        let mut overlays = OverlayManager::new();
        let mut selection = SelectionController::new();
        assert_eq!(selection.click(sq("d2"), &rules, &mut overlays), SelectionStep::Ignored);
        assert_eq!(selection.click(sq("d7"), &rules, &mut overlays), SelectionStep::Selected(sq("d7")));
    }
}
