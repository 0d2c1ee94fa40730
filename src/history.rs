//! The ordered list of played moves and which of them the board shows.
//!
//! The navigator is the owner of "which position are we at". The rules
//! engine's live position is a cache of replaying `records[..cursor]` from
//! the starting position, and every transition here keeps it that way.

use log::debug;

use crate::captures::CapturedPiecesTracker;
use crate::error::{ControllerError, RulesError};
use crate::overlay::OverlayManager;
use crate::rules::{Move, Piece, RulesEngine, Side};

/// A committed move with the notation it had when it was played.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRecord {
    pub mv: Move,
    /// SAN, computed against the position before the move.
    pub san: String,
    /// Side that played the move.
    pub side: Side,
    /// Piece removed from the board by the move, if any.
    pub captured: Option<Piece>,
}

/// One line of the move table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRow {
    pub number: usize,
    pub white: Option<String>,
    pub black: Option<String>,
}

/// The mutable game state a history transition has to keep in step.
pub struct GameContext<'a> {
    pub rules: &'a mut dyn RulesEngine,
    pub overlays: &'a mut OverlayManager,
    pub captures: &'a mut CapturedPiecesTracker,
}

#[derive(Debug, Clone, Default)]
pub struct MoveHistoryNavigator {
    records: Vec<MoveRecord>,
    /// Number of records applied to the live position.
    cursor: usize,
}

impl MoveHistoryNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[MoveRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Index of the move the board shows, `None` at the starting position.
    pub fn current_index(&self) -> Option<usize> {
        self.cursor.checked_sub(1)
    }

    /// Number of moves applied to the shown position.
    pub fn plies_shown(&self) -> usize {
        self.cursor
    }

    pub fn current_record(&self) -> Option<&MoveRecord> {
        self.current_index().map(|i| &self.records[i])
    }

    /// Records leading to the shown position.
    pub fn shown_records(&self) -> &[MoveRecord] {
        &self.records[..self.cursor]
    }

    pub fn is_at_tip(&self) -> bool {
        self.cursor == self.records.len()
    }

    /// True while the board shows an earlier position than the latest move.
    pub fn is_navigating(&self) -> bool {
        !self.is_at_tip()
    }

    /// Adds a move that has just been pushed to the rules engine. Any moves
    /// after the shown position are dropped first.
    pub fn append(&mut self, record: MoveRecord, ctx: &mut GameContext<'_>) {
        if self.records.len() > self.cursor {
            debug!("dropping {} moves after ply {}", self.records.len() - self.cursor, self.cursor);
            self.records.truncate(self.cursor);
        }
        self.records.push(record);
        self.cursor = self.records.len();
        self.refresh(ctx);
    }

    /// Shows the next move. Returns false at the tip.
    pub fn step_forward(&mut self, ctx: &mut GameContext<'_>) -> Result<bool, RulesError> {
        let Some(record) = self.records.get(self.cursor) else {
            return Ok(false);
        };
        ctx.rules.push(record.mv)?;
        self.cursor += 1;
        self.refresh(ctx);
        Ok(true)
    }

    /// Shows the previous position. Returns false at the start.
    pub fn step_backward(&mut self, ctx: &mut GameContext<'_>) -> bool {
        if self.cursor == 0 {
            return false;
        }
        let popped = ctx.rules.pop();
        debug_assert_eq!(popped, Some(self.records[self.cursor - 1].mv));
        self.cursor -= 1;
        self.refresh(ctx);
        true
    }

    /// Steps one move at a time until the board shows `target`
    /// (`None` for the starting position).
    pub fn jump_to(&mut self, target: Option<usize>, ctx: &mut GameContext<'_>) -> Result<(), ControllerError> {
        let wanted = match target {
            Some(index) if index >= self.records.len() => return Err(ControllerError::OutOfRange(index)),
            Some(index) => index + 1,
            None => 0,
        };
        while self.cursor > wanted {
            self.step_backward(ctx);
        }
        while self.cursor < wanted {
            self.step_forward(ctx)?;
        }
        Ok(())
    }

    /// Permanently removes the latest move. Only allowed at the tip.
    pub fn undo_last(&mut self, ctx: &mut GameContext<'_>) -> Result<Option<MoveRecord>, ControllerError> {
        if !self.is_at_tip() {
            return Err(ControllerError::StaleHistory { shown: self.cursor, total: self.records.len() });
        }
        let Some(record) = self.records.pop() else {
            return Ok(None);
        };
        let popped = ctx.rules.pop();
        debug_assert_eq!(popped, Some(record.mv));
        self.cursor = self.records.len();
        self.refresh(ctx);
        Ok(Some(record))
    }

    /// Forgets every move and returns the rules engine to its start.
    pub fn clear(&mut self, ctx: &mut GameContext<'_>) {
        self.records.clear();
        self.cursor = 0;
        ctx.rules.reset();
        self.refresh(ctx);
    }

    /// Move table rows numbered from `first_number`, the fullmove number of
    /// the starting position. A game starting with Black to move gets an
    /// empty White slot in its first row.
    pub fn move_rows(&self, first_number: usize) -> Vec<MoveRow> {
        let offset = self.black_first() as usize;
        let mut rows: Vec<MoveRow> = Vec::with_capacity((self.records.len() + offset + 1) / 2);
        for (i, record) in self.records.iter().enumerate() {
            let slot = i + offset;
            if slot % 2 == 0 || rows.is_empty() {
                rows.push(MoveRow { number: first_number + rows.len(), white: None, black: None });
            }
            if let Some(row) = rows.last_mut() {
                if slot % 2 == 0 {
                    row.white = Some(record.san.clone());
                } else {
                    row.black = Some(record.san.clone());
                }
            }
        }
        rows
    }

    /// Record index shown in move table cell (`row`, `col`), `col` 0 for
    /// White and 1 for Black.
    pub fn index_for_cell(&self, row: usize, col: usize) -> Option<usize> {
        if col > 1 {
            return None;
        }
        let index = (row * 2 + col).checked_sub(self.black_first() as usize)?;
        (index < self.records.len()).then_some(index)
    }

    fn black_first(&self) -> bool {
        self.records.first().map_or(false, |r| r.side == Side::Black)
    }

    /// Re-derives everything that depends on the shown position.
    fn refresh(&self, ctx: &mut GameContext<'_>) {
        debug_assert_eq!(ctx.rules.ply_count(), self.cursor);
        match self.current_record() {
            Some(record) => ctx.overlays.set_last_move(record.mv.from, record.mv.to),
            None => ctx.overlays.clear_last_move(),
        }
        ctx.captures.rebuild(self.shown_records());
        ctx.overlays.clear_arrows();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Square;
    use crate::rules::ShakmatyRules;

    struct Fixture {
        rules: ShakmatyRules,
        overlays: OverlayManager,
        captures: CapturedPiecesTracker,
        history: MoveHistoryNavigator,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture {
                rules: ShakmatyRules::new(),
                overlays: OverlayManager::new(),
                captures: CapturedPiecesTracker::new(),
                history: MoveHistoryNavigator::new(),
            }
        }

        fn play(&mut self, uci: &str) {
            let mv = Move::from_uci(uci).unwrap();
            let side = self.rules.side_to_move();
            let san = self.rules.san_of(mv).unwrap();
            let captured = self.rules.piece_at(mv.to);
            self.rules.push(mv).unwrap();
            let record = MoveRecord { mv, san, side, captured };
            let mut ctx = GameContext {
                rules: &mut self.rules,
                overlays: &mut self.overlays,
                captures: &mut self.captures,
            };
            self.history.append(record, &mut ctx);
        }

        fn with_ctx<T>(&mut self, f: impl FnOnce(&mut MoveHistoryNavigator, &mut GameContext<'_>) -> T) -> T {
            let mut ctx = GameContext {
                rules: &mut self.rules,
                overlays: &mut self.overlays,
                captures: &mut self.captures,
            };
            f(&mut self.history, &mut ctx)
        }
    }

    fn sq(name: &str) -> Square {
        Square::parse(name).unwrap()
    }

    #[test]
    fn test_step_back_to_start_restores_initial_position() {
        let mut fx = Fixture::new();
        let start = fx.rules.to_position_string();
        for m in ["e2e4", "d7d5", "e4d5", "d8d5", "b1c3"] {
            fx.play(m);
        }
        let steps = fx.history.len();
        for _ in 0..steps {
            assert!(fx.with_ctx(|h, ctx| h.step_backward(ctx)));
        }
        assert!(!fx.with_ctx(|h, ctx| h.step_backward(ctx)));
        assert_eq!(fx.rules.to_position_string(), start);
        assert_eq!(fx.history.current_index(), None);
        assert_eq!(fx.overlays.last_move(), None);
        assert!(fx.captures.tally().by_white.is_empty());
    }

    #[test]
    fn test_append_after_stepping_back_prunes_redo_branch() {
        let mut fx = Fixture::new();
        for m in ["e2e4", "e7e5", "g1f3", "b8c6"] {
            fx.play(m);
        }
        fx.with_ctx(|h, ctx| {
            h.step_backward(ctx);
            h.step_backward(ctx);
        });
        assert!(fx.history.is_navigating());
        fx.play("f1c4");
        let sans: Vec<&str> = fx.history.records().iter().map(|r| r.san.as_str()).collect();
        assert_eq!(sans, vec!["e4", "e5", "Bc4"]);
        assert!(fx.history.is_at_tip());
        assert_eq!(fx.history.move_rows(1).len(), 2);
    }

    #[test]
    fn test_highlights_follow_cursor() {
        let mut fx = Fixture::new();
        for m in ["e2e4", "e7e5", "g1f3"] {
            fx.play(m);
        }
        assert_eq!(fx.overlays.last_move(), Some((sq("g1"), sq("f3"))));
        fx.with_ctx(|h, ctx| h.jump_to(Some(0), ctx)).unwrap();
        assert_eq!(fx.overlays.last_move(), Some((sq("e2"), sq("e4"))));
        fx.with_ctx(|h, ctx| h.jump_to(Some(2), ctx)).unwrap();
        assert_eq!(fx.overlays.last_move(), Some((sq("g1"), sq("f3"))));
        assert_eq!(
            fx.with_ctx(|h, ctx| h.jump_to(Some(3), ctx)),
            Err(ControllerError::OutOfRange(3))
        );
    }

    #[test]
    fn test_navigation_clears_arrows() {
        let mut fx = Fixture::new();
        fx.play("e2e4");
        let mapper = crate::coords::CoordinateMapper::default();
        fx.overlays.begin_arrow(sq("d2"), crate::overlay::MarkColor::Blue, &mapper, false);
        fx.overlays.update_arrow_end(mapper.square_center(sq("d4"), false));
        fx.overlays.commit_arrow(&mapper, false);
        assert_eq!(fx.overlays.arrows().len(), 1);
        fx.with_ctx(|h, ctx| h.step_backward(ctx));
        assert!(fx.overlays.arrows().is_empty());
    }

    #[test]
    fn test_undo_last_requires_tip() {
        let mut fx = Fixture::new();
        fx.play("e2e4");
        fx.play("e7e5");
        fx.with_ctx(|h, ctx| h.step_backward(ctx));
        assert_eq!(
            fx.with_ctx(|h, ctx| h.undo_last(ctx)),
            Err(ControllerError::StaleHistory { shown: 1, total: 2 })
        );
        fx.with_ctx(|h, ctx| h.step_forward(ctx)).unwrap();
        let undone = fx.with_ctx(|h, ctx| h.undo_last(ctx)).unwrap();
        assert_eq!(undone.map(|r| r.san), Some(String::from("e5")));
        assert_eq!(fx.history.len(), 1);
        assert_eq!(fx.rules.ply_count(), 1);
        assert_eq!(fx.overlays.last_move(), Some((sq("e2"), sq("e4"))));
    }

    #[test]
    fn test_captures_independent_of_navigation_path() {
        let mut fx = Fixture::new();
        for m in ["e2e4", "d7d5", "e4d5", "d8d5", "b1c3", "d5a2", "a1a2"] {
            fx.play(m);
        }
        let forward = fx.captures.tally().clone();
        fx.with_ctx(|h, ctx| {
            h.jump_to(Some(2), ctx).unwrap();
            h.step_backward(ctx);
            h.step_forward(ctx).unwrap();
            h.jump_to(None, ctx).unwrap();
            h.jump_to(Some(6), ctx).unwrap();
        });
        assert_eq!(fx.captures.tally(), &forward);
        assert_eq!(forward.by_white, vec![crate::rules::PieceKind::Pawn, crate::rules::PieceKind::Queen]);
        assert_eq!(forward.by_black, vec![crate::rules::PieceKind::Pawn, crate::rules::PieceKind::Pawn]);
    }

    #[test]
    fn test_move_rows_for_black_first_game() {
        let mut fx = Fixture::new();
        fx.rules.from_position_string("4k3/8/8/8/8/8/4P3/4K3 b - - 0 12").unwrap();
        fx.play("e8d8");
        fx.play("e2e4");
        fx.play("d8e8");
        let rows = fx.history.move_rows(12);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], MoveRow { number: 12, white: None, black: Some(String::from("Kd8")) });
        assert_eq!(rows[1].number, 13);
        assert_eq!(rows[1].white.as_deref(), Some("e4"));
        assert_eq!(fx.history.index_for_cell(0, 0), None);
        assert_eq!(fx.history.index_for_cell(0, 1), Some(0));
        assert_eq!(fx.history.index_for_cell(1, 1), Some(2));
        assert_eq!(fx.history.index_for_cell(2, 0), None);
    }
}
