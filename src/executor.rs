//! The single path every move takes onto the board.
//!
//! Human clicks, engine replies and imported records all end in
//! [`MoveExecutor::commit`], so SAN, capture accounting, history and
//! highlights are kept the same way whatever produced the move.

use log::{debug, info};

use crate::coords::Square;
use crate::error::{ControllerError, RulesError};
use crate::history::{GameContext, MoveHistoryNavigator, MoveRecord};
use crate::rules::{Move, Piece, RulesEngine, Side};

/// How the game ended, if it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameResult {
    Checkmate { winner: Side },
    Stalemate,
}

impl GameResult {
    /// PGN result token.
    pub fn result_token(self) -> &'static str {
        match self {
            GameResult::Checkmate { winner: Side::White } => "1-0",
            GameResult::Checkmate { winner: Side::Black } => "0-1",
            GameResult::Stalemate => "1/2-1/2",
        }
    }
}

/// A move that made it into the history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed {
    pub record: MoveRecord,
    pub result: Option<GameResult>,
}

/// Result of offering a from/to pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt {
    Committed(Committed),
    /// A pawn reaches the last rank; nothing was played yet.
    NeedsPromotion { from: Square, to: Square },
}

pub struct MoveExecutor<'a> {
    ctx: GameContext<'a>,
    history: &'a mut MoveHistoryNavigator,
}

impl<'a> MoveExecutor<'a> {
    pub fn new(ctx: GameContext<'a>, history: &'a mut MoveHistoryNavigator) -> Self {
        MoveExecutor { ctx, history }
    }

    /// Plays `from` -> `to` if it is legal, or asks for a promotion piece.
    pub fn attempt(&mut self, from: Square, to: Square) -> Result<Attempt, ControllerError> {
        self.ensure_at_tip()?;
        let candidates: Vec<Move> = self
            .ctx
            .rules
            .legal_moves()
            .into_iter()
            .filter(|m| m.from == from && m.to == to)
            .collect();
        match candidates.first() {
            None => Err(ControllerError::IllegalMove { from, to }),
            Some(_) if candidates.iter().any(|m| m.promotion.is_some()) => {
                debug!("{}{} needs a promotion piece", from, to);
                Ok(Attempt::NeedsPromotion { from, to })
            }
            Some(&mv) => self.commit(mv).map(Attempt::Committed),
        }
    }

    /// Records and plays a fully specified move.
    pub fn commit(&mut self, mv: Move) -> Result<Committed, ControllerError> {
        self.ensure_at_tip()?;
        let rules = &mut *self.ctx.rules;
        let side = rules.side_to_move();
        let san = rules.san_of(mv).map_err(|e| illegal(e, mv))?;
        let captured = captured_piece(rules, mv)?;
        rules.push(mv).map_err(|e| illegal(e, mv))?;

        let result = terminal_state(rules);
        let record = MoveRecord { mv, san, side, captured };
        debug!("commit {} ({})", record.san, mv);
        self.ctx.overlays.clear_legal_markers();
        self.history.append(record.clone(), &mut self.ctx);

        if let Some(result) = result {
            info!("game over after {}: {:?}", record.san, result);
        }
        Ok(Committed { record, result })
    }

    fn ensure_at_tip(&self) -> Result<(), ControllerError> {
        if self.history.is_navigating() {
            return Err(ControllerError::StaleHistory {
                shown: self.history.plies_shown(),
                total: self.history.len(),
            });
        }
        Ok(())
    }
}

/// Checkmate or stalemate in the rules engine's current position.
pub fn terminal_state(rules: &dyn RulesEngine) -> Option<GameResult> {
    if rules.is_checkmate() {
        Some(GameResult::Checkmate { winner: rules.side_to_move().opposite() })
    } else if rules.is_stalemate() {
        Some(GameResult::Stalemate)
    } else {
        None
    }
}

/// Piece a move will remove. An en passant victim stands on the target's
/// file and the mover's rank.
fn captured_piece(rules: &dyn RulesEngine, mv: Move) -> Result<Option<Piece>, ControllerError> {
    if rules.is_en_passant(mv) {
        let victim = Square::new(mv.to.file(), mv.from.rank())?;
        return Ok(rules.piece_at(victim));
    }
    if rules.is_capture(mv) {
        return Ok(rules.piece_at(mv.to));
    }
    Ok(None)
}

fn illegal(err: RulesError, mv: Move) -> ControllerError {
    match err {
        RulesError::IllegalMove(_) => ControllerError::IllegalMove { from: mv.from, to: mv.to },
        other => ControllerError::Rules(other),
    }
}
