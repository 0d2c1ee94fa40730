//! Replaying a game record onto the board.

use log::{info, warn};

use crate::error::ControllerError;
use crate::executor::{GameResult, MoveExecutor};
use crate::history::{GameContext, MoveHistoryNavigator};
use crate::record::GameRecord;
use crate::rules::{chess960_fen, STANDARD_CHESS960_NUMBER, STARTING_FEN};

/// What an import put on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub plies: usize,
    pub result: Option<GameResult>,
}

pub struct GameImporter<'a> {
    ctx: GameContext<'a>,
    history: &'a mut MoveHistoryNavigator,
}

impl<'a> GameImporter<'a> {
    pub fn new(ctx: GameContext<'a>, history: &'a mut MoveHistoryNavigator) -> Self {
        GameImporter { ctx, history }
    }

    /// Starts over from the record's initial position and commits its moves
    /// in order. The first move that fails stops the replay with
    /// `CorruptImport`; moves committed before it stay in the history.
    pub fn import(self, record: &GameRecord) -> Result<ImportSummary, ControllerError> {
        let GameImporter { mut ctx, history } = self;
        let start = match record.starting_fen() {
            Some(fen) => fen.to_string(),
            None if record.is_chess960() => {
                chess960_fen(STANDARD_CHESS960_NUMBER).unwrap_or_else(|| STARTING_FEN.to_string())
            }
            None => STARTING_FEN.to_string(),
        };
        ctx.rules.from_position_string(&start)?;
        ctx.overlays.clear_legal_markers();
        history.clear(&mut ctx);

        let mut executor = MoveExecutor::new(ctx, history);
        let mut result = None;
        for (ply, &mv) in record.moves.iter().enumerate() {
            match executor.commit(mv) {
                Ok(committed) => result = committed.result,
                Err(e) => {
                    warn!("import of {:?} stopped at ply {}: {}", record.title(), ply, e);
                    return Err(ControllerError::CorruptImport { ply, reason: e.to_string() });
                }
            }
        }
        if let Some(token) = &record.unresolved {
            let ply = record.moves.len();
            warn!("import of {:?} stopped at ply {}: {:?}", record.title(), ply, token);
            return Err(ControllerError::CorruptImport { ply, reason: format!("cannot play {}", token) });
        }
        info!("imported {} ({} plies)", record.title(), record.moves.len());
        Ok(ImportSummary { plies: record.moves.len(), result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::captures::CapturedPiecesTracker;
    use crate::overlay::OverlayManager;
    use crate::record::read_games;
    use crate::rules::{Move, RulesEngine, ShakmatyRules};

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

        fn import(&mut self, record: &GameRecord) -> Result<ImportSummary, ControllerError> {
            let ctx = GameContext {
                rules: &mut self.rules,
                overlays: &mut self.overlays,
                captures: &mut self.captures,
            };
            GameImporter::new(ctx, &mut self.history).import(record)
        }
    }

    fn record_of(moves: &[&str]) -> GameRecord {
        GameRecord {
            moves: moves.iter().map(|m| Move::from_uci(m).unwrap()).collect(),
            ..GameRecord::default()
        }
    }

    #[test]
    fn test_import_replaces_current_game() {
        let mut fx = Fixture::new();
        fx.import(&record_of(&["d2d4"])).unwrap();
        let summary = fx.import(&record_of(&["e2e4", "e7e5", "g1f3", "b8c6"])).unwrap();
        assert_eq!(summary, ImportSummary { plies: 4, result: None });
        let sans: Vec<&str> = fx.history.records().iter().map(|r| r.san.as_str()).collect();
        assert_eq!(sans, vec!["e4", "e5", "Nf3", "Nc6"]);
        assert_eq!(fx.rules.ply_count(), 4);
    }

    #[test]
    fn test_illegal_move_keeps_partial_history() {
        let mut fx = Fixture::new();
        let err = fx.import(&record_of(&["e2e4", "e7e5", "g1f3", "e1e3", "b8c6"])).unwrap_err();
        assert!(matches!(err, ControllerError::CorruptImport { ply: 3, .. }));
        assert_eq!(fx.history.len(), 3);
        assert_eq!(fx.rules.ply_count(), 3);
    }

    #[test]
    fn test_unresolved_token_reported() {
        let mut fx = Fixture::new();
        let games = read_games("1. e4 e5 2. Nf3 Ke3 *");
        let err = fx.import(&games[0]).unwrap_err();
        assert!(matches!(err, ControllerError::CorruptImport { ply: 3, .. }));
        assert_eq!(fx.history.len(), 3);
    }

    #[test]
    fn test_import_from_fen_tag_with_result() {
        let mut fx = Fixture::new();
        let games = read_games("[FEN \"7k/8/5K2/6Q1/8/8/8/8 w - - 0 1\"]\n\n1. Qg6 1/2-1/2\n");
        let summary = fx.import(&games[0]).unwrap();
        assert_eq!(summary.result, Some(GameResult::Stalemate));
        fx.rules.reset();
        assert_eq!(fx.rules.to_position_string(), "7k/8/5K2/6Q1/8/8/8/8 w - - 0 1");
    }
}
