use std::sync::Arc;

use boardside::config::EngineSides;
use boardside::engine::{EngineMoveProvider, EngineProcess, EngineRequest, SearchLimit};
use boardside::error::EngineError;
use boardside::executor::GameResult;
use boardside::record::read_games;
use boardside::render::Scene;
use boardside::{BoardController, ControllerError, ControllerState, Move, Outcome, PieceKind, RulesEngine, ShakmatyRules, Side, Square};
use futures::future::BoxFuture;
use futures::FutureExt;

type Controller = BoardController<ShakmatyRules, Scene>;

fn sq(name: &str) -> Square {
    Square::parse(name).unwrap()
}

fn controller() -> Controller {
    BoardController::new(ShakmatyRules::new(), Scene::new())
}

fn play(c: &mut Controller, moves: &[&str]) {
    for text in moves {
        let mv = Move::from_uci(text).unwrap();
        c.click(mv.from).unwrap();
        let outcome = c.click(mv.to).unwrap();
        if let Outcome::PromotionPending { .. } = outcome {
            c.choose_promotion(mv.promotion.unwrap_or(PieceKind::Queen)).unwrap();
        } else {
            assert!(matches!(outcome, Outcome::Moved(_)), "{} was not played: {:?}", text, outcome);
        }
    }
}

fn sans(c: &Controller) -> Vec<String> {
    c.history().records().iter().map(|r| r.san.clone()).collect()
}

#[test]
fn opening_moves_are_recorded_and_highlighted() {
    let mut c = controller();
    play(&mut c, &["e2e4", "e7e5", "g1f3"]);
    assert_eq!(c.history().current_index(), Some(2));
    assert_eq!(sans(&c), vec!["e4", "e5", "Nf3"]);
    assert_eq!(c.overlays().last_move(), Some((sq("g1"), sq("f3"))));
    assert_eq!(c.surface().overlays.last_move(), Some((sq("g1"), sq("f3"))));
    assert_eq!(c.status(), "Black to move");
}

#[test]
fn stepping_back_shows_earlier_position() {
    let mut c = controller();
    play(&mut c, &["e2e4", "e7e5", "g1f3"]);
    c.step_backward().unwrap();
    assert_eq!(c.step_backward().unwrap(), Outcome::Navigated(Some(0)));
    assert_eq!(
        c.rules().to_position_string(),
        "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1"
    );
    assert_eq!(c.overlays().last_move(), Some((sq("e2"), sq("e4"))));
    assert_eq!(c.history().len(), 3);

    assert_eq!(c.step_backward().unwrap(), Outcome::Navigated(None));
    assert_eq!(c.overlays().last_move(), None);
    assert_eq!(c.rules().ply_count(), 0);
    assert_eq!(c.step_backward().unwrap(), Outcome::Navigated(None));
}

#[test]
fn corrupt_import_keeps_valid_prefix() {
    let mut c = controller();
    play(&mut c, &["d2d4"]);
    let games = read_games("[White \"A\"]\n[Black \"B\"]\n\n1. e4 e5 2. Nf3 Ke3 3. Bc4 *\n");
    let err = c.import_game(&games[0]).unwrap_err();
    assert!(matches!(err, ControllerError::CorruptImport { ply: 3, .. }));
    assert_eq!(sans(&c), vec!["e4", "e5", "Nf3"]);
    assert_eq!(c.history().current_index(), Some(2));
    assert_eq!(c.state(), ControllerState::Idle);
}

#[test]
fn flipping_changes_neither_history_nor_captures() {
    let mut c = controller();
    play(&mut c, &["e2e4", "d7d5", "e4d5"]);
    let history = c.history().records().to_vec();
    let tally = c.captures().tally().clone();
    assert_eq!(c.flip(), Outcome::Flipped(true));
    assert_eq!(c.history().records(), history.as_slice());
    assert_eq!(c.captures().tally(), &tally);
    assert_eq!(tally.taken_by(Side::White), &[PieceKind::Pawn]);
    assert_eq!(c.flip(), Outcome::Flipped(false));
}

#[test]
fn cancelled_promotion_plays_nothing() {
    let mut c = BoardController::new(ShakmatyRules::from_fen("7k/P7/8/8/8/8/8/K7 w - - 0 1").unwrap(), Scene::new());
    c.click(sq("a7")).unwrap();
    assert_eq!(c.click(sq("a8")).unwrap(), Outcome::PromotionPending { from: sq("a7"), to: sq("a8") });
    c.cancel_promotion().unwrap();
    assert_eq!(c.rules().ply_count(), 0);
    assert!(c.history().is_empty());
    assert_eq!(c.rules().side_to_move(), Side::White);
}

#[test]
fn en_passant_is_counted_for_the_captor() {
    let mut c = controller();
    play(&mut c, &["e2e4", "a7a6", "e4e5", "d7d5", "e5d6"]);
    assert_eq!(sans(&c).last().map(String::as_str), Some("exd6"));
    assert_eq!(c.captures().tally().taken_by(Side::White), &[PieceKind::Pawn]);
    assert!(c.captures().tally().taken_by(Side::Black).is_empty());
    assert_eq!(c.rules().piece_at(sq("d5")), None);
}

#[test]
fn fools_mate_ends_the_game() {
    let mut c = controller();
    play(&mut c, &["f2f3", "e7e5", "g2g4", "d8h4"]);
    assert_eq!(c.result(), Some(GameResult::Checkmate { winner: Side::Black }));
    assert_eq!(sans(&c).last().map(String::as_str), Some("Qh4#"));
    assert_eq!(c.click(sq("e1")).unwrap(), Outcome::Selected(sq("e1")));
    assert!(c.overlays().legal_markers().is_empty());
    assert!(matches!(c.click(sq("f2")), Err(ControllerError::IllegalMove { .. })));
    assert_eq!(c.history().len(), 4);

    c.step_backward().unwrap();
    assert_eq!(c.result(), None);
    c.step_forward().unwrap();
    assert_eq!(c.result(), Some(GameResult::Checkmate { winner: Side::Black }));
}

#[test]
fn new_move_after_undo_replaces_the_line() {
    let mut c = controller();
    play(&mut c, &["e2e4", "e7e5", "g1f3"]);
    assert!(matches!(c.undo_last().unwrap(), Outcome::Undone(_)));
    play(&mut c, &["b1c3"]);
    assert_eq!(sans(&c), vec!["e4", "e5", "Nc3"]);
}

#[test]
fn moves_away_from_the_latest_position_are_refused() {
    let mut c = controller();
    play(&mut c, &["e2e4", "e7e5"]);
    c.jump_to(None).unwrap();
    assert_eq!(c.click(sq("d2")), Err(ControllerError::StaleHistory { shown: 0, total: 2 }));
    assert_eq!(c.selection().selected(), None);
    assert!(c.overlays().legal_markers().is_empty());
    assert_eq!(c.history().len(), 2);

    c.jump_to(Some(1)).unwrap();
    assert_eq!(c.click(sq("d2")).unwrap(), Outcome::Selected(sq("d2")));
}

#[test]
fn captures_do_not_depend_on_navigation_path() {
    let mut c = controller();
    play(&mut c, &["e2e4", "d7d5", "e4d5", "d8d5", "b1c3", "d5a2", "a1a2"]);
    let at_tip = c.captures().tally().clone();
    assert_eq!(at_tip.taken_by(Side::White), &[PieceKind::Pawn, PieceKind::Queen]);
    assert_eq!(at_tip.taken_by(Side::Black), &[PieceKind::Pawn, PieceKind::Pawn]);

    c.jump_to(Some(3)).unwrap();
    let direct = c.captures().tally().clone();
    c.jump_to(Some(6)).unwrap();
    for _ in 0..3 {
        c.step_backward().unwrap();
    }
    assert_eq!(c.captures().tally(), &direct);
    assert_eq!(direct.taken_by(Side::Black), &[PieceKind::Pawn]);

    c.jump_to(Some(6)).unwrap();
    assert_eq!(c.captures().tally(), &at_tip);
}

struct FixedEngine(&'static str);

impl EngineProcess for FixedEngine {
    fn best_move(&self, _request: EngineRequest) -> BoxFuture<'static, Result<Move, EngineError>> {
        let reply = Move::from_uci(self.0).ok_or(EngineError::NoMove);
        async move { reply }.boxed()
    }
}

fn with_engine(reply: &'static str) -> Controller {
    let provider = EngineMoveProvider::new(Arc::new(FixedEngine(reply)), SearchLimit::default(), Vec::new());
    controller().with_engine(provider, EngineSides { white: false, black: true })
}

#[tokio::test]
async fn engine_reply_goes_through_the_move_path() {
    let mut c = with_engine("e7e5");
    play(&mut c, &["e2e4"]);
    assert!(c.engine_to_move());

    let ticket = c.request_engine_move().unwrap();
    assert_eq!(c.state(), ControllerState::AwaitingEngine { generation: ticket.generation });
    assert_eq!(c.status(), "Engine is thinking...");
    assert_eq!(c.click(sq("d2")), Err(ControllerError::AwaitingEngine));
    assert_eq!(c.step_backward(), Err(ControllerError::AwaitingEngine));

    let reply = ticket.future.await;
    let Outcome::Moved(committed) = c.complete_engine_move(reply).unwrap() else {
        panic!("engine move was not played");
    };
    assert_eq!(committed.record.san, "e5");
    assert_eq!(c.state(), ControllerState::Idle);
    assert!(!c.engine_to_move());
}

#[tokio::test]
async fn superseded_engine_reply_is_discarded() {
    let mut c = with_engine("e7e5");
    play(&mut c, &["e2e4"]);

    let first = c.request_engine_move().unwrap();
    c.cancel_engine();
    assert_eq!(c.state(), ControllerState::Idle);
    let second = c.request_engine_move().unwrap();

    let stale = first.future.await;
    assert_eq!(stale.outcome, Err(EngineError::Cancelled));
    assert_eq!(c.complete_engine_move(stale).unwrap(), Outcome::Discarded);
    assert_eq!(c.state(), ControllerState::AwaitingEngine { generation: second.generation });
    assert_eq!(c.history().len(), 1);

    let fresh = second.future.await;
    assert!(matches!(c.complete_engine_move(fresh).unwrap(), Outcome::Moved(_)));
    assert_eq!(c.history().len(), 2);
}

#[tokio::test]
async fn illegal_engine_reply_is_reported() {
    let mut c = with_engine("e8e6");
    play(&mut c, &["e2e4"]);
    let ticket = c.request_engine_move().unwrap();
    let reply = ticket.future.await;
    assert!(matches!(
        c.complete_engine_move(reply),
        Err(ControllerError::Engine(EngineError::IllegalReply(_)))
    ));
    assert_eq!(c.state(), ControllerState::Idle);
    assert_eq!(c.history().len(), 1);
}

struct DownEngine;

impl EngineProcess for DownEngine {
    fn best_move(&self, _request: EngineRequest) -> BoxFuture<'static, Result<Move, EngineError>> {
        async { Err::<Move, _>(EngineError::Unavailable(String::from("spawn failed"))) }.boxed()
    }
}

#[tokio::test]
async fn failed_engine_waits_for_the_next_human_move() {
    let provider = EngineMoveProvider::new(Arc::new(DownEngine), SearchLimit::default(), Vec::new());
    let mut c = controller().with_engine(provider, EngineSides { white: false, black: true });
    play(&mut c, &["e2e4"]);

    let ticket = c.request_engine_move().unwrap();
    let reply = ticket.future.await;
    assert!(matches!(
        c.complete_engine_move(reply),
        Err(ControllerError::Engine(EngineError::Unavailable(_)))
    ));
    assert_eq!(c.state(), ControllerState::Idle);
    assert!(!c.engine_to_move());
    assert_eq!(c.status(), "Black to move");

    c.set_engine_sides(EngineSides { white: false, black: true });
    assert!(c.engine_to_move());
    let reply = c.request_engine_move().unwrap().future.await;
    assert!(c.complete_engine_move(reply).is_err());
    assert!(!c.engine_to_move());

    play(&mut c, &["e7e5", "g1f3"]);
    assert!(c.engine_to_move());

    let reply = c.request_engine_move().unwrap().future.await;
    assert!(c.complete_engine_move(reply).is_err());
    c.new_game().unwrap();
    play(&mut c, &["d2d4"]);
    assert!(c.engine_to_move());
}
