//! The board controller: one owner for all interaction state.
//!
//! Every entry point checks the controller state, mutates through the
//! executor or the history navigator, and redraws before returning.

use std::collections::BTreeMap;

use log::{debug, info, warn};

use crate::captures::CapturedPiecesTracker;
use crate::config::EngineSides;
use crate::coords::{CoordinateMapper, Square};
use crate::engine::{EngineMoveProvider, EngineReply, EngineTicket};
use crate::error::{ControllerError, EngineError};
use crate::executor::{terminal_state, Attempt, Committed, GameResult, MoveExecutor};
use crate::history::{GameContext, MoveHistoryNavigator, MoveRecord};
use crate::import::{GameImporter, ImportSummary};
use crate::input::{PointerButton, PointerEvent};
use crate::overlay::{ArrowCommit, OverlayKind, OverlayManager};
use crate::record::{self, GameRecord};
use crate::render::{BoardView, RenderSurface};
use crate::rules::{Move, PieceKind, RulesEngine, Side, STARTING_FEN};
use crate::selection::{SelectionController, SelectionStep};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    AwaitingEngine { generation: u64 },
    AwaitingPromotion { from: Square, to: Square },
}

/// What an entry point did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing changed.
    Ignored,
    Selected(Square),
    SelectionCleared,
    Moved(Committed),
    /// A promotion piece has to be chosen before the move is played.
    PromotionPending { from: Square, to: Square },
    PromotionCancelled,
    /// The board now shows the move at this index.
    Navigated(Option<usize>),
    Undone(MoveRecord),
    Annotated,
    Flipped(bool),
    NewGame,
    Imported(ImportSummary),
    /// An engine reply arrived for a request that no longer matters.
    Discarded,
}

pub struct BoardController<R: RulesEngine, S: RenderSurface> {
    rules: R,
    surface: S,
    history: MoveHistoryNavigator,
    selection: SelectionController,
    overlays: OverlayManager,
    captures: CapturedPiecesTracker,
    mapper: CoordinateMapper,
    flipped: bool,
    state: ControllerState,
    engine: Option<EngineMoveProvider>,
    engine_sides: EngineSides,
    /// Set when the last engine request failed; the engine then waits for
    /// the next human move or a new game.
    engine_failed: bool,
    headers: BTreeMap<String, String>,
    result: Option<GameResult>,
}

impl<R: RulesEngine, S: RenderSurface> BoardController<R, S> {
    pub fn new(rules: R, surface: S) -> Self {
        let mut controller = BoardController {
            rules,
            surface,
            history: MoveHistoryNavigator::new(),
            selection: SelectionController::new(),
            overlays: OverlayManager::new(),
            captures: CapturedPiecesTracker::new(),
            mapper: CoordinateMapper::default(),
            flipped: false,
            state: ControllerState::Idle,
            engine: None,
            engine_sides: EngineSides::default(),
            engine_failed: false,
            headers: record::default_headers("*"),
            result: None,
        };
        controller.result = terminal_state(&controller.rules);
        controller.redraw();
        controller
    }

    pub fn with_mapper(mut self, mapper: CoordinateMapper) -> Self {
        self.mapper = mapper;
        self.redraw();
        self
    }

    pub fn with_engine(mut self, engine: EngineMoveProvider, sides: EngineSides) -> Self {
        self.engine = Some(engine);
        self.engine_sides = sides;
        self
    }

    pub fn set_engine_sides(&mut self, sides: EngineSides) {
        self.engine_sides = sides;
        self.engine_failed = false;
    }

    pub fn engine_sides(&self) -> EngineSides {
        self.engine_sides
    }

    pub fn rules(&self) -> &R {
        &self.rules
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn history(&self) -> &MoveHistoryNavigator {
        &self.history
    }

    pub fn overlays(&self) -> &OverlayManager {
        &self.overlays
    }

    pub fn captures(&self) -> &CapturedPiecesTracker {
        &self.captures
    }

    pub fn selection(&self) -> &SelectionController {
        &self.selection
    }

    pub fn mapper(&self) -> &CoordinateMapper {
        &self.mapper
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn is_flipped(&self) -> bool {
        self.flipped
    }

    pub fn result(&self) -> Option<GameResult> {
        self.result
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// One-line description of where the game stands.
    pub fn status(&self) -> String {
        match self.state {
            ControllerState::AwaitingEngine { .. } => return String::from("Engine is thinking..."),
            ControllerState::AwaitingPromotion { .. } => return String::from("Choose a promotion piece"),
            ControllerState::Idle => {}
        }
        if self.history.is_navigating() {
            return format!("Viewing ply {} of {}", self.history.plies_shown(), self.history.len());
        }
        match self.result {
            Some(GameResult::Checkmate { winner }) => format!("Checkmate, {} wins", side_name(winner)),
            Some(GameResult::Stalemate) => String::from("Stalemate"),
            None => format!("{} to move", side_name(self.rules.side_to_move())),
        }
    }

    /// A left click on `square` without modifiers.
    pub fn click(&mut self, square: Square) -> Result<Outcome, ControllerError> {
        self.ensure_idle()?;
        if self.history.is_navigating() {
            self.selection.clear(&mut self.overlays);
            self.redraw();
            return Err(ControllerError::StaleHistory {
                shown: self.history.plies_shown(),
                total: self.history.len(),
            });
        }
        let step = self.selection.click(square, &self.rules, &mut self.overlays);
        let outcome = match step {
            SelectionStep::Selected(sq) => Ok(Outcome::Selected(sq)),
            SelectionStep::Cleared => Ok(Outcome::SelectionCleared),
            SelectionStep::Ignored => Ok(Outcome::Ignored),
            SelectionStep::MoveRequested { from, to } => self.attempt(from, to),
        };
        self.redraw();
        outcome
    }

    fn attempt(&mut self, from: Square, to: Square) -> Result<Outcome, ControllerError> {
        let attempt = self.executor().attempt(from, to);
        match attempt {
            Ok(Attempt::Committed(committed)) => {
                self.selection.clear(&mut self.overlays);
                self.result = committed.result;
                self.engine_failed = false;
                Ok(Outcome::Moved(committed))
            }
            Ok(Attempt::NeedsPromotion { from, to }) => {
                self.state = ControllerState::AwaitingPromotion { from, to };
                Ok(Outcome::PromotionPending { from, to })
            }
            Err(e) => {
                debug!("move {}{} rejected: {}", from, to, e);
                self.selection.clear(&mut self.overlays);
                Err(e)
            }
        }
    }

    /// Finishes a pending promotion with `kind`.
    pub fn choose_promotion(&mut self, kind: PieceKind) -> Result<Outcome, ControllerError> {
        let ControllerState::AwaitingPromotion { from, to } = self.state else {
            return Err(ControllerError::NoPromotionPending);
        };
        let committed = self.executor().commit(Move::with_promotion(from, to, kind))?;
        self.state = ControllerState::Idle;
        self.selection.clear(&mut self.overlays);
        self.result = committed.result;
        self.engine_failed = false;
        self.redraw();
        Ok(Outcome::Moved(committed))
    }

    /// Drops a pending promotion. Nothing was played.
    pub fn cancel_promotion(&mut self) -> Result<Outcome, ControllerError> {
        if !matches!(self.state, ControllerState::AwaitingPromotion { .. }) {
            return Err(ControllerError::NoPromotionPending);
        }
        self.state = ControllerState::Idle;
        self.selection.clear(&mut self.overlays);
        self.redraw();
        Ok(Outcome::PromotionCancelled)
    }

    /// Routes raw pointer input. A plain left press is a click; a left
    /// press with a modifier starts an arrow; a right press toggles a mark
    /// in the modifier's colour, or removes the mark without one.
    pub fn handle_pointer(&mut self, event: PointerEvent) -> Result<Outcome, ControllerError> {
        match event {
            PointerEvent::Pressed { point, button, modifiers } => {
                let Some(square) = self.mapper.square_at(point, self.flipped) else {
                    return Ok(Outcome::Ignored);
                };
                match (button, modifiers.mark_color()) {
                    (PointerButton::Left, None) => self.click(square),
                    (PointerButton::Left, Some(color)) => {
                        self.clear_selection_for_annotation();
                        self.overlays.begin_arrow(square, color, &self.mapper, self.flipped);
                        self.redraw();
                        Ok(Outcome::Annotated)
                    }
                    (PointerButton::Right, Some(color)) => {
                        self.clear_selection_for_annotation();
                        self.overlays.toggle_mark(square, color);
                        self.redraw();
                        Ok(Outcome::Annotated)
                    }
                    (PointerButton::Right, None) => {
                        self.clear_selection_for_annotation();
                        let removed = self.overlays.remove_mark(square);
                        self.redraw();
                        Ok(if removed { Outcome::Annotated } else { Outcome::Ignored })
                    }
                }
            }
            PointerEvent::Moved { point } => {
                if !self.overlays.is_drawing_arrow() {
                    return Ok(Outcome::Ignored);
                }
                self.overlays.update_arrow_end(point);
                self.redraw();
                Ok(Outcome::Annotated)
            }
            PointerEvent::Released { point } => {
                if !self.overlays.is_drawing_arrow() {
                    return Ok(Outcome::Ignored);
                }
                self.overlays.update_arrow_end(point);
                let commit = self.overlays.commit_arrow(&self.mapper, self.flipped);
                self.redraw();
                Ok(match commit {
                    ArrowCommit::Added(_) | ArrowCommit::Removed(_) => Outcome::Annotated,
                    ArrowCommit::Discarded => Outcome::Ignored,
                })
            }
        }
    }

    fn clear_selection_for_annotation(&mut self) {
        if self.state == ControllerState::Idle && self.selection.selected().is_some() {
            self.selection.clear(&mut self.overlays);
        }
    }

    /// Drops the selected piece, if any.
    pub fn clear_selection(&mut self) -> Outcome {
        if self.selection.selected().is_none() {
            return Outcome::Ignored;
        }
        self.selection.clear(&mut self.overlays);
        self.redraw();
        Outcome::SelectionCleared
    }

    /// Removes every mark and arrow.
    pub fn clear_annotations(&mut self) -> Outcome {
        self.overlays.clear_marks();
        self.overlays.clear_arrows();
        self.surface.clear_overlays(OverlayKind::Marks);
        self.surface.clear_overlays(OverlayKind::Arrows);
        self.redraw();
        Outcome::Annotated
    }

    pub fn step_backward(&mut self) -> Result<Outcome, ControllerError> {
        self.navigate(|history, ctx| {
            history.step_backward(ctx);
            Ok(())
        })
    }

    pub fn step_forward(&mut self) -> Result<Outcome, ControllerError> {
        self.navigate(|history, ctx| {
            history.step_forward(ctx)?;
            Ok(())
        })
    }

    /// Shows the position after move `index`, or the start for `None`.
    pub fn jump_to(&mut self, index: Option<usize>) -> Result<Outcome, ControllerError> {
        self.navigate(|history, ctx| history.jump_to(index, ctx))
    }

    /// Jumps to the move in move table cell (`row`, `col`).
    pub fn go_to_move(&mut self, row: usize, col: usize) -> Result<Outcome, ControllerError> {
        let index = self
            .history
            .index_for_cell(row, col)
            .ok_or(ControllerError::OutOfRange(row * 2 + col))?;
        self.jump_to(Some(index))
    }

    fn navigate<F>(&mut self, step: F) -> Result<Outcome, ControllerError>
    where
        F: FnOnce(&mut MoveHistoryNavigator, &mut GameContext<'_>) -> Result<(), ControllerError>,
    {
        self.ensure_idle()?;
        self.selection.clear(&mut self.overlays);
        let mut ctx = GameContext {
            rules: &mut self.rules,
            overlays: &mut self.overlays,
            captures: &mut self.captures,
        };
        let moved = step(&mut self.history, &mut ctx);
        self.result = terminal_state(&self.rules);
        self.redraw();
        moved.map(|()| Outcome::Navigated(self.history.current_index()))
    }

    /// Throws away the latest move. Only possible at the tip.
    pub fn undo_last(&mut self) -> Result<Outcome, ControllerError> {
        self.ensure_idle()?;
        self.selection.clear(&mut self.overlays);
        let mut ctx = GameContext {
            rules: &mut self.rules,
            overlays: &mut self.overlays,
            captures: &mut self.captures,
        };
        let undone = self.history.undo_last(&mut ctx);
        self.result = terminal_state(&self.rules);
        self.redraw();
        match undone? {
            Some(record) => Ok(Outcome::Undone(record)),
            None => Ok(Outcome::Ignored),
        }
    }

    pub fn flip(&mut self) -> Outcome {
        self.flipped = !self.flipped;
        self.overlays.discard_arrow();
        self.redraw();
        Outcome::Flipped(self.flipped)
    }

    /// Starts over from the standard position.
    pub fn new_game(&mut self) -> Result<Outcome, ControllerError> {
        self.load_position(STARTING_FEN)
    }

    /// Starts a new game from `fen`. A bad string changes nothing.
    pub fn load_position(&mut self, fen: &str) -> Result<Outcome, ControllerError> {
        self.rules.from_position_string(fen)?;
        self.start_over();
        self.headers = record::default_headers("*");
        if self.rules.initial_position_string() != STARTING_FEN {
            info!("new game from {}", fen);
        }
        self.redraw();
        Ok(Outcome::NewGame)
    }

    /// Replaces the current game with `record`.
    pub fn import_game(&mut self, record: &GameRecord) -> Result<Outcome, ControllerError> {
        self.start_over();
        self.headers = record.headers.clone();
        let ctx = GameContext {
            rules: &mut self.rules,
            overlays: &mut self.overlays,
            captures: &mut self.captures,
        };
        let imported = GameImporter::new(ctx, &mut self.history).import(record);
        self.result = terminal_state(&self.rules);
        self.redraw();
        imported.map(Outcome::Imported)
    }

    fn start_over(&mut self) {
        self.cancel_engine();
        self.engine_failed = false;
        self.state = ControllerState::Idle;
        self.selection.clear(&mut self.overlays);
        self.overlays.clear_marks();
        self.surface.clear_overlays(OverlayKind::Marks);
        self.surface.clear_overlays(OverlayKind::Arrows);
        let mut ctx = GameContext {
            rules: &mut self.rules,
            overlays: &mut self.overlays,
            captures: &mut self.captures,
        };
        self.history.clear(&mut ctx);
        self.result = terminal_state(&self.rules);
    }

    /// True when the configured engine should move in the shown position.
    pub fn engine_to_move(&self) -> bool {
        self.engine.is_some()
            && !self.engine_failed
            && self.state == ControllerState::Idle
            && self.result.is_none()
            && !self.history.is_navigating()
            && self.engine_sides.plays(self.rules.side_to_move())
    }

    /// Asks the engine for a move. Human input and navigation are refused
    /// until the reply is completed or the request is cancelled.
    pub fn request_engine_move(&mut self) -> Result<EngineTicket, ControllerError> {
        self.ensure_idle()?;
        if self.history.is_navigating() {
            return Err(ControllerError::StaleHistory {
                shown: self.history.plies_shown(),
                total: self.history.len(),
            });
        }
        let fen = self.rules.to_position_string();
        let chess960 = self.rules.is_chess960();
        let engine = self
            .engine
            .as_mut()
            .ok_or_else(|| EngineError::Unavailable(String::from("no engine configured")))?;
        let ticket = engine.request(&fen, chess960);
        self.state = ControllerState::AwaitingEngine { generation: ticket.generation };
        self.selection.clear(&mut self.overlays);
        self.redraw();
        Ok(ticket)
    }

    /// Applies an engine reply through the same path as a human move.
    /// Replies to cancelled or superseded requests are dropped.
    pub fn complete_engine_move(&mut self, reply: EngineReply) -> Result<Outcome, ControllerError> {
        let current = match self.state {
            ControllerState::AwaitingEngine { generation } => generation == reply.generation,
            _ => false,
        };
        let accepted = current && self.engine.as_mut().map_or(false, |engine| engine.accept(&reply));
        if !accepted {
            if current {
                self.state = ControllerState::Idle;
                self.redraw();
            }
            debug!("dropping engine reply #{}", reply.generation);
            return Ok(Outcome::Discarded);
        }
        self.state = ControllerState::Idle;

        let outcome = match reply.outcome {
            Ok(mv) => match self.executor().commit(mv) {
                Ok(committed) => {
                    self.result = committed.result;
                    Ok(Outcome::Moved(committed))
                }
                Err(ControllerError::IllegalMove { .. }) => {
                    warn!("engine suggested illegal move {}", mv);
                    self.engine_failed = true;
                    Err(ControllerError::Engine(EngineError::IllegalReply(mv.to_string())))
                }
                Err(e) => Err(e),
            },
            Err(e) => {
                warn!("engine move failed: {}", e);
                self.engine_failed = true;
                Err(ControllerError::Engine(e))
            }
        };
        self.redraw();
        outcome
    }

    /// Stops waiting for the engine; any reply it still sends is dropped.
    pub fn cancel_engine(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.cancel();
        }
        if matches!(self.state, ControllerState::AwaitingEngine { .. }) {
            self.state = ControllerState::Idle;
            self.redraw();
        }
    }

    /// The whole game as PGN.
    pub fn export_pgn(&self) -> String {
        let mut headers = self.headers.clone();
        if !self.history.is_navigating() {
            let token = self.result.map_or("*", GameResult::result_token);
            headers.insert(String::from("Result"), token.to_string());
        }
        record::write_pgn(&headers, &self.rules.initial_position_string(), self.history.records())
    }

    fn ensure_idle(&self) -> Result<(), ControllerError> {
        match self.state {
            ControllerState::Idle => Ok(()),
            ControllerState::AwaitingEngine { .. } => Err(ControllerError::AwaitingEngine),
            ControllerState::AwaitingPromotion { .. } => Err(ControllerError::AwaitingPromotion),
        }
    }

    fn executor(&mut self) -> MoveExecutor<'_> {
        let ctx = GameContext {
            rules: &mut self.rules,
            overlays: &mut self.overlays,
            captures: &mut self.captures,
        };
        MoveExecutor::new(ctx, &mut self.history)
    }

    fn redraw(&mut self) {
        let view = BoardView::capture(&self.rules);
        self.surface.draw_squares(self.flipped);
        self.surface.draw_pieces(&view, self.flipped);
        self.surface.draw_overlays(&self.overlays, self.flipped);
        self.surface.draw_selection(self.selection.selected());
        let first = record::fullmove_number(&self.rules.initial_position_string()) as usize;
        self.surface.draw_move_list(&self.history.move_rows(first), self.history.current_index());
        self.surface.draw_captured(self.captures.tally());
        self.surface.present();
    }
}

fn side_name(side: Side) -> &'static str {
    match side {
        Side::White => "White",
        Side::Black => "Black",
    }
}
