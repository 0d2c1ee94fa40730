//! The GUI front end, built with Iced.
//!
//! The board is a canvas drawn from the controller's [`Scene`]; everything
//! else is plain widgets. Engine searches run through `Command::perform`
//! and come back as [`Message::EngineMoved`].

use std::path::Path;

use iced::mouse::{self, Cursor};
use iced::widget::canvas::event::Status;
use iced::widget::canvas::{Event as CanvasEvent, Frame, Geometry, Program, Stroke};
use iced::widget::text::Shaping;
use iced::widget::{canvas, scrollable, text, Button, Column, Container, Row, TextInput};
use iced::{
    executor, keyboard, Application, Color, Command, Element, Length, Padding, Pixels, Point, Rectangle, Renderer,
    Settings, Size, Subscription, Theme,
};
use log::warn;

use crate::config::Config;
use crate::controller::{BoardController, ControllerState};
use crate::coords::{CoordinateMapper, Point as BoardPoint, Square};
use crate::engine::EngineReply;
use crate::error::ControllerError;
use crate::input::{Modifiers, PointerButton, PointerEvent};
use crate::overlay::{Arrow, DraftArrow};
use crate::record::{self, GameRecord};
use crate::render::Scene;
use crate::rules::{chess960_fen, Piece, PieceKind, RulesEngine, ShakmatyRules, Side};
use crate::theme::{self, Rgb, PALETTE};

pub fn run(config: Config) -> iced::Result {
    let board = config.square_size * 8.0;
    BoardApp::run(Settings {
        window: iced::window::Settings {
            size: Size::new(board + 420.0, board + 260.0),
            ..iced::window::Settings::default()
        },
        ..Settings::with_flags(config)
    })
}

#[derive(Debug, Clone)]
pub enum Message {
    Pointer(PointerEvent),
    Promote(PieceKind),
    CancelPromotion,
    Previous,
    Next,
    UndoLast,
    Flip,
    NewGame,
    ClearAnnotations,
    MoveCell(usize, usize),
    ToggleEngine(Side),
    EngineMoved(EngineReply),
    FenInputChanged(String),
    LoadFen,
    PgnPathChanged(String),
    OpenPgn,
    LoadGame(usize),
}

struct BoardApp {
    controller: BoardController<ShakmatyRules, Scene>,
    config: Config,
    fen_input: String,
    pgn_path: String,
    games: Vec<GameRecord>,
    note: Option<String>,
}

impl BoardApp {
    fn start_rules(config: &Config) -> ShakmatyRules {
        match config.start_position_number() {
            Some(number) => ShakmatyRules::chess960(number).unwrap_or_default(),
            None => ShakmatyRules::new(),
        }
    }

    /// Hands the position to the engine when it is the engine's turn.
    fn engine_command(&mut self) -> Command<Message> {
        if !self.controller.engine_to_move() {
            return Command::none();
        }
        match self.controller.request_engine_move() {
            Ok(ticket) => Command::perform(ticket.future, Message::EngineMoved),
            Err(e) => {
                self.note = Some(e.to_string());
                Command::none()
            }
        }
    }

    fn new_game(&mut self) -> Result<(), ControllerError> {
        match self.config.start_position_number().and_then(chess960_fen) {
            Some(fen) => self.controller.load_position(&fen)?,
            None => self.controller.new_game()?,
        };
        Ok(())
    }

    fn open_pgn(&mut self) -> Result<(), ControllerError> {
        self.games.clear();
        self.games = record::parse_file(Path::new(self.pgn_path.trim()))?;
        Ok(())
    }
}

impl Application for BoardApp {
    type Executor = executor::Default;
    type Message = Message;
    type Theme = Theme;
    type Flags = Config;

    fn new(config: Config) -> (Self, Command<Message>) {
        let engine = config.engine_provider();
        let mut controller = BoardController::new(Self::start_rules(&config), Scene::new())
            .with_mapper(CoordinateMapper::new(config.square_size))
            .with_engine(engine, config.engine_plays);
        if config.flipped {
            controller.flip();
        }
        let mut app = BoardApp {
            fen_input: controller.rules().to_position_string(),
            controller,
            config,
            pgn_path: String::new(),
            games: Vec::new(),
            note: None,
        };
        let command = app.engine_command();
        (app, command)
    }

    fn title(&self) -> String {
        String::from("Boardside")
    }

    fn update(&mut self, message: Message) -> Command<Message> {
        let result: Result<(), ControllerError> = match message {
            Message::Pointer(event) => self.controller.handle_pointer(event).map(drop),
            Message::Promote(kind) => self.controller.choose_promotion(kind).map(drop),
            Message::CancelPromotion => self.controller.cancel_promotion().map(drop),
            Message::Previous => self.controller.step_backward().map(drop),
            Message::Next => self.controller.step_forward().map(drop),
            Message::UndoLast => self.controller.undo_last().map(drop),
            Message::Flip => {
                self.controller.flip();
                Ok(())
            }
            Message::NewGame => self.new_game(),
            Message::ClearAnnotations => {
                self.controller.clear_annotations();
                Ok(())
            }
            Message::MoveCell(row, col) => self.controller.go_to_move(row, col).map(drop),
            Message::ToggleEngine(side) => {
                let mut sides = self.controller.engine_sides();
                match side {
                    Side::White => sides.white = !sides.white,
                    Side::Black => sides.black = !sides.black,
                }
                self.controller.set_engine_sides(sides);
                if !sides.plays(self.controller.rules().side_to_move()) {
                    self.controller.cancel_engine();
                }
                Ok(())
            }
            Message::EngineMoved(reply) => self.controller.complete_engine_move(reply).map(drop),
            Message::FenInputChanged(fen) => {
                self.fen_input = fen;
                return Command::none();
            }
            Message::LoadFen => self.controller.load_position(self.fen_input.trim()).map(drop),
            Message::PgnPathChanged(path) => {
                self.pgn_path = path;
                return Command::none();
            }
            Message::OpenPgn => self.open_pgn(),
            Message::LoadGame(index) => match self.games.get(index).cloned() {
                Some(game) => self.controller.import_game(&game).map(drop),
                None => Ok(()),
            },
        };

        match result {
            Ok(()) => self.note = None,
            Err(e) => {
                warn!("{}", e);
                self.note = Some(e.to_string());
            }
        }
        self.fen_input = self.controller.rules().to_position_string();
        self.engine_command()
    }

    fn subscription(&self) -> Subscription<Message> {
        Subscription::none()
    }

    fn view(&'_ self) -> Element<'_, Message> {
        let scene = self.controller.surface();
        let board_size = self.controller.mapper().square_size() * 8.0;

        let mut status = Column::new().spacing(4).push(text(self.controller.status()).size(Pixels(22.0)));
        if let Some(note) = &self.note {
            status = status.push(text(note).size(Pixels(14.0)));
        }

        let canvas = canvas(BoardCanvas::new(scene, *self.controller.mapper(), self.config.show_labels))
            .width(Length::Fixed(board_size))
            .height(Length::Fixed(board_size));

        let side_panel = Column::new()
            .spacing(10)
            .width(Length::Fixed(320.0))
            .push(move_table(scene))
            .push(captured_view(scene));

        let sides = self.controller.engine_sides();
        let controls = Row::new()
            .spacing(10)
            .push(Button::new(text("Previous")).on_press(Message::Previous))
            .push(Button::new(text("Next")).on_press(Message::Next))
            .push(Button::new(text("Undo last")).on_press(Message::UndoLast))
            .push(Button::new(text("Flip")).on_press(Message::Flip))
            .push(Button::new(text("New game")).on_press(Message::NewGame))
            .push(Button::new(text("Clear marks")).on_press(Message::ClearAnnotations))
            .push(
                Button::new(text(if sides.white { "Engine: White on" } else { "Engine: White off" }))
                    .on_press(Message::ToggleEngine(Side::White)),
            )
            .push(
                Button::new(text(if sides.black { "Engine: Black on" } else { "Engine: Black off" }))
                    .on_press(Message::ToggleEngine(Side::Black)),
            );

        let fen_controls = Row::new()
            .spacing(10)
            .align_items(iced::Alignment::Center)
            .push(
                TextInput::new("FEN string...", &self.fen_input)
                    .on_input(Message::FenInputChanged)
                    .on_submit(Message::LoadFen)
                    .width(Length::Fill),
            )
            .push(Button::new(text("Load FEN")).on_press(Message::LoadFen));

        let pgn_controls = Row::new()
            .spacing(10)
            .align_items(iced::Alignment::Center)
            .push(
                TextInput::new("PGN file...", &self.pgn_path)
                    .on_input(Message::PgnPathChanged)
                    .on_submit(Message::OpenPgn)
                    .width(Length::Fill),
            )
            .push(Button::new(text("Import PGN")).on_press(Message::OpenPgn));

        let mut content = Column::new()
            .spacing(14)
            .padding(Padding::new(10.0))
            .align_items(iced::Alignment::Center)
            .push(status)
            .push(Row::new().spacing(20).push(canvas).push(side_panel));

        if let ControllerState::AwaitingPromotion { .. } = self.controller.state() {
            let mut promotion = Row::new().spacing(10);
            for kind in PieceKind::PROMOTIONS {
                let piece = Piece::new(self.controller.rules().side_to_move(), kind);
                promotion = promotion.push(
                    Button::new(text(theme::outlined_glyph(piece)).shaping(Shaping::Advanced).size(Pixels(28.0)))
                        .on_press(Message::Promote(kind)),
                );
            }
            content = content.push(promotion.push(Button::new(text("Cancel")).on_press(Message::CancelPromotion)));
        }

        content = content.push(controls).push(fen_controls).push(pgn_controls);
        if !self.games.is_empty() {
            let mut list = Column::new().spacing(4);
            for (i, game) in self.games.iter().enumerate() {
                list = list.push(Button::new(text(game.title())).on_press(Message::LoadGame(i)).width(Length::Fill));
            }
            content = content.push(scrollable(list).height(Length::Fixed(140.0)));
        }

        Container::new(content)
            .width(Length::Fill)
            .height(Length::Fill)
            .center_x()
            .center_y()
            .into()
    }
}

fn move_table(scene: &Scene) -> Element<'_, Message> {
    let mut rows = Column::new().spacing(2);
    for (r, row) in scene.rows.iter().enumerate() {
        let mut line = Row::new().spacing(6).push(text(format!("{}.", row.number)).width(Length::Fixed(40.0)));
        for (col, san) in [(0, &row.white), (1, &row.black)] {
            let cell: Element<'_, Message> = match san {
                Some(san) => {
                    let shown = scene_index(scene, r, col) == scene.current && scene.current.is_some();
                    let label = if shown { format!("[{}]", san) } else { san.clone() };
                    Button::new(text(label)).on_press(Message::MoveCell(r, col)).width(Length::Fixed(120.0)).into()
                }
                None => text("...").width(Length::Fixed(120.0)).into(),
            };
            line = line.push(cell);
        }
        rows = rows.push(line);
    }
    scrollable(rows).height(Length::Fixed(320.0)).into()
}

/// History index of a move table cell as laid out in `scene`.
fn scene_index(scene: &Scene, row: usize, col: usize) -> Option<usize> {
    let black_first = scene.rows.first().map_or(false, |r| r.white.is_none());
    (row * 2 + col).checked_sub(black_first as usize)
}

fn captured_view(scene: &Scene) -> Element<'_, Message> {
    let line = |captor: Side| {
        let glyphs: String = scene
            .captured
            .taken_by(captor)
            .iter()
            .map(|&kind| theme::outlined_glyph(Piece::new(captor.opposite(), kind)))
            .collect();
        text(format!("{:?} took: {}", captor, glyphs)).shaping(Shaping::Advanced)
    };
    let balance = scene.captured.material_balance();
    Column::new()
        .spacing(4)
        .push(line(Side::White))
        .push(line(Side::Black))
        .push(text(format!("Material: {:+}", balance)))
        .into()
}

fn color(rgb: Rgb, alpha: f32) -> Color {
    Color::from_rgba8(rgb.r, rgb.g, rgb.b, alpha)
}

fn to_iced(point: BoardPoint) -> Point {
    Point::new(point.x, point.y)
}

#[derive(Debug, Default)]
struct CanvasState {
    modifiers: Modifiers,
    dragging: bool,
}

struct BoardCanvas<'a> {
    scene: &'a Scene,
    mapper: CoordinateMapper,
    labels: bool,
}

impl<'a> BoardCanvas<'a> {
    fn new(scene: &'a Scene, mapper: CoordinateMapper, labels: bool) -> Self {
        Self { scene, mapper, labels }
    }

    fn fill_square(&self, frame: &mut Frame, square: Square, fill: Color) {
        let size = self.mapper.square_size();
        let origin = self.mapper.square_origin(square, self.scene.flipped);
        let path = canvas::Path::rectangle(to_iced(origin), Size::new(size, size));
        frame.fill(&path, fill);
    }

    fn draw_arrow(&self, frame: &mut Frame, start: BoardPoint, end: BoardPoint, fill: Color) {
        let size = self.mapper.square_size();
        let (dx, dy) = (end.x - start.x, end.y - start.y);
        let length = (dx * dx + dy * dy).sqrt();
        if length < 1.0 {
            return;
        }
        let (ux, uy) = (dx / length, dy / length);
        let head = (size * 0.4).min(length);
        let base = Point::new(end.x - ux * head, end.y - uy * head);
        let shaft = canvas::Path::line(to_iced(start), base);
        frame.stroke(&shaft, Stroke::default().with_width(size * 0.15).with_color(fill));

        let half = size * 0.22;
        let head_path = canvas::Path::new(|b| {
            b.move_to(to_iced(end));
            b.line_to(Point::new(base.x - uy * half, base.y + ux * half));
            b.line_to(Point::new(base.x + uy * half, base.y - ux * half));
            b.close();
        });
        frame.fill(&head_path, fill);
    }

    fn pointer(&self, state: &CanvasState, point: Point, button: PointerButton) -> PointerEvent {
        PointerEvent::Pressed {
            point: BoardPoint::new(point.x, point.y),
            button,
            modifiers: state.modifiers,
        }
    }
}

impl<'a> Program<Message> for BoardCanvas<'a> {
    type State = CanvasState;

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: Cursor,
    ) -> Vec<Geometry> {
        let scene = self.scene;
        let flipped = scene.flipped;
        let size = self.mapper.square_size();
        let mut frame = Frame::new(renderer, bounds.size());

        for square in Square::all() {
            let light = (square.file() + square.rank()) % 2 == 1;
            self.fill_square(&mut frame, square, color(PALETTE.square(light), 1.0));
        }

        // Last move and marks
        if let Some((from, to)) = scene.overlays.last_move() {
            self.fill_square(&mut frame, from, color(PALETTE.last_move, 0.55));
            self.fill_square(&mut frame, to, color(PALETTE.last_move, 0.55));
        }
        for (square, mark) in scene.overlays.marks() {
            self.fill_square(&mut frame, square, color(PALETTE.mark(mark), 0.7));
        }
        if let Some(square) = scene.selected {
            let origin = self.mapper.square_origin(square, flipped);
            let path = canvas::Path::rectangle(to_iced(origin), Size::new(size, size));
            frame.stroke(&path, Stroke::default().with_width(3.0).with_color(color(PALETTE.last_move, 1.0)));
        }

        if self.labels {
            for i in 0..8u8 {
                let file = if flipped { 7 - i } else { i };
                let rank = if flipped { i } else { 7 - i };
                frame.fill_text(canvas::Text {
                    content: ((b'a' + file) as char).to_string(),
                    position: Point::new(i as f32 * size + size - 4.0, 8.0 * size - 4.0),
                    color: color(PALETTE.square(i % 2 == 0), 1.0),
                    size: Pixels(size * 0.2),
                    horizontal_alignment: iced::alignment::Horizontal::Right,
                    vertical_alignment: iced::alignment::Vertical::Bottom,
                    ..canvas::Text::default()
                });
                frame.fill_text(canvas::Text {
                    content: ((b'1' + rank) as char).to_string(),
                    position: Point::new(3.0, i as f32 * size + 3.0),
                    color: color(PALETTE.square(i % 2 == 1), 1.0),
                    size: Pixels(size * 0.2),
                    ..canvas::Text::default()
                });
            }
        }

        // Pieces
        for (square, piece) in scene.board.pieces() {
            let center = to_iced(self.mapper.square_center(square, flipped));
            let (fill, shadow) = match piece.side {
                Side::White => (Color::WHITE, Color::from_rgba8(0, 0, 0, 0.8)),
                Side::Black => (Color::BLACK, Color::from_rgba8(255, 255, 255, 0.3)),
            };
            let glyph = |position: Point, color: Color| canvas::Text {
                content: theme::piece_glyph(piece.kind).to_string(),
                position,
                color,
                size: Pixels(size * 0.8),
                horizontal_alignment: iced::alignment::Horizontal::Center,
                vertical_alignment: iced::alignment::Vertical::Center,
                shaping: Shaping::Advanced,
                ..canvas::Text::default()
            };
            frame.fill_text(glyph(Point::new(center.x + 1.5, center.y + 1.5), shadow));
            frame.fill_text(glyph(center, fill));
        }

        for &square in scene.overlays.legal_markers() {
            let center = to_iced(self.mapper.square_center(square, flipped));
            let dot = canvas::Path::circle(center, size * 0.14);
            frame.fill(&dot, color(PALETTE.legal_marker, 0.6));
        }

        for arrow in scene.overlays.arrows() {
            let Arrow { color: mark, .. } = *arrow;
            let (start, end) = arrow.endpoints(&self.mapper, flipped);
            self.draw_arrow(&mut frame, start, end, color(PALETTE.mark(mark), 0.8));
        }
        if let Some(&DraftArrow { from, end, color: mark }) = scene.overlays.draft() {
            let start = self.mapper.square_center(from, flipped);
            self.draw_arrow(&mut frame, start, end, color(PALETTE.mark(mark), 0.5));
        }

        vec![frame.into_geometry()]
    }

    fn update(
        &self,
        state: &mut Self::State,
        event: CanvasEvent,
        bounds: Rectangle,
        cursor: Cursor,
    ) -> (Status, Option<Message>) {
        match event {
            CanvasEvent::Keyboard(keyboard::Event::ModifiersChanged(mods)) => {
                state.modifiers = Modifiers { ctrl: mods.control(), alt: mods.alt(), shift: mods.shift() };
                (Status::Ignored, None)
            }
            CanvasEvent::Mouse(mouse::Event::ButtonPressed(button)) => {
                let Some(pos) = cursor.position_in(bounds) else {
                    return (Status::Ignored, None);
                };
                let button = match button {
                    mouse::Button::Left => PointerButton::Left,
                    mouse::Button::Right => PointerButton::Right,
                    _ => return (Status::Ignored, None),
                };
                state.dragging = button == PointerButton::Left && state.modifiers.mark_color().is_some();
                (Status::Captured, Some(Message::Pointer(self.pointer(state, pos, button))))
            }
            CanvasEvent::Mouse(mouse::Event::CursorMoved { .. }) if state.dragging => {
                match cursor.position_in(bounds) {
                    Some(pos) => (
                        Status::Captured,
                        Some(Message::Pointer(PointerEvent::Moved { point: BoardPoint::new(pos.x, pos.y) })),
                    ),
                    None => (Status::Ignored, None),
                }
            }
            CanvasEvent::Mouse(mouse::Event::ButtonReleased(mouse::Button::Left)) if state.dragging => {
                state.dragging = false;
                // Releasing off the board discards the arrow.
                let point = cursor
                    .position_in(bounds)
                    .map_or(BoardPoint::new(-1.0, -1.0), |pos| BoardPoint::new(pos.x, pos.y));
                (Status::Captured, Some(Message::Pointer(PointerEvent::Released { point })))
            }
            _ => (Status::Ignored, None),
        }
    }
}
