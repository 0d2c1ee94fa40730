//! The terminal front end.
//!
//! [`TerminalSurface`] draws the board with crossterm colours to any writer.
//! [`run`] reads one command per line from stdin and drives the controller.

use std::io::{self, BufRead, Write};
use std::path::Path;

use crossterm::style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor};
use crossterm::terminal::{Clear, ClearType};
use crossterm::{cursor::MoveTo, queue};
use log::warn;

use crate::captures::CapturedPieceTally;
use crate::config::Config;
use crate::controller::{BoardController, Outcome};
use crate::coords::{Cell, CoordinateMapper, Square};
use crate::error::ControllerError;
use crate::history::MoveRow;
use crate::input::{Modifiers, PointerButton, PointerEvent};
use crate::overlay::{OverlayKind, OverlayManager};
use crate::record::{self, GameRecord};
use crate::render::{BoardView, RenderSurface, Scene};
use crate::rules::{chess960_fen, Move, Piece, PieceKind, ShakmatyRules, Side};
use crate::theme::{self, Rgb, PALETTE};

/// Draws frames as coloured text.
pub struct TerminalSurface<W: Write> {
    out: W,
    scene: Scene,
    clear_screen: bool,
}

impl<W: Write> TerminalSurface<W> {
    pub fn new(out: W) -> Self {
        TerminalSurface { out, scene: Scene::new(), clear_screen: true }
    }

    /// Appends frames instead of clearing the screen before each one.
    pub fn scrolling(mut self) -> Self {
        self.clear_screen = false;
        self
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_frame(&mut self) -> io::Result<()> {
        let scene = &self.scene;
        let out = &mut self.out;
        if self.clear_screen {
            queue!(out, Clear(ClearType::All), MoveTo(0, 0))?;
        }

        for row in 0..8u8 {
            let rank_label = if scene.flipped { row + 1 } else { 8 - row };
            queue!(out, Print(format!("{} ", rank_label)))?;
            for col in 0..8u8 {
                let Ok(cell) = Cell::new(col, row) else {
                    continue;
                };
                let square = CoordinateMapper::cell_to_square(cell, scene.flipped);
                let (background, marker) = square_style(scene, square);
                queue!(out, SetBackgroundColor(term_color(background)))?;
                match scene.board.piece_at(square) {
                    Some(piece) => {
                        let fg = match piece.side {
                            Side::White => Color::White,
                            Side::Black => Color::Black,
                        };
                        queue!(out, SetForegroundColor(fg), Print(format!(" {} ", theme::piece_glyph(piece.kind))))?;
                    }
                    None if marker => {
                        queue!(out, SetForegroundColor(term_color(PALETTE.legal_marker)), Print(" \u{2022} "))?;
                    }
                    None => queue!(out, Print("   "))?,
                }
                queue!(out, ResetColor)?;
            }
            queue!(out, Print("\r\n"))?;
        }
        let files: String = (0..8u8)
            .map(|i| {
                let file = if scene.flipped { 7 - i } else { i };
                format!(" {} ", (b'a' + file) as char)
            })
            .collect();
        queue!(out, Print(format!("  {}\r\n", files)))?;

        if !scene.overlays.arrows().is_empty() {
            let arrows: Vec<String> = scene
                .overlays
                .arrows()
                .iter()
                .map(|a| format!("{}-{} ({:?})", a.from, a.to, a.color))
                .collect();
            queue!(out, Print(format!("arrows: {}\r\n", arrows.join(", "))))?;
        }
        queue!(out, Print(format!("{}\r\n", captured_line(&scene.captured))))?;
        queue!(out, Print(format!("{}\r\n", moves_line(&scene.rows, scene.current))))?;
        out.flush()
    }
}

impl<W: Write> RenderSurface for TerminalSurface<W> {
    fn draw_squares(&mut self, flipped: bool) {
        self.scene.draw_squares(flipped);
    }

    fn draw_pieces(&mut self, board: &BoardView, flipped: bool) {
        self.scene.draw_pieces(board, flipped);
    }

    fn draw_overlays(&mut self, overlays: &OverlayManager, flipped: bool) {
        self.scene.draw_overlays(overlays, flipped);
    }

    fn clear_overlays(&mut self, kind: OverlayKind) {
        self.scene.clear_overlays(kind);
    }

    fn draw_selection(&mut self, selected: Option<Square>) {
        self.scene.draw_selection(selected);
    }

    fn draw_move_list(&mut self, rows: &[MoveRow], current: Option<usize>) {
        self.scene.draw_move_list(rows, current);
    }

    fn draw_captured(&mut self, tally: &CapturedPieceTally) {
        self.scene.draw_captured(tally);
    }

    fn present(&mut self) {
        self.scene.present();
        if let Err(e) = self.write_frame() {
            warn!("could not draw board: {}", e);
        }
    }
}

/// Background colour of a square and whether it shows a legal-move dot.
fn square_style(scene: &Scene, square: Square) -> (Rgb, bool) {
    let marker = scene.overlays.legal_markers().contains(&square);
    if scene.selected == Some(square) {
        return (PALETTE.last_move, marker);
    }
    if let Some(mark) = scene.overlays.mark_at(square) {
        return (PALETTE.mark(mark), marker);
    }
    if let Some((from, to)) = scene.overlays.last_move() {
        if square == from || square == to {
            return (PALETTE.last_move, marker);
        }
    }
    (PALETTE.square((square.file() + square.rank()) % 2 == 1), marker)
}

fn term_color(rgb: Rgb) -> Color {
    Color::Rgb { r: rgb.r, g: rgb.g, b: rgb.b }
}

fn captured_line(tally: &CapturedPieceTally) -> String {
    let glyphs = |captor: Side| -> String {
        tally
            .taken_by(captor)
            .iter()
            .map(|&kind| theme::outlined_glyph(Piece::new(captor.opposite(), kind)))
            .collect()
    };
    format!(
        "White took: {}  Black took: {}  ({:+})",
        glyphs(Side::White),
        glyphs(Side::Black),
        tally.material_balance()
    )
}

fn moves_line(rows: &[MoveRow], current: Option<usize>) -> String {
    let mut parts = Vec::new();
    let mut index = 0usize;
    for row in rows {
        let mut part = format!("{}.", row.number);
        for san in [&row.white, &row.black] {
            match san {
                Some(san) if current == Some(index) => part.push_str(&format!(" [{}]", san)),
                Some(san) => part.push_str(&format!(" {}", san)),
                None => {
                    part.push_str(" ...");
                    continue;
                }
            }
            index += 1;
        }
        parts.push(part);
    }
    parts.join(" ")
}

const HELP: &str = "\
commands:
  e2e4, e7e8q        play a move (promotion letter optional; you will be asked)
  select e2          show where a piece can go
  back | forward     step through the game
  goto N             show the position after ply N (0 for the start)
  undo               take back the last move
  flip | new | clear flip the board, start over, remove marks and arrows
  mark e4 red        toggle a mark (blue, red, orange)
  arrow e2 e4 blue   toggle an arrow
  fen <FEN>          start from a position
  pgn <path>         list the games in a PGN file
  load N             import game N from the list
  export             print the game as PGN
  engine white|black|both|off
  go                 let the engine move now
  exit";

type TerminalController<W> = BoardController<ShakmatyRules, TerminalSurface<W>>;

/// Runs the line-command loop until `exit` or end of input.
pub fn run(config: Config) -> io::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    let rules = match config.start_position_number() {
        Some(number) => ShakmatyRules::chess960(number).unwrap_or_default(),
        None => ShakmatyRules::new(),
    };
    let engine = config.engine_provider();
    let mut controller = BoardController::new(rules, TerminalSurface::new(io::stdout()))
        .with_engine(engine, config.engine_plays);
    if config.flipped {
        controller.flip();
    }

    println!("--- boardside ---");
    println!("Type 'help' for commands.");
    let mut games: Vec<GameRecord> = Vec::new();
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        while controller.engine_to_move() {
            println!("Engine is thinking...");
            let ticket = match controller.request_engine_move() {
                Ok(ticket) => ticket,
                Err(e) => {
                    println!("{}", e);
                    break;
                }
            };
            let reply = runtime.block_on(ticket.future);
            if let Err(e) = controller.complete_engine_move(reply) {
                println!("{}", e);
                break;
            }
        }

        println!("{}", controller.status());
        print!("> ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            continue;
        };
        let args: Vec<&str> = words.collect();

        let result = match command {
            "exit" | "quit" => break,
            "help" => {
                println!("{}", HELP);
                Ok(())
            }
            "select" => match square_arg(&args, 0) {
                Some(square) => controller.click(square).map(drop),
                None => usage("select <square>"),
            },
            "back" | "b" => controller.step_backward().map(drop),
            "forward" | "f" => controller.step_forward().map(drop),
            "goto" => match args.first().and_then(|n| n.parse::<usize>().ok()) {
                Some(0) => controller.jump_to(None).map(drop),
                Some(n) => controller.jump_to(Some(n - 1)).map(drop),
                None => usage("goto N"),
            },
            "undo" => controller.undo_last().map(drop),
            "flip" => {
                controller.flip();
                Ok(())
            }
            "new" => match config.start_position_number().and_then(chess960_fen) {
                Some(fen) => controller.load_position(&fen).map(drop),
                None => controller.new_game().map(drop),
            },
            "clear" => {
                controller.clear_annotations();
                Ok(())
            }
            "mark" => annotate(&mut controller, &args, false),
            "arrow" => annotate(&mut controller, &args, true),
            "fen" => controller.load_position(&args.join(" ")).map(drop),
            "pgn" => match record::parse_file(Path::new(&args.join(" "))) {
                Ok(found) => {
                    games = found;
                    for (i, game) in games.iter().enumerate() {
                        println!("{:3}  {}", i, game.title());
                    }
                    Ok(())
                }
                Err(e) => {
                    games.clear();
                    Err(e.into())
                }
            },
            "load" => match args.first().and_then(|n| n.parse::<usize>().ok()).and_then(|i| games.get(i)) {
                Some(game) => controller.import_game(game).map(drop),
                None => usage("load N (after pgn <path>)"),
            },
            "export" => {
                println!("{}", controller.export_pgn());
                Ok(())
            }
            "engine" => {
                let mut sides = controller.engine_sides();
                match args.first().copied() {
                    Some("white") => sides.white = !sides.white,
                    Some("black") => sides.black = !sides.black,
                    Some("both") => {
                        sides.white = true;
                        sides.black = true;
                    }
                    _ => {
                        sides.white = false;
                        sides.black = false;
                    }
                }
                controller.set_engine_sides(sides);
                Ok(())
            }
            "go" => match controller.request_engine_move() {
                Ok(ticket) => {
                    let reply = runtime.block_on(ticket.future);
                    controller.complete_engine_move(reply).map(drop)
                }
                Err(e) => Err(e),
            },
            text => play(&mut controller, text, &mut lines),
        };

        if let Err(e) = result {
            println!("{}", e);
        }
    }
    Ok(())
}

/// Plays a move typed in coordinate form, asking for a promotion piece when
/// none was given. Whatever was selected before is dropped first.
fn play<W: Write, B: BufRead>(
    controller: &mut TerminalController<W>,
    text: &str,
    lines: &mut io::Lines<B>,
) -> Result<(), ControllerError> {
    let Some(mv) = Move::from_uci(text) else {
        println!("Unknown command. Type 'help' for commands.");
        return Ok(());
    };
    controller.clear_selection();
    match controller.click(mv.from)? {
        Outcome::Selected(_) => {}
        _ => {
            println!("No piece of the side to move on {}.", mv.from);
            return Ok(());
        }
    }
    if let Outcome::PromotionPending { .. } = controller.click(mv.to)? {
        let kind = match mv.promotion {
            Some(kind) => Some(kind),
            None => {
                print!("Promote to (q, r, b, n): ");
                if let Err(e) = io::stdout().flush() {
                    warn!("could not show prompt: {}", e);
                }
                lines
                    .next()
                    .and_then(|l| l.ok())
                    .and_then(|l| l.trim().chars().next())
                    .and_then(PieceKind::from_char)
            }
        };
        match kind {
            Some(kind) => controller.choose_promotion(kind).map(drop)?,
            None => controller.cancel_promotion().map(drop)?,
        }
    }
    Ok(())
}

/// `mark <sq> <colour>` or `arrow <from> <to> <colour>`, sent as the
/// pointer gestures the board widget would produce.
fn annotate<W: Write>(controller: &mut TerminalController<W>, args: &[&str], arrow: bool) -> Result<(), ControllerError> {
    let form = if arrow { "arrow <from> <to> [blue|red|orange]" } else { "mark <square> [blue|red|orange]" };
    let Some(from) = square_arg(args, 0) else {
        return usage(form);
    };
    let color_at = if arrow { 2 } else { 1 };
    let modifiers = match args.get(color_at).copied() {
        Some("blue") | None => Modifiers::ctrl(),
        Some("red") => Modifiers::alt(),
        Some("orange") => Modifiers::shift(),
        Some(_) => return usage(form),
    };
    let flipped = controller.is_flipped();
    let mapper = *controller.mapper();
    if !arrow {
        controller.handle_pointer(PointerEvent::Pressed {
            point: mapper.square_center(from, flipped),
            button: PointerButton::Right,
            modifiers,
        })?;
        return Ok(());
    }
    let Some(to) = square_arg(args, 1) else {
        return usage(form);
    };
    controller.handle_pointer(PointerEvent::Pressed {
        point: mapper.square_center(from, flipped),
        button: PointerButton::Left,
        modifiers,
    })?;
    controller.handle_pointer(PointerEvent::Released { point: mapper.square_center(to, flipped) })?;
    Ok(())
}

fn square_arg(args: &[&str], at: usize) -> Option<Square> {
    args.get(at).and_then(|s| Square::parse(s))
}

fn usage(form: &str) -> Result<(), ControllerError> {
    println!("usage: {}", form);
    Ok(())
}
