//! PGN game records: reading files of games and writing the current one.
//!
//! Reading resolves SAN against a scratch position so the importer gets
//! board moves. A token that does not resolve ends the game's move list and
//! is kept so the import can report where it stopped.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use log::{debug, warn};
use shakmaty::fen::Fen;
use shakmaty::san::SanPlus;
use shakmaty::{CastlingMode, Chess, Position};

use crate::error::RecordError;
use crate::history::MoveRecord;
use crate::rules::{self, Move, STARTING_FEN};

const ROSTER: [&str; 7] = ["Event", "Site", "Date", "Round", "White", "Black", "Result"];
const RESULTS: [&str; 4] = ["1-0", "0-1", "1/2-1/2", "*"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameRecord {
    pub headers: BTreeMap<String, String>,
    /// Main-line moves that resolved against the position.
    pub moves: Vec<Move>,
    /// First SAN token that could not be played, if any.
    pub unresolved: Option<String>,
}

impl GameRecord {
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    /// Starting position from the `FEN` tag.
    pub fn starting_fen(&self) -> Option<&str> {
        self.header("FEN")
    }

    pub fn is_chess960(&self) -> bool {
        self.header("Variant").map_or(false, |v| {
            let v = v.to_ascii_lowercase();
            v.contains("960") || v.contains("fischer")
        })
    }

    /// One-line summary for a game list, e.g. `Carlsen vs Caruana - (1/2-1/2)`.
    pub fn title(&self) -> String {
        format!(
            "{} vs {} - ({})",
            self.header("White").unwrap_or("?"),
            self.header("Black").unwrap_or("?"),
            self.header("Result").unwrap_or("*")
        )
    }
}

/// Reads every game in a PGN file. A missing file is `NotFound`.
pub fn parse_file(path: &Path) -> Result<Vec<GameRecord>, RecordError> {
    let text = fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => RecordError::NotFound(path.to_path_buf()),
        _ => RecordError::Io { path: path.to_path_buf(), reason: e.to_string() },
    })?;
    let games = read_games(&text);
    debug!("read {} games from {}", games.len(), path.display());
    Ok(games)
}

/// Splits PGN text into games and resolves each one's main line.
pub fn read_games(text: &str) -> Vec<GameRecord> {
    let mut games = Vec::new();
    let mut headers = BTreeMap::new();
    let mut movetext = String::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('%') {
            continue;
        }
        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            if !movetext.trim().is_empty() {
                games.push(build_game(std::mem::take(&mut headers), &movetext));
                movetext.clear();
            }
            if let Some((key, value)) = parse_header(trimmed) {
                headers.insert(key, value);
            }
            continue;
        }
        // `;` comments run to the end of the line.
        let body = match trimmed.find(';') {
            Some(at) if !inside_brace(&movetext, &trimmed[..at]) => &trimmed[..at],
            _ => trimmed,
        };
        movetext.push_str(body);
        movetext.push('\n');
    }
    if !headers.is_empty() || !movetext.trim().is_empty() {
        games.push(build_game(headers, &movetext));
    }
    games
}

fn inside_brace(before: &str, line_head: &str) -> bool {
    let opens = before.matches('{').count() + line_head.matches('{').count();
    let closes = before.matches('}').count() + line_head.matches('}').count();
    opens > closes
}

fn parse_header(line: &str) -> Option<(String, String)> {
    let inner = line.strip_prefix('[')?.strip_suffix(']')?.trim();
    let (key, rest) = inner.split_once(char::is_whitespace)?;
    let value = rest.trim().strip_prefix('"')?.strip_suffix('"')?;
    Some((key.to_string(), value.replace("\\\"", "\"").replace("\\\\", "\\")))
}

fn build_game(headers: BTreeMap<String, String>, movetext: &str) -> GameRecord {
    let mut game = GameRecord { headers, ..GameRecord::default() };
    let (mut position, mode) = match scratch_position(game.starting_fen(), game.is_chess960()) {
        Some(found) => found,
        None => {
            warn!("game {:?} has an unreadable FEN tag", game.title());
            game.unresolved = game.starting_fen().map(str::to_string);
            return game;
        }
    };

    for token in movetext_tokens(movetext) {
        if RESULTS.contains(&token.as_str()) {
            game.headers.entry(String::from("Result")).or_insert(token);
            break;
        }
        match resolve_san(&position, &token, mode) {
            Some((m, mv)) => {
                position.play_unchecked(&m);
                game.moves.push(mv);
            }
            None => {
                debug!("stopping at unresolved token {:?}", token);
                game.unresolved = Some(token);
                break;
            }
        }
    }
    game
}

fn scratch_position(fen: Option<&str>, chess960: bool) -> Option<(Chess, CastlingMode)> {
    let Some(text) = fen else {
        return Some((Chess::default(), CastlingMode::Standard));
    };
    let fen: Fen = text.trim().parse().ok()?;
    let mode = if chess960 { CastlingMode::Chess960 } else { CastlingMode::Standard };
    fen.clone()
        .into_position::<Chess>(mode)
        .map(|pos| (pos, mode))
        .or_else(|_| fen.into_position::<Chess>(CastlingMode::Chess960).map(|pos| (pos, CastlingMode::Chess960)))
        .ok()
}

fn resolve_san(position: &Chess, token: &str, mode: CastlingMode) -> Option<(shakmaty::Move, Move)> {
    let san: SanPlus = token.parse().ok()?;
    let m = san.san.to_move(position).ok()?;
    let mv = rules::from_shakmaty(&m, mode)?;
    Some((m, mv))
}

/// Movetext with comments, variations, NAGs, move numbers and annotation
/// glyphs removed, one SAN or result token per entry.
fn movetext_tokens(text: &str) -> Vec<String> {
    let mut flat = String::with_capacity(text.len());
    let mut braces = 0usize;
    let mut parens = 0usize;
    for ch in text.chars() {
        match ch {
            '{' => braces += 1,
            '}' => braces = braces.saturating_sub(1),
            '(' if braces == 0 => parens += 1,
            ')' if braces == 0 => parens = parens.saturating_sub(1),
            _ if braces == 0 && parens == 0 => flat.push(ch),
            _ => {}
        }
        if (ch == '}' || ch == ')') && braces == 0 && parens == 0 {
            flat.push(' ');
        }
    }

    let mut tokens = Vec::new();
    for raw in flat.split_whitespace() {
        if raw.starts_with('$') {
            continue;
        }
        // `12.e4` and `12...Nf6` carry the move glued to its number.
        let token = raw.trim_start_matches(|c: char| c.is_ascii_digit() || c == '.');
        let token = if RESULTS.contains(&raw) { raw } else { token };
        let token = token.trim_end_matches(|c: char| c == '!' || c == '?');
        if !token.is_empty() {
            tokens.push(token.to_string());
        }
    }
    tokens
}

/// Headers for a new game in roster order, with unknown values as `?`.
pub fn default_headers(result: &str) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    for key in ROSTER {
        headers.insert(key.to_string(), String::from("?"));
    }
    headers.insert(String::from("Result"), result.to_string());
    headers
}

/// Writes one game as PGN. The roster tags come first in their standard
/// order; a non-standard start adds `SetUp` and `FEN`.
pub fn write_pgn(headers: &BTreeMap<String, String>, initial_fen: &str, records: &[MoveRecord]) -> String {
    let mut tags: BTreeMap<String, String> = headers.clone();
    if initial_fen != STARTING_FEN {
        tags.insert(String::from("SetUp"), String::from("1"));
        tags.insert(String::from("FEN"), initial_fen.to_string());
    }
    let result = tags.get("Result").cloned().unwrap_or_else(|| String::from("*"));

    let mut out = String::new();
    for key in ROSTER {
        let value = tags.get(key).map(String::as_str).unwrap_or("?");
        out.push_str(&format!("[{} \"{}\"]\n", key, escape(value)));
    }
    for (key, value) in tags.iter().filter(|(k, _)| !ROSTER.contains(&k.as_str())) {
        out.push_str(&format!("[{} \"{}\"]\n", key, escape(value)));
    }
    out.push('\n');

    let mut number = fullmove_number(initial_fen);
    let mut words = Vec::with_capacity(records.len() + 1);
    for (i, record) in records.iter().enumerate() {
        match record.side {
            rules::Side::White => words.push(format!("{}. {}", number, record.san)),
            rules::Side::Black if i == 0 => words.push(format!("{}... {}", number, record.san)),
            rules::Side::Black => words.push(record.san.clone()),
        }
        if record.side == rules::Side::Black {
            number += 1;
        }
    }
    words.push(result);

    let mut line_len = 0;
    for word in words {
        if line_len > 0 && line_len + 1 + word.len() > 79 {
            out.push('\n');
            line_len = 0;
        } else if line_len > 0 {
            out.push(' ');
            line_len += 1;
        }
        line_len += word.len();
        out.push_str(&word);
    }
    out.push('\n');
    out
}

/// Fullmove number field of a FEN, 1 when missing.
pub fn fullmove_number(fen: &str) -> u32 {
    fen.split_whitespace().nth(5).and_then(|n| n.parse().ok()).unwrap_or(1)
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
