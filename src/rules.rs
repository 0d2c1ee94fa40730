//! The rules-engine seam.
//!
//! The controller never decides legality itself. Everything it needs to know
//! about chess goes through [`RulesEngine`]; [`ShakmatyRules`] is the binding
//! shipped with the crate.

use std::fmt;

use shakmaty::fen::Fen;
use shakmaty::san::SanPlus;
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, File, Position, Role};

use crate::coords::Square;
use crate::error::RulesError;

pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Position number of the standard array in the Fischer random numbering.
pub const STANDARD_CHESS960_NUMBER: u16 = 518;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    White,
    Black,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl PieceKind {
    /// Kinds a pawn may promote to, in the order a chooser offers them.
    pub const PROMOTIONS: [PieceKind; 4] =
        [PieceKind::Queen, PieceKind::Rook, PieceKind::Knight, PieceKind::Bishop];

    pub fn from_char(c: char) -> Option<PieceKind> {
        match c.to_ascii_lowercase() {
            'p' => Some(PieceKind::Pawn),
            'n' => Some(PieceKind::Knight),
            'b' => Some(PieceKind::Bishop),
            'r' => Some(PieceKind::Rook),
            'q' => Some(PieceKind::Queen),
            'k' => Some(PieceKind::King),
            _ => None,
        }
    }

    pub fn to_char(self) -> char {
        match self {
            PieceKind::Pawn => 'p',
            PieceKind::Knight => 'n',
            PieceKind::Bishop => 'b',
            PieceKind::Rook => 'r',
            PieceKind::Queen => 'q',
            PieceKind::King => 'k',
        }
    }

    /// Conventional material value in pawns.
    pub fn value(self) -> u32 {
        match self {
            PieceKind::Pawn => 1,
            PieceKind::Knight | PieceKind::Bishop => 3,
            PieceKind::Rook => 5,
            PieceKind::Queen => 9,
            PieceKind::King => 0,
        }
    }

    fn from_role(role: Role) -> PieceKind {
        match role {
            Role::Pawn => PieceKind::Pawn,
            Role::Knight => PieceKind::Knight,
            Role::Bishop => PieceKind::Bishop,
            Role::Rook => PieceKind::Rook,
            Role::Queen => PieceKind::Queen,
            Role::King => PieceKind::King,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Piece {
    pub side: Side,
    pub kind: PieceKind,
}

impl Piece {
    pub fn new(side: Side, kind: PieceKind) -> Self {
        Piece { side, kind }
    }

    /// FEN letter: upper case for White.
    pub fn to_char(self) -> char {
        let c = self.kind.to_char();
        match self.side {
            Side::White => c.to_ascii_uppercase(),
            Side::Black => c,
        }
    }
}

/// A move as the board sees it: where from, where to, and what a pawn
/// becomes. Castling is written as the king's own two-square step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Move {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<PieceKind>,
}

impl Move {
    pub fn new(from: Square, to: Square) -> Self {
        Move { from, to, promotion: None }
    }

    pub fn with_promotion(from: Square, to: Square, kind: PieceKind) -> Self {
        Move { from, to, promotion: Some(kind) }
    }

    /// Parses long algebraic notation such as `e2e4` or `e7e8q`.
    pub fn from_uci(text: &str) -> Option<Move> {
        let text = text.trim();
        if !text.is_ascii() || !(4..=5).contains(&text.len()) {
            return None;
        }
        let from = Square::parse(&text[0..2])?;
        let to = Square::parse(&text[2..4])?;
        let promotion = match text[4..].chars().next() {
            Some(c) => Some(PieceKind::from_char(c)?),
            None => None,
        };
        Some(Move { from, to, promotion })
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(kind) = self.promotion {
            write!(f, "{}", kind.to_char())?;
        }
        Ok(())
    }
}

/// Everything the controller asks of a chess rules implementation.
pub trait RulesEngine {
    /// Legal moves for the side to move.
    fn legal_moves(&self) -> Vec<Move>;

    /// Plays a legal move.
    fn push(&mut self, mv: Move) -> Result<(), RulesError>;

    /// Takes back the last pushed move.
    fn pop(&mut self) -> Option<Move>;

    fn piece_at(&self, square: Square) -> Option<Piece>;

    fn side_to_move(&self) -> Side;

    fn is_capture(&self, mv: Move) -> bool;

    fn is_en_passant(&self, mv: Move) -> bool;

    /// Square a pawn may capture onto en passant, if any.
    fn ep_target_square(&self) -> Option<Square>;

    /// SAN for `mv` in the current position, which must be the position
    /// before the move is played.
    fn san_of(&self, mv: Move) -> Result<String, RulesError>;

    fn is_checkmate(&self) -> bool;

    fn is_stalemate(&self) -> bool;

    fn to_position_string(&self) -> String;

    /// Replaces the starting position. Pushed moves are forgotten.
    fn from_position_string(&mut self, text: &str) -> Result<(), RulesError>;

    /// Position the current game started from.
    fn initial_position_string(&self) -> String;

    /// Returns to the starting position.
    fn reset(&mut self);

    /// Number of moves pushed since the starting position.
    fn ply_count(&self) -> usize;

    fn is_chess960(&self) -> bool {
        false
    }
}

/// [`RulesEngine`] backed by `shakmaty`.
#[derive(Debug, Clone)]
pub struct ShakmatyRules {
    initial: Chess,
    position: Chess,
    played: Vec<(Chess, Move)>,
    mode: CastlingMode,
}

impl ShakmatyRules {
    pub fn new() -> Self {
        ShakmatyRules {
            initial: Chess::default(),
            position: Chess::default(),
            played: Vec::new(),
            mode: CastlingMode::Standard,
        }
    }

    pub fn from_fen(text: &str) -> Result<Self, RulesError> {
        let mut rules = ShakmatyRules::new();
        rules.from_position_string(text)?;
        Ok(rules)
    }

    /// Fischer random start position `number` (0..960).
    pub fn chess960(number: u16) -> Result<Self, RulesError> {
        let fen = chess960_fen(number)
            .ok_or_else(|| RulesError::InvalidPosition(format!("no Chess960 position {}", number)))?;
        let mut rules = ShakmatyRules::new();
        let pos = parse_fen(&fen)?
            .into_position::<Chess>(CastlingMode::Chess960)
            .map_err(|e| RulesError::InvalidPosition(format!("{}: {}", fen, e)))?;
        rules.load(pos, CastlingMode::Chess960);
        Ok(rules)
    }

    /// The legal move `mv` stands for. An exact match wins over a castle
    /// given in its other form.
    fn find(&self, mv: Move) -> Option<shakmaty::Move> {
        let legal = self.position.legal_moves();
        let exact = legal.iter().find(|m| from_shakmaty(m, self.mode) == Some(mv));
        exact.or_else(|| legal.iter().find(|m| matches_move(m, mv))).cloned()
    }

    fn load(&mut self, pos: Chess, mode: CastlingMode) {
        self.initial = pos.clone();
        self.position = pos;
        self.mode = mode;
        self.played.clear();
    }
}

fn parse_fen(text: &str) -> Result<Fen, RulesError> {
    text.trim()
        .parse()
        .map_err(|e| RulesError::InvalidPosition(format!("{}: {}", text, e)))
}

/// Reads a FEN as standard chess, or as Chess960 when its castling rights
/// only make sense there.
fn parse_position(text: &str) -> Result<(Chess, CastlingMode), RulesError> {
    let fen = parse_fen(text)?;
    match fen.clone().into_position::<Chess>(CastlingMode::Standard) {
        Ok(pos) => Ok((pos, CastlingMode::Standard)),
        Err(_) => fen
            .into_position::<Chess>(CastlingMode::Chess960)
            .map(|pos| (pos, CastlingMode::Chess960))
            .map_err(|e| RulesError::InvalidPosition(format!("{}: {}", text, e))),
    }
}

impl Default for ShakmatyRules {
    fn default() -> Self {
        ShakmatyRules::new()
    }
}

impl RulesEngine for ShakmatyRules {
    fn legal_moves(&self) -> Vec<Move> {
        self.position.legal_moves().iter().filter_map(|m| from_shakmaty(m, self.mode)).collect()
    }

    fn push(&mut self, mv: Move) -> Result<(), RulesError> {
        let m = self.find(mv).ok_or(RulesError::IllegalMove(mv))?;
        self.played.push((self.position.clone(), mv));
        self.position.play_unchecked(&m);
        Ok(())
    }

    fn pop(&mut self) -> Option<Move> {
        let (before, mv) = self.played.pop()?;
        self.position = before;
        Some(mv)
    }

    fn piece_at(&self, square: Square) -> Option<Piece> {
        self.position.board().piece_at(to_shakmaty_square(square)).map(|p| Piece {
            side: from_color(p.color),
            kind: PieceKind::from_role(p.role),
        })
    }

    fn side_to_move(&self) -> Side {
        from_color(self.position.turn())
    }

    fn is_capture(&self, mv: Move) -> bool {
        self.find(mv).map_or(false, |m| m.is_capture())
    }

    fn is_en_passant(&self, mv: Move) -> bool {
        self.find(mv).map_or(false, |m| m.is_en_passant())
    }

    fn ep_target_square(&self) -> Option<Square> {
        self.position.ep_square(EnPassantMode::Legal).map(from_shakmaty_square)
    }

    fn san_of(&self, mv: Move) -> Result<String, RulesError> {
        let m = self.find(mv).ok_or(RulesError::IllegalMove(mv))?;
        Ok(SanPlus::from_move(self.position.clone(), &m).to_string())
    }

    fn is_checkmate(&self) -> bool {
        self.position.is_checkmate()
    }

    fn is_stalemate(&self) -> bool {
        self.position.is_stalemate()
    }

    fn to_position_string(&self) -> String {
        Fen::from_position(self.position.clone(), EnPassantMode::Legal).to_string()
    }

    fn from_position_string(&mut self, text: &str) -> Result<(), RulesError> {
        let (pos, mode) = parse_position(text)?;
        self.load(pos, mode);
        Ok(())
    }

    fn initial_position_string(&self) -> String {
        Fen::from_position(self.initial.clone(), EnPassantMode::Legal).to_string()
    }

    fn reset(&mut self) {
        self.position = self.initial.clone();
        self.played.clear();
    }

    fn ply_count(&self) -> usize {
        self.played.len()
    }

    fn is_chess960(&self) -> bool {
        self.mode == CastlingMode::Chess960
    }
}

pub(crate) fn to_shakmaty_square(square: Square) -> shakmaty::Square {
    shakmaty::Square::new(u32::from(square.index()))
}

pub(crate) fn from_shakmaty_square(square: shakmaty::Square) -> Square {
    Square::from_board_index(u32::from(square) as u8)
}

fn from_color(color: Color) -> Side {
    match color {
        Color::White => Side::White,
        Color::Black => Side::Black,
    }
}

/// Converts a shakmaty move into board form; drop moves have none.
/// Castles go to the king's destination in standard chess. In Chess960 they
/// go to the rook's square, since the king's destination can also be the
/// target of a plain king move.
pub(crate) fn from_shakmaty(m: &shakmaty::Move, mode: CastlingMode) -> Option<Move> {
    match *m {
        shakmaty::Move::Normal { from, to, promotion, .. } => Some(Move {
            from: from_shakmaty_square(from),
            to: from_shakmaty_square(to),
            promotion: promotion.map(PieceKind::from_role),
        }),
        shakmaty::Move::EnPassant { from, to } => {
            Some(Move::new(from_shakmaty_square(from), from_shakmaty_square(to)))
        }
        shakmaty::Move::Castle { king, rook } => {
            let to = match mode {
                CastlingMode::Chess960 => rook,
                CastlingMode::Standard => castle_destination(king, rook),
            };
            Some(Move::new(from_shakmaty_square(king), from_shakmaty_square(to)))
        }
        shakmaty::Move::Put { .. } => None,
    }
}

/// Castles match either the king's destination or the rook's square.
fn matches_move(m: &shakmaty::Move, mv: Move) -> bool {
    if let shakmaty::Move::Castle { king, rook } = *m {
        if mv.promotion.is_some() || from_shakmaty_square(king) != mv.from {
            return false;
        }
        return from_shakmaty_square(rook) == mv.to || from_shakmaty_square(castle_destination(king, rook)) == mv.to;
    }
    from_shakmaty(m, CastlingMode::Standard) == Some(mv)
}

fn castle_destination(king: shakmaty::Square, rook: shakmaty::Square) -> shakmaty::Square {
    let file = if rook.file() > king.file() { File::G } else { File::C };
    shakmaty::Square::from_coords(file, king.rank())
}

/// White's back rank for Fischer random position `number`.
pub fn chess960_back_rank(number: u16) -> Option<[PieceKind; 8]> {
    const KNIGHTS: [(usize, usize); 10] =
        [(0, 1), (0, 2), (0, 3), (0, 4), (1, 2), (1, 3), (1, 4), (2, 3), (2, 4), (3, 4)];

    if number >= 960 {
        return None;
    }
    let mut rank: [Option<PieceKind>; 8] = [None; 8];
    let n = number as usize;
    rank[(n % 4) * 2 + 1] = Some(PieceKind::Bishop);
    let n = n / 4;
    rank[(n % 4) * 2] = Some(PieceKind::Bishop);
    let n = n / 4;
    let queen = n % 6;
    let (first, second) = KNIGHTS[n / 6];

    let empty: Vec<usize> = (0..8).filter(|&i| rank[i].is_none()).collect();
    rank[empty[queen]] = Some(PieceKind::Queen);
    let empty: Vec<usize> = (0..8).filter(|&i| rank[i].is_none()).collect();
    rank[empty[first]] = Some(PieceKind::Knight);
    rank[empty[second]] = Some(PieceKind::Knight);
    for (slot, kind) in (0..8)
        .filter(|&i| rank[i].is_none())
        .collect::<Vec<_>>()
        .into_iter()
        .zip([PieceKind::Rook, PieceKind::King, PieceKind::Rook])
    {
        rank[slot] = Some(kind);
    }

    let mut out = [PieceKind::Pawn; 8];
    for (slot, kind) in out.iter_mut().zip(rank) {
        *slot = kind?;
    }
    Some(out)
}

/// FEN of Fischer random position `number`.
pub fn chess960_fen(number: u16) -> Option<String> {
    let rank = chess960_back_rank(number)?;
    let white: String = rank.iter().map(|k| k.to_char().to_ascii_uppercase()).collect();
    let black = white.to_ascii_lowercase();
    Some(format!("{}/pppppppp/8/8/8/8/PPPPPPPP/{} w KQkq - 0 1", black, white))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(name: &str) -> Square {
        Square::parse(name).unwrap()
    }

    fn mv(text: &str) -> Move {
        Move::from_uci(text).unwrap()
    }

    #[test]
    fn test_push_and_pop_restore_position() {
        let mut rules = ShakmatyRules::new();
        let start = rules.to_position_string();
        rules.push(mv("e2e4")).unwrap();
        assert_eq!(rules.side_to_move(), Side::Black);
        assert_eq!(rules.ply_count(), 1);
        assert_eq!(rules.pop(), Some(mv("e2e4")));
        assert_eq!(rules.to_position_string(), start);
        assert_eq!(rules.pop(), None);
    }

    #[test]
    fn test_illegal_move_rejected() {
        let mut rules = ShakmatyRules::new();
        assert_eq!(rules.push(mv("e2e5")), Err(RulesError::IllegalMove(mv("e2e5"))));
        assert_eq!(rules.ply_count(), 0);
    }

    #[test]
    fn test_san_uses_position_before_move() {
        let mut rules = ShakmatyRules::new();
        assert_eq!(rules.san_of(mv("g1f3")).unwrap(), "Nf3");
        rules.push(mv("e2e4")).unwrap();
        assert_eq!(rules.san_of(mv("e7e5")).unwrap(), "e5");
    }

    #[test]
    fn test_castling_in_king_step_form() {
        let mut rules =
            ShakmatyRules::from_fen("r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R w KQkq - 0 1").unwrap();
        assert!(rules.legal_moves().contains(&mv("e1g1")));
        assert_eq!(rules.san_of(mv("e1g1")).unwrap(), "O-O");
        rules.push(mv("e1h1")).unwrap();
        assert_eq!(
            rules.piece_at(sq("g1")),
            Some(Piece::new(Side::White, PieceKind::King))
        );
        assert_eq!(
            rules.piece_at(sq("f1")),
            Some(Piece::new(Side::White, PieceKind::Rook))
        );
    }

    #[test]
    fn test_en_passant_detection() {
        let mut rules = ShakmatyRules::new();
        for m in ["e2e4", "a7a6", "e4e5", "d7d5"] {
            rules.push(mv(m)).unwrap();
        }
        assert_eq!(rules.ep_target_square(), Some(sq("d6")));
        assert!(rules.is_en_passant(mv("e5d6")));
        assert!(rules.is_capture(mv("e5d6")));
        assert!(!rules.is_capture(mv("e5e6")));
    }

    #[test]
    fn test_loaded_position_becomes_reset_target() {
        let fen = "7k/P7/8/8/8/8/8/K7 w - - 0 1";
        let mut rules = ShakmatyRules::from_fen(fen).unwrap();
        rules.push(mv("a7a8q")).unwrap();
        rules.reset();
        assert_eq!(rules.to_position_string(), fen);
        assert_eq!(rules.initial_position_string(), fen);
        assert!(rules.from_position_string("not a fen").is_err());
    }

    #[test]
    fn test_uci_parsing() {
        assert_eq!(mv("e7e8q").promotion, Some(PieceKind::Queen));
        assert_eq!(mv("e7e8q").to_string(), "e7e8q");
        assert!(Move::from_uci("e7e8x").is_none());
        assert!(Move::from_uci("e7").is_none());
    }

    #[test]
    fn test_chess960_numbering() {
        let standard = chess960_back_rank(STANDARD_CHESS960_NUMBER).unwrap();
        let letters: String = standard.iter().map(|k| k.to_char()).collect();
        assert_eq!(letters, "rnbqkbnr");
        assert_eq!(chess960_back_rank(0).unwrap().iter().map(|k| k.to_char()).collect::<String>(), "bbqnnrkr");
        assert!(chess960_back_rank(960).is_none());
        let rules = ShakmatyRules::chess960(0).unwrap();
        assert!(rules.is_chess960());
        assert_eq!(rules.legal_moves().len(), 20);
    }

    #[test]
    fn test_standard_position_leaves_chess960_mode() {
        let mut rules = ShakmatyRules::chess960(0).unwrap();
        rules.from_position_string(STARTING_FEN).unwrap();
        assert!(!rules.is_chess960());
        assert!(rules.legal_moves().contains(&mv("g1f3")));

        let standard_array = ShakmatyRules::chess960(STANDARD_CHESS960_NUMBER).unwrap();
        assert!(standard_array.is_chess960());
    }

    #[test]
    fn test_chess960_castle_next_to_plain_king_step() {
        let mut rules = ShakmatyRules::from_fen("4k3/8/8/8/8/8/8/5K1R w H - 0 1").unwrap();
        assert!(rules.is_chess960());
        let legal = rules.legal_moves();
        assert_eq!(legal.iter().filter(|&&m| m == mv("f1g1")).count(), 1);
        assert!(legal.contains(&mv("f1h1")));
        assert_eq!(rules.san_of(mv("f1g1")).unwrap(), "Kg1");
        assert_eq!(rules.san_of(mv("f1h1")).unwrap(), "O-O");

        rules.push(mv("f1h1")).unwrap();
        assert_eq!(rules.piece_at(sq("g1")), Some(Piece::new(Side::White, PieceKind::King)));
        assert_eq!(rules.piece_at(sq("f1")), Some(Piece::new(Side::White, PieceKind::Rook)));
        rules.pop();
        rules.push(mv("f1g1")).unwrap();
        assert_eq!(rules.piece_at(sq("h1")), Some(Piece::new(Side::White, PieceKind::Rook)));
    }
}
