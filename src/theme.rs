//! Board colours.

use once_cell::sync::Lazy;

use crate::overlay::MarkColor;
use crate::rules::{Piece, PieceKind, Side};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Parses `#rrggbb`.
    pub fn from_hex(text: &str) -> Option<Rgb> {
        let hex = text.strip_prefix('#')?;
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |at: usize| u8::from_str_radix(&hex[at..at + 2], 16).ok();
        Some(Rgb { r: channel(0)?, g: channel(2)?, b: channel(4)? })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub light_square: Rgb,
    pub dark_square: Rgb,
    pub last_move: Rgb,
    pub legal_marker: Rgb,
    pub blue: Rgb,
    pub red: Rgb,
    pub orange: Rgb,
}

impl Palette {
    pub fn mark(&self, color: MarkColor) -> Rgb {
        match color {
            MarkColor::Blue => self.blue,
            MarkColor::Red => self.red,
            MarkColor::Orange => self.orange,
        }
    }

    pub fn square(&self, light: bool) -> Rgb {
        if light {
            self.light_square
        } else {
            self.dark_square
        }
    }
}

const FALLBACK: Rgb = Rgb { r: 0x80, g: 0x80, b: 0x80 };

fn hex(text: &str) -> Rgb {
    Rgb::from_hex(text).unwrap_or(FALLBACK)
}

pub static PALETTE: Lazy<Palette> = Lazy::new(|| Palette {
    light_square: hex("#eeeed2"),
    dark_square: hex("#769656"),
    last_move: hex("#d7e81c"),
    legal_marker: hex("#3b3b3b"),
    blue: hex("#4287f5"),
    red: hex("#eb4034"),
    orange: hex("#f5a442"),
});

/// Chess symbol for a piece. The filled set is used for both sides so the
/// front end can colour them.
pub fn piece_glyph(kind: PieceKind) -> char {
    match kind {
        PieceKind::King => '\u{265A}',
        PieceKind::Queen => '\u{265B}',
        PieceKind::Rook => '\u{265C}',
        PieceKind::Bishop => '\u{265D}',
        PieceKind::Knight => '\u{265E}',
        PieceKind::Pawn => '\u{265F}',
    }
}

/// Glyph that tells the sides apart without colour.
pub fn outlined_glyph(piece: Piece) -> char {
    match piece.side {
        Side::Black => piece_glyph(piece.kind),
        Side::White => char::from_u32(piece_glyph(piece.kind) as u32 - 6).unwrap_or('?'),
    }
}
