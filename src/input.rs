//! Pointer input as the board widget reports it.

use crate::coords::Point;
use crate::overlay::MarkColor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Left,
    Right,
}

/// Keyboard modifiers held during a pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers { ctrl: false, alt: false, shift: false };

    pub fn ctrl() -> Self {
        Modifiers { ctrl: true, ..Modifiers::NONE }
    }

    pub fn alt() -> Self {
        Modifiers { alt: true, ..Modifiers::NONE }
    }

    pub fn shift() -> Self {
        Modifiers { shift: true, ..Modifiers::NONE }
    }

    /// Annotation colour selected by exactly one held modifier.
    pub fn mark_color(self) -> Option<MarkColor> {
        match (self.ctrl, self.alt, self.shift) {
            (true, false, false) => Some(MarkColor::Blue),
            (false, true, false) => Some(MarkColor::Red),
            (false, false, true) => Some(MarkColor::Orange),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Pressed { point: Point, button: PointerButton, modifiers: Modifiers },
    Moved { point: Point },
    Released { point: Point },
}
