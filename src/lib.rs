//! Board interaction controller for a chess GUI.
//!
//! Turns clicks and drags on a rendered board into moves checked by a rules
//! engine, and keeps move history, annotations and captured pieces in step
//! with the position the board shows.

pub mod captures;
pub mod config;
pub mod controller;
pub mod coords;
pub mod engine;
pub mod error;
pub mod executor;
pub mod gui;
pub mod history;
pub mod import;
pub mod input;
pub mod overlay;
pub mod record;
pub mod render;
pub mod rules;
pub mod selection;
pub mod theme;
pub mod tui;

pub use controller::{BoardController, ControllerState, Outcome};
pub use coords::{Cell, CoordinateMapper, Point, Square};
pub use error::ControllerError;
pub use rules::{Move, PieceKind, RulesEngine, ShakmatyRules, Side};
