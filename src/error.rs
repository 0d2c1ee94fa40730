//! Error types shared across the controller.

use std::path::PathBuf;

use thiserror::Error;

use crate::coords::Square;
use crate::rules::Move;

/// A coordinate outside the 8x8 board. Raising one is a caller bug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidCoordinate {
    #[error("square file {file}, rank {rank} is off the board")]
    Square { file: u8, rank: u8 },
    #[error("cell column {col}, row {row} is off the board")]
    Cell { col: u8, row: u8 },
    #[error("square index {0} is off the board")]
    Index(u8),
}

/// Failures reported by the rules engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RulesError {
    #[error("{0} is not legal in the current position")]
    IllegalMove(Move),
    #[error("invalid position string: {0}")]
    InvalidPosition(String),
}

/// Failures reading a game record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("record file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("could not read {}: {reason}", .path.display())]
    Io { path: PathBuf, reason: String },
}

/// Failures from the external engine process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("engine unavailable: {0}")]
    Unavailable(String),
    #[error("engine returned no move")]
    NoMove,
    #[error("engine replied with a move that is not legal: {0}")]
    IllegalReply(String),
    #[error("engine request was cancelled")]
    Cancelled,
}

/// Failures loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Everything an interaction with the board controller can fail with.
///
/// None of these leave the rules engine and the history out of step; the
/// import error is the only one that leaves visible partial progress.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    #[error("no legal move from {from} to {to}")]
    IllegalMove { from: Square, to: Square },
    #[error("showing ply {shown} of {total}; return to the latest move first")]
    StaleHistory { shown: usize, total: usize },
    #[error("import stopped at ply {ply}: {reason}")]
    CorruptImport { ply: usize, reason: String },
    #[error("the engine is still thinking")]
    AwaitingEngine,
    #[error("a promotion piece must be chosen first")]
    AwaitingPromotion,
    #[error("no promotion is waiting for a choice")]
    NoPromotionPending,
    #[error("history index {0} is out of range")]
    OutOfRange(usize),
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Rules(#[from] RulesError),
    #[error(transparent)]
    Coordinate(#[from] InvalidCoordinate),
}
