//! Configuration for the board front ends.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::info;
use rand::Rng;
use serde::Deserialize;

use crate::engine::{EngineMoveProvider, SearchLimit, UciEngine};
use crate::error::ConfigError;
use crate::rules::Side;

/// Which sides the engine moves for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineSides {
    pub white: bool,
    pub black: bool,
}

impl EngineSides {
    pub fn plays(&self, side: Side) -> bool {
        match side {
            Side::White => self.white,
            Side::Black => self.black,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    // Board
    pub square_size: f32,
    pub show_labels: bool,
    pub flipped: bool,
    /// Start new games from a random Fischer random position.
    pub chess960: bool,

    // Engine
    pub engine_path: PathBuf,
    pub movetime_ms: Option<u64>,
    pub depth: Option<u32>,
    /// Seconds to wait for `uciok` and `readyok`.
    pub engine_timeout_secs: u64,
    pub engine_plays: EngineSides,
    pub engine_options: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        let mut engine_options = BTreeMap::new();
        engine_options.insert(String::from("Skill Level"), String::from("10"));
        engine_options.insert(String::from("UCI_Elo"), String::from("1399"));
        Self {
            square_size: 70.0,
            show_labels: true,
            flipped: false,
            chess960: false,
            engine_path: PathBuf::from("engine/stockfish"),
            movetime_ms: Some(100),
            depth: Some(1),
            engine_timeout_secs: 5,
            engine_plays: EngineSides::default(),
            engine_options,
        }
    }
}

impl Config {
    /// Reads a JSON config; fields it leaves out keep their defaults.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let text = fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    /// Like [`Config::load`], but a missing file gives the defaults.
    pub fn load_or_default(path: &Path) -> Result<Config, ConfigError> {
        match Config::load(path) {
            Err(ConfigError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {
                info!("no config at {}, using defaults", path.display());
                Ok(Config::default())
            }
            other => other,
        }
    }

    pub fn search_limit(&self) -> SearchLimit {
        SearchLimit { movetime_ms: self.movetime_ms, depth: self.depth }
    }

    pub fn engine_options(&self) -> Vec<(String, String)> {
        self.engine_options.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    pub fn engine_timeout(&self) -> Duration {
        Duration::from_secs(self.engine_timeout_secs)
    }

    /// The engine both front ends talk to.
    pub fn engine_provider(&self) -> EngineMoveProvider {
        let engine = UciEngine::new(&self.engine_path).with_handshake_timeout(self.engine_timeout());
        EngineMoveProvider::new(Arc::new(engine), self.search_limit(), self.engine_options())
    }

    /// Fischer random position number for a new game, if enabled.
    pub fn start_position_number(&self) -> Option<u16> {
        self.chess960.then(|| rand::thread_rng().gen_range(0..960))
    }
}
