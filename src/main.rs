use std::path::PathBuf;

use boardside::config::Config;
use boardside::gui;
use log::error;

fn main() -> iced::Result {
    env_logger::init();
    let path = std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("boardside.json"));
    let config = Config::load_or_default(&path).unwrap_or_else(|e| {
        error!("{}; using defaults", e);
        Config::default()
    });
    gui::run(config)
}
