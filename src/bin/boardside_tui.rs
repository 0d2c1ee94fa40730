use std::path::PathBuf;
use std::process::ExitCode;

use boardside::config::Config;
use boardside::tui;
use log::error;

fn main() -> ExitCode {
    env_logger::init();
    let path = std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("boardside.json"));
    let config = match Config::load_or_default(&path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = tui::run(config) {
        error!("terminal session ended: {}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
