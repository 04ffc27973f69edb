use std::{error::Error as StdError, fs::File, path::Path};

use epskill::{EngineBuilder, InferenceEngine};
use tracing_subscriber::EnvFilter;

use crate::encounter::{read_games, read_players, IndexBase};

pub mod encounter;
pub mod player;

/// Log to stderr, filtered by `RUST_LOG` (default `info`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Load a competitor list and a match log from CSV files and set up an
/// engine over them.
pub fn load_engine(
    builder: &EngineBuilder,
    players: &Path,
    games: &Path,
    base: IndexBase,
) -> Result<(InferenceEngine, Vec<String>), Box<dyn StdError>> {
    let names = read_players(File::open(players)?)?;
    let outcomes = read_games(File::open(games)?, base)?;
    tracing::info!(
        players = names.len(),
        games = outcomes.len(),
        "loaded match log"
    );
    let engine = builder.build(names.iter().map(String::as_str), outcomes)?;
    Ok((engine, names))
}
