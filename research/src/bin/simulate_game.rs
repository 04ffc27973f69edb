use std::{error::Error as StdError, path::PathBuf};

use clap::Parser as _;
use epskill::{InferenceEngine, DEFAULT_ITERATIONS};
use epskill_research::{encounter::IndexBase, init_tracing, load_engine, player::PlayerIds};
use rand::{rngs::StdRng, SeedableRng};
use thiserror::Error;

#[derive(clap::Parser)]
struct Opt {
    #[clap(long)]
    players: PathBuf,
    #[clap(long)]
    games: PathBuf,
    #[clap(long, default_value = "1")]
    index_base: IndexBase,
    #[clap(long, default_value_t = DEFAULT_ITERATIONS)]
    iterations: usize,
    /// Name of the first competitor.
    #[clap(long)]
    first: String,
    /// Name of the second competitor.
    #[clap(long)]
    second: String,
    /// Seed for a reproducible outcome.
    #[clap(long)]
    seed: Option<u64>,
}

#[derive(Debug, Error)]
#[error("unknown player: {0}")]
struct UnknownPlayer(String);

fn main() -> Result<(), Box<dyn StdError>> {
    init_tracing();
    let opt = Opt::parse();

    let (mut engine, names) = load_engine(
        InferenceEngine::builder().iterations(opt.iterations),
        &opt.players,
        &opt.games,
        opt.index_base,
    )?;
    let players = PlayerIds::from_names(&names);

    let lookup = |name: &str| {
        players
            .get(name)
            .ok_or_else(|| UnknownPlayer(name.to_owned()))
    };
    let first = lookup(&opt.first)?;
    let second = lookup(&opt.second)?;

    engine.fit()?;

    let probability = engine.win_probability(first, second)?;
    println!(
        "P({} beats {}) = {:.4}",
        opt.first,
        opt.second,
        probability.value()
    );

    let mut rng = match opt.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let (winner, loser) = engine.predict_outcome(first, second, &mut rng)?;
    println!("{} beat {}", names[winner.0], names[loser.0]);

    Ok(())
}
