use std::{error::Error as StdError, path::PathBuf};

use clap::Parser as _;
use compensated_summation::KahanBabuskaNeumaier;
use epskill::{deviance, InferenceEngine, Score, DEFAULT_ITERATIONS, DEFAULT_TOP_K};
use epskill_research::{encounter::IndexBase, init_tracing, load_engine};
use ordered_float::OrderedFloat;

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(clap::Parser)]
struct Opt {
    /// CSV with a `name` column. Row order defines competitor ids.
    #[clap(long)]
    players: PathBuf,
    /// CSV with `winner` and `loser` (or `losser`) id columns.
    #[clap(long)]
    games: PathBuf,
    #[clap(long, default_value = "1")]
    index_base: IndexBase,
    #[clap(long, default_value_t = DEFAULT_ITERATIONS)]
    iterations: usize,
    #[clap(long, default_value_t = DEFAULT_TOP_K)]
    top: usize,
    #[clap(long)]
    sequential: bool,
}

fn avg_deviance(engine: &InferenceEngine) -> Result<f64, epskill::EpError> {
    let mut total = KahanBabuskaNeumaier::default();
    for outcome in engine.matches().outcomes() {
        total += deviance(
            engine.win_probability(outcome.winner, outcome.loser)?,
            Score::WIN,
        );
    }
    Ok(total.total() / engine.matches().len() as f64)
}

fn percentiles(engine: &InferenceEngine) -> (f64, f64, f64, f64, f64) {
    let mut samples: Vec<OrderedFloat<f64>> = engine
        .marginals()
        .map(|(_, skill)| OrderedFloat(skill.mean))
        .collect();

    samples.sort_unstable();

    let p = |x: usize| {
        samples
            .get(samples.len() * x / 100)
            .copied()
            .map(f64::from)
            .unwrap_or(f64::NAN)
    };

    (p(1), p(10), p(50), p(90), p(99))
}

fn main() -> Result<(), Box<dyn StdError>> {
    init_tracing();
    let opt = Opt::parse();

    let (mut engine, _) = load_engine(
        InferenceEngine::builder()
            .iterations(opt.iterations)
            .top_k(opt.top.max(1))
            .parallel(!opt.sequential),
        &opt.players,
        &opt.games,
        opt.index_base,
    )?;

    engine.fit()?;

    for standing in engine.standings().into_iter().take(engine.top_k()) {
        println!(
            "Position #{}: {} (mean {:.3}, std {:.3})",
            standing.position,
            standing.name,
            standing.skill.mean,
            standing.skill.std()?
        );
    }

    println!("# ---");
    let (p1, p10, median, p90, p99) = percentiles(&engine);
    println!("# Skill distribution: p1 {p1:.3}, p10 {p10:.3}, median {median:.3}, p90 {p90:.3}, p99 {p99:.3}");
    if !engine.matches().is_empty() {
        println!("# Average deviance: {:.5}", avg_deviance(&engine)?);
    }
    println!(
        "# Competitors: {}, games: {}, rounds: {}",
        engine.population().len(),
        engine.matches().len(),
        engine.rounds_completed()
    );

    Ok(())
}
