#![no_main]

use arbitrary::{Arbitrary, Unstructured};
use epskill::{CompetitorId, EpError, InferenceEngine, Outcome};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct ArbitraryGame {
    winner: u8,
    loser: u8,
}

#[derive(Arbitrary, Debug)]
struct MatchLog {
    population: u8,
    games: Vec<ArbitraryGame>,
    iterations: u8,
}

fuzz_target!(|data: &[u8]| {
    let mut u = Unstructured::new(data);
    let Ok(log) = MatchLog::arbitrary(&mut u) else {
        return;
    };

    let population = usize::from(log.population % 32);
    let outcomes: Vec<Outcome> = log
        .games
        .iter()
        .map(|game| {
            Outcome::new(
                CompetitorId(usize::from(game.winner)),
                CompetitorId(usize::from(game.loser)),
            )
        })
        .collect();

    let mut engine = match InferenceEngine::builder()
        .parallel(false)
        .build((0..population).map(|i| i.to_string()), outcomes)
    {
        Ok(engine) => engine,
        Err(EpError::UnknownCompetitor { .. } | EpError::SelfMatch { .. }) => return,
        Err(err) => panic!("unexpected construction error: {err}"),
    };

    // Numerical failures must be reported, never produce improper beliefs.
    if engine.run(usize::from(log.iterations % 64)).is_ok() {
        for (id, skill) in engine.marginals() {
            assert!(skill.precision > 0.0, "competitor {id}: {skill:?}");
            assert!(skill.mean.is_finite(), "competitor {id}: {skill:?}");
        }
    }
});
