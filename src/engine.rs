use std::time::Instant;

use rand::Rng;
use tracing::{debug, info, trace};

use crate::{
    belief::{standard_normal_cdf, Belief},
    error::EpError,
    matches::{MatchState, Outcome, PERFORMANCE_VARIANCE},
    outcome_index::OutcomeIndex,
    population::{Competitor, CompetitorId, PopulationState},
    Score,
};

pub const DEFAULT_ITERATIONS: usize = 100;
pub const DEFAULT_TOP_K: usize = 10;

#[derive(Debug, Clone)]
pub struct EngineBuilder {
    iterations: usize,
    top_k: usize,
    parallel: bool,
    progress_every: Option<usize>,
}

impl Default for EngineBuilder {
    fn default() -> EngineBuilder {
        EngineBuilder::new()
    }
}

impl EngineBuilder {
    pub fn new() -> EngineBuilder {
        EngineBuilder {
            iterations: DEFAULT_ITERATIONS,
            top_k: DEFAULT_TOP_K,
            parallel: true,
            progress_every: None,
        }
    }

    /// Number of rounds performed by [`InferenceEngine::fit`].
    pub fn iterations(&mut self, iterations: usize) -> &mut Self {
        self.iterations = iterations;
        self
    }

    /// Maximum length of [`InferenceEngine::rank`].
    pub fn top_k(&mut self, top_k: usize) -> &mut Self {
        assert!(top_k >= 1);
        self.top_k = top_k;
        self
    }

    /// Spread both passes of each round over the rayon thread pool. Results
    /// do not depend on this setting.
    pub fn parallel(&mut self, parallel: bool) -> &mut Self {
        self.parallel = parallel;
        self
    }

    /// Emit a progress event every `rounds` rounds. `0` disables progress
    /// events. Defaults to half the iteration budget of each run.
    pub fn progress_every(&mut self, rounds: usize) -> &mut Self {
        self.progress_every = Some(rounds);
        self
    }

    /// Validate the match log against the competitor list and set up the
    /// initial state: every marginal at the prior, every message uniform.
    pub fn build<I, N, O>(&self, competitors: I, outcomes: O) -> Result<InferenceEngine, EpError>
    where
        I: IntoIterator<Item = N>,
        N: Into<Box<str>>,
        O: IntoIterator<Item = Outcome>,
    {
        let population = PopulationState::new(competitors);
        let matches = MatchState::new(outcomes, population.len())?;
        let outcomes: Vec<Outcome> = matches.outcomes().collect();
        let index = OutcomeIndex::new(population.len(), &outcomes);

        Ok(InferenceEngine {
            population,
            matches,
            index,
            iterations: self.iterations,
            top_k: self.top_k,
            parallel: self.parallel,
            progress_every: self.progress_every,
            rounds_completed: 0,
        })
    }
}

/// A row of the final leaderboard.
#[derive(Debug, Clone, PartialEq)]
pub struct Standing {
    /// 1-based position.
    pub position: usize,
    pub id: CompetitorId,
    pub name: Box<str>,
    pub skill: Belief,
}

/// Expectation propagation over the factor graph of all recorded matches.
///
/// Each round first updates every competitor marginal from the downward
/// messages of the previous round and broadcasts it into the matches, then
/// updates every match from the broadcast marginals. Both passes complete
/// before the next one starts. A final competitor update after the last
/// round makes the marginals reflect the last match update.
#[derive(Debug, Clone)]
pub struct InferenceEngine {
    population: PopulationState,
    matches: MatchState,
    index: OutcomeIndex,
    iterations: usize,
    top_k: usize,
    parallel: bool,
    progress_every: Option<usize>,
    rounds_completed: usize,
}

impl InferenceEngine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn new<I, N, O>(competitors: I, outcomes: O) -> Result<InferenceEngine, EpError>
    where
        I: IntoIterator<Item = N>,
        N: Into<Box<str>>,
        O: IntoIterator<Item = Outcome>,
    {
        InferenceEngine::builder().build(competitors, outcomes)
    }

    pub fn population(&self) -> &PopulationState {
        &self.population
    }

    pub fn matches(&self) -> &MatchState {
        &self.matches
    }

    pub fn outcome_index(&self) -> &OutcomeIndex {
        &self.index
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn rounds_completed(&self) -> usize {
        self.rounds_completed
    }

    pub fn competitor(&self, id: CompetitorId) -> Option<&Competitor> {
        self.population.get(id)
    }

    pub fn marginal(&self, id: CompetitorId) -> Option<Belief> {
        self.population.marginal(id)
    }

    pub fn marginals(&self) -> impl ExactSizeIterator<Item = (CompetitorId, Belief)> + '_ {
        self.population
            .iter()
            .map(|(id, competitor)| (id, competitor.marginal))
    }

    /// Run the configured number of rounds.
    pub fn fit(&mut self) -> Result<(), EpError> {
        self.run(self.iterations)
    }

    /// Run a fixed number of rounds. There is no convergence check.
    ///
    /// Calling this again continues from the current state. A numerical
    /// failure aborts the run and leaves the state partially updated.
    pub fn run(&mut self, iterations: usize) -> Result<(), EpError> {
        let started = Instant::now();
        let progress_every = self.progress_every.unwrap_or(iterations / 2);

        info!(
            competitors = self.population.len(),
            matches = self.matches.len(),
            iterations,
            parallel = self.parallel,
            "starting expectation propagation"
        );

        for round in 1..=iterations {
            self.competitor_pass()?;
            self.match_pass()?;
            self.rounds_completed += 1;

            if progress_every != 0 && round % progress_every == 0 {
                debug!(
                    round,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "expectation propagation round completed"
                );
            }
        }
        self.competitor_pass()?;

        info!(
            rounds = self.rounds_completed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "finished expectation propagation"
        );
        Ok(())
    }

    fn competitor_pass(&mut self) -> Result<(), EpError> {
        trace!(round = self.rounds_completed, "competitor update");
        self.population
            .update(&self.matches, &self.index, self.parallel)?;
        self.matches.receive_marginals(&self.population, self.parallel);
        Ok(())
    }

    fn match_pass(&mut self) -> Result<(), EpError> {
        trace!(round = self.rounds_completed, "match update");
        assert_eq!(
            self.matches.received_round(),
            self.population.broadcast_round(),
            "match update must read the latest competitor marginals"
        );
        self.matches.update(self.parallel)
    }

    /// All competitors by descending marginal mean. Ties keep insertion
    /// order.
    pub fn standings(&self) -> Vec<Standing> {
        let mut standings: Vec<(CompetitorId, &Competitor)> = self.population.iter().collect();
        standings.sort_by(|(_, a), (_, b)| b.marginal.mean.total_cmp(&a.marginal.mean));
        standings
            .into_iter()
            .enumerate()
            .map(|(position, (id, competitor))| Standing {
                position: position + 1,
                id,
                name: competitor.name.clone(),
                skill: competitor.marginal,
            })
            .collect()
    }

    /// The top-K competitors by descending marginal mean.
    pub fn rank(&self) -> Vec<CompetitorId> {
        self.standings()
            .into_iter()
            .take(self.top_k)
            .map(|standing| standing.id)
            .collect()
    }

    /// Probability that `first` beats `second` under the probit model of
    /// the current marginals.
    pub fn win_probability(
        &self,
        first: CompetitorId,
        second: CompetitorId,
    ) -> Result<Score, EpError> {
        let first_skill = self.marginal(first).ok_or(EpError::UnknownId(first))?;
        let second_skill = self.marginal(second).ok_or(EpError::UnknownId(second))?;

        let variance = |id: CompetitorId, skill: Belief| {
            skill
                .variance()
                .map_err(|source| EpError::Competitor { index: id, source })
        };
        let spread = (PERFORMANCE_VARIANCE
            + variance(first, first_skill)?
            + variance(second, second_skill)?)
        .sqrt();

        Ok(Score(standard_normal_cdf(
            (first_skill.mean - second_skill.mean) / spread,
        )))
    }

    /// Sample the outcome of a match between `first` and `second`. Returns
    /// `(winner, loser)`.
    pub fn predict_outcome<R: Rng + ?Sized>(
        &self,
        first: CompetitorId,
        second: CompetitorId,
        rng: &mut R,
    ) -> Result<(CompetitorId, CompetitorId), EpError> {
        let probability = self.win_probability(first, second)?;
        let (winner, loser) = if rng.gen::<f64>() < probability.value() {
            (first, second)
        } else {
            (second, first)
        };

        if let (Some(w), Some(l)) = (self.competitor(winner), self.competitor(loser)) {
            debug!(
                probability = probability.value(),
                "{} beat {}",
                w.name,
                l.name
            );
        }
        Ok((winner, loser))
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    fn outcome(winner: usize, loser: usize) -> Outcome {
        Outcome::new(CompetitorId(winner), CompetitorId(loser))
    }

    #[test]
    fn test_build_rejects_malformed_log() {
        assert!(matches!(
            InferenceEngine::new(["a", "b"], [outcome(0, 2)]),
            Err(EpError::UnknownCompetitor { .. })
        ));
        assert!(matches!(
            InferenceEngine::new(["a", "b"], [outcome(1, 1)]),
            Err(EpError::SelfMatch { .. })
        ));
    }

    #[test]
    fn test_zero_iterations_leaves_priors() {
        let mut engine = InferenceEngine::new(["a", "b"], [outcome(0, 1)]).unwrap();
        engine.run(0).unwrap();
        for (_, skill) in engine.marginals() {
            assert_eq!(skill, Belief::STANDARD);
        }
        assert_eq!(engine.rounds_completed(), 0);
    }

    #[test]
    fn test_winner_ahead_after_single_match() {
        let mut engine = InferenceEngine::new(["a", "b"], [outcome(1, 0)]).unwrap();
        engine.fit().unwrap();
        assert_eq!(engine.rounds_completed(), DEFAULT_ITERATIONS);
        assert_eq!(engine.rank(), vec![CompetitorId(1), CompetitorId(0)]);
        assert!(engine.win_probability(CompetitorId(1), CompetitorId(0)).unwrap() > Score(0.5));
    }

    #[test]
    fn test_idle_competitor_keeps_prior() {
        let mut engine =
            InferenceEngine::new(["a", "b", "idle"], [outcome(0, 1), outcome(0, 1)]).unwrap();
        engine.run(20).unwrap();
        assert_eq!(engine.marginal(CompetitorId(2)), Some(Belief::STANDARD));
        assert_eq!(
            engine.competitor(CompetitorId(2)).unwrap().incoming,
            Belief::UNIFORM
        );
    }

    #[test]
    fn test_standings_and_top_k() {
        let mut engine = InferenceEngine::builder()
            .top_k(2)
            .build(
                ["a", "b", "c", "d"],
                [outcome(3, 2), outcome(2, 1), outcome(1, 0), outcome(3, 0)],
            )
            .unwrap();
        engine.run(50).unwrap();

        let standings = engine.standings();
        assert_eq!(standings.len(), 4);
        assert_eq!(standings[0].position, 1);
        assert_eq!(&*standings[0].name, "d");
        assert_eq!(&*standings[3].name, "a");
        assert_eq!(engine.rank(), vec![CompetitorId(3), CompetitorId(2)]);
    }

    #[test]
    fn test_rank_ties_keep_insertion_order() {
        let engine = InferenceEngine::new(["a", "b", "c"], Vec::new()).unwrap();
        assert_eq!(
            engine.rank(),
            vec![CompetitorId(0), CompetitorId(1), CompetitorId(2)]
        );
    }

    #[test]
    fn test_predict_outcome() {
        let mut engine = InferenceEngine::new(
            ["strong", "weak"],
            std::iter::repeat(outcome(0, 1)).take(20),
        )
        .unwrap();
        engine.run(30).unwrap();

        let mut rng = StdRng::seed_from_u64(7);
        let mut strong_wins = 0;
        for _ in 0..200 {
            let (winner, loser) = engine
                .predict_outcome(CompetitorId(1), CompetitorId(0), &mut rng)
                .unwrap();
            assert_ne!(winner, loser);
            if winner == CompetitorId(0) {
                strong_wins += 1;
            }
        }
        assert!(strong_wins > 150, "strong won only {strong_wins} of 200");

        assert_eq!(
            engine.predict_outcome(CompetitorId(0), CompetitorId(5), &mut rng),
            Err(EpError::UnknownId(CompetitorId(5)))
        );
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let names = ["a", "b", "c", "d", "e"];
        let log = [
            outcome(0, 1),
            outcome(1, 2),
            outcome(2, 3),
            outcome(3, 4),
            outcome(4, 0),
            outcome(0, 2),
            outcome(1, 3),
        ];
        let mut parallel = InferenceEngine::builder()
            .parallel(true)
            .build(names, log)
            .unwrap();
        let mut sequential = InferenceEngine::builder()
            .parallel(false)
            .build(names, log)
            .unwrap();
        parallel.run(40).unwrap();
        sequential.run(40).unwrap();

        assert!(parallel.marginals().eq(sequential.marginals()));
    }
}
