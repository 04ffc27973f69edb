//! Latent skill ranking from pairwise win/loss outcomes.
//!
//! Every competitor has a Gaussian skill belief. Every match is a noisy
//! comparison of the two skills, where the winner's performance exceeded
//! the loser's. Expectation propagation approximates the posterior skill
//! of each competitor by passing Gaussian messages between competitors and
//! matches for a fixed number of rounds.
//!
//! ```
//! use epskill::{CompetitorId, InferenceEngine, Outcome};
//!
//! let mut engine = InferenceEngine::new(
//!     ["alice", "bob", "carol"],
//!     [
//!         Outcome::new(CompetitorId(0), CompetitorId(1)),
//!         Outcome::new(CompetitorId(1), CompetitorId(2)),
//!         Outcome::new(CompetitorId(0), CompetitorId(2)),
//!     ],
//! )?;
//! engine.run(50)?;
//!
//! assert_eq!(
//!     engine.rank(),
//!     vec![CompetitorId(0), CompetitorId(1), CompetitorId(2)]
//! );
//! # Ok::<_, epskill::EpError>(())
//! ```

pub mod belief;
mod engine;
mod error;
pub mod matches;
mod outcome_index;
mod population;
pub mod reference;
mod score;

pub use belief::Belief;
pub use engine::{EngineBuilder, InferenceEngine, Standing, DEFAULT_ITERATIONS, DEFAULT_TOP_K};
pub use error::{BeliefError, EpError};
pub use matches::{
    Match, MatchId, MatchMessages, MatchState, MessageRole, Outcome, PERFORMANCE_VARIANCE,
};
pub use outcome_index::OutcomeIndex;
pub use population::{Competitor, CompetitorId, PopulationState, PRIOR};
pub use score::Score;

/// Log likelihood deviance metric that can be used to evaluate the quality of
/// predictions.
///
/// Lower is better.
///
/// See https://www.kaggle.com/c/ChessRatings2/overview/evaluation.
pub fn deviance(Score(expected): Score, Score(actual): Score) -> f64 {
    let expected = expected.clamp(0.01, 0.99);
    -(actual * expected.log10() + (1.0 - actual) * (1.0 - expected).log10())
}
