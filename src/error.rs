use thiserror::Error;

use crate::{matches::MessageRole, CompetitorId, MatchId};

/// Failure of a Gaussian belief operation. Beliefs must keep a strictly
/// positive precision, and nothing is clamped to make them do so.
#[derive(Debug, Copy, Clone, PartialEq, Error)]
pub enum BeliefError {
    #[error("non-positive precision {precision}")]
    NonPositivePrecision { precision: f64 },
    #[error("non-positive variance {variance}")]
    NonPositiveVariance { variance: f64 },
    #[error("non-finite belief (mean {mean}, precision {precision})")]
    NonFinite { mean: f64, precision: f64 },
    #[error("belief (mean {mean}, precision {precision}) has no representable mass above zero")]
    NoPositiveMass { mean: f64, precision: f64 },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EpError {
    #[error("match {index}: unknown competitor {competitor} (population of {population})")]
    UnknownCompetitor {
        index: MatchId,
        competitor: CompetitorId,
        population: usize,
    },
    #[error("match {index}: competitor {competitor} cannot play against itself")]
    SelfMatch {
        index: MatchId,
        competitor: CompetitorId,
    },
    #[error("match {index}: {message} message: {source}")]
    Match {
        index: MatchId,
        message: MessageRole,
        #[source]
        source: BeliefError,
    },
    #[error("competitor {index}: marginal: {source}")]
    Competitor {
        index: CompetitorId,
        #[source]
        source: BeliefError,
    },
    #[error("unknown competitor {0}")]
    UnknownId(CompetitorId),
}
