use std::fmt;

use rayon::prelude::*;

use crate::{
    belief::Belief,
    error::{BeliefError, EpError},
    population::{CompetitorId, PopulationState},
};

/// Variance of the intrinsic noise added to the skill difference to form a
/// match performance.
pub const PERFORMANCE_VARIANCE: f64 = 1.0;

/// Index of a match in the match log.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MatchId(pub usize);

impl From<MatchId> for usize {
    #[inline]
    fn from(MatchId(id): MatchId) -> usize {
        id
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A recorded pairwise result. There are no draws.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Outcome {
    pub winner: CompetitorId,
    pub loser: CompetitorId,
}

impl Outcome {
    #[inline]
    pub fn new(winner: CompetitorId, loser: CompetitorId) -> Outcome {
        Outcome { winner, loser }
    }

    fn validate(self, index: MatchId, population: usize) -> Result<Outcome, EpError> {
        for competitor in [self.winner, self.loser] {
            if competitor.0 >= population {
                return Err(EpError::UnknownCompetitor {
                    index,
                    competitor,
                    population,
                });
            }
        }
        if self.winner == self.loser {
            return Err(EpError::SelfMatch {
                index,
                competitor: self.winner,
            });
        }
        Ok(self)
    }
}

/// Role of a message slot in the local factor graph of a match.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum MessageRole {
    UpwardWinner,
    UpwardLoser,
    UpwardPerformance,
    MarginalPerformance,
    DownwardPerformance,
    DownwardLoser,
    DownwardWinner,
    BroadcastMarginalWinner,
    BroadcastMarginalLoser,
}

impl MessageRole {
    pub const ALL: [MessageRole; 9] = [
        MessageRole::UpwardWinner,
        MessageRole::UpwardLoser,
        MessageRole::UpwardPerformance,
        MessageRole::MarginalPerformance,
        MessageRole::DownwardPerformance,
        MessageRole::DownwardLoser,
        MessageRole::DownwardWinner,
        MessageRole::BroadcastMarginalWinner,
        MessageRole::BroadcastMarginalLoser,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MessageRole::UpwardWinner => "upward winner",
            MessageRole::UpwardLoser => "upward loser",
            MessageRole::UpwardPerformance => "upward performance",
            MessageRole::MarginalPerformance => "marginal performance",
            MessageRole::DownwardPerformance => "downward performance",
            MessageRole::DownwardLoser => "downward loser",
            MessageRole::DownwardWinner => "downward winner",
            MessageRole::BroadcastMarginalWinner => "broadcast marginal winner",
            MessageRole::BroadcastMarginalLoser => "broadcast marginal loser",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The nine messages flowing through the factor graph of a single match.
///
/// Upward messages flow from the competitors' skills towards the observed
/// outcome, downward messages flow back. The broadcast slots hold the
/// competitors' marginals as of the last competitor update.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct MatchMessages {
    pub upward_winner: Belief,
    pub upward_loser: Belief,
    pub upward_performance: Belief,
    pub marginal_performance: Belief,
    pub downward_performance: Belief,
    pub downward_loser: Belief,
    pub downward_winner: Belief,
    pub broadcast_marginal_winner: Belief,
    pub broadcast_marginal_loser: Belief,
}

impl MatchMessages {
    pub fn get(&self, role: MessageRole) -> Belief {
        match role {
            MessageRole::UpwardWinner => self.upward_winner,
            MessageRole::UpwardLoser => self.upward_loser,
            MessageRole::UpwardPerformance => self.upward_performance,
            MessageRole::MarginalPerformance => self.marginal_performance,
            MessageRole::DownwardPerformance => self.downward_performance,
            MessageRole::DownwardLoser => self.downward_loser,
            MessageRole::DownwardWinner => self.downward_winner,
            MessageRole::BroadcastMarginalWinner => self.broadcast_marginal_winner,
            MessageRole::BroadcastMarginalLoser => self.broadcast_marginal_loser,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (MessageRole, Belief)> + '_ {
        MessageRole::ALL.into_iter().map(|role| (role, self.get(role)))
    }

    /// One pass over the local factor graph, reading the broadcast marginals
    /// and the downward messages sent in the previous pass.
    pub fn update(&mut self) -> Result<(), (MessageRole, BeliefError)> {
        use MessageRole::*;

        // Leave out the contribution this match made to each marginal.
        self.upward_winner = self
            .broadcast_marginal_winner
            .divide(self.downward_winner)
            .map_err(|err| (UpwardWinner, err))?;
        self.upward_loser = self
            .broadcast_marginal_loser
            .divide(self.downward_loser)
            .map_err(|err| (UpwardLoser, err))?;

        self.upward_performance = through_performance(
            self.upward_winner.mean - self.upward_loser.mean,
            self.upward_winner,
            self.upward_loser,
        )
        .map_err(|err| (UpwardPerformance, err))?;

        // The winner's performance exceeded the loser's.
        self.marginal_performance = self
            .upward_performance
            .truncate_positive()
            .map_err(|err| (MarginalPerformance, err))?;

        self.downward_performance = self
            .marginal_performance
            .divide(self.upward_performance)
            .map_err(|err| (DownwardPerformance, err))?;

        self.downward_winner = through_performance(
            self.upward_loser.mean + self.downward_performance.mean,
            self.upward_loser,
            self.downward_performance,
        )
        .map_err(|err| (DownwardWinner, err))?;
        self.downward_loser = through_performance(
            self.upward_winner.mean - self.downward_performance.mean,
            self.upward_winner,
            self.downward_performance,
        )
        .map_err(|err| (DownwardLoser, err))?;

        Ok(())
    }
}

/// Belief with the given mean and the variances of both operands plus the
/// performance noise.
fn through_performance(mean: f64, lhs: Belief, rhs: Belief) -> Result<Belief, BeliefError> {
    Belief::from_mean_variance(mean, PERFORMANCE_VARIANCE + lhs.variance()? + rhs.variance()?)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub outcome: Outcome,
    pub messages: MatchMessages,
}

/// Per-match table of message slots.
#[derive(Debug, Clone)]
pub struct MatchState {
    matches: Vec<Match>,
    round: u64,
    received_round: u64,
}

impl MatchState {
    /// Validate the match log against a population of the given size. All
    /// messages start out as [`Belief::UNIFORM`].
    pub fn new<I>(outcomes: I, population: usize) -> Result<MatchState, EpError>
    where
        I: IntoIterator<Item = Outcome>,
    {
        Ok(MatchState {
            matches: outcomes
                .into_iter()
                .enumerate()
                .map(|(index, outcome)| {
                    Ok(Match {
                        outcome: outcome.validate(MatchId(index), population)?,
                        messages: MatchMessages::default(),
                    })
                })
                .collect::<Result<_, EpError>>()?,
            round: 0,
            received_round: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn get(&self, MatchId(id): MatchId) -> Option<&Match> {
        self.matches.get(id)
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = (MatchId, &Match)> + '_ {
        self.matches
            .iter()
            .enumerate()
            .map(|(id, m)| (MatchId(id), m))
    }

    pub fn outcomes(&self) -> impl ExactSizeIterator<Item = Outcome> + '_ {
        self.matches.iter().map(|m| m.outcome)
    }

    /// Number of completed match updates.
    pub fn round(&self) -> u64 {
        self.round
    }

    /// The competitor update whose marginals the broadcast slots hold.
    pub fn received_round(&self) -> u64 {
        self.received_round
    }

    /// Copy the current marginals of both participants into every match.
    pub(crate) fn receive_marginals(&mut self, population: &PopulationState, parallel: bool) {
        let receive = |m: &mut Match| {
            if let Some(marginal) = population.marginal(m.outcome.winner) {
                m.messages.broadcast_marginal_winner = marginal;
            }
            if let Some(marginal) = population.marginal(m.outcome.loser) {
                m.messages.broadcast_marginal_loser = marginal;
            }
        };

        if parallel {
            self.matches.par_iter_mut().for_each(receive);
        } else {
            self.matches.iter_mut().for_each(receive);
        }

        self.received_round = population.broadcast_round();
    }

    /// Update the messages of every match. Matches are independent of each
    /// other, and every match is visited even after a failure, so parallel
    /// and sequential passes leave the same state. On failure the lowest
    /// failing match is reported.
    pub(crate) fn update(&mut self, parallel: bool) -> Result<(), EpError> {
        let update = |(index, m): (usize, &mut Match)| {
            let index = MatchId(index);
            m.messages.update().err().map(|(message, source)| {
                (
                    index,
                    EpError::Match {
                        index,
                        message,
                        source,
                    },
                )
            })
        };

        let failure = if parallel {
            self.matches
                .par_iter_mut()
                .enumerate()
                .filter_map(update)
                .min_by_key(|(index, _)| *index)
        } else {
            self.matches
                .iter_mut()
                .enumerate()
                .filter_map(update)
                .min_by_key(|(index, _)| *index)
        };

        self.round += 1;

        match failure {
            Some((_, err)) => Err(err),
            None => Ok(()),
        }
    }
}
