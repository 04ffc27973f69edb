use std::fmt;

use rayon::prelude::*;

use crate::{
    belief::Belief, error::EpError, matches::MatchState, outcome_index::OutcomeIndex,
};

/// Prior skill belief of every competitor.
pub const PRIOR: Belief = Belief::STANDARD;

/// Index of a competitor in the population, in insertion order.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct CompetitorId(pub usize);

impl From<CompetitorId> for usize {
    #[inline]
    fn from(CompetitorId(id): CompetitorId) -> usize {
        id
    }
}

impl From<usize> for CompetitorId {
    #[inline]
    fn from(id: usize) -> CompetitorId {
        CompetitorId(id)
    }
}

impl fmt::Display for CompetitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Competitor {
    /// Display name.
    pub name: Box<str>,
    pub prior: Belief,
    /// Current posterior estimate of the skill.
    pub marginal: Belief,
    /// Product of all downward messages from the matches this competitor
    /// played, as of the last competitor update.
    pub incoming: Belief,
}

impl Competitor {
    fn new(name: Box<str>) -> Competitor {
        Competitor {
            name,
            prior: PRIOR,
            marginal: PRIOR,
            incoming: Belief::UNIFORM,
        }
    }

    fn update(
        &mut self,
        matches: &MatchState,
        index: &OutcomeIndex,
        id: CompetitorId,
    ) -> Result<(), EpError> {
        let mut natural_mean = 0.0;
        let mut precision = 0.0;

        for message in index
            .wins(id)
            .iter()
            .filter_map(|&m| matches.get(m))
            .map(|m| m.messages.downward_winner)
            .chain(
                index
                    .losses(id)
                    .iter()
                    .filter_map(|&m| matches.get(m))
                    .map(|m| m.messages.downward_loser),
            )
        {
            natural_mean += message.natural_mean();
            precision += message.precision;
        }

        self.incoming = Belief::from_natural(natural_mean, precision);
        self.marginal = self
            .prior
            .product(self.incoming)
            .checked()
            .map_err(|source| EpError::Competitor { index: id, source })?;
        Ok(())
    }
}

/// Per-competitor table of prior, marginal and aggregated incoming belief.
#[derive(Debug, Clone)]
pub struct PopulationState {
    competitors: Vec<Competitor>,
    broadcast_round: u64,
}

impl PopulationState {
    pub fn new<I, N>(names: I) -> PopulationState
    where
        I: IntoIterator<Item = N>,
        N: Into<Box<str>>,
    {
        PopulationState {
            competitors: names
                .into_iter()
                .map(|name| Competitor::new(name.into()))
                .collect(),
            broadcast_round: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.competitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.competitors.is_empty()
    }

    pub fn get(&self, CompetitorId(id): CompetitorId) -> Option<&Competitor> {
        self.competitors.get(id)
    }

    pub fn marginal(&self, id: CompetitorId) -> Option<Belief> {
        self.get(id).map(|competitor| competitor.marginal)
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = (CompetitorId, &Competitor)> + '_ {
        self.competitors
            .iter()
            .enumerate()
            .map(|(id, competitor)| (CompetitorId(id), competitor))
    }

    /// Number of completed competitor updates. Each one is immediately
    /// broadcast into the match table.
    pub fn broadcast_round(&self) -> u64 {
        self.broadcast_round
    }

    /// Recompute every marginal as the prior times the product of the
    /// downward messages currently held by `matches`.
    ///
    /// Competitors without recorded matches keep their prior.
    pub(crate) fn update(
        &mut self,
        matches: &MatchState,
        index: &OutcomeIndex,
        parallel: bool,
    ) -> Result<(), EpError> {
        let update = |(id, competitor): (usize, &mut Competitor)| {
            let id = CompetitorId(id);
            competitor.update(matches, index, id).err().map(|err| (id, err))
        };

        let failure = if parallel {
            self.competitors
                .par_iter_mut()
                .enumerate()
                .filter_map(update)
                .min_by_key(|(id, _)| *id)
        } else {
            self.competitors
                .iter_mut()
                .enumerate()
                .filter_map(update)
                .min_by_key(|(id, _)| *id)
        };

        self.broadcast_round += 1;

        match failure {
            Some((_, err)) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matches::Outcome;

    #[test]
    fn test_new_population_starts_at_prior() {
        let population = PopulationState::new(["alice", "bob"]);
        assert_eq!(population.len(), 2);
        for (_, competitor) in population.iter() {
            assert_eq!(competitor.marginal, PRIOR);
            assert_eq!(competitor.incoming, Belief::UNIFORM);
        }
        assert_eq!(&*population.get(CompetitorId(1)).unwrap().name, "bob");
        assert!(population.get(CompetitorId(2)).is_none());
    }

    #[test]
    fn test_update_with_zero_messages_keeps_prior() {
        let outcomes = vec![Outcome::new(CompetitorId(0), CompetitorId(1))];
        let matches = MatchState::new(outcomes.clone(), 3).unwrap();
        let index = OutcomeIndex::new(3, &outcomes);
        let mut population = PopulationState::new(["a", "b", "idle"]);

        population.update(&matches, &index, false).unwrap();

        assert_eq!(population.broadcast_round(), 1);
        for (_, competitor) in population.iter() {
            assert_eq!(competitor.marginal, PRIOR);
        }
    }
}
