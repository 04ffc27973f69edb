use crate::{matches::MatchId, matches::Outcome, CompetitorId};

/// Adjacency lists from competitors to the matches they won and lost.
/// Built once from a validated match log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutcomeIndex {
    wins: Vec<Vec<MatchId>>,
    losses: Vec<Vec<MatchId>>,
}

impl OutcomeIndex {
    /// Outcomes referencing competitors outside `0..population` are
    /// ignored.
    pub fn new(population: usize, outcomes: &[Outcome]) -> OutcomeIndex {
        let mut index = OutcomeIndex {
            wins: vec![Vec::new(); population],
            losses: vec![Vec::new(); population],
        };
        for (id, outcome) in outcomes.iter().enumerate() {
            if let Some(wins) = index.wins.get_mut(outcome.winner.0) {
                wins.push(MatchId(id));
            }
            if let Some(losses) = index.losses.get_mut(outcome.loser.0) {
                losses.push(MatchId(id));
            }
        }
        index
    }

    pub fn len(&self) -> usize {
        self.wins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wins.is_empty()
    }

    pub fn wins(&self, CompetitorId(id): CompetitorId) -> &[MatchId] {
        self.wins.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn losses(&self, CompetitorId(id): CompetitorId) -> &[MatchId] {
        self.losses.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of matches the competitor took part in.
    pub fn played(&self, id: CompetitorId) -> usize {
        self.wins(id).len() + self.losses(id).len()
    }
}
