use std::{fmt, io, str::FromStr};

use epskill::{CompetitorId, Outcome};
use serde::Deserialize;
use thiserror::Error;

#[derive(Deserialize, Debug)]
pub struct RawPlayer {
    pub name: String,
}

#[derive(Deserialize, Debug, Copy, Clone)]
pub struct RawGame {
    pub winner: usize,
    #[serde(alias = "losser")]
    pub loser: usize,
}

/// Whether competitor ids in a match log count from `0` or from `1`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum IndexBase {
    Zero,
    #[default]
    One,
}

#[derive(Debug, Error)]
#[error("invalid index base (expected 0 or 1)")]
pub struct InvalidIndexBase;

impl FromStr for IndexBase {
    type Err = InvalidIndexBase;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "0" | "zero" => IndexBase::Zero,
            "1" | "one" => IndexBase::One,
            _ => return Err(InvalidIndexBase),
        })
    }
}

impl fmt::Display for IndexBase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            IndexBase::Zero => "0",
            IndexBase::One => "1",
        })
    }
}

impl IndexBase {
    pub fn normalize(self, id: usize) -> Option<CompetitorId> {
        match self {
            IndexBase::Zero => Some(CompetitorId(id)),
            IndexBase::One => id.checked_sub(1).map(CompetitorId),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("game {row}: id {id} is invalid in {base}-based indexing")]
    InvalidId { row: usize, id: usize, base: IndexBase },
}

impl RawGame {
    pub fn to_outcome(self, base: IndexBase, row: usize) -> Result<Outcome, LoadError> {
        let normalize = |id| base.normalize(id).ok_or(LoadError::InvalidId { row, id, base });
        Ok(Outcome::new(normalize(self.winner)?, normalize(self.loser)?))
    }
}

/// Competitor names in id order.
pub fn read_players<R: io::Read>(reader: R) -> Result<Vec<String>, LoadError> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut names = Vec::new();
    for player in reader.deserialize() {
        let player: RawPlayer = player?;
        names.push(player.name);
    }
    Ok(names)
}

pub fn read_games<R: io::Read>(reader: R, base: IndexBase) -> Result<Vec<Outcome>, LoadError> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut outcomes = Vec::new();
    for (row, game) in reader.deserialize().enumerate() {
        let game: RawGame = game?;
        outcomes.push(game.to_outcome(base, row)?);
    }
    Ok(outcomes)
}
