//! Object-per-entity formulation of the same algorithm.
//!
//! Every player and game owns its messages, and every message carries the
//! number of updates it went through. Paired messages must always agree on
//! that count. Messages are kept in moment form `(mean, variance)` and the
//! truncation step is computed here rather than through [`Belief`], so this
//! formulation shares no arithmetic with [`crate::InferenceEngine`]. It is
//! slower and strictly sequential, which makes it a convenient oracle for
//! testing.

use std::{
    f64::consts::{FRAC_1_SQRT_2, PI},
    marker::PhantomData,
};

use statrs::function::erf::erfc;

use crate::{
    belief::Belief,
    error::{BeliefError, EpError},
    matches::{MatchId, MatchState, MessageRole, Outcome, PERFORMANCE_VARIANCE},
    population::{CompetitorId, PRIOR},
};

/// Skill marginal held by a player.
#[derive(Debug, Copy, Clone)]
pub enum Marginal {}
/// Leave-one-out skill sent from a player into one game.
#[derive(Debug, Copy, Clone)]
pub enum SkillToGame {}
/// Performance difference implied by both skills and the noise.
#[derive(Debug, Copy, Clone)]
pub enum GameToPerformance {}
/// Performance difference conditioned on the observed winner.
#[derive(Debug, Copy, Clone)]
pub enum MarginalPerformance {}
/// Evidence of the outcome about the performance difference.
#[derive(Debug, Copy, Clone)]
pub enum PerformanceToGame {}
/// Evidence of one game about one player's skill.
#[derive(Debug, Copy, Clone)]
pub enum GameToSkill {}

/// A Gaussian message of kind `K` in moment form, together with the number
/// of updates that produced it. An infinite variance is the uniform
/// message.
#[derive(Debug, Copy, Clone)]
pub struct Message<K> {
    pub mean: f64,
    pub variance: f64,
    pub step: u64,
    kind: PhantomData<K>,
}

impl<K> Message<K> {
    fn uniform() -> Message<K> {
        Message::new(0.0, f64::INFINITY)
    }

    fn new(mean: f64, variance: f64) -> Message<K> {
        Message {
            mean,
            variance,
            step: 0,
            kind: PhantomData,
        }
    }

    fn set(&mut self, (mean, variance): (f64, f64)) {
        self.mean = mean;
        self.variance = variance;
        self.step += 1;
    }

    fn precision(&self) -> f64 {
        1.0 / self.variance
    }

    fn weighted_mean(&self) -> f64 {
        if self.variance.is_infinite() {
            0.0
        } else {
            self.mean / self.variance
        }
    }
}

fn assert_paired<A, B>(lhs: &Message<A>, rhs: &Message<B>) {
    assert_eq!(lhs.step, rhs.step, "paired messages out of step");
}

/// Quotient of two Gaussians in moment form.
fn divide<A, B>(
    numerator: &Message<A>,
    denominator: &Message<B>,
) -> Result<(f64, f64), BeliefError> {
    let precision = numerator.precision() - denominator.precision();
    if !(precision > 0.0) {
        return Err(BeliefError::NonPositivePrecision { precision });
    }
    let mean = (numerator.weighted_mean() - denominator.weighted_mean()) / precision;
    if !mean.is_finite() {
        return Err(BeliefError::NonFinite { mean, precision });
    }
    Ok((mean, 1.0 / precision))
}

/// Gaussian with the given mean whose variance is the sum of both operands'
/// variances and the performance noise.
fn with_noise<A, B>(mean: f64, lhs: &Message<A>, rhs: &Message<B>) -> (f64, f64) {
    (mean, PERFORMANCE_VARIANCE + lhs.variance + rhs.variance)
}

/// First two moments of a Gaussian truncated to positive values.
fn truncated_moments(mean: f64, variance: f64) -> Result<(f64, f64), BeliefError> {
    if !(variance > 0.0) {
        return Err(BeliefError::NonPositiveVariance { variance });
    }
    let std = variance.sqrt();
    let t = mean / std;
    let density = (-0.5 * t * t).exp() / (2.0 * PI).sqrt();
    let mass = 0.5 * erfc(-t * FRAC_1_SQRT_2);
    if !(mass > 0.0) {
        return Err(BeliefError::NoPositiveMass {
            mean,
            precision: 1.0 / variance,
        });
    }
    let ratio = density / mass;
    let variance = variance * (1.0 - ratio * (ratio + t));
    if !(variance > 0.0) {
        return Err(BeliefError::NonPositiveVariance { variance });
    }
    Ok((mean + std * ratio, variance))
}

#[derive(Debug, Clone)]
struct Player {
    prior: Belief,
    marginal: Message<Marginal>,
    games: Vec<usize>,
}

#[derive(Debug, Clone)]
struct Game {
    outcome: Outcome,
    skill_to_game_winner: Message<SkillToGame>,
    skill_to_game_loser: Message<SkillToGame>,
    game_to_performance: Message<GameToPerformance>,
    marginal_performance: Message<MarginalPerformance>,
    performance_to_game: Message<PerformanceToGame>,
    game_to_skill_winner: Message<GameToSkill>,
    game_to_skill_loser: Message<GameToSkill>,
}

impl Game {
    fn new(outcome: Outcome) -> Game {
        Game {
            outcome,
            skill_to_game_winner: Message::uniform(),
            skill_to_game_loser: Message::uniform(),
            game_to_performance: Message::uniform(),
            marginal_performance: Message::uniform(),
            performance_to_game: Message::uniform(),
            game_to_skill_winner: Message::uniform(),
            game_to_skill_loser: Message::uniform(),
        }
    }

    fn game_to_skill(&self, player: CompetitorId) -> &Message<GameToSkill> {
        if self.outcome.winner == player {
            &self.game_to_skill_winner
        } else {
            &self.game_to_skill_loser
        }
    }

    /// The game after one more round of messages.
    fn updated(
        &self,
        winner: &Message<Marginal>,
        loser: &Message<Marginal>,
    ) -> Result<Game, (MessageRole, BeliefError)> {
        let mut game = self.clone();

        assert_paired(winner, &game.game_to_skill_winner);
        game.skill_to_game_winner.set(
            divide(winner, &game.game_to_skill_winner)
                .map_err(|err| (MessageRole::UpwardWinner, err))?,
        );
        assert_paired(loser, &game.game_to_skill_loser);
        game.skill_to_game_loser.set(
            divide(loser, &game.game_to_skill_loser)
                .map_err(|err| (MessageRole::UpwardLoser, err))?,
        );

        let (w, l) = (game.skill_to_game_winner, game.skill_to_game_loser);
        assert_paired(&w, &l);
        game.game_to_performance.set(with_noise(w.mean - l.mean, &w, &l));

        let performance = game.game_to_performance;
        game.marginal_performance.set(
            truncated_moments(performance.mean, performance.variance)
                .map_err(|err| (MessageRole::MarginalPerformance, err))?,
        );

        assert_paired(&game.marginal_performance, &performance);
        game.performance_to_game.set(
            divide(&game.marginal_performance, &performance)
                .map_err(|err| (MessageRole::DownwardPerformance, err))?,
        );

        let down = game.performance_to_game;
        assert_paired(&down, &l);
        game.game_to_skill_winner
            .set(with_noise(l.mean + down.mean, &l, &down));
        assert_paired(&down, &w);
        game.game_to_skill_loser
            .set(with_noise(w.mean - down.mean, &w, &down));

        Ok(game)
    }
}

#[derive(Debug, Clone)]
pub struct ReferenceEngine {
    players: Vec<Player>,
    games: Vec<Game>,
}

impl ReferenceEngine {
    /// Validates the match log exactly like [`crate::InferenceEngine`].
    pub fn new<O>(population: usize, outcomes: O) -> Result<ReferenceEngine, EpError>
    where
        O: IntoIterator<Item = Outcome>,
    {
        let games: Vec<Game> = MatchState::new(outcomes, population)?
            .outcomes()
            .map(Game::new)
            .collect();

        let mut players: Vec<Player> = (0..population)
            .map(|_| Player {
                prior: PRIOR,
                marginal: Message::new(PRIOR.mean, 1.0 / PRIOR.precision),
                games: Vec::new(),
            })
            .collect();
        for (id, game) in games.iter().enumerate() {
            players[game.outcome.winner.0].games.push(id);
            players[game.outcome.loser.0].games.push(id);
        }

        Ok(ReferenceEngine { players, games })
    }

    pub fn marginal(&self, CompetitorId(id): CompetitorId) -> Option<Belief> {
        self.players
            .get(id)
            .map(|player| Belief::new(player.marginal.mean, player.marginal.precision()))
    }

    /// Run the given number of rounds. A failing round leaves every game as
    /// it was before that round, so the engine can be run again.
    pub fn run(&mut self, iterations: usize) -> Result<(), EpError> {
        for _ in 0..iterations {
            self.update_marginals();
            self.update_games()?;
        }
        self.update_marginals();
        Ok(())
    }

    fn update_marginals(&mut self) {
        for (id, player) in self.players.iter_mut().enumerate() {
            let mut precision = player.prior.precision;
            let mut weighted_mean = player.prior.natural_mean();
            let mut step = None;
            for &game in &player.games {
                let message = self.games[game].game_to_skill(CompetitorId(id));
                assert!(step.map_or(true, |step| step == message.step));
                step = Some(message.step);
                precision += message.precision();
                weighted_mean += message.weighted_mean();
            }
            player.marginal = Message {
                step: step.unwrap_or(player.marginal.step),
                ..Message::new(weighted_mean / precision, 1.0 / precision)
            };
        }
    }

    fn update_games(&mut self) -> Result<(), EpError> {
        let players = &self.players;
        self.games = self
            .games
            .iter()
            .enumerate()
            .map(|(index, game)| {
                game.updated(
                    &players[game.outcome.winner.0].marginal,
                    &players[game.outcome.loser.0].marginal,
                )
                .map_err(|(message, source)| EpError::Match {
                    index: MatchId(index),
                    message,
                    source,
                })
            })
            .collect::<Result<_, _>>()?;
        Ok(())
    }
}
