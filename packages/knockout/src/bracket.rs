//! Single-elimination bracket with head-to-head matches.
//!
//! Contestants are drawn from a shuffled pool two at a time. Within a match
//! the two players alternate answering questions; the first to reach
//! [`MatchRules::points_to_win`] advances, otherwise the higher score after
//! [`MatchRules::questions_per_player`] questions each advances and a tie is
//! settled by a coin flip. An odd contestant out gets a bye. Winners of a
//! round form the next round's pool until a single champion is left.

use std::{
    collections::{BTreeMap, BTreeSet, VecDeque},
    time::Duration,
};

use rand::{Rng, seq::SliceRandom as _};

use crate::KnockoutError;

/// Anything that can be placed in a bracket.
pub trait Contestant: Clone {
    fn name(&self) -> &str;
}

impl Contestant for String {
    fn name(&self) -> &str {
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchRules {
    pub questions_per_player: u32,
    pub points_to_win: u32,
}

impl Default for MatchRules {
    fn default() -> Self {
        Self {
            questions_per_player: 3,
            points_to_win: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Knockout,
    SemiFinals,
    Finals,
}

impl Stage {
    #[must_use]
    pub const fn for_round(round: u32) -> Self {
        match round {
            0 | 1 => Self::Knockout,
            2 => Self::SemiFinals,
            _ => Self::Finals,
        }
    }

    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Knockout => "Round 1 Underway: Knockout Stage",
            Self::SemiFinals => "Round 2 Underway: Semi-Finals",
            Self::Finals => "The Finals Begin: Only One Will Triumph!",
        }
    }

    /// How long the stage announcement stays up before the first match.
    #[must_use]
    pub const fn intro_delay(self) -> Duration {
        match self {
            Self::Knockout | Self::SemiFinals => Duration::from_secs(5),
            Self::Finals => Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match<P> {
    pub players: [P; 2],
    pub scores: [u32; 2],
    asked: [u32; 2],
    turn: usize,
}

impl<P: Contestant> Match<P> {
    const fn new(first: P, second: P) -> Self {
        Self {
            players: [first, second],
            scores: [0, 0],
            asked: [0, 0],
            turn: 0,
        }
    }

    /// The player who answers next.
    #[must_use]
    pub const fn current_player(&self) -> &P {
        &self.players[self.turn]
    }

    /// Zero-based index of the question the current player is on.
    #[must_use]
    pub const fn question_index(&self) -> u32 {
        self.asked[self.turn]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pairing<P> {
    Match {
        round: u32,
        /// Set the first time a stage is reached.
        intro: Option<Stage>,
        first: P,
        second: P,
    },
    Bye {
        round: u32,
        contestant: P,
    },
    Champion(P),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult<P> {
    pub winner: P,
    pub loser: P,
    pub winner_score: u32,
    pub loser_score: u32,
    /// The match ended level and the winner was picked at random.
    pub tiebreak: bool,
    /// The winner is the last contestant standing.
    pub champion: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchProgress<P> {
    NextTurn { player: P },
    Decided(MatchResult<P>),
}

#[derive(Debug)]
pub struct Bracket<P, R> {
    rules: MatchRules,
    rng: R,
    round: u32,
    pool: VecDeque<P>,
    winners: Vec<P>,
    current: Option<Match<P>>,
    eliminated: BTreeMap<String, u32>,
    champion: Option<P>,
    shown_stages: BTreeSet<Stage>,
}

impl<P: Contestant, R: Rng> Bracket<P, R> {
    /// # Errors
    ///
    /// * [`KnockoutError::NotEnoughContestants`] if fewer than two contestants
    ///   are given
    pub fn new(contestants: Vec<P>, rules: MatchRules, mut rng: R) -> Result<Self, KnockoutError> {
        if contestants.len() < 2 {
            return Err(KnockoutError::NotEnoughContestants(contestants.len()));
        }

        let mut pool = contestants;
        pool.shuffle(&mut rng);

        Ok(Self {
            rules,
            rng,
            round: 1,
            pool: pool.into(),
            winners: vec![],
            current: None,
            eliminated: BTreeMap::new(),
            champion: None,
            shown_stages: BTreeSet::new(),
        })
    }

    #[must_use]
    pub const fn round(&self) -> u32 {
        self.round
    }

    #[must_use]
    pub const fn rules(&self) -> MatchRules {
        self.rules
    }

    #[must_use]
    pub const fn current_match(&self) -> Option<&Match<P>> {
        self.current.as_ref()
    }

    #[must_use]
    pub fn current_turn(&self) -> Option<&P> {
        self.current.as_ref().map(Match::current_player)
    }

    /// Contestants already through to the next round.
    #[must_use]
    pub fn winners(&self) -> &[P] {
        &self.winners
    }

    /// Number of losses per contestant name.
    #[must_use]
    pub const fn eliminated(&self) -> &BTreeMap<String, u32> {
        &self.eliminated
    }

    #[must_use]
    pub const fn champion(&self) -> Option<&P> {
        self.champion.as_ref()
    }

    /// Returns the stage for `round` the first time it is asked for, and
    /// `None` afterwards.
    pub fn stage_intro(&mut self, round: u32) -> Option<Stage> {
        let stage = Stage::for_round(round);
        self.shown_stages.insert(stage).then_some(stage)
    }

    /// Draws the next pairing.
    ///
    /// # Errors
    ///
    /// * [`KnockoutError::MatchInProgress`] if the current match is undecided
    pub fn next_pairing(&mut self) -> Result<Pairing<P>, KnockoutError> {
        if self.current.is_some() {
            return Err(KnockoutError::MatchInProgress);
        }

        if let Some(champion) = &self.champion {
            return Ok(Pairing::Champion(champion.clone()));
        }

        if self.pool.is_empty() {
            if self.winners.len() == 1 {
                let champion = self.winners[0].clone();
                self.champion = Some(champion.clone());
                return Ok(Pairing::Champion(champion));
            }

            let mut pool = std::mem::take(&mut self.winners);
            pool.shuffle(&mut self.rng);
            self.pool = pool.into();
            self.round += 1;
            log::debug!(
                "Starting round {} with {} contestants",
                self.round,
                self.pool.len()
            );
        }

        if self.pool.len() == 1 {
            let Some(contestant) = self.pool.pop_front() else {
                unreachable!("pool has one contestant");
            };
            log::debug!("{} gets a bye in round {}", contestant.name(), self.round);
            self.winners.push(contestant.clone());
            return Ok(Pairing::Bye {
                round: self.round,
                contestant,
            });
        }

        let (Some(first), Some(second)) = (self.pool.pop_front(), self.pool.pop_front()) else {
            unreachable!("pool has at least two contestants");
        };

        self.current = Some(Match::new(first.clone(), second.clone()));

        Ok(Pairing::Match {
            round: self.round,
            intro: self.stage_intro(self.round),
            first,
            second,
        })
    }

    /// Records the current player's answer. A timeout counts as a wrong
    /// answer.
    ///
    /// # Errors
    ///
    /// * [`KnockoutError::NoActiveMatch`] if no match is being played
    pub fn record_answer(&mut self, correct: bool) -> Result<MatchProgress<P>, KnockoutError> {
        let rules = self.rules;
        let current = self.current.as_mut().ok_or(KnockoutError::NoActiveMatch)?;
        let turn = current.turn;

        current.asked[turn] += 1;
        if correct {
            current.scores[turn] += 1;
        }

        if current.scores[turn] >= rules.points_to_win {
            return Ok(MatchProgress::Decided(self.decide(Some(turn))));
        }

        current.turn = 1 - turn;

        if current.asked.iter().all(|x| *x >= rules.questions_per_player) {
            return Ok(MatchProgress::Decided(self.decide(None)));
        }

        Ok(MatchProgress::NextTurn {
            player: current.current_player().clone(),
        })
    }

    fn decide(&mut self, winner: Option<usize>) -> MatchResult<P> {
        let Some(played) = self.current.take() else {
            unreachable!("decide is only called with an active match");
        };
        let [a, b] = played.scores;

        let (winner, tiebreak) = match winner {
            Some(x) => (x, false),
            None if a > b => (0, false),
            None if b > a => (1, false),
            None => (usize::from(self.rng.random_bool(0.5)), true),
        };
        let loser = 1 - winner;

        let [first, second] = played.players;
        let (winner_player, loser_player) = if winner == 0 {
            (first, second)
        } else {
            (second, first)
        };

        *self
            .eliminated
            .entry(loser_player.name().to_string())
            .or_default() += 1;
        self.winners.push(winner_player.clone());

        let champion = self.pool.is_empty() && self.winners.len() == 1;
        if champion {
            self.champion = Some(winner_player.clone());
        }

        log::debug!(
            "{} beat {} {}-{}{}",
            winner_player.name(),
            loser_player.name(),
            played.scores[winner],
            played.scores[loser],
            if tiebreak { " on a tiebreak" } else { "" },
        );

        MatchResult {
            winner: winner_player,
            loser: loser_player,
            winner_score: played.scores[winner],
            loser_score: played.scores[loser],
            tiebreak,
            champion,
        }
    }
}
