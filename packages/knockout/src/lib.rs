#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

pub mod bracket;
pub mod elimination;

pub use bracket::{
    Bracket, Contestant, Match, MatchProgress, MatchResult, MatchRules, Pairing, Stage,
};
pub use elimination::{Elimination, eliminate_lowest};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KnockoutError {
    #[error("A knockout needs at least two contestants, got {0}")]
    NotEnoughContestants(usize),
    #[error("No match is being played")]
    NoActiveMatch,
    #[error("The current match has not been decided")]
    MatchInProgress,
}
