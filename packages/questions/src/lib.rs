//! Question bank for quiz games.
//!
//! Questions are grouped by subject, then by level. The bank is loaded once
//! from a JSON file shaped like:
//!
//! ```json
//! {
//!   "math": {
//!     "1": [
//!       { "question": "2 + 2?", "options": ["3", "4"], "correctAnswer": "4" }
//!     ]
//!   }
//! }
//! ```
//!
//! Levels line up with game rounds: round `n` draws from level `"n"`.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use std::{collections::BTreeMap, path::Path};

pub use booxclash_game_models::Question;
use rand::{
    Rng,
    seq::{IndexedRandom as _, SliceRandom as _},
};
use thiserror::Error;

#[cfg(feature = "api")]
pub mod api;

/// Number of questions served per request by the HTTP API.
pub const DEFAULT_SELECTION_LIMIT: usize = 10;

#[derive(Debug, Error)]
pub enum QuestionsError {
    #[error(transparent)]
    IO(#[from] std::io::Error),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    #[error("Invalid question in {subject} level {level} at index {index}: {reason}")]
    InvalidQuestion {
        subject: String,
        level: String,
        index: usize,
        reason: String,
    },
    #[error("No questions found for {subject} level {level}")]
    NotFound { subject: String, level: String },
}

type Levels = BTreeMap<String, Vec<Question>>;

/// Subject -> level -> questions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionBank {
    subjects: BTreeMap<String, Levels>,
}

impl QuestionBank {
    /// # Errors
    ///
    /// * If the file cannot be read
    /// * If the contents are not a valid question bank
    pub fn load(path: impl AsRef<Path>) -> Result<Self, QuestionsError> {
        let path = path.as_ref();
        log::debug!("Loading question bank from {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        let bank = Self::from_json_str(&contents)?;
        log::info!(
            "Loaded {} questions across {} subjects",
            bank.len(),
            bank.subjects.len()
        );
        Ok(bank)
    }

    /// # Errors
    ///
    /// * If the JSON does not match the bank layout
    /// * If a question has fewer than two options or its answer is not one of
    ///   them
    pub fn from_json_str(json: &str) -> Result<Self, QuestionsError> {
        let subjects: BTreeMap<String, Levels> = serde_json::from_str(json)?;
        let bank = Self { subjects };
        bank.validate()?;
        Ok(bank)
    }

    fn validate(&self) -> Result<(), QuestionsError> {
        for (subject, levels) in &self.subjects {
            for (level, questions) in levels {
                for (index, question) in questions.iter().enumerate() {
                    let invalid = |reason: &str| QuestionsError::InvalidQuestion {
                        subject: subject.clone(),
                        level: level.clone(),
                        index,
                        reason: reason.to_string(),
                    };

                    if question.options.len() < 2 {
                        return Err(invalid("needs at least two options"));
                    }
                    if !question.options.iter().any(|x| question.is_correct(x)) {
                        return Err(invalid("correct answer is not one of the options"));
                    }
                }
            }
        }

        Ok(())
    }

    /// Total number of questions in the bank.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subjects
            .values()
            .flat_map(BTreeMap::values)
            .map(Vec::len)
            .sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subjects(&self) -> impl Iterator<Item = &str> {
        self.subjects.keys().map(String::as_str)
    }

    pub fn levels(&self, subject: &str) -> impl Iterator<Item = &str> {
        self.subjects
            .get(subject)
            .into_iter()
            .flat_map(BTreeMap::keys)
            .map(String::as_str)
    }

    /// Questions for a subject and level, or `None` when there are none.
    #[must_use]
    pub fn questions(&self, subject: &str, level: &str) -> Option<&[Question]> {
        self.subjects
            .get(subject)
            .and_then(|levels| levels.get(level))
            .map(Vec::as_slice)
            .filter(|x| !x.is_empty())
    }

    pub fn random_question<R: Rng + ?Sized>(
        &self,
        subject: &str,
        level: &str,
        rng: &mut R,
    ) -> Option<&Question> {
        self.questions(subject, level)?.choose(rng)
    }

    /// Shuffled questions for a subject and level, at most `limit` of them.
    ///
    /// # Errors
    ///
    /// * If the subject or level has no questions
    pub fn select<R: Rng + ?Sized>(
        &self,
        subject: &str,
        level: &str,
        limit: usize,
        rng: &mut R,
    ) -> Result<Vec<Question>, QuestionsError> {
        let mut questions = self
            .questions(subject, level)
            .ok_or_else(|| QuestionsError::NotFound {
                subject: subject.to_string(),
                level: level.to_string(),
            })?
            .to_vec();

        questions.shuffle(rng);
        questions.truncate(limit);

        Ok(questions)
    }
}
