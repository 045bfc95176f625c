#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Single-screen knockout quiz played in the terminal.
//!
//! ```bash
//! booxclash_knockout --questions data/questions.json --subject math Alice Bob Charlie
//! ```

use std::{
    io::{BufRead, Write},
    path::PathBuf,
    process,
};

use booxclash_knockout::{
    Bracket, KnockoutError, MatchProgress, MatchResult, MatchRules, Pairing,
};
use booxclash_questions::{Question, QuestionBank, QuestionsError};
use clap::Parser;
use rand::Rng;
use thiserror::Error;

/// Run a knockout quiz tournament in the terminal
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the question bank JSON file
    #[arg(long, default_value = "data/questions.json")]
    questions: PathBuf,

    #[arg(long, default_value = "math")]
    subject: String,

    #[arg(long, default_value = "1")]
    level: String,

    /// Pause for each stage announcement
    #[arg(long)]
    delays: bool,

    /// Contestant names
    #[arg(value_name = "NAME", num_args = 2.., required = true)]
    names: Vec<String>,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    IO(#[from] std::io::Error),
    #[error(transparent)]
    Questions(#[from] QuestionsError),
    #[error(transparent)]
    Knockout(#[from] KnockoutError),
}

struct Tournament<'a, I, O> {
    questions: &'a [Question],
    input: I,
    output: O,
    delays: bool,
}

impl<I: BufRead, O: Write> Tournament<'_, I, O> {
    fn ask(&mut self, player: &str, rng: &mut impl Rng) -> Result<bool, CliError> {
        let question = &self.questions[rng.random_range(0..self.questions.len())];

        writeln!(self.output, "\n{player}, {}", question.question)?;
        for (i, option) in question.options.iter().enumerate() {
            writeln!(self.output, "  {}. {option}", i + 1)?;
        }
        write!(self.output, "> ")?;
        self.output.flush()?;

        let mut line = String::new();
        self.input.read_line(&mut line)?;

        let chosen = line
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|x| x.checked_sub(1))
            .and_then(|x| question.options.get(x));

        let correct = chosen.is_some_and(|x| question.is_correct(x));

        if correct {
            writeln!(self.output, "Correct!")?;
        } else {
            writeln!(
                self.output,
                "Wrong! The answer was {}",
                question.correct_answer
            )?;
        }

        Ok(correct)
    }

    fn report(&mut self, result: &MatchResult<String>) -> Result<(), CliError> {
        if result.tiebreak {
            writeln!(
                self.output,
                "\nTied {}-{}! {} advances on a coin flip.",
                result.winner_score, result.loser_score, result.winner
            )?;
        } else {
            writeln!(
                self.output,
                "\n{} beats {} {}-{}.",
                result.winner, result.loser, result.winner_score, result.loser_score
            )?;
        }
        Ok(())
    }

    fn run<R: Rng>(
        &mut self,
        bracket: &mut Bracket<String, R>,
        rng: &mut impl Rng,
    ) -> Result<String, CliError> {
        loop {
            match bracket.next_pairing()? {
                Pairing::Champion(champion) => {
                    writeln!(self.output, "\n{champion} is the champion!")?;
                    return Ok(champion);
                }
                Pairing::Bye { round, contestant } => {
                    writeln!(
                        self.output,
                        "\n{contestant} has no opponent and advances from round {round}."
                    )?;
                }
                Pairing::Match {
                    round,
                    intro,
                    first,
                    second,
                } => {
                    if let Some(stage) = intro {
                        writeln!(self.output, "\n=== {} ===", stage.title())?;
                        if self.delays {
                            std::thread::sleep(stage.intro_delay());
                        }
                    }
                    writeln!(self.output, "\nRound {round}: {first} vs {second}")?;

                    let mut player = first;
                    loop {
                        let correct = self.ask(&player, rng)?;
                        match bracket.record_answer(correct)? {
                            MatchProgress::NextTurn { player: next } => player = next,
                            MatchProgress::Decided(result) => {
                                self.report(&result)?;
                                break;
                            }
                        }
                    }
                }
            }
        }
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = booxclash_logging::init() {
        eprintln!("Failed to initialize logging: {e}");
    }

    let bank = match QuestionBank::load(&cli.questions) {
        Ok(bank) => bank,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    let Some(questions) = bank.questions(&cli.subject, &cli.level) else {
        eprintln!(
            "Error: No questions for {} level {}",
            cli.subject, cli.level
        );
        process::exit(1);
    };

    let result = Bracket::new(cli.names, MatchRules::default(), rand::rng())
        .map_err(CliError::from)
        .and_then(|mut bracket| {
            let stdin = std::io::stdin();
            let mut tournament = Tournament {
                questions,
                input: stdin.lock(),
                output: std::io::stdout().lock(),
                delays: cli.delays,
            };
            tournament.run(&mut bracket, &mut rand::rng())
        });

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
