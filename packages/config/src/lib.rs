//! Runtime configuration for the `BooxClash` game server.
//!
//! All settings come from environment variables. See [`ServerConfig`] for the
//! list of recognised variables and their defaults.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use std::time::Duration;

use thiserror::Error;

pub mod env;

pub use env::{
    EnvError, default_env, default_env_u64, default_env_usize, env_list, option_env_usize,
};

/// Origins allowed by CORS when `ALLOWED_ORIGINS` is not set.
pub const DEFAULT_ALLOWED_ORIGINS: &str =
    "http://localhost:5173,https://booxclash-3dweb.vercel.app";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error(transparent)]
    Env(#[from] EnvError),
    #[error("Invalid port: {0}")]
    InvalidPort(u64),
    #[error("TURN_SECONDS must be at least 1")]
    InvalidTurnSeconds,
}

/// Server settings.
///
/// | Variable | Default |
/// |---|---|
/// | `PORT` | `5000` |
/// | `BIND_ADDR` | `0.0.0.0` |
/// | `ACTIX_WORKERS` | unset |
/// | `QUESTIONS_PATH` | `data/questions.json` |
/// | `ALLOWED_ORIGINS` | [`DEFAULT_ALLOWED_ORIGINS`] |
/// | `TURN_SECONDS` | `20` |
/// | `GAME_START_DELAY_MS` | `4000` |
/// | `ROUND_START_DELAY_MS` | `2000` |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub bind_addr: String,
    pub workers: Option<usize>,
    pub questions_path: String,
    pub allowed_origins: Vec<String>,
    pub turn_seconds: u32,
    pub game_start_delay: Duration,
    pub round_start_delay: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            bind_addr: "0.0.0.0".to_string(),
            workers: None,
            questions_path: "data/questions.json".to_string(),
            allowed_origins: DEFAULT_ALLOWED_ORIGINS
                .split(',')
                .map(ToString::to_string)
                .collect(),
            turn_seconds: 20,
            game_start_delay: Duration::from_millis(4000),
            round_start_delay: Duration::from_millis(2000),
        }
    }
}

impl ServerConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// * If a numeric variable holds a malformed value
    /// * If `PORT` does not fit in a `u16`
    /// * If `TURN_SECONDS` is `0`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// * If a numeric variable holds a malformed value
    /// * If `PORT` does not fit in a `u16`
    /// * If `TURN_SECONDS` is `0`
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = env::default_env_u64_from(&get, "PORT", u64::from(defaults.port))?;
        let port = u16::try_from(port).map_err(|_| ConfigError::InvalidPort(port))?;

        let workers = env::option_env_u64_from(&get, "ACTIX_WORKERS")?
            .and_then(|x| usize::try_from(x).ok());

        let turn_seconds = env::default_env_u64_from(
            &get,
            "TURN_SECONDS",
            u64::from(defaults.turn_seconds),
        )?;
        let turn_seconds = match u32::try_from(turn_seconds) {
            Ok(0) | Err(_) => return Err(ConfigError::InvalidTurnSeconds),
            Ok(x) => x,
        };

        let game_start_delay = Duration::from_millis(env::default_env_u64_from(
            &get,
            "GAME_START_DELAY_MS",
            4000,
        )?);
        let round_start_delay = Duration::from_millis(env::default_env_u64_from(
            &get,
            "ROUND_START_DELAY_MS",
            2000,
        )?);

        let config = Self {
            port,
            bind_addr: env::default_env_from(&get, "BIND_ADDR", &defaults.bind_addr),
            workers,
            questions_path: env::default_env_from(
                &get,
                "QUESTIONS_PATH",
                &defaults.questions_path,
            ),
            allowed_origins: env::env_list_from(&get, "ALLOWED_ORIGINS", DEFAULT_ALLOWED_ORIGINS),
            turn_seconds,
            game_start_delay,
            round_start_delay,
        };

        log::trace!("Loaded config: {config:?}");

        Ok(config)
    }

    /// Overrides the port, e.g. from a command line argument.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}
