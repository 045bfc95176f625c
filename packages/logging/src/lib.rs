#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use booxclash_config::default_env;
pub use log;
use thiserror::Error;

#[cfg(feature = "macros")]
pub mod macros;

#[cfg(debug_assertions)]
const DEFAULT_LOG_LEVEL: &str = "booxclash=debug";
#[cfg(not(debug_assertions))]
const DEFAULT_LOG_LEVEL: &str = "booxclash=info";

#[derive(Debug, Error)]
pub enum InitError {
    #[error(transparent)]
    SetLogger(#[from] log::SetLoggerError),
}

/// Resolves the filter directive: `BOOXCLASH_LOG`, then `RUST_LOG`, then the
/// build's default level.
#[must_use]
pub fn filter() -> String {
    resolve_filter(
        std::env::var("BOOXCLASH_LOG").ok(),
        std::env::var("RUST_LOG").ok(),
    )
}

fn resolve_filter(booxclash_log: Option<String>, rust_log: Option<String>) -> String {
    booxclash_log
        .filter(|x| !x.trim().is_empty())
        .or_else(|| rust_log.filter(|x| !x.trim().is_empty()))
        .unwrap_or_else(|| default_env("BOOXCLASH_DEFAULT_LOG", DEFAULT_LOG_LEVEL))
}

/// Installs the global logger.
///
/// # Errors
///
/// * If a global logger has already been installed
pub fn init() -> Result<(), InitError> {
    let filter = filter();

    env_logger::Builder::new()
        .parse_filters(&filter)
        .format_timestamp_millis()
        .try_init()?;

    log::debug!("Logging initialized with filter '{filter}'");

    Ok(())
}
