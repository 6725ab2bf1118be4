//! Simulator lifecycle errors.

use std::io;

use thiserror::Error;

use crate::config::ConfigError;

/// Errors surfaced by [`crate::sim::engine::BatterySimulator`].
#[derive(Debug, Error)]
pub enum SimError {
    /// A `set_mode` request or a single setting was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The simulator configuration failed validation.
    #[error("invalid simulator configuration: {}", join_errors(.0))]
    InvalidConfig(Vec<ConfigError>),

    /// The background tick thread could not be spawned.
    #[error("failed to spawn simulation worker: {0}")]
    Spawn(#[source] io::Error),

    /// The background tick thread panicked; the simulator state is no longer trustworthy.
    #[error("simulation worker panicked before shutdown")]
    WorkerPanicked,
}

fn join_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
