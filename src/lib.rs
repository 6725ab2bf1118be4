//! Simulated Marstek Venus home battery: SOC, modes, household load and grid accounting.

#[cfg(feature = "api")]
pub mod api;
pub mod cli;
pub mod config;
pub mod devices;
pub mod error;
pub mod io;
/// Device wire documents and `ES.SetMode` parsing.
pub mod protocol;
/// Simulator engine, mode state machine, controller and limiter.
pub mod sim;

pub use config::{ConfigError, SimulatorConfig};
pub use error::SimError;
pub use sim::engine::BatterySimulator;
pub use sim::types::Snapshot;
