/// Wall-clock abstraction for mode timing.
pub mod clock;
pub mod controller;
pub mod engine;
/// SOC-dependent power limiting.
pub mod limiter;
/// Operating modes and their typed configuration.
pub mod mode;
pub mod types;
