//! Harness around the cauldron engine: feasts, the counter race, logging and
//! command-line parsing for the `cauldron` binary.

pub mod cli;
pub mod feast;
pub mod logging;
pub mod race;

pub use feast::{FeastConfig, FeastError, FeastReport, run_feast};
pub use race::{CounterKind, OPS_PER_THREAD, RaceOutcome, run_race};
