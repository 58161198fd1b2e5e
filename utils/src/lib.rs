//! Shared utilities for AgeGate.

pub mod logging;
pub mod stats;
pub mod time;

pub use logging::{init_logging, init_tracing, LogFormat, DEFAULT_LEVEL};
pub use stats::StatsCounter;
pub use time::{format_duration, format_remaining};
