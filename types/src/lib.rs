//! Fundamental types for AgeGate.
//!
//! This crate defines the small set of types shared by every other crate in the
//! workspace: timestamps and the clock abstraction, and subject identifiers.

pub mod error;
pub mod subject;
pub mod time;

pub use error::TypesError;
pub use subject::SubjectId;
pub use time::{Clock, SystemClock, Timestamp, SECS_PER_DAY};
