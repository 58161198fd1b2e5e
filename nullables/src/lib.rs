//! Nullable infrastructure for deterministic testing.
//!
//! All external dependencies of the verification pipeline (clock, key-value
//! store, capture device, age scorer) are abstracted behind traits. This crate
//! provides test-friendly implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically
//! - Never touch the filesystem or hardware
//!
//! Usage: swap real implementations for nullables in tests.

pub mod capture;
pub mod clock;
pub mod store;

pub use capture::{NullCaptureDevice, NullScorer};
pub use clock::NullClock;
pub use store::NullStore;
