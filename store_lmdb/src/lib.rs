//! LMDB storage backend for AgeGate.
//!
//! Implements the `agegate-store` traits using the `heed` LMDB bindings.
//! All records live in a single named database within one environment.

pub mod environment;
pub mod error;
pub mod kv;

pub use environment::LmdbEnvironment;
pub use error::LmdbError;
pub use kv::LmdbKeyValueStore;
