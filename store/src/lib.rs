//! Abstract storage traits for AgeGate.
//!
//! Every storage backend (LMDB, platform preferences, in-memory for testing)
//! implements these traits. The rest of the codebase depends only on the traits.

pub mod error;
pub mod kv;

pub use error::StoreError;
pub use kv::KeyValueStore;
