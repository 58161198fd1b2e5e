//! Subject identifiers.
//!
//! A subject is whoever is being verified on this device (a user profile, a
//! local account). Verdicts are stored per subject so a shared store can hold
//! disjoint records.

use crate::TypesError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a verification subject.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectId(String);

impl SubjectId {
    /// Maximum accepted identifier length in bytes.
    pub const MAX_LEN: usize = 128;

    /// Create a subject id, rejecting empty, oversized, or whitespace-bearing input.
    pub fn new(raw: impl Into<String>) -> Result<Self, TypesError> {
        let s = raw.into();
        if s.is_empty() || s.len() > Self::MAX_LEN || s.chars().any(char::is_whitespace) {
            return Err(TypesError::InvalidSubject(s));
        }
        Ok(Self(s))
    }

    /// The id used when a device only ever verifies one person.
    pub fn local() -> Self {
        Self("local".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for SubjectId {
    fn default() -> Self {
        Self::local()
    }
}
