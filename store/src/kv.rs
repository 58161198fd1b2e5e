//! Key-value storage trait.

use crate::StoreError;

/// A small string key-value store that survives process restarts.
///
/// Used to persist the cached verification verdict. Implementations must make
/// `set` and `delete` durable before returning; writes are last-writer-wins.
pub trait KeyValueStore: Send + Sync {
    /// Retrieve a value, or `None` if the key is absent.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Delete a key. Deleting an absent key is not an error.
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}
