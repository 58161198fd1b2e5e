//! LMDB implementation of KeyValueStore.

use std::sync::Arc;

use heed::types::Str;
use heed::{Database, Env};

use agegate_store::{KeyValueStore, StoreError};

use crate::LmdbError;

#[derive(Clone)]
pub struct LmdbKeyValueStore {
    pub(crate) env: Arc<Env>,
    pub(crate) kv_db: Database<Str, Str>,
}

impl KeyValueStore for LmdbKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let val = self.kv_db.get(&rtxn, key).map_err(LmdbError::from)?;
        Ok(val.map(str::to_owned))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.kv_db
            .put(&mut wtxn, key, value)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.kv_db
            .delete(&mut wtxn, key)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LmdbEnvironment;

    fn temp_store() -> (tempfile::TempDir, LmdbKeyValueStore) {
        let dir = tempfile::tempdir().expect("temp dir");
        let env = LmdbEnvironment::open_default(dir.path()).expect("open env");
        (dir, env.kv_store())
    }

    #[test]
    fn set_then_get() {
        let (_dir, store) = temp_store();
        store.set("verdict", "{\"passed\":true}").unwrap();
        assert_eq!(store.get("verdict").unwrap().as_deref(), Some("{\"passed\":true}"));
    }

    #[test]
    fn missing_key_is_none() {
        let (_dir, store) = temp_store();
        assert_eq!(store.get("absent").unwrap(), None);
    }

    #[test]
    fn delete_removes_and_tolerates_absent_keys() {
        let (_dir, store) = temp_store();
        store.set("k", "v").unwrap();
        store.delete("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
        store.delete("k").unwrap();
    }

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().expect("temp dir");
        {
            let env = LmdbEnvironment::open_default(dir.path()).unwrap();
            env.kv_store().set("k", "persisted").unwrap();
        }
        let env = LmdbEnvironment::open_default(dir.path()).unwrap();
        assert_eq!(env.kv_store().get("k").unwrap().as_deref(), Some("persisted"));
    }
}
