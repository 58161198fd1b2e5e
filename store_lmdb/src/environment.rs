//! LMDB environment setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use heed::types::Str;
use heed::{Database, Env, EnvOpenOptions};

use crate::kv::LmdbKeyValueStore;
use crate::LmdbError;

/// Name of the database holding key-value records.
const KV_DB_NAME: &str = "kv";

/// Default map size: verdict records are tiny, 16 MiB is plenty.
pub const DEFAULT_MAP_SIZE: usize = 16 * 1024 * 1024;

/// Wraps the LMDB environment and its database handles.
pub struct LmdbEnvironment {
    env: Arc<Env>,
    kv_db: Database<Str, Str>,
    path: PathBuf,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given directory.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;

        // SAFETY: the environment is opened once per directory by this process and
        // the memory map is never accessed outside heed's transaction API.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(1)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let kv_db: Database<Str, Str> = env.create_database(&mut wtxn, Some(KV_DB_NAME))?;
        wtxn.commit()?;

        tracing::debug!(path = %path.display(), "opened LMDB environment");

        Ok(Self {
            env: Arc::new(env),
            kv_db,
            path: path.to_path_buf(),
        })
    }

    /// Open with [`DEFAULT_MAP_SIZE`].
    pub fn open_default(path: &Path) -> Result<Self, LmdbError> {
        Self::open(path, DEFAULT_MAP_SIZE)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A key-value store backed by this environment.
    pub fn kv_store(&self) -> LmdbKeyValueStore {
        LmdbKeyValueStore {
            env: Arc::clone(&self.env),
            kv_db: self.kv_db,
        }
    }
}
