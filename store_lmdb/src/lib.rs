//! LMDB storage backend for jamscan.
//!
//! Implements the storage traits from `jamscan-store` using the `heed` LMDB
//! bindings. Three named databases live in a single environment:
//!
//! - `block_records` — [`jamscan_types::BlockRecord`] keyed by header hash
//!   (hex string).
//! - `endpoints` — the persisted known-endpoint set.
//! - `meta` — raw bytes for bookkeeping (schema version, active endpoint).
//!
//! LMDB allows one write transaction at a time, so the read-merge-write in
//! `upsert` is serialized per key for free; read transactions see an atomic
//! snapshot, so a merge is never observed half-applied.

pub mod endpoint;
pub mod environment;
pub mod error;
pub mod meta;
pub mod record;

pub use environment::LmdbEnvironment;
pub use error::LmdbError;

use std::path::Path;

use jamscan_store::{MetaStore, StoreError};

/// Current on-disk schema version, written on first open.
const SCHEMA_VERSION: u32 = 1;

/// Meta key holding the schema version.
const SCHEMA_VERSION_KEY: &str = "schema_version";

/// The LMDB-backed store. Cheap to clone (the environment is internally
/// reference-counted) and safe to share across tasks.
#[derive(Clone)]
pub struct LmdbStore {
    pub(crate) env: LmdbEnvironment,
}

impl LmdbStore {
    /// Open or create the store at `path` with the given LMDB map size.
    ///
    /// Refuses to open a database written by a newer schema.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        let env = LmdbEnvironment::open(path, map_size)?;
        let store = Self { env };
        store.check_schema()?;
        Ok(store)
    }

    fn check_schema(&self) -> Result<(), LmdbError> {
        let stored = self
            .get_meta(SCHEMA_VERSION_KEY)
            .map_err(|e| LmdbError::Store(e.to_string()))?;
        match stored {
            Some(bytes) => {
                let bytes: [u8; 4] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| LmdbError::Corrupt("schema_version".to_string()))?;
                let version = u32::from_le_bytes(bytes);
                if version > SCHEMA_VERSION {
                    return Err(LmdbError::SchemaTooNew(version));
                }
                Ok(())
            }
            None => {
                self.put_meta(SCHEMA_VERSION_KEY, &SCHEMA_VERSION.to_le_bytes())
                    .map_err(|e| LmdbError::Store(e.to_string()))?;
                tracing::info!(version = SCHEMA_VERSION, "initialized fresh database");
                Ok(())
            }
        }
    }
}

// Shared by the trait impl files.
pub(crate) fn store_err(e: heed::Error) -> StoreError {
    match e {
        heed::Error::Io(io) => StoreError::Backend(io.to_string()),
        heed::Error::Encoding(e) => StoreError::Serialization(e.to_string()),
        heed::Error::Decoding(e) => StoreError::Corruption(e.to_string()),
        other => StoreError::Backend(other.to_string()),
    }
}
