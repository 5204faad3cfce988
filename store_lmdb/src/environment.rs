//! LMDB environment setup.

use std::fs;
use std::path::Path;

use heed::types::{Bytes, SerdeBincode, SerdeJson, Str};
use heed::{Database, Env, EnvOpenOptions};

use jamscan_store::EndpointRecord;
use jamscan_types::BlockRecord;

use crate::LmdbError;

/// Number of named LMDB databases.
const MAX_DBS: u32 = 3;

/// Wraps the LMDB environment and all database handles.
#[derive(Clone)]
pub struct LmdbEnvironment {
    pub(crate) env: Env,
    /// Records hold schemaless JSON payloads (`serde_json::Value` fields),
    /// which a non-self-describing codec cannot decode, so this table is
    /// JSON-encoded.
    pub(crate) records: Database<Str, SerdeJson<BlockRecord>>,
    pub(crate) endpoints: Database<Str, SerdeBincode<EndpointRecord>>,
    pub(crate) meta: Database<Str, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given path.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        fs::create_dir_all(path)?;

        // Safety: the environment directory is not opened twice within this
        // process, and no other process is expected to truncate it while the
        // store is live.
        let env = unsafe {
            EnvOpenOptions::new()
                .max_dbs(MAX_DBS)
                .map_size(map_size)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let records = env.create_database(&mut wtxn, Some("block_records"))?;
        let endpoints = env.create_database(&mut wtxn, Some("endpoints"))?;
        let meta = env.create_database(&mut wtxn, Some("meta"))?;
        wtxn.commit()?;

        Ok(Self {
            env,
            records,
            endpoints,
            meta,
        })
    }
}
