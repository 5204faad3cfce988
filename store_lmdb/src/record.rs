//! LMDB implementation of the block record table.

use jamscan_store::{BlockRecordStore, StoreError};
use jamscan_types::{BlockRecord, HeaderHash};

use crate::{store_err, LmdbStore};

impl BlockRecordStore for LmdbStore {
    /// Read-merge-write inside a single write transaction. LMDB's
    /// single-writer model means no other upsert can interleave between the
    /// read and the put, and the commit makes the merge visible atomically.
    fn upsert(&self, record: &BlockRecord) -> Result<(), StoreError> {
        let key = record.header_hash.to_hex();
        let mut wtxn = self.env.env.write_txn().map_err(store_err)?;

        let merged = match self.env.records.get(&wtxn, &key).map_err(store_err)? {
            Some(mut existing) => {
                existing.merge_from(record.clone());
                existing
            }
            None => record.clone(),
        };

        self.env
            .records
            .put(&mut wtxn, &key, &merged)
            .map_err(store_err)?;
        wtxn.commit().map_err(store_err)?;

        tracing::trace!(hash = %record.header_hash, "block record upserted");
        Ok(())
    }

    fn get_by_hash(&self, hash: &HeaderHash) -> Result<Option<BlockRecord>, StoreError> {
        let rtxn = self.env.env.read_txn().map_err(store_err)?;
        self.env
            .records
            .get(&rtxn, &hash.to_hex())
            .map_err(store_err)
    }

    fn list_all(&self) -> Result<Vec<BlockRecord>, StoreError> {
        let rtxn = self.env.env.read_txn().map_err(store_err)?;
        let mut records = Vec::new();
        for entry in self.env.records.iter(&rtxn).map_err(store_err)? {
            let (_, record) = entry.map_err(store_err)?;
            records.push(record);
        }
        Ok(records)
    }

    fn count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.env.read_txn().map_err(store_err)?;
        self.env.records.len(&rtxn).map_err(store_err)
    }
}
