//! LMDB implementation of the metadata table.

use jamscan_store::{MetaStore, StoreError};

use crate::{store_err, LmdbStore};

impl MetaStore for LmdbStore {
    fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut wtxn = self.env.env.write_txn().map_err(store_err)?;
        self.env
            .meta
            .put(&mut wtxn, key, value)
            .map_err(store_err)?;
        wtxn.commit().map_err(store_err)
    }

    fn get_meta(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let rtxn = self.env.env.read_txn().map_err(store_err)?;
        Ok(self
            .env
            .meta
            .get(&rtxn, key)
            .map_err(store_err)?
            .map(|bytes| bytes.to_vec()))
    }

    fn delete_meta(&self, key: &str) -> Result<(), StoreError> {
        let mut wtxn = self.env.env.write_txn().map_err(store_err)?;
        self.env.meta.delete(&mut wtxn, key).map_err(store_err)?;
        wtxn.commit().map_err(store_err)
    }
}
