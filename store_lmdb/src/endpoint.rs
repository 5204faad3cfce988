//! LMDB implementation of the known-endpoint set.

use jamscan_store::{EndpointRecord, EndpointStore, StoreError};
use jamscan_types::Timestamp;

use crate::{store_err, LmdbStore};

impl EndpointStore for LmdbStore {
    fn put_endpoint(&self, url: &str, added_at: Timestamp) -> Result<(), StoreError> {
        let mut wtxn = self.env.env.write_txn().map_err(store_err)?;

        if self
            .env
            .endpoints
            .get(&wtxn, url)
            .map_err(store_err)?
            .is_some()
        {
            return Ok(());
        }

        let position = self.env.endpoints.len(&wtxn).map_err(store_err)?;
        let record = EndpointRecord {
            url: url.to_string(),
            position,
            added_at,
        };
        self.env
            .endpoints
            .put(&mut wtxn, url, &record)
            .map_err(store_err)?;
        wtxn.commit().map_err(store_err)?;

        tracing::debug!(%url, position, "endpoint added to known set");
        Ok(())
    }

    fn contains_endpoint(&self, url: &str) -> Result<bool, StoreError> {
        let rtxn = self.env.env.read_txn().map_err(store_err)?;
        Ok(self
            .env
            .endpoints
            .get(&rtxn, url)
            .map_err(store_err)?
            .is_some())
    }

    fn list_endpoints(&self) -> Result<Vec<EndpointRecord>, StoreError> {
        let rtxn = self.env.env.read_txn().map_err(store_err)?;
        let mut endpoints = Vec::new();
        for entry in self.env.endpoints.iter(&rtxn).map_err(store_err)? {
            let (_, record) = entry.map_err(store_err)?;
            endpoints.push(record);
        }
        // Key order is lexicographic by URL; listing order is insertion order.
        endpoints.sort_by_key(|e| e.position);
        Ok(endpoints)
    }
}
