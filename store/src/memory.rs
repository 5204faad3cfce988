//! In-memory backend, for tests and tooling.
//!
//! Same merge and ordering semantics as the LMDB backend, with a plain
//! `RwLock<HashMap>` underneath. One lock around each table keeps upserts
//! serialized and reads snapshot-consistent.

use std::collections::HashMap;
use std::sync::RwLock;

use jamscan_types::{BlockRecord, HeaderHash, Timestamp};

use crate::endpoint::{EndpointRecord, EndpointStore};
use crate::meta::MetaStore;
use crate::record::BlockRecordStore;
use crate::StoreError;

#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<HeaderHash, BlockRecord>>,
    endpoints: RwLock<Vec<EndpointRecord>>,
    meta: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlockRecordStore for MemoryStore {
    fn upsert(&self, record: &BlockRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().expect("records lock poisoned");
        match records.get_mut(&record.header_hash) {
            Some(existing) => existing.merge_from(record.clone()),
            None => {
                records.insert(record.header_hash, record.clone());
            }
        }
        Ok(())
    }

    fn get_by_hash(&self, hash: &HeaderHash) -> Result<Option<BlockRecord>, StoreError> {
        let records = self.records.read().expect("records lock poisoned");
        Ok(records.get(hash).cloned())
    }

    fn list_all(&self) -> Result<Vec<BlockRecord>, StoreError> {
        let records = self.records.read().expect("records lock poisoned");
        Ok(records.values().cloned().collect())
    }

    fn count(&self) -> Result<u64, StoreError> {
        let records = self.records.read().expect("records lock poisoned");
        Ok(records.len() as u64)
    }
}

impl EndpointStore for MemoryStore {
    fn put_endpoint(&self, url: &str, added_at: Timestamp) -> Result<(), StoreError> {
        let mut endpoints = self.endpoints.write().expect("endpoints lock poisoned");
        if endpoints.iter().any(|e| e.url == url) {
            return Ok(());
        }
        let position = endpoints.len() as u64;
        endpoints.push(EndpointRecord {
            url: url.to_string(),
            position,
            added_at,
        });
        Ok(())
    }

    fn contains_endpoint(&self, url: &str) -> Result<bool, StoreError> {
        let endpoints = self.endpoints.read().expect("endpoints lock poisoned");
        Ok(endpoints.iter().any(|e| e.url == url))
    }

    fn list_endpoints(&self) -> Result<Vec<EndpointRecord>, StoreError> {
        let endpoints = self.endpoints.read().expect("endpoints lock poisoned");
        Ok(endpoints.clone())
    }
}

impl MetaStore for MemoryStore {
    fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut meta = self.meta.write().expect("meta lock poisoned");
        meta.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get_meta(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let meta = self.meta.read().expect("meta lock poisoned");
        Ok(meta.get(key).cloned())
    }

    fn delete_meta(&self, key: &str) -> Result<(), StoreError> {
        let mut meta = self.meta.write().expect("meta lock poisoned");
        meta.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jamscan_types::Block;
    use serde_json::json;

    fn hash(byte: u8) -> HeaderHash {
        HeaderHash::new([byte; 32])
    }

    #[test]
    fn upsert_merges_instead_of_replacing() {
        let store = MemoryStore::new();
        let key = hash(1);
        store
            .upsert(&BlockRecord::draft(
                key,
                Block::default(),
                Timestamp::from_millis(1),
            ))
            .unwrap();
        store
            .upsert(&BlockRecord::state_update(key, json!({"s": true})))
            .unwrap();

        let record = store.get_by_hash(&key).unwrap().unwrap();
        assert!(record.block.is_some());
        assert_eq!(record.state, Some(json!({"s": true})));
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn endpoints_keep_insertion_order_and_dedupe() {
        let store = MemoryStore::new();
        store
            .put_endpoint("ws://a:9999/ws", Timestamp::from_millis(1))
            .unwrap();
        store
            .put_endpoint("ws://b:9999/ws", Timestamp::from_millis(2))
            .unwrap();
        store
            .put_endpoint("ws://a:9999/ws", Timestamp::from_millis(3))
            .unwrap();

        let urls: Vec<_> = store
            .list_endpoints()
            .unwrap()
            .into_iter()
            .map(|e| e.url)
            .collect();
        assert_eq!(urls, vec!["ws://a:9999/ws", "ws://b:9999/ws"]);
    }

    #[test]
    fn meta_roundtrip_and_delete() {
        let store = MemoryStore::new();
        assert!(store.get_meta("active_endpoint").unwrap().is_none());
        store.put_meta("active_endpoint", b"ws://a").unwrap();
        assert_eq!(
            store.get_meta("active_endpoint").unwrap(),
            Some(b"ws://a".to_vec())
        );
        store.delete_meta("active_endpoint").unwrap();
        assert!(store.get_meta("active_endpoint").unwrap().is_none());
    }
}
