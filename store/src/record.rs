//! Block record storage trait.

use crate::StoreError;
use jamscan_types::{BlockRecord, HeaderHash};

/// Trait for the chain record table, keyed by header hash.
///
/// Implementations must apply [`BlockRecord::merge_from`] on upsert, so a
/// partial update never erases previously known fields, and must serialize
/// upserts per key: a reader sees a record either fully before or fully
/// after any given merge, never torn.
pub trait BlockRecordStore {
    /// Insert a record, or merge it into the existing record for its hash.
    fn upsert(&self, record: &BlockRecord) -> Result<(), StoreError>;

    /// Look up a record by header hash.
    fn get_by_hash(&self, hash: &HeaderHash) -> Result<Option<BlockRecord>, StoreError>;

    /// Every stored record, in no particular order. Display ordering is the
    /// caller's job (`jamscan_types::sort_for_display`).
    fn list_all(&self) -> Result<Vec<BlockRecord>, StoreError>;

    /// Number of stored records.
    fn count(&self) -> Result<u64, StoreError>;
}
