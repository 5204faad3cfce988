//! The unit of persistence: one record per block header hash.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

use crate::block::{Block, Report};
use crate::hash::HeaderHash;
use crate::time::Timestamp;

/// Bookkeeping attached to a record at ingestion time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overview {
    /// When this record was (last) built from a notification. Used purely
    /// for display ordering.
    pub created_at: Timestamp,
}

/// A stored block record.
///
/// Records are built up incrementally: a notification produces a draft with
/// the block payload, and a later `jam.GetState` fetch fills in `state`.
/// Every field other than the key is therefore optional, and writes go
/// through the merge rule in [`BlockRecord::merge_from`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockRecord {
    /// Globally unique key; at most one record per hash ever exists.
    pub header_hash: HeaderHash,

    /// Block payload from the notification, carried through uninterpreted.
    #[serde(default)]
    pub block: Option<Block>,

    /// State document from `jam.GetState`; absent until enrichment succeeds.
    #[serde(default)]
    pub state: Option<Value>,

    #[serde(default)]
    pub overview: Option<Overview>,
}

impl BlockRecord {
    /// A draft record built from a new-block notification, before any state
    /// has been fetched.
    pub fn draft(header_hash: HeaderHash, block: Block, created_at: Timestamp) -> Self {
        Self {
            header_hash,
            block: Some(block),
            state: None,
            overview: Some(Overview { created_at }),
        }
    }

    /// A partial record carrying only a fetched state document, to be merged
    /// onto the draft.
    pub fn state_update(header_hash: HeaderHash, state: Value) -> Self {
        Self {
            header_hash,
            block: None,
            state: Some(state),
            overview: None,
        }
    }

    pub fn created_at(&self) -> Option<Timestamp> {
        self.overview.map(|o| o.created_at)
    }

    /// All work reports in the record's block payload, if any.
    pub fn reports(&self) -> impl Iterator<Item = &Report> {
        self.block.iter().flat_map(|b| b.reports())
    }

    /// Merge a newer partial record into this one.
    ///
    /// The rule is total and field-wise: the newer record wins on every field
    /// it actually carries (`Some`), and a field it does not carry (`None`)
    /// never clears the stored value. So `state` survives a block-only
    /// re-notification, and re-applying the same record is a no-op.
    pub fn merge_from(&mut self, newer: BlockRecord) {
        debug_assert_eq!(self.header_hash, newer.header_hash);
        if newer.block.is_some() {
            self.block = newer.block;
        }
        if newer.state.is_some() {
            self.state = newer.state;
        }
        if newer.overview.is_some() {
            self.overview = newer.overview;
        }
    }
}

/// Order records for display: newest first, records without a timestamp
/// after all records that have one, ties broken by header hash so the
/// result is deterministic.
pub fn sort_for_display(records: &mut [BlockRecord]) {
    records.sort_by(|a, b| match (a.created_at(), b.created_at()) {
        (Some(x), Some(y)) => y.cmp(&x).then_with(|| a.header_hash.cmp(&b.header_hash)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.header_hash.cmp(&b.header_hash),
    });
}
