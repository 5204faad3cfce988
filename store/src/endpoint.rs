//! Known-endpoint storage trait.

use crate::StoreError;
use jamscan_types::Timestamp;
use serde::{Deserialize, Serialize};

/// A previously used node endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointRecord {
    pub url: String,
    /// Insertion index, for stable listing order across restarts.
    pub position: u64,
    pub added_at: Timestamp,
}

/// Trait for the persisted set of known endpoints.
pub trait EndpointStore {
    /// Add an endpoint to the known set. A URL already present keeps its
    /// original position; adding it again is a no-op.
    fn put_endpoint(&self, url: &str, added_at: Timestamp) -> Result<(), StoreError>;

    /// Whether the URL is already in the known set.
    fn contains_endpoint(&self, url: &str) -> Result<bool, StoreError>;

    /// All known endpoints in insertion order.
    fn list_endpoints(&self) -> Result<Vec<EndpointRecord>, StoreError>;
}
