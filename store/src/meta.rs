//! Metadata storage trait.

use crate::StoreError;

/// Trait for database metadata (schema version, the active endpoint, etc.) —
/// a generic key-value table for bookkeeping that doesn't belong in any
/// domain-specific store.
pub trait MetaStore {
    /// Store a metadata value.
    fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Retrieve a metadata value.
    fn get_meta(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Delete a metadata entry. Deleting a missing key is a no-op.
    fn delete_meta(&self, key: &str) -> Result<(), StoreError>;
}
