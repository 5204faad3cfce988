use thiserror::Error;

/// Errors opening or initializing the LMDB environment. Once the store is
/// open, operations report `jamscan_store::StoreError` like every backend.
#[derive(Debug, Error)]
pub enum LmdbError {
    #[error("LMDB error: {0}")]
    Heed(#[from] heed::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database schema version {0} is newer than this build supports")]
    SchemaTooNew(u32),

    #[error("corrupted database: {0}")]
    Corrupt(String),

    #[error("store error: {0}")]
    Store(String),
}
