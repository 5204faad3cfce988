use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("rpc error: {0}")]
    Rpc(#[from] jamscan_rpc::RpcClientError),

    #[error("store error: {0}")]
    Store(#[from] jamscan_store::StoreError),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("shutdown timeout")]
    ShutdownTimeout,
}
