use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcClientError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("not connected")]
    NotConnected,

    #[error("call timed out: {method}")]
    Timeout { method: String },

    #[error("node returned error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("call cancelled")]
    Cancelled,

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("channel closed")]
    ChannelClosed,
}
