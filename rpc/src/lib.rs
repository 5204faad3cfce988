//! WebSocket JSON-RPC client for JAM nodes.
//!
//! Two layers, mirroring the wire reality:
//!
//! - [`transport`] owns exactly one WebSocket connection, delivers inbound
//!   frames in arrival order, and handles reconnection with bounded
//!   exponential backoff.
//! - [`client`] speaks the JSON-RPC request/notification protocol over the
//!   transport: correlation-ID call matching with a bounded wait, and
//!   topic-keyed routing of unsolicited notifications.
//!
//! Nothing here interprets chain data; payloads pass through as
//! `serde_json::Value`.

pub mod client;
pub mod error;
pub mod protocol;
pub mod transport;

pub use client::{ClientConfig, RpcClient, SessionEvent};
pub use error::RpcClientError;
pub use protocol::{method, topic, ErrorObject, Frame, NewBlockParams, Request};
pub use transport::{ConnectionState, ReconnectPolicy, Transport, TransportEvent};
