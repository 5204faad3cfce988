//! One RPC session against one endpoint.
//!
//! The session is an explicit value owned by the orchestrator: an endpoint
//! switch constructs a new one and retires the old, rather than mutating
//! connection state in place.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use jamscan_rpc::{ClientConfig, ConnectionState, RpcClient, RpcClientError, SessionEvent};

pub struct SyncSession {
    pub endpoint: String,
    /// Shared with enrichment tasks spawned per notification.
    pub client: Arc<RpcClient>,
    /// Opened/Exhausted events from the protocol layer.
    pub events: mpsc::Receiver<SessionEvent>,
    /// Transport liveness.
    pub state: watch::Receiver<ConnectionState>,
}

impl SyncSession {
    /// Connect to the endpoint; fails fast if it is unreachable.
    pub async fn connect(endpoint: &str, config: ClientConfig) -> Result<Self, RpcClientError> {
        let (client, events) = RpcClient::connect(endpoint, config).await?;
        let state = client.state();
        Ok(Self {
            endpoint: endpoint.to_string(),
            client: Arc::new(client),
            events,
            state,
        })
    }
}
