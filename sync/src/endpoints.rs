//! Endpoint registry: the active node URL and the persisted known set.

use std::sync::Arc;

use tokio::sync::watch;

use jamscan_store::{EndpointRecord, EndpointStore, MetaStore};
use jamscan_types::Timestamp;

use crate::SyncError;

/// Meta-store key holding the active endpoint URL.
const ACTIVE_ENDPOINT_KEY: &str = "active_endpoint";

/// Tracks the active endpoint and every endpoint ever used.
///
/// Switching is atomic from the caller's perspective: the orchestrator
/// observes the change on the watch channel, fully tears the old session
/// down (pending calls resolve `Cancelled`) and only then connects to the
/// new URL, so two transports are never live at once.
pub struct EndpointRegistry {
    endpoints: Arc<dyn EndpointStore + Send + Sync>,
    meta: Arc<dyn MetaStore + Send + Sync>,
    active_tx: watch::Sender<String>,
    active_rx: watch::Receiver<String>,
}

impl EndpointRegistry {
    /// Load the registry from the store. The persisted active endpoint wins
    /// over `default_url`; on a fresh store the default is persisted as the
    /// first known endpoint.
    pub fn open(
        endpoints: Arc<dyn EndpointStore + Send + Sync>,
        meta: Arc<dyn MetaStore + Send + Sync>,
        default_url: &str,
    ) -> Result<Self, SyncError> {
        let active = match meta.get_meta(ACTIVE_ENDPOINT_KEY)? {
            Some(bytes) => String::from_utf8(bytes)
                .map_err(|_| SyncError::Config("stored active endpoint is not UTF-8".into()))?,
            None => default_url.to_string(),
        };
        endpoints.put_endpoint(&active, Timestamp::now())?;
        meta.put_meta(ACTIVE_ENDPOINT_KEY, active.as_bytes())?;
        tracing::info!(endpoint = %active, "endpoint registry loaded");

        let (active_tx, active_rx) = watch::channel(active);
        Ok(Self {
            endpoints,
            meta,
            active_tx,
            active_rx,
        })
    }

    /// The currently active endpoint URL.
    pub fn active(&self) -> String {
        self.active_rx.borrow().clone()
    }

    /// A watch on the active endpoint, for the orchestrator's session loop.
    pub fn watch_active(&self) -> watch::Receiver<String> {
        self.active_rx.clone()
    }

    /// Persist `url` into the known set (if new), mark it active, and signal
    /// the orchestrator to rebuild the session. Setting the current URL
    /// again forces a fresh session — the manual-retry path out of
    /// `Disconnected`.
    pub fn set_active(&self, url: &str) -> Result<(), SyncError> {
        self.endpoints.put_endpoint(url, Timestamp::now())?;
        self.meta.put_meta(ACTIVE_ENDPOINT_KEY, url.as_bytes())?;
        let _ = self.active_tx.send(url.to_string());
        tracing::info!(%url, "active endpoint set");
        Ok(())
    }

    /// All previously used endpoints, in insertion order.
    pub fn list_known(&self) -> Result<Vec<EndpointRecord>, SyncError> {
        Ok(self.endpoints.list_endpoints()?)
    }
}
