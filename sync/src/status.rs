//! Observable sync status published to presentation layers.

use serde::Serialize;

use jamscan_types::Timestamp;

/// The orchestrator's position in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Idle,
    Connecting,
    Subscribing,
    Live,
    Reconnecting,
    /// Terminal until explicit user action: setting an endpoint (the same
    /// one again acts as a manual retry) builds a fresh session.
    Disconnected,
}

/// Snapshot published on a watch channel after every change.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SyncStatus {
    pub state: SyncState,
    /// The endpoint the current (or last) session talks to.
    pub endpoint: String,
    /// Liveness signal: whether the transport currently has an open socket.
    pub connected: bool,
    /// When the stream last re-subscribed after a reconnect.
    pub last_resync: Option<Timestamp>,
    /// Notifications may have been missed between the disconnect and
    /// `last_resync`; there is no gap-recovery protocol, so the gap is
    /// surfaced instead of hidden. Cleared when a fresh session starts.
    pub possible_gap: bool,
}

impl SyncStatus {
    pub fn idle(endpoint: String) -> Self {
        Self {
            state: SyncState::Idle,
            endpoint,
            connected: false,
            last_resync: None,
            possible_gap: false,
        }
    }
}
