//! Prometheus metrics for the sync service.
//!
//! The [`SyncMetrics`] struct owns a dedicated [`Registry`] that the HTTP
//! API's `/metrics` endpoint encodes into the text exposition format.

use prometheus::{
    register_int_counter_with_registry, register_int_gauge_with_registry, IntCounter, IntGauge,
    Opts, Registry,
};

pub struct SyncMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Block notifications turned into (draft) record upserts.
    pub blocks_ingested: IntCounter,
    /// State documents fetched and merged into records.
    pub state_fetches: IntCounter,
    /// State fetches that failed or returned nothing.
    pub state_fetch_failures: IntCounter,
    /// Store upserts that failed.
    pub store_failures: IntCounter,
    /// Successful re-subscribes after a lost connection.
    pub reconnects: IntCounter,
    /// Failed connection attempts to the active endpoint.
    pub connect_failures: IntCounter,
    /// Notifications dropped because their payload didn't parse.
    pub malformed_notifications: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    /// Current number of stored block records.
    pub record_count: IntGauge,
    /// 1 while the transport has an open socket, else 0.
    pub connected: IntGauge,
}

impl SyncMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let blocks_ingested = register_int_counter_with_registry!(
            Opts::new("jamscan_blocks_ingested_total", "Block notifications ingested"),
            registry
        )
        .expect("failed to register blocks_ingested counter");

        let state_fetches = register_int_counter_with_registry!(
            Opts::new("jamscan_state_fetches_total", "State documents merged"),
            registry
        )
        .expect("failed to register state_fetches counter");

        let state_fetch_failures = register_int_counter_with_registry!(
            Opts::new(
                "jamscan_state_fetch_failures_total",
                "State fetches that failed or returned null"
            ),
            registry
        )
        .expect("failed to register state_fetch_failures counter");

        let store_failures = register_int_counter_with_registry!(
            Opts::new("jamscan_store_failures_total", "Failed store upserts"),
            registry
        )
        .expect("failed to register store_failures counter");

        let reconnects = register_int_counter_with_registry!(
            Opts::new(
                "jamscan_reconnects_total",
                "Re-subscribes after a lost connection"
            ),
            registry
        )
        .expect("failed to register reconnects counter");

        let connect_failures = register_int_counter_with_registry!(
            Opts::new(
                "jamscan_connect_failures_total",
                "Failed connection attempts to the active endpoint"
            ),
            registry
        )
        .expect("failed to register connect_failures counter");

        let malformed_notifications = register_int_counter_with_registry!(
            Opts::new(
                "jamscan_malformed_notifications_total",
                "Notifications dropped as unparseable"
            ),
            registry
        )
        .expect("failed to register malformed_notifications counter");

        let record_count = register_int_gauge_with_registry!(
            Opts::new("jamscan_record_count", "Stored block records"),
            registry
        )
        .expect("failed to register record_count gauge");

        let connected = register_int_gauge_with_registry!(
            Opts::new("jamscan_connected", "Whether the transport socket is open"),
            registry
        )
        .expect("failed to register connected gauge");

        Self {
            registry,
            blocks_ingested,
            state_fetches,
            state_fetch_failures,
            store_failures,
            reconnects,
            connect_failures,
            malformed_notifications,
            record_count,
            connected,
        }
    }
}

impl Default for SyncMetrics {
    fn default() -> Self {
        Self::new()
    }
}
