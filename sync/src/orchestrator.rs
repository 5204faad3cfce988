//! The sync service: session lifecycle, ingestion pipeline, clock ticker.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use jamscan_rpc::{method, topic, ClientConfig, NewBlockParams, RpcClient, SessionEvent};
use jamscan_store::BlockRecordStore;
use jamscan_types::{BlockRecord, HeaderHash, Timestamp};

use crate::config::SyncConfig;
use crate::endpoints::EndpointRegistry;
use crate::error::SyncError;
use crate::metrics::SyncMetrics;
use crate::session::SyncSession;
use crate::shutdown::ShutdownController;
use crate::status::{SyncState, SyncStatus};

/// Timeout for waiting on background tasks during shutdown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// The top-level coordinator.
///
/// Runs two background tasks: the session runner (connect → subscribe →
/// ingest, rebuilt on endpoint switches) and the clock ticker, which is
/// independent of the network and stops only at shutdown.
pub struct SyncService {
    config: SyncConfig,
    records: Arc<dyn BlockRecordStore + Send + Sync>,
    registry: Arc<EndpointRegistry>,
    metrics: Arc<SyncMetrics>,
    shutdown: Arc<ShutdownController>,
    status_tx: Arc<watch::Sender<SyncStatus>>,
    status_rx: watch::Receiver<SyncStatus>,
    now_tx: Arc<watch::Sender<Timestamp>>,
    now_rx: watch::Receiver<Timestamp>,
    /// Handles for spawned background tasks (joined during shutdown).
    task_handles: Vec<JoinHandle<()>>,
}

impl SyncService {
    pub fn new(
        config: SyncConfig,
        records: Arc<dyn BlockRecordStore + Send + Sync>,
        registry: Arc<EndpointRegistry>,
    ) -> Self {
        let (status_tx, status_rx) = watch::channel(SyncStatus::idle(registry.active()));
        let (now_tx, now_rx) = watch::channel(Timestamp::now());
        Self {
            config,
            records,
            registry,
            metrics: Arc::new(SyncMetrics::new()),
            shutdown: Arc::new(ShutdownController::new()),
            status_tx: Arc::new(status_tx),
            status_rx,
            now_tx: Arc::new(now_tx),
            now_rx,
            task_handles: Vec::new(),
        }
    }

    /// Spawn the ticker and the session runner.
    pub fn start(&mut self) {
        let tick = Duration::from_millis(self.config.tick_interval_ms);
        let now_tx = Arc::clone(&self.now_tx);
        let mut shutdown_rx = self.shutdown.subscribe();
        self.task_handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => break,
                    _ = interval.tick() => {
                        let _ = now_tx.send(Timestamp::now());
                    }
                }
            }
            tracing::debug!("clock ticker stopped");
        }));

        let ctx = SessionContext {
            client_config: self.config.client_config(),
            records: Arc::clone(&self.records),
            registry: Arc::clone(&self.registry),
            metrics: Arc::clone(&self.metrics),
            status_tx: Arc::clone(&self.status_tx),
            shutdown: Arc::clone(&self.shutdown),
        };
        self.task_handles.push(tokio::spawn(run_sessions(ctx)));
        tracing::info!(endpoint = %self.registry.active(), "sync service started");
    }

    /// Trigger shutdown and wait for the background tasks.
    pub async fn stop(&mut self) -> Result<(), SyncError> {
        self.shutdown.shutdown();
        for handle in self.task_handles.drain(..) {
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, handle).await {
                Ok(_) => {}
                Err(_) => return Err(SyncError::ShutdownTimeout),
            }
        }
        tracing::info!("sync service stopped");
        Ok(())
    }

    /// Shutdown controller, shared with the embedding process (signal
    /// handling, API graceful shutdown).
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    pub fn registry(&self) -> Arc<EndpointRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn metrics(&self) -> Arc<SyncMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Status snapshots, refreshed on every lifecycle change.
    pub fn status(&self) -> watch::Receiver<SyncStatus> {
        self.status_rx.clone()
    }

    /// The `now` signal, refreshed on each clock tick.
    pub fn now(&self) -> watch::Receiver<Timestamp> {
        self.now_rx.clone()
    }
}

/// Everything the session runner needs, bundled so the task signature stays
/// readable.
struct SessionContext {
    client_config: ClientConfig,
    records: Arc<dyn BlockRecordStore + Send + Sync>,
    registry: Arc<EndpointRegistry>,
    metrics: Arc<SyncMetrics>,
    status_tx: Arc<watch::Sender<SyncStatus>>,
    shutdown: Arc<ShutdownController>,
}

impl SessionContext {
    fn set_status(&self, update: impl FnOnce(&mut SyncStatus)) {
        self.status_tx.send_modify(update);
    }
}

enum SessionExit {
    Shutdown,
    EndpointChanged,
    /// Reconnect policy exhausted or the subscribe handshake failed.
    Dead,
}

enum ConnectOutcome {
    Session(Box<SyncSession>),
    Shutdown,
    EndpointChanged,
    Exhausted,
}

/// Outer loop: one session per active endpoint, rebuilt on every change.
async fn run_sessions(ctx: SessionContext) {
    let mut endpoint_rx = ctx.registry.watch_active();
    let mut shutdown_rx = ctx.shutdown.subscribe();

    loop {
        let endpoint = endpoint_rx.borrow_and_update().clone();
        // A fresh session starts with a clean slate: the gap marker from a
        // previous session's reconnects no longer applies.
        ctx.set_status(|s| {
            *s = SyncStatus::idle(endpoint.clone());
            s.state = SyncState::Connecting;
        });

        let outcome =
            connect_with_backoff(&ctx, &endpoint, &mut endpoint_rx, &mut shutdown_rx).await;
        let session = match outcome {
            ConnectOutcome::Session(session) => *session,
            ConnectOutcome::Shutdown => return,
            ConnectOutcome::EndpointChanged => continue,
            ConnectOutcome::Exhausted => {
                ctx.set_status(|s| {
                    s.state = SyncState::Disconnected;
                    s.connected = false;
                });
                tracing::error!(%endpoint, "giving up on endpoint until user action");
                match park(&mut endpoint_rx, &mut shutdown_rx).await {
                    Parked::EndpointChanged => continue,
                    Parked::Shutdown => return,
                }
            }
        };

        match drive_session(&ctx, session, &mut endpoint_rx, &mut shutdown_rx).await {
            SessionExit::Shutdown => return,
            SessionExit::EndpointChanged => continue,
            SessionExit::Dead => {
                ctx.set_status(|s| {
                    s.state = SyncState::Disconnected;
                    s.connected = false;
                });
                ctx.metrics.connected.set(0);
                tracing::error!(%endpoint, "session is dead; waiting for user action");
                match park(&mut endpoint_rx, &mut shutdown_rx).await {
                    Parked::EndpointChanged => continue,
                    Parked::Shutdown => return,
                }
            }
        }
    }
}

enum Parked {
    EndpointChanged,
    Shutdown,
}

/// Wait in `Disconnected` until the user switches (or retries) the endpoint.
async fn park(
    endpoint_rx: &mut watch::Receiver<String>,
    shutdown_rx: &mut broadcast::Receiver<()>,
) -> Parked {
    tokio::select! {
        biased;
        _ = shutdown_rx.recv() => Parked::Shutdown,
        changed = endpoint_rx.changed() => match changed {
            Ok(()) => Parked::EndpointChanged,
            Err(_) => Parked::Shutdown,
        },
    }
}

/// Initial connect gets the same bounded backoff as reconnects: the node
/// being down at startup is not fatal until the policy is exhausted.
async fn connect_with_backoff(
    ctx: &SessionContext,
    endpoint: &str,
    endpoint_rx: &mut watch::Receiver<String>,
    shutdown_rx: &mut broadcast::Receiver<()>,
) -> ConnectOutcome {
    let policy = ctx.client_config.reconnect.clone();
    for attempt in 0..=policy.max_attempts {
        match SyncSession::connect(endpoint, ctx.client_config.clone()).await {
            Ok(session) => return ConnectOutcome::Session(Box::new(session)),
            Err(e) => {
                ctx.metrics.connect_failures.inc();
                tracing::warn!(%endpoint, attempt, error = %e, "connect failed");
            }
        }
        if attempt == policy.max_attempts {
            break;
        }
        let delay = policy.delay_for(attempt);
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => return ConnectOutcome::Shutdown,
            changed = endpoint_rx.changed() => match changed {
                Ok(()) => return ConnectOutcome::EndpointChanged,
                Err(_) => return ConnectOutcome::Shutdown,
            },
            _ = tokio::time::sleep(delay) => {}
        }
    }
    ConnectOutcome::Exhausted
}

/// Inner loop: subscribe, then process events and notifications in arrival
/// order until the session ends.
async fn drive_session(
    ctx: &SessionContext,
    session: SyncSession,
    endpoint_rx: &mut watch::Receiver<String>,
    shutdown_rx: &mut broadcast::Receiver<()>,
) -> SessionExit {
    let SyncSession {
        endpoint,
        client,
        mut events,
        mut state,
    } = session;

    let mut notifications: Option<mpsc::Receiver<Value>> = None;
    let mut subscribed_once = false;
    let mut state_alive = true;

    let exit = loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => break SessionExit::Shutdown,
            changed = endpoint_rx.changed() => {
                match changed {
                    Ok(()) => {
                        tracing::info!(old = %endpoint, "endpoint switch requested, retiring session");
                        break SessionExit::EndpointChanged;
                    }
                    Err(_) => break SessionExit::Shutdown,
                }
            }
            event = events.recv() => match event {
                Some(SessionEvent::Opened) if !subscribed_once => {
                    ctx.set_status(|s| { s.state = SyncState::Subscribing; s.connected = true; });
                    ctx.metrics.connected.set(1);
                    match client.subscribe(topic::NEW_BLOCK).await {
                        Ok(rx) => {
                            notifications = Some(rx);
                            subscribed_once = true;
                            ctx.set_status(|s| s.state = SyncState::Live);
                            tracing::info!(%endpoint, "live: subscribed to new blocks");
                        }
                        Err(e) => {
                            tracing::error!(%endpoint, error = %e, "subscribe failed");
                            break SessionExit::Dead;
                        }
                    }
                }
                Some(SessionEvent::Opened) => {
                    // Reconnected: subscriptions don't survive, re-establish
                    // them and surface the gap instead of hiding it.
                    ctx.metrics.reconnects.inc();
                    ctx.metrics.connected.set(1);
                    match client.resubscribe().await {
                        Ok(()) => {
                            let resynced_at = Timestamp::now();
                            ctx.set_status(|s| {
                                s.state = SyncState::Live;
                                s.connected = true;
                                s.last_resync = Some(resynced_at);
                                s.possible_gap = true;
                            });
                            tracing::warn!(
                                %endpoint,
                                "re-subscribed after reconnect; notifications in the gap are lost"
                            );
                        }
                        Err(e) => {
                            tracing::error!(%endpoint, error = %e, "re-subscribe failed");
                            break SessionExit::Dead;
                        }
                    }
                }
                Some(SessionEvent::Exhausted) | None => break SessionExit::Dead,
            },
            changed = state.changed(), if state_alive => {
                match changed {
                    Ok(()) => {
                        let conn = *state.borrow_and_update();
                        ctx.metrics.connected.set(conn.is_open() as i64);
                        ctx.set_status(|s| {
                            s.connected = conn.is_open();
                            if conn == jamscan_rpc::ConnectionState::Reconnecting {
                                s.state = SyncState::Reconnecting;
                            }
                        });
                    }
                    Err(_) => state_alive = false,
                }
            }
            notification = recv_notification(&mut notifications) => match notification {
                Some(params) => handle_new_block(ctx, &client, params).await,
                None => notifications = None,
            },
        }
    };

    // Retire the session: pending calls resolve with Cancelled, notification
    // channels end, transport closes. Only then may a successor connect.
    client.shutdown();
    ctx.metrics.connected.set(0);
    exit
}

async fn recv_notification(notifications: &mut Option<mpsc::Receiver<Value>>) -> Option<Value> {
    match notifications {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// One notification: draft upsert first (so the view is responsive), then
/// state enrichment in a detached task. The draft upsert returning before
/// the task is spawned is what orders the two writes for a given hash.
async fn handle_new_block(ctx: &SessionContext, client: &Arc<RpcClient>, params: Value) {
    let parsed: NewBlockParams = match serde_json::from_value(params) {
        Ok(parsed) => parsed,
        Err(e) => {
            ctx.metrics.malformed_notifications.inc();
            tracing::warn!(error = %e, "malformed new-block notification dropped");
            return;
        }
    };
    let hash = match HeaderHash::from_hex(&parsed.header_hash) {
        Ok(hash) => hash,
        Err(e) => {
            ctx.metrics.malformed_notifications.inc();
            tracing::warn!(raw = %parsed.header_hash, error = %e, "bad header hash dropped");
            return;
        }
    };

    let draft = BlockRecord::draft(hash, parsed.block, Timestamp::now());
    if let Err(e) = ctx.records.upsert(&draft) {
        ctx.metrics.store_failures.inc();
        tracing::error!(%hash, error = %e, "draft upsert failed; a later notification may retry");
        return;
    }
    ctx.metrics.blocks_ingested.inc();
    if let Ok(count) = ctx.records.count() {
        ctx.metrics.record_count.set(count as i64);
    }
    tracing::debug!(%hash, "draft block record stored");

    let client = Arc::clone(client);
    let records = Arc::clone(&ctx.records);
    let metrics = Arc::clone(&ctx.metrics);
    tokio::spawn(async move {
        match client.call(method::GET_STATE, json!([hash.to_hex()])).await {
            Ok(Value::Null) => {
                metrics.state_fetch_failures.inc();
                tracing::debug!(%hash, "node returned no state for block");
            }
            Ok(state) => match records.upsert(&BlockRecord::state_update(hash, state)) {
                Ok(()) => {
                    metrics.state_fetches.inc();
                    tracing::debug!(%hash, "state merged into block record");
                }
                Err(e) => {
                    metrics.store_failures.inc();
                    tracing::error!(%hash, error = %e, "state merge upsert failed");
                }
            },
            // Best-effort enrichment: no retry, the record stays valid
            // without state.
            Err(e) => {
                metrics.state_fetch_failures.inc();
                tracing::warn!(%hash, error = %e, "state fetch failed");
            }
        }
    });
}
