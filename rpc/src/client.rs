//! The subscription protocol layer: correlated calls and notification demux.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::error::RpcClientError;
use crate::protocol::{method, Frame, Request};
use crate::transport::{ConnectionState, ReconnectPolicy, Transport, TransportEvent};

/// Capacity of the transport → dispatcher event channel.
const EVENT_CAPACITY: usize = 1024;

/// Capacity of the session event channel handed to the orchestrator.
const SESSION_EVENT_CAPACITY: usize = 8;

#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Bounded wait for a call response.
    pub call_timeout: Duration,
    /// Per-topic notification queue depth.
    pub subscription_buffer: usize,
    pub reconnect: ReconnectPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(10),
            subscription_buffer: 256,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

/// Session-level events the orchestrator reacts to.
#[derive(Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// The socket (re)opened. The first one arrives right after `connect`;
    /// any later one means subscriptions must be re-established.
    Opened,
    /// Reconnection attempts are exhausted; the session is dead.
    Exhausted,
}

#[derive(Default)]
struct Shared {
    next_id: AtomicU64,
    /// One waiter per in-flight call; IDs are never reused while pending.
    pending: Mutex<HashMap<u64, oneshot::Sender<Result<Value, RpcClientError>>>>,
    /// Notification routes, keyed by topic.
    subscriptions: Mutex<HashMap<String, mpsc::Sender<Value>>>,
}

/// A JSON-RPC client over one WebSocket transport.
pub struct RpcClient {
    transport: Transport,
    shared: Arc<Shared>,
    config: ClientConfig,
    dispatch: JoinHandle<()>,
}

impl RpcClient {
    /// Connect to `url` and start the dispatch task. Returns the client and
    /// the session event stream.
    pub async fn connect(
        url: &str,
        config: ClientConfig,
    ) -> Result<(Self, mpsc::Receiver<SessionEvent>), RpcClientError> {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CAPACITY);
        let transport = Transport::connect(url, config.reconnect.clone(), events_tx).await?;
        let shared = Arc::new(Shared::default());
        let (session_tx, session_rx) = mpsc::channel(SESSION_EVENT_CAPACITY);
        let dispatch = tokio::spawn(dispatch(events_rx, Arc::clone(&shared), session_tx));

        Ok((
            Self {
                transport,
                shared,
                config,
                dispatch,
            },
            session_rx,
        ))
    }

    /// Issue a call and wait for the matching response.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, RpcClientError> {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let request = Request::new(id, method, params);
        let text =
            serde_json::to_string(&request).map_err(|e| RpcClientError::Protocol(e.to_string()))?;

        let (tx, rx) = oneshot::channel();
        self.shared.pending.lock().expect("pending lock").insert(id, tx);

        if let Err(e) = self.transport.send(text).await {
            self.shared.pending.lock().expect("pending lock").remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(self.config.call_timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            // Waiter dropped without a verdict: the client was torn down.
            Ok(Err(_)) => Err(RpcClientError::Cancelled),
            Err(_) => {
                self.shared.pending.lock().expect("pending lock").remove(&id);
                tracing::warn!(method, id, "rpc call timed out");
                Err(RpcClientError::Timeout {
                    method: method.to_string(),
                })
            }
        }
    }

    /// Subscribe to a notification topic. Notifications are delivered on the
    /// returned channel in arrival order until `unsubscribe` or teardown.
    pub async fn subscribe(&self, topic: &str) -> Result<mpsc::Receiver<Value>, RpcClientError> {
        let (tx, rx) = mpsc::channel(self.config.subscription_buffer);
        self.shared
            .subscriptions
            .lock()
            .expect("subscriptions lock")
            .insert(topic.to_string(), tx);

        match self.call(method::SUBSCRIBE, json!([topic])).await {
            Ok(_) => Ok(rx),
            Err(e) => {
                self.shared
                    .subscriptions
                    .lock()
                    .expect("subscriptions lock")
                    .remove(topic);
                Err(e)
            }
        }
    }

    /// Re-issue the subscribe call for every registered topic. Used after a
    /// reconnect; existing notification channels keep working.
    pub async fn resubscribe(&self) -> Result<(), RpcClientError> {
        let topics: Vec<String> = self
            .shared
            .subscriptions
            .lock()
            .expect("subscriptions lock")
            .keys()
            .cloned()
            .collect();
        for topic in topics {
            self.call(method::SUBSCRIBE, json!([&topic])).await?;
            tracing::debug!(%topic, "re-subscribed after reconnect");
        }
        Ok(())
    }

    /// Stop routing a topic and tell the node. The topic's notification
    /// channel ends immediately.
    pub async fn unsubscribe(&self, topic: &str) -> Result<(), RpcClientError> {
        self.shared
            .subscriptions
            .lock()
            .expect("subscriptions lock")
            .remove(topic);
        self.call(method::UNSUBSCRIBE, json!([topic])).await?;
        Ok(())
    }

    /// Connection liveness, for display.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.transport.state()
    }

    /// Resolve every pending call with [`RpcClientError::Cancelled`].
    pub fn cancel_pending(&self) {
        let mut pending = self.shared.pending.lock().expect("pending lock");
        if pending.is_empty() {
            return;
        }
        tracing::debug!(count = pending.len(), "cancelling pending calls");
        for (_, tx) in pending.drain() {
            let _ = tx.send(Err(RpcClientError::Cancelled));
        }
    }

    /// Tear the session down: cancel pending calls, end every subscription
    /// channel, and disconnect the transport. Idempotent.
    pub fn shutdown(&self) {
        self.cancel_pending();
        self.shared
            .subscriptions
            .lock()
            .expect("subscriptions lock")
            .clear();
        self.transport.disconnect();
    }

    /// Shut down and wait for the background tasks to finish.
    pub async fn close(self) {
        self.shutdown();
        self.transport.close().await;
        let _ = self.dispatch.await;
    }
}

/// Single consumer of transport events: preserves arrival order without any
/// locking across frames.
async fn dispatch(
    mut events_rx: mpsc::Receiver<TransportEvent>,
    shared: Arc<Shared>,
    session_tx: mpsc::Sender<SessionEvent>,
) {
    let mut first_open = true;
    while let Some(event) = events_rx.recv().await {
        match event {
            TransportEvent::Frame(text) => handle_frame(&shared, &text).await,
            TransportEvent::Opened => {
                if !first_open {
                    // Calls in flight on the old socket can never be answered.
                    fail_pending(&shared, "connection reset during call");
                }
                first_open = false;
                let _ = session_tx.send(SessionEvent::Opened).await;
            }
            TransportEvent::Exhausted => {
                fail_pending(&shared, "reconnect attempts exhausted");
                let _ = session_tx.send(SessionEvent::Exhausted).await;
            }
        }
    }
    // Transport task is gone; nothing can answer anymore.
    let mut pending = shared.pending.lock().expect("pending lock");
    for (_, tx) in pending.drain() {
        let _ = tx.send(Err(RpcClientError::Cancelled));
    }
}

fn fail_pending(shared: &Shared, reason: &str) {
    let mut pending = shared.pending.lock().expect("pending lock");
    if pending.is_empty() {
        return;
    }
    tracing::debug!(count = pending.len(), reason, "failing pending calls");
    for (_, tx) in pending.drain() {
        let _ = tx.send(Err(RpcClientError::Connection(reason.to_string())));
    }
}

async fn handle_frame(shared: &Arc<Shared>, text: &str) {
    let frame = match Frame::parse(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!(error = %e, "malformed frame dropped");
            return;
        }
    };

    if let Some(id) = frame.id {
        let waiter = shared.pending.lock().expect("pending lock").remove(&id);
        match waiter {
            Some(tx) => {
                let outcome = match frame.error {
                    Some(err) => Err(RpcClientError::Rpc {
                        code: err.code,
                        message: err.message,
                    }),
                    None => Ok(frame.result.unwrap_or(Value::Null)),
                };
                let _ = tx.send(outcome);
            }
            None => tracing::debug!(id, "response for unknown call id dropped"),
        }
        return;
    }

    match frame.method {
        Some(topic) => {
            let subscriber = shared
                .subscriptions
                .lock()
                .expect("subscriptions lock")
                .get(&topic)
                .cloned();
            match subscriber {
                Some(tx) => {
                    if tx.send(frame.params).await.is_err() {
                        shared
                            .subscriptions
                            .lock()
                            .expect("subscriptions lock")
                            .remove(&topic);
                        tracing::debug!(%topic, "subscriber gone, route removed");
                    }
                }
                None => tracing::debug!(%topic, "notification with no subscriber dropped"),
            }
        }
        None => tracing::warn!("frame with neither id nor method dropped"),
    }
}
