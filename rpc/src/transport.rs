//! WebSocket transport: one connection, reconnection policy, liveness.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::RpcClientError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Capacity of the outbound send queue.
const OUTBOUND_CAPACITY: usize = 256;

/// Observable liveness of the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Reconnecting,
    /// Terminal: shut down, or the reconnection policy is exhausted. Only a
    /// new transport (manual retry or endpoint switch) leaves this state.
    Disconnected,
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }
}

/// Bounded exponential backoff for reconnection attempts.
#[derive(Clone, Debug)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            max_attempts: 10,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the given attempt (0-based): doubles each attempt,
    /// capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Events delivered to the protocol layer, in arrival order.
#[derive(Debug)]
pub enum TransportEvent {
    /// An inbound text frame.
    Frame(String),
    /// The socket (re)opened. Subscriptions do not survive a reconnect and
    /// must be re-established on every `Opened` after the first.
    Opened,
    /// The reconnection policy is exhausted; the transport is dead until
    /// replaced.
    Exhausted,
}

/// Handle to a running transport task.
///
/// The task owns the socket for its whole lifecycle, including reconnection,
/// so there is never more than one live connection per transport.
pub struct Transport {
    outbound_tx: mpsc::Sender<String>,
    state_rx: watch::Receiver<ConnectionState>,
    shutdown_tx: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl Transport {
    /// Establish the initial connection and spawn the transport task.
    ///
    /// Fails with [`RpcClientError::Connection`] when the endpoint is
    /// unreachable or the handshake fails; reconnection only applies to
    /// connections lost *after* a successful connect.
    pub async fn connect(
        url: &str,
        policy: ReconnectPolicy,
        events_tx: mpsc::Sender<TransportEvent>,
    ) -> Result<Self, RpcClientError> {
        let (socket, _response) = connect_async(url)
            .await
            .map_err(|e| RpcClientError::Connection(e.to_string()))?;
        tracing::info!(%url, "websocket connected");

        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        // The handshake has already succeeded, so sends are valid before the
        // transport task gets its first poll.
        let (state_tx, state_rx) = watch::channel(ConnectionState::Open);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let task = tokio::spawn(run(
            socket,
            url.to_string(),
            policy,
            outbound_rx,
            events_tx,
            state_tx,
            shutdown_rx,
        ));

        Ok(Self {
            outbound_tx,
            state_rx,
            shutdown_tx,
            task,
        })
    }

    /// Queue a text frame for transmission.
    pub async fn send(&self, text: String) -> Result<(), RpcClientError> {
        if !self.state_rx.borrow().is_open() {
            return Err(RpcClientError::NotConnected);
        }
        self.outbound_tx
            .send(text)
            .await
            .map_err(|_| RpcClientError::ChannelClosed)
    }

    /// A watch on the connection state, for liveness display.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Tear the connection down. Idempotent; also stops any in-progress
    /// reconnection loop.
    pub fn disconnect(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Disconnect and wait for the transport task to finish.
    pub async fn close(self) {
        self.disconnect();
        let _ = self.task.await;
    }
}

enum PumpExit {
    Shutdown,
    Closed,
}

enum Reconnected {
    Socket(Box<WsStream>),
    Shutdown,
    Exhausted,
}

async fn run(
    socket: WsStream,
    url: String,
    policy: ReconnectPolicy,
    mut outbound_rx: mpsc::Receiver<String>,
    events_tx: mpsc::Sender<TransportEvent>,
    state_tx: watch::Sender<ConnectionState>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut socket = socket;
    loop {
        let _ = state_tx.send(ConnectionState::Open);
        if events_tx.send(TransportEvent::Opened).await.is_err() {
            // Protocol layer is gone; nothing left to deliver to.
            let _ = state_tx.send(ConnectionState::Disconnected);
            return;
        }

        let (mut write, mut read) = socket.split();
        let exit = loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break PumpExit::Shutdown,
                maybe_out = outbound_rx.recv() => match maybe_out {
                    Some(text) => {
                        if let Err(e) = write.send(Message::Text(text)).await {
                            tracing::warn!(error = %e, "websocket send failed");
                            break PumpExit::Closed;
                        }
                    }
                    None => break PumpExit::Shutdown,
                },
                inbound = read.next() => match inbound {
                    Some(Ok(Message::Text(text))) => {
                        if events_tx.send(TransportEvent::Frame(text)).await.is_err() {
                            break PumpExit::Shutdown;
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = write.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break PumpExit::Closed,
                    Some(Ok(_)) => {} // binary and pong frames are ignored
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "websocket receive error");
                        break PumpExit::Closed;
                    }
                },
            }
        };

        match exit {
            PumpExit::Shutdown => {
                let _ = write.close().await;
                let _ = state_tx.send(ConnectionState::Disconnected);
                tracing::debug!(%url, "transport shut down");
                return;
            }
            PumpExit::Closed => {
                let _ = state_tx.send(ConnectionState::Reconnecting);
                tracing::warn!(%url, "connection lost, attempting reconnect");
                match reconnect(&url, &policy, &mut shutdown_rx).await {
                    Reconnected::Socket(new_socket) => socket = *new_socket,
                    Reconnected::Shutdown => {
                        let _ = state_tx.send(ConnectionState::Disconnected);
                        return;
                    }
                    Reconnected::Exhausted => {
                        let _ = state_tx.send(ConnectionState::Disconnected);
                        let _ = events_tx.send(TransportEvent::Exhausted).await;
                        tracing::error!(
                            %url,
                            attempts = policy.max_attempts,
                            "reconnect attempts exhausted, transport is down"
                        );
                        return;
                    }
                }
            }
        }
    }
}

async fn reconnect(
    url: &str,
    policy: &ReconnectPolicy,
    shutdown_rx: &mut broadcast::Receiver<()>,
) -> Reconnected {
    for attempt in 0..policy.max_attempts {
        let delay = policy.delay_for(attempt);
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => return Reconnected::Shutdown,
            _ = tokio::time::sleep(delay) => {}
        }
        match connect_async(url).await {
            Ok((socket, _)) => {
                tracing::info!(%url, attempt, "websocket reconnected");
                return Reconnected::Socket(Box::new(socket));
            }
            Err(e) => {
                tracing::warn!(%url, attempt, error = %e, "reconnect attempt failed");
            }
        }
    }
    Reconnected::Exhausted
}
