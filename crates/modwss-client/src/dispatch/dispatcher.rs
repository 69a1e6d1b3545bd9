//! Request/response correlation over one socket, keyed by operation tag.
//!
//! - `send` writes one batch frame under an exclusive send lock
//! - `wait_for` parks the caller on the tag's single pending-wait slot; a second
//!   caller for the same tag queues until the first is gone
//! - `handshake` registers the wait before sending, so a fast reply cannot slip
//!   past it
//! - `route` is driven by the connection's receive loop, one batch at a time
//! - `cancel_all` resolves every wait as cancelled and clears the cache

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{oneshot, watch};

use modwss_core::error::{Result, WssError};
use modwss_core::protocol::{ops, Batch, Envelope, FailedOperation, Payload};

use crate::config::WssConfig;
use crate::obs::WssMetrics;
use crate::transport::{
    ConnectionManager, ConnectionObserver, ConnectionState, Connector, TungsteniteConnector,
};

use super::table::{CorrelationTable, Delivery, Registration, Resolution};

type SharedTable = Arc<Mutex<CorrelationTable>>;

fn lock(table: &Mutex<CorrelationTable>) -> MutexGuard<'_, CorrelationTable> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What happened after the socket dropped on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectOutcome {
    /// Nobody was waiting, so no reconnect was tried.
    NotAttempted,
    Reconnected,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectReport {
    pub reason: Option<String>,
    /// Waits resolved as cancelled because of the drop.
    pub cancelled: usize,
    pub reconnect: ReconnectOutcome,
}

/// One connection lifetime's correlation layer.
pub struct Dispatcher {
    cfg: Arc<WssConfig>,
    conn: ConnectionManager,
    table: SharedTable,
    // frames must not interleave on the wire
    send_lock: tokio::sync::Mutex<()>,
    metrics: Arc<WssMetrics>,
    reports_tx: watch::Sender<Option<DisconnectReport>>,
}

impl Dispatcher {
    pub fn new(cfg: WssConfig, connector: Arc<dyn Connector>) -> Arc<Self> {
        let cfg = Arc::new(cfg);
        Arc::new_cyclic(|me: &Weak<Dispatcher>| {
            let observer: Weak<dyn ConnectionObserver> = me.clone();
            let (reports_tx, _) = watch::channel(None);
            Self {
                conn: ConnectionManager::new(Arc::clone(&cfg), connector, observer),
                cfg,
                table: Arc::new(Mutex::new(CorrelationTable::new())),
                send_lock: tokio::sync::Mutex::new(()),
                metrics: Arc::new(WssMetrics::default()),
                reports_tx,
            }
        })
    }

    /// Dispatcher over a real WebSocket.
    pub fn over_websocket(cfg: WssConfig) -> Arc<Self> {
        let connector = Arc::new(TungsteniteConnector::new(cfg.timing.connect_timeout()));
        Self::new(cfg, connector)
    }

    pub fn config(&self) -> &WssConfig {
        &self.cfg
    }

    // --------------------
    // Connection
    // --------------------

    pub async fn connect(&self) -> Result<()> {
        self.conn.connect().await
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_connected()
    }

    /// Close the socket. Pending waits are left to resolve or time out.
    pub async fn disconnect(&self) {
        self.conn.disconnect().await;
    }

    /// Cancel everything and close the socket.
    pub async fn shutdown(&self) {
        let cancelled = self.cancel_all();
        self.conn.disconnect().await;
        tracing::info!(cancelled, "wss dispatcher shut down");
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.conn.state()
    }

    pub fn subscribe_connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.conn.subscribe_state()
    }

    /// Latest unexpected-disconnect report (`None` until the first one).
    pub fn disconnect_reports(&self) -> watch::Receiver<Option<DisconnectReport>> {
        self.reports_tx.subscribe()
    }

    // --------------------
    // Outbound
    // --------------------

    pub async fn send(&self, envelope: Envelope) -> Result<()> {
        self.send_batch(vec![envelope]).await
    }

    /// Write several envelopes as one frame, connecting first if needed.
    pub async fn send_batch(&self, envelopes: Vec<Envelope>) -> Result<()> {
        if !self.conn.is_connected() {
            self.conn.connect().await?;
        }
        let frame = Batch::new(envelopes).encode()?;

        let _guard = self.send_lock.lock().await;
        let link = self
            .conn
            .link()
            .ok_or_else(|| WssError::ServiceNotConnected("socket closed before send".into()))?;

        link.send_text(frame).await.map_err(|e| match e {
            WssError::ServiceNotConnected(_) | WssError::FailedToSend(_) => e,
            other => WssError::FailedToSend(other.to_string()),
        })?;
        self.metrics.frames_sent.inc(&[]);
        Ok(())
    }

    // --------------------
    // Waiting
    // --------------------

    /// Claim the tag's pending-wait slot, queueing behind any current holder.
    ///
    /// A queued caller whose turn is ended by `cancel_all` gets
    /// `OperationCancelled` instead of a fresh slot.
    pub async fn register(&self, operation: &str) -> Result<PendingHandle> {
        let mut queued_at: Option<u64> = None;
        loop {
            let attempt = {
                let mut table = lock(&self.table);
                if queued_at.is_some_and(|epoch| epoch != table.epoch()) {
                    None
                } else {
                    Some(table.register(operation))
                }
            };
            let (released, epoch) = match attempt {
                None => {
                    tracing::debug!(%operation, "queued wait cancelled");
                    self.metrics
                        .waits
                        .inc(&[("operation", operation), ("result", "cancelled")]);
                    return Err(WssError::OperationCancelled);
                }
                Some(Registration::Registered { id, rx }) => {
                    return Ok(PendingHandle {
                        operation: operation.to_string(),
                        id,
                        rx,
                        table: Arc::clone(&self.table),
                        metrics: Arc::clone(&self.metrics),
                        timeout: self.cfg.timing.wait_timeout(),
                    });
                }
                Some(Registration::Occupied { released, epoch }) => (released, epoch),
            };
            tracing::debug!(%operation, "queued behind an existing waiter");
            queued_at.get_or_insert(epoch);
            let mut released = released;
            // only ever errors: the holder's sender is dropped, never written
            let _ = released.changed().await;
        }
    }

    /// Wait for the next envelope tagged `operation`.
    ///
    /// With `check_unhandled`, an envelope that already arrived unclaimed is
    /// consumed and returned without waiting.
    pub async fn wait_for(&self, operation: &str, check_unhandled: bool) -> Result<Envelope> {
        if check_unhandled {
            let cached = lock(&self.table).take_unhandled(operation);
            if let Some(env) = cached {
                tracing::debug!(%operation, "claimed unhandled envelope");
                self.metrics
                    .waits
                    .inc(&[("operation", operation), ("result", "cache_hit")]);
                return Ok(env);
            }
        }
        self.register(operation).await?.wait().await
    }

    /// Send `envelope`, then wait for the reply tagged `operation` and decode it.
    ///
    /// The wait is registered first. A send failure drops it and is returned
    /// as is.
    pub async fn handshake<R: Payload>(&self, operation: &str, envelope: Envelope) -> Result<R> {
        let started = Instant::now();
        let pending = self.register(operation).await?;

        if let Err(e) = self.send(envelope).await {
            tracing::warn!(%operation, error = %e, "handshake send failed");
            drop(pending);
            return Err(e);
        }

        let reply = pending.wait().await;
        self.metrics
            .handshake_duration
            .observe(&[("operation", operation)], started.elapsed());
        reply?.decode_as::<R>()
    }

    /// Typed handshake: the request's own tag names the reply.
    pub async fn request<Q: Payload, R: Payload>(&self, request: &Q) -> Result<R> {
        self.handshake(Q::OPERATION, Envelope::from_payload(request)?)
            .await
    }

    // --------------------
    // Cancellation
    // --------------------

    /// Resolve only `operation`'s wait as cancelled.
    pub fn cancel(&self, operation: &str) -> bool {
        let wait = lock(&self.table).take_pending(operation);
        match wait {
            Some(wait) => {
                let _ = wait.resolve(Resolution::Cancelled);
                tracing::debug!(%operation, "wait cancelled");
                true
            }
            None => false,
        }
    }

    /// Resolve every wait as cancelled and clear the unhandled cache.
    /// Returns how many waits were cancelled.
    pub fn cancel_all(&self) -> usize {
        let drained = lock(&self.table).drain();
        let n = drained.len();
        for wait in drained {
            let _ = wait.resolve(Resolution::Cancelled);
        }
        if n > 0 {
            tracing::debug!(cancelled = n, "all waits cancelled");
        }
        n
    }

    // --------------------
    // Inbound
    // --------------------

    /// Decode one raw frame and route it. Undecodable frames are dropped, and so
    /// are malformed envelopes inside an otherwise valid frame.
    pub fn route_frame(&self, frame: &str) {
        match Batch::decode(frame) {
            Ok(batch) => {
                if batch.skipped > 0 {
                    self.metrics
                        .envelopes_routed
                        .add(&[("route", "malformed")], batch.skipped as u64);
                }
                self.route(batch);
            }
            Err(e) => {
                tracing::warn!(error = %e, len = frame.len(), "dropping undecodable frame");
                self.metrics.envelopes_routed.inc(&[("route", "undecodable")]);
            }
        }
    }

    /// Route a batch in order: error notifications cancel the wait they name,
    /// everything else resolves its tag's wait or lands in the unhandled cache.
    pub fn route(&self, batch: Batch) {
        for env in batch {
            if env.operation.is_empty() {
                tracing::warn!("dropping envelope without operation tag");
                continue;
            }
            if env.operation == ops::FAILED_OPERATION {
                self.route_failure(&env);
                continue;
            }

            let operation = env.operation.clone();
            let delivery = lock(&self.table).deliver(env);
            match delivery {
                Delivery::Waiter(wait, env) => {
                    if let Err(Resolution::Delivered(env)) = wait.resolve(Resolution::Delivered(env)) {
                        // waiter vanished between lookup and resolve
                        lock(&self.table).stash(env);
                        self.metrics.envelopes_routed.inc(&[("route", "cached")]);
                        continue;
                    }
                    tracing::debug!(%operation, "resolved pending wait");
                    self.metrics.envelopes_routed.inc(&[("route", "resolved")]);
                }
                Delivery::Cached { replaced } => {
                    tracing::debug!(%operation, replaced, "no waiter; cached");
                    self.metrics.envelopes_routed.inc(&[("route", "cached")]);
                }
            }
        }
    }

    fn route_failure(&self, env: &Envelope) {
        self.metrics
            .envelopes_routed
            .inc(&[("route", "failed_operation")]);

        let failed: FailedOperation = match env.decode_as() {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(error = %e, "undecodable failed-operation notification");
                return;
            }
        };

        tracing::warn!(
            operation = %failed.operation,
            code = ?failed.code,
            error_ref = ?failed.error_ref,
            message = ?failed.message,
            "server reported failed operation"
        );
        if !self.cancel(&failed.operation) {
            tracing::debug!(operation = %failed.operation, "no waiter for failed operation");
        }
    }

    // --------------------
    // Introspection
    // --------------------

    pub fn pending_count(&self) -> usize {
        lock(&self.table).pending_len()
    }

    pub fn is_waiting(&self, operation: &str) -> bool {
        lock(&self.table).is_waiting(operation)
    }

    pub fn unhandled_count(&self) -> usize {
        lock(&self.table).unhandled_len()
    }

    pub fn metrics(&self) -> &WssMetrics {
        &self.metrics
    }

    /// Prometheus text for all counters plus the live table sizes.
    pub fn render_metrics(&self) -> String {
        let (pending, unhandled) = {
            let t = lock(&self.table);
            (t.pending_len() as u64, t.unhandled_len() as u64)
        };
        self.metrics.render(&[
            ("modwss_pending_waits", pending),
            ("modwss_unhandled_cached", unhandled),
        ])
    }
}

#[async_trait]
impl ConnectionObserver for Dispatcher {
    fn on_frame(&self, frame: &str) {
        self.route_frame(frame);
    }

    async fn on_unexpected_disconnect(&self, reason: Option<String>) {
        let cancelled = self.cancel_all();
        self.metrics.disconnects.inc(&[]);

        let reconnect = if cancelled == 0 {
            ReconnectOutcome::NotAttempted
        } else {
            match self.conn.connect().await {
                Ok(()) => ReconnectOutcome::Reconnected,
                Err(e) => {
                    tracing::warn!(error = %e, "wss reconnect failed; waits stay cancelled");
                    ReconnectOutcome::Failed(e.to_string())
                }
            }
        };

        tracing::warn!(reason = ?reason, cancelled, reconnect = ?reconnect, "wss disconnected unexpectedly");
        self.reports_tx.send_replace(Some(DisconnectReport {
            reason,
            cancelled,
            reconnect,
        }));
    }
}

/// A registered wait. Dropping it frees the tag's slot.
pub struct PendingHandle {
    operation: String,
    id: u64,
    rx: oneshot::Receiver<Resolution>,
    table: SharedTable,
    metrics: Arc<WssMetrics>,
    timeout: Duration,
}

impl PendingHandle {
    /// Wait for the envelope, the cancel signal, or the timeout; whichever is first.
    pub async fn wait(mut self) -> Result<Envelope> {
        let resolution = match tokio::time::timeout(self.timeout, &mut self.rx).await {
            Ok(res) => res,
            Err(_) => {
                if lock(&self.table).remove(&self.operation, self.id) {
                    tracing::debug!(operation = %self.operation, "wait timed out");
                    self.record("timeout");
                    return Err(WssError::Timeout);
                }
                // taken by route/cancel at the deadline; its resolution is in flight
                (&mut self.rx).await
            }
        };

        match resolution {
            Ok(Resolution::Delivered(env)) => {
                self.record("ok");
                Ok(env)
            }
            Ok(Resolution::Cancelled) | Err(_) => {
                self.record("cancelled");
                Err(WssError::OperationCancelled)
            }
        }
    }

    fn record(&self, result: &str) {
        self.metrics
            .waits
            .inc(&[("operation", &self.operation), ("result", result)]);
    }
}

impl Drop for PendingHandle {
    fn drop(&mut self) {
        lock(&self.table).remove(&self.operation, self.id);
    }
}
