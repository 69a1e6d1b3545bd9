//! Connection manager: exactly one physical socket and its lifecycle.
//!
//! - `connect` builds the URL from config and opens through the `Connector`
//! - one receive loop per socket forwards frames to the observer in order
//! - every socket gets a generation; events from a socket the caller closed
//!   (or that was replaced) are ignored, so only a socket dying on its own is
//!   reported through `on_unexpected_disconnect`

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use modwss_core::error::{Result, WssError};

use crate::config::WssConfig;

use super::link::{Connector, Link, LinkEvent};

/// Socket lifecycle as seen by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    ShuttingDown,
}

/// Receives what the socket produces. Implemented by the dispatcher.
#[async_trait]
pub trait ConnectionObserver: Send + Sync {
    /// One inbound text frame. Called from the receive loop, in arrival order.
    fn on_frame(&self, frame: &str);

    /// The socket died without the caller asking for it.
    async fn on_unexpected_disconnect(&self, reason: Option<String>);
}

#[derive(Default)]
struct Slot {
    link: Option<Arc<dyn Link>>,
    generation: u64,
}

struct Shared {
    slot: Mutex<Slot>,
    state_tx: watch::Sender<ConnectionState>,
}

impl Shared {
    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }

    fn is_current(&self, generation: u64) -> bool {
        self.slot().generation == generation
    }

    /// Drop the socket of `generation` if it is still the live one.
    fn retire(&self, generation: u64) -> bool {
        let mut slot = self.slot();
        if slot.generation != generation || slot.link.is_none() {
            return false;
        }
        slot.link = None;
        slot.generation += 1;
        self.set_state(ConnectionState::Disconnected);
        true
    }
}

pub struct ConnectionManager {
    cfg: Arc<WssConfig>,
    connector: Arc<dyn Connector>,
    observer: Weak<dyn ConnectionObserver>,
    shared: Arc<Shared>,
    // serializes connect/disconnect
    lifecycle: tokio::sync::Mutex<()>,
}

impl ConnectionManager {
    pub fn new(
        cfg: Arc<WssConfig>,
        connector: Arc<dyn Connector>,
        observer: Weak<dyn ConnectionObserver>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            cfg,
            connector,
            observer,
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot::default()),
                state_tx,
            }),
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    /// Open the socket unless one is already open.
    pub async fn connect(&self) -> Result<()> {
        let _guard = self.lifecycle.lock().await;
        if self.is_connected() {
            return Ok(());
        }

        let url = self.cfg.wss_url()?;
        self.shared.set_state(ConnectionState::Connecting);

        let opened = match self
            .connector
            .open(&url, self.cfg.timing.keep_alive())
            .await
        {
            Ok(opened) => opened,
            Err(e) => {
                self.shared.set_state(ConnectionState::Disconnected);
                tracing::warn!(%url, error = %e, "wss connect failed");
                return Err(match e {
                    WssError::ServiceNotConnected(_) => e,
                    other => WssError::ServiceNotConnected(other.to_string()),
                });
            }
        };

        let generation = {
            let mut slot = self.shared.slot();
            if let Some(stale) = slot.link.take() {
                // replaced below; its loop sees a newer generation and exits
                tokio::spawn(async move { stale.close().await });
            }
            slot.generation += 1;
            slot.link = Some(opened.link);
            slot.generation
        };
        self.shared.set_state(ConnectionState::Connected);

        tokio::spawn(receive_loop(
            Arc::clone(&self.shared),
            self.observer.clone(),
            generation,
            opened.events,
        ));

        tracing::info!(%url, generation, "wss connected");
        Ok(())
    }

    /// True only while the socket reports itself open.
    pub fn is_connected(&self) -> bool {
        let slot = self.shared.slot();
        *self.shared.state_tx.borrow() == ConnectionState::Connected
            && slot.link.as_ref().is_some_and(|l| l.is_open())
    }

    /// Orderly close. A no-op when already disconnected.
    pub async fn disconnect(&self) {
        let _guard = self.lifecycle.lock().await;
        let link = {
            let mut slot = self.shared.slot();
            slot.generation += 1;
            slot.link.take()
        };
        let Some(link) = link else {
            self.shared.set_state(ConnectionState::Disconnected);
            return;
        };

        self.shared.set_state(ConnectionState::ShuttingDown);
        link.close().await;
        self.shared.set_state(ConnectionState::Disconnected);
        tracing::info!("wss disconnected");
    }

    /// Write side of the live socket, if any.
    pub fn link(&self) -> Option<Arc<dyn Link>> {
        self.shared.slot().link.clone()
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state_tx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }
}

async fn receive_loop(
    shared: Arc<Shared>,
    observer: Weak<dyn ConnectionObserver>,
    generation: u64,
    mut events: mpsc::Receiver<LinkEvent>,
) {
    let mut reason = None;
    while let Some(event) = events.recv().await {
        match event {
            LinkEvent::Frame(frame) => {
                if !shared.is_current(generation) {
                    return;
                }
                let Some(observer) = observer.upgrade() else { return; };
                observer.on_frame(&frame);
            }
            LinkEvent::Closed { reason: r } => {
                reason = r;
                break;
            }
        }
    }

    if !shared.retire(generation) {
        return;
    }
    tracing::warn!(generation, reason = ?reason, "wss connection lost");
    if let Some(observer) = observer.upgrade() {
        observer.on_unexpected_disconnect(reason).await;
    }
}
