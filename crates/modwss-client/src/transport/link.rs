//! Socket seam: what the connection manager needs from a duplex socket.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use modwss_core::error::Result;

/// Inbound traffic from an open socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// One text frame (a serialized batch).
    Frame(String),
    /// The socket is gone. Sent once, last.
    Closed { reason: Option<String> },
}

/// A freshly opened socket: the write side plus its inbound event stream.
pub struct Opened {
    pub link: Arc<dyn Link>,
    pub events: mpsc::Receiver<LinkEvent>,
}

/// Opens sockets.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, url: &str, keep_alive: Duration) -> Result<Opened>;
}

/// Write side of one open socket.
#[async_trait]
pub trait Link: Send + Sync {
    /// Write one text frame.
    async fn send_text(&self, frame: String) -> Result<()>;
    /// Orderly close. Idempotent.
    async fn close(&self);
    fn is_open(&self) -> bool;
}
