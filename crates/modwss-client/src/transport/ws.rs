//! WebSocket connector (tokio-tungstenite).
//!
//! Responsibilities:
//! - Open the socket within the connect timeout
//! - One I/O task per socket: outbound writes, inbound reads, keep-alive ping
//! - Report every write result back to the caller and the close reason once

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use modwss_core::error::{Result, WssError};

use super::codec::{decode, Inbound};
use super::link::{Connector, Link, LinkEvent, Opened};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const OUTBOUND_CAPACITY: usize = 64;
const EVENT_CAPACITY: usize = 256;

/// Production connector.
#[derive(Debug, Clone)]
pub struct TungsteniteConnector {
    connect_timeout: Duration,
}

impl TungsteniteConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn open(&self, url: &str, keep_alive: Duration) -> Result<Opened> {
        let (socket, _resp) = tokio::time::timeout(self.connect_timeout, connect_async(url))
            .await
            .map_err(|_| WssError::ServiceNotConnected(format!("connect to {url} timed out")))?
            .map_err(|e| WssError::ServiceNotConnected(format!("connect to {url} failed: {e}")))?;

        let (out_tx, out_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(EVENT_CAPACITY);
        let open = Arc::new(AtomicBool::new(true));

        tokio::spawn(run_socket(
            socket,
            out_rx,
            event_tx,
            keep_alive,
            Arc::clone(&open),
        ));

        Ok(Opened {
            link: Arc::new(WsLink { out_tx, open }),
            events: event_rx,
        })
    }
}

enum Outbound {
    Frame {
        text: String,
        ack: oneshot::Sender<Result<()>>,
    },
    Close,
}

struct WsLink {
    out_tx: mpsc::Sender<Outbound>,
    open: Arc<AtomicBool>,
}

#[async_trait]
impl Link for WsLink {
    async fn send_text(&self, frame: String) -> Result<()> {
        if !self.is_open() {
            return Err(WssError::ServiceNotConnected("socket closed".into()));
        }
        let (ack, done) = oneshot::channel();
        self.out_tx
            .send(Outbound::Frame { text: frame, ack })
            .await
            .map_err(|_| WssError::ServiceNotConnected("socket task gone".into()))?;
        done.await
            .map_err(|_| WssError::FailedToSend("socket closed before write".into()))?
    }

    async fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            let _ = self.out_tx.send(Outbound::Close).await;
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

async fn run_socket(
    socket: Socket,
    mut out_rx: mpsc::Receiver<Outbound>,
    event_tx: mpsc::Sender<LinkEvent>,
    keep_alive: Duration,
    open: Arc<AtomicBool>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let mut ping_tick = tokio::time::interval_at(Instant::now() + keep_alive, keep_alive);
    ping_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let reason = loop {
        tokio::select! {
            // outbound writer
            maybe_out = out_rx.recv() => {
                match maybe_out {
                    Some(Outbound::Frame { text, ack }) => {
                        let res = ws_tx
                            .send(Message::Text(text))
                            .await
                            .map_err(|e| WssError::FailedToSend(e.to_string()));
                        let failed = res.as_ref().err().map(ToString::to_string);
                        let _ = ack.send(res);
                        if let Some(e) = failed {
                            break Some(e);
                        }
                    }
                    Some(Outbound::Close) | None => {
                        let _ = ws_tx.send(Message::Close(None)).await;
                        let _ = ws_tx.close().await;
                        break None;
                    }
                }
            }

            // inbound reader
            incoming = ws_rx.next() => {
                let Some(incoming) = incoming else { break Some("stream ended".to_string()); };
                let msg = match incoming {
                    Ok(msg) => msg,
                    Err(e) => break Some(e.to_string()),
                };
                match decode(msg) {
                    Inbound::Frame(text) => {
                        if event_tx.send(LinkEvent::Frame(text)).await.is_err() {
                            break None;
                        }
                    }
                    Inbound::Control => {}
                    Inbound::Undecodable(len) => {
                        tracing::warn!(len, "dropping non-utf8 binary frame");
                    }
                    Inbound::Close(reason) => break reason.or_else(|| Some("closed by server".into())),
                }
            }

            // keep-alive
            _ = ping_tick.tick() => {
                if let Err(e) = ws_tx.send(Message::Ping(Vec::new())).await {
                    break Some(format!("keep-alive failed: {e}"));
                }
            }
        }
    };

    open.store(false, Ordering::Release);
    tracing::debug!(reason = ?reason, "socket task finished");
    let _ = event_tx.send(LinkEvent::Closed { reason }).await;
}
