//! In-memory socket for integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use modwss_client::config::WssConfig;
use modwss_client::transport::{Connector, Link, LinkEvent, Opened};
use modwss_core::error::{Result, WssError};

type SendHook = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Default)]
struct FakeState {
    sent: Mutex<Vec<String>>,
    inbound: Mutex<Option<mpsc::Sender<LinkEvent>>>,
    link: Mutex<Option<Arc<FakeLink>>>,
    urls: Mutex<Vec<String>>,
    opens: AtomicUsize,
    fail_open: AtomicBool,
    fail_send: AtomicBool,
    on_send: Mutex<Option<SendHook>>,
}

#[derive(Clone, Default)]
pub struct FakeConnector {
    state: Arc<FakeState>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.state.fail_open.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_send(&self, fail: bool) {
        self.state.fail_send.store(fail, Ordering::SeqCst);
    }

    /// Run `hook` with every frame, before `send_text` returns.
    pub fn on_send(&self, hook: impl Fn(&str) + Send + Sync + 'static) {
        *self.state.on_send.lock().unwrap() = Some(Arc::new(hook));
    }

    /// Answer sent frames through the inbound stream.
    pub fn reply_with(&self, responder: impl Fn(&str) -> Option<String> + Send + Sync + 'static) {
        let state = Arc::clone(&self.state);
        self.on_send(move |frame| {
            if let Some(reply) = responder(frame) {
                let tx = state.inbound.lock().unwrap().clone();
                if let Some(tx) = tx {
                    let _ = tx.try_send(LinkEvent::Frame(reply));
                }
            }
        });
    }

    pub fn sent(&self) -> Vec<String> {
        self.state.sent.lock().unwrap().clone()
    }

    pub fn opens(&self) -> usize {
        self.state.opens.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.state.urls.lock().unwrap().clone()
    }

    /// Push one inbound frame on the live socket.
    pub async fn inject(&self, frame: &str) {
        let tx = self.state.inbound.lock().unwrap().clone();
        tx.expect("no open socket")
            .send(LinkEvent::Frame(frame.to_string()))
            .await
            .expect("receive loop gone");
    }

    /// Kill the live socket from the server side.
    pub async fn drop_connection(&self, reason: &str) {
        if let Some(link) = self.state.link.lock().unwrap().take() {
            link.open.store(false, Ordering::SeqCst);
        }
        let tx = self.state.inbound.lock().unwrap().take();
        if let Some(tx) = tx {
            let _ = tx
                .send(LinkEvent::Closed {
                    reason: Some(reason.to_string()),
                })
                .await;
        }
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn open(&self, url: &str, _keep_alive: Duration) -> Result<Opened> {
        self.state.urls.lock().unwrap().push(url.to_string());
        if self.state.fail_open.load(Ordering::SeqCst) {
            return Err(WssError::ServiceNotConnected("connection refused".into()));
        }
        self.state.opens.fetch_add(1, Ordering::SeqCst);

        let (tx, rx) = mpsc::channel(64);
        let link = Arc::new(FakeLink {
            state: Arc::clone(&self.state),
            open: AtomicBool::new(true),
            events: tx.clone(),
        });
        *self.state.inbound.lock().unwrap() = Some(tx);
        *self.state.link.lock().unwrap() = Some(Arc::clone(&link));

        Ok(Opened { link, events: rx })
    }
}

pub struct FakeLink {
    state: Arc<FakeState>,
    open: AtomicBool,
    events: mpsc::Sender<LinkEvent>,
}

#[async_trait]
impl Link for FakeLink {
    async fn send_text(&self, frame: String) -> Result<()> {
        if !self.is_open() {
            return Err(WssError::ServiceNotConnected("socket closed".into()));
        }
        if self.state.fail_send.load(Ordering::SeqCst) {
            return Err(WssError::FailedToSend("broken pipe".into()));
        }
        self.state.sent.lock().unwrap().push(frame.clone());
        let hook = self.state.on_send.lock().unwrap().clone();
        if let Some(hook) = hook {
            hook(&frame);
        }
        Ok(())
    }

    async fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            let _ = self.events.try_send(LinkEvent::Closed { reason: None });
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

pub fn test_config() -> WssConfig {
    WssConfig::for_rest_endpoint("https://g-1.modapi.io/v1")
}

pub fn config_with_wait_timeout(ms: u64) -> WssConfig {
    let mut cfg = test_config();
    cfg.timing.wait_timeout_ms = ms;
    cfg
}

pub fn batch(operation: &str, context: &str) -> String {
    format!(r#"{{"messages":[{{"operation":"{operation}","context":{context}}}]}}"#)
}
