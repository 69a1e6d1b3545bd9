//! modwss device-login demo.
//!
//! - Loads `modwss.yaml` (or the file named by `MODWSS_CONFIG`)
//! - Requests a device code and prints it with the login URL
//! - Waits for the access token; Ctrl+C cancels the attempt

use std::sync::Arc;

use tracing_subscriber::{fmt, EnvFilter};

use modwss_client::auth::{AuthCanceller, CodePrompter, DeviceLogin, InMemorySession};
use modwss_client::{config, Dispatcher};

struct StdoutPrompter;

impl CodePrompter for StdoutPrompter {
    fn show_code(&self, code: &str, _on_cancel: AuthCanceller) {
        println!("Enter this code to sign in: {code}");
    }

    fn hide_code(&self) {
        println!("Code no longer needed.");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::var("MODWSS_CONFIG").unwrap_or_else(|_| "modwss.yaml".to_string());
    let cfg = config::load_from_file(&path)?;
    tracing::info!(%path, url = %cfg.wss_url()?, "modwss-client starting");

    let dispatcher = Dispatcher::over_websocket(cfg);
    let mut conn_state = dispatcher.subscribe_connection_state();
    tokio::spawn(async move {
        while conn_state.changed().await.is_ok() {
            let state = *conn_state.borrow_and_update();
            tracing::debug!(?state, "connection state");
        }
    });
    let session = Arc::new(InMemorySession::new());
    let login = DeviceLogin::new(Arc::clone(&dispatcher), session.clone())
        .with_prompter(Arc::new(StdoutPrompter));

    let token = login.begin().await?;
    println!("Open {} (or {})", token.login_url, token.auto_login_url);

    let canceller = token.canceller();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            canceller.cancel();
        }
    });

    let outcome = token.outcome().await;
    ctrl_c.abort();
    dispatcher.shutdown().await;

    match outcome {
        Ok(()) => {
            if let Some((_, expires_at)) = session.token() {
                println!("Signed in; token valid until {expires_at}");
            }
            Ok(())
        }
        Err(e) => {
            tracing::warn!(code = e.code().as_str(), error = %e, "device login failed");
            Err(e.into())
        }
    }
}
