//! Device login flow.
//!
//! State machine:
//! `AwaitingCode -> ShowingCode -> AwaitingAccessToken -> {Authenticated | Failed | Cancelled | TimedOut}`.
//! Every terminal state closes the socket; retrying is up to the caller.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use modwss_core::error::{ErrorCode, Result, WssError};
use modwss_core::protocol::{ops, AccessToken, DeviceLoginRequest, DeviceLoginResponse};

use crate::dispatch::Dispatcher;

use super::session::{CodePrompter, SessionStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    AwaitingCode,
    ShowingCode,
    AwaitingAccessToken,
    Authenticated,
    Failed,
    Cancelled,
    TimedOut,
}

impl AuthState {
    /// Terminal state for a failed attempt.
    pub fn from_error(e: &WssError) -> Self {
        match e {
            WssError::OperationCancelled => AuthState::Cancelled,
            WssError::Timeout => AuthState::TimedOut,
            _ => AuthState::Failed,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AuthState::Authenticated | AuthState::Failed | AuthState::Cancelled | AuthState::TimedOut
        )
    }
}

/// The handful of outcomes a login screen needs to tell apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    Cancelled,
    TimedOut,
    Protocol,
    NetworkUnreachable,
    Other,
}

impl From<&WssError> for AuthFailure {
    fn from(e: &WssError) -> Self {
        match e.code() {
            ErrorCode::OperationCancelled => AuthFailure::Cancelled,
            ErrorCode::Timeout => AuthFailure::TimedOut,
            ErrorCode::UnexpectedMessageShape => AuthFailure::Protocol,
            ErrorCode::ServiceNotConnected | ErrorCode::FailedToSend => {
                AuthFailure::NetworkUnreachable
            }
            ErrorCode::Config | ErrorCode::Unknown => AuthFailure::Other,
        }
    }
}

/// Cancels one login attempt: only its access-token wait, nothing else.
#[derive(Debug, Clone)]
pub struct AuthCanceller {
    tx: Arc<watch::Sender<bool>>,
}

impl AuthCanceller {
    fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { tx: Arc::new(tx) }, rx)
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Handed back once the code is known; the rest completes in the background.
pub struct DeviceLoginToken {
    pub code: String,
    pub login_url: String,
    pub auto_login_url: String,
    /// Unix seconds after which the code is void.
    pub expires_at: i64,
    outcome: JoinHandle<Result<()>>,
    canceller: AuthCanceller,
    state: watch::Receiver<AuthState>,
}

impl std::fmt::Debug for DeviceLoginToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceLoginToken")
            .field("code", &self.code)
            .field("login_url", &self.login_url)
            .field("expires_at", &self.expires_at)
            .field("state", &*self.state.borrow())
            .finish()
    }
}

impl DeviceLoginToken {
    pub fn canceller(&self) -> AuthCanceller {
        self.canceller.clone()
    }

    pub fn cancel(&self) {
        self.canceller.cancel();
    }

    pub fn state(&self) -> watch::Receiver<AuthState> {
        self.state.clone()
    }

    /// Resolves once the access token is applied, or with the failure.
    pub async fn outcome(self) -> Result<()> {
        self.outcome
            .await
            .map_err(|e| WssError::Unknown(format!("device login task failed: {e}")))?
    }
}

pub struct DeviceLogin {
    dispatcher: Arc<Dispatcher>,
    session: Arc<dyn SessionStore>,
    prompter: Option<Arc<dyn CodePrompter>>,
}

impl DeviceLogin {
    pub fn new(dispatcher: Arc<Dispatcher>, session: Arc<dyn SessionStore>) -> Self {
        Self {
            dispatcher,
            session,
            prompter: None,
        }
    }

    #[must_use]
    pub fn with_prompter(mut self, prompter: Arc<dyn CodePrompter>) -> Self {
        self.prompter = Some(prompter);
        self
    }

    /// Ask the server for a code and start waiting for the access token.
    ///
    /// Returns as soon as the code is known. A failure here has already
    /// closed the socket.
    pub async fn begin(&self) -> Result<DeviceLoginToken> {
        let (state_tx, state_rx) = watch::channel(AuthState::AwaitingCode);

        let request = DeviceLoginRequest {
            game_id: self.dispatcher.config().server.game_id.clone(),
        };
        let resp: DeviceLoginResponse = match self.dispatcher.request(&request).await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(error = %e, "device login request failed");
                self.dispatcher.disconnect().await;
                state_tx.send_replace(AuthState::from_error(&e));
                return Err(e);
            }
        };

        tracing::info!(code = %resp.code, expires_at = resp.date_expires, "device login code received");
        state_tx.send_replace(AuthState::ShowingCode);

        let (canceller, cancel_rx) = AuthCanceller::new();
        if let Some(prompter) = &self.prompter {
            prompter.show_code(&resp.code, canceller.clone());
        }

        let outcome = tokio::spawn(await_access_token(
            Arc::clone(&self.dispatcher),
            Arc::clone(&self.session),
            self.prompter.clone(),
            state_tx,
            cancel_rx,
        ));

        Ok(DeviceLoginToken {
            code: resp.code,
            login_url: resp.login_url,
            auto_login_url: resp.auto_login_url,
            expires_at: resp.date_expires,
            outcome,
            canceller,
            state: state_rx,
        })
    }
}

async fn await_access_token(
    dispatcher: Arc<Dispatcher>,
    session: Arc<dyn SessionStore>,
    prompter: Option<Arc<dyn CodePrompter>>,
    state_tx: watch::Sender<AuthState>,
    cancel_rx: watch::Receiver<bool>,
) -> Result<()> {
    state_tx.send_replace(AuthState::AwaitingAccessToken);

    // Dropping the losing branch drops its pending wait, so a cancel only
    // ever frees this attempt's access-token slot.
    let result = tokio::select! {
        res = receive_token(&dispatcher, session.as_ref()) => res,
        _ = cancelled(cancel_rx) => Err(WssError::OperationCancelled),
    };

    if let Some(prompter) = &prompter {
        prompter.hide_code();
    }
    dispatcher.disconnect().await;

    match &result {
        Ok(()) => {
            tracing::info!("device login completed");
            state_tx.send_replace(AuthState::Authenticated);
        }
        Err(e) if e.is_wait_failure() => {
            tracing::info!(code = e.code().as_str(), "device login ended without a token");
            state_tx.send_replace(AuthState::from_error(e));
        }
        Err(e) => {
            tracing::warn!(error = %e, code = e.code().as_str(), "device login failed");
            state_tx.send_replace(AuthState::from_error(e));
        }
    }
    result
}

async fn receive_token(dispatcher: &Dispatcher, session: &dyn SessionStore) -> Result<()> {
    let env = dispatcher.wait_for(ops::ACCESS_TOKEN, true).await?;
    let token: AccessToken = env.decode_as()?;

    session
        .apply_token(&token.access_token, token.date_expires)
        .await?;
    if let Err(e) = session.refresh_current_user_silently().await {
        tracing::warn!(error = %e, "profile refresh after login failed");
    }
    Ok(())
}

async fn cancelled(mut rx: watch::Receiver<bool>) {
    let closed = rx.wait_for(|c| *c).await.is_err();
    if closed {
        // every canceller dropped: this attempt can no longer be cancelled
        std::future::pending::<()>().await;
    }
}
