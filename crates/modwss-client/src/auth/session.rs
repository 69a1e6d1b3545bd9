//! Collaborators the device-login flow talks to.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use modwss_core::error::Result;

use super::device_login::AuthCanceller;

/// User/session store owned by the host game.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist the access token for the active user.
    async fn apply_token(&self, token: &str, expires_at: i64) -> Result<()>;

    /// Re-fetch the authenticated user's profile in the background.
    async fn refresh_current_user_silently(&self) -> Result<()>;
}

/// UI that shows the code to the player.
pub trait CodePrompter: Send + Sync {
    fn show_code(&self, code: &str, on_cancel: AuthCanceller);
    fn hide_code(&self);
}

/// Session store that keeps the token in memory. Used by the demo binary.
#[derive(Debug, Default)]
pub struct InMemorySession {
    token: Mutex<Option<(String, i64)>>,
    refreshes: AtomicU64,
}

impl InMemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> Option<(String, i64)> {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl SessionStore for InMemorySession {
    async fn apply_token(&self, token: &str, expires_at: i64) -> Result<()> {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) =
            Some((token.to_string(), expires_at));
        Ok(())
    }

    async fn refresh_current_user_silently(&self) -> Result<()> {
        self.refreshes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
