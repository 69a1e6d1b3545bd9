//! Config schema: server endpoints and timing, validated after parsing.

use std::time::Duration;

use serde::Deserialize;
use modwss_core::error::{Result, WssError};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WssConfig {
    pub version: u32,

    pub server: ServerSection,

    #[serde(default)]
    pub timing: TimingSection,
}

impl WssConfig {
    /// Config for a REST endpoint with default timings.
    pub fn for_rest_endpoint(rest_endpoint: impl Into<String>) -> Self {
        Self {
            version: 1,
            server: ServerSection {
                rest_endpoint: rest_endpoint.into(),
                wss_endpoint: None,
                game_id: None,
            },
            timing: TimingSection::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(WssError::Config(format!(
                "unsupported config version {}",
                self.version
            )));
        }

        self.server.validate()?;
        self.timing.validate()?;

        Ok(())
    }

    /// Socket URL: the explicit override, or one derived from the REST host.
    pub fn wss_url(&self) -> Result<String> {
        match self.server.wss_endpoint.as_deref() {
            Some(url) => Ok(url.to_string()),
            None => derive_wss_url(&self.server.rest_endpoint),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    pub rest_endpoint: String,

    #[serde(default)]
    pub wss_endpoint: Option<String>,

    #[serde(default)]
    pub game_id: Option<String>,
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        match self.wss_endpoint.as_deref() {
            Some(url) if !(url.starts_with("wss://") || url.starts_with("ws://")) => {
                Err(WssError::Config(
                    "server.wss_endpoint must start with wss:// or ws://".into(),
                ))
            }
            Some(_) => Ok(()),
            // Without an override the REST host has to be derivable.
            None => derive_wss_url(&self.rest_endpoint).map(|_| ()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimingSection {
    #[serde(default = "default_keep_alive_ms")]
    pub keep_alive_ms: u64,

    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for TimingSection {
    fn default() -> Self {
        Self {
            keep_alive_ms: default_keep_alive_ms(),
            wait_timeout_ms: default_wait_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl TimingSection {
    pub fn validate(&self) -> Result<()> {
        if !(1000..=300_000).contains(&self.keep_alive_ms) {
            return Err(WssError::Config(
                "timing.keep_alive_ms must be between 1000 and 300000".into(),
            ));
        }
        if !(1..=3_600_000).contains(&self.wait_timeout_ms) {
            return Err(WssError::Config(
                "timing.wait_timeout_ms must be between 1 and 3600000".into(),
            ));
        }
        if !(100..=120_000).contains(&self.connect_timeout_ms) {
            return Err(WssError::Config(
                "timing.connect_timeout_ms must be between 100 and 120000".into(),
            ));
        }
        Ok(())
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_millis(self.keep_alive_ms)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

fn default_keep_alive_ms() -> u64 {
    30_000
}
// 15 minutes: how long a user gets to type the code on another device.
fn default_wait_timeout_ms() -> u64 {
    15 * 60 * 1000
}
fn default_connect_timeout_ms() -> u64 {
    10_000
}

/// `https://{game}.{domain}.io[/path]` -> `wss://{game}.ws.{domain}.io/`.
pub fn derive_wss_url(rest_endpoint: &str) -> Result<String> {
    let mismatch = || {
        WssError::Config(format!(
            "cannot derive wss endpoint from {rest_endpoint}; set server.wss_endpoint"
        ))
    };

    let rest = rest_endpoint.strip_prefix("https://").ok_or_else(mismatch)?;
    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let (game, domain) = host.split_once('.').ok_or_else(mismatch)?;
    let domain_name = domain.strip_suffix(".io").ok_or_else(mismatch)?;

    let valid_label = |s: &str| {
        !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    };
    if !valid_label(game) || !valid_label(domain_name) {
        return Err(mismatch());
    }

    Ok(format!("wss://{game}.ws.{domain_name}.io/"))
}
