//! Client config loader (strict parsing).

pub mod schema;

use std::fs;

use modwss_core::error::{Result, WssError};

pub use schema::{ServerSection, TimingSection, WssConfig};

pub fn load_from_file(path: &str) -> Result<WssConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| WssError::Config(format!("read config failed ({path}): {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<WssConfig> {
    let cfg: WssConfig =
        serde_yaml::from_str(s).map_err(|e| WssError::Config(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
