use std::path::Path;
use std::time::Duration;

use pagesift_core::{FetchOptions, DEFAULT_USER_AGENT};
use serde::Deserialize;

use crate::paths::pagesift_config_path;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PagesiftConfig {
    pub fetch: FetchConfig,
}

impl PagesiftConfig {
    pub fn load() -> Result<Self, String> {
        let path = pagesift_config_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|e| format!("read config.toml: {e}"))?;
        toml::from_str(&raw).map_err(|e| format!("parse config.toml: {e}"))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Overall deadline per page, in seconds.
    pub timeout_seconds: i64,
    /// Output character cap; 0 or below means unlimited.
    pub max_chars: i64,
    pub dial_timeout_seconds: u64,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 20,
            max_chars: 20_000,
            dial_timeout_seconds: 15,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl FetchConfig {
    pub fn options(&self) -> FetchOptions {
        let defaults = FetchOptions::default();
        let user_agent = if self.user_agent.trim().is_empty() {
            defaults.user_agent.clone()
        } else {
            self.user_agent.trim().to_string()
        };
        FetchOptions {
            dial_timeout: Duration::from_secs(self.dial_timeout_seconds.max(1)),
            user_agent,
            ..defaults
        }
    }
}
