//! Server configuration from environment variables
//!
//! | Variable          | Default | Meaning                                  |
//! |-------------------|---------|------------------------------------------|
//! | `PORT`            | 3000    | Listen port                              |
//! | `AI_BACKEND_URL`  | unset   | Comment writer; unset means templates    |
//! | `THRESHOLDS_PATH` | unset   | JSON file of threshold overrides         |
//! | `CACHE_TTL_SECS`  | 300     | Lifetime of cached section comments      |

use crate::thresholds::ThresholdConfig;
use anyhow::Result;
use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub port: u16,
    pub ai_backend_url: Option<String>,
    pub thresholds_path: Option<PathBuf>,
    pub cache_ttl_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: DEFAULT_PORT,
            ai_backend_url: None,
            thresholds_path: None,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = get("PORT").and_then(|p| p.parse().ok()).unwrap_or(DEFAULT_PORT);
        let cache_ttl_secs = get("CACHE_TTL_SECS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CACHE_TTL_SECS);

        ServerConfig {
            port,
            ai_backend_url: get("AI_BACKEND_URL"),
            thresholds_path: get("THRESHOLDS_PATH").map(PathBuf::from),
            cache_ttl_secs,
        }
    }

    /// Default thresholds, with the override file applied when configured
    pub fn thresholds(&self) -> Result<ThresholdConfig> {
        match &self.thresholds_path {
            Some(path) => ThresholdConfig::load(path),
            None => Ok(ThresholdConfig::default()),
        }
    }
}
