//! Feed source configuration.
//!
//! Stored as JSON on disk and loaded once at start:
//! ```json
//! {
//!   "api_key_header": "x-api-key",
//!   "policy": { "rounding": "floor", "match_mode": "exact" },
//!   "feeds": [
//!     { "id": "ace", "url": "https://example.org/gtfs-ace", "routes": ["A", "C", "E"] },
//!     { "id": "g", "url": "feeds/g.pb", "routes": ["G"] }
//!   ]
//! }
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

use crate::arrivals::types::route_key;
use crate::engine::EnginePolicy;
use crate::fetch::auth::DEFAULT_API_KEY_HEADER;

/// Environment variable holding the feed API key.
pub const API_KEY_ENV: &str = "FEED_API_KEY";

/// One independently fetched feed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedSource {
    pub id: String,
    /// `http(s)://` URL or local file path.
    pub url: String,
    /// Routes the feed carries, compared case-insensitively. Empty means any
    /// route.
    #[serde(default)]
    pub routes: Vec<String>,
}

impl FeedSource {
    pub fn carries_any(&self, routes: &HashSet<String>) -> bool {
        self.routes.is_empty() || self.routes.iter().any(|r| routes.contains(&route_key(r)))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    pub feeds: Vec<FeedSource>,
    #[serde(default = "FeedConfig::default_api_key_header")]
    pub api_key_header: String,
    #[serde(default)]
    pub policy: EnginePolicy,
}

impl FeedConfig {
    fn default_api_key_header() -> String {
        DEFAULT_API_KEY_HEADER.to_string()
    }

    /// Loads the config from a JSON file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read feed config {}", path.display()))?;
        let config: FeedConfig = serde_json::from_str(&content)
            .with_context(|| format!("malformed feed config {}", path.display()))?;
        Ok(config)
    }

    /// Feeds worth fetching for a request, given its route allow-list.
    pub fn select(&self, routes: Option<&HashSet<String>>) -> Vec<&FeedSource> {
        match routes {
            Some(routes) => self.feeds.iter().filter(|f| f.carries_any(routes)).collect(),
            None => self.feeds.iter().collect(),
        }
    }
}

/// Reads the feed API key from the environment, ignoring blank values.
pub fn api_key_from_env() -> Option<String> {
    std::env::var(API_KEY_ENV)
        .ok()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
}
