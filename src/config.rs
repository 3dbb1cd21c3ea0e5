//! Service configuration.
//!
//! Every field has a default, so an empty file is a valid configuration.
//! With the `server` feature the configuration can be read from TOML:
//!
//! ```toml
//! listen = "0.0.0.0:7878"
//! default_shards = 8
//! refresh_retry_ms = 100
//!
//! [shards]
//! cats = 16
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::counter::DEFAULT_SHARDS;
use crate::error::{Error, Result};

/// Default address the TCP front-end binds to.
pub const DEFAULT_LISTEN: &str = "127.0.0.1:7878";

/// Configuration for a [`VoteService`](crate::VoteService) and its front-end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Address the TCP front-end listens on.
    pub listen: String,
    /// Shards per counter unless overridden in `shards`.
    pub default_shards: usize,
    /// Per-counter shard counts, keyed by counter name (`cats`, `dogs`, ...).
    ///
    /// A counter keeps the shard count it was created with; changing this
    /// for a running store needs a migration and is rejected at startup.
    pub shards: BTreeMap<String, usize>,
    /// Delay before retrying a failed live refresh, in milliseconds.
    pub refresh_retry_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            default_shards: DEFAULT_SHARDS,
            shards: BTreeMap::new(),
            refresh_retry_ms: 100,
        }
    }
}

impl ServiceConfig {
    /// Shard count for the counter named `counter`.
    pub fn shards_for(&self, counter: &str) -> usize {
        self.shards
            .get(counter)
            .copied()
            .unwrap_or(self.default_shards)
    }

    /// Delay before retrying a failed live refresh.
    pub fn refresh_retry(&self) -> Duration {
        Duration::from_millis(self.refresh_retry_ms)
    }

    /// Checks that every shard count is at least 1.
    pub fn validate(&self) -> Result<()> {
        if self.default_shards == 0 {
            return Err(Error::Config("default_shards must be at least 1".into()));
        }
        if let Some((name, _)) = self.shards.iter().find(|(_, &n)| n == 0) {
            return Err(Error::Config(format!(
                "shards.{name} must be at least 1"
            )));
        }
        Ok(())
    }

    /// Parses and validates a TOML document.
    #[cfg(feature = "server")]
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    #[cfg(feature = "server")]
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml(&text)
    }
}
