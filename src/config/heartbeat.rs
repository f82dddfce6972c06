use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Heartbeat of the per-connection startup barrier
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HeartbeatConfig {
    /// Interval between two readiness evaluations. Each evaluation waits at
    /// most half of it for the informers to sync.
    #[serde(default = "default_heartbeat_interval")]
    pub interval_in_secs: u64,

    /// How often `has_synced` is polled while waiting for caches
    #[serde(default = "default_cache_sync_poll_interval")]
    pub cache_sync_poll_interval_in_ms: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_in_secs: default_heartbeat_interval(),
            cache_sync_poll_interval_in_ms: default_cache_sync_poll_interval(),
        }
    }
}

impl HeartbeatConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_in_secs)
    }

    pub fn cache_sync_poll_interval(&self) -> Duration {
        Duration::from_millis(self.cache_sync_poll_interval_in_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval_in_secs < 2 {
            return Err(Error::Config(ConfigError::Message(format!(
                "heartbeat interval {}s too small, minimum 2s",
                self.interval_in_secs
            ))));
        }

        if self.cache_sync_poll_interval_in_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "cache_sync_poll_interval_in_ms must be > 0".into(),
            )));
        }

        // Polling slower than the sync deadline would never observe a sync
        if self.cache_sync_poll_interval() >= self.interval() / 2 {
            return Err(Error::Config(ConfigError::Message(format!(
                "cache sync poll interval {}ms must be shorter than half the heartbeat interval ({}s)",
                self.cache_sync_poll_interval_in_ms, self.interval_in_secs
            ))));
        }

        Ok(())
    }
}

/// Dependent controllers started once the barrier is ready
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ControllersConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for ControllersConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

impl ControllersConfig {
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::Config(ConfigError::Message(
                "controllers.workers must be at least 1".into(),
            )));
        }
        Ok(())
    }
}

fn default_heartbeat_interval() -> u64 {
    // 5 minutes
    300
}
fn default_cache_sync_poll_interval() -> u64 {
    100
}
fn default_workers() -> usize {
    2
}
