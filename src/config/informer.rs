use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct InformerConfig {
    /// Full resync period; every stored item is redelivered as an update.
    /// 0 disables resync.
    #[serde(default = "default_resync_period")]
    pub resync_period_in_secs: u64,
}

impl Default for InformerConfig {
    fn default() -> Self {
        Self {
            resync_period_in_secs: default_resync_period(),
        }
    }
}

impl InformerConfig {
    pub fn resync_period(&self) -> Option<Duration> {
        match self.resync_period_in_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

fn default_resync_period() -> u64 {
    // 30 minutes
    1800
}
