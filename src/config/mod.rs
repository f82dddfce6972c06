//! Configuration management for a konnector process.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support
//! - Environment variable overrides
//! - Section-wise validation
mod heartbeat;
mod informer;
mod retry;
pub use heartbeat::*;
pub use informer::*;
pub use retry::*;

use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

/// Prefix of environment overrides, e.g. `KONNECTOR__HEARTBEAT__INTERVAL_IN_SECS`
const ENV_PREFIX: &str = "KONNECTOR";

/// Main configuration container
///
/// Sources are merged in this order (later sources override earlier):
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables (highest priority)
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct KonnectorConfig {
    /// Startup barrier heartbeat
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    /// Shared informer behaviour
    #[serde(default)]
    pub informer: InformerConfig,
    /// Dependent controllers
    #[serde(default)]
    pub controllers: ControllersConfig,
    /// Retry policies for list/watch and status writes
    #[serde(default)]
    pub retry: RetryPolicies,
}

impl KonnectorConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// # Note
    /// Validation is deferred so further overrides can be applied with
    /// `with_override_config()`. Callers MUST call `validate()` before use.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("KONNECTOR__HEARTBEAT__INTERVAL_IN_SECS", "60");
    /// let cfg = KonnectorConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(env_source());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional configuration overrides from file without validation.
    ///
    /// Merging order (later sources override earlier):
    /// 1. Current configuration values
    /// 2. New configuration file
    /// 3. Latest environment variables (highest priority)
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates every section and returns the validated instance.
    pub fn validate(self) -> Result<Self> {
        self.heartbeat.validate()?;
        self.controllers.validate()?;
        self.retry.validate()?;
        Ok(self)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}
