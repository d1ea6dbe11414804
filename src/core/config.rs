use crate::core::errors::ScanError;
use crate::scanner::FailurePolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Config file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "ledger-scanner.toml";

/// How a failed balance lookup is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailureMode {
    #[default]
    Abort,
    Retry,
    Record,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailurePolicyConfig {
    #[serde(default)]
    pub mode: FailureMode,

    /// Attempts per address in `retry` mode, including the first one
    #[serde(default = "FailurePolicyConfig::default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry; doubles on every attempt
    #[serde(default = "FailurePolicyConfig::default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl FailurePolicyConfig {
    fn default_max_attempts() -> u32 { 3 }
    fn default_retry_delay_ms() -> u64 { 500 }

    pub fn policy(&self) -> FailurePolicy {
        match self.mode {
            FailureMode::Abort => FailurePolicy::Abort,
            FailureMode::Retry => FailurePolicy::Retry {
                max_attempts: self.max_attempts,
                initial_delay: Duration::from_millis(self.retry_delay_ms),
            },
            FailureMode::Record => FailurePolicy::Record,
        }
    }
}

impl Default for FailurePolicyConfig {
    fn default() -> Self {
        Self {
            mode: FailureMode::default(),
            max_attempts: Self::default_max_attempts(),
            retry_delay_ms: Self::default_retry_delay_ms(),
        }
    }
}

/// Scanner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Ethereum JSON-RPC endpoint used for balance lookups
    #[serde(default = "ScanConfig::default_rpc_url")]
    pub rpc_url: String,

    /// Maximum number of balance requests in flight
    #[serde(default = "ScanConfig::default_batch_size")]
    pub batch_size: usize,

    /// HID read timeout (seconds)
    #[serde(default = "ScanConfig::default_device_timeout_secs")]
    pub device_timeout_secs: u64,

    #[serde(default)]
    pub failure_policy: FailurePolicyConfig,
}

impl ScanConfig {
    fn default_rpc_url() -> String { "http://localhost:8545".to_string() }
    fn default_batch_size() -> usize { 100 }
    fn default_device_timeout_secs() -> u64 { 30 }

    pub fn from_toml_str(content: &str) -> Result<Self, ScanError> {
        let config: ScanConfig =
            toml::from_str(content).map_err(|e| ScanError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the configuration.
    ///
    /// Lookup order: `explicit`, then `CONFIG_PATH`, then [`DEFAULT_CONFIG_FILE`] if it
    /// exists, then built-in defaults. An explicitly named file must exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ScanError> {
        let path = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => std::env::var("CONFIG_PATH").ok().map(PathBuf::from).or_else(|| {
                let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
                fallback.exists().then_some(fallback)
            }),
        };

        let Some(path) = path else {
            debug!("No config file found, using defaults");
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(&path).map_err(|e| {
            ScanError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ScanError> {
        if self.batch_size == 0 {
            return Err(ScanError::Config("batch_size must be at least 1".to_string()));
        }
        if self.failure_policy.max_attempts == 0 {
            return Err(ScanError::Config("failure_policy.max_attempts must be at least 1".to_string()));
        }
        reqwest::Url::parse(self.rpc_url.trim())
            .map_err(|e| ScanError::Config(format!("invalid rpc_url '{}': {}", self.rpc_url, e)))?;
        Ok(())
    }

    pub fn device_timeout(&self) -> Duration {
        Duration::from_secs(self.device_timeout_secs)
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            rpc_url: Self::default_rpc_url(),
            batch_size: Self::default_batch_size(),
            device_timeout_secs: Self::default_device_timeout_secs(),
            failure_policy: FailurePolicyConfig::default(),
        }
    }
}
