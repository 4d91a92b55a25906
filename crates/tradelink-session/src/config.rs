/*
[INPUT]:  YAML configuration file (optional)
[OUTPUT]: Parsed session configuration with defaults
[POS]:    Configuration layer - backend, timers and storage settings
[UPDATE]: When adding new configuration options
*/

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::http::{ClientConfig, DEFAULT_API_BASE_URL, Result, SessionError};

/// Telegram id attributed to link-token sessions that carry no identity hint
pub const DEFAULT_FALLBACK_TELEGRAM_ID: i64 = 0;

/// Settings for the session facade and its HTTP client
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Base URL of the auth backend
    pub api_base_url: String,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Proactive refresh cadence
    pub refresh_interval_secs: u64,
    /// Directory holding the persisted session entries
    pub storage_dir: PathBuf,
    pub fallback_telegram_id: i64,
    /// Referral id forwarded on wallet token creation
    pub ref_id: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout_secs: 30,
            connect_timeout_secs: 10,
            refresh_interval_secs: 9 * 60,
            storage_dir: PathBuf::from(".tradelink-config").join("session"),
            fallback_telegram_id: DEFAULT_FALLBACK_TELEGRAM_ID,
            ref_id: None,
        }
    }
}

impl SessionConfig {
    /// Load configuration from YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| SessionError::Config(format!("Invalid session config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.refresh_interval_secs == 0 {
            return Err(SessionError::Config(
                "refresh_interval_secs must be greater than zero".to_string(),
            ));
        }
        url::Url::parse(&self.api_base_url)?;
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            timeout: Duration::from_secs(self.timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
        }
    }
}
