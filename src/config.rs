//! Pack configuration.
//!
//! The binary fills this from command-line flags and environment variables;
//! library users and tests can build it directly.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::slack::SlackConfig;

const DEFAULT_PACK_NAME: &str = "Slack";
const DEFAULT_RENEW_HOURS: u64 = 24;
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8090;
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 2;

/// Pack configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Flyte API base URL
    pub flyte_api: String,

    /// Pack display name
    pub pack_name: String,

    /// Slack settings
    pub slack: SlackConfig,

    /// Channel info cache settings
    pub cache: CacheConfig,

    /// Membership backup directory (`$TMPDIR/flyte-slack` when unset)
    pub backup_dir: Option<PathBuf>,

    /// Interaction webhook server
    pub server: ServerConfig,

    /// How often Flyte is polled for actions, in milliseconds
    pub poll_interval_ms: u64,

    /// Grace delay after the shutdown notification, in seconds
    pub shutdown_grace_secs: u64,
}

/// Channel info cache settings.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How often the conversation list is renewed, in hours
    pub renew_conversation_list_hours: u64,
}

/// Interaction webhook server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            renew_conversation_list_hours: DEFAULT_RENEW_HOURS,
        }
    }
}

impl CacheConfig {
    /// Renewal period; saturates instead of overflowing on huge hour counts.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.renew_conversation_list_hours.saturating_mul(3600))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl Config {
    pub fn new(flyte_api: &str, slack: SlackConfig) -> Self {
        Self {
            flyte_api: flyte_api.to_string(),
            pack_name: DEFAULT_PACK_NAME.to_string(),
            slack,
            cache: CacheConfig::default(),
            backup_dir: None,
            server: ServerConfig::default(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            shutdown_grace_secs: DEFAULT_SHUTDOWN_GRACE_SECS,
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.flyte_api.is_empty() {
            return Err(ConfigError::MissingRequired("FLYTE_API".to_string()));
        }
        if let Err(e) = reqwest::Url::parse(&self.flyte_api) {
            return Err(ConfigError::InvalidValue {
                key: "FLYTE_API".to_string(),
                reason: format!("{:?} is not valid URL: {}", self.flyte_api, e),
            });
        }
        if self.pack_name.is_empty() {
            return Err(ConfigError::MissingRequired("PACK_NAME".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "POLL_INTERVAL_MS".to_string(),
                reason: "poll interval must be positive".to_string(),
            });
        }
        self.slack.validate()
    }

    /// Interaction webhook address string.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// Backup directory with `~` expanded.
    pub fn backup_dir(&self) -> Option<PathBuf> {
        self.backup_dir.as_deref().map(expand_path)
    }
}

/// Expand tilde (~) in paths.
pub fn expand_path(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    if let Some(rest) = path_str.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slack() -> SlackConfig {
        SlackConfig::new("xoxb-token", "xapp-token", "verify")
    }

    #[test]
    fn test_default_config() {
        let config = Config::new("http://test_api:8080", slack());
        assert_eq!(config.pack_name, "Slack");
        assert_eq!(config.cache.ttl(), Duration::from_secs(24 * 3600));
        assert_eq!(config.server_addr(), "0.0.0.0:8090");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_api_url() {
        let config = Config::new("not a url", slack());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { key, .. }) if key == "FLYTE_API"
        ));
    }

    #[test]
    fn test_missing_api_url() {
        let config = Config::new("", slack());
        assert!(matches!(config.validate(), Err(ConfigError::MissingRequired(_))));
    }

    #[test]
    fn test_durations_and_defaults() {
        let config = Config::new("http://flyte:8080", slack());
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.shutdown_grace(), Duration::from_secs(2));
        assert!(config.slack.membership_gating);
        assert!(config.backup_dir.is_none());
    }

    #[test]
    fn test_huge_renew_period_saturates() {
        let cache = CacheConfig {
            renew_conversation_list_hours: u64::MAX,
        };
        assert_eq!(cache.ttl(), Duration::from_secs(u64::MAX));

        let cache = CacheConfig {
            renew_conversation_list_hours: u64::MAX / 3600 + 1,
        };
        assert_eq!(cache.ttl(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_expand_path_without_tilde() {
        assert_eq!(expand_path(Path::new("/var/lib/x")), PathBuf::from("/var/lib/x"));
    }
}
