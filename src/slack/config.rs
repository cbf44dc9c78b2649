//! Slack connector configuration.

use crate::error::ConfigError;

/// Configuration for the Slack side of the pack.
#[derive(Debug, Clone)]
pub struct SlackConfig {
    /// Bot OAuth token (xoxb-...).
    pub bot_token: String,

    /// App-level token for Socket Mode (xapp-...).
    pub app_token: String,

    /// Token interaction callbacks must carry.
    pub verification_token: String,

    /// Only relay messages and reactions from joined channels.
    pub membership_gating: bool,

    /// Posted to a channel right after joining it.
    pub welcome_message: String,

    /// Posted to a channel right before leaving it.
    pub farewell_message: String,

    /// Posted to every joined channel when the pack shuts down.
    pub shutdown_message: String,
}

const WELCOME_MESSAGE: &str = "Hello! I have joined this channel and will relay its messages to Flyte.";
const FAREWELL_MESSAGE: &str = "Goodbye! I am leaving this channel.";
const SHUTDOWN_MESSAGE: &str = "I am shutting down and will be back shortly.";

impl SlackConfig {
    pub fn new(bot_token: &str, app_token: &str, verification_token: &str) -> Self {
        Self {
            bot_token: bot_token.to_string(),
            app_token: app_token.to_string(),
            verification_token: verification_token.to_string(),
            membership_gating: true,
            welcome_message: WELCOME_MESSAGE.to_string(),
            farewell_message: FAREWELL_MESSAGE.to_string(),
            shutdown_message: SHUTDOWN_MESSAGE.to_string(),
        }
    }

    /// Relay events from every channel, joined or not.
    pub fn with_membership_gating(mut self, enabled: bool) -> Self {
        self.membership_gating = enabled;
        self
    }

    pub fn with_welcome_message(mut self, message: &str) -> Self {
        self.welcome_message = message.to_string();
        self
    }

    pub fn with_farewell_message(mut self, message: &str) -> Self {
        self.farewell_message = message.to_string();
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bot_token.is_empty() {
            return Err(ConfigError::MissingRequired("FLYTE_SLACK_TOKEN".to_string()));
        }
        if self.app_token.is_empty() {
            return Err(ConfigError::MissingRequired("FLYTE_SLACK_APP_TOKEN".to_string()));
        }
        if !self.app_token.starts_with("xapp-") {
            return Err(ConfigError::InvalidValue {
                key: "FLYTE_SLACK_APP_TOKEN".to_string(),
                reason: "Socket Mode app token should start with xapp-".to_string(),
            });
        }
        if self.verification_token.is_empty() {
            return Err(ConfigError::MissingRequired("SLACK_VERIFICATION_TOKEN".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        assert!(SlackConfig::new("xoxb-test", "xapp-test", "v").validate().is_ok());
        assert!(SlackConfig::new("", "xapp-test", "v").validate().is_err());
        assert!(SlackConfig::new("xoxb-test", "xoxb-wrong", "v").validate().is_err());
        assert!(SlackConfig::new("xoxb-test", "xapp-test", "").validate().is_err());
    }

    #[test]
    fn test_config_builder() {
        let config = SlackConfig::new("xoxb-token", "xapp-token", "verify")
            .with_membership_gating(false)
            .with_welcome_message("hi")
            .with_farewell_message("bye");

        assert!(!config.membership_gating);
        assert_eq!(config.welcome_message, "hi");
        assert_eq!(config.farewell_message, "bye");
    }
}
