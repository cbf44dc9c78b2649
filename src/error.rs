//! Error types for flyte-slack.
//!
//! Every concern gets its own enum; [`Error`] collects them for callers that
//! only need to propagate.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for flyte-slack operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Slack platform errors
    #[error("Slack error: {0}")]
    Slack(#[from] SlackError),

    /// Flyte pack errors
    #[error("Pack error: {0}")]
    Pack(#[from] PackError),

    /// Channel cache errors
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Membership backup errors
    #[error("Backup error: {0}")]
    Backup(#[from] BackupError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for flyte-slack.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the Slack Web API or the realtime connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SlackError {
    #[error("request to {method} failed: {reason}")]
    Request { method: String, reason: String },

    #[error("{method} returned error: {error}")]
    Api { method: String, error: String },

    #[error("cannot decode {method} response: {reason}")]
    Decode { method: String, reason: String },

    #[error("rate limited, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("{0}")]
    NotFound(String),
}

impl SlackError {
    /// Whether reconnecting or re-requesting may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SlackError::Request { .. } | SlackError::RateLimited { .. } | SlackError::ConnectionFailed(_)
        )
    }
}

/// Errors from the channel info cache.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("can't find channel with such name")]
    NoSuchChannel,
}

/// Errors from the membership backup file.
#[derive(Error, Debug)]
pub enum BackupError {
    #[error("cannot create backup dir={path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot create backup file={path}: {source}")]
    CreateFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot read channels from backup file={path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot save channels to file={path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot unmarshal channels from backup file={path} content={content}: {source}")]
    Parse {
        path: PathBuf,
        content: String,
        source: serde_json::Error,
    },
}

/// Errors talking to the Flyte API.
#[derive(Error, Debug)]
pub enum PackError {
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("unexpected status {status} from {url}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("pack registration response has no '{0}' link")]
    MissingLink(&'static str),

    #[error("pack is not registered")]
    NotRegistered,

    #[error("cannot decode response from {url}: {reason}")]
    Decode { url: String, reason: String },
}

impl PackError {
    /// Connection failures and server-side errors are worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            PackError::Request { .. } => true,
            PackError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Errors related to configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid config value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Missing required config: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_error_message() {
        assert_eq!(
            CacheError::NoSuchChannel.to_string(),
            "can't find channel with such name"
        );
    }

    #[test]
    fn test_transient_errors() {
        assert!(SlackError::RateLimited { retry_after: 1 }.is_transient());
        assert!(SlackError::ConnectionFailed("reset".into()).is_transient());
        assert!(!SlackError::Api {
            method: "conversations.join".into(),
            error: "channel_not_found".into()
        }
        .is_transient());
    }

    #[test]
    fn test_error_conversion() {
        let err: Error = CacheError::NoSuchChannel.into();
        assert!(matches!(err, Error::Cache(_)));
        assert_eq!(err.to_string(), "Cache error: can't find channel with such name");
    }
}
