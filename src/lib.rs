//! # flyte-slack
//!
//! Slack pack for the Flyte automation bus.
//!
//! ## Overview
//!
//! The pack registers with a Flyte API, then does two jobs at once:
//!
//! - **Event relay**: messages, reactions and button clicks from Slack are
//!   enriched with user profiles and published to Flyte. Messages and
//!   reactions are only relayed from channels the pack has joined.
//! - **Command execution**: Flyte actions are polled and executed against
//!   Slack (send, broadcast, join, leave, rich messages, channel lookup,
//!   reactions and thread replies), each answered with a success or failure
//!   event.
//!
//! Joined channels survive restarts through a small JSON backup file.
//!
//! ## Example
//!
//! ```rust,ignore
//! use flyte_slack::{Config, SlackConfig};
//!
//! let config = Config::new(
//!     "http://flyte:8080",
//!     SlackConfig::new("xoxb-...", "xapp-...", "verification-token"),
//! );
//! config.validate()?;
//! ```

pub mod backup;
pub mod cache;
pub mod command;
pub mod common;
pub mod config;
pub mod error;
pub mod pack;
pub mod server;
pub mod slack;
pub mod types;

// Re-export commonly used types
pub use backup::{Backup, FileBackup};
pub use cache::ChannelCache;
pub use config::Config;
pub use error::{Error, Result};
pub use pack::{Command, CommandHandler, Event, EventDef, PackDef};
pub use slack::{ChatClient, Membership, MembershipOutcome, SlackClient, SlackConfig};
pub use types::{Conversation, RawEvent, User};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
