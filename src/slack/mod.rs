//! Slack side of the pack.
//!
//! Web API access, the Socket Mode event feed, the membership store, the
//! event router and the [`ChatClient`] capability commands run against.

pub mod api;
pub mod client;
pub mod config;
pub mod interaction;
pub mod membership;
pub mod rich_message;
pub mod router;
pub mod socket;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{SlackApi, WebApiClient};
pub use client::{ChatClient, ConversationSource, SlackClient};
pub use config::SlackConfig;
pub use interaction::InteractionCallback;
pub use membership::{Membership, MembershipOutcome};
pub use rich_message::RichMessage;
pub use router::EventRouter;
pub use socket::SocketModeClient;
