//! GetReactionList and GetReactionMessageInfo.
//!
//! Both take the same input shape. The list command returns the messages a
//! user reacted to in a channel; the info command returns the text of one
//! message, provided the user reacted to it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use super::{decode, missing_fields};
use crate::pack::{Command, CommandHandler, Event, OutcomeEvents};
use crate::slack::api::SlackMessage;
use crate::slack::ChatClient;

pub const REACTION_LIST: &str = "GetReactionList";
pub const REACTION_MESSAGE_INFO: &str = "GetReactionMessageInfo";

pub fn reaction_list_events() -> OutcomeEvents {
    OutcomeEvents::new("GetReactionListSuccess", "GetReactionListFailed")
}

pub fn reaction_message_info_events() -> OutcomeEvents {
    OutcomeEvents::new("GetReactionMessageInfoSuccess", "GetReactionMessageInfoFailed")
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionInput {
    /// Upper bound on reactions scanned; 0 means the client default.
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub thread_timestamp: String,
    #[serde(default)]
    pub reaction_user: String,
    #[serde(default)]
    pub channel_id: String,
}

#[derive(Debug, Serialize)]
struct ReactionListOutput<'a> {
    #[serde(flatten)]
    input: &'a ReactionInput,
    messages: Vec<SlackMessage>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReactionMessage<'a> {
    message: &'a str,
    channel_id: &'a str,
}

#[derive(Debug, Serialize)]
struct ReactionFailed<'a> {
    #[serde(flatten)]
    output: ReactionMessage<'a>,
    error: String,
}

fn failed(events: &OutcomeEvents, input: &ReactionInput, error: String) -> Event {
    let output = ReactionMessage {
        message: &input.message,
        channel_id: &input.channel_id,
    };
    Event::new(&events.failure, &ReactionFailed { output, error })
}

pub struct ReactionListHandler {
    chat: Arc<dyn ChatClient>,
    events: OutcomeEvents,
}

impl ReactionListHandler {
    pub fn new(chat: Arc<dyn ChatClient>, events: OutcomeEvents) -> Self {
        Self { chat, events }
    }
}

#[async_trait]
impl CommandHandler for ReactionListHandler {
    async fn handle(&self, input: &[u8]) -> Event {
        let input: ReactionInput = match decode(input) {
            Ok(input) => input,
            Err(fatal) => return fatal,
        };

        if let Some(error) = missing_fields(&[
            (input.channel_id.as_str(), "missing channel id field"),
            (input.reaction_user.as_str(), "missing user id field"),
        ]) {
            return failed(&self.events, &input, error);
        }

        match self
            .chat
            .get_reaction_list(input.count, &input.reaction_user, &input.channel_id)
            .await
        {
            Ok(messages) => Event::new(
                &self.events.success,
                &ReactionListOutput {
                    input: &input,
                    messages,
                },
            ),
            Err(e) => {
                warn!(user = %input.reaction_user, channel = %input.channel_id, error = %e, "listing reactions failed");
                let error = format!(
                    "error listing reactions for user {} in channel {}: {}",
                    input.reaction_user, input.channel_id, e
                );
                failed(&self.events, &input, error)
            }
        }
    }
}

pub struct ReactionMessageInfoHandler {
    chat: Arc<dyn ChatClient>,
    events: OutcomeEvents,
}

impl ReactionMessageInfoHandler {
    pub fn new(chat: Arc<dyn ChatClient>, events: OutcomeEvents) -> Self {
        Self { chat, events }
    }
}

#[async_trait]
impl CommandHandler for ReactionMessageInfoHandler {
    async fn handle(&self, input: &[u8]) -> Event {
        let input: ReactionInput = match decode(input) {
            Ok(input) => input,
            Err(fatal) => return fatal,
        };

        if let Some(error) = missing_fields(&[
            (input.thread_timestamp.as_str(), "missing Message Timestamp field"),
            (input.channel_id.as_str(), "missing channel id field"),
            (input.reaction_user.as_str(), "missing user id field"),
        ]) {
            return failed(&self.events, &input, error);
        }

        match self
            .chat
            .get_reaction_message_text(&input.reaction_user, &input.channel_id, &input.thread_timestamp)
            .await
        {
            Ok(text) => Event::new(
                &self.events.success,
                &ReactionMessage {
                    message: &text,
                    channel_id: &input.channel_id,
                },
            ),
            Err(e) => {
                let error = format!(
                    "error reading reacted message for user {} in channel {}: {}",
                    input.reaction_user, input.channel_id, e
                );
                failed(&self.events, &input, error)
            }
        }
    }
}

pub fn reaction_list_command(chat: Arc<dyn ChatClient>) -> Command {
    let events = reaction_list_events();
    Command::new(
        REACTION_LIST,
        events.defs(),
        Arc::new(ReactionListHandler::new(chat, events)),
    )
}

pub fn reaction_message_info_command(chat: Arc<dyn ChatClient>) -> Command {
    let events = reaction_message_info_events();
    Command::new(
        REACTION_MESSAGE_INFO,
        events.defs(),
        Arc::new(ReactionMessageInfoHandler::new(chat, events)),
    )
}
