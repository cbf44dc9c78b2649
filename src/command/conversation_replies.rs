//! GetConversationReplies: every message in a thread, parent included.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{decode, missing_fields};
use crate::pack::{Command, CommandHandler, Event, OutcomeEvents};
use crate::slack::api::SlackMessage;
use crate::slack::ChatClient;

pub const NAME: &str = "GetConversationReplies";

pub fn events() -> OutcomeEvents {
    OutcomeEvents::new("GetConversationRepliesSuccess", "GetConversationRepliesFailed")
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRepliesInput {
    #[serde(default)]
    pub thread_timestamp: String,
    #[serde(default)]
    pub channel_id: String,
}

#[derive(Debug, Serialize)]
struct ConversationReplies {
    messages: Vec<SlackMessage>,
}

#[derive(Debug, Serialize)]
struct ConversationRepliesFailed {
    error: String,
}

pub struct ConversationRepliesHandler {
    chat: Arc<dyn ChatClient>,
    events: OutcomeEvents,
}

impl ConversationRepliesHandler {
    pub fn new(chat: Arc<dyn ChatClient>, events: OutcomeEvents) -> Self {
        Self { chat, events }
    }

    fn failed(&self, error: String) -> Event {
        Event::new(&self.events.failure, &ConversationRepliesFailed { error })
    }
}

#[async_trait]
impl CommandHandler for ConversationRepliesHandler {
    async fn handle(&self, input: &[u8]) -> Event {
        let input: ConversationRepliesInput = match decode(input) {
            Ok(input) => input,
            Err(fatal) => return fatal,
        };

        if let Some(error) = missing_fields(&[
            (input.thread_timestamp.as_str(), "missing threadTimestamp field"),
            (input.channel_id.as_str(), "missing channel id field"),
        ]) {
            return self.failed(error);
        }

        match self
            .chat
            .get_conversation_replies(&input.channel_id, &input.thread_timestamp)
            .await
        {
            Ok(messages) => Event::new(&self.events.success, &ConversationReplies { messages }),
            Err(e) => self.failed(format!("there was an error retrieving the channel replies: {}", e)),
        }
    }
}

pub fn command(chat: Arc<dyn ChatClient>) -> Command {
    let events = events();
    Command::new(NAME, events.defs(), Arc::new(ConversationRepliesHandler::new(chat, events)))
}
