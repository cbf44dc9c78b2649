//! SendMessage: post plain text to a channel, optionally in a thread.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{decode, missing_fields};
use crate::pack::{Command, CommandHandler, Event, OutcomeEvents};
use crate::slack::ChatClient;

pub const NAME: &str = "SendMessage";

pub fn events() -> OutcomeEvents {
    OutcomeEvents::new("MessageSent", "SendMessageFailed")
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageInput {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub thread_timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageOutput<'a> {
    message: &'a str,
    channel_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageFailed<'a> {
    #[serde(flatten)]
    output: SendMessageOutput<'a>,
    error: String,
}

pub struct SendMessageHandler {
    chat: Arc<dyn ChatClient>,
    events: OutcomeEvents,
}

impl SendMessageHandler {
    pub fn new(chat: Arc<dyn ChatClient>, events: OutcomeEvents) -> Self {
        Self { chat, events }
    }

    fn failed(&self, input: &SendMessageInput, error: String) -> Event {
        let output = SendMessageOutput {
            message: &input.message,
            channel_id: &input.channel_id,
        };
        Event::new(&self.events.failure, &SendMessageFailed { output, error })
    }
}

#[async_trait]
impl CommandHandler for SendMessageHandler {
    async fn handle(&self, input: &[u8]) -> Event {
        let input: SendMessageInput = match decode(input) {
            Ok(input) => input,
            Err(fatal) => return fatal,
        };

        if let Some(error) = missing_fields(&[
            (input.message.as_str(), "missing message field"),
            (input.channel_id.as_str(), "missing channel id field"),
        ]) {
            return self.failed(&input, error);
        }

        match self
            .chat
            .send_message(&input.message, &input.channel_id, &input.thread_timestamp)
            .await
        {
            Ok(_) => Event::new(
                &self.events.success,
                &SendMessageOutput {
                    message: &input.message,
                    channel_id: &input.channel_id,
                },
            ),
            Err(e) => self.failed(&input, e.to_string()),
        }
    }
}

pub fn command(chat: Arc<dyn ChatClient>) -> Command {
    let events = events();
    Command::new(NAME, events.defs(), Arc::new(SendMessageHandler::new(chat, events)))
}
