//! SendRichMessage: post a message with attachments, blocks and other
//! `chat.postMessage` options.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

use super::{decode, missing_fields};
use crate::pack::{Command, CommandHandler, Event, OutcomeEvents};
use crate::slack::{ChatClient, RichMessage};

pub const NAME: &str = "SendRichMessage";

pub fn events() -> OutcomeEvents {
    OutcomeEvents::new("RichMessageSent", "SendRichMessageFailed")
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RichMessageSent {
    channel_id: String,
    thread_timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendRichMessageFailed<'a> {
    input_message: &'a RichMessage,
    error: String,
}

pub struct SendRichMessageHandler {
    chat: Arc<dyn ChatClient>,
    events: OutcomeEvents,
}

impl SendRichMessageHandler {
    pub fn new(chat: Arc<dyn ChatClient>, events: OutcomeEvents) -> Self {
        Self { chat, events }
    }

    fn failed(&self, input_message: &RichMessage, error: String) -> Event {
        Event::new(&self.events.failure, &SendRichMessageFailed { input_message, error })
    }
}

#[async_trait]
impl CommandHandler for SendRichMessageHandler {
    async fn handle(&self, input: &[u8]) -> Event {
        let message: RichMessage = match decode(input) {
            Ok(message) => message,
            Err(fatal) => return fatal,
        };

        if let Some(error) = missing_fields(&[(message.channel_id.as_str(), "missing channel id field")]) {
            return self.failed(&message, error);
        }

        match self.chat.send_rich_message(&message).await {
            Ok(posted) => Event::new(
                &self.events.success,
                &RichMessageSent {
                    channel_id: posted.channel,
                    thread_timestamp: posted.ts,
                },
            ),
            Err(e) => {
                error!(channel = %message.channel_id, error = %e, "error sending rich message");
                self.failed(&message, format!("cannot send rich message: {}", e))
            }
        }
    }
}

pub fn command(chat: Arc<dyn ChatClient>) -> Command {
    let events = events();
    Command::new(NAME, events.defs(), Arc::new(SendRichMessageHandler::new(chat, events)))
}
