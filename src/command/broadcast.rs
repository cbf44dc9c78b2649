//! Broadcast: post the same text to every joined channel.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{decode, missing_fields};
use crate::pack::{Command, CommandHandler, Event, OutcomeEvents};
use crate::slack::ChatClient;

pub const NAME: &str = "Broadcast";

pub fn events() -> OutcomeEvents {
    OutcomeEvents::new("BroadcastSent", "BroadcastFailed")
}

#[derive(Debug, Default, Deserialize)]
pub struct BroadcastInput {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize)]
struct BroadcastOutput<'a> {
    message: &'a str,
}

#[derive(Debug, Serialize)]
struct BroadcastFailed<'a> {
    message: &'a str,
    error: String,
}

pub struct BroadcastHandler {
    chat: Arc<dyn ChatClient>,
    events: OutcomeEvents,
}

impl BroadcastHandler {
    pub fn new(chat: Arc<dyn ChatClient>, events: OutcomeEvents) -> Self {
        Self { chat, events }
    }

    fn failed(&self, message: &str, error: String) -> Event {
        Event::new(&self.events.failure, &BroadcastFailed { message, error })
    }
}

#[async_trait]
impl CommandHandler for BroadcastHandler {
    async fn handle(&self, input: &[u8]) -> Event {
        let input: BroadcastInput = match decode(input) {
            Ok(input) => input,
            Err(fatal) => return fatal,
        };

        if let Some(error) = missing_fields(&[(input.message.as_str(), "missing message field")]) {
            return self.failed(&input.message, error);
        }

        let failures = self.chat.broadcast(&input.message).await;
        if !failures.is_empty() {
            let error = failures
                .iter()
                .map(|(channel, e)| format!("channel={}: {}", channel, e))
                .collect::<Vec<_>>()
                .join(", ");
            return self.failed(&input.message, error);
        }

        Event::new(
            &self.events.success,
            &BroadcastOutput {
                message: &input.message,
            },
        )
    }
}

pub fn command(chat: Arc<dyn ChatClient>) -> Command {
    let events = events();
    Command::new(NAME, events.defs(), Arc::new(BroadcastHandler::new(chat, events)))
}
