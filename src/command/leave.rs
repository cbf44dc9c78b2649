//! LeaveChannel: say goodbye, leave and stop relaying a channel.

use async_trait::async_trait;
use std::sync::Arc;

use super::join::{membership_event, ChannelFailed, ChannelInput};
use super::{decode, missing_fields};
use crate::pack::{Command, CommandHandler, Event, OutcomeEvents};
use crate::slack::ChatClient;

pub const NAME: &str = "LeaveChannel";

pub fn events() -> OutcomeEvents {
    OutcomeEvents::new("ChannelLeft", "LeaveChannelFailed")
}

pub struct LeaveChannelHandler {
    chat: Arc<dyn ChatClient>,
    events: OutcomeEvents,
}

impl LeaveChannelHandler {
    pub fn new(chat: Arc<dyn ChatClient>, events: OutcomeEvents) -> Self {
        Self { chat, events }
    }
}

#[async_trait]
impl CommandHandler for LeaveChannelHandler {
    async fn handle(&self, input: &[u8]) -> Event {
        let input: ChannelInput = match decode(input) {
            Ok(input) => input,
            Err(fatal) => return fatal,
        };

        if let Some(error) = missing_fields(&[(input.channel_id.as_str(), "missing channel id field")]) {
            return Event::new(
                &self.events.failure,
                &ChannelFailed {
                    channel_id: &input.channel_id,
                    error,
                },
            );
        }

        let outcome = self.chat.leave_channel(&input.channel_id).await;
        membership_event(&self.events, &input.channel_id, outcome)
    }
}

pub fn command(chat: Arc<dyn ChatClient>) -> Command {
    let events = events();
    Command::new(NAME, events.defs(), Arc::new(LeaveChannelHandler::new(chat, events)))
}
