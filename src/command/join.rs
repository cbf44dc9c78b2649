//! JoinChannel: join a channel and start relaying its traffic.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::{decode, missing_fields};
use crate::pack::{Command, CommandHandler, Event, OutcomeEvents};
use crate::slack::{ChatClient, MembershipOutcome};

pub const NAME: &str = "JoinChannel";

pub fn events() -> OutcomeEvents {
    OutcomeEvents::new("ChannelJoined", "JoinChannelFailed")
}

/// Input and success payload shared by JoinChannel and LeaveChannel.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelInput {
    #[serde(default)]
    pub channel_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ChannelFailed<'a> {
    pub channel_id: &'a str,
    pub error: String,
}

/// Map a membership change onto the command's outcome events.
pub(crate) fn membership_event(events: &OutcomeEvents, channel_id: &str, outcome: MembershipOutcome) -> Event {
    match outcome {
        MembershipOutcome::Applied | MembershipOutcome::Skipped => {
            debug!(channel = %channel_id, outcome = ?outcome, "membership request done");
            Event::new(
                &events.success,
                &ChannelInput {
                    channel_id: channel_id.to_string(),
                },
            )
        }
        MembershipOutcome::Failed(error) => Event::new(&events.failure, &ChannelFailed { channel_id, error }),
    }
}

pub struct JoinChannelHandler {
    chat: Arc<dyn ChatClient>,
    events: OutcomeEvents,
}

impl JoinChannelHandler {
    pub fn new(chat: Arc<dyn ChatClient>, events: OutcomeEvents) -> Self {
        Self { chat, events }
    }
}

#[async_trait]
impl CommandHandler for JoinChannelHandler {
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

        let outcome = self.chat.join_channel(&input.channel_id).await;
        membership_event(&self.events, &input.channel_id, outcome)
    }
}

pub fn command(chat: Arc<dyn ChatClient>) -> Command {
    let events = events();
    Command::new(NAME, events.defs(), Arc::new(JoinChannelHandler::new(chat, events)))
}
