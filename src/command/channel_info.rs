//! GetChannelInfo: resolve a channel name through the channel cache.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{decode, missing_fields};
use crate::cache::ChannelCache;
use crate::pack::{Command, CommandHandler, Event, OutcomeEvents};
use crate::types::Conversation;

pub const NAME: &str = "GetChannelInfo";

pub fn events() -> OutcomeEvents {
    OutcomeEvents::new("GetChannelInfoSuccess", "GetChannelInfoFail")
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelInfoInput {
    #[serde(default)]
    pub channel_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChannelInfo<'a> {
    channel_name: &'a str,
    conversation: Conversation,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChannelInfoFail<'a> {
    channel_name: &'a str,
    reason: String,
}

pub struct ChannelInfoHandler {
    cache: Arc<ChannelCache>,
    events: OutcomeEvents,
}

impl ChannelInfoHandler {
    pub fn new(cache: Arc<ChannelCache>, events: OutcomeEvents) -> Self {
        Self { cache, events }
    }
}

#[async_trait]
impl CommandHandler for ChannelInfoHandler {
    async fn handle(&self, input: &[u8]) -> Event {
        let input: ChannelInfoInput = match decode(input) {
            Ok(input) => input,
            Err(fatal) => return fatal,
        };
        let channel_name = input.channel_name.as_str();

        if let Some(reason) = missing_fields(&[(channel_name, "missing channel name field")]) {
            return Event::new(&self.events.failure, &ChannelInfoFail { channel_name, reason });
        }

        match self.cache.resolve(channel_name).await {
            Ok(conversation) => Event::new(
                &self.events.success,
                &ChannelInfo {
                    channel_name,
                    conversation,
                },
            ),
            Err(e) => Event::new(
                &self.events.failure,
                &ChannelInfoFail {
                    channel_name,
                    reason: e.to_string(),
                },
            ),
        }
    }
}

pub fn command(cache: Arc<ChannelCache>) -> Command {
    let events = events();
    Command::new(NAME, events.defs(), Arc::new(ChannelInfoHandler::new(cache, events)))
}
