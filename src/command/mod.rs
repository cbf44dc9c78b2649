//! Command handlers.
//!
//! Every handler follows the same steps: decode the JSON input (malformed
//! input is a fatal event), check required fields, make one call against
//! Slack or the channel cache, and answer with the command's success or
//! failure event.

pub mod broadcast;
pub mod channel_info;
pub mod conversation_replies;
pub mod join;
pub mod leave;
pub mod message;
pub mod reactions;
pub mod rich_message;

#[cfg(test)]
pub(crate) mod testing;

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

use crate::cache::ChannelCache;
use crate::pack::{Command, Event};
use crate::slack::ChatClient;

/// Every command the pack registers.
pub fn commands(chat: Arc<dyn ChatClient>, cache: Arc<ChannelCache>) -> Vec<Command> {
    vec![
        message::command(chat.clone()),
        broadcast::command(chat.clone()),
        join::command(chat.clone()),
        leave::command(chat.clone()),
        rich_message::command(chat.clone()),
        channel_info::command(cache),
        reactions::reaction_list_command(chat.clone()),
        reactions::reaction_message_info_command(chat.clone()),
        conversation_replies::command(chat),
    ]
}

/// Decode command input, turning malformed JSON into the fatal event.
///
/// `null` reads as the empty value: a null input decodes like `{}` and a null
/// field like an absent one, so it reaches field validation instead.
pub(crate) fn decode<T: DeserializeOwned>(input: &[u8]) -> Result<T, Event> {
    let fatal = |e: serde_json::Error| Event::fatal(format!("input is not valid: {}", e));

    let mut value: Value = serde_json::from_slice(input).map_err(fatal)?;
    if value.is_null() {
        value = Value::Object(Default::default());
    } else if let Value::Object(fields) = &mut value {
        fields.retain(|_, field| !field.is_null());
    }
    serde_json::from_value(value).map_err(fatal)
}

/// Messages for every empty required field, joined by `", "`. `None` when
/// all are present.
pub(crate) fn missing_fields(fields: &[(&str, &str)]) -> Option<String> {
    let missing: Vec<&str> = fields
        .iter()
        .filter(|(value, _)| value.is_empty())
        .map(|(_, message)| *message)
        .collect();

    if missing.is_empty() {
        None
    } else {
        Some(missing.join(", "))
    }
}
