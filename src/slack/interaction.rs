//! Interaction callbacks (button clicks).
//!
//! Slack delivers these through the interaction webhook and, in Socket Mode,
//! inside `interactive` envelopes. Both legacy attachment buttons
//! (`interactive_message`) and Block Kit buttons (`block_actions`) are read.

use serde::Deserialize;
use serde_json::Value;

use crate::types::{ButtonActionEvent, RawEvent};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct IdRef {
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CallbackAction {
    /// Legacy attachment action name.
    #[serde(default)]
    pub name: String,
    /// Block Kit action id.
    #[serde(default)]
    pub action_id: String,
    #[serde(default)]
    pub value: String,
}

impl CallbackAction {
    fn name(&self) -> &str {
        if self.name.is_empty() {
            &self.action_id
        } else {
            &self.name
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CallbackMessage {
    #[serde(default)]
    pub ts: String,
    #[serde(default)]
    pub thread_ts: Option<String>,
}

/// Payload Slack posts when a user clicks an interactive element.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InteractionCallback {
    #[serde(rename = "type", default)]
    pub callback_type: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub callback_id: String,
    #[serde(default)]
    pub user: IdRef,
    #[serde(default)]
    pub channel: IdRef,
    #[serde(default)]
    pub actions: Vec<CallbackAction>,
    #[serde(default)]
    pub message_ts: String,
    #[serde(default)]
    pub message: Option<CallbackMessage>,
    #[serde(default)]
    pub original_message: Option<Value>,
    #[serde(default)]
    pub response_url: String,
}

impl InteractionCallback {
    pub fn is_button_action(&self) -> bool {
        matches!(self.callback_type.as_str(), "interactive_message" | "block_actions")
    }

    /// The first clicked action as a raw event, if this was a button click.
    pub fn to_raw_event(&self) -> Option<RawEvent> {
        if !self.is_button_action() {
            return None;
        }
        let action = self.actions.first()?;

        let (message_timestamp, thread_timestamp) = match &self.message {
            Some(message) => (message.ts.clone(), message.thread_ts.clone()),
            None => (self.message_ts.clone(), None),
        };

        Some(RawEvent::ButtonAction(ButtonActionEvent {
            channel: self.channel.id.clone(),
            user: self.user.id.clone(),
            callback_id: self.callback_id.clone(),
            action_name: action.name().to_string(),
            value: action.value.clone(),
            message_timestamp,
            thread_timestamp,
            response_url: self.response_url.clone(),
        }))
    }
}
