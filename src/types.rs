//! Core types for flyte-slack.
//!
//! Channel metadata, user profiles, the raw events delivered by Slack and the
//! enriched payloads that leave the pack as Flyte events.

use serde::{Deserialize, Serialize};

/// Metadata snapshot of a Slack channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub name: String,
    pub topic: String,
}

impl Conversation {
    pub fn new(id: &str, name: &str, topic: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            topic: topic.to_string(),
        }
    }
}

/// User profile attached to enriched events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub title: String,
    pub first_name: String,
    pub last_name: String,
}

/// A reply reference carried on threaded messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    #[serde(default)]
    pub user: String,
    #[serde(rename = "timestamp", alias = "ts", default)]
    pub timestamp: String,
}

/// A plain message posted in a channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageEvent {
    pub channel: String,
    pub user: String,
    pub text: String,
    pub timestamp: String,
    pub thread_timestamp: Option<String>,
    pub reply_count: u32,
    pub replies: Vec<Reply>,
}

/// The item a reaction was added to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionItem {
    #[serde(rename = "type")]
    pub item_type: String,
    pub timestamp: String,
    pub channel: String,
}

/// A reaction added to a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReactionEvent {
    pub user: String,
    pub item_user: String,
    pub item: ReactionItem,
    pub reaction: String,
    pub event_timestamp: String,
    pub thread_timestamp: Option<String>,
}

/// A button click on an interactive message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ButtonActionEvent {
    pub channel: String,
    pub user: String,
    pub callback_id: String,
    pub action_name: String,
    pub value: String,
    pub message_timestamp: String,
    pub thread_timestamp: Option<String>,
    pub response_url: String,
}

/// Events delivered by Slack's realtime feed or the interaction webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawEvent {
    Message(MessageEvent),
    Reaction(ReactionEvent),
    ButtonAction(ButtonActionEvent),
}

impl RawEvent {
    /// Channel the event happened in.
    pub fn channel(&self) -> &str {
        match self {
            RawEvent::Message(m) => &m.channel,
            RawEvent::Reaction(r) => &r.item.channel,
            RawEvent::ButtonAction(b) => &b.channel,
        }
    }

    /// Id of the user who acted.
    pub fn user(&self) -> &str {
        match self {
            RawEvent::Message(m) => &m.user,
            RawEvent::Reaction(r) => &r.user,
            RawEvent::ButtonAction(b) => &b.user,
        }
    }

    /// Whether channel membership decides if the event is relayed.
    pub fn is_membership_gated(&self) -> bool {
        matches!(self, RawEvent::Message(_) | RawEvent::Reaction(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RawEvent::Message(_) => "message",
            RawEvent::Reaction(_) => "reaction_added",
            RawEvent::ButtonAction(_) => "button_action",
        }
    }
}

/// Thread timestamp, defaulting to the message timestamp.
pub fn thread_timestamp_or(thread_timestamp: Option<&str>, timestamp: &str) -> String {
    match thread_timestamp {
        Some(ts) if !ts.is_empty() => ts.to_string(),
        _ => timestamp.to_string(),
    }
}

/// Payload of the `ReceivedMessage` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedMessage {
    pub channel_id: String,
    pub user: User,
    pub message: String,
    pub timestamp: String,
    pub thread_timestamp: String,
    pub reply_count: u32,
    pub replies: Vec<Reply>,
}

impl ReceivedMessage {
    pub fn new(event: MessageEvent, user: User) -> Self {
        let thread_timestamp =
            thread_timestamp_or(event.thread_timestamp.as_deref(), &event.timestamp);
        Self {
            channel_id: event.channel,
            user,
            message: event.text,
            timestamp: event.timestamp,
            thread_timestamp,
            reply_count: event.reply_count,
            replies: event.replies,
        }
    }
}

/// Payload of the `ReactionAdded` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionAdded {
    #[serde(rename = "type")]
    pub event_type: String,
    pub user: User,
    pub item_user: User,
    pub item: ReactionItem,
    pub reaction: String,
    pub event_timestamp: String,
    pub thread_timestamp: String,
}

impl ReactionAdded {
    pub fn new(event: ReactionEvent, user: User, item_user: User) -> Self {
        let thread_timestamp =
            thread_timestamp_or(event.thread_timestamp.as_deref(), &event.item.timestamp);
        Self {
            event_type: "reaction_added".to_string(),
            user,
            item_user,
            item: event.item,
            reaction: event.reaction,
            event_timestamp: event.event_timestamp,
            thread_timestamp,
        }
    }
}

/// Payload of the `ReceivedButtonAction` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedButtonAction {
    pub channel_id: String,
    pub user: User,
    pub callback_id: String,
    pub action_name: String,
    pub value: String,
    pub timestamp: String,
    pub thread_timestamp: String,
    pub response_url: String,
}

impl ReceivedButtonAction {
    pub fn new(event: ButtonActionEvent, user: User) -> Self {
        let thread_timestamp =
            thread_timestamp_or(event.thread_timestamp.as_deref(), &event.message_timestamp);
        Self {
            channel_id: event.channel,
            user,
            callback_id: event.callback_id,
            action_name: event.action_name,
            value: event.value,
            timestamp: event.message_timestamp,
            thread_timestamp,
            response_url: event.response_url,
        }
    }
}
