//! Rich message input.
//!
//! Flyte sends rich messages using `chat.postMessage` argument names, so the
//! shape below mirrors that method and converts straight into a
//! [`PostMessage`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::slack::api::PostMessage;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RichMessage {
    #[serde(rename = "channel", default)]
    pub channel_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "thread_ts", default)]
    pub thread_timestamp: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<Value>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub parse: String,
    #[serde(default)]
    pub reply_broadcast: bool,
    #[serde(default)]
    pub link_names: u8,
    #[serde(default)]
    pub unfurl_links: bool,
    #[serde(default)]
    pub unfurl_media: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub icon_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub icon_emoji: String,
    #[serde(rename = "mrkdwn", default, skip_serializing_if = "Option::is_none")]
    pub markdown: Option<bool>,
    #[serde(default)]
    pub escape_text: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
}

impl RichMessage {
    /// Build the `chat.postMessage` request for this message.
    pub fn to_post_message(&self) -> PostMessage {
        let mut options = Map::new();
        let mut set = |key: &str, value: Value| {
            options.insert(key.to_string(), value);
        };

        if !self.attachments.is_empty() {
            set("attachments", Value::Array(self.attachments.clone()));
        }
        if !self.blocks.is_empty() {
            set("blocks", Value::Array(self.blocks.clone()));
        }
        if !self.parse.is_empty() {
            set("parse", Value::from(self.parse.as_str()));
        }
        if self.reply_broadcast {
            set("reply_broadcast", Value::Bool(true));
        }
        if self.link_names > 0 {
            set("link_names", Value::from(self.link_names));
        }
        set("unfurl_links", Value::Bool(self.unfurl_links));
        set("unfurl_media", Value::Bool(self.unfurl_media));
        if !self.icon_url.is_empty() {
            set("icon_url", Value::from(self.icon_url.as_str()));
        }
        if !self.icon_emoji.is_empty() {
            set("icon_emoji", Value::from(self.icon_emoji.as_str()));
        }
        if let Some(markdown) = self.markdown {
            set("mrkdwn", Value::Bool(markdown));
        }
        if !self.username.is_empty() {
            set("username", Value::from(self.username.as_str()));
        }

        let text = if self.escape_text {
            escape(&self.text)
        } else {
            self.text.clone()
        };

        PostMessage {
            options,
            ..PostMessage::text(&self.channel_id, &text).in_thread(&self.thread_timestamp)
        }
    }
}

/// Slack control-character escaping.
fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
