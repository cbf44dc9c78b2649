//! Slack Web API access.
//!
//! [`SlackApi`] is the slice of the platform the pack consumes. [`WebApiClient`]
//! implements it over HTTPS with the bot token; tests substitute their own
//! implementations.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::TieredRateLimiter;
use crate::error::SlackError;
use crate::types::{Conversation, User};

/// Slack Web API base URL.
pub const SLACK_API_BASE: &str = "https://slack.com/api";

/// Page size for `conversations.list` (Slack's maximum).
pub const CONVERSATIONS_PAGE_LIMIT: u32 = 1000;

/// A message as returned by history-style Slack methods.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackMessage {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub ts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub reply_count: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reactions: Vec<Reaction>,
}

/// Emoji reaction summary on a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub name: String,
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub users: Vec<String>,
}

/// A message together with the channel it lives in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactedMessage {
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub message: SlackMessage,
}

impl ReactedMessage {
    /// Whether `user_id` reacted to this message.
    pub fn has_reaction_from(&self, user_id: &str) -> bool {
        self.message
            .reactions
            .iter()
            .any(|r| r.users.iter().any(|u| u == user_id))
    }
}

/// One page of `conversations.list`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationPage {
    pub conversations: Vec<Conversation>,
    /// Empty when this is the last page.
    pub next_cursor: String,
}

/// Body of `chat.postMessage`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PostMessage {
    pub channel: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    /// Extra `chat.postMessage` arguments (attachments, blocks, ...).
    #[serde(flatten)]
    pub options: serde_json::Map<String, Value>,
}

impl PostMessage {
    pub fn text(channel: &str, text: &str) -> Self {
        Self {
            channel: channel.to_string(),
            text: text.to_string(),
            ..Default::default()
        }
    }

    pub fn in_thread(mut self, thread_ts: &str) -> Self {
        if !thread_ts.is_empty() {
            self.thread_ts = Some(thread_ts.to_string());
        }
        self
    }
}

/// Where a posted message ended up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostedMessage {
    pub channel: String,
    pub ts: String,
}

/// Slack platform operations used by the pack.
#[async_trait]
pub trait SlackApi: Send + Sync {
    /// `users.info`
    async fn user_info(&self, user_id: &str) -> Result<User, SlackError>;

    /// `conversations.info`
    async fn conversation_info(&self, channel_id: &str) -> Result<Conversation, SlackError>;

    /// `conversations.join`
    async fn join_conversation(&self, channel_id: &str) -> Result<Conversation, SlackError>;

    /// `conversations.leave`; `Ok(true)` when the bot was not in the channel.
    async fn leave_conversation(&self, channel_id: &str) -> Result<bool, SlackError>;

    /// `chat.postMessage`
    async fn post_message(&self, message: &PostMessage) -> Result<PostedMessage, SlackError>;

    /// `conversations.list`, one page.
    async fn list_conversations(&self, cursor: &str) -> Result<ConversationPage, SlackError>;

    /// `conversations.replies`
    async fn conversation_replies(
        &self,
        channel_id: &str,
        thread_ts: &str,
    ) -> Result<Vec<SlackMessage>, SlackError>;

    /// `reactions.get`
    async fn get_reactions(&self, channel_id: &str, ts: &str) -> Result<ReactedMessage, SlackError>;

    /// `reactions.list`
    async fn list_reactions(&self, user_id: &str, count: u32) -> Result<Vec<ReactedMessage>, SlackError>;
}

#[derive(Debug, Deserialize)]
struct ApiTopic {
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct ApiChannel {
    id: String,
    #[serde(default)]
    name: String,
    topic: Option<ApiTopic>,
}

impl From<ApiChannel> for Conversation {
    fn from(c: ApiChannel) -> Self {
        Conversation {
            id: c.id,
            name: c.name,
            topic: c.topic.map(|t| t.value).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct ApiProfile {
    #[serde(default)]
    email: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    profile: ApiProfile,
}

impl From<ApiUser> for User {
    fn from(u: ApiUser) -> Self {
        User {
            id: u.id,
            name: u.name,
            email: u.profile.email,
            title: u.profile.title,
            first_name: u.profile.first_name,
            last_name: u.profile.last_name,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    user: ApiUser,
}

#[derive(Debug, Deserialize)]
struct ChannelResponse {
    channel: ApiChannel,
}

#[derive(Debug, Deserialize)]
struct LeaveResponse {
    #[serde(default)]
    not_in_channel: bool,
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    #[serde(default)]
    channel: String,
    #[serde(default)]
    ts: String,
}

#[derive(Debug, Deserialize, Default)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: String,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    channels: Vec<ApiChannel>,
    #[serde(default)]
    response_metadata: ResponseMetadata,
}

#[derive(Debug, Deserialize)]
struct RepliesResponse {
    #[serde(default)]
    messages: Vec<SlackMessage>,
}

#[derive(Debug, Deserialize)]
struct ReactionsListResponse {
    #[serde(default)]
    items: Vec<ReactedMessage>,
}

#[derive(Debug, Deserialize)]
struct ConnectionsOpenResponse {
    url: String,
}

/// Slack Web API client authenticated with the bot token.
#[derive(Clone)]
pub struct WebApiClient {
    http: reqwest::Client,
    base_url: String,
    bot_token: String,
    app_token: String,
    limiter: TieredRateLimiter,
}

impl WebApiClient {
    pub fn new(bot_token: &str, app_token: &str) -> Result<Self, SlackError> {
        Self::with_base_url(SLACK_API_BASE, bot_token, app_token)
    }

    /// Client talking to a non-default API root.
    pub fn with_base_url(base_url: &str, bot_token: &str, app_token: &str) -> Result<Self, SlackError> {
        if bot_token.is_empty() {
            return Err(SlackError::ConnectionFailed("bot token cannot be empty".to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .map_err(|e| SlackError::ConnectionFailed(format!("HTTP client init: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
            app_token: app_token.to_string(),
            limiter: TieredRateLimiter::slack(),
        })
    }

    /// `apps.connections.open`: WebSocket URL for Socket Mode.
    pub async fn open_connection(&self) -> Result<String, SlackError> {
        let request = self
            .http
            .post(self.url("apps.connections.open"))
            .bearer_auth(&self.app_token);
        let resp: ConnectionsOpenResponse = self.send("apps.connections.open", request).await?;
        Ok(resp.url)
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    /// Form-encoded call authenticated with the bot token.
    async fn call<T: DeserializeOwned>(&self, method: &str, params: &[(&str, &str)]) -> Result<T, SlackError> {
        let request = self
            .http
            .post(self.url(method))
            .bearer_auth(&self.bot_token)
            .form(params);
        self.send(method, request).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, SlackError> {
        self.limiter.acquire(method).await;

        let response = request.send().await.map_err(|e| SlackError::Request {
            method: method.to_string(),
            reason: e.to_string(),
        })?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(1);
            return Err(SlackError::RateLimited { retry_after });
        }

        let body: Value = response.json().await.map_err(|e| SlackError::Decode {
            method: method.to_string(),
            reason: e.to_string(),
        })?;

        parse_response(method, body)
    }
}

/// Check Slack's `ok` flag and decode the rest of the body.
fn parse_response<T: DeserializeOwned>(method: &str, body: Value) -> Result<T, SlackError> {
    if body.get("ok").and_then(Value::as_bool) != Some(true) {
        let error = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        return Err(SlackError::Api {
            method: method.to_string(),
            error,
        });
    }

    serde_json::from_value(body).map_err(|e| SlackError::Decode {
        method: method.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl SlackApi for WebApiClient {
    async fn user_info(&self, user_id: &str) -> Result<User, SlackError> {
        let resp: UserResponse = self.call("users.info", &[("user", user_id)]).await?;
        Ok(resp.user.into())
    }

    async fn conversation_info(&self, channel_id: &str) -> Result<Conversation, SlackError> {
        let resp: ChannelResponse = self
            .call("conversations.info", &[("channel", channel_id)])
            .await?;
        Ok(resp.channel.into())
    }

    async fn join_conversation(&self, channel_id: &str) -> Result<Conversation, SlackError> {
        let resp: ChannelResponse = self
            .call("conversations.join", &[("channel", channel_id)])
            .await?;
        Ok(resp.channel.into())
    }

    async fn leave_conversation(&self, channel_id: &str) -> Result<bool, SlackError> {
        let resp: LeaveResponse = self
            .call("conversations.leave", &[("channel", channel_id)])
            .await?;
        Ok(resp.not_in_channel)
    }

    async fn post_message(&self, message: &PostMessage) -> Result<PostedMessage, SlackError> {
        let request = self
            .http
            .post(self.url("chat.postMessage"))
            .bearer_auth(&self.bot_token)
            .json(message);
        let resp: PostMessageResponse = self.send("chat.postMessage", request).await?;
        Ok(PostedMessage {
            channel: resp.channel,
            ts: resp.ts,
        })
    }

    async fn list_conversations(&self, cursor: &str) -> Result<ConversationPage, SlackError> {
        let limit = CONVERSATIONS_PAGE_LIMIT.to_string();
        let mut params = vec![
            ("exclude_archived", "true"),
            ("limit", limit.as_str()),
        ];
        if !cursor.is_empty() {
            params.push(("cursor", cursor));
        }

        let resp: ListResponse = self.call("conversations.list", &params).await?;
        Ok(ConversationPage {
            conversations: resp.channels.into_iter().map(Conversation::from).collect(),
            next_cursor: resp.response_metadata.next_cursor,
        })
    }

    async fn conversation_replies(
        &self,
        channel_id: &str,
        thread_ts: &str,
    ) -> Result<Vec<SlackMessage>, SlackError> {
        let resp: RepliesResponse = self
            .call("conversations.replies", &[("channel", channel_id), ("ts", thread_ts)])
            .await?;
        Ok(resp.messages)
    }

    async fn get_reactions(&self, channel_id: &str, ts: &str) -> Result<ReactedMessage, SlackError> {
        self.call(
            "reactions.get",
            &[("channel", channel_id), ("timestamp", ts), ("full", "true")],
        )
        .await
    }

    async fn list_reactions(&self, user_id: &str, count: u32) -> Result<Vec<ReactedMessage>, SlackError> {
        let count = count.to_string();
        let resp: ReactionsListResponse = self
            .call("reactions.list", &[("user", user_id), ("count", count.as_str()), ("full", "true")])
            .await?;
        Ok(resp.items)
    }
}
