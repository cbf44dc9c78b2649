//! Slack capability used by command handlers.

use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::SlackError;
use crate::slack::api::{PostMessage, PostedMessage, SlackApi, SlackMessage};
use crate::slack::membership::{Membership, MembershipOutcome};
use crate::slack::rich_message::RichMessage;
use crate::types::Conversation;

/// Reaction lookups fetch this many items when the caller gives no count.
pub const DEFAULT_REACTION_COUNT: u32 = 100;

/// Channels a broadcast could not reach, with the reason.
pub type BroadcastFailures = Vec<(String, SlackError)>;

/// Everything commands may ask of Slack.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Post plain text, threaded when `thread_timestamp` is not empty.
    async fn send_message(
        &self,
        message: &str,
        channel_id: &str,
        thread_timestamp: &str,
    ) -> Result<PostedMessage, SlackError>;

    /// Post to every joined channel.
    async fn broadcast(&self, message: &str) -> BroadcastFailures;

    async fn join_channel(&self, channel_id: &str) -> MembershipOutcome;

    async fn leave_channel(&self, channel_id: &str) -> MembershipOutcome;

    async fn send_rich_message(&self, message: &RichMessage) -> Result<PostedMessage, SlackError>;

    /// Messages in `channel_id` among the last `count` items `user_id` reacted to.
    async fn get_reaction_list(
        &self,
        count: u32,
        user_id: &str,
        channel_id: &str,
    ) -> Result<Vec<SlackMessage>, SlackError>;

    /// Text of the message at `timestamp`, provided `user_id` reacted to it.
    async fn get_reaction_message_text(
        &self,
        user_id: &str,
        channel_id: &str,
        timestamp: &str,
    ) -> Result<String, SlackError>;

    async fn get_conversation_replies(
        &self,
        channel_id: &str,
        thread_timestamp: &str,
    ) -> Result<Vec<SlackMessage>, SlackError>;
}

/// Source of the full workspace channel list.
#[async_trait]
pub trait ConversationSource: Send + Sync {
    /// Every non-archived conversation. Expensive; callers cache it.
    async fn get_conversations(&self) -> Result<Vec<Conversation>, SlackError>;
}

/// [`ChatClient`] over the Slack Web API and the membership store.
#[derive(Clone)]
pub struct SlackClient {
    api: Arc<dyn SlackApi>,
    membership: Arc<Membership>,
}

impl SlackClient {
    pub fn new(api: Arc<dyn SlackApi>, membership: Arc<Membership>) -> Self {
        Self { api, membership }
    }

    pub fn membership(&self) -> &Arc<Membership> {
        &self.membership
    }

    /// Best-effort notice to every joined channel before the process exits.
    pub async fn notify_shutdown(&self, message: &str) {
        let failures = self.broadcast(message).await;
        for (channel, e) in &failures {
            warn!(channel = %channel, error = %e, "cannot send shutdown notice");
        }
        info!(
            channels = self.membership.members().len(),
            failed = failures.len(),
            "shutdown notice sent"
        );
    }
}

#[async_trait]
impl ChatClient for SlackClient {
    async fn send_message(
        &self,
        message: &str,
        channel_id: &str,
        thread_timestamp: &str,
    ) -> Result<PostedMessage, SlackError> {
        let request = PostMessage::text(channel_id, message).in_thread(thread_timestamp);
        let posted = self.api.post_message(&request).await?;
        info!(channel = %channel_id, message = %message, "message sent");
        Ok(posted)
    }

    async fn broadcast(&self, message: &str) -> BroadcastFailures {
        let channels = self.membership.members();
        let sends = channels.iter().map(|channel| async move {
            self.send_message(message, channel, "")
                .await
                .err()
                .map(|e| (channel.clone(), e))
        });

        let failures: BroadcastFailures = join_all(sends).await.into_iter().flatten().collect();
        info!(channels = channels.len(), failed = failures.len(), "broadcast sent");
        failures
    }

    async fn join_channel(&self, channel_id: &str) -> MembershipOutcome {
        self.membership.join(channel_id).await
    }

    async fn leave_channel(&self, channel_id: &str) -> MembershipOutcome {
        self.membership.leave(channel_id).await
    }

    async fn send_rich_message(&self, message: &RichMessage) -> Result<PostedMessage, SlackError> {
        let posted = self.api.post_message(&message.to_post_message()).await?;
        info!(channel = %message.channel_id, ts = %posted.ts, "rich message sent");
        Ok(posted)
    }

    async fn get_reaction_list(
        &self,
        count: u32,
        user_id: &str,
        channel_id: &str,
    ) -> Result<Vec<SlackMessage>, SlackError> {
        let count = if count == 0 { DEFAULT_REACTION_COUNT } else { count };
        let items = self.api.list_reactions(user_id, count).await?;
        Ok(items
            .into_iter()
            .filter(|item| item.channel == channel_id)
            .map(|item| item.message)
            .collect())
    }

    async fn get_reaction_message_text(
        &self,
        user_id: &str,
        channel_id: &str,
        timestamp: &str,
    ) -> Result<String, SlackError> {
        let reacted = self.api.get_reactions(channel_id, timestamp).await?;
        if !reacted.has_reaction_from(user_id) {
            return Err(SlackError::NotFound(format!(
                "user {} has no reaction on message {} in channel {}",
                user_id, timestamp, channel_id
            )));
        }
        Ok(reacted.message.text)
    }

    async fn get_conversation_replies(
        &self,
        channel_id: &str,
        thread_timestamp: &str,
    ) -> Result<Vec<SlackMessage>, SlackError> {
        self.api.conversation_replies(channel_id, thread_timestamp).await
    }
}

#[async_trait]
impl ConversationSource for SlackClient {
    async fn get_conversations(&self) -> Result<Vec<Conversation>, SlackError> {
        let mut conversations = Vec::new();
        let mut cursor = String::new();
        loop {
            let page = self.api.list_conversations(&cursor).await?;
            conversations.extend(page.conversations);
            if page.next_cursor.is_empty() {
                break;
            }
            cursor = page.next_cursor;
        }
        Ok(conversations)
    }
}
