//! Recording [`ChatClient`] for command tests.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::error::SlackError;
use crate::slack::api::{PostedMessage, SlackMessage};
use crate::slack::{ChatClient, ConversationSource, MembershipOutcome, RichMessage};
use crate::types::Conversation;

fn failure(error: &str) -> SlackError {
    SlackError::Api {
        method: "mock".to_string(),
        error: error.to_string(),
    }
}

#[derive(Default)]
pub struct MockChatClient {
    pub send_error: Option<String>,
    pub broadcast_failures: Vec<String>,
    pub membership_outcome: Option<MembershipOutcome>,
    pub conversations: Vec<Conversation>,
    pub messages: Vec<SlackMessage>,
    pub reaction_text: Option<String>,
    pub sent: Mutex<Vec<(String, String, String)>>,
    pub broadcasts: Mutex<Vec<String>>,
    pub joined: Mutex<Vec<String>>,
    pub left: Mutex<Vec<String>>,
    pub rich_messages: Mutex<Vec<RichMessage>>,
}

impl MockChatClient {
    pub fn sent(&self) -> Vec<(String, String, String)> {
        self.sent.lock().unwrap().clone()
    }

    fn outcome(&self) -> MembershipOutcome {
        self.membership_outcome.clone().unwrap_or(MembershipOutcome::Applied)
    }

    fn send_result(&self, channel_id: &str) -> Result<PostedMessage, SlackError> {
        match &self.send_error {
            Some(e) => Err(failure(e)),
            None => Ok(PostedMessage {
                channel: channel_id.to_string(),
                ts: "1234.5678".to_string(),
            }),
        }
    }
}

#[async_trait]
impl ChatClient for MockChatClient {
    async fn send_message(
        &self,
        message: &str,
        channel_id: &str,
        thread_timestamp: &str,
    ) -> Result<PostedMessage, SlackError> {
        self.sent.lock().unwrap().push((
            message.to_string(),
            channel_id.to_string(),
            thread_timestamp.to_string(),
        ));
        self.send_result(channel_id)
    }

    async fn broadcast(&self, message: &str) -> Vec<(String, SlackError)> {
        self.broadcasts.lock().unwrap().push(message.to_string());
        self.broadcast_failures
            .iter()
            .map(|channel| (channel.clone(), failure("not_in_channel")))
            .collect()
    }

    async fn join_channel(&self, channel_id: &str) -> MembershipOutcome {
        self.joined.lock().unwrap().push(channel_id.to_string());
        self.outcome()
    }

    async fn leave_channel(&self, channel_id: &str) -> MembershipOutcome {
        self.left.lock().unwrap().push(channel_id.to_string());
        self.outcome()
    }

    async fn send_rich_message(&self, message: &RichMessage) -> Result<PostedMessage, SlackError> {
        self.rich_messages.lock().unwrap().push(message.clone());
        self.send_result(&message.channel_id)
    }

    async fn get_reaction_list(
        &self,
        _count: u32,
        user_id: &str,
        _channel_id: &str,
    ) -> Result<Vec<SlackMessage>, SlackError> {
        match &self.send_error {
            Some(e) => Err(failure(e)),
            None => Ok(self
                .messages
                .iter()
                .filter(|m| m.user.is_empty() || m.user == user_id)
                .cloned()
                .collect()),
        }
    }

    async fn get_reaction_message_text(
        &self,
        _user_id: &str,
        _channel_id: &str,
        _timestamp: &str,
    ) -> Result<String, SlackError> {
        self.reaction_text
            .clone()
            .ok_or_else(|| SlackError::NotFound("no reaction".to_string()))
    }

    async fn get_conversation_replies(
        &self,
        _channel_id: &str,
        _thread_timestamp: &str,
    ) -> Result<Vec<SlackMessage>, SlackError> {
        match &self.send_error {
            Some(e) => Err(failure(e)),
            None => Ok(self.messages.clone()),
        }
    }
}

#[async_trait]
impl ConversationSource for MockChatClient {
    async fn get_conversations(&self) -> Result<Vec<Conversation>, SlackError> {
        Ok(self.conversations.clone())
    }
}
