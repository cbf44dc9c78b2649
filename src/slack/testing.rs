//! Hand-written Slack and backup doubles shared by unit tests.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::backup::Backup;
use crate::error::{BackupError, SlackError};
use crate::slack::api::{
    ConversationPage, PostMessage, PostedMessage, ReactedMessage, SlackApi, SlackMessage,
};
use crate::types::{Conversation, User};

fn api_error(method: &str, error: &str) -> SlackError {
    SlackError::Api {
        method: method.to_string(),
        error: error.to_string(),
    }
}

/// Records every call and answers from canned data.
#[derive(Default)]
pub struct MockSlackApi {
    info_error: Option<String>,
    join_error: Option<String>,
    leave_error: Option<String>,
    post_error: Option<String>,
    list_error: Option<String>,
    unknown_users: HashSet<String>,
    pages: Vec<ConversationPage>,
    replies: Vec<SlackMessage>,
    reacted: Vec<ReactedMessage>,
    posts: Mutex<Vec<PostMessage>>,
    joined: Mutex<Vec<String>>,
    left: Mutex<Vec<String>>,
    user_lookups: Mutex<Vec<String>>,
    list_calls: AtomicUsize,
}

impl MockSlackApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_info(mut self, error: &str) -> Self {
        self.info_error = Some(error.to_string());
        self
    }

    pub fn failing_join(mut self, error: &str) -> Self {
        self.join_error = Some(error.to_string());
        self
    }

    pub fn failing_leave(mut self, error: &str) -> Self {
        self.leave_error = Some(error.to_string());
        self
    }

    pub fn failing_post(mut self, error: &str) -> Self {
        self.post_error = Some(error.to_string());
        self
    }

    pub fn failing_list(mut self, error: &str) -> Self {
        self.list_error = Some(error.to_string());
        self
    }

    pub fn unknown_user(mut self, user_id: &str) -> Self {
        self.unknown_users.insert(user_id.to_string());
        self
    }

    pub fn with_pages(mut self, pages: Vec<ConversationPage>) -> Self {
        self.pages = pages;
        self
    }

    pub fn with_replies(mut self, replies: Vec<SlackMessage>) -> Self {
        self.replies = replies;
        self
    }

    pub fn with_reacted(mut self, reacted: Vec<ReactedMessage>) -> Self {
        self.reacted = reacted;
        self
    }

    pub fn posts(&self) -> Vec<PostMessage> {
        self.posts.lock().unwrap().clone()
    }

    /// Texts posted to `channel`, in order.
    pub fn posted_to(&self, channel: &str) -> Vec<String> {
        self.posts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.channel == channel)
            .map(|p| p.text.clone())
            .collect()
    }

    pub fn joined(&self) -> Vec<String> {
        self.joined.lock().unwrap().clone()
    }

    pub fn left(&self) -> Vec<String> {
        self.left.lock().unwrap().clone()
    }

    pub fn user_lookups(&self) -> Vec<String> {
        self.user_lookups.lock().unwrap().clone()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

/// Profile returned for every known user id.
pub fn user(id: &str) -> User {
    User {
        id: id.to_string(),
        name: format!("name-{}", id),
        email: format!("{}@example.com", id),
        ..Default::default()
    }
}

#[async_trait]
impl SlackApi for MockSlackApi {
    async fn user_info(&self, user_id: &str) -> Result<User, SlackError> {
        self.user_lookups.lock().unwrap().push(user_id.to_string());
        if self.unknown_users.contains(user_id) {
            return Err(api_error("users.info", "user_not_found"));
        }
        Ok(user(user_id))
    }

    async fn conversation_info(&self, channel_id: &str) -> Result<Conversation, SlackError> {
        match &self.info_error {
            Some(e) => Err(api_error("conversations.info", e)),
            None => Ok(Conversation::new(channel_id, &format!("name-{}", channel_id), "")),
        }
    }

    async fn join_conversation(&self, channel_id: &str) -> Result<Conversation, SlackError> {
        if let Some(e) = &self.join_error {
            return Err(api_error("conversations.join", e));
        }
        self.joined.lock().unwrap().push(channel_id.to_string());
        Ok(Conversation::new(channel_id, &format!("name-{}", channel_id), ""))
    }

    async fn leave_conversation(&self, channel_id: &str) -> Result<bool, SlackError> {
        if let Some(e) = &self.leave_error {
            return Err(api_error("conversations.leave", e));
        }
        self.left.lock().unwrap().push(channel_id.to_string());
        Ok(false)
    }

    async fn post_message(&self, message: &PostMessage) -> Result<PostedMessage, SlackError> {
        if let Some(e) = &self.post_error {
            return Err(api_error("chat.postMessage", e));
        }
        let mut posts = self.posts.lock().unwrap();
        posts.push(message.clone());
        Ok(PostedMessage {
            channel: message.channel.clone(),
            ts: format!("{}.000", posts.len()),
        })
    }

    async fn list_conversations(&self, cursor: &str) -> Result<ConversationPage, SlackError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = &self.list_error {
            return Err(api_error("conversations.list", e));
        }
        let index: usize = if cursor.is_empty() {
            0
        } else {
            cursor.parse().unwrap()
        };
        Ok(self.pages.get(index).cloned().unwrap_or_default())
    }

    async fn conversation_replies(
        &self,
        _channel_id: &str,
        _thread_ts: &str,
    ) -> Result<Vec<SlackMessage>, SlackError> {
        if self.replies.is_empty() {
            return Err(api_error("conversations.replies", "thread_not_found"));
        }
        Ok(self.replies.clone())
    }

    async fn get_reactions(&self, channel_id: &str, ts: &str) -> Result<ReactedMessage, SlackError> {
        self.reacted
            .iter()
            .find(|r| r.channel == channel_id && r.message.ts == ts)
            .cloned()
            .ok_or_else(|| api_error("reactions.get", "message_not_found"))
    }

    async fn list_reactions(&self, user_id: &str, count: u32) -> Result<Vec<ReactedMessage>, SlackError> {
        if self.unknown_users.contains(user_id) {
            return Err(api_error("reactions.list", "user_not_found"));
        }
        Ok(self.reacted.iter().take(count as usize).cloned().collect())
    }
}

/// In-memory [`Backup`].
#[derive(Default)]
pub struct MemoryBackup {
    channels: Mutex<Vec<String>>,
    saves: AtomicUsize,
    fail_saves: bool,
}

impl MemoryBackup {
    pub fn with_channels(channels: &[&str]) -> Self {
        Self {
            channels: Mutex::new(channels.iter().map(|c| c.to_string()).collect()),
            ..Default::default()
        }
    }

    pub fn failing_saves(mut self) -> Self {
        self.fail_saves = true;
        self
    }

    /// Last saved ids, sorted.
    pub fn saved(&self) -> Vec<String> {
        let mut channels = self.channels.lock().unwrap().clone();
        channels.sort();
        channels
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl Backup for MemoryBackup {
    fn load(&self) -> Result<Vec<String>, BackupError> {
        Ok(self.channels.lock().unwrap().clone())
    }

    fn save(&self, channel_ids: &[String]) -> Result<(), BackupError> {
        if self.fail_saves {
            return Err(BackupError::Write {
                path: "memory".into(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            });
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.channels.lock().unwrap() = channel_ids.to_vec();
        Ok(())
    }
}
