//! Channel info cache.
//!
//! Maps channel names to [`Conversation`]s. The whole map is rebuilt from
//! Slack when it was never filled or is older than the TTL; a failed rebuild
//! keeps serving the previous map.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{error, info};

use crate::error::CacheError;
use crate::slack::ConversationSource;
use crate::types::Conversation;

#[derive(Default)]
struct CacheState {
    conversations: HashMap<String, Conversation>,
    refreshed_at: Option<Instant>,
}

impl CacheState {
    fn is_stale(&self, ttl: Duration) -> bool {
        match self.refreshed_at {
            None => true,
            Some(at) => at.elapsed() > ttl,
        }
    }
}

pub struct ChannelCache {
    source: Arc<dyn ConversationSource>,
    ttl: Duration,
    state: Mutex<CacheState>,
}

impl ChannelCache {
    pub fn new(source: Arc<dyn ConversationSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Look up a channel by name, refreshing the map first when stale.
    pub async fn resolve(&self, channel_name: &str) -> Result<Conversation, CacheError> {
        // Held across the refresh so concurrent callers wait for one fetch.
        let mut state = self.state.lock().await;

        if state.is_stale(self.ttl) {
            match self.source.get_conversations().await {
                Ok(conversations) => {
                    state.conversations = conversations
                        .into_iter()
                        .map(|c| (c.name.clone(), c))
                        .collect();
                    state.refreshed_at = Some(Instant::now());
                    info!(count = state.conversations.len(), "conversation list renewed");
                }
                Err(e) => error!(error = %e, "can't update conversation list cache"),
            }
        }

        state
            .conversations
            .get(channel_name)
            .cloned()
            .ok_or(CacheError::NoSuchChannel)
    }
}
