//! Membership store.
//!
//! The set of channels the pack has joined. Membership decides whether a
//! channel's traffic is relayed, survives restarts through a [`Backup`], and
//! is changed only by [`Membership::join`] and [`Membership::leave`].

use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::backup::Backup;
use crate::error::BackupError;
use crate::slack::api::{PostMessage, SlackApi};

/// Result of a join or leave request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipOutcome {
    /// Membership changed and was persisted.
    Applied,
    /// Nothing to do; the channel was already in the requested state.
    Skipped,
    /// The platform rejected the change; membership is unchanged.
    Failed(String),
}

impl MembershipOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, MembershipOutcome::Failed(_))
    }
}

/// Concurrency-safe set of joined channel ids.
pub struct Membership {
    api: Arc<dyn SlackApi>,
    backup: Arc<dyn Backup>,
    channels: RwLock<HashSet<String>>,
    /// Serializes join/leave so check, platform call, mutation and save
    /// happen as one step.
    changes: Mutex<()>,
    welcome_message: String,
    farewell_message: String,
}

impl Membership {
    /// Build the store from the channels saved in `backup`.
    pub fn load(
        api: Arc<dyn SlackApi>,
        backup: Arc<dyn Backup>,
        welcome_message: &str,
        farewell_message: &str,
    ) -> Result<Self, BackupError> {
        let channels: HashSet<String> = backup.load()?.into_iter().collect();
        info!(count = channels.len(), "loaded joined channels from backup");

        Ok(Self {
            api,
            backup,
            channels: RwLock::new(channels),
            changes: Mutex::new(()),
            welcome_message: welcome_message.to_string(),
            farewell_message: farewell_message.to_string(),
        })
    }

    /// Whether the pack has joined `channel_id`.
    pub fn is_member(&self, channel_id: &str) -> bool {
        self.read().contains(channel_id)
    }

    /// Snapshot of joined channel ids, in no particular order.
    pub fn members(&self) -> Vec<String> {
        self.read().iter().cloned().collect()
    }

    /// Join `channel_id`, persist membership and greet the channel.
    pub async fn join(&self, channel_id: &str) -> MembershipOutcome {
        let _guard = self.changes.lock().await;

        if self.is_member(channel_id) {
            info!(channel = %channel_id, "already joined, skipping");
            return MembershipOutcome::Skipped;
        }

        let conversation = match self.api.conversation_info(channel_id).await {
            Ok(conversation) => conversation,
            Err(e) => {
                error!(channel = %channel_id, error = %e, "cannot get channel info");
                return MembershipOutcome::Failed(e.to_string());
            }
        };

        if let Err(e) = self.api.join_conversation(&conversation.id).await {
            error!(channel = %channel_id, name = %conversation.name, error = %e, "cannot join channel");
            return MembershipOutcome::Failed(e.to_string());
        }

        self.write().insert(channel_id.to_string());
        self.persist();
        info!(channel = %channel_id, name = %conversation.name, "joined channel");

        let welcome = PostMessage::text(channel_id, &self.welcome_message);
        if let Err(e) = self.api.post_message(&welcome).await {
            warn!(channel = %channel_id, error = %e, "cannot send welcome message");
        }

        MembershipOutcome::Applied
    }

    /// Say goodbye, leave `channel_id` and persist membership.
    pub async fn leave(&self, channel_id: &str) -> MembershipOutcome {
        let _guard = self.changes.lock().await;

        // Slack ignores posts to channels the bot is not in.
        let farewell = PostMessage::text(channel_id, &self.farewell_message);
        if let Err(e) = self.api.post_message(&farewell).await {
            warn!(channel = %channel_id, error = %e, "cannot send farewell message");
        }

        match self.api.leave_conversation(channel_id).await {
            Ok(not_in_channel) => {
                if not_in_channel {
                    info!(channel = %channel_id, "was not in channel");
                }
                let removed = self.write().remove(channel_id);
                if removed {
                    self.persist();
                }
                info!(channel = %channel_id, "left channel");
                MembershipOutcome::Applied
            }
            Err(e) => {
                error!(channel = %channel_id, error = %e, "cannot leave channel");
                MembershipOutcome::Failed(e.to_string())
            }
        }
    }

    /// Save the whole current set. A failed save keeps the in-memory change.
    fn persist(&self) {
        let snapshot = self.members();
        if let Err(e) = self.backup.save(&snapshot) {
            error!(error = %e, "cannot back up joined channels");
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashSet<String>> {
        self.channels.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashSet<String>> {
        self.channels.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::slack::testing::{MemoryBackup, MockSlackApi};

    fn membership(api: Arc<MockSlackApi>, backup: Arc<MemoryBackup>) -> Membership {
        Membership::load(api, backup, "hello", "bye").unwrap()
    }

    #[tokio::test]
    async fn test_join_adds_member_and_persists() {
        let api = Arc::new(MockSlackApi::new());
        let backup = Arc::new(MemoryBackup::default());
        let store = membership(api.clone(), backup.clone());

        assert_eq!(store.join("C1").await, MembershipOutcome::Applied);

        assert!(store.is_member("C1"));
        assert_eq!(backup.saved(), vec!["C1".to_string()]);
        assert_eq!(api.posted_to("C1"), vec!["hello".to_string()]);
        assert_eq!(api.joined(), vec!["C1".to_string()]);
    }

    #[tokio::test]
    async fn test_join_is_idempotent() {
        let api = Arc::new(MockSlackApi::new());
        let backup = Arc::new(MemoryBackup::default());
        let store = membership(api.clone(), backup.clone());

        assert_eq!(store.join("C1").await, MembershipOutcome::Applied);
        assert_eq!(store.join("C1").await, MembershipOutcome::Skipped);
        assert_eq!(store.join("C1").await, MembershipOutcome::Skipped);

        assert_eq!(api.posted_to("C1").len(), 1);
        assert_eq!(backup.save_count(), 1);
        assert_eq!(backup.saved(), vec!["C1".to_string()]);
    }

    #[tokio::test]
    async fn test_concurrent_joins_greet_once() {
        let api = Arc::new(MockSlackApi::new());
        let backup = Arc::new(MemoryBackup::default());
        let store = Arc::new(membership(api.clone(), backup.clone()));

        let joins: Vec<_> = (0..3)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.join("C1").await })
            })
            .collect();
        for join in joins {
            join.await.unwrap();
        }

        assert_eq!(api.posted_to("C1").len(), 1);
        assert_eq!(backup.saved(), vec!["C1".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_lookup_leaves_state_unchanged() {
        let api = Arc::new(MockSlackApi::new().failing_info("channel_not_found"));
        let backup = Arc::new(MemoryBackup::default());
        let store = membership(api.clone(), backup.clone());

        let outcome = store.join("C404").await;

        assert!(outcome.is_failed());
        assert!(!store.is_member("C404"));
        assert_eq!(backup.save_count(), 0);
        assert!(api.posted_to("C404").is_empty());
    }

    #[tokio::test]
    async fn test_failed_join_leaves_state_unchanged() {
        let api = Arc::new(MockSlackApi::new().failing_join("is_archived"));
        let backup = Arc::new(MemoryBackup::default());
        let store = membership(api.clone(), backup.clone());

        assert!(store.join("C1").await.is_failed());
        assert!(!store.is_member("C1"));
        assert_eq!(backup.save_count(), 0);
        assert!(api.posted_to("C1").is_empty());
    }

    #[tokio::test]
    async fn test_join_then_leave() {
        let api = Arc::new(MockSlackApi::new());
        let backup = Arc::new(MemoryBackup::default());
        let store = membership(api.clone(), backup.clone());

        store.join("C1").await;
        store.join("C2").await;
        assert_eq!(store.leave("C1").await, MembershipOutcome::Applied);

        assert!(!store.is_member("C1"));
        assert!(store.is_member("C2"));
        assert_eq!(backup.saved(), vec!["C2".to_string()]);
        assert_eq!(api.posted_to("C1"), vec!["hello".to_string(), "bye".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_leave_keeps_member() {
        let api = Arc::new(MockSlackApi::new().failing_leave("cant_leave_general"));
        let backup = Arc::new(MemoryBackup::with_channels(&["C1"]));
        let store = membership(api.clone(), backup.clone());

        assert!(store.leave("C1").await.is_failed());
        assert!(store.is_member("C1"));
        assert_eq!(backup.save_count(), 0);
        assert_eq!(api.posted_to("C1"), vec!["bye".to_string()]);
    }

    #[tokio::test]
    async fn test_load_from_backup() {
        let api = Arc::new(MockSlackApi::new());
        let backup = Arc::new(MemoryBackup::with_channels(&["C1", "C2"]));
        let store = membership(api, backup);

        let mut members = store.members();
        members.sort();
        assert_eq!(members, vec!["C1".to_string(), "C2".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_save_keeps_in_memory_change() {
        let api = Arc::new(MockSlackApi::new());
        let backup = Arc::new(MemoryBackup::default().failing_saves());
        let store = membership(api, backup);

        assert_eq!(store.join("C1").await, MembershipOutcome::Applied);
        assert!(store.is_member("C1"));
    }
}
