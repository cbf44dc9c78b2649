//! Event filter and enricher.
//!
//! A single task drains the raw Slack event stream in arrival order, drops
//! traffic from channels the pack has not joined, attaches user profiles and
//! hands the result to the Flyte event forwarder.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::pack::{Event, EventDef};
use crate::slack::api::SlackApi;
use crate::slack::membership::Membership;
use crate::types::{RawEvent, ReactionAdded, ReceivedButtonAction, ReceivedMessage, User};

pub const RECEIVED_MESSAGE: &str = "ReceivedMessage";
pub const REACTION_ADDED: &str = "ReactionAdded";
pub const RECEIVED_BUTTON_ACTION: &str = "ReceivedButtonAction";

/// Event defs emitted by the router.
pub fn event_defs() -> Vec<EventDef> {
    [RECEIVED_MESSAGE, REACTION_ADDED, RECEIVED_BUTTON_ACTION]
        .into_iter()
        .map(EventDef::new)
        .collect()
}

/// Turns raw Slack events into Flyte events.
pub struct EventRouter {
    api: Arc<dyn SlackApi>,
    membership: Arc<Membership>,
    membership_gating: bool,
}

impl EventRouter {
    pub fn new(api: Arc<dyn SlackApi>, membership: Arc<Membership>, membership_gating: bool) -> Self {
        Self {
            api,
            membership,
            membership_gating,
        }
    }

    /// Filter and enrich one event. `None` means the event is dropped.
    pub async fn route(&self, raw: RawEvent) -> Option<Event> {
        debug!(kind = raw.kind(), channel = %raw.channel(), user = %raw.user(), "received slack event");

        if self.membership_gating && raw.is_membership_gated() && !self.membership.is_member(raw.channel()) {
            debug!(kind = raw.kind(), channel = %raw.channel(), "channel not joined, dropping event");
            return None;
        }

        let user = self.lookup_user(raw.user()).await?;

        let event = match raw {
            RawEvent::Message(message) => {
                Event::new(&EventDef::new(RECEIVED_MESSAGE), &ReceivedMessage::new(message, user))
            }
            RawEvent::Reaction(reaction) => {
                let item_user = self.lookup_user(&reaction.item_user).await?;
                Event::new(
                    &EventDef::new(REACTION_ADDED),
                    &ReactionAdded::new(reaction, user, item_user),
                )
            }
            RawEvent::ButtonAction(action) => Event::new(
                &EventDef::new(RECEIVED_BUTTON_ACTION),
                &ReceivedButtonAction::new(action, user),
            ),
        };
        Some(event)
    }

    async fn lookup_user(&self, user_id: &str) -> Option<User> {
        match self.api.user_info(user_id).await {
            Ok(user) => Some(user),
            Err(e) => {
                error!(user = %user_id, error = %e, "cannot get info about user, dropping event");
                None
            }
        }
    }

    /// Drain `raw` until the sender side closes or the output is gone.
    pub async fn run(self, mut raw: mpsc::Receiver<RawEvent>, out: mpsc::UnboundedSender<Event>) {
        info!(membership_gating = self.membership_gating, "event router started");
        while let Some(event) = raw.recv().await {
            if let Some(event) = self.route(event).await {
                if out.send(event).is_err() {
                    info!("event consumer gone, router exiting");
                    return;
                }
            }
        }
        info!("slack event stream closed, router exiting");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slack::testing::{MemoryBackup, MockSlackApi};
    use crate::types::{ButtonActionEvent, MessageEvent, ReactionEvent, ReactionItem};

    fn router(api: MockSlackApi, joined: &[&str], gating: bool) -> (EventRouter, Arc<MockSlackApi>) {
        let api = Arc::new(api);
        let backup = Arc::new(MemoryBackup::with_channels(joined));
        let membership = Arc::new(Membership::load(api.clone(), backup, "hi", "bye").unwrap());
        (EventRouter::new(api.clone(), membership, gating), api)
    }

    fn message(channel: &str, user: &str, text: &str) -> RawEvent {
        RawEvent::Message(MessageEvent {
            channel: channel.into(),
            user: user.into(),
            text: text.into(),
            timestamp: "1.1".into(),
            ..Default::default()
        })
    }

    fn reaction(channel: &str) -> RawEvent {
        RawEvent::Reaction(ReactionEvent {
            user: "U1".into(),
            item_user: "U2".into(),
            item: ReactionItem {
                item_type: "message".into(),
                timestamp: "now".into(),
                channel: channel.into(),
            },
            reaction: "thumbsup".into(),
            event_timestamp: "2.2".into(),
            thread_timestamp: None,
        })
    }

    #[tokio::test]
    async fn test_message_from_joined_channel_is_enriched() {
        let (router, _) = router(MockSlackApi::new(), &["C1"], true);

        let event = router.route(message("C1", "U1", "hello")).await.unwrap();

        assert_eq!(event.name(), "ReceivedMessage");
        assert_eq!(event.payload["channelId"], "C1");
        assert_eq!(event.payload["message"], "hello");
        assert_eq!(event.payload["user"]["id"], "U1");
        assert_eq!(event.payload["user"]["name"], "name-U1");
        assert_eq!(event.payload["threadTimestamp"], "1.1");
    }

    #[tokio::test]
    async fn test_unjoined_channel_is_dropped() {
        let (router, api) = router(MockSlackApi::new(), &["C1"], true);

        assert!(router.route(message("C9", "U1", "hello")).await.is_none());
        assert!(router.route(reaction("C9")).await.is_none());
        assert!(api.user_lookups().is_empty());
    }

    #[tokio::test]
    async fn test_gating_disabled_forwards_everything() {
        let (router, _) = router(MockSlackApi::new(), &[], false);

        let event = router.route(message("C9", "U1", "hello")).await.unwrap();
        assert_eq!(event.payload["channelId"], "C9");
    }

    #[tokio::test]
    async fn test_button_actions_bypass_gating() {
        let (router, _) = router(MockSlackApi::new(), &[], true);
        let raw = RawEvent::ButtonAction(ButtonActionEvent {
            channel: "C9".into(),
            user: "U1".into(),
            callback_id: "deploy".into(),
            action_name: "approve".into(),
            value: "yes".into(),
            message_timestamp: "3.3".into(),
            thread_timestamp: None,
            response_url: "https://hooks.slack.com/x".into(),
        });

        let event = router.route(raw).await.unwrap();
        assert_eq!(event.name(), "ReceivedButtonAction");
        assert_eq!(event.payload["callbackId"], "deploy");
        assert_eq!(event.payload["threadTimestamp"], "3.3");
    }

    #[tokio::test]
    async fn test_failed_user_lookup_drops_event() {
        let (router, _) = router(MockSlackApi::new().unknown_user("U404"), &["C1"], true);

        assert!(router.route(message("C1", "U404", "hello")).await.is_none());
    }

    #[tokio::test]
    async fn test_reaction_resolves_item_user_and_thread_fallback() {
        let (router, api) = router(MockSlackApi::new(), &["C1"], true);

        let event = router.route(reaction("C1")).await.unwrap();

        assert_eq!(event.name(), "ReactionAdded");
        assert_eq!(event.payload["threadTimestamp"], "now");
        assert_eq!(event.payload["itemUser"]["id"], "U2");
        assert_eq!(api.user_lookups(), vec!["U1".to_string(), "U2".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_item_user_lookup_drops_reaction() {
        let (router, _) = router(MockSlackApi::new().unknown_user("U2"), &["C1"], true);

        assert!(router.route(reaction("C1")).await.is_none());
    }

    #[tokio::test]
    async fn test_run_preserves_order() {
        let (router, _) = router(MockSlackApi::new(), &["C1"], true);
        let (raw_tx, raw_rx) = mpsc::channel(16);
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();

        for (channel, text) in [("C1", "one"), ("C9", "dropped"), ("C1", "two"), ("C1", "three")] {
            raw_tx.send(message(channel, "U1", text)).await.unwrap();
        }
        drop(raw_tx);
        router.run(raw_rx, out_tx).await;

        let mut texts = Vec::new();
        while let Some(event) = out_rx.recv().await {
            texts.push(event.payload["message"].as_str().unwrap().to_string());
        }
        assert_eq!(texts, vec!["one", "two", "three"]);
    }
}
