//! Slack Socket Mode connection.
//!
//! Opens a WebSocket through `apps.connections.open`, acknowledges every
//! envelope and turns the events the pack relays into [`RawEvent`]s. Lost
//! connections are re-established with exponential backoff.

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

use crate::common::RetryPolicy;
use crate::error::SlackError;
use crate::slack::api::WebApiClient;
use crate::slack::interaction::InteractionCallback;
use crate::types::{MessageEvent, RawEvent, ReactionEvent, ReactionItem, Reply};

/// One decoded Socket Mode frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Hello,
    /// Slack is about to close the connection.
    Disconnect(String),
    Envelope {
        envelope_id: Option<String>,
        event: Option<RawEvent>,
    },
}

#[derive(Deserialize)]
struct WireFrame {
    #[serde(rename = "type")]
    frame_type: String,
    #[serde(default)]
    envelope_id: Option<String>,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    payload: Value,
}

#[derive(Deserialize)]
struct EventCallback {
    event: WireEvent,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum WireEvent {
    #[serde(rename = "message")]
    Message(WireMessage),
    #[serde(rename = "reaction_added")]
    ReactionAdded(WireReaction),
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct WireMessage {
    #[serde(default)]
    subtype: Option<String>,
    #[serde(default)]
    channel: String,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    text: String,
    #[serde(default)]
    ts: String,
    #[serde(default)]
    thread_ts: Option<String>,
    #[serde(default)]
    reply_count: u32,
    #[serde(default)]
    replies: Vec<Reply>,
}

#[derive(Deserialize)]
struct WireItem {
    #[serde(rename = "type", default)]
    item_type: String,
    #[serde(default)]
    channel: String,
    #[serde(default)]
    ts: String,
}

#[derive(Deserialize)]
struct WireReaction {
    user: String,
    reaction: String,
    #[serde(default)]
    item_user: String,
    item: WireItem,
    #[serde(default)]
    event_ts: String,
}

impl WireMessage {
    /// Only plain user messages are relayed; edits, deletions and bot posts
    /// carry a subtype or no user.
    fn into_raw_event(self) -> Option<RawEvent> {
        if self.subtype.is_some() {
            return None;
        }
        let user = self.user.filter(|u| !u.is_empty())?;
        Some(RawEvent::Message(MessageEvent {
            channel: self.channel,
            user,
            text: self.text,
            timestamp: self.ts,
            thread_timestamp: self.thread_ts,
            reply_count: self.reply_count,
            replies: self.replies,
        }))
    }
}

impl From<WireReaction> for RawEvent {
    fn from(r: WireReaction) -> Self {
        RawEvent::Reaction(ReactionEvent {
            user: r.user,
            item_user: r.item_user,
            item: ReactionItem {
                item_type: r.item.item_type,
                timestamp: r.item.ts,
                channel: r.item.channel,
            },
            reaction: r.reaction,
            event_timestamp: r.event_ts,
            thread_timestamp: None,
        })
    }
}

/// Decode a text frame.
pub fn parse_frame(text: &str) -> Result<Frame, serde_json::Error> {
    let frame: WireFrame = serde_json::from_str(text)?;

    let decoded = match frame.frame_type.as_str() {
        "hello" => return Ok(Frame::Hello),
        "disconnect" => return Ok(Frame::Disconnect(frame.reason)),
        "events_api" => serde_json::from_value::<EventCallback>(frame.payload).map(|callback| {
            match callback.event {
                WireEvent::Message(message) => message.into_raw_event(),
                WireEvent::ReactionAdded(reaction) => Some(reaction.into()),
                WireEvent::Other => None,
            }
        }),
        "interactive" => {
            serde_json::from_value::<InteractionCallback>(frame.payload).map(|callback| callback.to_raw_event())
        }
        _ => Ok(None),
    };

    // The envelope is acked even when its payload is unusable, or Slack
    // keeps redelivering it.
    let event = decoded.unwrap_or_else(|e| {
        warn!(
            error = %e,
            frame_type = %frame.frame_type,
            envelope_id = ?frame.envelope_id,
            "cannot decode socket mode payload"
        );
        None
    });

    Ok(Frame::Envelope {
        envelope_id: frame.envelope_id,
        event,
    })
}

fn ack(envelope_id: &str) -> WsMessage {
    WsMessage::Text(serde_json::json!({ "envelope_id": envelope_id }).to_string())
}

enum SessionEnd {
    /// Slack closed the socket; reconnect.
    Closed,
    /// Nobody is reading events anymore.
    ReceiverGone,
}

/// Socket Mode reader feeding the event router.
pub struct SocketModeClient {
    api: WebApiClient,
    policy: RetryPolicy,
}

impl SocketModeClient {
    pub fn new(api: WebApiClient) -> Self {
        Self {
            api,
            policy: RetryPolicy::reconnect(),
        }
    }

    /// Stream events into `events` until its receiver is dropped.
    pub async fn run(self, events: mpsc::Sender<RawEvent>) {
        let mut failures: u32 = 0;
        loop {
            match self.session(&events).await {
                Ok(SessionEnd::ReceiverGone) => {
                    info!("event receiver dropped, closing slack socket");
                    return;
                }
                Ok(SessionEnd::Closed) => {
                    failures = 0;
                    info!("slack socket closed, reconnecting");
                }
                Err(e) => {
                    error!(attempt = failures + 1, error = %e, "slack socket failed");
                    failures = failures.saturating_add(1);
                }
            }

            let delay = self.policy.delay_for_attempt(failures);
            debug!(delay_ms = delay.as_millis() as u64, "waiting before reconnect");
            tokio::time::sleep(delay).await;
        }
    }

    async fn session(&self, events: &mpsc::Sender<RawEvent>) -> Result<SessionEnd, SlackError> {
        let url = self.api.open_connection().await?;
        let (stream, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| SlackError::ConnectionFailed(e.to_string()))?;
        info!("connected to slack socket mode");

        let (mut write, mut read) = stream.split();
        while let Some(message) = read.next().await {
            let message = message.map_err(|e| SlackError::ConnectionFailed(e.to_string()))?;
            match message {
                WsMessage::Text(text) => match parse_frame(&text) {
                    Ok(Frame::Hello) => debug!("socket mode hello"),
                    Ok(Frame::Disconnect(reason)) => {
                        info!(reason = %reason, "slack requested disconnect");
                        return Ok(SessionEnd::Closed);
                    }
                    Ok(Frame::Envelope { envelope_id, event }) => {
                        if let Some(id) = envelope_id {
                            write
                                .send(ack(&id))
                                .await
                                .map_err(|e| SlackError::ConnectionFailed(e.to_string()))?;
                        }
                        if let Some(event) = event {
                            if events.send(event).await.is_err() {
                                return Ok(SessionEnd::ReceiverGone);
                            }
                        }
                    }
                    Err(e) => warn!(error = %e, "cannot decode socket mode frame"),
                },
                WsMessage::Ping(data) => {
                    write
                        .send(WsMessage::Pong(data))
                        .await
                        .map_err(|e| SlackError::ConnectionFailed(e.to_string()))?;
                }
                WsMessage::Close(_) => return Ok(SessionEnd::Closed),
                _ => {}
            }
        }
        Ok(SessionEnd::Closed)
    }
}
