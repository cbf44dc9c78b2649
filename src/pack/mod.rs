//! Flyte pack model.
//!
//! A pack registers named commands with Flyte, answers the actions Flyte
//! dispatches to them and publishes events of its own. Everything that
//! crosses the bus is an [`Event`]: an event-def name plus a JSON payload.

pub mod client;

pub use client::PackClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::error::PackError;

/// Event name Flyte treats as a caller-side configuration error.
pub const FATAL_EVENT: &str = "FATAL";

/// Name of an event type a pack can emit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventDef {
    pub name: String,
}

impl EventDef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

/// An event bound for Flyte.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub event_def: EventDef,
    pub payload: Value,
}

impl Event {
    /// Build an event from any serializable payload.
    pub fn new<T: Serialize>(event_def: &EventDef, payload: &T) -> Self {
        match serde_json::to_value(payload) {
            Ok(payload) => Self {
                event_def: event_def.clone(),
                payload,
            },
            Err(e) => {
                error!(event = %event_def.name, error = %e, "cannot serialize event payload");
                Self::fatal(format!("cannot serialize {} payload: {}", event_def.name, e))
            }
        }
    }

    /// Event signalling input Flyte should never have sent.
    pub fn fatal(reason: impl Into<String>) -> Self {
        Self {
            event_def: EventDef::new(FATAL_EVENT),
            payload: Value::String(reason.into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.event_def.name
    }

    pub fn is_fatal(&self) -> bool {
        self.event_def.name == FATAL_EVENT
    }
}

/// The success/failure pair a command answers with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeEvents {
    pub success: EventDef,
    pub failure: EventDef,
}

impl OutcomeEvents {
    pub fn new(success: &str, failure: &str) -> Self {
        Self {
            success: EventDef::new(success),
            failure: EventDef::new(failure),
        }
    }

    pub fn defs(&self) -> Vec<EventDef> {
        vec![self.success.clone(), self.failure.clone()]
    }
}

/// Handles the input of one command invocation.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Turn raw JSON input into exactly one event. Never fails; problems
    /// become failure or fatal events.
    async fn handle(&self, input: &[u8]) -> Event;
}

/// A command registered with Flyte.
#[derive(Clone)]
pub struct Command {
    pub name: String,
    pub output_events: Vec<EventDef>,
    pub handler: Arc<dyn CommandHandler>,
}

impl Command {
    pub fn new(name: &str, output_events: Vec<EventDef>, handler: Arc<dyn CommandHandler>) -> Self {
        Self {
            name: name.to_string(),
            output_events,
            handler,
        }
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("output_events", &self.output_events)
            .finish()
    }
}

/// Everything Flyte needs to know about the pack.
#[derive(Debug, Clone)]
pub struct PackDef {
    pub name: String,
    pub help_url: Option<String>,
    pub commands: Vec<Command>,
    /// Events the pack emits on its own, outside any command.
    pub event_defs: Vec<EventDef>,
}

impl PackDef {
    pub fn command(&self, name: &str) -> Option<&Command> {
        self.commands.iter().find(|c| c.name == name)
    }
}

/// Accepts events published by the pack.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn send_event(&self, event: &Event) -> Result<(), PackError>;
}

/// Drain `events` into `sink` until every sender is gone. Send failures are
/// logged and the event is dropped.
pub async fn forward_events(mut events: mpsc::UnboundedReceiver<Event>, sink: Arc<dyn EventSink>) {
    while let Some(event) = events.recv().await {
        debug!(event = %event.name(), "forwarding event to flyte");
        if let Err(e) = sink.send_event(&event).await {
            error!(event = %event.name(), error = %e, "cannot send event to flyte");
        }
    }
    debug!("event stream closed, forwarder exiting");
}
