//! Flyte API client.
//!
//! Registers the pack, polls for actions, posts action results and publishes
//! pack events. Registration is retried with backoff; everything else is a
//! single attempt.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::{Event, EventDef, EventSink, PackDef};
use crate::common::{with_retry, RetryPolicy};
use crate::error::PackError;

/// Attempts made to register before giving up.
const REGISTER_RETRIES: u32 = 5;

/// Hypermedia link as returned by Flyte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
    pub rel: String,
}

/// Links the pack uses after registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackLinks {
    pub take_action: String,
    pub event: String,
}

/// An action Flyte wants the pack to execute.
#[derive(Debug, Clone, Deserialize)]
pub struct Action {
    pub command: String,
    #[serde(default)]
    pub input: Value,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl Action {
    fn result_link(&self) -> Option<&str> {
        find_link(&self.links, "actionResult")
    }
}

#[derive(Serialize)]
struct CommandRegistration<'a> {
    name: &'a str,
    events: Vec<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Registration<'a> {
    name: &'a str,
    commands: Vec<CommandRegistration<'a>>,
    event_defs: Vec<EventDef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    links: Vec<Link>,
}

#[derive(Deserialize)]
struct RegistrationResponse {
    #[serde(default)]
    links: Vec<Link>,
}

#[derive(Serialize)]
struct EventBody<'a> {
    event: &'a str,
    payload: &'a Value,
}

impl<'a> From<&'a Event> for EventBody<'a> {
    fn from(event: &'a Event) -> Self {
        Self {
            event: event.name(),
            payload: &event.payload,
        }
    }
}

/// Find a link by relation. Flyte rels are URLs whose last path or fragment
/// segment names the relation.
fn find_link<'a>(links: &'a [Link], rel: &str) -> Option<&'a str> {
    links
        .iter()
        .find(|l| {
            l.rel == rel
                || l.rel.ends_with(&format!("/{}", rel))
                || l.rel.ends_with(&format!("#{}", rel))
        })
        .map(|l| l.href.as_str())
}

/// Client for one pack registered against a Flyte API.
pub struct PackClient {
    http: reqwest::Client,
    api: String,
    pack_def: PackDef,
    poll_interval: Duration,
    links: RwLock<Option<PackLinks>>,
}

impl PackClient {
    pub fn new(api: &str, pack_def: PackDef, poll_interval: Duration) -> Result<Self, PackError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PackError::Request {
                url: api.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            http,
            api: api.trim_end_matches('/').to_string(),
            pack_def,
            poll_interval,
            links: RwLock::new(None),
        })
    }

    pub fn pack_def(&self) -> &PackDef {
        &self.pack_def
    }

    /// Register the pack, retrying transient failures.
    pub async fn register(&self) -> Result<(), PackError> {
        let policy = RetryPolicy::new(REGISTER_RETRIES);
        let links = with_retry(&policy, PackError::is_transient, || self.register_once()).await?;

        info!(pack = %self.pack_def.name, take_action = %links.take_action, "registered pack with flyte");
        *self.links.write().unwrap_or_else(|p| p.into_inner()) = Some(links);
        Ok(())
    }

    async fn register_once(&self) -> Result<PackLinks, PackError> {
        let url = format!("{}/v1/packs", self.api);
        let response = self.post(&url, &self.registration()).await?;
        let body: RegistrationResponse = decode(&url, response).await?;

        let take_action = find_link(&body.links, "takeAction").ok_or(PackError::MissingLink("takeAction"))?;
        let event = find_link(&body.links, "event").ok_or(PackError::MissingLink("event"))?;

        Ok(PackLinks {
            take_action: take_action.to_string(),
            event: event.to_string(),
        })
    }

    fn registration(&self) -> Registration<'_> {
        let commands = self
            .pack_def
            .commands
            .iter()
            .map(|c| CommandRegistration {
                name: &c.name,
                events: c.output_events.iter().map(|e| e.name.as_str()).collect(),
            })
            .collect();

        let mut event_defs = self.pack_def.event_defs.clone();
        for def in self.pack_def.commands.iter().flat_map(|c| &c.output_events) {
            if !event_defs.contains(def) {
                event_defs.push(def.clone());
            }
        }

        let links = self
            .pack_def
            .help_url
            .iter()
            .map(|href| Link {
                href: href.clone(),
                rel: "help".to_string(),
            })
            .collect();

        Registration {
            name: &self.pack_def.name,
            commands,
            event_defs,
            links,
        }
    }

    fn links(&self) -> Result<PackLinks, PackError> {
        self.links
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
            .ok_or(PackError::NotRegistered)
    }

    /// Ask Flyte for the next action. `None` when there is nothing to do.
    pub async fn take_action(&self) -> Result<Option<Action>, PackError> {
        let url = self.links()?.take_action;
        let response = self.post(&url, &Value::Null).await?;

        if response.status() == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }
        decode(&url, response).await.map(Some)
    }

    /// Post the event answering `action`.
    pub async fn complete_action(&self, action: &Action, event: &Event) -> Result<(), PackError> {
        let url = action
            .result_link()
            .ok_or(PackError::MissingLink("actionResult"))?;
        self.post(url, &EventBody::from(event)).await?;
        Ok(())
    }

    /// Run the handler for `action` and report its event back to Flyte.
    pub async fn handle_action(&self, action: Action) {
        let event = match self.pack_def.command(&action.command) {
            Some(command) => {
                debug!(command = %action.command, "handling action");
                // Re-encoding a parsed JSON value cannot fail.
                let input = serde_json::to_vec(&action.input).unwrap_or_default();
                command.handler.handle(&input).await
            }
            None => {
                warn!(command = %action.command, "action for unknown command");
                Event::fatal(format!("unknown command: {}", action.command))
            }
        };

        info!(command = %action.command, event = %event.name(), "action completed");
        if let Err(e) = self.complete_action(&action, &event).await {
            error!(command = %action.command, error = %e, "cannot post action result");
        }
    }

    /// Poll for actions forever, each one handled on its own task.
    pub async fn run(self: Arc<Self>) {
        loop {
            match self.take_action().await {
                Ok(Some(action)) => {
                    let client = self.clone();
                    tokio::spawn(async move { client.handle_action(action).await });
                    continue;
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "cannot take action from flyte"),
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn post<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<reqwest::Response, PackError> {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| PackError::Request {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PackError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

async fn decode<T: serde::de::DeserializeOwned>(url: &str, response: reqwest::Response) -> Result<T, PackError> {
    response.json().await.map_err(|e| PackError::Decode {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl EventSink for PackClient {
    async fn send_event(&self, event: &Event) -> Result<(), PackError> {
        let url = self.links()?.event;
        self.post(&url, &EventBody::from(event)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pack::{Command, CommandHandler, OutcomeEvents};
    use axum::{
        extract::State,
        http::StatusCode,
        response::{IntoResponse, Response},
        routing::post,
        Json, Router,
    };
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct MockFlyte {
        base: String,
        registrations: Arc<Mutex<Vec<Value>>>,
        events: Arc<Mutex<Vec<Value>>>,
        results: Arc<Mutex<Vec<Value>>>,
        actions: Arc<Mutex<Vec<Value>>>,
    }

    async fn register(State(flyte): State<MockFlyte>, Json(body): Json<Value>) -> Response {
        flyte.registrations.lock().unwrap().push(body);
        let links = json!({
            "id": "Slack",
            "links": [
                {"href": format!("{}/v1/packs/Slack/actions/take", flyte.base), "rel": "http://flyte/swagger#!/action/takeAction"},
                {"href": format!("{}/v1/packs/Slack/events", flyte.base), "rel": "http://flyte/swagger#/event"}
            ]
        });
        (StatusCode::CREATED, Json(links)).into_response()
    }

    async fn take(State(flyte): State<MockFlyte>) -> Response {
        match flyte.actions.lock().unwrap().pop() {
            Some(action) => Json(action).into_response(),
            None => StatusCode::NO_CONTENT.into_response(),
        }
    }

    async fn event(State(flyte): State<MockFlyte>, Json(body): Json<Value>) -> StatusCode {
        flyte.events.lock().unwrap().push(body);
        StatusCode::ACCEPTED
    }

    async fn result(State(flyte): State<MockFlyte>, Json(body): Json<Value>) -> StatusCode {
        flyte.results.lock().unwrap().push(body);
        StatusCode::ACCEPTED
    }

    async fn serve() -> MockFlyte {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let flyte = MockFlyte {
            base: format!("http://{}", listener.local_addr().unwrap()),
            ..Default::default()
        };
        let app = Router::new()
            .route("/v1/packs", post(register))
            .route("/v1/packs/Slack/actions/take", post(take))
            .route("/v1/packs/Slack/events", post(event))
            .route("/v1/actions/:id/result", post(result))
            .with_state(flyte.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        flyte
    }

    struct EchoHandler;

    #[async_trait]
    impl CommandHandler for EchoHandler {
        async fn handle(&self, input: &[u8]) -> Event {
            match serde_json::from_slice::<Value>(input) {
                Ok(value) => Event::new(&EventDef::new("Echoed"), &value),
                Err(e) => Event::fatal(format!("input is not valid: {}", e)),
            }
        }
    }

    fn pack_def() -> PackDef {
        let outcome = OutcomeEvents::new("Echoed", "EchoFailed");
        PackDef {
            name: "Slack".to_string(),
            help_url: Some("https://example.com/README.md".to_string()),
            commands: vec![Command::new("Echo", outcome.defs(), Arc::new(EchoHandler))],
            event_defs: vec![EventDef::new("ReceivedMessage"), EventDef::new("Echoed")],
        }
    }

    fn action(flyte: &MockFlyte, command: &str, input: Value) -> Action {
        Action {
            command: command.to_string(),
            input,
            links: vec![Link {
                href: format!("{}/v1/actions/1/result", flyte.base),
                rel: "http://flyte/swagger#!/action/actionResult".to_string(),
            }],
        }
    }

    #[test]
    fn test_find_link() {
        let links = vec![
            Link { href: "a".into(), rel: "http://x/swagger#!/action/takeAction".into() },
            Link { href: "b".into(), rel: "http://x/swagger#/event".into() },
            Link { href: "c".into(), rel: "help".into() },
        ];
        assert_eq!(find_link(&links, "takeAction"), Some("a"));
        assert_eq!(find_link(&links, "event"), Some("b"));
        assert_eq!(find_link(&links, "help"), Some("c"));
        assert_eq!(find_link(&links, "actionResult"), None);
    }

    #[tokio::test]
    async fn test_register_sends_pack_definition() {
        let flyte = serve().await;
        let client = PackClient::new(&flyte.base, pack_def(), Duration::from_millis(10)).unwrap();

        client.register().await.unwrap();

        let registrations = flyte.registrations.lock().unwrap().clone();
        assert_eq!(registrations.len(), 1);
        let body = &registrations[0];
        assert_eq!(body["name"], "Slack");
        assert_eq!(body["commands"][0]["name"], "Echo");
        assert_eq!(body["commands"][0]["events"], json!(["Echoed", "EchoFailed"]));
        assert_eq!(
            body["eventDefs"],
            json!([{"name": "ReceivedMessage"}, {"name": "Echoed"}, {"name": "EchoFailed"}])
        );
        assert_eq!(body["links"][0]["rel"], "help");
        assert!(client.links().unwrap().take_action.ends_with("/actions/take"));
    }

    #[tokio::test]
    async fn test_send_event_requires_registration() {
        let flyte = serve().await;
        let client = PackClient::new(&flyte.base, pack_def(), Duration::from_millis(10)).unwrap();

        let err = client.send_event(&Event::fatal("x")).await.unwrap_err();
        assert!(matches!(err, PackError::NotRegistered));
    }

    #[tokio::test]
    async fn test_send_event() {
        let flyte = serve().await;
        let client = PackClient::new(&flyte.base, pack_def(), Duration::from_millis(10)).unwrap();
        client.register().await.unwrap();

        let event = Event::new(&EventDef::new("ReceivedMessage"), &json!({"channelId": "C1"}));
        client.send_event(&event).await.unwrap();

        let events = flyte.events.lock().unwrap().clone();
        assert_eq!(events, vec![json!({"event": "ReceivedMessage", "payload": {"channelId": "C1"}})]);
    }

    #[tokio::test]
    async fn test_take_action_idle_and_pending() {
        let flyte = serve().await;
        let client = PackClient::new(&flyte.base, pack_def(), Duration::from_millis(10)).unwrap();
        client.register().await.unwrap();

        assert!(client.take_action().await.unwrap().is_none());

        flyte
            .actions
            .lock()
            .unwrap()
            .push(json!({"command": "Echo", "input": {"a": 1}, "links": []}));
        let action = client.take_action().await.unwrap().unwrap();
        assert_eq!(action.command, "Echo");
        assert_eq!(action.input, json!({"a": 1}));
    }

    #[tokio::test]
    async fn test_handle_action_posts_result() {
        let flyte = serve().await;
        let client = PackClient::new(&flyte.base, pack_def(), Duration::from_millis(10)).unwrap();
        client.register().await.unwrap();

        client.handle_action(action(&flyte, "Echo", json!({"a": 1}))).await;

        let results = flyte.results.lock().unwrap().clone();
        assert_eq!(results, vec![json!({"event": "Echoed", "payload": {"a": 1}})]);
    }

    #[tokio::test]
    async fn test_unknown_command_is_fatal() {
        let flyte = serve().await;
        let client = PackClient::new(&flyte.base, pack_def(), Duration::from_millis(10)).unwrap();
        client.register().await.unwrap();

        client.handle_action(action(&flyte, "Nope", Value::Null)).await;

        let results = flyte.results.lock().unwrap().clone();
        assert_eq!(results[0]["event"], "FATAL");
        assert_eq!(results[0]["payload"], "unknown command: Nope");
    }

    #[tokio::test]
    async fn test_run_polls_and_dispatches() {
        let flyte = serve().await;
        let client = Arc::new(PackClient::new(&flyte.base, pack_def(), Duration::from_millis(10)).unwrap());
        client.register().await.unwrap();

        let pending = action(&flyte, "Echo", json!("hi"));
        flyte.actions.lock().unwrap().push(json!({
            "command": pending.command,
            "input": pending.input,
            "links": pending.links,
        }));

        let poller = tokio::spawn(client.clone().run());
        for _ in 0..100 {
            if !flyte.results.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        poller.abort();

        let results = flyte.results.lock().unwrap().clone();
        assert_eq!(results, vec![json!({"event": "Echoed", "payload": "hi"})]);
    }
}
