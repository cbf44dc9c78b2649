//! Interaction webhook.
//!
//! Slack posts button clicks to `POST /interaction` as a form with a single
//! `payload` field holding the JSON callback. Callbacks carrying the right
//! verification token are fed into the router stream as
//! [`RawEvent::ButtonAction`]s, and the original message is echoed back so
//! Slack leaves it unchanged.

use axum::{
    extract::{Form, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::slack::InteractionCallback;
use crate::types::RawEvent;

/// Shared server state.
pub struct ServerState {
    verification_token: String,
    events: mpsc::Sender<RawEvent>,
}

impl ServerState {
    pub fn new(verification_token: &str, events: mpsc::Sender<RawEvent>) -> Self {
        Self {
            verification_token: verification_token.to_string(),
            events,
        }
    }
}

#[derive(Debug, Deserialize)]
struct InteractionForm {
    #[serde(default)]
    payload: String,
}

/// Routes served by the pack.
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/interaction", post(interaction_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until the process exits.
pub async fn serve(addr: &str, state: Arc<ServerState>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "interaction webhook listening");

    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn interaction_handler(
    State(state): State<Arc<ServerState>>,
    Form(form): Form<InteractionForm>,
) -> Response {
    let callback: InteractionCallback = match serde_json::from_str(&form.payload) {
        Ok(callback) => callback,
        Err(e) => {
            warn!(error = %e, "cannot decode interaction payload");
            return (StatusCode::BAD_REQUEST, "invalid payload").into_response();
        }
    };

    if callback.token != state.verification_token {
        warn!(callback_id = %callback.callback_id, "interaction with invalid verification token");
        return StatusCode::UNAUTHORIZED.into_response();
    }

    match callback.to_raw_event() {
        Some(event) => {
            if state.events.send(event).await.is_err() {
                warn!("event router is gone, dropping button action");
                return StatusCode::SERVICE_UNAVAILABLE.into_response();
            }
        }
        None => debug!(callback_type = %callback.callback_type, "ignoring interaction"),
    }

    Json(callback.original_message.unwrap_or(Value::Null)).into_response()
}
