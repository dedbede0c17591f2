// ABOUTME: Inbound Zendesk webhook listener built on axum.
// ABOUTME: Checks HTTP Basic credentials, parses ticket updates, and queues resolution notices.

use crate::outbox::ChatOutbox;
use crate::store::MappingStore;
use axum::{
    body::Bytes,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Ticket status that triggers a resolution notice.
pub const SOLVED_STATUS: &str = "solved";

/// Posted into the support channel when its ticket is solved.
pub const RESOLUTION_NOTICE: &str = "**Ticket Solved**\n\
    Your support request has been marked as resolved.\n\
    Send a new message here to reopen support.";

/// Shared state for webhook requests.
#[derive(Clone)]
pub struct WebhookState {
    store: MappingStore,
    outbox: ChatOutbox,
    credentials: Arc<str>,
}

impl WebhookState {
    pub fn new(store: MappingStore, outbox: ChatOutbox, username: &str, password: &str) -> Self {
        Self {
            store,
            outbox,
            credentials: Arc::from(format!("{}:{}", username, password)),
        }
    }
}

/// Why a request failed authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// No `Authorization` header, or not a Basic scheme.
    Missing,
    /// Credentials were not valid base64/UTF-8.
    Malformed,
    /// Credentials decoded but did not match.
    Invalid,
}

impl AuthFailure {
    fn message(self) -> &'static str {
        match self {
            AuthFailure::Missing => "Missing auth",
            AuthFailure::Malformed => "Bad auth",
            AuthFailure::Invalid => "Invalid credentials",
        }
    }
}

impl IntoResponse for AuthFailure {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": self.message() })),
        )
            .into_response()
    }
}

/// Check a raw `Authorization` header value against `user:pass`.
pub fn check_basic_auth(header: Option<&str>, expected: &str) -> Result<(), AuthFailure> {
    let encoded = header
        .and_then(|h| h.strip_prefix("Basic "))
        .ok_or(AuthFailure::Missing)?;

    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|_| AuthFailure::Malformed)?;
    let decoded = String::from_utf8(decoded).map_err(|_| AuthFailure::Malformed)?;

    if decoded == expected {
        Ok(())
    } else {
        Err(AuthFailure::Invalid)
    }
}

/// What a parsed notification led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Status other than solved (or none).
    NotSolved,
    /// Solved, but the payload carried no usable ticket id.
    MissingTicketId,
    /// Solved ticket with no support channel.
    Unmapped { ticket_id: u64 },
    /// Resolution notice handed to the outbox.
    Queued { ticket_id: u64, channel_id: u64 },
}

/// Ticket ids arrive as numbers or numeric strings depending on the trigger template.
fn parse_ticket_id(ticket: &Value) -> Option<u64> {
    match ticket.get("id")? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Act on a parsed notification payload.
pub async fn dispatch(state: &WebhookState, payload: &Value) -> crate::Result<Dispatch> {
    let ticket = payload.get("ticket");
    let status = ticket.and_then(|t| t.get("status")).and_then(Value::as_str);

    if status != Some(SOLVED_STATUS) {
        debug!(status = ?status, "Ticket update is not a resolution");
        return Ok(Dispatch::NotSolved);
    }

    let Some(ticket_id) = ticket.and_then(parse_ticket_id) else {
        warn!("Solved notification without a ticket id");
        return Ok(Dispatch::MissingTicketId);
    };

    let Some(channel_id) = state.store.find_by_ticket(ticket_id).await? else {
        debug!(ticket_id, "Solved ticket has no support channel");
        return Ok(Dispatch::Unmapped { ticket_id });
    };

    state.outbox.submit(channel_id, RESOLUTION_NOTICE);
    info!(ticket_id, channel_id, "Queued resolution notice");
    Ok(Dispatch::Queued {
        ticket_id,
        channel_id,
    })
}

async fn handle_webhook(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let auth = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    if let Err(failure) = check_basic_auth(auth, &state.credentials) {
        warn!(reason = failure.message(), "Rejected webhook request");
        return failure.into_response();
    }

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "Webhook body is not JSON");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Invalid JSON" })),
            )
                .into_response();
        }
    };

    if let Err(e) = dispatch(&state, &payload).await {
        error!(error = %e, "Webhook dispatch failed");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Storage failure" })),
        )
            .into_response();
    }

    (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response()
}

/// Build the webhook application.
pub fn app(state: WebhookState) -> Router {
    Router::new()
        .route("/", post(handle_webhook))
        .with_state(state)
}

/// Serve the webhook on an already-bound listener until the server stops.
pub async fn serve(listener: TcpListener, state: WebhookState) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    info!(addr = %addr, "Webhook listener ready");
    axum::serve(listener, app(state)).await
}
