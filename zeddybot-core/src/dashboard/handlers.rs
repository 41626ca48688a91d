use std::convert::Infallible;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;
use tokio_stream::Stream;
use tracing::{info, warn};

use zeddybot_common::error::AuthError;
use zeddybot_common::models::ChatEvent;

use super::AppState;
use crate::Error;
use crate::hub::HubMessage;
use crate::services::QuickMessage;

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    pub username: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct SendChatRequest {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct QuickMessageRequest {
    #[serde(rename = "type", default)]
    pub kind: String,
}

fn error_status(err: &Error) -> StatusCode {
    match err {
        Error::InvalidRequest(_) | Error::Config(_) | Error::Parse(_) => StatusCode::BAD_REQUEST,
        Error::Auth(AuthError::NoCredential | AuthError::RefreshFailed { .. }) => StatusCode::UNAUTHORIZED,
        Error::Auth(_) | Error::Http(_) | Error::Timeout(_) | Error::ChatSend(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn failure(err: Error) -> Response {
    let status = error_status(&err);
    warn!("dashboard request failed ({status}): {err}");
    (status, Json(json!({ "success": false, "error": err.to_string() }))).into_response()
}

pub async fn discord_stats(State(state): State<AppState>) -> Json<serde_json::Value> {
    let snapshot = state.stats.read();
    let mut body = json!({ "success": true, "stats": &*snapshot });
    if !snapshot.connected {
        body["error"] = json!("Discord bot not connected");
    }
    Json(body)
}

fn to_sse(msg: HubMessage) -> Result<Event, Infallible> {
    let event = match msg {
        HubMessage::Chat(chat) => Event::default()
            .event("chat")
            .json_data(&chat)
            .unwrap_or_else(|e| {
                warn!("Failed to serialize chat event: {e}");
                Event::default().event("chat").data("{}")
            }),
        HubMessage::Heartbeat => Event::default().event("heartbeat").data("{}"),
    };
    Ok(event)
}

/// The subscription lives inside the response stream: when the client goes
/// away the body is dropped and the hub forgets the subscriber.
pub async fn chat_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.hub.subscribe();
    info!(subscriber = %subscription.id(), "Dashboard attached to chat stream");
    Sse::new(tokio_stream::StreamExt::map(subscription, to_sse))
}

pub async fn chat_publish(State(state): State<AppState>, Json(req): Json<PublishRequest>) -> Response {
    if req.message.trim().is_empty() || req.username.trim().is_empty() {
        return failure(Error::InvalidRequest("username and message are required".into()));
    }
    let event = ChatEvent::new(req.username, req.message);
    state.backlog.push(event.clone());
    let delivered = state.hub.publish(event);
    Json(json!({ "success": true, "delivered": delivered })).into_response()
}

/// Backlog for a dashboard that just attached, oldest line first.
pub async fn recent_chat(State(state): State<AppState>) -> Json<Vec<ChatEvent>> {
    Json(state.backlog.recent())
}

pub async fn test_chat(State(state): State<AppState>) -> Response {
    match state.chat.test_connection().await {
        Ok(message) => Json(json!({ "success": true, "message": message })).into_response(),
        Err(e) => failure(e),
    }
}

pub async fn send_chat(State(state): State<AppState>, Json(req): Json<SendChatRequest>) -> Response {
    match state.chat.send(&req.message).await {
        Ok(()) => Json(json!({ "success": true, "message": format!("Sent: {}", req.message.trim()) })).into_response(),
        Err(e) => failure(e),
    }
}

pub async fn quick_messages(State(state): State<AppState>, Json(req): Json<QuickMessageRequest>) -> Response {
    let kind: QuickMessage = match req.kind.parse() {
        Ok(kind) => kind,
        Err(e) => return failure(e),
    };
    match state.chat.send_quick(kind).await {
        Ok(text) => Json(json!({ "success": true, "message": format!("Sent: {text}") })).into_response(),
        Err(e) => failure(e),
    }
}

pub async fn refresh_token(State(state): State<AppState>) -> Response {
    match state.tokens.force_refresh().await {
        Ok(_) => Json(json!({ "success": true, "message": "Token refreshed successfully" })).into_response(),
        Err(e) => failure(e.into()),
    }
}

pub async fn ping(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "success": true, "subscribers": state.hub.subscriber_count() }))
}
