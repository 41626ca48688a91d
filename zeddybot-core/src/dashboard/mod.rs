//! HTTP surface for the streaming dashboard: stats, live chat over SSE and
//! chat-posting controls.

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::auth::TokenManager;
use crate::cache::{ChatBacklog, StatsCache};
use crate::hub::LiveUpdateHub;
use crate::services::ChatSendService;

/// Shared state handed to every route.
#[derive(Clone)]
pub struct AppState {
    pub stats: Arc<StatsCache>,
    pub hub: LiveUpdateHub,
    pub backlog: Arc<ChatBacklog>,
    pub chat: Arc<ChatSendService>,
    pub tokens: Arc<TokenManager>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/discord_stats", get(handlers::discord_stats))
        .route("/api/chat", get(handlers::recent_chat))
        .route("/api/chat/stream", get(handlers::chat_stream))
        .route("/api/chat/publish", post(handlers::chat_publish))
        .route("/api/send_chat", post(handlers::send_chat))
        .route("/api/quick_messages", post(handlers::quick_messages))
        .route("/api/test_chat", get(handlers::test_chat))
        .route("/api/refresh_token", post(handlers::refresh_token))
        .route("/api/ping", get(handlers::ping))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}
