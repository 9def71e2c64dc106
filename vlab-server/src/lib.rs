//! vlab-server - Thera Virtual Lab HTTP service
//!
//! Sessions, meetings, transcripts, agents and votes over a SQLite store,
//! plus a per-meeting SSE transcript stream for live viewers.

use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod access;
pub mod api;
pub mod db;
pub mod pagination;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
}

impl AppState {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{delete, get, post, put};

    Router::new()
        // Health endpoint
        .route("/health", get(api::health::health))
        // Sessions
        .route("/sessions", post(api::sessions::create_session))
        .route("/sessions", get(api::sessions::list_sessions))
        .route("/sessions/active", get(api::sessions::active_session))
        .route("/sessions/public", get(api::gallery::public_sessions))
        .route("/sessions/:id", get(api::sessions::get_session))
        .route("/sessions/:id", put(api::sessions::update_session))
        .route("/sessions/:id", delete(api::sessions::delete_session))
        .route("/sessions/:id/activate", put(api::sessions::activate_session))
        .route("/sessions/:id/deactivate", put(api::sessions::deactivate_session))
        .route("/sessions/:id/end", put(api::sessions::end_session))
        .route("/sessions/:id/reopen", put(api::sessions::reopen_session))
        .route("/sessions/:id/end-meetings", put(api::meetings::end_session_meetings))
        .route("/sessions/:id/transcript-count", get(api::transcripts::session_transcript_count))
        .route("/leaderboard", get(api::gallery::leaderboard))
        // Meetings
        .route("/meetings", post(api::meetings::create_meeting))
        .route("/meetings", get(api::meetings::list_meetings))
        .route("/meetings/active", get(api::meetings::active_meetings))
        .route("/meetings/parallel", get(api::meetings::parallel_meetings))
        .route("/meetings/:id", get(api::meetings::get_meeting))
        .route("/meetings/:id", put(api::meetings::update_meeting))
        .route("/meetings/:id", delete(api::meetings::delete_meeting))
        .route("/meetings/:id/end", put(api::meetings::end_meeting))
        // Transcripts
        .route("/transcripts", post(api::transcripts::create_transcript))
        .route("/transcripts", get(api::transcripts::list_transcripts))
        .route("/transcripts/:meeting_id/stream", get(api::sse::transcript_stream))
        // Agents
        .route("/agents", post(api::agents::create_agent))
        .route("/agents", get(api::agents::list_agents))
        .route("/agents/:id", get(api::agents::get_agent))
        .route("/agents/:id", put(api::agents::update_agent))
        .route("/agents/:id", delete(api::agents::delete_agent))
        // Votes
        .route("/votes", post(api::votes::upsert_vote))
        .route("/votes/:session_id", get(api::votes::get_vote))
        .route("/votes/:session_id/count", get(api::votes::vote_counts))
        // Attach application state
        .with_state(state)
        // Enable CORS for browser viewers
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
