//! Transcript endpoints

use crate::access::Identity;
use crate::api::{require_read, require_write, ApiResult};
use crate::db;
use crate::db::transcripts::NewTranscript;
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use vlab_common::api::ApiResponse;
use vlab_common::db::models::{MessageRole, Transcript};
use vlab_common::Error;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTranscriptRequest {
    pub user_id: Option<String>,
    pub meeting_id: Option<String>,
    pub agent_id: Option<String>,
    pub agent_name: Option<String>,
    pub role: Option<String>,
    pub content: Option<String>,
    pub round_number: Option<i64>,
    pub sequence_number: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptListQuery {
    pub user_id: Option<String>,
    pub meeting_id: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub user_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptCount {
    pub count: i64,
}

fn parse_role(raw: &str) -> Result<MessageRole, Error> {
    match raw {
        "system" => Ok(MessageRole::System),
        "user" => Ok(MessageRole::User),
        "assistant" => Ok(MessageRole::Assistant),
        other => Err(Error::Validation(format!("Invalid role: {}", other))),
    }
}

pub async fn create_transcript(
    State(state): State<AppState>,
    identity: Identity,
    Json(req): Json<CreateTranscriptRequest>,
) -> ApiResult<Transcript> {
    let meeting_id = req
        .meeting_id
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::Validation("Meeting ID is required".to_string()))?;

    let content = req
        .content
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::Validation("Content is required".to_string()))?;

    let role = parse_role(req.role.as_deref().unwrap_or("assistant"))?;

    let (meeting, session) = db::meetings::get_meeting_with_session(&state.db, &meeting_id)
        .await?
        .ok_or_else(|| Error::NotFound("Meeting not found".to_string()))?;

    let user = identity.or_claim(req.user_id.as_deref());
    require_write(&session, user.as_deref(), "Meeting")?;

    let transcript = db::transcripts::create_transcript(
        &state.db,
        NewTranscript {
            meeting_id: meeting.id,
            agent_id: req.agent_id,
            agent_name: req.agent_name,
            role,
            content,
            round_number: req.round_number.unwrap_or(0),
            sequence_number: req.sequence_number.unwrap_or(0),
        },
    )
    .await?;

    Ok(Json(ApiResponse::ok(
        "Transcript created successfully",
        transcript,
    )))
}

/// Full transcript of a meeting in conversational order, optionally
/// truncated to the first `limit` entries
pub async fn list_transcripts(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<TranscriptListQuery>,
) -> ApiResult<Vec<Transcript>> {
    let meeting_id = query
        .meeting_id
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::Validation("Meeting ID is required".to_string()))?;

    let (meeting, session) = db::meetings::get_meeting_with_session(&state.db, &meeting_id)
        .await?
        .ok_or_else(|| Error::NotFound("Meeting not found".to_string()))?;

    let user = identity.or_claim(query.user_id.as_deref());
    require_read(&session, user.as_deref(), "Meeting")?;

    let transcripts = db::transcripts::list_for_meeting(&state.db, &meeting.id, query.limit).await?;
    Ok(Json(ApiResponse::ok(
        "Transcripts retrieved successfully",
        transcripts,
    )))
}

/// Total transcript count across all meetings of a session
pub async fn session_transcript_count(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<UserQuery>,
    Path(session_id): Path<String>,
) -> ApiResult<TranscriptCount> {
    let session = db::sessions::get_session(&state.db, &session_id)
        .await?
        .ok_or_else(|| Error::NotFound("Session not found".to_string()))?;

    let user = identity.or_claim(query.user_id.as_deref());
    require_read(&session, user.as_deref(), "Session")?;

    let count = db::transcripts::count_for_session(&state.db, &session_id).await?;
    Ok(Json(ApiResponse::ok(
        "Transcript count retrieved successfully",
        TranscriptCount { count },
    )))
}
