//! Meeting endpoints
//!
//! Every meeting operation is access-checked against the parent session;
//! meetings carry no visibility of their own.

use crate::access::Identity;
use crate::api::{require_read, require_write, ApiResult};
use crate::db;
use crate::db::meetings::{MeetingUpdate, NewMeeting};
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use vlab_common::api::ApiResponse;
use vlab_common::db::models::{Meeting, MeetingStatus};
use vlab_common::Error;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMeetingRequest {
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub title: Option<String>,
    pub agenda: Option<String>,
    pub task_description: Option<String>,
    pub max_rounds: Option<i64>,
    #[serde(default)]
    pub is_parallel: bool,
    #[serde(default)]
    pub parallel_index: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingListQuery {
    pub user_id: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParallelQuery {
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub base_meeting_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMeetingRequest {
    pub user_id: Option<String>,
    pub title: Option<String>,
    pub agenda: Option<String>,
    pub task_description: Option<String>,
    pub max_rounds: Option<i64>,
    pub current_round: Option<i64>,
    pub status: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndedMeetings {
    pub ended: u64,
}

fn parse_status(raw: &str) -> Result<MeetingStatus, Error> {
    match raw {
        "pending" => Ok(MeetingStatus::Pending),
        "in_progress" => Ok(MeetingStatus::InProgress),
        "completed" => Ok(MeetingStatus::Completed),
        "failed" => Ok(MeetingStatus::Failed),
        other => Err(Error::Validation(format!("Invalid status: {}", other))),
    }
}

/// Load the session behind a session id claim, read-gated for the caller
async fn readable_session(
    state: &AppState,
    session_id: Option<&str>,
    caller: Option<&str>,
) -> Result<String, Error> {
    let session_id = session_id
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::Validation("Session ID is required".to_string()))?;

    let session = db::sessions::get_session(&state.db, session_id)
        .await?
        .ok_or_else(|| Error::NotFound("Session not found".to_string()))?;

    require_read(&session, caller, "Session")?;
    Ok(session.id)
}

pub async fn create_meeting(
    State(state): State<AppState>,
    identity: Identity,
    Json(req): Json<CreateMeetingRequest>,
) -> ApiResult<Meeting> {
    let user = identity.or_claim(req.user_id.as_deref());

    let session_id = req
        .session_id
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::Validation("Session ID is required".to_string()))?;

    let session = db::sessions::get_session(&state.db, &session_id)
        .await?
        .ok_or_else(|| Error::NotFound("Session not found".to_string()))?;
    require_write(&session, user.as_deref(), "Session")?;

    let meeting = db::meetings::create_meeting(
        &state.db,
        NewMeeting {
            session_id,
            title: req.title,
            agenda: req.agenda,
            task_description: req.task_description,
            max_rounds: req.max_rounds,
            is_parallel: req.is_parallel,
            parallel_index: req.parallel_index,
        },
    )
    .await?;

    info!("Created meeting {} in session {}", meeting.id, meeting.session_id);
    Ok(Json(ApiResponse::ok("Meeting created successfully", meeting)))
}

pub async fn list_meetings(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<MeetingListQuery>,
) -> ApiResult<Vec<Meeting>> {
    let user = identity.or_claim(query.user_id.as_deref());
    let session_id = readable_session(&state, query.session_id.as_deref(), user.as_deref()).await?;

    let meetings = db::meetings::list_for_session(&state.db, &session_id).await?;
    Ok(Json(ApiResponse::ok(
        "Meetings retrieved successfully",
        meetings,
    )))
}

pub async fn active_meetings(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<MeetingListQuery>,
) -> ApiResult<Vec<Meeting>> {
    let user = identity.or_claim(query.user_id.as_deref());
    let session_id = readable_session(&state, query.session_id.as_deref(), user.as_deref()).await?;

    let meetings = db::meetings::active_meetings(&state.db, &session_id).await?;
    Ok(Json(ApiResponse::ok(
        "Active meetings retrieved successfully",
        meetings,
    )))
}

pub async fn parallel_meetings(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<ParallelQuery>,
) -> ApiResult<Vec<Meeting>> {
    let user = identity.or_claim(query.user_id.as_deref());
    let session_id = readable_session(&state, query.session_id.as_deref(), user.as_deref()).await?;

    let base_meeting_id = query
        .base_meeting_id
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::Validation("Base meeting ID is required".to_string()))?;

    let meetings = db::meetings::parallel_meetings(&state.db, &session_id, &base_meeting_id).await?;
    Ok(Json(ApiResponse::ok(
        "Parallel meetings retrieved successfully",
        meetings,
    )))
}

pub async fn get_meeting(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<MeetingListQuery>,
    Path(id): Path<String>,
) -> ApiResult<Meeting> {
    let (meeting, session) = db::meetings::get_meeting_with_session(&state.db, &id)
        .await?
        .ok_or_else(|| Error::NotFound("Meeting not found".to_string()))?;

    let user = identity.or_claim(query.user_id.as_deref());
    require_read(&session, user.as_deref(), "Meeting")?;

    Ok(Json(ApiResponse::ok(
        "Meeting retrieved successfully",
        meeting,
    )))
}

pub async fn update_meeting(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
    Json(req): Json<UpdateMeetingRequest>,
) -> ApiResult<Meeting> {
    let (_, session) = db::meetings::get_meeting_with_session(&state.db, &id)
        .await?
        .ok_or_else(|| Error::NotFound("Meeting not found".to_string()))?;

    let user = identity.or_claim(req.user_id.as_deref());
    require_write(&session, user.as_deref(), "Meeting")?;

    let status = req.status.as_deref().map(parse_status).transpose()?;
    let meeting = db::meetings::update_meeting(
        &state.db,
        &id,
        MeetingUpdate {
            title: req.title,
            agenda: req.agenda,
            task_description: req.task_description,
            max_rounds: req.max_rounds,
            current_round: req.current_round,
            status,
        },
    )
    .await?;

    Ok(Json(ApiResponse::ok(
        "Meeting updated successfully",
        meeting,
    )))
}

/// End a meeting by id alone, mirroring the session end carve-out.
/// Idempotent: an already-completed meeting is returned unchanged.
pub async fn end_meeting(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Meeting> {
    let meeting = db::meetings::end_meeting(&state.db, &id).await?;
    info!("Ended meeting {}", id);
    Ok(Json(ApiResponse::ok("Meeting ended successfully", meeting)))
}

/// Complete every in-progress meeting of a session, reporting the count
pub async fn end_session_meetings(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<MeetingListQuery>,
    Path(session_id): Path<String>,
) -> ApiResult<EndedMeetings> {
    let session = db::sessions::get_session(&state.db, &session_id)
        .await?
        .ok_or_else(|| Error::NotFound("Session not found".to_string()))?;

    let user = identity.or_claim(query.user_id.as_deref());
    require_write(&session, user.as_deref(), "Session")?;

    let ended = db::meetings::end_all_for_session(&state.db, &session_id).await?;
    info!("Ended {} meetings in session {}", ended, session_id);
    Ok(Json(ApiResponse::ok(
        "Meetings ended successfully",
        EndedMeetings { ended },
    )))
}

pub async fn delete_meeting(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<MeetingListQuery>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let (_, session) = db::meetings::get_meeting_with_session(&state.db, &id)
        .await?
        .ok_or_else(|| Error::NotFound("Meeting not found".to_string()))?;

    let user = identity.or_claim(query.user_id.as_deref());
    require_write(&session, user.as_deref(), "Meeting")?;

    db::meetings::delete_meeting(&state.db, &id).await?;
    Ok(Json(ApiResponse::ok_empty("Meeting deleted successfully")))
}
