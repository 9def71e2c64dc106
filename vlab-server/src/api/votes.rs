//! Vote endpoints

use crate::access::Identity;
use crate::api::{require_read, ApiResult};
use crate::db;
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use vlab_common::api::ApiResponse;
use vlab_common::db::models::{Vote, VoteCounts};
use vlab_common::Error;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub value: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub user_id: Option<String>,
}

/// Create or replace the caller's vote on a session; one row per
/// (user, session) pair
pub async fn upsert_vote(
    State(state): State<AppState>,
    identity: Identity,
    Json(req): Json<VoteRequest>,
) -> ApiResult<Vote> {
    let user = identity
        .or_claim(req.user_id.as_deref())
        .ok_or_else(|| Error::Unauthorized("User ID is required".to_string()))?;

    let session_id = req
        .session_id
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::Validation("Session ID is required".to_string()))?;

    let value = req
        .value
        .ok_or_else(|| Error::Validation("Vote value is required".to_string()))?;

    let session = db::sessions::get_session(&state.db, &session_id)
        .await?
        .ok_or_else(|| Error::NotFound("Session not found".to_string()))?;
    require_read(&session, Some(user.as_str()), "Session")?;

    let existing = db::votes::get_vote(&state.db, &session_id, &user).await?;
    let vote = db::votes::upsert_vote(&state.db, &session_id, &user, value).await?;

    let message = if existing.is_some() {
        "Vote updated successfully"
    } else {
        "Vote created successfully"
    };
    Ok(Json(ApiResponse::ok(message, vote)))
}

/// The caller's own vote for a session, or a successful null payload
pub async fn get_vote(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<UserQuery>,
    Path(session_id): Path<String>,
) -> ApiResult<Vote> {
    let user = identity
        .or_claim(query.user_id.as_deref())
        .ok_or_else(|| Error::Unauthorized("User ID is required".to_string()))?;

    match db::votes::get_vote(&state.db, &session_id, &user).await? {
        Some(vote) => Ok(Json(ApiResponse::ok("Vote retrieved successfully", vote))),
        None => Ok(Json(ApiResponse::ok_empty("No vote found"))),
    }
}

/// Aggregate tallies; readable by anyone who can read the session
pub async fn vote_counts(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<UserQuery>,
    Path(session_id): Path<String>,
) -> ApiResult<VoteCounts> {
    let session = db::sessions::get_session(&state.db, &session_id)
        .await?
        .ok_or_else(|| Error::NotFound("Session not found".to_string()))?;

    let user = identity.or_claim(query.user_id.as_deref());
    require_read(&session, user.as_deref(), "Session")?;

    let counts = db::votes::vote_counts(&state.db, &session_id).await?;
    Ok(Json(ApiResponse::ok(
        "Vote counts retrieved successfully",
        counts,
    )))
}
