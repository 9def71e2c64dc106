//! Session endpoints

use crate::access::Identity;
use crate::api::{require_read, require_write, ApiResult};
use crate::db;
use crate::db::sessions::{NewSession, ReopenParams, SessionUpdate};
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use vlab_common::api::ApiResponse;
use vlab_common::db::models::{Meeting, Session};
use vlab_common::Error;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    /// Bot carve-out: trusted only when no verified identity is present
    pub user_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub user_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSessionRequest {
    pub user_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReopenSessionRequest {
    pub user_id: Option<String>,
    pub title: Option<String>,
    pub agenda: Option<String>,
    pub task_description: Option<String>,
    pub max_rounds: Option<i64>,
    pub is_public: Option<bool>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReopenSessionResponse {
    pub session: Session,
    pub meeting: Meeting,
}

pub async fn create_session(
    State(state): State<AppState>,
    identity: Identity,
    Json(req): Json<CreateSessionRequest>,
) -> ApiResult<Session> {
    let user = identity
        .or_claim(req.user_id.as_deref())
        .ok_or_else(|| Error::Unauthorized("User ID is required".to_string()))?;

    let title = req
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::Validation("Title is required".to_string()))?;

    let session = db::sessions::create_session(
        &state.db,
        NewSession {
            user_id: user,
            title,
            description: req.description,
            is_public: req.is_public.unwrap_or(false),
        },
    )
    .await?;

    info!("Created session {} for user {}", session.id, session.user_id);
    Ok(Json(ApiResponse::ok("Session created successfully", session)))
}

pub async fn list_sessions(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<UserQuery>,
) -> ApiResult<Vec<Session>> {
    let user = identity
        .or_claim(query.user_id.as_deref())
        .ok_or_else(|| Error::Unauthorized("User ID is required".to_string()))?;

    let sessions = db::sessions::list_for_user(&state.db, &user).await?;
    Ok(Json(ApiResponse::ok(
        "Sessions retrieved successfully",
        sessions,
    )))
}

/// The caller's single active session, or a successful null payload
pub async fn active_session(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<UserQuery>,
) -> ApiResult<Session> {
    let user = identity
        .or_claim(query.user_id.as_deref())
        .ok_or_else(|| Error::Unauthorized("User ID is required".to_string()))?;

    match db::sessions::get_active(&state.db, &user).await? {
        Some(session) => Ok(Json(ApiResponse::ok(
            "Active session retrieved successfully",
            session,
        ))),
        None => Ok(Json(ApiResponse::ok_empty("No active session found"))),
    }
}

pub async fn get_session(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<UserQuery>,
    Path(id): Path<String>,
) -> ApiResult<Session> {
    let session = db::sessions::get_session(&state.db, &id)
        .await?
        .ok_or_else(|| Error::NotFound("Session not found".to_string()))?;

    let user = identity.or_claim(query.user_id.as_deref());
    require_read(&session, user.as_deref(), "Session")?;

    Ok(Json(ApiResponse::ok(
        "Session retrieved successfully",
        session,
    )))
}

pub async fn update_session(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
    Json(req): Json<UpdateSessionRequest>,
) -> ApiResult<Session> {
    let session = db::sessions::get_session(&state.db, &id)
        .await?
        .ok_or_else(|| Error::NotFound("Session not found".to_string()))?;

    let user = identity.or_claim(req.user_id.as_deref());
    require_write(&session, user.as_deref(), "Session")?;

    let update = SessionUpdate {
        title: req.title,
        description: req.description,
        is_public: req.is_public,
    };
    if update.is_empty() {
        return Err(Error::Validation("No valid fields to update".to_string()).into());
    }

    let session = db::sessions::update_session(&state.db, &id, update).await?;
    Ok(Json(ApiResponse::ok(
        "Session updated successfully",
        session,
    )))
}

pub async fn delete_session(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<UserQuery>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let session = db::sessions::get_session(&state.db, &id)
        .await?
        .ok_or_else(|| Error::NotFound("Session not found".to_string()))?;

    let user = identity.or_claim(query.user_id.as_deref());
    require_write(&session, user.as_deref(), "Session")?;

    db::sessions::delete_session(&state.db, &id).await?;
    info!("Deleted session {}", id);
    Ok(Json(ApiResponse::ok_empty("Session deleted successfully")))
}

/// Make this session the caller's active one; any other active session
/// of the same owner is deactivated in the same transaction
pub async fn activate_session(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<UserQuery>,
    Path(id): Path<String>,
) -> ApiResult<Session> {
    let user = identity
        .or_claim(query.user_id.as_deref())
        .ok_or_else(|| Error::Unauthorized("User ID is required".to_string()))?;

    let session = db::sessions::activate_session(&state.db, &id, &user).await?;
    info!("Activated session {} for user {}", session.id, user);
    Ok(Json(ApiResponse::ok(
        "Session activated successfully",
        session,
    )))
}

/// Clear the caller's activity flag on a session without ending it
pub async fn deactivate_session(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<UserQuery>,
    Path(id): Path<String>,
) -> ApiResult<Session> {
    let user = identity
        .or_claim(query.user_id.as_deref())
        .ok_or_else(|| Error::Unauthorized("User ID is required".to_string()))?;

    let session = db::sessions::deactivate_session(&state.db, &id, &user).await?;
    Ok(Json(ApiResponse::ok(
        "Session deactivated successfully",
        session,
    )))
}

/// End a session by id alone. Bot integrations call this without an
/// identity, so no ownership check is applied here.
pub async fn end_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Session> {
    let session = db::sessions::end_session(&state.db, &id).await?;
    info!("Ended session {}", id);
    Ok(Json(ApiResponse::ok("Session ended successfully", session)))
}

pub async fn reopen_session(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
    Json(req): Json<ReopenSessionRequest>,
) -> ApiResult<ReopenSessionResponse> {
    let user = identity
        .or_claim(req.user_id.as_deref())
        .ok_or_else(|| Error::Unauthorized("User ID is required".to_string()))?;

    let (session, meeting) = db::sessions::reopen_session(
        &state.db,
        &id,
        &user,
        ReopenParams {
            title: req.title,
            agenda: req.agenda,
            task_description: req.task_description,
            max_rounds: req.max_rounds,
            is_public: req.is_public,
        },
    )
    .await?;

    info!("Reopened session {} with meeting {}", session.id, meeting.id);
    Ok(Json(ApiResponse::ok(
        "Session reopened successfully",
        ReopenSessionResponse { session, meeting },
    )))
}
