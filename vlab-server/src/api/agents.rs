//! Agent metadata endpoints

use crate::access::Identity;
use crate::api::{require_read, ApiResult};
use crate::db;
use crate::db::agents::{AgentUpdate, NewAgent};
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use tracing::info;
use vlab_common::api::ApiResponse;
use vlab_common::db::models::{Agent, AgentStatus};
use vlab_common::Error;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAgentRequest {
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
    pub expertise: Option<String>,
    pub personality: Option<String>,
    pub goal: Option<String>,
    pub model: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentListQuery {
    pub user_id: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAgentRequest {
    pub user_id: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
    pub expertise: Option<String>,
    pub personality: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub model: Option<String>,
}

fn parse_status(raw: &str) -> Result<AgentStatus, Error> {
    match raw {
        "active" => Ok(AgentStatus::Active),
        "inactive" => Ok(AgentStatus::Inactive),
        other => Err(Error::Validation(format!("Invalid status: {}", other))),
    }
}

/// Agents are owner-private: only the creating user sees or edits them
fn owned_agent(agent: Option<Agent>, caller: Option<&str>) -> Result<Agent, Error> {
    agent
        .filter(|a| caller == Some(a.user_id.as_str()))
        .ok_or_else(|| Error::NotFound("Agent not found".to_string()))
}

pub async fn create_agent(
    State(state): State<AppState>,
    identity: Identity,
    Json(req): Json<CreateAgentRequest>,
) -> ApiResult<Agent> {
    let user = identity
        .or_claim(req.user_id.as_deref())
        .ok_or_else(|| Error::Unauthorized("User ID is required".to_string()))?;

    let name = req
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| Error::Validation("Name is required".to_string()))?;
    let role = req
        .role
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .ok_or_else(|| Error::Validation("Role is required".to_string()))?;

    // A session claim must point at a session the caller can write
    if let Some(session_id) = req.session_id.as_deref().filter(|s| !s.is_empty()) {
        let session = db::sessions::get_session(&state.db, session_id)
            .await?
            .ok_or_else(|| Error::NotFound("Session not found".to_string()))?;
        crate::api::require_write(&session, Some(user.as_str()), "Session")?;
    }

    let agent = db::agents::create_agent(
        &state.db,
        NewAgent {
            user_id: user,
            session_id: req.session_id.filter(|s| !s.is_empty()),
            name,
            role,
            expertise: req.expertise,
            personality: req.personality,
            goal: req.goal,
            model: req.model,
        },
    )
    .await?;

    info!("Created agent {} ({})", agent.id, agent.name);
    Ok(Json(ApiResponse::ok("Agent created successfully", agent)))
}

pub async fn list_agents(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<AgentListQuery>,
) -> ApiResult<Vec<Agent>> {
    let user = identity.or_claim(query.user_id.as_deref());

    let agents = match query.session_id.as_deref().filter(|s| !s.is_empty()) {
        Some(session_id) => {
            let session = db::sessions::get_session(&state.db, session_id)
                .await?
                .ok_or_else(|| Error::NotFound("Session not found".to_string()))?;
            require_read(&session, user.as_deref(), "Session")?;
            db::agents::list_for_session(&state.db, session_id).await?
        }
        None => {
            let user =
                user.ok_or_else(|| Error::Unauthorized("User ID is required".to_string()))?;
            db::agents::list_for_user(&state.db, &user).await?
        }
    };

    Ok(Json(ApiResponse::ok(
        "Agents retrieved successfully",
        agents,
    )))
}

pub async fn get_agent(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<AgentListQuery>,
    Path(id): Path<String>,
) -> ApiResult<Agent> {
    let user = identity.or_claim(query.user_id.as_deref());
    let agent = owned_agent(db::agents::get_agent(&state.db, &id).await?, user.as_deref())?;
    Ok(Json(ApiResponse::ok("Agent retrieved successfully", agent)))
}

pub async fn update_agent(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
    Json(req): Json<UpdateAgentRequest>,
) -> ApiResult<Agent> {
    let user = identity.or_claim(req.user_id.as_deref());
    owned_agent(db::agents::get_agent(&state.db, &id).await?, user.as_deref())?;

    let status = req.status.as_deref().map(parse_status).transpose()?;
    let agent = db::agents::update_agent(
        &state.db,
        &id,
        AgentUpdate {
            name: req.name,
            role: req.role,
            expertise: req.expertise,
            personality: req.personality,
            description: req.description,
            status,
            model: req.model,
        },
    )
    .await?;

    Ok(Json(ApiResponse::ok("Agent updated successfully", agent)))
}

pub async fn delete_agent(
    State(state): State<AppState>,
    identity: Identity,
    Query(query): Query<AgentListQuery>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let user = identity.or_claim(query.user_id.as_deref());
    owned_agent(db::agents::get_agent(&state.db, &id).await?, user.as_deref())?;

    db::agents::delete_agent(&state.db, &id).await?;
    Ok(Json(ApiResponse::ok_empty("Agent deleted successfully")))
}
