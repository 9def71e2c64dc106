//! Public gallery and leaderboard endpoints
//!
//! Both surfaces serve only public sessions, so they take no identity.

use crate::api::ApiResult;
use crate::db;
use crate::db::sessions::SessionWithVotes;
use crate::pagination::DEFAULT_PAGE_SIZE;
use crate::AppState;
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use vlab_common::api::ApiResponse;
use vlab_common::db::models::Session;

const DEFAULT_LEADERBOARD_LIMIT: i64 = 50;
const MAX_LEADERBOARD_LIMIT: i64 = 100;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub search: Option<String>,
    /// Accepted for compatibility; every sort currently aliases to recent
    pub sort: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryPage {
    pub sessions: Vec<Session>,
    pub current_page: i64,
    pub total_pages: i64,
    pub total_count: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardQuery {
    pub limit: Option<i64>,
}

pub async fn public_sessions(
    State(state): State<AppState>,
    Query(query): Query<GalleryQuery>,
) -> ApiResult<GalleryPage> {
    let page = query.page.unwrap_or(1).max(1);
    let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, 100);
    if let Some(sort) = query.sort.as_deref() {
        tracing::debug!("Gallery sort '{}' requested, serving recent", sort);
    }

    let (sessions, pagination) =
        db::sessions::list_public(&state.db, query.search.as_deref(), page, page_size).await?;

    Ok(Json(ApiResponse::ok(
        "Public sessions retrieved successfully",
        GalleryPage {
            sessions,
            current_page: pagination.page,
            total_pages: pagination.total_pages,
            total_count: pagination.total_count,
        },
    )))
}

pub async fn leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> ApiResult<Vec<SessionWithVotes>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LEADERBOARD_LIMIT)
        .clamp(1, MAX_LEADERBOARD_LIMIT);

    let sessions = db::sessions::top_voted(&state.db, limit).await?;
    Ok(Json(ApiResponse::ok(
        "Leaderboard retrieved successfully",
        sessions,
    )))
}
