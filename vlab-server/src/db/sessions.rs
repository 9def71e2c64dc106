//! Session lifecycle queries
//!
//! Activation is exclusive: activating a session deactivates every other
//! session owned by the same user, and both statements run inside one
//! transaction so the at-most-one-active invariant holds at commit.

use crate::pagination::{calculate_pagination, Pagination};
use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;
use vlab_common::db::models::{Meeting, MeetingStatus, Session};
use vlab_common::{Error, Result};

pub struct NewSession {
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub is_public: bool,
}

/// Parameters for the fresh meeting spawned by a reopen
pub struct ReopenParams {
    pub title: Option<String>,
    pub agenda: Option<String>,
    pub task_description: Option<String>,
    pub max_rounds: Option<i64>,
    pub is_public: Option<bool>,
}

/// Public session with aggregated vote tallies (leaderboard row)
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SessionWithVotes {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub session: Session,
    pub upvotes: i64,
    pub downvotes: i64,
    pub total: i64,
}

/// Create a session as the owner's single active one
pub async fn create_session(pool: &SqlitePool, new: NewSession) -> Result<Session> {
    let now = Utc::now();
    let session = Session {
        id: Uuid::new_v4().to_string(),
        user_id: new.user_id,
        title: new.title,
        description: new.description,
        is_public: new.is_public,
        is_active: true,
        created_at: now,
        updated_at: now,
    };

    let mut tx = pool.begin().await?;

    sqlx::query("UPDATE sessions SET is_active = 0, updated_at = ?1 WHERE user_id = ?2 AND is_active = 1")
        .bind(now)
        .bind(&session.user_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        "INSERT INTO sessions (id, user_id, title, description, is_public, is_active, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7)",
    )
    .bind(&session.id)
    .bind(&session.user_id)
    .bind(&session.title)
    .bind(&session.description)
    .bind(session.is_public)
    .bind(session.created_at)
    .bind(session.updated_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(session)
}

pub async fn get_session(pool: &SqlitePool, id: &str) -> Result<Option<Session>> {
    let session = sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE id = ?1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(session)
}

/// Sessions owned by a user, newest first
pub async fn list_for_user(pool: &SqlitePool, user_id: &str) -> Result<Vec<Session>> {
    let sessions = sqlx::query_as::<_, Session>(
        "SELECT * FROM sessions WHERE user_id = ?1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(sessions)
}

/// The owner's single active session, if any
pub async fn get_active(pool: &SqlitePool, user_id: &str) -> Result<Option<Session>> {
    let session = sqlx::query_as::<_, Session>(
        "SELECT * FROM sessions WHERE user_id = ?1 AND is_active = 1",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .map(Some)
    .or_else(|e| match e {
        sqlx::Error::RowNotFound => Ok(None),
        other => Err(other),
    })?;
    Ok(session)
}

/// Re-activate a session, deactivating the owner's others
pub async fn activate_session(pool: &SqlitePool, id: &str, user_id: &str) -> Result<Session> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let mut session = sqlx::query_as::<_, Session>(
        "SELECT * FROM sessions WHERE id = ?1 AND user_id = ?2",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| Error::NotFound(format!("Session {} not found", id)))?;

    sqlx::query("UPDATE sessions SET is_active = 0, updated_at = ?1 WHERE user_id = ?2 AND is_active = 1")
        .bind(now)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("UPDATE sessions SET is_active = 1, updated_at = ?1 WHERE id = ?2")
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    session.is_active = true;
    session.updated_at = now;
    Ok(session)
}

/// Clear the activity flag; safe to call on an already-inactive session
pub async fn deactivate_session(pool: &SqlitePool, id: &str, user_id: &str) -> Result<Session> {
    let now = Utc::now();
    let result = sqlx::query(
        "UPDATE sessions SET is_active = 0, updated_at = ?1 WHERE id = ?2 AND user_id = ?3",
    )
    .bind(now)
    .bind(id)
    .bind(user_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Session {} not found", id)));
    }

    get_session(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Session {} not found", id)))
}

/// End a session by id alone. The externally-facing end action does not
/// re-validate ownership; callers that need the check apply it first.
pub async fn end_session(pool: &SqlitePool, id: &str) -> Result<Session> {
    let now = Utc::now();
    let result = sqlx::query("UPDATE sessions SET is_active = 0, updated_at = ?1 WHERE id = ?2")
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Session {} not found", id)));
    }

    get_session(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Session {} not found", id)))
}

/// Re-activate a session and spawn one fresh pending meeting under it,
/// all in one transaction
pub async fn reopen_session(
    pool: &SqlitePool,
    id: &str,
    user_id: &str,
    params: ReopenParams,
) -> Result<(Session, Meeting)> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let mut session = sqlx::query_as::<_, Session>(
        "SELECT * FROM sessions WHERE id = ?1 AND user_id = ?2",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| Error::NotFound(format!("Session {} not found", id)))?;

    sqlx::query("UPDATE sessions SET is_active = 0, updated_at = ?1 WHERE user_id = ?2 AND is_active = 1")
        .bind(now)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    let is_public = params.is_public.unwrap_or(session.is_public);
    sqlx::query("UPDATE sessions SET is_active = 1, is_public = ?1, updated_at = ?2 WHERE id = ?3")
        .bind(is_public)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let meeting = Meeting {
        id: Uuid::new_v4().to_string(),
        session_id: id.to_string(),
        title: Some(params.title.unwrap_or_else(|| "Reopened meeting".to_string())),
        agenda: params.agenda,
        task_description: params.task_description,
        max_rounds: params.max_rounds.unwrap_or(3),
        current_round: 0,
        status: MeetingStatus::Pending,
        is_parallel: false,
        parallel_index: 0,
        completed_at: None,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        "INSERT INTO meetings (id, session_id, title, agenda, task_description, max_rounds, \
         current_round, status, is_parallel, parallel_index, completed_at, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 'pending', 0, 0, NULL, ?7, ?8)",
    )
    .bind(&meeting.id)
    .bind(&meeting.session_id)
    .bind(&meeting.title)
    .bind(&meeting.agenda)
    .bind(&meeting.task_description)
    .bind(meeting.max_rounds)
    .bind(meeting.created_at)
    .bind(meeting.updated_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    session.is_active = true;
    session.is_public = is_public;
    session.updated_at = now;
    Ok((session, meeting))
}

pub struct SessionUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
}

impl SessionUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.is_public.is_none()
    }
}

pub async fn update_session(pool: &SqlitePool, id: &str, update: SessionUpdate) -> Result<Session> {
    let mut session = get_session(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Session {} not found", id)))?;

    if let Some(title) = update.title {
        session.title = title;
    }
    if let Some(description) = update.description {
        session.description = Some(description);
    }
    if let Some(is_public) = update.is_public {
        session.is_public = is_public;
    }
    session.updated_at = Utc::now();

    sqlx::query(
        "UPDATE sessions SET title = ?1, description = ?2, is_public = ?3, updated_at = ?4 WHERE id = ?5",
    )
    .bind(&session.title)
    .bind(&session.description)
    .bind(session.is_public)
    .bind(session.updated_at)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(session)
}

/// Delete a session; meetings and transcripts cascade
pub async fn delete_session(pool: &SqlitePool, id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM sessions WHERE id = ?1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Session {} not found", id)));
    }
    Ok(())
}

/// Paginated public gallery, optional case-insensitive title search,
/// newest first
pub async fn list_public(
    pool: &SqlitePool,
    search: Option<&str>,
    page: i64,
    page_size: i64,
) -> Result<(Vec<Session>, Pagination)> {
    let pattern = search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", s));

    let total: i64 = match &pattern {
        Some(p) => {
            sqlx::query_scalar(
                "SELECT COUNT(*) FROM sessions WHERE is_public = 1 AND title LIKE ?1",
            )
            .bind(p)
            .fetch_one(pool)
            .await?
        }
        None => {
            sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE is_public = 1")
                .fetch_one(pool)
                .await?
        }
    };

    let pagination = calculate_pagination(total, page, page_size);

    let sessions = match &pattern {
        Some(p) => {
            sqlx::query_as::<_, Session>(
                "SELECT * FROM sessions WHERE is_public = 1 AND title LIKE ?1 \
                 ORDER BY created_at DESC LIMIT ?2 OFFSET ?3",
            )
            .bind(p)
            .bind(page_size)
            .bind(pagination.offset)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, Session>(
                "SELECT * FROM sessions WHERE is_public = 1 \
                 ORDER BY created_at DESC LIMIT ?1 OFFSET ?2",
            )
            .bind(page_size)
            .bind(pagination.offset)
            .fetch_all(pool)
            .await?
        }
    };

    Ok((sessions, pagination))
}

/// Top voted public sessions, one grouped aggregation instead of a
/// per-session query loop
pub async fn top_voted(pool: &SqlitePool, limit: i64) -> Result<Vec<SessionWithVotes>> {
    let rows = sqlx::query_as::<_, SessionWithVotes>(
        r#"
        SELECT s.*,
               COALESCE(SUM(CASE WHEN v.value = 1 THEN 1 ELSE 0 END), 0) AS upvotes,
               COALESCE(SUM(CASE WHEN v.value = -1 THEN 1 ELSE 0 END), 0) AS downvotes,
               COALESCE(SUM(v.value), 0) AS total
        FROM sessions s
        LEFT JOIN votes v ON v.session_id = s.id
        WHERE s.is_public = 1
        GROUP BY s.id
        ORDER BY total DESC, s.created_at DESC
        LIMIT ?1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
