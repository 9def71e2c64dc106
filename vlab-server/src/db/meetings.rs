//! Meeting lifecycle queries
//!
//! Status transitions are recorded, not scheduled: the agent runtime that
//! actually executes rounds lives outside this service.

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;
use vlab_common::db::models::{Meeting, MeetingStatus, Session};
use vlab_common::{Error, Result};

pub struct NewMeeting {
    pub session_id: String,
    pub title: Option<String>,
    pub agenda: Option<String>,
    pub task_description: Option<String>,
    pub max_rounds: Option<i64>,
    pub is_parallel: bool,
    pub parallel_index: i64,
}

/// Create a pending meeting under a session
pub async fn create_meeting(pool: &SqlitePool, new: NewMeeting) -> Result<Meeting> {
    let now = Utc::now();
    let meeting = Meeting {
        id: Uuid::new_v4().to_string(),
        session_id: new.session_id,
        title: new.title,
        agenda: new.agenda,
        task_description: new.task_description,
        max_rounds: new.max_rounds.unwrap_or(3),
        current_round: 0,
        status: MeetingStatus::Pending,
        is_parallel: new.is_parallel,
        parallel_index: new.parallel_index,
        completed_at: None,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        "INSERT INTO meetings (id, session_id, title, agenda, task_description, max_rounds, \
         current_round, status, is_parallel, parallel_index, completed_at, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 'pending', ?7, ?8, NULL, ?9, ?10)",
    )
    .bind(&meeting.id)
    .bind(&meeting.session_id)
    .bind(&meeting.title)
    .bind(&meeting.agenda)
    .bind(&meeting.task_description)
    .bind(meeting.max_rounds)
    .bind(meeting.is_parallel)
    .bind(meeting.parallel_index)
    .bind(meeting.created_at)
    .bind(meeting.updated_at)
    .execute(pool)
    .await?;

    Ok(meeting)
}

pub async fn get_meeting(pool: &SqlitePool, id: &str) -> Result<Option<Meeting>> {
    let meeting = sqlx::query_as::<_, Meeting>("SELECT * FROM meetings WHERE id = ?1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(meeting)
}

/// Meeting plus its parent session, for access checks
pub async fn get_meeting_with_session(
    pool: &SqlitePool,
    id: &str,
) -> Result<Option<(Meeting, Session)>> {
    let Some(meeting) = get_meeting(pool, id).await? else {
        return Ok(None);
    };

    let session = sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE id = ?1")
        .bind(&meeting.session_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::Internal(format!("Meeting {} has no parent session", id)))?;

    Ok(Some((meeting, session)))
}

pub async fn list_for_session(pool: &SqlitePool, session_id: &str) -> Result<Vec<Meeting>> {
    let meetings = sqlx::query_as::<_, Meeting>(
        "SELECT * FROM meetings WHERE session_id = ?1 ORDER BY created_at ASC",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;
    Ok(meetings)
}

/// Meetings whose rounds may still execute: status pending or in_progress
pub async fn active_meetings(pool: &SqlitePool, session_id: &str) -> Result<Vec<Meeting>> {
    let meetings = sqlx::query_as::<_, Meeting>(
        "SELECT * FROM meetings WHERE session_id = ?1 \
         AND status IN ('pending', 'in_progress') ORDER BY created_at ASC",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;
    Ok(meetings)
}

/// Meetings in the base meeting's parallel cohort.
///
/// A nonzero parallel_index groups strictly by index. Index 0 falls back
/// to the is_parallel flag, which merges unrelated index-0 cohorts; the
/// fallback is kept for compatibility with existing callers.
pub async fn parallel_meetings(
    pool: &SqlitePool,
    session_id: &str,
    base_meeting_id: &str,
) -> Result<Vec<Meeting>> {
    let base = get_meeting(pool, base_meeting_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Meeting {} not found", base_meeting_id)))?;

    let meetings = if base.parallel_index != 0 {
        sqlx::query_as::<_, Meeting>(
            "SELECT * FROM meetings WHERE session_id = ?1 AND parallel_index = ?2 \
             ORDER BY created_at ASC",
        )
        .bind(session_id)
        .bind(base.parallel_index)
        .fetch_all(pool)
        .await?
    } else {
        sqlx::query_as::<_, Meeting>(
            "SELECT * FROM meetings WHERE session_id = ?1 AND is_parallel = 1 \
             ORDER BY created_at ASC",
        )
        .bind(session_id)
        .fetch_all(pool)
        .await?
    };

    Ok(meetings)
}

/// Force a meeting to completed and stamp completion time.
///
/// Idempotent: ending an already-completed meeting returns it unchanged,
/// preserving the original completed_at.
pub async fn end_meeting(pool: &SqlitePool, id: &str) -> Result<Meeting> {
    let mut meeting = get_meeting(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Meeting {} not found", id)))?;

    if meeting.status == MeetingStatus::Completed {
        return Ok(meeting);
    }

    let now = Utc::now();
    sqlx::query(
        "UPDATE meetings SET status = 'completed', completed_at = ?1, updated_at = ?1 WHERE id = ?2",
    )
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;

    meeting.status = MeetingStatus::Completed;
    meeting.completed_at = Some(now);
    meeting.updated_at = now;
    Ok(meeting)
}

/// Bulk-complete every in_progress meeting under a session.
///
/// Returns the number of meetings transitioned; zero affected is success.
pub async fn end_all_for_session(pool: &SqlitePool, session_id: &str) -> Result<u64> {
    let now = Utc::now();
    let result = sqlx::query(
        "UPDATE meetings SET status = 'completed', completed_at = ?1, updated_at = ?1 \
         WHERE session_id = ?2 AND status = 'in_progress'",
    )
    .bind(now)
    .bind(session_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

#[derive(Default)]
pub struct MeetingUpdate {
    pub title: Option<String>,
    pub agenda: Option<String>,
    pub task_description: Option<String>,
    pub max_rounds: Option<i64>,
    pub current_round: Option<i64>,
    pub status: Option<MeetingStatus>,
}

/// Record externally-driven progress (round counter, status) and metadata
/// edits
pub async fn update_meeting(pool: &SqlitePool, id: &str, update: MeetingUpdate) -> Result<Meeting> {
    let mut meeting = get_meeting(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Meeting {} not found", id)))?;

    if let Some(title) = update.title {
        meeting.title = Some(title);
    }
    if let Some(agenda) = update.agenda {
        meeting.agenda = Some(agenda);
    }
    if let Some(task_description) = update.task_description {
        meeting.task_description = Some(task_description);
    }
    if let Some(max_rounds) = update.max_rounds {
        meeting.max_rounds = max_rounds;
    }
    if let Some(current_round) = update.current_round {
        meeting.current_round = current_round;
    }
    if let Some(status) = update.status {
        meeting.status = status;
    }
    meeting.updated_at = Utc::now();

    sqlx::query(
        "UPDATE meetings SET title = ?1, agenda = ?2, task_description = ?3, max_rounds = ?4, \
         current_round = ?5, status = ?6, updated_at = ?7 WHERE id = ?8",
    )
    .bind(&meeting.title)
    .bind(&meeting.agenda)
    .bind(&meeting.task_description)
    .bind(meeting.max_rounds)
    .bind(meeting.current_round)
    .bind(meeting.status)
    .bind(meeting.updated_at)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(meeting)
}

/// Delete a meeting; its transcripts cascade
pub async fn delete_meeting(pool: &SqlitePool, id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM meetings WHERE id = ?1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Meeting {} not found", id)));
    }
    Ok(())
}
