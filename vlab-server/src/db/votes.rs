//! Vote storage and tallying
//!
//! One row per (voter, session), enforced by a unique index and upserted
//! through ON CONFLICT so repeated votes never duplicate.

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;
use vlab_common::db::models::{Vote, VoteCounts};
use vlab_common::{Error, Result};

/// Clamp a raw vote into {-1, 0, 1}
pub fn clamp_value(value: i64) -> i64 {
    value.clamp(-1, 1)
}

/// Insert or update the caller's vote for a session
pub async fn upsert_vote(
    pool: &SqlitePool,
    session_id: &str,
    user_id: &str,
    value: i64,
) -> Result<Vote> {
    let now = Utc::now();
    let value = clamp_value(value);

    sqlx::query(
        "INSERT INTO votes (id, session_id, user_id, value, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?5) \
         ON CONFLICT(user_id, session_id) \
         DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(session_id)
    .bind(user_id)
    .bind(value)
    .bind(now)
    .execute(pool)
    .await?;

    // Re-read: on conflict the original row id and created_at survive
    get_vote(pool, session_id, user_id)
        .await?
        .ok_or_else(|| Error::Internal("Vote upsert left no row".to_string()))
}

pub async fn get_vote(pool: &SqlitePool, session_id: &str, user_id: &str) -> Result<Option<Vote>> {
    let vote = sqlx::query_as::<_, Vote>(
        "SELECT * FROM votes WHERE session_id = ?1 AND user_id = ?2",
    )
    .bind(session_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(vote)
}

/// Aggregate tallies for one session.
///
/// The three aggregates are computed independently, not derived from one
/// another; they agree because every stored value is -1, 0 or 1.
pub async fn vote_counts(pool: &SqlitePool, session_id: &str) -> Result<VoteCounts> {
    let upvotes: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM votes WHERE session_id = ?1 AND value = 1")
            .bind(session_id)
            .fetch_one(pool)
            .await?;

    let downvotes: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM votes WHERE session_id = ?1 AND value = -1")
            .bind(session_id)
            .fetch_one(pool)
            .await?;

    let total: i64 =
        sqlx::query_scalar("SELECT COALESCE(SUM(value), 0) FROM votes WHERE session_id = ?1")
            .bind(session_id)
            .fetch_one(pool)
            .await?;

    Ok(VoteCounts {
        upvotes,
        downvotes,
        total,
    })
}
