//! Transcript storage and ordered retrieval
//!
//! (round_number, sequence_number) is the conversational order within a
//! meeting, independent of insertion order or wall-clock time. The SSE
//! poller reads by creation timestamp instead (`newer_than`); its
//! consumers re-sort.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;
use vlab_common::db::models::{MessageRole, Transcript};
use vlab_common::Result;

pub struct NewTranscript {
    pub meeting_id: String,
    pub agent_id: Option<String>,
    pub agent_name: Option<String>,
    pub role: MessageRole,
    pub content: String,
    pub round_number: i64,
    pub sequence_number: i64,
}

pub async fn create_transcript(pool: &SqlitePool, new: NewTranscript) -> Result<Transcript> {
    let now = Utc::now();
    let transcript = Transcript {
        id: Uuid::new_v4().to_string(),
        meeting_id: new.meeting_id,
        agent_id: new.agent_id,
        agent_name: new.agent_name,
        role: new.role,
        content: new.content,
        round_number: new.round_number,
        sequence_number: new.sequence_number,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        "INSERT INTO transcripts (id, meeting_id, agent_id, agent_name, role, content, \
         round_number, sequence_number, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    )
    .bind(&transcript.id)
    .bind(&transcript.meeting_id)
    .bind(&transcript.agent_id)
    .bind(&transcript.agent_name)
    .bind(transcript.role)
    .bind(&transcript.content)
    .bind(transcript.round_number)
    .bind(transcript.sequence_number)
    .bind(transcript.created_at)
    .bind(transcript.updated_at)
    .execute(pool)
    .await?;

    Ok(transcript)
}

/// Transcripts in conversational order, optionally truncated
pub async fn list_for_meeting(
    pool: &SqlitePool,
    meeting_id: &str,
    limit: Option<i64>,
) -> Result<Vec<Transcript>> {
    let rows = match limit {
        Some(n) => {
            sqlx::query_as::<_, Transcript>(
                "SELECT * FROM transcripts WHERE meeting_id = ?1 \
                 ORDER BY round_number ASC, sequence_number ASC, created_at ASC LIMIT ?2",
            )
            .bind(meeting_id)
            .bind(n)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, Transcript>(
                "SELECT * FROM transcripts WHERE meeting_id = ?1 \
                 ORDER BY round_number ASC, sequence_number ASC, created_at ASC",
            )
            .bind(meeting_id)
            .fetch_all(pool)
            .await?
        }
    };
    Ok(rows)
}

/// Transcripts created strictly after `since`, oldest first; the stream
/// poller's delta query
pub async fn newer_than(
    pool: &SqlitePool,
    meeting_id: &str,
    since: DateTime<Utc>,
) -> Result<Vec<Transcript>> {
    let rows = sqlx::query_as::<_, Transcript>(
        "SELECT * FROM transcripts WHERE meeting_id = ?1 AND created_at > ?2 \
         ORDER BY created_at ASC",
    )
    .bind(meeting_id)
    .bind(since)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Total transcript count across every meeting of a session, as one
/// joined aggregate
pub async fn count_for_session(pool: &SqlitePool, session_id: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM transcripts t \
         JOIN meetings m ON m.id = t.meeting_id \
         WHERE m.session_id = ?1",
    )
    .bind(session_id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}
