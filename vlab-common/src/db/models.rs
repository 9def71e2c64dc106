//! Database models
//!
//! Row types are serialized with camelCase wire names so the JSON surface
//! matches what existing bot integrations already parse (`sessionId`,
//! `isPublic`, ...). Status enums are stored as snake_case TEXT.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A research/brainstorming session owned by one user
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub is_public: bool,
    /// At most one active session per owner at any observation point
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Meeting lifecycle: pending -> in_progress -> completed, with a
/// separate terminal failed state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum MeetingStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl MeetingStatus {
    /// Active means rounds may still execute (status-based definition)
    pub fn is_active(&self) -> bool {
        matches!(self, MeetingStatus::Pending | MeetingStatus::InProgress)
    }
}

/// An agent meeting under a session
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    pub id: String,
    pub session_id: String,
    pub title: Option<String>,
    pub agenda: Option<String>,
    pub task_description: Option<String>,
    pub max_rounds: i64,
    /// Advanced externally by the agent runtime; this service only records it
    pub current_round: i64,
    pub status: MeetingStatus,
    pub is_parallel: bool,
    /// Meetings sharing a nonzero index form one parallel cohort;
    /// index 0 falls back to the is_parallel flag
    pub parallel_index: i64,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum AgentStatus {
    Active,
    Inactive,
}

/// Agent metadata; the prompt/model fields configure an external runtime,
/// agents do not execute here
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    pub user_id: String,
    pub session_id: Option<String>,
    pub name: String,
    pub role: String,
    pub description: Option<String>,
    pub expertise: Option<String>,
    pub personality: Option<String>,
    pub status: AgentStatus,
    pub prompt: Option<String>,
    pub model: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// One conversational message within a meeting
///
/// Within a meeting, (round_number, sequence_number) defines a total order
/// that reconstructs conversational order; round 0 holds messages outside
/// any numbered round.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Transcript {
    pub id: String,
    pub meeting_id: String,
    /// Informational reference only; survives agent deletion
    pub agent_id: Option<String>,
    pub agent_name: Option<String>,
    pub role: MessageRole,
    pub content: String,
    pub round_number: i64,
    pub sequence_number: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One vote row per (session, voter); value is -1, 0 or 1
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub id: String,
    pub session_id: String,
    pub user_id: String,
    pub value: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Aggregated vote tallies for one session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteCounts {
    pub upvotes: i64,
    pub downvotes: i64,
    pub total: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meeting_status_active_definition() {
        assert!(MeetingStatus::Pending.is_active());
        assert!(MeetingStatus::InProgress.is_active());
        assert!(!MeetingStatus::Completed.is_active());
        assert!(!MeetingStatus::Failed.is_active());
    }

    #[test]
    fn test_session_wire_names_are_camel_case() {
        let session = Session {
            id: "s1".into(),
            user_id: "u1".into(),
            title: "Protein folding".into(),
            description: None,
            is_public: true,
            is_active: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["isPublic"], true);
        assert!(json.get("user_id").is_none());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(MeetingStatus::InProgress).unwrap(),
            "in_progress"
        );
        assert_eq!(serde_json::to_value(MessageRole::Assistant).unwrap(), "assistant");
    }
}
