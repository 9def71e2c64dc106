//! Agent metadata queries
//!
//! Agents are configuration for an external runtime; nothing here
//! executes them.

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;
use vlab_common::db::models::{Agent, AgentStatus};
use vlab_common::{Error, Result};

/// Default model identifier when the caller supplies none
pub const DEFAULT_MODEL: &str = "openai";

pub struct NewAgent {
    pub user_id: String,
    pub session_id: Option<String>,
    pub name: String,
    pub role: String,
    pub expertise: Option<String>,
    pub personality: Option<String>,
    /// Stored as the agent description and folded into the prompt
    pub goal: Option<String>,
    pub model: Option<String>,
}

/// Generate the system prompt handed to the agent runtime
pub fn build_prompt(name: &str, role: &str, expertise: Option<&str>, goal: Option<&str>) -> String {
    let mut prompt = format!("You are {}, a {}", name, role);
    if let Some(expertise) = expertise {
        prompt.push_str(&format!(" with expertise in {}", expertise));
    }
    if let Some(goal) = goal {
        prompt.push_str(&format!(". Your goal is to {}", goal));
    }
    prompt
}

pub async fn create_agent(pool: &SqlitePool, new: NewAgent) -> Result<Agent> {
    let now = Utc::now();
    let prompt = build_prompt(
        &new.name,
        &new.role,
        new.expertise.as_deref(),
        new.goal.as_deref(),
    );

    let agent = Agent {
        id: Uuid::new_v4().to_string(),
        user_id: new.user_id,
        session_id: new.session_id,
        name: new.name,
        role: new.role,
        description: new.goal,
        expertise: new.expertise,
        personality: new.personality,
        status: AgentStatus::Active,
        prompt: Some(prompt),
        model: Some(new.model.unwrap_or_else(|| DEFAULT_MODEL.to_string())),
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        "INSERT INTO agents (id, user_id, session_id, name, role, description, expertise, \
         personality, status, prompt, model, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'active', ?9, ?10, ?11, ?12)",
    )
    .bind(&agent.id)
    .bind(&agent.user_id)
    .bind(&agent.session_id)
    .bind(&agent.name)
    .bind(&agent.role)
    .bind(&agent.description)
    .bind(&agent.expertise)
    .bind(&agent.personality)
    .bind(&agent.prompt)
    .bind(&agent.model)
    .bind(agent.created_at)
    .bind(agent.updated_at)
    .execute(pool)
    .await?;

    Ok(agent)
}

pub async fn get_agent(pool: &SqlitePool, id: &str) -> Result<Option<Agent>> {
    let agent = sqlx::query_as::<_, Agent>("SELECT * FROM agents WHERE id = ?1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(agent)
}

pub async fn list_for_user(pool: &SqlitePool, user_id: &str) -> Result<Vec<Agent>> {
    let agents = sqlx::query_as::<_, Agent>(
        "SELECT * FROM agents WHERE user_id = ?1 ORDER BY created_at ASC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(agents)
}

pub async fn list_for_session(pool: &SqlitePool, session_id: &str) -> Result<Vec<Agent>> {
    let agents = sqlx::query_as::<_, Agent>(
        "SELECT * FROM agents WHERE session_id = ?1 ORDER BY created_at ASC",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;
    Ok(agents)
}

#[derive(Default)]
pub struct AgentUpdate {
    pub name: Option<String>,
    pub role: Option<String>,
    pub expertise: Option<String>,
    pub personality: Option<String>,
    pub description: Option<String>,
    pub status: Option<AgentStatus>,
    pub model: Option<String>,
}

pub async fn update_agent(pool: &SqlitePool, id: &str, update: AgentUpdate) -> Result<Agent> {
    let mut agent = get_agent(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Agent {} not found", id)))?;

    if let Some(name) = update.name {
        agent.name = name;
    }
    if let Some(role) = update.role {
        agent.role = role;
    }
    if let Some(expertise) = update.expertise {
        agent.expertise = Some(expertise);
    }
    if let Some(personality) = update.personality {
        agent.personality = Some(personality);
    }
    if let Some(description) = update.description {
        agent.description = Some(description);
    }
    if let Some(status) = update.status {
        agent.status = status;
    }
    if let Some(model) = update.model {
        agent.model = Some(model);
    }

    // Prompt tracks the fields it was generated from
    agent.prompt = Some(build_prompt(
        &agent.name,
        &agent.role,
        agent.expertise.as_deref(),
        agent.description.as_deref(),
    ));
    agent.updated_at = Utc::now();

    sqlx::query(
        "UPDATE agents SET name = ?1, role = ?2, expertise = ?3, personality = ?4, \
         description = ?5, status = ?6, prompt = ?7, model = ?8, updated_at = ?9 WHERE id = ?10",
    )
    .bind(&agent.name)
    .bind(&agent.role)
    .bind(&agent.expertise)
    .bind(&agent.personality)
    .bind(&agent.description)
    .bind(agent.status)
    .bind(&agent.prompt)
    .bind(&agent.model)
    .bind(agent.updated_at)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(agent)
}

pub async fn delete_agent(pool: &SqlitePool, id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM agents WHERE id = ?1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Agent {} not found", id)));
    }
    Ok(())
}
