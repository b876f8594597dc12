use sqlx::PgPool;

use crate::models::{QuickResponse, SupportAgent};

pub struct AgentFields {
    pub display_name: String,
    pub department: String,
    pub is_active: bool,
    pub max_open_tickets: i32,
}

pub async fn insert_agent(pool: &PgPool, user_id: i32, a: &AgentFields) -> Result<SupportAgent, sqlx::Error> {
    sqlx::query_as::<_, SupportAgent>(
        r#"INSERT INTO support_agents (user_id, display_name, department, is_active, max_open_tickets)
           VALUES ($1, $2, $3, $4, $5)
           RETURNING *"#,
    )
    .bind(user_id)
    .bind(&a.display_name)
    .bind(&a.department)
    .bind(a.is_active)
    .bind(a.max_open_tickets)
    .fetch_one(pool)
    .await
}

pub async fn update_agent(pool: &PgPool, id: i32, a: &AgentFields) -> Result<Option<SupportAgent>, sqlx::Error> {
    sqlx::query_as::<_, SupportAgent>(
        r#"UPDATE support_agents
           SET display_name = $2, department = $3, is_active = $4, max_open_tickets = $5
           WHERE id = $1
           RETURNING *"#,
    )
    .bind(id)
    .bind(&a.display_name)
    .bind(&a.department)
    .bind(a.is_active)
    .bind(a.max_open_tickets)
    .fetch_optional(pool)
    .await
}

pub async fn list_agents(pool: &PgPool) -> Result<Vec<SupportAgent>, sqlx::Error> {
    sqlx::query_as::<_, SupportAgent>("SELECT * FROM support_agents ORDER BY department, display_name")
        .fetch_all(pool)
        .await
}

pub async fn get_agent(pool: &PgPool, id: i32) -> Result<Option<SupportAgent>, sqlx::Error> {
    sqlx::query_as::<_, SupportAgent>("SELECT * FROM support_agents WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn delete_agent(pool: &PgPool, id: i32) -> Result<bool, sqlx::Error> {
    let res = sqlx::query("DELETE FROM support_agents WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn active_agent_for_user(pool: &PgPool, user_id: i32) -> Result<Option<SupportAgent>, sqlx::Error> {
    sqlx::query_as::<_, SupportAgent>(
        "SELECT * FROM support_agents WHERE user_id = $1 AND is_active = TRUE",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub async fn insert_quick_response(
    pool: &PgPool,
    agent_id: i32,
    shortcut: &str,
    title: &str,
    content: &str,
) -> Result<QuickResponse, sqlx::Error> {
    sqlx::query_as::<_, QuickResponse>(
        r#"INSERT INTO quick_responses (agent_id, shortcut, title, content)
           VALUES ($1, $2, $3, $4)
           RETURNING *"#,
    )
    .bind(agent_id)
    .bind(shortcut)
    .bind(title)
    .bind(content)
    .fetch_one(pool)
    .await
}

pub async fn list_quick_responses(pool: &PgPool, agent_id: i32) -> Result<Vec<QuickResponse>, sqlx::Error> {
    sqlx::query_as::<_, QuickResponse>(
        "SELECT * FROM quick_responses WHERE agent_id = $1 ORDER BY shortcut",
    )
    .bind(agent_id)
    .fetch_all(pool)
    .await
}

pub async fn get_quick_response(pool: &PgPool, id: i32) -> Result<Option<QuickResponse>, sqlx::Error> {
    sqlx::query_as::<_, QuickResponse>("SELECT * FROM quick_responses WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn update_quick_response(
    pool: &PgPool,
    id: i32,
    shortcut: &str,
    title: &str,
    content: &str,
) -> Result<Option<QuickResponse>, sqlx::Error> {
    sqlx::query_as::<_, QuickResponse>(
        r#"UPDATE quick_responses SET shortcut = $2, title = $3, content = $4
           WHERE id = $1
           RETURNING *"#,
    )
    .bind(id)
    .bind(shortcut)
    .bind(title)
    .bind(content)
    .fetch_optional(pool)
    .await
}

pub async fn delete_quick_response(pool: &PgPool, id: i32) -> Result<bool, sqlx::Error> {
    let res = sqlx::query("DELETE FROM quick_responses WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}
