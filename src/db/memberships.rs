use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use crate::models::{Membership, MembershipPlan, PlanInterval};

pub struct PlanFields {
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub currency: String,
    pub billing_interval: PlanInterval,
    pub features: Vec<String>,
    pub is_active: bool,
}

pub async fn insert_plan(pool: &PgPool, p: &PlanFields) -> Result<MembershipPlan, sqlx::Error> {
    sqlx::query_as::<_, MembershipPlan>(
        r#"INSERT INTO membership_plans (slug, name, description, price_cents, currency, billing_interval, features, is_active)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
           RETURNING *"#,
    )
    .bind(&p.slug)
    .bind(&p.name)
    .bind(&p.description)
    .bind(p.price_cents)
    .bind(&p.currency)
    .bind(p.billing_interval.as_str())
    .bind(Json(&p.features))
    .bind(p.is_active)
    .fetch_one(pool)
    .await
}

pub async fn update_plan(pool: &PgPool, id: i32, p: &PlanFields) -> Result<Option<MembershipPlan>, sqlx::Error> {
    sqlx::query_as::<_, MembershipPlan>(
        r#"UPDATE membership_plans
           SET slug = $2, name = $3, description = $4, price_cents = $5, currency = $6,
               billing_interval = $7, features = $8, is_active = $9
           WHERE id = $1
           RETURNING *"#,
    )
    .bind(id)
    .bind(&p.slug)
    .bind(&p.name)
    .bind(&p.description)
    .bind(p.price_cents)
    .bind(&p.currency)
    .bind(p.billing_interval.as_str())
    .bind(Json(&p.features))
    .bind(p.is_active)
    .fetch_optional(pool)
    .await
}

/// Soft delete: existing members keep their period.
pub async fn deactivate_plan(pool: &PgPool, id: i32) -> Result<bool, sqlx::Error> {
    let res = sqlx::query("UPDATE membership_plans SET is_active = FALSE WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn get_plan(pool: &PgPool, id: i32) -> Result<Option<MembershipPlan>, sqlx::Error> {
    sqlx::query_as::<_, MembershipPlan>("SELECT * FROM membership_plans WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_active_plans(pool: &PgPool) -> Result<Vec<MembershipPlan>, sqlx::Error> {
    sqlx::query_as::<_, MembershipPlan>(
        "SELECT * FROM membership_plans WHERE is_active = TRUE ORDER BY price_cents ASC",
    )
    .fetch_all(pool)
    .await
}

pub async fn list_for_user(pool: &PgPool, user_id: i32) -> Result<Vec<Membership>, sqlx::Error> {
    sqlx::query_as::<_, Membership>(
        "SELECT * FROM memberships WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// `status = 'canceled'` still grants access until `current_period_end`.
pub async fn cancel(pool: &PgPool, user_id: i32, id: i32) -> Result<Option<Membership>, sqlx::Error> {
    sqlx::query_as::<_, Membership>(
        r#"UPDATE memberships
           SET status = 'canceled', canceled_at = NOW()
           WHERE id = $1 AND user_id = $2 AND status = 'active'
           RETURNING *"#,
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub async fn current_period_end_for_update(
    conn: &mut PgConnection,
    user_id: i32,
    plan_id: i32,
) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
    sqlx::query_scalar::<_, DateTime<Utc>>(
        "SELECT current_period_end FROM memberships WHERE user_id = $1 AND plan_id = $2 FOR UPDATE",
    )
    .bind(user_id)
    .bind(plan_id)
    .fetch_optional(conn)
    .await
}

pub async fn upsert_active(
    conn: &mut PgConnection,
    user_id: i32,
    plan_id: i32,
    period: (DateTime<Utc>, DateTime<Utc>),
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO memberships (user_id, plan_id, status, current_period_start, current_period_end)
           VALUES ($1, $2, 'active', $3, $4)
           ON CONFLICT (user_id, plan_id)
           DO UPDATE SET
               status = 'active',
               current_period_start = EXCLUDED.current_period_start,
               current_period_end = EXCLUDED.current_period_end,
               canceled_at = NULL"#,
    )
    .bind(user_id)
    .bind(plan_id)
    .bind(period.0)
    .bind(period.1)
    .execute(conn)
    .await?;
    Ok(())
}
