use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use crate::models::{AdBanner, AdStatus, Placement};
use crate::targeting::TargetingCriteria;

pub struct AdFields {
    pub title: String,
    pub target_url: String,
    pub placement: Placement,
    pub criteria: TargetingCriteria,
    pub duration_days: i32,
    pub price_cents: i64,
}

pub async fn insert(pool: &PgPool, owner_id: i32, ad: &AdFields) -> Result<AdBanner, sqlx::Error> {
    sqlx::query_as::<_, AdBanner>(
        r#"INSERT INTO ad_banners
               (owner_id, title, target_url, placement, target_countries, min_age, max_age,
                target_grades, duration_days, price_cents, status)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
           RETURNING *"#,
    )
    .bind(owner_id)
    .bind(&ad.title)
    .bind(&ad.target_url)
    .bind(ad.placement.as_str())
    .bind(Json(&ad.criteria.countries))
    .bind(ad.criteria.min_age)
    .bind(ad.criteria.max_age)
    .bind(Json(&ad.criteria.grades))
    .bind(ad.duration_days)
    .bind(ad.price_cents)
    .bind(AdStatus::PendingPayment.as_str())
    .fetch_one(pool)
    .await
}

pub async fn update(pool: &PgPool, id: i32, ad: &AdFields) -> Result<Option<AdBanner>, sqlx::Error> {
    sqlx::query_as::<_, AdBanner>(
        r#"UPDATE ad_banners
           SET title = $2, target_url = $3, placement = $4, target_countries = $5,
               min_age = $6, max_age = $7, target_grades = $8, duration_days = $9,
               price_cents = $10, updated_at = NOW()
           WHERE id = $1
           RETURNING *"#,
    )
    .bind(id)
    .bind(&ad.title)
    .bind(&ad.target_url)
    .bind(ad.placement.as_str())
    .bind(Json(&ad.criteria.countries))
    .bind(ad.criteria.min_age)
    .bind(ad.criteria.max_age)
    .bind(Json(&ad.criteria.grades))
    .bind(ad.duration_days)
    .bind(ad.price_cents)
    .fetch_optional(pool)
    .await
}

pub async fn get(pool: &PgPool, id: i32) -> Result<Option<AdBanner>, sqlx::Error> {
    sqlx::query_as::<_, AdBanner>("SELECT * FROM ad_banners WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_by_owner(pool: &PgPool, owner_id: i32) -> Result<Vec<AdBanner>, sqlx::Error> {
    sqlx::query_as::<_, AdBanner>(
        "SELECT * FROM ad_banners WHERE owner_id = $1 ORDER BY created_at DESC",
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await
}

pub async fn list_by_status(pool: &PgPool, status: Option<AdStatus>) -> Result<Vec<AdBanner>, sqlx::Error> {
    sqlx::query_as::<_, AdBanner>(
        r#"SELECT * FROM ad_banners
           WHERE ($1::text IS NULL OR status = $1)
           ORDER BY created_at ASC"#,
    )
    .bind(status.map(AdStatus::as_str))
    .fetch_all(pool)
    .await
}

pub async fn delete(pool: &PgPool, id: i32) -> Result<bool, sqlx::Error> {
    let res = sqlx::query("DELETE FROM ad_banners WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}

/// Approve (with a serving window) or reject an ad that is awaiting review.
pub async fn set_review(
    pool: &PgPool,
    id: i32,
    status: AdStatus,
    reason: Option<&str>,
    window: Option<(DateTime<Utc>, DateTime<Utc>)>,
) -> Result<Option<AdBanner>, sqlx::Error> {
    sqlx::query_as::<_, AdBanner>(
        r#"UPDATE ad_banners
           SET status = $2, rejection_reason = $3, starts_at = $4, ends_at = $5, updated_at = NOW()
           WHERE id = $1 AND status = 'pending_review'
           RETURNING *"#,
    )
    .bind(id)
    .bind(status.as_str())
    .bind(reason)
    .bind(window.map(|(start, _)| start))
    .bind(window.map(|(_, end)| end))
    .fetch_optional(pool)
    .await
}

pub async fn set_image_url(pool: &PgPool, id: i32, image_url: &str) -> Result<Option<AdBanner>, sqlx::Error> {
    sqlx::query_as::<_, AdBanner>(
        "UPDATE ad_banners SET image_url = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(image_url)
    .fetch_optional(pool)
    .await
}

/// Ads that could be served right now for the placement; viewer filters run in Rust.
pub async fn serving_candidates(
    pool: &PgPool,
    placement: Placement,
    now: DateTime<Utc>,
) -> Result<Vec<AdBanner>, sqlx::Error> {
    sqlx::query_as::<_, AdBanner>(
        r#"SELECT * FROM ad_banners
           WHERE placement = $1 AND status = 'active' AND starts_at <= $2 AND ends_at > $2"#,
    )
    .bind(placement.as_str())
    .bind(now)
    .fetch_all(pool)
    .await
}

pub async fn record_impressions(pool: &PgPool, ids: &[i32]) -> Result<(), sqlx::Error> {
    if ids.is_empty() {
        return Ok(());
    }
    sqlx::query("UPDATE ad_banners SET impressions = impressions + 1 WHERE id = ANY($1)")
        .bind(ids)
        .execute(pool)
        .await?;
    Ok(())
}

/// Counts a click on a live ad and returns where to send the viewer.
pub async fn record_click(pool: &PgPool, id: i32) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        r#"UPDATE ad_banners SET clicks = clicks + 1
           WHERE id = $1 AND status = 'active' AND starts_at <= NOW() AND ends_at > NOW()
           RETURNING target_url"#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Status and price of an ad, locked until the surrounding transaction ends.
pub async fn lock_for_payment(conn: &mut PgConnection, id: i32) -> Result<Option<(String, i64)>, sqlx::Error> {
    sqlx::query_as::<_, (String, i64)>("SELECT status, price_cents FROM ad_banners WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(conn)
        .await
}

pub async fn mark_paid(conn: &mut PgConnection, id: i32) -> Result<bool, sqlx::Error> {
    let res = sqlx::query(
        r#"UPDATE ad_banners SET status = 'pending_review', updated_at = NOW()
           WHERE id = $1 AND status = 'pending_payment'"#,
    )
    .bind(id)
    .execute(conn)
    .await?;
    Ok(res.rows_affected() > 0)
}
