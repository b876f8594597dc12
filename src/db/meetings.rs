use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::Meeting;

pub struct NewMeeting {
    pub course_id: i32,
    pub host_id: i32,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub join_url: String,
}

pub async fn insert(pool: &PgPool, m: &NewMeeting) -> Result<Meeting, sqlx::Error> {
    sqlx::query_as::<_, Meeting>(
        r#"INSERT INTO meetings (course_id, host_id, title, starts_at, duration_minutes, join_url)
           VALUES ($1, $2, $3, $4, $5, $6)
           RETURNING *"#,
    )
    .bind(m.course_id)
    .bind(m.host_id)
    .bind(&m.title)
    .bind(m.starts_at)
    .bind(m.duration_minutes)
    .bind(&m.join_url)
    .fetch_one(pool)
    .await
}

/// Scheduled meetings of the host that intersect `[starts_at, ends_at)`.
pub async fn host_has_overlap(
    pool: &PgPool,
    host_id: i32,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        r#"SELECT EXISTS(
               SELECT 1 FROM meetings
               WHERE host_id = $1 AND status = 'scheduled'
                 AND starts_at < $3
                 AND starts_at + make_interval(mins => duration_minutes) > $2)"#,
    )
    .bind(host_id)
    .bind(starts_at)
    .bind(ends_at)
    .fetch_one(pool)
    .await
}

pub async fn get(pool: &PgPool, id: i32) -> Result<Option<Meeting>, sqlx::Error> {
    sqlx::query_as::<_, Meeting>("SELECT * FROM meetings WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Meetings the user hosts or attends through an enrollment, not yet finished.
pub async fn upcoming_for_user(pool: &PgPool, user_id: i32) -> Result<Vec<Meeting>, sqlx::Error> {
    sqlx::query_as::<_, Meeting>(
        r#"SELECT m.* FROM meetings m
           WHERE m.status = 'scheduled'
             AND m.starts_at + make_interval(mins => m.duration_minutes) > NOW()
             AND (m.host_id = $1
                  OR EXISTS(SELECT 1 FROM enrollments e WHERE e.course_id = m.course_id AND e.user_id = $1))
           ORDER BY m.starts_at ASC"#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub async fn cancel(pool: &PgPool, id: i32) -> Result<Option<Meeting>, sqlx::Error> {
    sqlx::query_as::<_, Meeting>(
        r#"UPDATE meetings SET status = 'canceled'
           WHERE id = $1 AND status = 'scheduled'
           RETURNING *"#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}
