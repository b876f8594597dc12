use sqlx::{PgConnection, PgPool};

use crate::models::{Course, Lesson};

pub struct CourseFields {
    pub title: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub currency: String,
    pub grade: Option<i32>,
}

pub async fn insert(pool: &PgPool, teacher_id: i32, c: &CourseFields) -> Result<Course, sqlx::Error> {
    sqlx::query_as::<_, Course>(
        r#"INSERT INTO courses (teacher_id, title, description, price_cents, currency, grade)
           VALUES ($1, $2, $3, $4, $5, $6)
           RETURNING *"#,
    )
    .bind(teacher_id)
    .bind(&c.title)
    .bind(&c.description)
    .bind(c.price_cents)
    .bind(&c.currency)
    .bind(c.grade)
    .fetch_one(pool)
    .await
}

pub async fn update(pool: &PgPool, id: i32, c: &CourseFields) -> Result<Option<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(
        r#"UPDATE courses
           SET title = $2, description = $3, price_cents = $4, currency = $5, grade = $6, updated_at = NOW()
           WHERE id = $1
           RETURNING *"#,
    )
    .bind(id)
    .bind(&c.title)
    .bind(&c.description)
    .bind(c.price_cents)
    .bind(&c.currency)
    .bind(c.grade)
    .fetch_optional(pool)
    .await
}

pub async fn set_published(pool: &PgPool, id: i32, published: bool) -> Result<Option<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(
        "UPDATE courses SET is_published = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(published)
    .fetch_optional(pool)
    .await
}

pub async fn get(pool: &PgPool, id: i32) -> Result<Option<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>("SELECT * FROM courses WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_published(
    pool: &PgPool,
    grade: Option<i32>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(
        r#"SELECT * FROM courses
           WHERE is_published = TRUE AND ($1::int IS NULL OR grade = $1)
           ORDER BY created_at DESC
           LIMIT $2 OFFSET $3"#,
    )
    .bind(grade)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub async fn insert_lesson(
    pool: &PgPool,
    course_id: i32,
    title: &str,
    content: &str,
    video_url: Option<&str>,
) -> Result<Lesson, sqlx::Error> {
    sqlx::query_as::<_, Lesson>(
        r#"INSERT INTO lessons (course_id, position, title, content, video_url)
           VALUES ($1, (SELECT COALESCE(MAX(position), 0) + 1 FROM lessons WHERE course_id = $1), $2, $3, $4)
           RETURNING *"#,
    )
    .bind(course_id)
    .bind(title)
    .bind(content)
    .bind(video_url)
    .fetch_one(pool)
    .await
}

pub async fn list_lessons(pool: &PgPool, course_id: i32) -> Result<Vec<Lesson>, sqlx::Error> {
    sqlx::query_as::<_, Lesson>("SELECT * FROM lessons WHERE course_id = $1 ORDER BY position ASC")
        .bind(course_id)
        .fetch_all(pool)
        .await
}

/// Returns false when the user was already enrolled.
pub async fn enroll(conn: &mut PgConnection, user_id: i32, course_id: i32) -> Result<bool, sqlx::Error> {
    let res = sqlx::query(
        "INSERT INTO enrollments (user_id, course_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(course_id)
    .execute(conn)
    .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn is_enrolled(pool: &PgPool, user_id: i32, course_id: i32) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM enrollments WHERE user_id = $1 AND course_id = $2)",
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_one(pool)
    .await
}

pub async fn list_enrolled(pool: &PgPool, user_id: i32) -> Result<Vec<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(
        r#"SELECT c.* FROM courses c
           JOIN enrollments e ON e.course_id = c.id
           WHERE e.user_id = $1
           ORDER BY e.enrolled_at DESC"#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub async fn enrolled_user_ids(pool: &PgPool, course_id: i32) -> Result<Vec<i32>, sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT user_id FROM enrollments WHERE course_id = $1")
        .bind(course_id)
        .fetch_all(pool)
        .await
}
