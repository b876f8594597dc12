use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::StudyNote;

pub struct NewNote {
    pub course_id: Option<i32>,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub is_pinned: bool,
}

/// Absent fields keep their stored value; `course_id: Some(None)` detaches the note.
#[derive(Default)]
pub struct NotePatch {
    pub course_id: Option<Option<i32>>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_pinned: Option<bool>,
}

pub async fn insert(pool: &PgPool, user_id: i32, note: &NewNote) -> Result<StudyNote, sqlx::Error> {
    sqlx::query_as::<_, StudyNote>(
        r#"INSERT INTO study_notes (user_id, course_id, title, content, tags, is_pinned)
           VALUES ($1, $2, $3, $4, $5, $6)
           RETURNING *"#,
    )
    .bind(user_id)
    .bind(note.course_id)
    .bind(&note.title)
    .bind(&note.content)
    .bind(Json(&note.tags))
    .bind(note.is_pinned)
    .fetch_one(pool)
    .await
}

pub async fn get(pool: &PgPool, id: i32) -> Result<Option<StudyNote>, sqlx::Error> {
    sqlx::query_as::<_, StudyNote>("SELECT * FROM study_notes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Pinned first, then most recently edited.
pub async fn list(pool: &PgPool, user_id: i32, course_id: Option<i32>) -> Result<Vec<StudyNote>, sqlx::Error> {
    sqlx::query_as::<_, StudyNote>(
        r#"SELECT * FROM study_notes
           WHERE user_id = $1 AND ($2::int IS NULL OR course_id = $2)
           ORDER BY is_pinned DESC, updated_at DESC"#,
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_all(pool)
    .await
}

pub async fn update(pool: &PgPool, id: i32, patch: &NotePatch) -> Result<Option<StudyNote>, sqlx::Error> {
    sqlx::query_as::<_, StudyNote>(
        r#"UPDATE study_notes
           SET course_id = CASE WHEN $7 THEN $2 ELSE course_id END,
               title = COALESCE($3, title),
               content = COALESCE($4, content),
               tags = COALESCE($5, tags),
               is_pinned = COALESCE($6, is_pinned),
               updated_at = NOW()
           WHERE id = $1
           RETURNING *"#,
    )
    .bind(id)
    .bind(patch.course_id.flatten())
    .bind(&patch.title)
    .bind(&patch.content)
    .bind(patch.tags.as_ref().map(Json))
    .bind(patch.is_pinned)
    .bind(patch.course_id.is_some())
    .fetch_optional(pool)
    .await
}

pub async fn delete(pool: &PgPool, id: i32) -> Result<bool, sqlx::Error> {
    let res = sqlx::query("DELETE FROM study_notes WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}
