use sqlx::PgPool;

use crate::models::{CommunityPost, CommunityReply};

pub async fn insert_post(
    pool: &PgPool,
    author_id: i32,
    title: &str,
    body: &str,
    category: &str,
) -> Result<CommunityPost, sqlx::Error> {
    sqlx::query_as::<_, CommunityPost>(
        r#"INSERT INTO community_posts (author_id, title, body, category)
           VALUES ($1, $2, $3, $4)
           RETURNING *"#,
    )
    .bind(author_id)
    .bind(title)
    .bind(body)
    .bind(category)
    .fetch_one(pool)
    .await
}

pub async fn list_posts(
    pool: &PgPool,
    category: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<CommunityPost>, sqlx::Error> {
    sqlx::query_as::<_, CommunityPost>(
        r#"SELECT * FROM community_posts
           WHERE ($1::text IS NULL OR category = $1)
           ORDER BY created_at DESC, id DESC
           LIMIT $2 OFFSET $3"#,
    )
    .bind(category)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub async fn get_post(pool: &PgPool, id: i32) -> Result<Option<CommunityPost>, sqlx::Error> {
    sqlx::query_as::<_, CommunityPost>("SELECT * FROM community_posts WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn update_post(
    pool: &PgPool,
    id: i32,
    title: Option<&str>,
    body: Option<&str>,
    category: Option<&str>,
) -> Result<Option<CommunityPost>, sqlx::Error> {
    sqlx::query_as::<_, CommunityPost>(
        r#"UPDATE community_posts
           SET title = COALESCE($2, title), body = COALESCE($3, body),
               category = COALESCE($4, category), updated_at = NOW()
           WHERE id = $1
           RETURNING *"#,
    )
    .bind(id)
    .bind(title)
    .bind(body)
    .bind(category)
    .fetch_optional(pool)
    .await
}

pub async fn delete_post(pool: &PgPool, id: i32) -> Result<bool, sqlx::Error> {
    let res = sqlx::query("DELETE FROM community_posts WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}

/// Records one like per user; the counter only moves when the like is new.
/// `None` when the post does not exist.
pub async fn like_post(pool: &PgPool, post_id: i32, user_id: i32) -> Result<Option<i32>, sqlx::Error> {
    set_like(pool, post_id, user_id, true).await
}

pub async fn unlike_post(pool: &PgPool, post_id: i32, user_id: i32) -> Result<Option<i32>, sqlx::Error> {
    set_like(pool, post_id, user_id, false).await
}

async fn set_like(pool: &PgPool, post_id: i32, user_id: i32, liked: bool) -> Result<Option<i32>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let Some(current) =
        sqlx::query_scalar::<_, i32>("SELECT like_count FROM community_posts WHERE id = $1 FOR UPDATE")
            .bind(post_id)
            .fetch_optional(&mut *tx)
            .await?
    else {
        return Ok(None);
    };

    let (change, delta) = if liked {
        ("INSERT INTO post_likes (post_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING", 1)
    } else {
        ("DELETE FROM post_likes WHERE post_id = $1 AND user_id = $2", -1)
    };
    let res = sqlx::query(change)
        .bind(post_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    let like_count = if res.rows_affected() > 0 {
        sqlx::query_scalar::<_, i32>(
            r#"UPDATE community_posts SET like_count = GREATEST(like_count + $2, 0)
               WHERE id = $1
               RETURNING like_count"#,
        )
        .bind(post_id)
        .bind(delta)
        .fetch_one(&mut *tx)
        .await?
    } else {
        current
    };

    tx.commit().await?;
    Ok(Some(like_count))
}

/// Inserts the reply and bumps the post counter in one transaction.
pub async fn insert_reply(
    pool: &PgPool,
    post_id: i32,
    author_id: i32,
    body: &str,
) -> Result<CommunityReply, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let reply = sqlx::query_as::<_, CommunityReply>(
        r#"INSERT INTO community_replies (post_id, author_id, body)
           VALUES ($1, $2, $3)
           RETURNING *"#,
    )
    .bind(post_id)
    .bind(author_id)
    .bind(body)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE community_posts SET reply_count = reply_count + 1 WHERE id = $1")
        .bind(post_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(reply)
}

pub async fn list_replies(pool: &PgPool, post_id: i32) -> Result<Vec<CommunityReply>, sqlx::Error> {
    sqlx::query_as::<_, CommunityReply>(
        "SELECT * FROM community_replies WHERE post_id = $1 ORDER BY created_at ASC, id ASC",
    )
    .bind(post_id)
    .fetch_all(pool)
    .await
}

pub async fn get_reply(pool: &PgPool, id: i32) -> Result<Option<CommunityReply>, sqlx::Error> {
    sqlx::query_as::<_, CommunityReply>("SELECT * FROM community_replies WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn delete_reply(pool: &PgPool, reply: &CommunityReply) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    let res = sqlx::query("DELETE FROM community_replies WHERE id = $1")
        .bind(reply.id)
        .execute(&mut *tx)
        .await?;

    if res.rows_affected() > 0 {
        sqlx::query(
            "UPDATE community_posts SET reply_count = GREATEST(reply_count - 1, 0) WHERE id = $1",
        )
        .bind(reply.post_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}
