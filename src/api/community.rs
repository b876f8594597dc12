// src/api/community.rs

use actix_web::{delete, get, post, put, web};
use serde::Deserialize;
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::api::auth::AuthUser;
use crate::db;
use crate::error::{created, ok, ApiError, ApiResult};
use crate::ws;
use crate::AppState;

pub const CATEGORIES: &[&str] = &["general", "homework", "exams", "projects", "announcements"];

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PostRequest {
    #[validate(length(min = 3, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 20_000))]
    pub body: String,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PostPatchRequest {
    #[validate(length(min = 3, max = 200))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 20_000))]
    pub body: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ReplyRequest {
    #[validate(length(min = 1, max = 10_000))]
    pub body: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PostQuery {
    pub category: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

fn category_of(raw: Option<&str>) -> Result<Option<String>, ApiError> {
    let Some(raw) = raw.map(|c| c.trim().to_lowercase()).filter(|c| !c.is_empty()) else {
        return Ok(None);
    };
    if !CATEGORIES.contains(&raw.as_str()) {
        return Err(ApiError::BadRequest(format!(
            "category must be one of: {}",
            CATEGORIES.join(", ")
        )));
    }
    Ok(Some(raw))
}

#[utoipa::path(
    post,
    path = "/api/community/posts",
    tag = "community",
    request_body = PostRequest,
    responses((status = 201, description = "Post created")),
    security(("bearer_auth" = []))
)]
#[post("/community/posts")]
pub async fn create_post(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    payload: web::Json<PostRequest>,
) -> ApiResult {
    payload.validate()?;
    let category = category_of(payload.category.as_deref())?.unwrap_or_else(|| "general".to_string());

    let post = db::community::insert_post(
        &state.pool,
        user.id,
        payload.title.trim(),
        payload.body.trim(),
        &category,
    )
    .await?;
    Ok(created(post))
}

#[utoipa::path(
    get,
    path = "/api/community/posts",
    tag = "community",
    params(PostQuery),
    responses((status = 200, description = "Newest posts first")),
    security(("bearer_auth" = []))
)]
#[get("/community/posts")]
pub async fn list_posts(state: web::Data<AppState>, query: web::Query<PostQuery>) -> ApiResult {
    let category = category_of(query.category.as_deref())?;
    let (limit, offset) = db::page_bounds(query.page, query.per_page);
    let posts = db::community::list_posts(&state.pool, category.as_deref(), limit, offset).await?;
    Ok(ok(posts))
}

#[get("/community/posts/{id}")]
pub async fn get_post(state: web::Data<AppState>, path: web::Path<i32>) -> ApiResult {
    let id = path.into_inner();
    let post = db::community::get_post(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound("post"))?;
    let replies = db::community::list_replies(&state.pool, id).await?;
    Ok(ok(json!({ "post": post, "replies": replies })))
}

#[put("/community/posts/{id}")]
pub async fn update_post(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<i32>,
    payload: web::Json<PostPatchRequest>,
) -> ApiResult {
    let id = path.into_inner();
    let post = db::community::get_post(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound("post"))?;
    user.ensure_owner_or_admin(post.author_id)?;

    payload.validate()?;
    let category = category_of(payload.category.as_deref())?;

    let updated = db::community::update_post(
        &state.pool,
        id,
        payload.title.as_deref().map(str::trim),
        payload.body.as_deref().map(str::trim),
        category.as_deref(),
    )
    .await?
    .ok_or(ApiError::NotFound("post"))?;
    Ok(ok(updated))
}

#[delete("/community/posts/{id}")]
pub async fn delete_post(state: web::Data<AppState>, user: web::ReqData<AuthUser>, path: web::Path<i32>) -> ApiResult {
    let id = path.into_inner();
    let post = db::community::get_post(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound("post"))?;
    user.ensure_owner_or_admin(post.author_id)?;

    db::community::delete_post(&state.pool, id).await?;
    Ok(ok(json!({ "deleted": id })))
}

#[post("/community/posts/{id}/replies")]
pub async fn reply_to_post(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<i32>,
    payload: web::Json<ReplyRequest>,
) -> ApiResult {
    payload.validate()?;
    let post = db::community::get_post(&state.pool, path.into_inner())
        .await?
        .ok_or(ApiError::NotFound("post"))?;

    let reply = db::community::insert_reply(&state.pool, post.id, user.id, payload.body.trim()).await?;

    if post.author_id != user.id {
        ws::notify(
            &state.hub,
            vec![post.author_id],
            "community.reply",
            json!({ "post_id": post.id, "reply_id": reply.id, "author_id": user.id }),
        );
    }

    Ok(created(reply))
}

#[delete("/community/replies/{id}")]
pub async fn delete_reply(state: web::Data<AppState>, user: web::ReqData<AuthUser>, path: web::Path<i32>) -> ApiResult {
    let reply = db::community::get_reply(&state.pool, path.into_inner())
        .await?
        .ok_or(ApiError::NotFound("reply"))?;
    user.ensure_owner_or_admin(reply.author_id)?;

    db::community::delete_reply(&state.pool, &reply).await?;
    Ok(ok(json!({ "deleted": reply.id })))
}

/// Liking twice is a no-op.
#[post("/community/posts/{id}/like")]
pub async fn like_post(state: web::Data<AppState>, user: web::ReqData<AuthUser>, path: web::Path<i32>) -> ApiResult {
    let id = path.into_inner();
    let like_count = db::community::like_post(&state.pool, id, user.id)
        .await?
        .ok_or(ApiError::NotFound("post"))?;
    Ok(ok(json!({ "id": id, "liked": true, "like_count": like_count })))
}

#[delete("/community/posts/{id}/like")]
pub async fn unlike_post(state: web::Data<AppState>, user: web::ReqData<AuthUser>, path: web::Path<i32>) -> ApiResult {
    let id = path.into_inner();
    let like_count = db::community::unlike_post(&state.pool, id, user.id)
        .await?
        .ok_or(ApiError::NotFound("post"))?;
    Ok(ok(json!({ "id": id, "liked": false, "like_count": like_count })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_is_normalized() {
        assert_eq!(category_of(Some(" Homework ")).unwrap().as_deref(), Some("homework"));
        assert_eq!(category_of(Some("")).unwrap(), None);
        assert_eq!(category_of(None).unwrap(), None);
    }

    #[test]
    fn unknown_category_is_rejected() {
        assert!(category_of(Some("memes")).is_err());
    }
}
