// src/api/notes.rs

use actix_web::{delete, get, post, put, web};
use serde::{Deserialize, Deserializer};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::api::auth::AuthUser;
use crate::db;
use crate::db::notes::{NewNote, NotePatch};
use crate::error::{created, ok, ApiError, ApiResult};
use crate::models::StudyNote;
use crate::AppState;

const MAX_TAGS: usize = 20;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct NoteRequest {
    pub course_id: Option<i32>,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 100_000))]
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_pinned: bool,
}

/// Absent keeps the value, `null` clears it.
fn present<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

/// Autosave sends only the fields that changed; `"course_id": null` detaches the note.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct NotePatchRequest {
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<i32>)]
    pub course_id: Option<Option<i32>>,
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 100_000))]
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_pinned: Option<bool>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NoteQuery {
    pub course_id: Option<i32>,
}

/// Trimmed, lowercased and deduplicated, in first-seen order.
pub fn clean_tags(tags: Vec<String>) -> Result<Vec<String>, ApiError> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if tag.is_empty() || out.contains(&tag) {
            continue;
        }
        if tag.chars().count() > 32 {
            return Err(ApiError::BadRequest(format!("tag `{tag}` is longer than 32 characters")));
        }
        out.push(tag);
    }
    if out.len() > MAX_TAGS {
        return Err(ApiError::BadRequest(format!("at most {MAX_TAGS} tags per note")));
    }
    Ok(out)
}

async fn check_course(state: &AppState, course_id: Option<i32>) -> Result<(), ApiError> {
    if let Some(id) = course_id {
        db::courses::get(&state.pool, id)
            .await?
            .ok_or(ApiError::NotFound("course"))?;
    }
    Ok(())
}

async fn own_note(state: &AppState, user: &AuthUser, id: i32) -> Result<StudyNote, ApiError> {
    db::notes::get(&state.pool, id)
        .await?
        .filter(|note| note.user_id == user.id)
        .ok_or(ApiError::NotFound("note"))
}

#[utoipa::path(
    post,
    path = "/api/notes",
    tag = "notes",
    request_body = NoteRequest,
    responses((status = 201, description = "Note created")),
    security(("bearer_auth" = []))
)]
#[post("/notes")]
pub async fn create_note(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    payload: web::Json<NoteRequest>,
) -> ApiResult {
    let payload = payload.into_inner();
    payload.validate()?;
    check_course(&state, payload.course_id).await?;

    let note = db::notes::insert(
        &state.pool,
        user.id,
        &NewNote {
            course_id: payload.course_id,
            title: payload.title.trim().to_string(),
            content: payload.content,
            tags: clean_tags(payload.tags)?,
            is_pinned: payload.is_pinned,
        },
    )
    .await?;
    Ok(created(note))
}

#[get("/notes")]
pub async fn list_notes(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    query: web::Query<NoteQuery>,
) -> ApiResult {
    Ok(ok(db::notes::list(&state.pool, user.id, query.course_id).await?))
}

#[get("/notes/{id}")]
pub async fn get_note(state: web::Data<AppState>, user: web::ReqData<AuthUser>, path: web::Path<i32>) -> ApiResult {
    Ok(ok(own_note(&state, &user, path.into_inner()).await?))
}

#[utoipa::path(
    put,
    path = "/api/notes/{id}",
    tag = "notes",
    request_body = NotePatchRequest,
    params(("id" = i32, Path, description = "Note id")),
    responses(
        (status = 200, description = "Note updated"),
        (status = 404, description = "No such note for this user")
    ),
    security(("bearer_auth" = []))
)]
#[put("/notes/{id}")]
pub async fn update_note(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<i32>,
    payload: web::Json<NotePatchRequest>,
) -> ApiResult {
    let note = own_note(&state, &user, path.into_inner()).await?;
    let payload = payload.into_inner();
    payload.validate()?;
    check_course(&state, payload.course_id.flatten()).await?;

    let patch = NotePatch {
        course_id: payload.course_id,
        title: payload.title.map(|t| t.trim().to_string()),
        content: payload.content,
        tags: payload.tags.map(clean_tags).transpose()?,
        is_pinned: payload.is_pinned,
    };

    let updated = db::notes::update(&state.pool, note.id, &patch)
        .await?
        .ok_or(ApiError::NotFound("note"))?;
    Ok(ok(updated))
}

#[delete("/notes/{id}")]
pub async fn delete_note(state: web::Data<AppState>, user: web::ReqData<AuthUser>, path: web::Path<i32>) -> ApiResult {
    let note = own_note(&state, &user, path.into_inner()).await?;
    db::notes::delete(&state.pool, note.id).await?;
    Ok(ok(json!({ "deleted": note.id })))
}
