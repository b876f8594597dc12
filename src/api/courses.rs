// src/api/courses.rs

use actix_web::{get, post, put, web};
use serde::Deserialize;
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::api::auth::AuthUser;
use crate::db;
use crate::db::courses::CourseFields;
use crate::error::{created, ok, ApiError, ApiResult};
use crate::models::{Course, Role};
use crate::AppState;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CourseRequest {
    #[validate(length(min = 1, max = 160))]
    pub title: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(range(min = 0, max = 10_000_000))]
    pub price_cents: i64,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    #[validate(range(min = 1, max = 12))]
    pub grade: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PublishRequest {
    pub published: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LessonRequest {
    #[validate(length(min = 1, max = 160))]
    pub title: String,
    #[validate(length(max = 100_000))]
    pub content: String,
    #[validate(url)]
    pub video_url: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CourseQuery {
    pub grade: Option<i32>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl CourseRequest {
    fn into_fields(self, default_currency: &str) -> CourseFields {
        CourseFields {
            title: self.title.trim().to_string(),
            description: self.description,
            price_cents: self.price_cents,
            currency: self
                .currency
                .map(|c| c.to_ascii_lowercase())
                .unwrap_or_else(|| default_currency.to_string()),
            grade: self.grade,
        }
    }
}

pub(crate) async fn owned_course(state: &AppState, user: &AuthUser, id: i32) -> Result<Course, ApiError> {
    let course = db::courses::get(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound("course"))?;
    user.ensure_owner_or_admin(course.teacher_id)?;
    Ok(course)
}

#[utoipa::path(
    post,
    path = "/api/courses",
    tag = "courses",
    request_body = CourseRequest,
    responses(
        (status = 201, description = "Course created as a draft"),
        (status = 403, description = "Only teachers create courses")
    ),
    security(("bearer_auth" = []))
)]
#[post("/courses")]
pub async fn create_course(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    payload: web::Json<CourseRequest>,
) -> ApiResult {
    user.require_any(&[Role::Teacher])?;
    let payload = payload.into_inner();
    payload.validate()?;

    let course = db::courses::insert(&state.pool, user.id, &payload.into_fields(&state.config.default_currency)).await?;
    log::info!("course created course_id={} teacher_id={}", course.id, user.id);
    Ok(created(course))
}

#[put("/courses/{id}")]
pub async fn update_course(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<i32>,
    payload: web::Json<CourseRequest>,
) -> ApiResult {
    let course = owned_course(&state, &user, path.into_inner()).await?;
    let payload = payload.into_inner();
    payload.validate()?;

    let updated = db::courses::update(&state.pool, course.id, &payload.into_fields(&state.config.default_currency))
        .await?
        .ok_or(ApiError::NotFound("course"))?;
    Ok(ok(updated))
}

#[post("/courses/{id}/publish")]
pub async fn publish_course(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<i32>,
    payload: web::Json<PublishRequest>,
) -> ApiResult {
    let course = owned_course(&state, &user, path.into_inner()).await?;
    let updated = db::courses::set_published(&state.pool, course.id, payload.published)
        .await?
        .ok_or(ApiError::NotFound("course"))?;
    Ok(ok(updated))
}

#[post("/courses/{id}/lessons")]
pub async fn add_lesson(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<i32>,
    payload: web::Json<LessonRequest>,
) -> ApiResult {
    let course = owned_course(&state, &user, path.into_inner()).await?;
    payload.validate()?;

    let lesson = db::courses::insert_lesson(
        &state.pool,
        course.id,
        payload.title.trim(),
        &payload.content,
        payload.video_url.as_deref(),
    )
    .await?;
    Ok(created(lesson))
}

/// Lesson content is visible to the owner, admins and enrolled users.
#[get("/courses/{id}/lessons")]
pub async fn list_lessons(state: web::Data<AppState>, user: web::ReqData<AuthUser>, path: web::Path<i32>) -> ApiResult {
    let course = db::courses::get(&state.pool, path.into_inner())
        .await?
        .ok_or(ApiError::NotFound("course"))?;

    let allowed = user.is_admin()
        || course.teacher_id == user.id
        || db::courses::is_enrolled(&state.pool, user.id, course.id).await?;
    if !allowed {
        return Err(ApiError::Forbidden("enroll in the course to see its lessons"));
    }

    Ok(ok(db::courses::list_lessons(&state.pool, course.id).await?))
}

#[utoipa::path(
    get,
    path = "/courses",
    tag = "courses",
    params(CourseQuery),
    responses((status = 200, description = "Published courses"))
)]
#[get("/courses")]
pub async fn list_courses(state: web::Data<AppState>, query: web::Query<CourseQuery>) -> ApiResult {
    let (limit, offset) = db::page_bounds(query.page, query.per_page);
    Ok(ok(db::courses::list_published(&state.pool, query.grade, limit, offset).await?))
}

#[utoipa::path(
    post,
    path = "/api/courses/{id}/enroll",
    tag = "courses",
    params(("id" = i32, Path, description = "Course id")),
    responses(
        (status = 200, description = "Enrolled"),
        (status = 402, description = "Paid course; use the payments endpoints"),
        (status = 409, description = "Already enrolled")
    ),
    security(("bearer_auth" = []))
)]
#[post("/courses/{id}/enroll")]
pub async fn enroll(state: web::Data<AppState>, user: web::ReqData<AuthUser>, path: web::Path<i32>) -> ApiResult {
    let course = db::courses::get(&state.pool, path.into_inner())
        .await?
        .filter(|c| c.is_published)
        .ok_or(ApiError::NotFound("course"))?;

    if course.price_cents > 0 {
        return Err(ApiError::PaymentRequired(format!(
            "course costs {} {}; pay via /api/payments with purpose=course",
            course.price_cents, course.currency
        )));
    }

    let mut conn = state.pool.acquire().await?;
    if !db::courses::enroll(&mut conn, user.id, course.id).await? {
        return Err(ApiError::Conflict("already enrolled".to_string()));
    }

    Ok(ok(json!({ "course_id": course.id, "enrolled": true })))
}

#[get("/enrollments")]
pub async fn my_enrollments(state: web::Data<AppState>, user: web::ReqData<AuthUser>) -> ApiResult {
    Ok(ok(db::courses::list_enrolled(&state.pool, user.id).await?))
}
