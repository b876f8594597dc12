// src/api/meetings.rs

use actix_web::{get, post, web};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;
use validator::Validate;

use crate::api::auth::AuthUser;
use crate::api::courses::owned_course;
use crate::db;
use crate::error::{created, ok, ApiError, ApiResult};
use crate::ws;
use crate::AppState;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct MeetingRequest {
    #[validate(length(min = 1, max = 160))]
    pub title: String,
    pub starts_at: DateTime<Utc>,
    #[validate(range(min = 15, max = 240))]
    pub duration_minutes: i32,
    #[validate(url)]
    pub join_url: String,
}

#[utoipa::path(
    post,
    path = "/api/courses/{id}/meetings",
    tag = "meetings",
    request_body = MeetingRequest,
    params(("id" = i32, Path, description = "Course id")),
    responses(
        (status = 201, description = "Meeting scheduled"),
        (status = 400, description = "Start in the past or bad duration"),
        (status = 409, description = "Host already has an overlapping meeting")
    ),
    security(("bearer_auth" = []))
)]
#[post("/courses/{id}/meetings")]
pub async fn schedule_meeting(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<i32>,
    payload: web::Json<MeetingRequest>,
) -> ApiResult {
    let course = owned_course(&state, &user, path.into_inner()).await?;
    let payload = payload.into_inner();
    payload.validate()?;

    if payload.starts_at <= Utc::now() {
        return Err(ApiError::BadRequest("starts_at must be in the future".to_string()));
    }

    // the course owner hosts even when an admin schedules on their behalf
    let host_id = course.teacher_id;
    let ends_at = payload.starts_at + Duration::minutes(i64::from(payload.duration_minutes));
    if db::meetings::host_has_overlap(&state.pool, host_id, payload.starts_at, ends_at).await? {
        return Err(ApiError::Conflict("host already has a meeting in that slot".to_string()));
    }

    let meeting = db::meetings::insert(
        &state.pool,
        &db::meetings::NewMeeting {
            course_id: course.id,
            host_id,
            title: payload.title.trim().to_string(),
            starts_at: payload.starts_at,
            duration_minutes: payload.duration_minutes,
            join_url: payload.join_url,
        },
    )
    .await?;

    let attendees = db::courses::enrolled_user_ids(&state.pool, course.id).await?;
    ws::notify(
        &state.hub,
        attendees,
        "meeting.scheduled",
        json!({
            "meeting_id": meeting.id,
            "course_id": course.id,
            "title": meeting.title,
            "starts_at": meeting.starts_at,
        }),
    );

    log::info!("meeting scheduled id={} course_id={} host_id={}", meeting.id, course.id, host_id);
    Ok(created(meeting))
}

#[get("/meetings/upcoming")]
pub async fn upcoming_meetings(state: web::Data<AppState>, user: web::ReqData<AuthUser>) -> ApiResult {
    Ok(ok(db::meetings::upcoming_for_user(&state.pool, user.id).await?))
}

#[post("/meetings/{id}/cancel")]
pub async fn cancel_meeting(state: web::Data<AppState>, user: web::ReqData<AuthUser>, path: web::Path<i32>) -> ApiResult {
    let id = path.into_inner();
    let meeting = db::meetings::get(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound("meeting"))?;
    user.ensure_owner_or_admin(meeting.host_id)?;

    let canceled = db::meetings::cancel(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::Conflict("meeting is already canceled".to_string()))?;

    let attendees = db::courses::enrolled_user_ids(&state.pool, canceled.course_id).await?;
    ws::notify(
        &state.hub,
        attendees,
        "meeting.canceled",
        json!({ "meeting_id": canceled.id, "course_id": canceled.course_id }),
    );

    Ok(ok(canceled))
}
