// src/api/ads.rs

use actix_multipart::Multipart;
use actix_web::{delete, get, post, put, web, HttpRequest};
use chrono::{Duration, Utc};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::{IpAddr, SocketAddr};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::api::auth::AuthUser;
use crate::billing;
use crate::db;
use crate::error::{created, ok, ApiError, ApiResult};
use crate::models::{AdBanner, AdStatus, PaymentPurpose, Placement, Role};
use crate::s3_utils::image_extension;
use crate::targeting::{self, TargetingCriteria, TargetingLevel, Viewer};
use crate::AppState;

const MAX_IMAGE_BYTES: usize = 2 * 1024 * 1024;
const MAX_SERVE_LIMIT: usize = 10;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct QuoteRequest {
    pub placement: Placement,
    pub duration_days: i32,
    #[serde(default)]
    pub countries: Vec<String>,
    pub min_age: Option<i32>,
    pub max_age: Option<i32>,
    #[serde(default)]
    pub grades: Vec<i32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct QuoteResponse {
    pub price_cents: i64,
    pub base_price_cents: i64,
    pub multiplier_percent: i64,
    #[schema(value_type = String)]
    pub level: TargetingLevel,
    pub duration_days: i32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AdRequest {
    #[validate(length(min = 1, max = 120))]
    pub title: String,
    #[validate(url)]
    pub target_url: String,
    pub placement: Placement,
    pub duration_days: i32,
    #[serde(default)]
    pub countries: Vec<String>,
    pub min_age: Option<i32>,
    pub max_age: Option<i32>,
    #[serde(default)]
    pub grades: Vec<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    Reject,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ReviewRequest {
    pub decision: ReviewDecision,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StatusFilter {
    pub status: Option<AdStatus>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ServeQuery {
    pub placement: Placement,
    pub age: Option<i32>,
    pub grade: Option<i32>,
    pub country: Option<String>,
    pub limit: Option<usize>,
}

/// What the page renderer gets; targeting and billing fields stay private.
#[derive(Debug, Serialize, ToSchema)]
pub struct ServedAd {
    pub id: i32,
    pub title: String,
    pub image_url: Option<String>,
    pub placement: String,
}

impl From<AdBanner> for ServedAd {
    fn from(ad: AdBanner) -> Self {
        Self {
            id: ad.id,
            title: ad.title,
            image_url: ad.image_url,
            placement: ad.placement,
        }
    }
}

fn criteria_of(
    countries: Vec<String>,
    min_age: Option<i32>,
    max_age: Option<i32>,
    grades: Vec<i32>,
) -> Result<TargetingCriteria, ApiError> {
    Ok(TargetingCriteria {
        countries,
        min_age,
        max_age,
        grades,
    }
    .normalized()?)
}

fn build_quote(
    placement: Placement,
    duration_days: i32,
    criteria: &TargetingCriteria,
) -> Result<QuoteResponse, ApiError> {
    let level = criteria.level();
    let base_price_cents = targeting::base_price(duration_days, level)?;
    Ok(QuoteResponse {
        price_cents: targeting::quote(placement, duration_days, criteria)?,
        base_price_cents,
        multiplier_percent: targeting::placement_multiplier(placement),
        level,
        duration_days,
    })
}

async fn owned_ad(state: &AppState, user: &AuthUser, id: i32) -> Result<AdBanner, ApiError> {
    let ad = db::ads::get(&state.pool, id).await?.ok_or(ApiError::NotFound("ad"))?;
    user.ensure_owner_or_admin(ad.owner_id)?;
    Ok(ad)
}

#[utoipa::path(
    post,
    path = "/api/ads/quote",
    tag = "ads",
    request_body = QuoteRequest,
    responses(
        (status = 200, description = "Price for the campaign", body = QuoteResponse),
        (status = 400, description = "Unsupported duration or bad targeting")
    ),
    security(("bearer_auth" = []))
)]
#[post("/ads/quote")]
pub async fn quote_ad(payload: web::Json<QuoteRequest>) -> ApiResult {
    let payload = payload.into_inner();
    payload.validate()?;

    let criteria = criteria_of(payload.countries, payload.min_age, payload.max_age, payload.grades)?;
    Ok(ok(build_quote(payload.placement, payload.duration_days, &criteria)?))
}

#[utoipa::path(
    post,
    path = "/api/ads",
    tag = "ads",
    request_body = AdRequest,
    responses(
        (status = 201, description = "Ad created, awaiting payment"),
        (status = 400, description = "Invalid data"),
        (status = 403, description = "Students cannot advertise")
    ),
    security(("bearer_auth" = []))
)]
#[post("/ads")]
pub async fn create_ad(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    payload: web::Json<AdRequest>,
) -> ApiResult {
    user.require_any(&[Role::Teacher, Role::Freelancer])?;
    let payload = payload.into_inner();
    payload.validate()?;

    let criteria = criteria_of(payload.countries, payload.min_age, payload.max_age, payload.grades)?;
    let price_cents = targeting::quote(payload.placement, payload.duration_days, &criteria)?;

    let ad = db::ads::insert(
        &state.pool,
        user.id,
        &db::ads::AdFields {
            title: payload.title.trim().to_string(),
            target_url: payload.target_url,
            placement: payload.placement,
            criteria,
            duration_days: payload.duration_days,
            price_cents,
        },
    )
    .await?;

    log::info!("ad created ad_id={} owner_id={} price={}", ad.id, user.id, price_cents);
    Ok(created(ad))
}

#[get("/ads/mine")]
pub async fn my_ads(state: web::Data<AppState>, user: web::ReqData<AuthUser>) -> ApiResult {
    Ok(ok(db::ads::list_by_owner(&state.pool, user.id).await?))
}

#[get("/ads/{id}")]
pub async fn get_ad(state: web::Data<AppState>, user: web::ReqData<AuthUser>, path: web::Path<i32>) -> ApiResult {
    Ok(ok(owned_ad(&state, &user, path.into_inner()).await?))
}

#[utoipa::path(
    put,
    path = "/api/ads/{id}",
    tag = "ads",
    request_body = AdRequest,
    params(("id" = i32, Path, description = "Ad id")),
    responses(
        (status = 200, description = "Updated and repriced"),
        (status = 409, description = "Owners can only edit unpaid ads with no open payment")
    ),
    security(("bearer_auth" = []))
)]
#[put("/ads/{id}")]
pub async fn update_ad(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<i32>,
    payload: web::Json<AdRequest>,
) -> ApiResult {
    let ad = owned_ad(&state, &user, path.into_inner()).await?;
    if !user.is_admin() {
        if ad.status != AdStatus::PendingPayment.as_str() {
            return Err(ApiError::Conflict(format!("ad is {} and can only be changed by an admin", ad.status)));
        }
        if billing::has_pending_payment(&state.pool, PaymentPurpose::Ad, ad.id).await? {
            return Err(ApiError::Conflict("ad has a payment in progress".to_string()));
        }
    }

    let payload = payload.into_inner();
    payload.validate()?;

    let criteria = criteria_of(payload.countries, payload.min_age, payload.max_age, payload.grades)?;
    let price_cents = targeting::quote(payload.placement, payload.duration_days, &criteria)?;

    let updated = db::ads::update(
        &state.pool,
        ad.id,
        &db::ads::AdFields {
            title: payload.title.trim().to_string(),
            target_url: payload.target_url,
            placement: payload.placement,
            criteria,
            duration_days: payload.duration_days,
            price_cents,
        },
    )
    .await?
    .ok_or(ApiError::NotFound("ad"))?;

    Ok(ok(updated))
}

#[delete("/ads/{id}")]
pub async fn delete_ad(state: web::Data<AppState>, user: web::ReqData<AuthUser>, path: web::Path<i32>) -> ApiResult {
    let ad = owned_ad(&state, &user, path.into_inner()).await?;
    db::ads::delete(&state.pool, ad.id).await?;
    Ok(ok(json!({ "deleted": ad.id })))
}

/// Multipart field `image`: png, jpeg, gif or webp up to 2 MiB.
#[post("/ads/{id}/image")]
pub async fn upload_ad_image(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<i32>,
    mut payload: Multipart,
) -> ApiResult {
    let storage = state.storage.as_ref().ok_or(ApiError::Unavailable("image storage"))?;
    let ad = owned_ad(&state, &user, path.into_inner()).await?;

    let mut image: Option<(String, Vec<u8>)> = None;

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| ApiError::BadRequest(format!("multipart: {e}")))?;
        if field.name() != "image" {
            continue;
        }

        let content_type = field
            .content_type()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_default();

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| ApiError::BadRequest(format!("multipart: {e}")))?;
            if bytes.len() + chunk.len() > MAX_IMAGE_BYTES {
                return Err(ApiError::BadRequest("image exceeds 2 MiB".to_string()));
            }
            bytes.extend_from_slice(&chunk);
        }
        image = Some((content_type, bytes));
    }

    let Some((content_type, bytes)) = image.filter(|(_, b)| !b.is_empty()) else {
        return Err(ApiError::BadRequest("no image uploaded".to_string()));
    };
    let ext = image_extension(&content_type)
        .ok_or_else(|| ApiError::BadRequest(format!("unsupported image type `{content_type}`")))?;

    let key = format!("ads/{}/{}.{}", ad.id, Uuid::new_v4(), ext);
    let url = storage.put_public(&key, &content_type, bytes).await?;

    let updated = db::ads::set_image_url(&state.pool, ad.id, &url)
        .await?
        .ok_or(ApiError::NotFound("ad"))?;
    Ok(ok(updated))
}

#[utoipa::path(
    post,
    path = "/api/admin/ads/{id}/review",
    tag = "ads",
    request_body = ReviewRequest,
    params(("id" = i32, Path, description = "Ad id")),
    responses(
        (status = 200, description = "Reviewed"),
        (status = 409, description = "Ad is not awaiting review")
    ),
    security(("bearer_auth" = []))
)]
#[post("/admin/ads/{id}/review")]
pub async fn review_ad(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<i32>,
    payload: web::Json<ReviewRequest>,
) -> ApiResult {
    user.require_admin()?;
    payload.validate()?;
    let id = path.into_inner();

    let ad = db::ads::get(&state.pool, id).await?.ok_or(ApiError::NotFound("ad"))?;

    let reviewed = match payload.decision {
        ReviewDecision::Approve => {
            let now = Utc::now();
            let window = (now, now + Duration::days(i64::from(ad.duration_days)));
            db::ads::set_review(&state.pool, id, AdStatus::Active, None, Some(window)).await?
        }
        ReviewDecision::Reject => {
            let reason = payload.reason.as_deref().filter(|r| !r.trim().is_empty());
            if reason.is_none() {
                return Err(ApiError::BadRequest("a reason is required to reject".to_string()));
            }
            db::ads::set_review(&state.pool, id, AdStatus::Rejected, reason, None).await?
        }
    };

    let reviewed = reviewed.ok_or_else(|| ApiError::Conflict(format!("ad is {}", ad.status)))?;
    log::info!("ad reviewed ad_id={} status={} by={}", reviewed.id, reviewed.status, user.id);
    Ok(ok(reviewed))
}

#[get("/admin/ads")]
pub async fn list_ads_for_review(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    query: web::Query<StatusFilter>,
) -> ApiResult {
    user.require_admin()?;
    Ok(ok(db::ads::list_by_status(&state.pool, query.status).await?))
}

fn client_ip(req: &HttpRequest) -> Option<String> {
    let info = req.connection_info();
    let raw = info.realip_remote_addr()?;
    if let Ok(sock) = raw.parse::<SocketAddr>() {
        return Some(sock.ip().to_string());
    }
    raw.parse::<IpAddr>().ok().map(|ip| ip.to_string())
}

#[utoipa::path(
    get,
    path = "/ads/serve",
    tag = "ads",
    params(ServeQuery),
    responses((status = 200, description = "Ads to render", body = [ServedAd]))
)]
#[get("/ads/serve")]
pub async fn serve_ads(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<ServeQuery>,
) -> ApiResult {
    let query = query.into_inner();

    let country = match query.country.filter(|c| !c.trim().is_empty()) {
        Some(c) => Some(c.trim().to_ascii_uppercase()),
        None => state.geo.country_for(client_ip(&req).as_deref()).await,
    };
    let viewer = Viewer {
        country,
        age: query.age,
        grade: query.grade,
    };

    let now = Utc::now();
    let limit = query.limit.unwrap_or(1).clamp(1, MAX_SERVE_LIMIT);
    let candidates = db::ads::serving_candidates(&state.pool, query.placement, now).await?;
    let selected = targeting::select_ads(candidates, &viewer, query.placement, now, limit);

    let ids: Vec<i32> = selected.iter().map(|ad| ad.id).collect();
    db::ads::record_impressions(&state.pool, &ids).await?;

    let served: Vec<ServedAd> = selected.into_iter().map(ServedAd::from).collect();
    Ok(ok(served))
}

#[post("/ads/{id}/click")]
pub async fn click_ad(state: web::Data<AppState>, path: web::Path<i32>) -> ApiResult {
    let id = path.into_inner();
    let target_url = db::ads::record_click(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound("ad"))?;
    Ok(ok(json!({ "id": id, "target_url": target_url })))
}
