// src/api/memberships.rs

use actix_web::{delete, get, post, put, web};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;
use validator::Validate;

use crate::api::auth::AuthUser;
use crate::db;
use crate::db::memberships::PlanFields;
use crate::error::{created, ok, ApiError, ApiResult};
use crate::models::PlanInterval;
use crate::AppState;

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PlanRequest {
    #[validate(length(min = 2, max = 64))]
    pub slug: String,
    #[validate(length(min = 1, max = 80))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub price_cents: i64,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    pub billing_interval: PlanInterval,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn is_valid_slug(slug: &str) -> bool {
    slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !slug.starts_with('-')
        && !slug.ends_with('-')
}

impl PlanRequest {
    fn into_fields(self, default_currency: &str) -> Result<PlanFields, ApiError> {
        let slug = self.slug.trim().to_string();
        if !is_valid_slug(&slug) {
            return Err(ApiError::BadRequest(
                "slug may only contain lowercase letters, digits and inner dashes".to_string(),
            ));
        }

        Ok(PlanFields {
            slug,
            name: self.name.trim().to_string(),
            description: self.description,
            price_cents: self.price_cents,
            currency: self
                .currency
                .map(|c| c.to_ascii_lowercase())
                .unwrap_or_else(|| default_currency.to_string()),
            billing_interval: self.billing_interval,
            features: self
                .features
                .into_iter()
                .map(|f| f.trim().to_string())
                .filter(|f| !f.is_empty())
                .collect(),
            is_active: self.is_active,
        })
    }
}

#[utoipa::path(
    post,
    path = "/api/admin/membership-plans",
    tag = "memberships",
    request_body = PlanRequest,
    responses(
        (status = 201, description = "Plan created"),
        (status = 409, description = "Slug already exists")
    ),
    security(("bearer_auth" = []))
)]
#[post("/admin/membership-plans")]
pub async fn create_plan(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    payload: web::Json<PlanRequest>,
) -> ApiResult {
    user.require_admin()?;
    let payload = payload.into_inner();
    payload.validate()?;

    let fields = payload.into_fields(&state.config.default_currency)?;
    let plan = db::memberships::insert_plan(&state.pool, &fields)
        .await
        .map_err(|e| ApiError::conflict_on_unique(e, "plan slug already exists"))?;
    Ok(created(plan))
}

#[put("/admin/membership-plans/{id}")]
pub async fn update_plan(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<i32>,
    payload: web::Json<PlanRequest>,
) -> ApiResult {
    user.require_admin()?;
    let payload = payload.into_inner();
    payload.validate()?;

    let fields = payload.into_fields(&state.config.default_currency)?;
    let plan = db::memberships::update_plan(&state.pool, path.into_inner(), &fields)
        .await
        .map_err(|e| ApiError::conflict_on_unique(e, "plan slug already exists"))?
        .ok_or(ApiError::NotFound("membership plan"))?;
    Ok(ok(plan))
}

/// Soft delete; members keep access until their period ends.
#[delete("/admin/membership-plans/{id}")]
pub async fn delete_plan(state: web::Data<AppState>, user: web::ReqData<AuthUser>, path: web::Path<i32>) -> ApiResult {
    user.require_admin()?;
    let id = path.into_inner();
    if !db::memberships::deactivate_plan(&state.pool, id).await? {
        return Err(ApiError::NotFound("membership plan"));
    }
    Ok(ok(json!({ "id": id, "is_active": false })))
}

#[utoipa::path(
    get,
    path = "/memberships/plans",
    tag = "memberships",
    responses((status = 200, description = "Active plans, cheapest first"))
)]
#[get("/memberships/plans")]
pub async fn list_plans(state: web::Data<AppState>) -> ApiResult {
    Ok(ok(db::memberships::list_active_plans(&state.pool).await?))
}

#[get("/memberships/mine")]
pub async fn my_memberships(state: web::Data<AppState>, user: web::ReqData<AuthUser>) -> ApiResult {
    Ok(ok(db::memberships::list_for_user(&state.pool, user.id).await?))
}

#[post("/memberships/{id}/cancel")]
pub async fn cancel_membership(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<i32>,
) -> ApiResult {
    let membership = db::memberships::cancel(&state.pool, user.id, path.into_inner())
        .await?
        .ok_or(ApiError::NotFound("active membership"))?;

    log::info!(
        "membership canceled id={} user_id={} effective_until={}",
        membership.id,
        user.id,
        membership.current_period_end
    );
    Ok(ok(membership))
}
