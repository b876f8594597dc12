// src/api/support.rs

use actix_web::{delete, get, post, put, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::api::auth::AuthUser;
use crate::db;
use crate::db::support::AgentFields;
use crate::error::{created, ok, ApiError, ApiResult};
use crate::models::QuickResponse;
use crate::quick_responses::{self, MAX_SHORTCUT_LEN};
use crate::AppState;

const MAX_SUGGESTIONS: usize = 8;

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AgentRequest {
    #[validate(length(min = 1, max = 80))]
    pub display_name: String,
    #[validate(length(min = 1, max = 60))]
    pub department: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[validate(range(min = 1, max = 100))]
    pub max_open_tickets: i32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct NewAgentRequest {
    pub user_id: i32,
    #[serde(flatten)]
    #[validate(nested)]
    pub agent: AgentRequest,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct QuickResponseRequest {
    #[validate(length(min = 1, max = 32))]
    pub shortcut: String,
    #[validate(length(min = 1, max = 120))]
    pub title: String,
    #[validate(length(min = 1, max = 5000))]
    pub content: String,
    /// Admins may manage another agent's responses.
    pub agent_id: Option<i32>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AgentQuery {
    pub agent_id: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ExpandRequest {
    pub text: String,
    /// Byte offset of the caret in `text`.
    pub cursor: usize,
    pub agent_id: Option<i32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ExpandResponse {
    pub query: Option<String>,
    pub range_start: Option<usize>,
    pub range_end: Option<usize>,
    #[schema(value_type = Vec<Object>)]
    pub suggestions: Vec<QuickResponse>,
    pub expanded: Option<String>,
    pub cursor: Option<usize>,
}

impl AgentRequest {
    fn into_fields(self) -> AgentFields {
        AgentFields {
            display_name: self.display_name.trim().to_string(),
            department: self.department.trim().to_lowercase(),
            is_active: self.is_active,
            max_open_tickets: self.max_open_tickets,
        }
    }
}

/// The agent whose quick responses the caller works with.
async fn acting_agent(state: &AppState, user: &AuthUser, agent_id: Option<i32>) -> Result<i32, ApiError> {
    if let (true, Some(id)) = (user.is_admin(), agent_id) {
        let agent = db::support::get_agent(&state.pool, id)
            .await?
            .ok_or(ApiError::NotFound("support agent"))?;
        return Ok(agent.id);
    }

    db::support::active_agent_for_user(&state.pool, user.id)
        .await?
        .map(|agent| agent.id)
        .ok_or(ApiError::Forbidden("active support agents only"))
}

async fn editable_response(state: &AppState, user: &AuthUser, id: i32) -> Result<QuickResponse, ApiError> {
    let response = db::support::get_quick_response(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound("quick response"))?;
    if !user.is_admin() {
        let agent_id = acting_agent(state, user, None).await?;
        if agent_id != response.agent_id {
            return Err(ApiError::NotFound("quick response"));
        }
    }
    Ok(response)
}

fn checked_shortcut(raw: &str) -> Result<String, ApiError> {
    let shortcut = raw.trim().trim_start_matches('/').to_lowercase();
    if !quick_responses::is_valid_shortcut(&shortcut) {
        return Err(ApiError::BadRequest(format!(
            "shortcut must be 1-{MAX_SHORTCUT_LEN} characters of a-z, 0-9, `_` or `-`"
        )));
    }
    Ok(shortcut)
}

/// Suggestions for the `/query` under the caret, plus the expanded text
/// when the query names a shortcut exactly.
pub fn expansion(responses: &[QuickResponse], text: &str, cursor: usize) -> ExpandResponse {
    let Some(trigger) = quick_responses::active_trigger(text, cursor) else {
        return ExpandResponse {
            query: None,
            range_start: None,
            range_end: None,
            suggestions: Vec::new(),
            expanded: None,
            cursor: None,
        };
    };

    let suggestions: Vec<QuickResponse> = quick_responses::suggest(responses, trigger.query, MAX_SUGGESTIONS)
        .into_iter()
        .cloned()
        .collect();

    let exact = suggestions
        .iter()
        .find(|r| !trigger.query.is_empty() && r.shortcut.eq_ignore_ascii_case(trigger.query));

    let (expanded, new_cursor) = match exact {
        Some(r) => (
            Some(quick_responses::expand(text, trigger.range.clone(), &r.content)),
            Some(trigger.range.start + r.content.len()),
        ),
        None => (None, None),
    };

    ExpandResponse {
        query: Some(trigger.query.to_string()),
        range_start: Some(trigger.range.start),
        range_end: Some(trigger.range.end),
        suggestions,
        expanded,
        cursor: new_cursor,
    }
}

#[utoipa::path(
    post,
    path = "/api/admin/support-agents",
    tag = "support",
    request_body = NewAgentRequest,
    responses(
        (status = 201, description = "Agent created"),
        (status = 409, description = "User is already an agent")
    ),
    security(("bearer_auth" = []))
)]
#[post("/admin/support-agents")]
pub async fn create_agent(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    payload: web::Json<NewAgentRequest>,
) -> ApiResult {
    user.require_admin()?;
    let payload = payload.into_inner();
    payload.validate()?;

    if !db::users::exists(&state.pool, payload.user_id).await? {
        return Err(ApiError::NotFound("user"));
    }

    let agent = db::support::insert_agent(&state.pool, payload.user_id, &payload.agent.into_fields())
        .await
        .map_err(|e| ApiError::conflict_on_unique(e, "user is already a support agent"))?;
    Ok(created(agent))
}

#[get("/admin/support-agents")]
pub async fn list_agents(state: web::Data<AppState>, user: web::ReqData<AuthUser>) -> ApiResult {
    user.require_admin()?;
    Ok(ok(db::support::list_agents(&state.pool).await?))
}

#[put("/admin/support-agents/{id}")]
pub async fn update_agent(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<i32>,
    payload: web::Json<AgentRequest>,
) -> ApiResult {
    user.require_admin()?;
    let payload = payload.into_inner();
    payload.validate()?;

    let agent = db::support::update_agent(&state.pool, path.into_inner(), &payload.into_fields())
        .await?
        .ok_or(ApiError::NotFound("support agent"))?;
    Ok(ok(agent))
}

#[delete("/admin/support-agents/{id}")]
pub async fn delete_agent(state: web::Data<AppState>, user: web::ReqData<AuthUser>, path: web::Path<i32>) -> ApiResult {
    user.require_admin()?;
    let id = path.into_inner();
    if !db::support::delete_agent(&state.pool, id).await? {
        return Err(ApiError::NotFound("support agent"));
    }
    Ok(ok(json!({ "deleted": id })))
}

#[utoipa::path(
    post,
    path = "/api/support/quick-responses/expand",
    tag = "support",
    request_body = ExpandRequest,
    responses((status = 200, description = "Suggestions and expansion", body = ExpandResponse)),
    security(("bearer_auth" = []))
)]
#[post("/support/quick-responses/expand")]
pub async fn expand_quick_response(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    payload: web::Json<ExpandRequest>,
) -> ApiResult {
    let agent_id = acting_agent(&state, &user, payload.agent_id).await?;
    let responses = db::support::list_quick_responses(&state.pool, agent_id).await?;
    Ok(ok(expansion(&responses, &payload.text, payload.cursor)))
}

#[post("/support/quick-responses")]
pub async fn create_quick_response(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    payload: web::Json<QuickResponseRequest>,
) -> ApiResult {
    payload.validate()?;
    let shortcut = checked_shortcut(&payload.shortcut)?;
    let agent_id = acting_agent(&state, &user, payload.agent_id).await?;

    let response = db::support::insert_quick_response(
        &state.pool,
        agent_id,
        &shortcut,
        payload.title.trim(),
        &payload.content,
    )
    .await
    .map_err(|e| ApiError::conflict_on_unique(e, "shortcut already in use"))?;
    Ok(created(response))
}

#[get("/support/quick-responses")]
pub async fn list_quick_responses(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    query: web::Query<AgentQuery>,
) -> ApiResult {
    let agent_id = acting_agent(&state, &user, query.agent_id).await?;
    Ok(ok(db::support::list_quick_responses(&state.pool, agent_id).await?))
}

#[put("/support/quick-responses/{id}")]
pub async fn update_quick_response(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<i32>,
    payload: web::Json<QuickResponseRequest>,
) -> ApiResult {
    let existing = editable_response(&state, &user, path.into_inner()).await?;
    payload.validate()?;
    let shortcut = checked_shortcut(&payload.shortcut)?;

    let updated = db::support::update_quick_response(
        &state.pool,
        existing.id,
        &shortcut,
        payload.title.trim(),
        &payload.content,
    )
    .await
    .map_err(|e| ApiError::conflict_on_unique(e, "shortcut already in use"))?
    .ok_or(ApiError::NotFound("quick response"))?;
    Ok(ok(updated))
}

#[delete("/support/quick-responses/{id}")]
pub async fn delete_quick_response(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<i32>,
) -> ApiResult {
    let existing = editable_response(&state, &user, path.into_inner()).await?;
    db::support::delete_quick_response(&state.pool, existing.id).await?;
    Ok(ok(json!({ "deleted": existing.id })))
}
