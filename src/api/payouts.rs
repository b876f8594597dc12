// src/api/payouts.rs

use actix_web::{delete, get, post, web};
use serde::Deserialize;
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidateEmail};

use crate::api::auth::AuthUser;
use crate::db;
use crate::db::payouts::NewPayoutAccount;
use crate::error::{created, ok, ApiError, ApiResult};
use crate::models::{PayoutMethod, PayoutStatus, Role};
use crate::AppState;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PayoutAccountRequest {
    pub method: PayoutMethod,
    #[validate(length(min = 2, max = 120))]
    pub account_holder: String,
    pub bank_name: Option<String>,
    pub account_number: Option<String>,
    pub routing_number: Option<String>,
    pub paypal_email: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct VerifyRequest {
    pub approve: bool,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StatusFilter {
    pub status: Option<PayoutStatus>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn digits_only(value: &str) -> String {
    value.chars().filter(|c| !c.is_whitespace() && *c != '-').collect()
}

/// `12345678` becomes `****5678`.
pub fn mask_account_number(account_number: &str) -> String {
    let keep = account_number.len().saturating_sub(4);
    format!("{}{}", "*".repeat(keep), &account_number[keep..])
}

/// Checks the method-specific fields and keeps only what we are allowed to store.
pub fn build_account(req: PayoutAccountRequest) -> Result<NewPayoutAccount, ApiError> {
    let account_holder = req.account_holder.trim().to_string();

    match req.method {
        PayoutMethod::Bank => {
            let bank_name = non_blank(req.bank_name)
                .ok_or_else(|| ApiError::BadRequest("bank_name is required".to_string()))?;
            let account_number = non_blank(req.account_number)
                .map(|n| digits_only(&n))
                .ok_or_else(|| ApiError::BadRequest("account_number is required".to_string()))?;
            if !(4..=34).contains(&account_number.len()) || !account_number.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(ApiError::BadRequest("account_number is malformed".to_string()));
            }
            let routing_number = non_blank(req.routing_number)
                .map(|n| digits_only(&n))
                .ok_or_else(|| ApiError::BadRequest("routing_number is required".to_string()))?;
            if !(6..=11).contains(&routing_number.len()) || !routing_number.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(ApiError::BadRequest("routing_number is malformed".to_string()));
            }

            let last4 = account_number[account_number.len() - 4..].to_string();
            Ok(NewPayoutAccount {
                method: PayoutMethod::Bank,
                account_holder,
                bank_name: Some(bank_name),
                account_number_last4: Some(last4),
                account_number_masked: Some(mask_account_number(&account_number)),
                routing_number: Some(routing_number),
                paypal_email: None,
            })
        }
        PayoutMethod::Paypal => {
            let email = non_blank(req.paypal_email)
                .map(|e| e.to_lowercase())
                .ok_or_else(|| ApiError::BadRequest("paypal_email is required".to_string()))?;
            if !email.validate_email() {
                return Err(ApiError::BadRequest("paypal_email is not a valid email".to_string()));
            }
            Ok(NewPayoutAccount {
                method: PayoutMethod::Paypal,
                account_holder,
                bank_name: None,
                account_number_last4: None,
                account_number_masked: None,
                routing_number: None,
                paypal_email: Some(email),
            })
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/payout-accounts",
    tag = "payouts",
    request_body = PayoutAccountRequest,
    responses(
        (status = 201, description = "Account submitted for verification"),
        (status = 400, description = "Missing method fields"),
        (status = 403, description = "Only teachers and freelancers receive payouts"),
        (status = 409, description = "An open account for this method exists")
    ),
    security(("bearer_auth" = []))
)]
#[post("/payout-accounts")]
pub async fn create_payout_account(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    payload: web::Json<PayoutAccountRequest>,
) -> ApiResult {
    user.require_any(&[Role::Teacher, Role::Freelancer])?;
    let payload = payload.into_inner();
    payload.validate()?;

    let account = build_account(payload)?;
    if db::payouts::has_open_account(&state.pool, user.id, account.method).await? {
        return Err(ApiError::Conflict(format!(
            "a {} payout account is already pending or verified",
            account.method
        )));
    }

    let conflict = format!("a {} payout account is already pending or verified", account.method);
    let saved = db::payouts::insert(&state.pool, user.id, &account)
        .await
        .map_err(|e| ApiError::conflict_on_unique(e, &conflict))?;
    log::info!("payout account submitted id={} user_id={} method={}", saved.id, user.id, saved.method);
    Ok(created(saved))
}

#[get("/payout-accounts")]
pub async fn list_payout_accounts(state: web::Data<AppState>, user: web::ReqData<AuthUser>) -> ApiResult {
    Ok(ok(db::payouts::list_by_user(&state.pool, user.id).await?))
}

#[delete("/payout-accounts/{id}")]
pub async fn delete_payout_account(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<i32>,
) -> ApiResult {
    let id = path.into_inner();
    let account = db::payouts::get(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound("payout account"))?;
    user.ensure_owner_or_admin(account.user_id)?;

    db::payouts::delete(&state.pool, id).await?;
    Ok(ok(json!({ "deleted": id })))
}

#[get("/admin/payout-accounts")]
pub async fn list_payout_accounts_for_review(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    query: web::Query<StatusFilter>,
) -> ApiResult {
    user.require_admin()?;
    Ok(ok(db::payouts::list_by_status(&state.pool, query.status).await?))
}

#[utoipa::path(
    post,
    path = "/api/admin/payout-accounts/{id}/verify",
    tag = "payouts",
    request_body = VerifyRequest,
    params(("id" = i32, Path, description = "Payout account id")),
    responses(
        (status = 200, description = "Verified or rejected"),
        (status = 409, description = "Account already reviewed")
    ),
    security(("bearer_auth" = []))
)]
#[post("/admin/payout-accounts/{id}/verify")]
pub async fn verify_payout_account(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    path: web::Path<i32>,
    payload: web::Json<VerifyRequest>,
) -> ApiResult {
    user.require_admin()?;
    payload.validate()?;
    let id = path.into_inner();

    let account = db::payouts::get(&state.pool, id)
        .await?
        .ok_or(ApiError::NotFound("payout account"))?;

    let (status, reason) = if payload.approve {
        (PayoutStatus::Verified, None)
    } else {
        let reason = payload.reason.as_deref().map(str::trim).filter(|r| !r.is_empty());
        if reason.is_none() {
            return Err(ApiError::BadRequest("a reason is required to reject".to_string()));
        }
        (PayoutStatus::Rejected, reason)
    };

    let updated = db::payouts::set_status(&state.pool, id, status, reason)
        .await?
        .ok_or_else(|| ApiError::Conflict(format!("payout account is already {}", account.status)))?;

    log::info!("payout account reviewed id={} status={} by={}", id, updated.status, user.id);
    Ok(ok(updated))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank(account_number: &str, routing: &str) -> PayoutAccountRequest {
        PayoutAccountRequest {
            method: PayoutMethod::Bank,
            account_holder: "Ada Lovelace".to_string(),
            bank_name: Some("First Bank".to_string()),
            account_number: Some(account_number.to_string()),
            routing_number: Some(routing.to_string()),
            paypal_email: None,
        }
    }

    #[test]
    fn bank_account_keeps_only_last_four_digits() {
        let acct = build_account(bank("1234 5678 9012", "021000021")).unwrap();
        assert_eq!(acct.account_number_last4.as_deref(), Some("9012"));
        assert_eq!(acct.account_number_masked.as_deref(), Some("********9012"));
        assert_eq!(acct.routing_number.as_deref(), Some("021000021"));
        assert!(acct.paypal_email.is_none());
    }

    #[test]
    fn bank_account_requires_routing_number() {
        let mut req = bank("12345678", "021000021");
        req.routing_number = Some("   ".to_string());
        assert!(matches!(build_account(req), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn short_account_number_is_rejected() {
        assert!(build_account(bank("123", "021000021")).is_err());
    }

    #[test]
    fn paypal_requires_valid_email() {
        let req = PayoutAccountRequest {
            method: PayoutMethod::Paypal,
            account_holder: "Ada Lovelace".to_string(),
            bank_name: None,
            account_number: None,
            routing_number: None,
            paypal_email: Some("not-an-email".to_string()),
        };
        assert!(build_account(req).is_err());

        let req = PayoutAccountRequest {
            method: PayoutMethod::Paypal,
            account_holder: "Ada Lovelace".to_string(),
            bank_name: Some("ignored".to_string()),
            account_number: None,
            routing_number: None,
            paypal_email: Some(" Ada@Example.com ".to_string()),
        };
        let acct = build_account(req).unwrap();
        assert_eq!(acct.paypal_email.as_deref(), Some("ada@example.com"));
        assert!(acct.bank_name.is_none());
    }
}
