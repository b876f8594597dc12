// src/api/payments.rs

use actix_web::{get, post, web};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::api::auth::AuthUser;
use crate::billing::{self, FulfilOutcome};
use crate::error::{ok, ApiError, ApiResult};
use crate::models::{PaymentPurpose, Provider, TxStatus};
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct PaymentRequest {
    pub purpose: PaymentPurpose,
    pub target_id: Option<i32>,
    /// Only read for wallet top-ups.
    pub amount_cents: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StripeIntentResponse {
    pub transaction_id: i32,
    pub payment_intent_id: String,
    pub client_secret: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PayPalOrderResponse {
    pub transaction_id: i32,
    pub order_id: String,
    pub approve_url: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CaptureRequest {
    #[validate(length(min = 1, max = 64))]
    pub order_id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct WalletPaymentRequest {
    pub purpose: PaymentPurpose,
    pub target_id: i32,
}

#[utoipa::path(
    post,
    path = "/api/payments/stripe/intent",
    tag = "payments",
    request_body = PaymentRequest,
    responses(
        (status = 200, description = "PaymentIntent created", body = StripeIntentResponse),
        (status = 404, description = "Target not found"),
        (status = 502, description = "Stripe rejected the request"),
        (status = 503, description = "Stripe is not configured")
    ),
    security(("bearer_auth" = []))
)]
#[post("/payments/stripe/intent")]
pub async fn stripe_intent(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    payload: web::Json<PaymentRequest>,
) -> ApiResult {
    let stripe = state.stripe.as_ref().ok_or(ApiError::Unavailable("stripe"))?;
    let target = billing::resolve_target(
        &state.pool,
        &user,
        payload.purpose,
        payload.target_id,
        payload.amount_cents,
        &state.config.default_currency,
    )
    .await?;

    let metadata = [
        ("user_id", user.id.to_string()),
        ("purpose", target.purpose.to_string()),
        ("target_id", target.target_id.map(|id| id.to_string()).unwrap_or_default()),
    ];
    let intent = stripe
        .create_payment_intent(target.amount_cents, &target.currency, &metadata)
        .await?;

    let transaction_id = billing::insert_pending(
        &state.pool,
        user.id,
        Provider::Stripe,
        &intent.id,
        &target,
        json!({ "description": target.description, "stripe_status": intent.status }),
    )
    .await?;

    log::info!(
        "stripe intent created tx_id={} user_id={} purpose={} amount={}",
        transaction_id,
        user.id,
        target.purpose,
        target.amount_cents
    );

    Ok(ok(StripeIntentResponse {
        transaction_id,
        payment_intent_id: intent.id,
        client_secret: intent.client_secret,
        amount_cents: target.amount_cents,
        currency: target.currency,
    }))
}

/// Client secret for saving a card without charging it.
#[post("/payments/stripe/setup-intent")]
pub async fn stripe_setup_intent(state: web::Data<AppState>, user: web::ReqData<AuthUser>) -> ApiResult {
    let stripe = state.stripe.as_ref().ok_or(ApiError::Unavailable("stripe"))?;
    let intent = stripe
        .create_setup_intent(&[("user_id", user.id.to_string())])
        .await?;

    Ok(ok(json!({
        "setup_intent_id": intent.id,
        "client_secret": intent.client_secret,
    })))
}

#[utoipa::path(
    post,
    path = "/api/payments/paypal/order",
    tag = "payments",
    request_body = PaymentRequest,
    responses(
        (status = 200, description = "Order created", body = PayPalOrderResponse),
        (status = 503, description = "PayPal is not configured")
    ),
    security(("bearer_auth" = []))
)]
#[post("/payments/paypal/order")]
pub async fn paypal_order(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    payload: web::Json<PaymentRequest>,
) -> ApiResult {
    let paypal = state.paypal.as_ref().ok_or(ApiError::Unavailable("paypal"))?;
    let target = billing::resolve_target(
        &state.pool,
        &user,
        payload.purpose,
        payload.target_id,
        payload.amount_cents,
        &state.config.default_currency,
    )
    .await?;

    let reference_id = Uuid::new_v4().to_string();
    let order = paypal
        .create_order(target.amount_cents, &target.currency, &reference_id)
        .await?;

    let transaction_id = billing::insert_pending(
        &state.pool,
        user.id,
        Provider::Paypal,
        &order.id,
        &target,
        json!({
            "description": target.description,
            "reference_id": reference_id,
            "paypal_status": order.status,
        }),
    )
    .await?;

    log::info!(
        "paypal order created tx_id={} user_id={} order_id={}",
        transaction_id,
        user.id,
        order.id
    );

    Ok(ok(PayPalOrderResponse {
        transaction_id,
        approve_url: order.approve_link().map(str::to_string),
        order_id: order.id,
        amount_cents: target.amount_cents,
        currency: target.currency,
    }))
}

#[utoipa::path(
    post,
    path = "/api/payments/paypal/capture",
    tag = "payments",
    request_body = CaptureRequest,
    responses(
        (status = 200, description = "Capture result"),
        (status = 404, description = "Order not found for this user"),
        (status = 402, description = "PayPal did not complete the payment")
    ),
    security(("bearer_auth" = []))
)]
#[post("/payments/paypal/capture")]
pub async fn paypal_capture(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    payload: web::Json<CaptureRequest>,
) -> ApiResult {
    payload.validate()?;
    let paypal = state.paypal.as_ref().ok_or(ApiError::Unavailable("paypal"))?;

    let record = billing::find_transaction(&state.pool, Provider::Paypal, &payload.order_id)
        .await?
        .filter(|tx| tx.user_id == user.id)
        .ok_or(ApiError::NotFound("paypal order"))?;

    if record.status != TxStatus::Pending.as_str() {
        return Ok(ok(json!({ "transaction_id": record.id, "status": record.status })));
    }

    let order = paypal.capture_order(&payload.order_id).await?;
    if !order.is_completed() {
        billing::mark_failed(
            &state.pool,
            Provider::Paypal,
            &order.id,
            json!({ "paypal_status": order.status }),
        )
        .await?;
        return Err(ApiError::PaymentRequired(format!("paypal order is {}", order.status)));
    }

    let outcome = billing::fulfil(
        &state.pool,
        Provider::Paypal,
        &order.id,
        None,
        json!({ "paypal_status": order.status }),
    )
    .await?;

    match outcome {
        FulfilOutcome::Fulfilled(tx) => Ok(ok(tx)),
        FulfilOutcome::RefundRequired(tx) => Err(ApiError::Conflict(format!(
            "payment {} was captured but could not be applied; it is marked for refund",
            tx.id
        ))),
        FulfilOutcome::AlreadyProcessed => Ok(ok(json!({ "transaction_id": record.id, "status": "processed" }))),
        FulfilOutcome::Unknown | FulfilOutcome::AmountMismatch => {
            Err(ApiError::Internal(format!("paypal capture for {} could not be applied", order.id)))
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/payments/wallet",
    tag = "payments",
    request_body = WalletPaymentRequest,
    responses(
        (status = 200, description = "Paid from wallet balance"),
        (status = 402, description = "Insufficient balance")
    ),
    security(("bearer_auth" = []))
)]
#[post("/payments/wallet")]
pub async fn pay_with_wallet(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    payload: web::Json<WalletPaymentRequest>,
) -> ApiResult {
    if payload.purpose == PaymentPurpose::WalletTopUp {
        return Err(ApiError::BadRequest("a wallet cannot top itself up".to_string()));
    }

    let target = billing::resolve_target(
        &state.pool,
        &user,
        payload.purpose,
        Some(payload.target_id),
        None,
        &state.config.default_currency,
    )
    .await?;

    let tx = billing::pay_with_wallet(&state.pool, user.id, &target, &state.config.default_currency).await?;
    Ok(ok(tx))
}

#[get("/wallet")]
pub async fn wallet(state: web::Data<AppState>, user: web::ReqData<AuthUser>) -> ApiResult {
    let balance_cents = billing::wallet_balance(&state.pool, user.id).await?;
    Ok(ok(json!({
        "balance_cents": balance_cents,
        "currency": state.config.default_currency,
    })))
}

#[get("/transactions")]
pub async fn transactions(state: web::Data<AppState>, user: web::ReqData<AuthUser>) -> ApiResult {
    Ok(ok(billing::list_transactions(&state.pool, user.id).await?))
}
