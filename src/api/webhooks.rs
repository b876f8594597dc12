// src/api/webhooks.rs

use actix_web::{post, web, HttpRequest};
use chrono::Utc;
use serde_json::json;

use crate::api::stripe::{verify_signature, StripeEvent};
use crate::billing::{self, FulfilOutcome};
use crate::error::{ok, ApiError, ApiResult};
use crate::models::Provider;
use crate::AppState;

/// Stripe retries anything that is not 2xx, so unknown intents and event
/// types are acknowledged and ignored.
#[utoipa::path(
    post,
    path = "/webhook/stripe",
    tag = "webhooks",
    request_body(content = String, description = "Raw Stripe event JSON", content_type = "application/json"),
    responses(
        (status = 200, description = "Event accepted"),
        (status = 400, description = "Bad signature or payload")
    )
)]
#[post("/webhook/stripe")]
pub async fn stripe_webhook(state: web::Data<AppState>, req: HttpRequest, body: web::Bytes) -> ApiResult {
    let stripe = state.stripe.as_ref().ok_or(ApiError::Unavailable("stripe"))?;

    let header = req
        .headers()
        .get("Stripe-Signature")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("missing Stripe-Signature header".to_string()))?;

    if let Err(e) = verify_signature(&stripe.webhook_secret, header, &body, Utc::now().timestamp()) {
        log::warn!("stripe webhook rejected: {e}");
        return Err(ApiError::BadRequest(format!("invalid signature: {e}")));
    }

    let event: StripeEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid event payload: {e}")))?;

    let object = &event.data.object;
    let Some(intent_id) = object.get("id").and_then(|v| v.as_str()) else {
        return Ok(ok(json!({ "received": true, "ignored": true })));
    };

    let payload = json!({ "stripe_event_id": event.id, "stripe_event": event.event_type });

    match event.event_type.as_str() {
        "payment_intent.succeeded" => {
            let amount = object
                .get("amount_received")
                .or_else(|| object.get("amount"))
                .and_then(|v| v.as_i64());

            let outcome = billing::fulfil(&state.pool, Provider::Stripe, intent_id, amount, payload).await?;
            let status = match outcome {
                FulfilOutcome::Fulfilled(_) => "fulfilled",
                FulfilOutcome::RefundRequired(_) => "refund_required",
                FulfilOutcome::AlreadyProcessed => "already_processed",
                FulfilOutcome::Unknown => "ignored",
                FulfilOutcome::AmountMismatch => "amount_mismatch",
            };
            log::info!("stripe event {} intent={} -> {}", event.id, intent_id, status);
            Ok(ok(json!({ "received": true, "status": status })))
        }
        "payment_intent.payment_failed" => {
            let updated = billing::mark_failed(&state.pool, Provider::Stripe, intent_id, payload).await?;
            log::info!("stripe event {} intent={} failed updated={}", event.id, intent_id, updated);
            Ok(ok(json!({ "received": true, "status": if updated { "failed" } else { "ignored" } })))
        }
        other => {
            log::debug!("stripe event {} of type {} ignored", event.id, other);
            Ok(ok(json!({ "received": true, "ignored": true })))
        }
    }
}
