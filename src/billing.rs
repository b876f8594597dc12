// src/billing.rs

use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::api::auth::AuthUser;
use crate::db;
use crate::error::ApiError;
use crate::models::{AdStatus, PaymentPurpose, PlanInterval, Provider, Transaction, TxStatus};

pub const MIN_TOP_UP_CENTS: i64 = 100;
pub const MAX_TOP_UP_CENTS: i64 = 1_000_000;

/// What is being bought; the amount always comes from our own tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentTarget {
    pub purpose: PaymentPurpose,
    pub target_id: Option<i32>,
    pub amount_cents: i64,
    pub currency: String,
    pub description: String,
}

#[derive(Debug)]
pub enum FulfilOutcome {
    Fulfilled(Transaction),
    /// Money arrived but the purchase was already satisfied or changed; kept for a refund.
    RefundRequired(Transaction),
    AlreadyProcessed,
    Unknown,
    AmountMismatch,
}

/// Result of applying a paid transaction to the thing it bought.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Effect {
    Applied,
    Refused(String),
}

pub async fn resolve_target(
    pool: &PgPool,
    user: &AuthUser,
    purpose: PaymentPurpose,
    target_id: Option<i32>,
    amount_cents: Option<i64>,
    default_currency: &str,
) -> Result<PaymentTarget, ApiError> {
    let require_id = || target_id.ok_or_else(|| ApiError::BadRequest("target_id is required".to_string()));

    match purpose {
        PaymentPurpose::Course => {
            let course = db::courses::get(pool, require_id()?)
                .await?
                .filter(|c| c.is_published)
                .ok_or(ApiError::NotFound("course"))?;
            if course.price_cents == 0 {
                return Err(ApiError::BadRequest("free courses are enrolled directly".to_string()));
            }
            if db::courses::is_enrolled(pool, user.id, course.id).await? {
                return Err(ApiError::Conflict("already enrolled".to_string()));
            }
            Ok(PaymentTarget {
                purpose,
                target_id: Some(course.id),
                amount_cents: course.price_cents,
                currency: course.currency,
                description: format!("Course: {}", course.title),
            })
        }
        PaymentPurpose::Membership => {
            let plan = db::memberships::get_plan(pool, require_id()?)
                .await?
                .filter(|p| p.is_active)
                .ok_or(ApiError::NotFound("membership plan"))?;
            Ok(PaymentTarget {
                purpose,
                target_id: Some(plan.id),
                amount_cents: plan.price_cents,
                currency: plan.currency,
                description: format!("Membership: {}", plan.name),
            })
        }
        PaymentPurpose::Ad => {
            let ad = db::ads::get(pool, require_id()?).await?.ok_or(ApiError::NotFound("ad"))?;
            if ad.owner_id != user.id {
                return Err(ApiError::Forbidden("only the ad owner can pay for it"));
            }
            if ad.status != AdStatus::PendingPayment.as_str() {
                return Err(ApiError::Conflict(format!("ad is {}", ad.status)));
            }
            Ok(PaymentTarget {
                purpose,
                target_id: Some(ad.id),
                amount_cents: ad.price_cents,
                currency: default_currency.to_string(),
                description: format!("Ad campaign: {}", ad.title),
            })
        }
        PaymentPurpose::WalletTopUp => {
            let amount = amount_cents
                .ok_or_else(|| ApiError::BadRequest("amount_cents is required for a top-up".to_string()))?;
            if !(MIN_TOP_UP_CENTS..=MAX_TOP_UP_CENTS).contains(&amount) {
                return Err(ApiError::BadRequest(format!(
                    "top-up must be between {MIN_TOP_UP_CENTS} and {MAX_TOP_UP_CENTS} cents"
                )));
            }
            Ok(PaymentTarget {
                purpose,
                target_id: None,
                amount_cents: amount,
                currency: default_currency.to_string(),
                description: "Wallet top-up".to_string(),
            })
        }
    }
}

/// A renewal before expiry extends from the current end instead of from now.
pub fn next_membership_period(
    existing_end: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    interval: PlanInterval,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let base = match existing_end {
        Some(end) if end > now => end,
        _ => now,
    };
    (now, base + interval.period())
}

pub async fn insert_pending(
    pool: &PgPool,
    user_id: i32,
    provider: Provider,
    provider_ref: &str,
    target: &PaymentTarget,
    payload: serde_json::Value,
) -> Result<i32, ApiError> {
    sqlx::query_scalar::<_, i32>(
        r#"INSERT INTO transactions
               (user_id, provider, provider_ref, purpose, target_id, amount_cents, currency, status, payload)
           VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', $8)
           RETURNING id"#,
    )
    .bind(user_id)
    .bind(provider.as_str())
    .bind(provider_ref)
    .bind(target.purpose.as_str())
    .bind(target.target_id)
    .bind(target.amount_cents)
    .bind(&target.currency)
    .bind(payload)
    .fetch_one(pool)
    .await
    .map_err(|e| ApiError::conflict_on_unique(e, "payment reference already recorded"))
}

async fn lock_transaction(
    conn: &mut PgConnection,
    provider: Provider,
    provider_ref: &str,
) -> Result<Option<Transaction>, sqlx::Error> {
    sqlx::query_as::<_, Transaction>(
        "SELECT * FROM transactions WHERE provider = $1 AND provider_ref = $2 FOR UPDATE",
    )
    .bind(provider.as_str())
    .bind(provider_ref)
    .fetch_optional(conn)
    .await
}

/// Marks a pending transaction succeeded and applies its effect, once.
pub async fn fulfil(
    pool: &PgPool,
    provider: Provider,
    provider_ref: &str,
    paid_amount: Option<i64>,
    payload: serde_json::Value,
) -> Result<FulfilOutcome, ApiError> {
    let mut tx = pool.begin().await?;

    let Some(record) = lock_transaction(&mut tx, provider, provider_ref).await? else {
        return Ok(FulfilOutcome::Unknown);
    };

    if record.status != TxStatus::Pending.as_str() {
        return Ok(FulfilOutcome::AlreadyProcessed);
    }

    if let Some(paid) = paid_amount {
        if paid != record.amount_cents {
            log::error!(
                "payment amount mismatch provider={} ref={} expected={} paid={}",
                provider,
                provider_ref,
                record.amount_cents,
                paid
            );
            set_status(&mut tx, record.id, TxStatus::Failed, None, payload).await?;
            tx.commit().await?;
            return Ok(FulfilOutcome::AmountMismatch);
        }
    }

    if let Effect::Refused(reason) = apply_effect(&mut tx, &record).await? {
        log::warn!(
            "payment needs refund tx_id={} user_id={} purpose={} reason={}",
            record.id,
            record.user_id,
            record.purpose,
            reason
        );
        let mut payload = payload;
        if let Some(fields) = payload.as_object_mut() {
            fields.insert("refund_reason".to_string(), json!(reason));
        }
        let updated = set_status(&mut tx, record.id, TxStatus::RefundRequired, Some(Utc::now()), payload).await?;
        tx.commit().await?;
        return Ok(FulfilOutcome::RefundRequired(updated));
    }

    let updated = set_status(&mut tx, record.id, TxStatus::Succeeded, Some(Utc::now()), payload).await?;
    tx.commit().await?;

    log::info!(
        "payment fulfilled tx_id={} user_id={} purpose={} amount={}",
        updated.id,
        updated.user_id,
        updated.purpose,
        updated.amount_cents
    );
    Ok(FulfilOutcome::Fulfilled(updated))
}

/// Returns false when the transaction is unknown or already settled.
pub async fn mark_failed(
    pool: &PgPool,
    provider: Provider,
    provider_ref: &str,
    payload: serde_json::Value,
) -> Result<bool, ApiError> {
    let mut tx = pool.begin().await?;

    let Some(record) = lock_transaction(&mut tx, provider, provider_ref).await? else {
        return Ok(false);
    };
    if record.status != TxStatus::Pending.as_str() {
        return Ok(false);
    }

    set_status(&mut tx, record.id, TxStatus::Failed, None, payload).await?;
    tx.commit().await?;
    Ok(true)
}

async fn set_status(
    conn: &mut PgConnection,
    id: i32,
    status: TxStatus,
    paid_at: Option<DateTime<Utc>>,
    payload: serde_json::Value,
) -> Result<Transaction, sqlx::Error> {
    sqlx::query_as::<_, Transaction>(
        r#"UPDATE transactions
           SET status = $2, paid_at = $3, payload = payload || $4::jsonb
           WHERE id = $1
           RETURNING *"#,
    )
    .bind(id)
    .bind(status.as_str())
    .bind(paid_at)
    .bind(payload)
    .fetch_one(conn)
    .await
}

/// Grants what the transaction paid for, re-checked under row locks.
async fn apply_effect(conn: &mut PgConnection, record: &Transaction) -> Result<Effect, ApiError> {
    let purpose: PaymentPurpose = record.purpose.parse().map_err(ApiError::Internal)?;

    match (purpose, record.target_id) {
        (PaymentPurpose::Course, Some(course_id)) => {
            if !db::courses::enroll(conn, record.user_id, course_id).await? {
                return Ok(Effect::Refused("already enrolled".to_string()));
            }
        }
        (PaymentPurpose::Membership, Some(plan_id)) => {
            let interval: String = sqlx::query_scalar("SELECT billing_interval FROM membership_plans WHERE id = $1")
                .bind(plan_id)
                .fetch_one(&mut *conn)
                .await?;
            let interval: PlanInterval = interval.parse().map_err(ApiError::Internal)?;

            let existing_end =
                db::memberships::current_period_end_for_update(conn, record.user_id, plan_id).await?;
            let period = next_membership_period(existing_end, Utc::now(), interval);
            db::memberships::upsert_active(conn, record.user_id, plan_id, period).await?;
        }
        (PaymentPurpose::Ad, Some(ad_id)) => {
            let Some((status, price_cents)) = db::ads::lock_for_payment(conn, ad_id).await? else {
                return Ok(Effect::Refused("ad no longer exists".to_string()));
            };
            if status != AdStatus::PendingPayment.as_str() {
                return Ok(Effect::Refused(format!("ad is {status}")));
            }
            if price_cents != record.amount_cents {
                return Ok(Effect::Refused(format!(
                    "ad is now priced {price_cents}, paid {}",
                    record.amount_cents
                )));
            }
            if !db::ads::mark_paid(conn, ad_id).await? {
                return Ok(Effect::Refused("ad is not awaiting payment".to_string()));
            }
        }
        (PaymentPurpose::WalletTopUp, _) => {
            credit_wallet(conn, record.user_id, record.amount_cents).await?;
        }
        (purpose, None) => {
            return Err(ApiError::Internal(format!(
                "transaction {} for {purpose} has no target",
                record.id
            )));
        }
    }
    Ok(Effect::Applied)
}

async fn credit_wallet(conn: &mut PgConnection, user_id: i32, amount_cents: i64) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"UPDATE users SET wallet_balance_cents = wallet_balance_cents + $2
           WHERE id = $1
           RETURNING wallet_balance_cents"#,
    )
    .bind(user_id)
    .bind(amount_cents)
    .fetch_one(conn)
    .await
}

async fn debit_wallet(conn: &mut PgConnection, user_id: i32, amount_cents: i64) -> Result<i64, ApiError> {
    let balance: i64 = sqlx::query_scalar("SELECT wallet_balance_cents FROM users WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    if balance < amount_cents {
        return Err(ApiError::PaymentRequired(format!(
            "insufficient wallet balance: have {balance}, need {amount_cents}"
        )));
    }

    let remaining = sqlx::query_scalar::<_, i64>(
        r#"UPDATE users SET wallet_balance_cents = wallet_balance_cents - $2
           WHERE id = $1
           RETURNING wallet_balance_cents"#,
    )
    .bind(user_id)
    .bind(amount_cents)
    .fetch_one(conn)
    .await?;
    Ok(remaining)
}

/// Debit, record and fulfil in one database transaction; nothing is kept if the
/// purchase cannot be applied.
pub async fn pay_with_wallet(
    pool: &PgPool,
    user_id: i32,
    target: &PaymentTarget,
    wallet_currency: &str,
) -> Result<Transaction, ApiError> {
    if target.purpose == PaymentPurpose::WalletTopUp {
        return Err(ApiError::BadRequest("a wallet cannot top itself up".to_string()));
    }
    if !target.currency.eq_ignore_ascii_case(wallet_currency) {
        return Err(ApiError::BadRequest(format!(
            "wallet is held in {wallet_currency}, this item is priced in {}",
            target.currency
        )));
    }

    let mut tx = pool.begin().await?;
    let remaining = debit_wallet(&mut tx, user_id, target.amount_cents).await?;

    let record = sqlx::query_as::<_, Transaction>(
        r#"INSERT INTO transactions
               (user_id, provider, provider_ref, purpose, target_id, amount_cents, currency, status, payload, paid_at)
           VALUES ($1, 'wallet', $2, $3, $4, $5, $6, 'succeeded', $7, NOW())
           RETURNING *"#,
    )
    .bind(user_id)
    .bind(Uuid::new_v4().to_string())
    .bind(target.purpose.as_str())
    .bind(target.target_id)
    .bind(target.amount_cents)
    .bind(&target.currency)
    .bind(json!({ "description": target.description, "balance_after": remaining }))
    .fetch_one(&mut *tx)
    .await?;

    if let Effect::Refused(reason) = apply_effect(&mut tx, &record).await? {
        return Err(ApiError::Conflict(reason));
    }
    tx.commit().await?;

    log::info!(
        "wallet payment tx_id={} user_id={} amount={} balance_after={}",
        record.id,
        user_id,
        record.amount_cents,
        remaining
    );
    Ok(record)
}

pub async fn wallet_balance(pool: &PgPool, user_id: i32) -> Result<i64, ApiError> {
    sqlx::query_scalar::<_, i64>("SELECT wallet_balance_cents FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(ApiError::NotFound("user"))
}

pub async fn find_transaction(
    pool: &PgPool,
    provider: Provider,
    provider_ref: &str,
) -> Result<Option<Transaction>, sqlx::Error> {
    sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE provider = $1 AND provider_ref = $2")
        .bind(provider.as_str())
        .bind(provider_ref)
        .fetch_optional(pool)
        .await
}

/// True while a provider payment for the target is still open.
pub async fn has_pending_payment(pool: &PgPool, purpose: PaymentPurpose, target_id: i32) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        r#"SELECT EXISTS(
               SELECT 1 FROM transactions
               WHERE purpose = $1 AND target_id = $2 AND status = 'pending'
           )"#,
    )
    .bind(purpose.as_str())
    .bind(target_id)
    .fetch_one(pool)
    .await
}

pub async fn list_transactions(pool: &PgPool, user_id: i32) -> Result<Vec<Transaction>, sqlx::Error> {
    sqlx::query_as::<_, Transaction>(
        "SELECT * FROM transactions WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn renewal_before_expiry_extends_current_end() {
        let now = Utc::now();
        let end = now + Duration::days(10);
        let (start, new_end) = next_membership_period(Some(end), now, PlanInterval::Monthly);
        assert_eq!(start, now);
        assert_eq!(new_end, end + Duration::days(30));
    }

    #[test]
    fn lapsed_or_new_membership_starts_now() {
        let now = Utc::now();
        let (_, end) = next_membership_period(None, now, PlanInterval::Yearly);
        assert_eq!(end, now + Duration::days(365));

        let (_, end) = next_membership_period(Some(now - Duration::days(3)), now, PlanInterval::Monthly);
        assert_eq!(end, now + Duration::days(30));
    }
}
