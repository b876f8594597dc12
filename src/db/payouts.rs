use sqlx::PgPool;

use crate::models::{PayoutAccount, PayoutMethod, PayoutStatus};

pub struct NewPayoutAccount {
    pub method: PayoutMethod,
    pub account_holder: String,
    pub bank_name: Option<String>,
    pub account_number_last4: Option<String>,
    pub account_number_masked: Option<String>,
    pub routing_number: Option<String>,
    pub paypal_email: Option<String>,
}

pub async fn insert(pool: &PgPool, user_id: i32, acct: &NewPayoutAccount) -> Result<PayoutAccount, sqlx::Error> {
    sqlx::query_as::<_, PayoutAccount>(
        r#"INSERT INTO payout_accounts
               (user_id, method, account_holder, bank_name, account_number_last4, account_number_masked,
                routing_number, paypal_email)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
           RETURNING *"#,
    )
    .bind(user_id)
    .bind(acct.method.as_str())
    .bind(&acct.account_holder)
    .bind(&acct.bank_name)
    .bind(&acct.account_number_last4)
    .bind(&acct.account_number_masked)
    .bind(&acct.routing_number)
    .bind(&acct.paypal_email)
    .fetch_one(pool)
    .await
}

/// A pending or verified account already exists for this method.
pub async fn has_open_account(pool: &PgPool, user_id: i32, method: PayoutMethod) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        r#"SELECT EXISTS(
               SELECT 1 FROM payout_accounts
               WHERE user_id = $1 AND method = $2 AND status IN ('pending', 'verified'))"#,
    )
    .bind(user_id)
    .bind(method.as_str())
    .fetch_one(pool)
    .await
}

pub async fn get(pool: &PgPool, id: i32) -> Result<Option<PayoutAccount>, sqlx::Error> {
    sqlx::query_as::<_, PayoutAccount>("SELECT * FROM payout_accounts WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_by_user(pool: &PgPool, user_id: i32) -> Result<Vec<PayoutAccount>, sqlx::Error> {
    sqlx::query_as::<_, PayoutAccount>(
        "SELECT * FROM payout_accounts WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

pub async fn list_by_status(pool: &PgPool, status: Option<PayoutStatus>) -> Result<Vec<PayoutAccount>, sqlx::Error> {
    sqlx::query_as::<_, PayoutAccount>(
        r#"SELECT * FROM payout_accounts
           WHERE ($1::text IS NULL OR status = $1)
           ORDER BY created_at ASC"#,
    )
    .bind(status.map(PayoutStatus::as_str))
    .fetch_all(pool)
    .await
}

/// Only pending accounts can be verified or rejected.
pub async fn set_status(
    pool: &PgPool,
    id: i32,
    status: PayoutStatus,
    reason: Option<&str>,
) -> Result<Option<PayoutAccount>, sqlx::Error> {
    sqlx::query_as::<_, PayoutAccount>(
        r#"UPDATE payout_accounts
           SET status = $2, rejection_reason = $3, updated_at = NOW()
           WHERE id = $1 AND status = 'pending'
           RETURNING *"#,
    )
    .bind(id)
    .bind(status.as_str())
    .bind(reason)
    .fetch_optional(pool)
    .await
}

pub async fn delete(pool: &PgPool, id: i32) -> Result<bool, sqlx::Error> {
    let res = sqlx::query("DELETE FROM payout_accounts WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}
