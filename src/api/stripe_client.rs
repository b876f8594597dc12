// src/api/stripe_client.rs
//
// Minimal Stripe REST client: PaymentIntents and SetupIntents.
// Auth: `Authorization: Bearer <secret key>`, bodies are form-encoded.

use serde::Deserialize;
use thiserror::Error;

use crate::config::StripeConfig;

#[derive(Debug, Error)]
pub enum StripeError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("stripe api error status={status} body={body}")]
    Api { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub status: String,
    pub client_secret: Option<String>,
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Deserialize)]
pub struct SetupIntent {
    pub id: String,
    pub status: String,
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    api_base: String,
    pub webhook_secret: String,
}

impl StripeClient {
    pub fn new(cfg: &StripeConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key: cfg.secret_key.clone(),
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            webhook_secret: cfg.webhook_secret.clone(),
        }
    }

    pub async fn create_payment_intent(
        &self,
        amount_cents: i64,
        currency: &str,
        metadata: &[(&str, String)],
    ) -> Result<PaymentIntent, StripeError> {
        let mut form = vec![
            ("amount".to_string(), amount_cents.to_string()),
            ("currency".to_string(), currency.to_lowercase()),
            ("automatic_payment_methods[enabled]".to_string(), "true".to_string()),
        ];
        form.extend(metadata_fields(metadata));

        self.post_form("/v1/payment_intents", &form).await
    }

    pub async fn create_setup_intent(&self, metadata: &[(&str, String)]) -> Result<SetupIntent, StripeError> {
        let mut form = vec![("usage".to_string(), "off_session".to_string())];
        form.extend(metadata_fields(metadata));

        self.post_form("/v1/setup_intents", &form).await
    }

    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> Result<T, StripeError> {
        let resp = self
            .http
            .post(format!("{}{}", self.api_base, path))
            .bearer_auth(&self.secret_key)
            .form(form)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(StripeError::Api {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str::<T>(&body)
            .map_err(|e| StripeError::InvalidResponse(format!("{e}; body={body}")))
    }
}

fn metadata_fields<'a>(metadata: &'a [(&'a str, String)]) -> impl Iterator<Item = (String, String)> + 'a {
    metadata
        .iter()
        .map(|(k, v)| (format!("metadata[{k}]"), v.clone()))
}
