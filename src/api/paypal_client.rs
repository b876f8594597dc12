// src/api/paypal_client.rs
//
// PayPal Orders v2 client. Every call fetches a client-credentials token first.

use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::config::PayPalConfig;

#[derive(Debug, Error)]
pub enum PayPalError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("paypal api error status={status} body={body}")]
    Api { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
pub struct PayPalLink {
    pub href: String,
    pub rel: String,
}

#[derive(Debug, Deserialize)]
pub struct PayPalOrder {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub links: Vec<PayPalLink>,
}

impl PayPalOrder {
    pub fn approve_link(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|l| l.rel == "approve" || l.rel == "payer-action")
            .map(|l| l.href.as_str())
    }

    pub fn is_completed(&self) -> bool {
        self.status == "COMPLETED"
    }
}

#[derive(Debug, Clone)]
pub struct PayPalClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    api_base: String,
}

/// `1234` -> `"12.34"`
pub fn format_amount(cents: i64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}

impl PayPalClient {
    pub fn new(cfg: &PayPalConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id: cfg.client_id.clone(),
            client_secret: cfg.client_secret.clone(),
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
        }
    }

    async fn access_token(&self) -> Result<String, PayPalError> {
        let resp = self
            .http
            .post(format!("{}/v1/oauth2/token", self.api_base))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let token: TokenResponse = read_json(resp).await?;
        Ok(token.access_token)
    }

    pub async fn create_order(
        &self,
        amount_cents: i64,
        currency: &str,
        reference_id: &str,
    ) -> Result<PayPalOrder, PayPalError> {
        let token = self.access_token().await?;
        let body = json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "reference_id": reference_id,
                "amount": {
                    "currency_code": currency.to_uppercase(),
                    "value": format_amount(amount_cents),
                }
            }]
        });

        let resp = self
            .http
            .post(format!("{}/v2/checkout/orders", self.api_base))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        read_json(resp).await
    }

    pub async fn capture_order(&self, order_id: &str) -> Result<PayPalOrder, PayPalError> {
        let token = self.access_token().await?;

        let resp = self
            .http
            .post(format!("{}/v2/checkout/orders/{}/capture", self.api_base, order_id))
            .bearer_auth(token)
            .header("Content-Type", "application/json")
            .body("{}")
            .send()
            .await?;

        read_json(resp).await
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T, PayPalError> {
    let status = resp.status();
    let body = resp.text().await?;

    if !status.is_success() {
        return Err(PayPalError::Api {
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str::<T>(&body).map_err(|e| PayPalError::InvalidResponse(format!("{e}; body={body}")))
}
