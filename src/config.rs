// src/config.rs

use std::env;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct PayPalConfig {
    pub client_id: String,
    pub client_secret: String,
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub endpoint: Option<String>,
    pub public_base_url: String,
}

/// Runtime settings read once at startup from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub jwt_secret: String,
    pub jwt_ttl_days: i64,
    pub default_currency: String,
    pub geo_api_base: String,
    pub stripe: Option<StripeConfig>,
    pub paypal: Option<PayPalConfig>,
    pub s3: Option<S3Config>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = required("DATABASE_URL")?;
        let jwt_secret = required("JWT_SECRET")?;

        let jwt_ttl_days = match optional("JWT_TTL_DAYS") {
            Some(v) => v.parse::<i64>().map_err(|e| ConfigError::Invalid {
                key: "JWT_TTL_DAYS",
                reason: e.to_string(),
            })?,
            None => 30,
        };
        if jwt_ttl_days <= 0 {
            return Err(ConfigError::Invalid {
                key: "JWT_TTL_DAYS",
                reason: "must be positive".to_string(),
            });
        }

        let stripe = match (optional("STRIPE_SECRET_KEY"), optional("STRIPE_WEBHOOK_SECRET")) {
            (Some(secret_key), Some(webhook_secret)) => Some(StripeConfig {
                secret_key,
                webhook_secret,
                api_base: optional("STRIPE_API_BASE")
                    .unwrap_or_else(|| "https://api.stripe.com".to_string()),
            }),
            (None, None) => None,
            _ => {
                return Err(ConfigError::Invalid {
                    key: "STRIPE_SECRET_KEY",
                    reason: "STRIPE_SECRET_KEY and STRIPE_WEBHOOK_SECRET must be set together"
                        .to_string(),
                })
            }
        };

        let paypal = match (optional("PAYPAL_CLIENT_ID"), optional("PAYPAL_CLIENT_SECRET")) {
            (Some(client_id), Some(client_secret)) => Some(PayPalConfig {
                client_id,
                client_secret,
                api_base: optional("PAYPAL_API_BASE")
                    .unwrap_or_else(|| "https://api-m.sandbox.paypal.com".to_string()),
            }),
            _ => None,
        };

        let s3 = optional("S3_BUCKET").map(|bucket| S3Config {
            public_base_url: optional("S3_PUBLIC_BASE_URL")
                .unwrap_or_else(|| format!("https://{}.s3.amazonaws.com", bucket)),
            endpoint: optional("S3_ENDPOINT"),
            bucket,
        });

        Ok(Self {
            database_url,
            bind_addr: optional("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8065".to_string()),
            jwt_secret,
            jwt_ttl_days,
            default_currency: optional("DEFAULT_CURRENCY").unwrap_or_else(|| "usd".to_string()),
            geo_api_base: optional("GEO_API_BASE")
                .unwrap_or_else(|| "http://ip-api.com/json".to_string()),
            stripe,
            paypal,
            s3,
        })
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    optional(key).ok_or(ConfigError::Missing(key))
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
