// src/geo.rs
//
// IP -> country lookup against an ip-api compatible endpoint: GET {base}/{ip}

use std::net::IpAddr;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeoError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("lookup failed: {0}")]
    Lookup(String),
}

#[derive(Debug, Deserialize)]
struct GeoResponse {
    status: Option<String>,
    #[serde(rename = "countryCode")]
    country_code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GeoClient {
    http: reqwest::Client,
    base: String,
}

impl GeoClient {
    pub fn new(base: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(3))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base: base.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn lookup(&self, ip: IpAddr) -> Result<String, GeoError> {
        let resp: GeoResponse = self
            .http
            .get(format!("{}/{}", self.base, ip))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if resp.status.as_deref().is_some_and(|s| s != "success") {
            return Err(GeoError::Lookup(resp.message.unwrap_or_else(|| "unknown".to_string())));
        }
        resp.country_code
            .map(|c| c.to_ascii_uppercase())
            .ok_or_else(|| GeoError::Lookup("no countryCode in response".to_string()))
    }

    /// Country for a public client address; `None` for private ranges or on failure.
    pub async fn country_for(&self, ip: Option<&str>) -> Option<String> {
        let ip: IpAddr = ip?.trim().parse().ok()?;
        if !is_public(&ip) {
            return None;
        }
        match self.lookup(ip).await {
            Ok(country) => Some(country),
            Err(e) => {
                log::warn!("geo lookup failed ip={ip}: {e}");
                None
            }
        }
    }
}

pub fn is_public(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            !(v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast())
        }
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            !(v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xfe00) == 0xfc00
                || (first & 0xffc0) == 0xfe80)
        }
    }
}
