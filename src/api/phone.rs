// src/api/phone.rs

use actix_web::{get, post, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{ok, ApiResult};
use crate::phone::{self, COUNTRY_CODES};

#[derive(Debug, Deserialize, ToSchema)]
pub struct PhoneCheckRequest {
    pub country: String,
    pub phone: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PhoneCheckResponse {
    pub valid: bool,
    pub e164: Option<String>,
    pub formatted: Option<String>,
    pub error: Option<String>,
}

/// Result of checking one number; an invalid number is not a request error.
pub fn check(country: &str, raw: &str) -> PhoneCheckResponse {
    let result = phone::validate(country, raw)
        .and_then(|e164| phone::format_international(country, raw).map(|formatted| (e164, formatted)));

    match result {
        Ok((e164, formatted)) => PhoneCheckResponse {
            valid: true,
            e164: Some(e164),
            formatted: Some(formatted),
            error: None,
        },
        Err(e) => PhoneCheckResponse {
            valid: false,
            e164: None,
            formatted: None,
            error: Some(e.to_string()),
        },
    }
}

#[utoipa::path(
    get,
    path = "/country-codes",
    tag = "phone",
    responses((status = 200, description = "Supported countries with dial codes"))
)]
#[get("/country-codes")]
pub async fn country_codes() -> ApiResult {
    Ok(ok(COUNTRY_CODES))
}

#[utoipa::path(
    post,
    path = "/phone/validate",
    tag = "phone",
    request_body = PhoneCheckRequest,
    responses((status = 200, description = "Validation result", body = PhoneCheckResponse))
)]
#[post("/phone/validate")]
pub async fn validate_phone(payload: web::Json<PhoneCheckRequest>) -> ApiResult {
    Ok(ok(check(&payload.country, &payload.phone)))
}
