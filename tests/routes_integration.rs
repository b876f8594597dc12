use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::test::TestRequest;
use actix_web::{test, web, App};
use serde_json::{json, Value};

use edu_platform::api;
use edu_platform::api::stripe::sign_hmac_sha256_hex;
use edu_platform::models::Role;

mod support;

/// Status and JSON body, whether the handler answered or the middleware rejected.
async fn send<S, R>(app: &S, req: R) -> (StatusCode, Value)
where
    S: Service<R, Response = ServiceResponse, Error = actix_web::Error>,
{
    match app.call(req).await {
        Ok(resp) => {
            let status = resp.status();
            let body = test::read_body(resp).await;
            (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
        }
        Err(err) => {
            let resp = err.error_response();
            let status = resp.status();
            let body = actix_web::body::to_bytes(resp.into_body()).await.unwrap_or_default();
            (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
        }
    }
}

macro_rules! app_with {
    ($config:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(support::build_state(support::lazy_pool(), $config)))
                .configure(api::configure),
        )
        .await
    };
}

#[actix_web::test]
async fn protected_routes_need_a_token() {
    let app = app_with!(support::test_config());

    let (status, body) = send(&app, TestRequest::get().uri("/api/me").to_request()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], json!(false));

    let req = TestRequest::get()
        .uri("/api/me")
        .insert_header(("Authorization", "Bearer not-a-jwt"))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn quote_prices_without_touching_the_database() {
    let app = app_with!(support::test_config());

    let req = TestRequest::post()
        .uri("/api/ads/quote")
        .insert_header(support::bearer(3, Role::Teacher))
        .set_json(json!({
            "placement": "dashboard_banner",
            "duration_days": 30,
            "countries": ["us"],
            "grades": [7, 8]
        }))
        .to_request();
    let (status, body) = send(&app, req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["level"], json!("premium"));
    assert_eq!(body["data"]["base_price_cents"], json!(20_000));
    assert_eq!(body["data"]["price_cents"], json!(30_000));
}

#[actix_web::test]
async fn quote_rejects_unsupported_duration() {
    let app = app_with!(support::test_config());

    let req = TestRequest::post()
        .uri("/api/ads/quote")
        .insert_header(support::bearer(3, Role::Teacher))
        .set_json(json!({ "placement": "sidebar", "duration_days": 10 }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap_or_default().contains("10 days"));
}

#[actix_web::test]
async fn students_cannot_advertise_or_receive_payouts() {
    let app = app_with!(support::test_config());

    let req = TestRequest::post()
        .uri("/api/ads")
        .insert_header(support::bearer(5, Role::Student))
        .set_json(json!({
            "title": "Math tutoring",
            "target_url": "https://example.com/tutor",
            "placement": "sidebar",
            "duration_days": 7
        }))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req = TestRequest::post()
        .uri("/api/payout-accounts")
        .insert_header(support::bearer(5, Role::Student))
        .set_json(json!({
            "method": "paypal",
            "account_holder": "Sam Student",
            "paypal_email": "sam@example.com"
        }))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn admin_routes_reject_other_roles() {
    let app = app_with!(support::test_config());

    for uri in ["/api/admin/payout-accounts", "/api/admin/ads", "/api/admin/support-agents"] {
        let req = TestRequest::get()
            .uri(uri)
            .insert_header(support::bearer(9, Role::Teacher))
            .to_request();
        let (status, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
    }
}

#[actix_web::test]
async fn register_validates_before_storing() {
    let app = app_with!(support::test_config());

    let req = TestRequest::post()
        .uri("/auth/register")
        .set_json(json!({
            "email": "not-an-email",
            "password": "long enough",
            "display_name": "Kim",
            "role": "student"
        }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));

    let req = TestRequest::post()
        .uri("/auth/register")
        .set_json(json!({
            "email": "kim@example.com",
            "password": "long enough",
            "display_name": "Kim",
            "role": "admin"
        }))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn malformed_json_uses_error_envelope() {
    let app = app_with!(support::test_config());

    let req = TestRequest::post()
        .uri("/phone/validate")
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
}

#[actix_web::test]
async fn phone_routes_are_public() {
    let app = app_with!(support::test_config());

    let (status, body) = send(&app, TestRequest::get().uri("/country-codes").to_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]
        .as_array()
        .is_some_and(|codes| codes.iter().any(|c| c["iso"] == json!("US"))));

    let req = TestRequest::post()
        .uri("/phone/validate")
        .set_json(json!({ "country": "US", "phone": "(415) 555-0123" }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["valid"], json!(true));
    assert_eq!(body["data"]["formatted"], json!("+1 (415) 555-0123"));
}

#[actix_web::test]
async fn stripe_webhook_unavailable_without_stripe() {
    let app = app_with!(support::test_config());

    let req = TestRequest::post()
        .uri("/webhook/stripe")
        .set_payload("{}")
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[actix_web::test]
async fn stripe_webhook_checks_signature() {
    let config = support::with_stripe(support::test_config(), "http://127.0.0.1:1");
    let app = app_with!(config);
    let body = r#"{"id":"evt_1","type":"customer.created","data":{"object":{"id":"cus_1"}}}"#;

    let req = TestRequest::post()
        .uri("/webhook/stripe")
        .insert_header(("Stripe-Signature", "t=1,v1=00"))
        .set_payload(body)
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let ts = chrono::Utc::now().timestamp();
    let signature = sign_hmac_sha256_hex(support::STRIPE_WEBHOOK_SECRET, format!("{ts}.{body}").as_bytes());
    let req = TestRequest::post()
        .uri("/webhook/stripe")
        .insert_header(("Stripe-Signature", format!("t={ts},v1={signature}")))
        .set_payload(body)
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["ignored"], json!(true));
}
