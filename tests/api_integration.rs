use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::test::TestRequest;
use actix_web::{test, web, App};
use chrono::{Duration, Utc};
use serde_json::{json, Value};

use edu_platform::api;
use edu_platform::api::auth::AuthUser;
use edu_platform::api::stripe::sign_hmac_sha256_hex;
use edu_platform::billing::{self, FulfilOutcome, PaymentTarget};
use edu_platform::db;
use edu_platform::db::courses::CourseFields;
use edu_platform::db::memberships::PlanFields;
use edu_platform::error::ApiError;
use edu_platform::models::{PaymentPurpose, PlanInterval, Provider, Role};

mod support;

macro_rules! app_for {
    ($pool:expr) => {
        app_for!($pool, support::test_config())
    };
    ($pool:expr, $config:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(support::build_state($pool.clone(), $config)))
                .configure(api::configure),
        )
        .await
    };
}

async fn call<S, R>(app: &S, req: R) -> (StatusCode, Value)
where
    S: Service<R, Response = ServiceResponse, Error = actix_web::Error>,
{
    let resp = test::call_service(app, req).await;
    let status = resp.status();
    let body = test::read_body(resp).await;
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

fn user(id: i32, role: Role) -> AuthUser {
    AuthUser { id, role }
}

fn top_up(amount_cents: i64) -> PaymentTarget {
    PaymentTarget {
        purpose: PaymentPurpose::WalletTopUp,
        target_id: None,
        amount_cents,
        currency: "usd".to_string(),
        description: "Wallet top-up".to_string(),
    }
}

async fn published_course(pool: &sqlx::PgPool, teacher_id: i32, price_cents: i64) -> i32 {
    priced_course(pool, teacher_id, price_cents, "usd").await
}

async fn priced_course(pool: &sqlx::PgPool, teacher_id: i32, price_cents: i64, currency: &str) -> i32 {
    let course = db::courses::insert(
        pool,
        teacher_id,
        &CourseFields {
            title: format!("Algebra {price_cents} {currency}"),
            description: None,
            price_cents,
            currency: currency.to_string(),
            grade: Some(8),
        },
    )
    .await
    .expect("insert course");
    db::courses::set_published(pool, course.id, true)
        .await
        .expect("publish course");
    course.id
}

#[actix_web::test]
async fn register_login_and_profile() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let state = web::Data::new(support::build_state(test_db.pool.clone(), support::test_config()));
    let app = test::init_service(App::new().app_data(state).configure(api::configure)).await;

    let req = TestRequest::post()
        .uri("/auth/register")
        .set_json(json!({
            "email": "Ada@Example.com",
            "password": "correct horse",
            "display_name": "Ada",
            "role": "teacher",
            "country": "us",
            "phone": "415 555 0123"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = TestRequest::post()
        .uri("/auth/register")
        .set_json(json!({
            "email": "ada@example.com",
            "password": "correct horse",
            "display_name": "Ada again",
            "role": "student"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let req = TestRequest::post()
        .uri("/auth/login")
        .set_json(json!({ "email": "ada@example.com", "password": "wrong password" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = TestRequest::post()
        .uri("/auth/login")
        .set_json(json!({ "email": "ada@example.com", "password": "correct horse" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let token = body["data"]["token"].as_str().expect("token").to_string();
    assert_eq!(body["data"]["role"], json!("teacher"));

    let req = TestRequest::get()
        .uri("/api/me")
        .insert_header(("Authorization", format!("Bearer {token}")))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["email"], json!("ada@example.com"));
    assert_eq!(body["data"]["phone"], json!("+14155550123"));
    assert_eq!(body["data"]["country"], json!("US"));
}

#[actix_web::test]
async fn top_up_is_fulfilled_once() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let user_id = support::insert_user(pool, "wallet@example.com", Role::Student).await;

    billing::insert_pending(pool, user_id, Provider::Stripe, "pi_topup", &top_up(5_000), json!({}))
        .await
        .expect("insert pending");

    let outcome = billing::fulfil(pool, Provider::Stripe, "pi_topup", Some(5_000), json!({ "event": 1 }))
        .await
        .expect("fulfil");
    assert!(matches!(outcome, FulfilOutcome::Fulfilled(_)));
    assert_eq!(billing::wallet_balance(pool, user_id).await.unwrap(), 5_000);

    let again = billing::fulfil(pool, Provider::Stripe, "pi_topup", Some(5_000), json!({ "event": 2 }))
        .await
        .expect("fulfil again");
    assert!(matches!(again, FulfilOutcome::AlreadyProcessed));
    assert_eq!(billing::wallet_balance(pool, user_id).await.unwrap(), 5_000);

    let unknown = billing::fulfil(pool, Provider::Stripe, "pi_missing", None, json!({}))
        .await
        .expect("fulfil unknown");
    assert!(matches!(unknown, FulfilOutcome::Unknown));

    let duplicate =
        billing::insert_pending(pool, user_id, Provider::Stripe, "pi_topup", &top_up(5_000), json!({})).await;
    assert!(matches!(duplicate, Err(ApiError::Conflict(_))));
}

#[actix_web::test]
async fn amount_mismatch_fails_the_transaction() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let user_id = support::insert_user(pool, "mismatch@example.com", Role::Student).await;

    billing::insert_pending(pool, user_id, Provider::Stripe, "pi_short", &top_up(2_000), json!({}))
        .await
        .expect("insert pending");

    let outcome = billing::fulfil(pool, Provider::Stripe, "pi_short", Some(200), json!({}))
        .await
        .expect("fulfil");
    assert!(matches!(outcome, FulfilOutcome::AmountMismatch));

    let record = billing::find_transaction(pool, Provider::Stripe, "pi_short")
        .await
        .unwrap()
        .expect("transaction");
    assert_eq!(record.status, "failed");
    assert_eq!(billing::wallet_balance(pool, user_id).await.unwrap(), 0);
    assert!(!billing::mark_failed(pool, Provider::Stripe, "pi_short", json!({})).await.unwrap());
}

#[actix_web::test]
async fn wallet_buys_course_and_enrolls() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let teacher_id = support::insert_user(pool, "teacher@example.com", Role::Teacher).await;
    let student_id = support::insert_user(pool, "student@example.com", Role::Student).await;
    let student = AuthUser {
        id: student_id,
        role: Role::Student,
    };

    billing::insert_pending(pool, student_id, Provider::Paypal, "ORDER-9", &top_up(5_000), json!({}))
        .await
        .unwrap();
    billing::fulfil(pool, Provider::Paypal, "ORDER-9", None, json!({}))
        .await
        .unwrap();

    let cheap = published_course(pool, teacher_id, 3_000).await;
    let target = billing::resolve_target(pool, &student, PaymentPurpose::Course, Some(cheap), None, "usd")
        .await
        .expect("resolve course");
    assert_eq!(target.amount_cents, 3_000);

    let record = billing::pay_with_wallet(pool, student_id, &target, "usd").await.expect("pay");
    assert_eq!(record.status, "succeeded");
    assert_eq!(record.provider, "wallet");
    assert!(db::courses::is_enrolled(pool, student_id, cheap).await.unwrap());
    assert_eq!(billing::wallet_balance(pool, student_id).await.unwrap(), 2_000);

    let again = billing::resolve_target(pool, &student, PaymentPurpose::Course, Some(cheap), None, "usd").await;
    assert!(matches!(again, Err(ApiError::Conflict(_))));

    let pricey = published_course(pool, teacher_id, 4_000).await;
    let target = billing::resolve_target(pool, &student, PaymentPurpose::Course, Some(pricey), None, "usd")
        .await
        .unwrap();
    let short = billing::pay_with_wallet(pool, student_id, &target, "usd").await;
    assert!(matches!(short, Err(ApiError::PaymentRequired(_))));
    assert_eq!(billing::wallet_balance(pool, student_id).await.unwrap(), 2_000);
    assert!(!db::courses::is_enrolled(pool, student_id, pricey).await.unwrap());

    let history = billing::list_transactions(pool, student_id).await.unwrap();
    assert_eq!(history.len(), 2);
}

#[actix_web::test]
async fn top_up_bounds_are_enforced() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let user_id = support::insert_user(pool, "bounds@example.com", Role::Student).await;
    let user = AuthUser {
        id: user_id,
        role: Role::Student,
    };

    let low = billing::resolve_target(pool, &user, PaymentPurpose::WalletTopUp, None, Some(50), "usd").await;
    assert!(matches!(low, Err(ApiError::BadRequest(_))));
    let missing = billing::resolve_target(pool, &user, PaymentPurpose::WalletTopUp, None, None, "usd").await;
    assert!(matches!(missing, Err(ApiError::BadRequest(_))));
    let ok = billing::resolve_target(pool, &user, PaymentPurpose::WalletTopUp, None, Some(2_500), "usd")
        .await
        .unwrap();
    assert_eq!(ok.amount_cents, 2_500);

    let course = billing::resolve_target(pool, &user, PaymentPurpose::Course, None, None, "usd").await;
    assert!(matches!(course, Err(ApiError::BadRequest(_))));
}

fn ad_body(placement: &str, duration_days: i32, countries: &[&str], grades: &[i32]) -> Value {
    json!({
        "title": "Weekend algebra bootcamp",
        "target_url": "https://example.com/bootcamp",
        "placement": placement,
        "duration_days": duration_days,
        "countries": countries,
        "grades": grades
    })
}

async fn open_ad_payment(pool: &sqlx::PgPool, owner: &AuthUser, ad_id: i32, provider_ref: &str) -> PaymentTarget {
    let target = billing::resolve_target(pool, owner, PaymentPurpose::Ad, Some(ad_id), None, "usd")
        .await
        .expect("resolve ad");
    billing::insert_pending(pool, owner.id, Provider::Stripe, provider_ref, &target, json!({}))
        .await
        .expect("insert pending");
    target
}

#[actix_web::test]
async fn owner_cannot_reprice_an_ad_once_payment_starts() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let app = app_for!(pool);
    let teacher = user(support::insert_user(pool, "ads@example.com", Role::Teacher).await, Role::Teacher);
    let admin_id = support::insert_user(pool, "admin@example.com", Role::Admin).await;

    let req = TestRequest::post()
        .uri("/api/ads")
        .insert_header(support::bearer(teacher.id, Role::Teacher))
        .set_json(ad_body("sidebar", 7, &[], &[]))
        .to_request();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["price_cents"], json!(2_500));
    let ad_id = body["data"]["id"].as_i64().expect("ad id") as i32;

    let target = open_ad_payment(pool, &teacher, ad_id, "pi_ad_cheap").await;
    assert_eq!(target.amount_cents, 2_500);

    let req = TestRequest::put()
        .uri(&format!("/api/ads/{ad_id}"))
        .insert_header(support::bearer(teacher.id, Role::Teacher))
        .set_json(ad_body("video_overlay", 90, &["us"], &[]))
        .to_request();
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let req = TestRequest::put()
        .uri(&format!("/api/ads/{ad_id}"))
        .insert_header(support::bearer(admin_id, Role::Admin))
        .set_json(ad_body("video_overlay", 90, &["us"], &[]))
        .to_request();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["price_cents"], json!(65_625));

    let outcome = billing::fulfil(pool, Provider::Stripe, "pi_ad_cheap", Some(2_500), json!({}))
        .await
        .expect("fulfil");
    let FulfilOutcome::RefundRequired(record) = outcome else {
        panic!("expected a refund, got {outcome:?}");
    };
    assert_eq!(record.status, "refund_required");
    assert_eq!(record.payload["refund_reason"], json!("ad is now priced 65625, paid 2500"));

    let ad = db::ads::get(pool, ad_id).await.unwrap().expect("ad");
    assert_eq!(ad.status, "pending_payment");
}

#[actix_web::test]
async fn ad_lifecycle_from_payment_to_click() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let app = app_for!(pool);
    let teacher = user(support::insert_user(pool, "promo@example.com", Role::Teacher).await, Role::Teacher);
    let admin_id = support::insert_user(pool, "reviewer@example.com", Role::Admin).await;

    let mut ids = Vec::new();
    for (body, price) in [
        (ad_body("dashboard_banner", 7, &["us"], &[8]), 9_000),
        (ad_body("dashboard_banner", 7, &[], &[]), 3_750),
    ] {
        let req = TestRequest::post()
            .uri("/api/ads")
            .insert_header(support::bearer(teacher.id, Role::Teacher))
            .set_json(body)
            .to_request();
        let (status, body) = call(&app, req).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["price_cents"], json!(price));
        ids.push(body["data"]["id"].as_i64().expect("ad id") as i32);
    }
    let (targeted, open) = (ids[0], ids[1]);

    let req = TestRequest::post()
        .uri(&format!("/ads/{targeted}/click"))
        .to_request();
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    for (ad_id, reference) in [(targeted, "pi_targeted"), (open, "pi_open")] {
        let target = open_ad_payment(pool, &teacher, ad_id, reference).await;
        let outcome = billing::fulfil(pool, Provider::Stripe, reference, Some(target.amount_cents), json!({}))
            .await
            .expect("fulfil");
        assert!(matches!(outcome, FulfilOutcome::Fulfilled(_)));
    }

    let req = TestRequest::put()
        .uri(&format!("/api/ads/{targeted}"))
        .insert_header(support::bearer(teacher.id, Role::Teacher))
        .set_json(ad_body("sidebar", 7, &[], &[]))
        .to_request();
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let req = TestRequest::get()
        .uri("/api/admin/ads?status=pending_review")
        .insert_header(support::bearer(admin_id, Role::Admin))
        .to_request();
    let (_, body) = call(&app, req).await;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(2));

    for ad_id in [targeted, open] {
        let req = TestRequest::post()
            .uri(&format!("/api/admin/ads/{ad_id}/review"))
            .insert_header(support::bearer(admin_id, Role::Admin))
            .set_json(json!({ "decision": "approve" }))
            .to_request();
        let (status, body) = call(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], json!("active"));
    }

    let req = TestRequest::post()
        .uri(&format!("/api/admin/ads/{open}/review"))
        .insert_header(support::bearer(admin_id, Role::Admin))
        .set_json(json!({ "decision": "reject", "reason": "too late" }))
        .to_request();
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let serve = |query: &str| TestRequest::get().uri(&format!("/ads/serve?{query}")).to_request();

    let (_, body) = call(&app, serve("placement=dashboard_banner&country=us&grade=8")).await;
    assert_eq!(body["data"][0]["id"], json!(targeted));
    let (_, body) = call(&app, serve("placement=dashboard_banner&country=us&grade=8")).await;
    assert_eq!(body["data"][0]["id"], json!(open));

    let (_, body) = call(&app, serve("placement=dashboard_banner&country=fr&grade=8&limit=5")).await;
    let served: Vec<i64> = body["data"]
        .as_array()
        .expect("served list")
        .iter()
        .filter_map(|ad| ad["id"].as_i64())
        .collect();
    assert_eq!(served, vec![i64::from(open)]);

    let (_, body) = call(&app, serve("placement=sidebar&country=us")).await;
    assert_eq!(body["data"], json!([]));

    let req = TestRequest::post().uri(&format!("/ads/{targeted}/click")).to_request();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["target_url"], json!("https://example.com/bootcamp"));

    let targeted_ad = db::ads::get(pool, targeted).await.unwrap().expect("ad");
    assert_eq!(targeted_ad.impressions, 1);
    assert_eq!(targeted_ad.clicks, 1);
    let open_ad = db::ads::get(pool, open).await.unwrap().expect("ad");
    assert_eq!(open_ad.impressions, 2);
}

#[actix_web::test]
async fn second_payment_for_owned_course_needs_refund() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let teacher_id = support::insert_user(pool, "prof@example.com", Role::Teacher).await;
    let student = user(support::insert_user(pool, "twice@example.com", Role::Student).await, Role::Student);
    let course = published_course(pool, teacher_id, 3_000).await;

    billing::insert_pending(pool, student.id, Provider::Stripe, "pi_wallet", &top_up(10_000), json!({}))
        .await
        .unwrap();
    billing::fulfil(pool, Provider::Stripe, "pi_wallet", Some(10_000), json!({}))
        .await
        .unwrap();

    let target = billing::resolve_target(pool, &student, PaymentPurpose::Course, Some(course), None, "usd")
        .await
        .expect("resolve course");
    for reference in ["pi_first", "pi_second"] {
        billing::insert_pending(pool, student.id, Provider::Stripe, reference, &target, json!({}))
            .await
            .expect("insert pending");
    }

    let first = billing::fulfil(pool, Provider::Stripe, "pi_first", Some(3_000), json!({}))
        .await
        .unwrap();
    assert!(matches!(first, FulfilOutcome::Fulfilled(_)));
    let second = billing::fulfil(pool, Provider::Stripe, "pi_second", Some(3_000), json!({}))
        .await
        .unwrap();
    assert!(matches!(second, FulfilOutcome::RefundRequired(_)));

    let wallet_again = billing::pay_with_wallet(pool, student.id, &target, "usd").await;
    assert!(matches!(wallet_again, Err(ApiError::Conflict(_))));
    assert_eq!(billing::wallet_balance(pool, student.id).await.unwrap(), 10_000);

    let history = billing::list_transactions(pool, student.id).await.unwrap();
    let statuses: Vec<&str> = history.iter().map(|tx| tx.status.as_str()).collect();
    assert_eq!(history.len(), 3);
    assert_eq!(statuses.iter().filter(|s| **s == "succeeded").count(), 2);
    assert_eq!(statuses.iter().filter(|s| **s == "refund_required").count(), 1);
}

#[actix_web::test]
async fn wallet_only_pays_in_its_own_currency() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let teacher_id = support::insert_user(pool, "sensei@example.com", Role::Teacher).await;
    let student = user(support::insert_user(pool, "yen@example.com", Role::Student).await, Role::Student);

    billing::insert_pending(pool, student.id, Provider::Paypal, "ORDER-YEN", &top_up(5_000), json!({}))
        .await
        .unwrap();
    billing::fulfil(pool, Provider::Paypal, "ORDER-YEN", None, json!({}))
        .await
        .unwrap();

    let course = priced_course(pool, teacher_id, 3_000, "jpy").await;
    let target = billing::resolve_target(pool, &student, PaymentPurpose::Course, Some(course), None, "usd")
        .await
        .unwrap();
    assert_eq!(target.currency, "jpy");

    let paid = billing::pay_with_wallet(pool, student.id, &target, "usd").await;
    assert!(matches!(paid, Err(ApiError::BadRequest(_))));
    assert_eq!(billing::wallet_balance(pool, student.id).await.unwrap(), 5_000);
    assert!(!db::courses::is_enrolled(pool, student.id, course).await.unwrap());
}

#[actix_web::test]
async fn renewal_extends_membership_and_cancel_keeps_the_period() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let app = app_for!(pool);
    let member = user(support::insert_user(pool, "member@example.com", Role::Student).await, Role::Student);

    let plan = db::memberships::insert_plan(
        pool,
        &PlanFields {
            slug: "pro".to_string(),
            name: "Pro".to_string(),
            description: None,
            price_cents: 1_500,
            currency: "usd".to_string(),
            billing_interval: PlanInterval::Monthly,
            features: vec!["Live classes".to_string()],
            is_active: true,
        },
    )
    .await
    .expect("insert plan");

    let pay = |reference: &'static str| {
        let member = user(member.id, member.role);
        async move {
            let target = billing::resolve_target(pool, &member, PaymentPurpose::Membership, Some(plan.id), None, "usd")
                .await
                .expect("resolve plan");
            billing::insert_pending(pool, member.id, Provider::Stripe, reference, &target, json!({}))
                .await
                .expect("insert pending");
            let outcome = billing::fulfil(pool, Provider::Stripe, reference, Some(1_500), json!({}))
                .await
                .expect("fulfil");
            assert!(matches!(outcome, FulfilOutcome::Fulfilled(_)));
            db::memberships::list_for_user(pool, member.id).await.expect("memberships")
        }
    };

    let before = Utc::now();
    let first = pay("pi_month_1").await;
    assert_eq!(first.len(), 1);
    let first_end = first[0].current_period_end;
    assert!(first_end > before + Duration::days(30) - Duration::seconds(1));

    let second = pay("pi_month_2").await;
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].current_period_end, first_end + Duration::days(30));
    let membership_id = second[0].id;

    let req = TestRequest::post()
        .uri(&format!("/api/memberships/{membership_id}/cancel"))
        .insert_header(support::bearer(member.id, Role::Student))
        .to_request();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("canceled"));
    assert!(!body["data"]["canceled_at"].is_null());

    let canceled = db::memberships::list_for_user(pool, member.id).await.unwrap();
    assert_eq!(canceled[0].current_period_end, second[0].current_period_end);

    let req = TestRequest::post()
        .uri(&format!("/api/memberships/{membership_id}/cancel"))
        .insert_header(support::bearer(member.id, Role::Student))
        .to_request();
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let renewed = pay("pi_month_3").await;
    assert_eq!(renewed[0].status, "active");
    assert!(renewed[0].canceled_at.is_none());
    assert_eq!(renewed[0].current_period_end, second[0].current_period_end + Duration::days(30));
}

#[actix_web::test]
async fn overlapping_meetings_are_rejected() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let app = app_for!(pool);
    let teacher_id = support::insert_user(pool, "host@example.com", Role::Teacher).await;
    let course = published_course(pool, teacher_id, 0).await;
    let start = Utc::now() + Duration::days(1);

    let schedule = |starts_at: chrono::DateTime<Utc>| {
        TestRequest::post()
            .uri(&format!("/api/courses/{course}/meetings"))
            .insert_header(support::bearer(teacher_id, Role::Teacher))
            .set_json(json!({
                "title": "Office hours",
                "starts_at": starts_at,
                "duration_minutes": 60,
                "join_url": "https://meet.example.com/office-hours"
            }))
            .to_request()
    };

    let (status, _) = call(&app, schedule(start)).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = call(&app, schedule(start + Duration::minutes(30))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = call(&app, schedule(start - Duration::minutes(59))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = call(&app, schedule(start + Duration::minutes(60))).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[actix_web::test]
async fn one_open_payout_account_per_method() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let app = app_for!(pool);
    let teacher_id = support::insert_user(pool, "payee@example.com", Role::Teacher).await;

    let submit = |body: Value| {
        TestRequest::post()
            .uri("/api/payout-accounts")
            .insert_header(support::bearer(teacher_id, Role::Teacher))
            .set_json(body)
            .to_request()
    };
    let paypal = json!({ "method": "paypal", "account_holder": "Pat Payee", "paypal_email": "pat@example.com" });

    let (status, _) = call(&app, submit(paypal.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = call(&app, submit(paypal)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = call(
        &app,
        submit(json!({
            "method": "bank",
            "account_holder": "Pat Payee",
            "bank_name": "First Bank",
            "account_number": "1234-5678",
            "routing_number": "021000021"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["account_number_last4"], json!("5678"));
    assert_eq!(body["data"]["account_number_masked"], json!("****5678"));

    let duplicate = db::payouts::insert(
        pool,
        teacher_id,
        &db::payouts::NewPayoutAccount {
            method: edu_platform::models::PayoutMethod::Bank,
            account_holder: "Pat Payee".to_string(),
            bank_name: Some("Second Bank".to_string()),
            account_number_last4: Some("9999".to_string()),
            account_number_masked: Some("****9999".to_string()),
            routing_number: Some("021000021".to_string()),
            paypal_email: None,
        },
    )
    .await;
    assert!(matches!(
        duplicate.map_err(|e| ApiError::conflict_on_unique(e, "open account")),
        Err(ApiError::Conflict(_))
    ));
}

#[actix_web::test]
async fn note_patch_only_touches_sent_fields() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let app = app_for!(pool);
    let teacher_id = support::insert_user(pool, "notes-prof@example.com", Role::Teacher).await;
    let student_id = support::insert_user(pool, "notes@example.com", Role::Student).await;
    let other_id = support::insert_user(pool, "snoop@example.com", Role::Student).await;
    let course = published_course(pool, teacher_id, 0).await;

    let req = TestRequest::post()
        .uri("/api/notes")
        .insert_header(support::bearer(student_id, Role::Student))
        .set_json(json!({
            "course_id": course,
            "title": "Quadratics",
            "content": "x = (-b ± √(b²-4ac)) / 2a",
            "tags": ["Algebra", "algebra", "exam"]
        }))
        .to_request();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["tags"], json!(["algebra", "exam"]));
    let note_id = body["data"]["id"].as_i64().expect("note id");

    let patch = |who: i32, body: Value| {
        TestRequest::put()
            .uri(&format!("/api/notes/{note_id}"))
            .insert_header(support::bearer(who, Role::Student))
            .set_json(body)
            .to_request()
    };

    let (status, body) = call(&app, patch(student_id, json!({ "content": "discriminant first" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["content"], json!("discriminant first"));
    assert_eq!(body["data"]["title"], json!("Quadratics"));
    assert_eq!(body["data"]["course_id"], json!(course));
    assert_eq!(body["data"]["tags"], json!(["algebra", "exam"]));

    let (status, body) = call(&app, patch(student_id, json!({ "course_id": null, "is_pinned": true }))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["course_id"].is_null());
    assert_eq!(body["data"]["is_pinned"], json!(true));
    assert_eq!(body["data"]["content"], json!("discriminant first"));

    let (status, _) = call(&app, patch(other_id, json!({ "title": "mine now" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn likes_count_once_and_replies_keep_the_counter() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let app = app_for!(pool);
    let author = support::insert_user(pool, "author@example.com", Role::Student).await;
    let reader = support::insert_user(pool, "reader@example.com", Role::Student).await;

    let req = TestRequest::post()
        .uri("/api/community/posts")
        .insert_header(support::bearer(author, Role::Student))
        .set_json(json!({ "title": "Study group?", "body": "Anyone revising chemistry?", "category": "exams" }))
        .to_request();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);
    let post_id = body["data"]["id"].as_i64().expect("post id");

    let like = |who: i32, liked: bool| {
        let req = if liked { TestRequest::post() } else { TestRequest::delete() };
        req.uri(&format!("/api/community/posts/{post_id}/like"))
            .insert_header(support::bearer(who, Role::Student))
            .to_request()
    };

    let (_, body) = call(&app, like(reader, true)).await;
    assert_eq!(body["data"]["like_count"], json!(1));
    let (_, body) = call(&app, like(reader, true)).await;
    assert_eq!(body["data"]["like_count"], json!(1));
    let (_, body) = call(&app, like(author, true)).await;
    assert_eq!(body["data"]["like_count"], json!(2));
    let (_, body) = call(&app, like(reader, false)).await;
    assert_eq!(body["data"]["like_count"], json!(1));
    let (_, body) = call(&app, like(reader, false)).await;
    assert_eq!(body["data"]["like_count"], json!(1));

    let req = TestRequest::post()
        .uri("/api/community/posts/999999/like")
        .insert_header(support::bearer(reader, Role::Student))
        .to_request();
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let req = TestRequest::post()
        .uri(&format!("/api/community/posts/{post_id}/replies"))
        .insert_header(support::bearer(reader, Role::Student))
        .set_json(json!({ "body": "Count me in" }))
        .to_request();
    let (status, body) = call(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);
    let reply_id = body["data"]["id"].as_i64().expect("reply id");

    let read_post = || {
        TestRequest::get()
            .uri(&format!("/api/community/posts/{post_id}"))
            .insert_header(support::bearer(author, Role::Student))
            .to_request()
    };
    let (_, body) = call(&app, read_post()).await;
    assert_eq!(body["data"]["post"]["reply_count"], json!(1));
    assert_eq!(body["data"]["replies"].as_array().map(Vec::len), Some(1));

    let req = TestRequest::delete()
        .uri(&format!("/api/community/replies/{reply_id}"))
        .insert_header(support::bearer(author, Role::Student))
        .to_request();
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req = TestRequest::delete()
        .uri(&format!("/api/community/replies/{reply_id}"))
        .insert_header(support::bearer(reader, Role::Student))
        .to_request();
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = call(&app, read_post()).await;
    assert_eq!(body["data"]["post"]["reply_count"], json!(0));
}

#[actix_web::test]
async fn stripe_webhook_fulfils_through_the_route() {
    let Some(test_db) = support::init_test_db().await else {
        return;
    };
    let pool = &test_db.pool;
    let app = app_for!(pool, support::with_stripe(support::test_config(), "http://127.0.0.1:1"));
    let user_id = support::insert_user(pool, "hook@example.com", Role::Student).await;

    for reference in ["pi_hook_ok", "pi_hook_declined"] {
        billing::insert_pending(pool, user_id, Provider::Stripe, reference, &top_up(4_000), json!({}))
            .await
            .expect("insert pending");
    }

    let signed = |body: String| {
        let ts = Utc::now().timestamp();
        let signature = sign_hmac_sha256_hex(support::STRIPE_WEBHOOK_SECRET, format!("{ts}.{body}").as_bytes());
        TestRequest::post()
            .uri("/webhook/stripe")
            .insert_header(("Stripe-Signature", format!("t={ts},v1={signature}")))
            .set_payload(body)
            .to_request()
    };
    let event = |id: &str, kind: &str, intent: &str| {
        json!({
            "id": id,
            "type": kind,
            "data": { "object": { "id": intent, "amount_received": 4_000 } }
        })
        .to_string()
    };

    let (status, body) = call(&app, signed(event("evt_ok", "payment_intent.succeeded", "pi_hook_ok"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("fulfilled"));
    assert_eq!(billing::wallet_balance(pool, user_id).await.unwrap(), 4_000);

    let (_, body) = call(&app, signed(event("evt_ok", "payment_intent.succeeded", "pi_hook_ok"))).await;
    assert_eq!(body["data"]["status"], json!("already_processed"));
    assert_eq!(billing::wallet_balance(pool, user_id).await.unwrap(), 4_000);

    let (_, body) = call(
        &app,
        signed(event("evt_no", "payment_intent.payment_failed", "pi_hook_declined")),
    )
    .await;
    assert_eq!(body["data"]["status"], json!("failed"));

    let (_, body) = call(&app, signed(event("evt_x", "payment_intent.succeeded", "pi_unknown"))).await;
    assert_eq!(body["data"]["status"], json!("ignored"));

    let declined = billing::find_transaction(pool, Provider::Stripe, "pi_hook_declined")
        .await
        .unwrap()
        .expect("transaction");
    assert_eq!(declined.status, "failed");
}
