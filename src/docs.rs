// src/docs.rs

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::auth::register,
        crate::api::auth::login,
        crate::api::phone::country_codes,
        crate::api::phone::validate_phone,
        crate::api::ads::quote_ad,
        crate::api::ads::create_ad,
        crate::api::ads::update_ad,
        crate::api::ads::review_ad,
        crate::api::ads::serve_ads,
        crate::api::payouts::create_payout_account,
        crate::api::payouts::verify_payout_account,
        crate::api::payments::stripe_intent,
        crate::api::payments::paypal_order,
        crate::api::payments::paypal_capture,
        crate::api::payments::pay_with_wallet,
        crate::api::webhooks::stripe_webhook,
        crate::api::memberships::create_plan,
        crate::api::memberships::list_plans,
        crate::api::courses::create_course,
        crate::api::courses::list_courses,
        crate::api::courses::enroll,
        crate::api::meetings::schedule_meeting,
        crate::api::notes::create_note,
        crate::api::notes::update_note,
        crate::api::community::create_post,
        crate::api::community::list_posts,
        crate::api::support::create_agent,
        crate::api::support::expand_quick_response
    ),
    components(
        schemas(
            crate::api::auth::RegisterRequest,
            crate::api::auth::LoginRequest,
            crate::api::auth::AuthResponse,
            crate::api::phone::PhoneCheckRequest,
            crate::api::phone::PhoneCheckResponse,
            crate::api::ads::QuoteRequest,
            crate::api::ads::QuoteResponse,
            crate::api::ads::AdRequest,
            crate::api::ads::ReviewDecision,
            crate::api::ads::ReviewRequest,
            crate::api::ads::ServedAd,
            crate::api::payouts::PayoutAccountRequest,
            crate::api::payouts::VerifyRequest,
            crate::api::payments::PaymentRequest,
            crate::api::payments::StripeIntentResponse,
            crate::api::payments::PayPalOrderResponse,
            crate::api::payments::CaptureRequest,
            crate::api::payments::WalletPaymentRequest,
            crate::api::memberships::PlanRequest,
            crate::api::courses::CourseRequest,
            crate::api::courses::PublishRequest,
            crate::api::courses::LessonRequest,
            crate::api::meetings::MeetingRequest,
            crate::api::notes::NoteRequest,
            crate::api::notes::NotePatchRequest,
            crate::api::community::PostRequest,
            crate::api::community::PostPatchRequest,
            crate::api::community::ReplyRequest,
            crate::api::support::AgentRequest,
            crate::api::support::NewAgentRequest,
            crate::api::support::QuickResponseRequest,
            crate::api::support::ExpandRequest,
            crate::api::support::ExpandResponse,
            crate::models::Role,
            crate::models::Placement,
            crate::models::AdStatus,
            crate::models::PayoutMethod,
            crate::models::PayoutStatus,
            crate::models::PaymentPurpose,
            crate::models::PlanInterval
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Registration and login"),
        (name = "phone", description = "Country dial codes and phone checks"),
        (name = "ads", description = "Targeted banner campaigns"),
        (name = "payouts", description = "Teacher and freelancer payout accounts"),
        (name = "payments", description = "Stripe, PayPal and wallet payments"),
        (name = "webhooks", description = "Callbacks from payment providers"),
        (name = "memberships", description = "Membership plans"),
        (name = "courses", description = "Courses, lessons and enrolments"),
        (name = "meetings", description = "Live class scheduling"),
        (name = "notes", description = "Personal study notes"),
        (name = "community", description = "Discussion board"),
        (name = "support", description = "Support agents and quick responses")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
