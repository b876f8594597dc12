pub mod ads;
pub mod auth;
pub mod community;
pub mod courses;
pub mod meetings;
pub mod memberships;
pub mod notes;
pub mod payments;
pub mod paypal_client;
pub mod payouts;
pub mod phone;
pub mod stripe;
pub mod stripe_client;
pub mod support;
pub mod webhooks;

use actix_web::web;

use crate::error::{json_config, path_config, query_config};
use crate::ws;

/// Every HTTP route of the service; `AppState` must be registered as app data.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(query_config())
        .app_data(path_config())
        .route("/ws/notifications", web::get().to(ws::notifications_ws))
        .configure(public_routes)
        .service(
            web::scope("/api")
                .wrap(auth::JwtMiddleware)
                .configure(protected_routes),
        );
}

/// Routes reachable without a token.
fn public_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(auth::register)
        .service(auth::login)
        .service(phone::country_codes)
        .service(phone::validate_phone)
        .service(ads::serve_ads)
        .service(ads::click_ad)
        .service(courses::list_courses)
        .service(memberships::list_plans)
        .service(webhooks::stripe_webhook);
}

/// Routes mounted under `/api` behind [`auth::JwtMiddleware`].
fn protected_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(auth::me)
        // ads
        .service(ads::quote_ad)
        .service(ads::create_ad)
        .service(ads::my_ads)
        .service(ads::get_ad)
        .service(ads::update_ad)
        .service(ads::delete_ad)
        .service(ads::upload_ad_image)
        .service(ads::review_ad)
        .service(ads::list_ads_for_review)
        // payouts
        .service(payouts::create_payout_account)
        .service(payouts::list_payout_accounts)
        .service(payouts::delete_payout_account)
        .service(payouts::list_payout_accounts_for_review)
        .service(payouts::verify_payout_account)
        // payments
        .service(payments::stripe_intent)
        .service(payments::stripe_setup_intent)
        .service(payments::paypal_order)
        .service(payments::paypal_capture)
        .service(payments::pay_with_wallet)
        .service(payments::wallet)
        .service(payments::transactions)
        // memberships
        .service(memberships::create_plan)
        .service(memberships::update_plan)
        .service(memberships::delete_plan)
        .service(memberships::my_memberships)
        .service(memberships::cancel_membership)
        // courses & meetings
        .service(courses::create_course)
        .service(courses::update_course)
        .service(courses::publish_course)
        .service(courses::add_lesson)
        .service(courses::list_lessons)
        .service(courses::enroll)
        .service(courses::my_enrollments)
        .service(meetings::schedule_meeting)
        .service(meetings::upcoming_meetings)
        .service(meetings::cancel_meeting)
        // notes
        .service(notes::create_note)
        .service(notes::list_notes)
        .service(notes::get_note)
        .service(notes::update_note)
        .service(notes::delete_note)
        // community
        .service(community::create_post)
        .service(community::list_posts)
        .service(community::get_post)
        .service(community::update_post)
        .service(community::delete_post)
        .service(community::reply_to_post)
        .service(community::delete_reply)
        .service(community::like_post)
        .service(community::unlike_post)
        // support
        .service(support::create_agent)
        .service(support::list_agents)
        .service(support::update_agent)
        .service(support::delete_agent)
        .service(support::expand_quick_response)
        .service(support::create_quick_response)
        .service(support::list_quick_responses)
        .service(support::update_quick_response)
        .service(support::delete_quick_response);
}
