// src/main.rs
use std::io;

use actix::Actor;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use dotenvy::dotenv;
use sqlx::PgPool;
use tracing_subscriber::{fmt, EnvFilter};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use edu_platform::config::Config;
use edu_platform::s3_utils::Storage;
use edu_platform::ws::NotificationHub;
use edu_platform::{api, docs, AppState};

async fn index() -> impl Responder {
    HttpResponse::Ok().body("Service ready!")
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();
    // `log` records from actix and the handlers are bridged into the subscriber
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let pool = PgPool::connect(&config.database_url)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::ConnectionRefused, e))?;

    sqlx::migrate!()
        .run(&pool)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    let hub = NotificationHub::new().start();
    let mut app_state = AppState::new(pool, config.clone(), hub);

    match &config.s3 {
        Some(s3) => app_state = app_state.with_storage(Storage::from_config(s3).await),
        None => log::warn!("S3_BUCKET not set, ad image uploads are disabled"),
    }
    if app_state.stripe.is_none() {
        log::warn!("Stripe is not configured, card payments are disabled");
    }
    if app_state.paypal.is_none() {
        log::warn!("PayPal is not configured");
    }

    let state = web::Data::new(app_state);
    log::info!("listening on {}", config.bind_addr);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(state.clone())
            .route("/", web::get().to(index))
            .service(
                SwaggerUi::new("/docs/{_:.*}")
                    .url("/api-docs/openapi.json", docs::ApiDoc::openapi()),
            )
            .configure(api::configure)
    })
    .bind(config.bind_addr.as_str())?
    .run()
    .await
}
