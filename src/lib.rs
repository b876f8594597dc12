pub mod api;
pub mod billing;
pub mod config;
pub mod db;
pub mod docs;
pub mod error;
pub mod geo;
pub mod models;
pub mod phone;
pub mod quick_responses;
pub mod s3_utils;
pub mod targeting;
pub mod ws;

use sqlx::PgPool;

use api::paypal_client::PayPalClient;
use api::stripe_client::StripeClient;
use config::Config;
use geo::GeoClient;
use s3_utils::Storage;
use ws::NotificationHub;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub stripe: Option<StripeClient>,
    pub paypal: Option<PayPalClient>,
    pub geo: GeoClient,
    pub storage: Option<Storage>,
    pub hub: actix::Addr<NotificationHub>,
}

impl AppState {
    /// Wires the HTTP clients from config. S3 is attached separately since it loads AWS config.
    pub fn new(pool: PgPool, config: Config, hub: actix::Addr<NotificationHub>) -> Self {
        Self {
            stripe: config.stripe.as_ref().map(StripeClient::new),
            paypal: config.paypal.as_ref().map(PayPalClient::new),
            geo: GeoClient::new(config.geo_api_base.clone()),
            storage: None,
            pool,
            config,
            hub,
        }
    }

    pub fn with_storage(mut self, storage: Storage) -> Self {
        self.storage = Some(storage);
        self
    }
}
