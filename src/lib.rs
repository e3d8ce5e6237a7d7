pub mod adapters;
pub mod auth;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod ports;
pub mod services;
pub mod validation;

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::auth::{Authorizer, SessionSigner};
use crate::config::TagSettings;
use crate::ports::{BlobStore, TagStore};
use crate::services::{
    BillingService, CustomerPortal, NotificationDispatcher, Notifier, RegistrationService,
    ReplacementService, SequenceAllocator, TagLifecycle,
};

/// Largest accepted request body (photo uploads, results files).
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<RegistrationService>,
    pub lifecycle: Arc<TagLifecycle>,
    pub replacements: Arc<ReplacementService>,
    pub billing: Arc<BillingService>,
    pub customers: Arc<CustomerPortal>,
    pub authorizer: Arc<dyn Authorizer>,
    pub notifications: NotificationDispatcher,
}

impl AppState {
    /// Wires every service against one record store and one blob store.
    pub fn build<S: TagStore + 'static>(
        store: Arc<S>,
        blobs: Arc<dyn BlobStore>,
        notifier: Arc<dyn Notifier>,
        authorizer: Arc<dyn Authorizer>,
        settings: TagSettings,
        session_secret: &str,
    ) -> Self {
        let notifications = NotificationDispatcher::new(notifier);
        let sequence = SequenceAllocator::new(store.clone());
        let sessions = SessionSigner::new(session_secret, settings.session_ttl_hours);

        Self {
            registry: Arc::new(RegistrationService::new(
                store.clone(),
                blobs.clone(),
                sequence.clone(),
                notifications.clone(),
                settings.clone(),
            )),
            lifecycle: Arc::new(TagLifecycle::new(store.clone(), store.clone())),
            replacements: Arc::new(ReplacementService::new(
                store.clone(),
                store.clone(),
                sequence,
                notifications.clone(),
                settings.clone(),
            )),
            billing: Arc::new(BillingService::new(
                store.clone(),
                store.clone(),
                blobs,
                notifications.clone(),
                settings,
            )),
            customers: Arc::new(CustomerPortal::new(store.clone(), store, sessions)),
            authorizer,
            notifications,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    create_app_with_cors(state, None)
}

/// `allowed_origins: None` allows any origin.
pub fn create_app_with_cors(state: AppState, allowed_origins: Option<Vec<String>>) -> Router {
    let admin = Router::new()
        .route("/login", post(handlers::admin::login))
        .route("/stats", get(handlers::admin::stats))
        .route("/pets", get(handlers::admin::list_pets))
        .route(
            "/pets/update-payment-status",
            post(handlers::admin::update_payment_status),
        )
        .route("/tags/print-queue", get(handlers::admin::print_queue))
        .route("/tags/update-status", post(handlers::admin::update_tag_status))
        .route("/tags/bulk-update", post(handlers::admin::bulk_update_tags))
        .route(
            "/tags/create-manufacturing-batch",
            post(handlers::admin::create_manufacturing_batch),
        )
        .route(
            "/tags/manufacturing-batches",
            get(handlers::admin::list_manufacturing_batches),
        )
        .route(
            "/tags/manufacturing-batches/:id/start",
            post(handlers::admin::start_manufacturing_batch),
        )
        .route(
            "/tags/manufacturing-batches/:id/complete",
            post(handlers::admin::complete_manufacturing_batch),
        )
        .route(
            "/tags/create-shipping-batch",
            post(handlers::admin::create_shipping_batch),
        )
        .route(
            "/tags/create-replacement",
            post(handlers::admin::create_replacement),
        )
        .route("/tags/replacements", get(handlers::admin::list_replacements))
        .route("/billing/generate-csv", post(handlers::admin::generate_billing_csv))
        .route(
            "/billing/download/:filename",
            get(handlers::admin::download_billing_file),
        )
        .route(
            "/payments/import-results",
            post(handlers::admin::import_payment_results),
        )
        .route("/billing/fee-adjustment", post(handlers::admin::adjust_fees))
        .layer(from_fn_with_state(state.clone(), middleware::auth::admin_auth));

    let customer = Router::new()
        .route("/login", post(handlers::customer::login))
        .route("/pet", get(handlers::customer::my_pet))
        .route(
            "/replacement-request",
            post(handlers::customer::request_replacement),
        );

    let cors = match allowed_origins {
        Some(origins) => CorsLayer::new().allow_origin(AllowOrigin::list(
            origins.iter().filter_map(|origin| origin.parse().ok()),
        )),
        None => CorsLayer::new().allow_origin(Any),
    }
    .allow_methods(Any)
    .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/pets/register", post(handlers::public::register))
        .route("/api/pets/:id/photo", post(handlers::public::upload_photo))
        .route("/api/scan/:id", get(handlers::public::scan))
        .nest("/api/admin", admin)
        .nest("/api/customer", customer)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(from_fn(middleware::request_logger::request_logger_middleware))
        .layer(cors)
        .with_state(state)
}
