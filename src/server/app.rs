//! Application setup: shared state and router assembly.

use std::sync::Arc;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::Method;
use axum::routing::{get, post};
use axum::{Extension, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::store::Store;

use super::health::health_handler;
use super::routes::{altegio_webhook_handler, whatsapp_verify_handler, whatsapp_webhook_handler};

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub config: Arc<Config>,
}

pub fn build_app(store: Store, config: Arc<Config>) -> Router {
    let state = AppState { store, config };

    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    Router::new()
        .route("/webhooks/altegio", post(altegio_webhook_handler))
        .route(
            "/webhook/whatsapp",
            get(whatsapp_verify_handler).post(whatsapp_webhook_handler),
        )
        .route("/health", get(health_handler))
        .layer(Extension(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
