pub mod cache;
pub mod config;
pub mod consumer;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod services;
pub mod startup;
pub mod utils;

use axum::{
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower_http::cors::CorsLayer;

use crate::cache::OrderCache;
use crate::services::OrderIngestor;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub cache: OrderCache,
    pub ingestor: OrderIngestor,
    pub store_timeout: Duration,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/orders/:id", get(handlers::orders::get_order))
        .route("/dlq", get(handlers::dlq::list_dlq))
        .route("/dlq/:id/requeue", post(handlers::dlq::requeue_dlq))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
