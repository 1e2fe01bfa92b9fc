//! Tracking service library logic.
//!
//! Accepts `GET /{accountId}?data=...`, authorizes the account against the
//! account store and republishes accepted events on the tracking events
//! channel.

pub mod api;
pub mod config;
pub mod gate;
pub mod publisher;
pub mod startup;

use axum::{routing::get, Extension, Router};
use gate::IngestionGate;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
pub struct AppState {
    /// Authorizes and queues incoming events.
    pub gate: IngestionGate,
}

/// Builds the application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/{account_id}", get(api::ingest_handler))
        .fallback(api::unroutable_handler)
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}
