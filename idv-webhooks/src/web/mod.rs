//! Web server module for receiving vendor status callbacks.
//!
//! This module provides a small axum application that:
//! - Verifies the signature of each callback
//! - Applies the event to the local mirror
//! - Always answers 200 unless the signature is bad

pub mod handlers;
pub mod signature;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use handlers::{health, process_webhook, status_update, AppState, HealthResponse, WebhookOutcome};
pub use signature::{compute_signature, verify_signature, SignatureVerifier, SIGNATURE_HEADER};

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let webhook_path = state.config.webhook_path();

    Router::new()
        .route("/health", get(health))
        .route(&webhook_path, post(status_update))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
