//! Webhook endpoint handlers.
//!
//! The webhook always answers 200 with a short plain-text body, except for a
//! bad signature which gets a 403. The vendor retries any other non-200
//! delivery, so failures surface only in the response text and the logs.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::config::{Config, ConfigError};
use crate::mirror::Mirror;
use crate::models::{Event, EventError, ResourceKind, RECORD_REVIEWED};
use crate::resolver::{resolve, ResolveError};
use crate::transition::TransitionError;
use crate::web::signature::SignatureVerifier;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub mirror: Mirror,
    pub verifier: Arc<SignatureVerifier>,
}

impl AppState {
    /// Fails when the configuration has no usable signature setup.
    pub fn new(config: Config, mirror: Mirror) -> Result<Self, ConfigError> {
        let verifier = SignatureVerifier::from_config(&config)?;
        Ok(Self {
            config: Arc::new(config),
            mirror,
            verifier: Arc::new(verifier),
        })
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Status Webhook
// =============================================================================

/// How a webhook delivery ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    InvalidSignature,
    EmptyWebhook,
    InvalidBody,
    UnexpectedContent,
    UnknownResourceType,
    InvalidTrigger,
    NotFound(ResourceKind),
    UnknownError,
    Processed,
}

impl WebhookOutcome {
    pub fn status(&self) -> StatusCode {
        match self {
            WebhookOutcome::InvalidSignature => StatusCode::FORBIDDEN,
            _ => StatusCode::OK,
        }
    }

    pub fn message(&self) -> String {
        match self {
            WebhookOutcome::InvalidSignature => "Invalid signature".into(),
            WebhookOutcome::EmptyWebhook => "Empty webhook.".into(),
            WebhookOutcome::InvalidBody => "Invalid webhook body.".into(),
            WebhookOutcome::UnexpectedContent => "Unexpected event content.".into(),
            WebhookOutcome::UnknownResourceType => "Unknown resource type.".into(),
            WebhookOutcome::InvalidTrigger => "Invalid event trigger.".into(),
            WebhookOutcome::NotFound(kind) => format!("{} not found.", kind.label()),
            WebhookOutcome::UnknownError => "Unknown error.".into(),
            WebhookOutcome::Processed => "Update processed.".into(),
        }
    }
}

impl IntoResponse for WebhookOutcome {
    fn into_response(self) -> Response {
        (self.status(), self.message()).into_response()
    }
}

impl From<EventError> for WebhookOutcome {
    fn from(err: EventError) -> Self {
        match err {
            EventError::NotAnObject | EventError::MissingTrigger => WebhookOutcome::InvalidBody,
            EventError::MissingField(_) | EventError::InvalidTimestamp(_) => {
                WebhookOutcome::UnexpectedContent
            }
            EventError::UnknownResourceType(_) => WebhookOutcome::UnknownResourceType,
            EventError::UnknownAction(_) => WebhookOutcome::InvalidTrigger,
        }
    }
}

/// Status update webhook endpoint.
///
/// This endpoint:
/// 1. Verifies the body signature (unless in test mode)
/// 2. Parses, resolves and applies the event
/// 3. Returns 200 with a description of what happened
pub async fn status_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> WebhookOutcome {
    let received_at = Utc::now();
    debug!(body_length = body.len(), "status_webhook_received");

    if !state.verifier.verify(&headers, &body) {
        warn!(body_length = body.len(), "status_webhook_signature_invalid");
        return WebhookOutcome::InvalidSignature;
    }

    let processing = process_webhook(&state.mirror, state.config.log_events, &body, received_at);
    match AssertUnwindSafe(processing).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(_) => {
            error!("status_webhook_panicked");
            WebhookOutcome::UnknownError
        }
    }
}

/// Run one verified webhook body through the pipeline.
pub async fn process_webhook(
    mirror: &Mirror,
    log_events: bool,
    body: &[u8],
    received_at: DateTime<Utc>,
) -> WebhookOutcome {
    if body.iter().all(u8::is_ascii_whitespace) {
        info!("status_webhook_empty");
        return WebhookOutcome::EmptyWebhook;
    }

    let raw: Value = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "status_webhook_invalid_json");
            return WebhookOutcome::InvalidBody;
        }
    };

    let is_empty = match &raw {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    };
    if is_empty {
        info!("status_webhook_empty");
        return WebhookOutcome::EmptyWebhook;
    }

    let event = match Event::parse(raw, received_at) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "status_webhook_unparseable");
            return e.into();
        }
    };

    info!(
        action = %event.action,
        remote_id = %event.remote_id,
        "status_webhook_event"
    );

    let mut resource = match resolve(mirror.store(), &event).await {
        Ok(resource) => resource,
        Err(ResolveError::NotFound { kind, .. }) => return WebhookOutcome::NotFound(kind),
        Err(ResolveError::UnknownResourceType(resource_type)) => {
            warn!(resource_type = %resource_type, "status_webhook_unknown_resource_type");
            return WebhookOutcome::UnknownResourceType;
        }
        Err(ResolveError::Store(e)) => {
            error!(error = %e, remote_id = %event.remote_id, "status_webhook_store_failed");
            return WebhookOutcome::UnknownError;
        }
    };

    match mirror.update_status(&mut resource, &event).await {
        Ok(_) => {}
        Err(TransitionError::MissingEventTime { action }) => {
            warn!(action = %action, remote_id = %event.remote_id, "status_webhook_missing_event_time");
            return WebhookOutcome::UnexpectedContent;
        }
        Err(e) => {
            error!(error = %e, remote_id = %event.remote_id, "status_webhook_update_failed");
            return WebhookOutcome::UnknownError;
        }
    }

    if event.action == RECORD_REVIEWED {
        mirror.record_reviewed(&resource, &event).await;
    }

    if log_events {
        if let Err(e) = mirror.store().save_event(&event).await {
            error!(error = %e, remote_id = %event.remote_id, "status_webhook_event_save_failed");
            return WebhookOutcome::UnknownError;
        }
    }

    info!(
        action = %event.action,
        remote_id = %event.remote_id,
        status = ?resource.status,
        "status_webhook_processed"
    );
    WebhookOutcome::Processed
}
