//! Notifications fired when mirrored resources change.
//!
//! Handlers are connected to a [`Signals`] list owned by the caller of the
//! transition engine. `on_status_change` fires for every applied event and
//! is typically used for a complete audit history. `on_completion` fires
//! only when a resource reaches its terminal success status, which is the
//! signal most consumers act on.

use std::sync::{Arc, Mutex};

use tracing::info;

use crate::models::{Event, Resource, ResourceKind};

/// Payload of the generic status-change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub kind: ResourceKind,
    pub remote_id: String,
    /// Action that triggered the change, e.g. "record.finished".
    pub action: String,
    pub status_before: Option<String>,
    pub status_after: Option<String>,
}

/// Receiver of mirror notifications. All methods default to no-ops.
pub trait SignalHandler: Send + Sync {
    fn on_status_change(&self, _resource: &Resource, _change: &StatusChange) {}

    fn on_completion(&self, _resource: &Resource) {}

    fn on_record_reviewed(&self, _record: &Resource, _event: &Event) {}
}

/// Ordered list of connected handlers.
#[derive(Clone, Default)]
pub struct Signals {
    handlers: Vec<Arc<dyn SignalHandler>>,
}

impl Signals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&mut self, handler: Arc<dyn SignalHandler>) {
        self.handlers.push(handler);
    }

    pub fn with(mut self, handler: Arc<dyn SignalHandler>) -> Self {
        self.connect(handler);
        self
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn status_change(&self, resource: &Resource, change: &StatusChange) {
        for handler in &self.handlers {
            handler.on_status_change(resource, change);
        }
    }

    pub fn completion(&self, resource: &Resource) {
        for handler in &self.handlers {
            handler.on_completion(resource);
        }
    }

    pub fn record_reviewed(&self, record: &Resource, event: &Event) {
        for handler in &self.handlers {
            handler.on_record_reviewed(record, event);
        }
    }
}

/// Audit handler that logs every notification.
#[derive(Debug, Default)]
pub struct TracingHandler;

impl SignalHandler for TracingHandler {
    fn on_status_change(&self, _resource: &Resource, change: &StatusChange) {
        info!(
            kind = %change.kind,
            remote_id = %change.remote_id,
            action = %change.action,
            status_before = ?change.status_before,
            status_after = ?change.status_after,
            "resource_status_changed"
        );
    }

    fn on_completion(&self, resource: &Resource) {
        info!(kind = %resource.kind, remote_id = %resource.remote_id, "resource_completed");
    }

    fn on_record_reviewed(&self, record: &Resource, event: &Event) {
        info!(
            remote_id = %record.remote_id,
            received_at = %event.received_at,
            "record_reviewed"
        );
    }
}

/// A notification captured by [`RecordingHandler`].
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    StatusChange(StatusChange),
    Completion { kind: ResourceKind, remote_id: String },
    RecordReviewed { remote_id: String, action: String },
}

/// Handler that keeps every notification in memory, in order.
#[derive(Debug, Default)]
pub struct RecordingHandler {
    received: Mutex<Vec<Signal>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Signal> {
        self.received
            .lock()
            .map(|received| received.clone())
            .unwrap_or_default()
    }

    pub fn status_changes(&self) -> Vec<StatusChange> {
        self.notifications()
            .into_iter()
            .filter_map(|n| match n {
                Signal::StatusChange(change) => Some(change),
                _ => None,
            })
            .collect()
    }

    pub fn completions(&self) -> usize {
        self.notifications()
            .iter()
            .filter(|n| matches!(n, Signal::Completion { .. }))
            .count()
    }

    fn push(&self, notification: Signal) {
        if let Ok(mut received) = self.received.lock() {
            received.push(notification);
        }
    }
}

impl SignalHandler for RecordingHandler {
    fn on_status_change(&self, _resource: &Resource, change: &StatusChange) {
        self.push(Signal::StatusChange(change.clone()));
    }

    fn on_completion(&self, resource: &Resource) {
        self.push(Signal::Completion {
            kind: resource.kind,
            remote_id: resource.remote_id.clone(),
        });
    }

    fn on_record_reviewed(&self, record: &Resource, event: &Event) {
        self.push(Signal::RecordReviewed {
            remote_id: record.remote_id.clone(),
            action: event.action.clone(),
        });
    }
}
