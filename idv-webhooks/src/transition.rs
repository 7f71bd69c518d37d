//! Status transitions and pulls.
//!
//! `fetch` and `pull` are named after the git operations: `fetch` reads the
//! latest representation from the vendor into the local value without
//! saving it, `pull` fetches and then saves.

use tracing::{debug, info, warn};

use crate::api::ApiError;
use crate::mirror::Mirror;
use crate::models::{Event, PayloadError, Resource, ResourceKind};
use crate::signals::StatusChange;
use crate::store::{StatusFilter, StoreError};

/// Failure to apply an event to a resource.
#[derive(Debug, thiserror::Error)]
pub enum TransitionError {
    #[error("{action} event has no event time")]
    MissingEventTime { action: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failure to refresh a resource from the vendor.
#[derive(Debug, thiserror::Error)]
pub enum PullError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of a bulk pull.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullReport {
    pub pulled: usize,
    pub failed: usize,
}

impl Mirror {
    /// Refresh the local fields from the vendor without saving.
    pub async fn fetch(&self, resource: &mut Resource) -> Result<(), PullError> {
        let raw = self.api.get(&resource.href()).await?;
        resource.parse(raw, &self.scrubbers)?;
        Ok(())
    }

    /// Refresh from the vendor and save.
    pub async fn pull(&self, resource: &mut Resource) -> Result<(), PullError> {
        self.fetch(resource).await?;
        self.store.save(resource).await?;
        debug!(kind = %resource.kind, remote_id = %resource.remote_id, "resource_pulled");
        Ok(())
    }

    /// Pull every stored resource of `kind` that matches `filter`.
    ///
    /// Works from a snapshot of the matching resources. A failure on one item
    /// is logged and counted, and does not stop the rest.
    pub async fn pull_all(&self, kind: ResourceKind, filter: &StatusFilter) -> Result<PullReport, StoreError> {
        let resources = self.store.list(kind, filter).await?;
        info!(kind = %kind, count = resources.len(), "pull_all_started");

        let mut report = PullReport::default();
        for mut resource in resources {
            match self.pull(&mut resource).await {
                Ok(()) => report.pulled += 1,
                Err(e) => {
                    warn!(
                        kind = %kind,
                        remote_id = %resource.remote_id,
                        error = %e,
                        "pull_failed"
                    );
                    report.failed += 1;
                }
            }
        }

        info!(
            kind = %kind,
            pulled = report.pulled,
            failed = report.failed,
            "pull_all_finished"
        );
        Ok(report)
    }

    /// Apply a webhook event to a resource and notify subscribers.
    ///
    /// The transition is applied locally, then the resource is pulled. If
    /// the pull fails the local transition is saved on its own, so an event
    /// is never lost to a vendor outage. The status change notification is
    /// sent every time, including for an event that was already applied.
    /// Completion is sent when the event carries the completion status, or
    /// when a status-less event finds the resource newly completed.
    pub async fn update_status(&self, resource: &mut Resource, event: &Event) -> Result<StatusChange, TransitionError> {
        let Some(event_time) = event.event_time else {
            return Err(TransitionError::MissingEventTime {
                action: event.action.clone(),
            });
        };

        let status_before = resource.status.clone();
        if let Some(status) = &event.status_after {
            resource.status = Some(status.clone());
        }
        resource.updated_at = Some(event_time);

        if let Err(e) = self.pull(resource).await {
            warn!(
                kind = %resource.kind,
                remote_id = %resource.remote_id,
                error = %e,
                "pull_failed_saving_local_transition"
            );
            self.store.save(resource).await?;
        }

        let status_after = event.status_after.clone().or_else(|| resource.status.clone());
        let change = StatusChange {
            kind: resource.kind,
            remote_id: resource.remote_id.clone(),
            action: event.action.clone(),
            status_before,
            status_after,
        };

        info!(
            kind = %change.kind,
            remote_id = %change.remote_id,
            action = %change.action,
            status_before = ?change.status_before,
            status_after = ?change.status_after,
            "resource_status_updated"
        );

        self.signals.status_change(resource, &change);
        let completion = resource.kind.completion_status();
        let completed = match event.status_after.as_deref() {
            Some(status) => status == completion,
            // without a status in the event, only a change into completion counts
            None => {
                change.status_after.as_deref() == Some(completion)
                    && change.status_before.as_deref() != Some(completion)
            }
        };
        if completed {
            self.signals.completion(resource);
        }

        Ok(change)
    }
}
