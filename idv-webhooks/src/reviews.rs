//! Synchronisation of step reviews after a record has been reviewed.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::api::ApiError;
use crate::mirror::Mirror;
use crate::models::{Event, PayloadError, Resource, Review};
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ReviewSyncError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Mirror {
    /// Fetch the reviews of every step of a record and store the new or
    /// changed ones. Returns how many reviews were written.
    pub async fn sync_reviews(&self, record: &Resource) -> Result<usize, ReviewSyncError> {
        let steps = self.store.steps_for(&record.remote_id).await?;
        let mut written = 0;

        for step in steps {
            let response = self.api.get(&step.reviews_href()).await?;
            let entries = response
                .get("data")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();

            for entry in entries {
                let review = Review::parse(&step.remote_id, entry)?;
                match self.store.get_review(&review.remote_id).await? {
                    Some(existing) if existing.status == review.status => continue,
                    _ => {
                        debug!(
                            review_id = %review.remote_id,
                            step_id = %step.remote_id,
                            status = %review.status,
                            "review_saved"
                        );
                        self.store.save_review(&review).await?;
                        written += 1;
                    }
                }
            }
        }

        info!(record_id = %record.remote_id, written, "reviews_synced");
        Ok(written)
    }

    /// Follow-up for a `record.reviewed` event: refresh the reviews, then
    /// notify. A failed refresh is logged and the notification still goes out.
    pub async fn record_reviewed(&self, record: &Resource, event: &Event) {
        if let Err(e) = self.sync_reviews(record).await {
            warn!(record_id = %record.remote_id, error = %e, "review_sync_failed");
        }
        self.signals.record_reviewed(record, event);
    }
}
