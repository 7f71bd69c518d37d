//! Resolve the local resource an event refers to.

use tracing::warn;

use crate::models::{Event, Resource, ResourceKind};
use crate::store::{ResourceStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("{} {remote_id} not found", .kind.label())]
    NotFound { kind: ResourceKind, remote_id: String },
    #[error("unknown resource type {0:?}")]
    UnknownResourceType(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Look up the stored resource an event concerns, by kind and remote id.
pub async fn resolve(store: &dyn ResourceStore, event: &Event) -> Result<Resource, ResolveError> {
    let kind = event
        .kind()
        .ok_or_else(|| ResolveError::UnknownResourceType(event.resource_type.clone()))?;

    match store.get(kind, &event.remote_id).await? {
        Some(resource) => Ok(resource),
        None => {
            warn!(kind = %kind, remote_id = %event.remote_id, "resource_not_found");
            Err(ResolveError::NotFound {
                kind,
                remote_id: event.remote_id.clone(),
            })
        }
    }
}
