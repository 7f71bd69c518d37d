//! Persistence of mirrored resources, events, steps and reviews.
//!
//! The [`ResourceStore`] trait is the seam between the webhook pipeline and
//! whatever backs it. [`MemoryStore`] keeps everything in process.
//! [`FileStore`] keeps one file per item under a directory that several
//! processes may share.

pub mod file;
pub mod memory;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::models::{Event, Resource, ResourceKind, Review, Step};

pub use file::FileStore;
pub use memory::MemoryStore;

/// Errors returned by a store implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} {remote_id} already exists")]
    Conflict { kind: ResourceKind, remote_id: String },
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Include/exclude filter on the status field.
///
/// An empty include list matches everything. Resources without a status are
/// never excluded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusFilter {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl StatusFilter {
    pub fn new(include: Vec<String>, exclude: Vec<String>) -> Self {
        StatusFilter { include, exclude }
    }

    pub fn matches(&self, status: Option<&str>) -> bool {
        if !self.include.is_empty() {
            match status {
                Some(s) if self.include.iter().any(|i| i == s) => {}
                _ => return false,
            }
        }
        match status {
            Some(s) => !self.exclude.iter().any(|e| e == s),
            None => true,
        }
    }
}

/// Storage abstraction for the local mirror.
///
/// Every write is atomic per record; there is no cross-record transaction.
/// A write that returns an error leaves the previous value visible.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Look up a resource by kind and remote id.
    async fn get(&self, kind: ResourceKind, remote_id: &str) -> Result<Option<Resource>, StoreError>;

    /// Store a new resource, failing if one with the same id exists.
    async fn insert(&self, resource: &Resource) -> Result<(), StoreError>;

    /// Create or overwrite a resource.
    async fn save(&self, resource: &Resource) -> Result<(), StoreError>;

    /// Snapshot of all resources of a kind matching the filter.
    async fn list(&self, kind: ResourceKind, filter: &StatusFilter) -> Result<Vec<Resource>, StoreError>;

    async fn save_event(&self, event: &Event) -> Result<(), StoreError>;

    /// Logged events for one resource, oldest first.
    async fn events_for(&self, kind: ResourceKind, remote_id: &str) -> Result<Vec<Event>, StoreError>;

    /// Create or overwrite a step.
    async fn save_step(&self, step: &Step) -> Result<(), StoreError>;

    async fn steps_for(&self, record_id: &str) -> Result<Vec<Step>, StoreError>;

    async fn get_review(&self, remote_id: &str) -> Result<Option<Review>, StoreError>;

    /// Create or overwrite a review.
    async fn save_review(&self, review: &Review) -> Result<(), StoreError>;
}

/// Open the store a deployment is configured for.
///
/// A data directory gives a [`FileStore`], otherwise everything stays in
/// memory.
pub async fn open(data_dir: Option<&Path>) -> Result<Arc<dyn ResourceStore>, StoreError> {
    let store: Arc<dyn ResourceStore> = match data_dir {
        Some(dir) => Arc::new(FileStore::open(dir).await?),
        None => Arc::new(MemoryStore::new()),
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_filter_default_matches_all() {
        let filter = StatusFilter::default();
        assert!(filter.matches(Some("pending")));
        assert!(filter.matches(None));
    }

    #[test]
    fn test_status_filter_include() {
        let filter = StatusFilter::new(vec!["pending".into(), "started".into()], vec![]);
        assert!(filter.matches(Some("pending")));
        assert!(!filter.matches(Some("complete")));
        assert!(!filter.matches(None));
    }

    #[test]
    fn test_status_filter_exclude() {
        let filter = StatusFilter::new(vec![], vec!["complete".into()]);
        assert!(!filter.matches(Some("complete")));
        assert!(filter.matches(Some("pending")));
        assert!(filter.matches(None));
    }

    #[tokio::test]
    async fn test_open_picks_backend() {
        let store = open(None).await.unwrap();
        assert!(store.get(ResourceKind::Record, "R1").await.unwrap().is_none());

        let dir = tempfile::tempdir().unwrap();
        let store = open(Some(dir.path())).await.unwrap();
        store.save(&Resource::new(ResourceKind::Record, "R1")).await.unwrap();
        assert!(dir.path().join("record").join("R1.json").exists());
    }
}
