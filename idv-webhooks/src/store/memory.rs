//! In-process store.

use std::collections::{BTreeMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ResourceStore, StatusFilter, StoreError};
use crate::models::{Event, Resource, ResourceKind, Review, Step};

/// Number of events kept before the oldest are dropped.
pub const DEFAULT_EVENT_CAPACITY: usize = 10_000;

#[derive(Default)]
struct State {
    resources: BTreeMap<(ResourceKind, String), Resource>,
    events: VecDeque<Event>,
    /// Keyed by (record id, step id)
    steps: BTreeMap<(String, String), Step>,
    reviews: BTreeMap<String, Review>,
}

/// Store holding everything in memory.
///
/// Nothing survives a restart. The event log is a ring buffer of at most
/// `event_capacity` entries.
pub struct MemoryStore {
    state: RwLock<State>,
    event_capacity: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn get(&self, kind: ResourceKind, remote_id: &str) -> Result<Option<Resource>, StoreError> {
        let state = self.state.read().await;
        Ok(state.resources.get(&(kind, remote_id.to_string())).cloned())
    }

    async fn insert(&self, resource: &Resource) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let key = (resource.kind, resource.remote_id.clone());
        if state.resources.contains_key(&key) {
            return Err(StoreError::Conflict {
                kind: resource.kind,
                remote_id: resource.remote_id.clone(),
            });
        }
        state.resources.insert(key, resource.clone());
        Ok(())
    }

    async fn save(&self, resource: &Resource) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state
            .resources
            .insert((resource.kind, resource.remote_id.clone()), resource.clone());
        Ok(())
    }

    async fn list(&self, kind: ResourceKind, filter: &StatusFilter) -> Result<Vec<Resource>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .resources
            .values()
            .filter(|r| r.kind == kind && filter.matches(r.status.as_deref()))
            .cloned()
            .collect())
    }

    async fn save_event(&self, event: &Event) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if self.event_capacity == 0 {
            return Ok(());
        }
        while state.events.len() >= self.event_capacity {
            state.events.pop_front();
        }
        state.events.push_back(event.clone());
        Ok(())
    }

    async fn events_for(&self, kind: ResourceKind, remote_id: &str) -> Result<Vec<Event>, StoreError> {
        let state = self.state.read().await;
        let mut events: Vec<Event> = state
            .events
            .iter()
            .filter(|e| e.resource_type == kind.as_str() && e.remote_id == remote_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.event_time);
        Ok(events)
    }

    async fn save_step(&self, step: &Step) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state
            .steps
            .insert((step.record_id.clone(), step.remote_id.clone()), step.clone());
        Ok(())
    }

    async fn steps_for(&self, record_id: &str) -> Result<Vec<Step>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .steps
            .values()
            .filter(|s| s.record_id == record_id)
            .cloned()
            .collect())
    }

    async fn get_review(&self, remote_id: &str) -> Result<Option<Review>, StoreError> {
        let state = self.state.read().await;
        Ok(state.reviews.get(remote_id).cloned())
    }

    async fn save_review(&self, review: &Review) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.reviews.insert(review.remote_id.clone(), review.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::parse_timestamp;
    use chrono::Utc;
    use serde_json::json;

    fn record(id: &str, status: &str) -> Resource {
        let mut r = Resource::new(ResourceKind::Record, id);
        r.status = Some(status.into());
        r
    }

    fn event(id: &str, at: &str) -> Event {
        Event {
            resource_type: "record".into(),
            remote_id: id.into(),
            action: "record.updated".into(),
            status_after: None,
            event_time: Some(parse_timestamp(at).unwrap()),
            received_at: Utc::now(),
            raw: json!({}),
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = MemoryStore::new();
        store.insert(&record("R1", "pending")).await.unwrap();

        let found = store.get(ResourceKind::Record, "R1").await.unwrap();
        assert_eq!(found.unwrap().status.as_deref(), Some("pending"));

        // same id, different kind is a different resource
        assert!(store.get(ResourceKind::Client, "R1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_conflict() {
        let store = MemoryStore::new();
        store.insert(&record("R1", "pending")).await.unwrap();

        let err = store.insert(&record("R1", "complete")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { kind: ResourceKind::Record, .. }));

        store.save(&record("R1", "complete")).await.unwrap();
        let found = store.get(ResourceKind::Record, "R1").await.unwrap().unwrap();
        assert_eq!(found.status.as_deref(), Some("complete"));
    }

    #[tokio::test]
    async fn test_list_with_filter() {
        let store = MemoryStore::new();
        store.save(&record("R1", "pending")).await.unwrap();
        store.save(&record("R2", "complete")).await.unwrap();
        store.save(&Resource::new(ResourceKind::Client, "C1")).await.unwrap();

        let all = store.list(ResourceKind::Record, &StatusFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);

        let filter = StatusFilter::new(vec![], vec!["complete".into()]);
        let open = store.list(ResourceKind::Record, &filter).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].remote_id, "R1");
    }

    #[tokio::test]
    async fn test_events_for_sorted() {
        let store = MemoryStore::new();
        store.save_event(&event("R1", "2023-04-06T15:00:00Z")).await.unwrap();
        store.save_event(&event("R2", "2023-04-06T14:00:00Z")).await.unwrap();
        store.save_event(&event("R1", "2023-04-06T13:00:00Z")).await.unwrap();

        let events = store.events_for(ResourceKind::Record, "R1").await.unwrap();
        assert_eq!(events.len(), 2);
        assert!(events[0].event_time < events[1].event_time);
    }

    #[tokio::test]
    async fn test_event_log_drops_oldest_past_capacity() {
        let store = MemoryStore::new().with_event_capacity(2);
        store.save_event(&event("R1", "2023-04-06T13:00:00Z")).await.unwrap();
        store.save_event(&event("R1", "2023-04-06T14:00:00Z")).await.unwrap();
        store.save_event(&event("R1", "2023-04-06T15:00:00Z")).await.unwrap();

        let events = store.events_for(ResourceKind::Record, "R1").await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0].event_time,
            Some(parse_timestamp("2023-04-06T14:00:00Z").unwrap())
        );
    }
}
