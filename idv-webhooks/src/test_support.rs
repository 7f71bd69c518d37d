//! Fakes shared by the unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::api::{ApiError, RemoteApi};
use crate::mirror::Mirror;
use crate::signals::RecordingHandler;
use crate::store::MemoryStore;

/// Canned vendor responses keyed by "METHOD href".
///
/// Unknown routes answer 404 `not_found`, which lets tests exercise the
/// pull-failure path by simply not registering a response.
#[derive(Default)]
pub struct FakeApi {
    responses: Mutex<HashMap<String, Value>>,
    calls: Mutex<Vec<(String, Option<Value>)>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, method: &str, href: &str, body: Value) {
        self.responses
            .lock()
            .unwrap()
            .insert(format!("{method} {href}"), body);
    }

    /// Every request made so far, as ("METHOD href", body).
    pub fn calls(&self) -> Vec<(String, Option<Value>)> {
        self.calls.lock().unwrap().clone()
    }

    fn answer(&self, method: &str, href: &str, data: Option<&Value>) -> Result<Value, ApiError> {
        let key = format!("{method} {href}");
        self.calls.lock().unwrap().push((key.clone(), data.cloned()));
        self.responses
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or_else(|| ApiError::Status {
                status: 404,
                error_type: "not_found".into(),
                body: json!({"error": "not_found"}),
            })
    }
}

#[async_trait]
impl RemoteApi for FakeApi {
    async fn get(&self, href: &str) -> Result<Value, ApiError> {
        self.answer("GET", href, None)
    }

    async fn post(&self, href: &str, data: &Value) -> Result<Value, ApiError> {
        self.answer("POST", href, Some(data))
    }

    async fn patch(&self, href: &str, data: &Value) -> Result<Value, ApiError> {
        self.answer("PATCH", href, Some(data))
    }
}

pub struct Harness {
    pub api: Arc<FakeApi>,
    pub store: Arc<MemoryStore>,
    pub recorder: Arc<RecordingHandler>,
    pub mirror: Mirror,
}

pub fn harness() -> Harness {
    let api = Arc::new(FakeApi::new());
    let store = Arc::new(MemoryStore::new());
    let recorder = Arc::new(RecordingHandler::new());
    let mirror = Mirror::new(api.clone(), store.clone()).connect(recorder.clone());
    Harness {
        api,
        store,
        recorder,
        mirror,
    }
}
