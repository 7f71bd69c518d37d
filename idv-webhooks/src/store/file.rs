//! Directory-backed store: one JSON file per resource, step and review.
//!
//! Layout under the root directory:
//!
//! ```text
//! client/<id>.json
//! record/<id>.json
//! check/<id>.json
//! steps/<record id>/<step id>.json
//! reviews/<review id>.json
//! events.jsonl
//! tmp/
//! ```
//!
//! Every write lands in a fresh file under `tmp/` and is renamed over its
//! target, so a single record is replaced atomically and a failed write
//! leaves the previous version in place. Nothing is cached in process, which
//! lets the web server and the sync command share one root. Events are
//! appended as one compact JSON line each.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use super::{ResourceStore, StatusFilter, StoreError};
use crate::models::{Event, Resource, ResourceKind, Review, Step};

const STAGING_DIR: &str = "tmp";
const STEPS_DIR: &str = "steps";
const REVIEWS_DIR: &str = "reviews";
const EVENTS_FILE: &str = "events.jsonl";

/// Store keeping each item in its own file under a root directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(root.join(STAGING_DIR)).await?;
        info!(root = %root.display(), "file_store_opened");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resource_path(&self, kind: ResourceKind, remote_id: &str) -> PathBuf {
        self.root.join(kind.as_str()).join(file_name(remote_id))
    }

    fn step_dir(&self, record_id: &str) -> PathBuf {
        self.root.join(STEPS_DIR).join(encode(record_id))
    }

    fn review_path(&self, remote_id: &str) -> PathBuf {
        self.root.join(REVIEWS_DIR).join(file_name(remote_id))
    }

    async fn write(&self, path: PathBuf, body: Vec<u8>, overwrite: bool) -> io::Result<()> {
        let staging = self.root.join(STAGING_DIR);
        let target = path.clone();
        let bytes = body.len();
        blocking(move || write_atomic(&staging, &target, &body, overwrite)).await?;
        debug!(path = %path.display(), bytes, "file_store_written");
        Ok(())
    }
}

/// Encode an identifier into a single safe path component.
///
/// Dots are escaped too, so no component is ever `.` or `..`.
fn encode(id: &str) -> String {
    url::form_urlencoded::byte_serialize(id.as_bytes())
        .collect::<String>()
        .replace('.', "%2E")
}

fn file_name(id: &str) -> String {
    format!("{}.json", encode(id))
}

async fn blocking<F>(f: F) -> io::Result<()>
where
    F: FnOnce() -> io::Result<()> + Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(io::Error::other)?
}

fn write_atomic(staging: &Path, path: &Path, body: &[u8], overwrite: bool) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut tmp = NamedTempFile::new_in(staging)?;
    tmp.write_all(body)?;
    tmp.as_file().sync_all()?;
    if overwrite {
        tmp.persist(path).map_err(|e| e.error)?;
    } else {
        tmp.persist_noclobber(path).map_err(|e| e.error)?;
    }
    Ok(())
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn read_dir_json<T: DeserializeOwned>(dir: &Path) -> Result<Vec<T>, StoreError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut items = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        // None when the file went away between listing and reading
        if let Some(item) = read_json(&path).await? {
            items.push(item);
        }
    }
    Ok(items)
}

#[async_trait]
impl ResourceStore for FileStore {
    async fn get(&self, kind: ResourceKind, remote_id: &str) -> Result<Option<Resource>, StoreError> {
        read_json(&self.resource_path(kind, remote_id)).await
    }

    async fn insert(&self, resource: &Resource) -> Result<(), StoreError> {
        let body = serde_json::to_vec(resource)?;
        let path = self.resource_path(resource.kind, &resource.remote_id);
        match self.write(path, body, false).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(StoreError::Conflict {
                kind: resource.kind,
                remote_id: resource.remote_id.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, resource: &Resource) -> Result<(), StoreError> {
        let body = serde_json::to_vec(resource)?;
        let path = self.resource_path(resource.kind, &resource.remote_id);
        self.write(path, body, true).await?;
        Ok(())
    }

    async fn list(&self, kind: ResourceKind, filter: &StatusFilter) -> Result<Vec<Resource>, StoreError> {
        let mut resources: Vec<Resource> = read_dir_json(&self.root.join(kind.as_str())).await?;
        resources.retain(|r| r.kind == kind && filter.matches(r.status.as_deref()));
        resources.sort_by(|a, b| a.remote_id.cmp(&b.remote_id));
        Ok(resources)
    }

    async fn save_event(&self, event: &Event) -> Result<(), StoreError> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        let path = self.root.join(EVENTS_FILE);

        blocking(move || {
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)?;
            file.write_all(&line)
        })
        .await?;
        Ok(())
    }

    async fn events_for(&self, kind: ResourceKind, remote_id: &str) -> Result<Vec<Event>, StoreError> {
        let contents = match tokio::fs::read_to_string(self.root.join(EVENTS_FILE)).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut events = Vec::new();
        for (number, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Event>(line) {
                Ok(event) if event.resource_type == kind.as_str() && event.remote_id == remote_id => {
                    events.push(event)
                }
                Ok(_) => {}
                Err(e) => warn!(line = number + 1, error = %e, "file_store_event_line_skipped"),
            }
        }
        events.sort_by_key(|e| e.event_time);
        Ok(events)
    }

    async fn save_step(&self, step: &Step) -> Result<(), StoreError> {
        let body = serde_json::to_vec(step)?;
        let path = self.step_dir(&step.record_id).join(file_name(&step.remote_id));
        self.write(path, body, true).await?;
        Ok(())
    }

    async fn steps_for(&self, record_id: &str) -> Result<Vec<Step>, StoreError> {
        let mut steps: Vec<Step> = read_dir_json(&self.step_dir(record_id)).await?;
        steps.sort_by(|a, b| a.remote_id.cmp(&b.remote_id));
        Ok(steps)
    }

    async fn get_review(&self, remote_id: &str) -> Result<Option<Review>, StoreError> {
        read_json(&self.review_path(remote_id)).await
    }

    async fn save_review(&self, review: &Review) -> Result<(), StoreError> {
        let body = serde_json::to_vec(review)?;
        self.write(self.review_path(&review.remote_id), body, true).await?;
        Ok(())
    }
}
