//! IDV Webhooks - local mirror of an identity-verification vendor.
//!
//! This library provides shared modules for the two binaries:
//! - `idv-web`: web server receiving the vendor's status callbacks
//! - `idv-sync`: bulk pull of stored resources from the vendor API
//!
//! ## Architecture
//!
//! ```text
//! Vendor → signature check → Event::parse → resolve → update_status → signals
//!                                                          ↓
//!                                                   pull (vendor API) → store
//! ```

pub mod api;
pub mod config;
pub mod mirror;
pub mod models;
pub mod provision;
pub mod resolver;
pub mod reviews;
pub mod scrub;
pub mod signals;
pub mod store;
pub mod transition;
pub mod web;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use api::{ApiClient, ApiError, RemoteApi};
pub use config::{Config, ConfigError};
pub use mirror::Mirror;
pub use models::{Event, EventError, Resource, ResourceKind};
pub use resolver::{resolve, ResolveError};
pub use signals::{SignalHandler, Signals, StatusChange};
pub use store::{FileStore, MemoryStore, ResourceStore, StatusFilter, StoreError};
pub use transition::{PullError, PullReport, TransitionError};
pub use web::AppState;
