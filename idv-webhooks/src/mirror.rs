//! The local mirror: remote API, store, scrubbers and connected signals.
//!
//! Operations on the mirror are split by concern: status transitions and
//! pulls live in `transition`, client/record creation in `provision`, and
//! review synchronisation in `reviews`.

use std::sync::Arc;

use crate::api::RemoteApi;
use crate::scrub::Scrubbers;
use crate::signals::{SignalHandler, Signals};
use crate::store::ResourceStore;

/// Everything needed to keep local resources in step with the vendor.
#[derive(Clone)]
pub struct Mirror {
    pub(crate) api: Arc<dyn RemoteApi>,
    pub(crate) store: Arc<dyn ResourceStore>,
    pub(crate) signals: Signals,
    pub(crate) scrubbers: Scrubbers,
}

impl Mirror {
    pub fn new(api: Arc<dyn RemoteApi>, store: Arc<dyn ResourceStore>) -> Self {
        Self {
            api,
            store,
            signals: Signals::new(),
            scrubbers: Scrubbers::default(),
        }
    }

    pub fn with_scrubbers(mut self, scrubbers: Scrubbers) -> Self {
        self.scrubbers = scrubbers;
        self
    }

    pub fn with_signals(mut self, signals: Signals) -> Self {
        self.signals = signals;
        self
    }

    /// Connect one more notification handler.
    pub fn connect(mut self, handler: Arc<dyn SignalHandler>) -> Self {
        self.signals.connect(handler);
        self
    }

    pub fn api(&self) -> &dyn RemoteApi {
        self.api.as_ref()
    }

    pub fn store(&self) -> &dyn ResourceStore {
        self.store.as_ref()
    }

    pub fn signals(&self) -> &Signals {
        &self.signals
    }

    pub fn scrubbers(&self) -> &Scrubbers {
        &self.scrubbers
    }
}
