//! Redaction of sensitive vendor fields before local persistence.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::models::ResourceKind;

/// Custom scrubbing function.
pub type ScrubFn = Arc<dyn Fn(Map<String, Value>) -> Map<String, Value> + Send + Sync>;

/// How a JSON object is reduced before it is stored.
#[derive(Clone)]
pub enum ScrubRule {
    /// Retain only the listed top-level keys.
    Keep(Vec<String>),
    /// Remove the listed top-level keys.
    Drop(Vec<String>),
    /// Store the payload unchanged.
    Passthrough,
    /// Caller-supplied function.
    Custom(ScrubFn),
}

impl fmt::Debug for ScrubRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScrubRule::Keep(keys) => f.debug_tuple("Keep").field(keys).finish(),
            ScrubRule::Drop(keys) => f.debug_tuple("Drop").field(keys).finish(),
            ScrubRule::Passthrough => f.write_str("Passthrough"),
            ScrubRule::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl ScrubRule {
    /// Apply the rule. Non-object values are returned untouched.
    pub fn apply(&self, raw: Value) -> Value {
        let map = match raw {
            Value::Object(map) => map,
            other => return other,
        };

        let scrubbed = match self {
            ScrubRule::Keep(keys) => map
                .into_iter()
                .filter(|(k, _)| keys.iter().any(|key| key == k))
                .collect(),
            ScrubRule::Drop(keys) => map
                .into_iter()
                .filter(|(k, _)| !keys.iter().any(|key| key == k))
                .collect(),
            ScrubRule::Passthrough => map,
            ScrubRule::Custom(func) => func(map),
        };

        Value::Object(scrubbed)
    }
}

/// Scrubber rules per resource kind. Records are never scrubbed.
#[derive(Debug, Clone)]
pub struct Scrubbers {
    pub client: ScrubRule,
    pub check: ScrubRule,
}

impl Default for Scrubbers {
    fn default() -> Self {
        Scrubbers {
            client: ScrubRule::Keep(vec!["id".into(), "status".into(), "created_at".into()]),
            check: ScrubRule::Drop(vec!["email".into()]),
        }
    }
}

impl Scrubbers {
    /// Scrub a raw payload for the given resource kind.
    pub fn scrub(&self, kind: ResourceKind, raw: Value) -> Value {
        match kind {
            ResourceKind::Client => self.client.apply(raw),
            ResourceKind::Check => self.check.apply(raw),
            ResourceKind::Record => raw,
        }
    }
}
