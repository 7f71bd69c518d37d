//! Webhook events and their parsing.
//!
//! A vendor callback looks like:
//!
//! ```json
//! {
//!   "trigger": {"alias": "record.finished", "triggered_at": "2023-04-06T15:17:50+00:00"},
//!   "data": {"record": {"id": 789012}, "client": {"id": 123456}},
//!   "webhook": {"uuid": "...", "events": ["*"]}
//! }
//! ```
//!
//! The first segment of the alias names the resource the event is about, and
//! the id is read from the `data` entry of the same name.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::resource::{json_id, parse_timestamp, ResourceKind};

/// Actions the vendor is known to send.
pub const KNOWN_ACTIONS: &[&str] = &[
    "record.bounced",
    "record.created",
    "record.updated",
    "record.finished",
    "record.reviewed",
    "client.created",
    "client.record",
    "client.updated",
    "client.status",
];

/// Action fired when a reviewer has assessed a record's steps.
pub const RECORD_REVIEWED: &str = "record.reviewed";

/// Reasons a webhook payload cannot be turned into an [`Event`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventError {
    #[error("webhook payload is not a JSON object")]
    NotAnObject,
    #[error("webhook payload has no trigger alias")]
    MissingTrigger,
    #[error("webhook payload is missing {0}")]
    MissingField(String),
    #[error("invalid trigger timestamp {0:?}")]
    InvalidTimestamp(String),
    #[error("unknown resource type {0:?}")]
    UnknownResourceType(String),
    #[error("unknown resource action {0:?}")]
    UnknownAction(String),
}

/// A single parsed webhook notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Resource tag taken from the action, e.g. "record".
    pub resource_type: String,
    /// Remote id of the resource the event concerns.
    pub remote_id: String,
    /// Dotted action name, e.g. "record.finished".
    pub action: String,
    /// Status of the resource after the event, when the vendor includes it.
    pub status_after: Option<String>,
    /// When the vendor says the event happened.
    pub event_time: Option<DateTime<Utc>>,
    /// When this service received the callback.
    pub received_at: DateTime<Utc>,
    pub raw: Value,
}

impl Event {
    /// Parse a decoded webhook body.
    pub fn parse(raw: Value, received_at: DateTime<Utc>) -> Result<Self, EventError> {
        if !raw.is_object() {
            return Err(EventError::NotAnObject);
        }

        let trigger = raw.get("trigger").ok_or(EventError::MissingTrigger)?;
        let action = trigger
            .get("alias")
            .and_then(Value::as_str)
            .filter(|alias| !alias.is_empty())
            .ok_or(EventError::MissingTrigger)?
            .to_string();

        let resource_type = action.split('.').next().unwrap_or_default().to_string();
        if ResourceKind::from_tag(&resource_type).is_none() {
            return Err(EventError::UnknownResourceType(resource_type));
        }
        if !KNOWN_ACTIONS.contains(&action.as_str()) {
            return Err(EventError::UnknownAction(action));
        }

        let object = raw
            .get("data")
            .ok_or_else(|| EventError::MissingField("data".into()))?
            .get(&resource_type)
            .ok_or_else(|| EventError::MissingField(format!("data.{resource_type}")))?;
        let remote_id = object
            .get("id")
            .and_then(json_id)
            .ok_or_else(|| EventError::MissingField(format!("data.{resource_type}.id")))?;
        let status_after = object
            .get("status")
            .and_then(Value::as_str)
            .map(str::to_string);

        // a missing time is left for the transition to reject, after the
        // resource has been resolved
        let event_time = match trigger.get("triggered_at") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(
                parse_timestamp(s).map_err(|_| EventError::InvalidTimestamp(s.clone()))?,
            ),
            Some(other) => return Err(EventError::InvalidTimestamp(other.to_string())),
        };

        Ok(Event {
            resource_type,
            remote_id,
            action,
            status_after,
            event_time,
            received_at,
            raw,
        })
    }

    /// Kind of resource the event targets.
    pub fn kind(&self) -> Option<ResourceKind> {
        ResourceKind::from_tag(&self.resource_type)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} event occurred on {}.{}",
            self.action, self.resource_type, self.remote_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record_reviewed() -> Value {
        json!({
            "webhook": {
                "uuid": "93554561-d946-4c0d-8858-28f038801b47",
                "created_at": "2023-03-31T22:54:32+00:00",
                "events": ["*"]
            },
            "trigger": {
                "triggered_at": "2023-04-06T15:17:50+00:00",
                "alias": "record.reviewed"
            },
            "data": {
                "record": {"id": 789012, "show": "https://id.amiqus.co/api/records/789012"},
                "client": {"id": 123456, "show": "https://id.amiqus.co/api/clients/123456"}
            }
        })
    }

    #[test]
    fn test_parse() {
        let received_at = Utc::now();
        let event = Event::parse(record_reviewed(), received_at).unwrap();

        assert_eq!(event.resource_type, "record");
        assert_eq!(event.kind(), Some(ResourceKind::Record));
        assert_eq!(event.remote_id, "789012");
        assert_eq!(event.action, "record.reviewed");
        assert_eq!(event.status_after, None);
        assert_eq!(
            event.event_time,
            Some(parse_timestamp("2023-04-06T15:17:50Z").unwrap())
        );
        assert_eq!(event.received_at, received_at);
        assert_eq!(event.raw, record_reviewed());
        assert_eq!(event.to_string(), "record.reviewed event occurred on record.789012");
    }

    #[test]
    fn test_parse_client_status_with_status() {
        let raw = json!({
            "trigger": {"alias": "client.status", "triggered_at": "2023-04-06T11:37:16+00:00"},
            "data": {"client": {"id": "abc", "status": "approved"}}
        });

        let event = Event::parse(raw, Utc::now()).unwrap();

        assert_eq!(event.kind(), Some(ResourceKind::Client));
        assert_eq!(event.remote_id, "abc");
        assert_eq!(event.status_after.as_deref(), Some("approved"));
    }

    #[test]
    fn test_missing_trigger() {
        let err = Event::parse(json!({"foo": "bar"}), Utc::now()).unwrap_err();
        assert_eq!(err, EventError::MissingTrigger);

        let err = Event::parse(json!({"trigger": {}}), Utc::now()).unwrap_err();
        assert_eq!(err, EventError::MissingTrigger);
    }

    #[test]
    fn test_not_an_object() {
        assert_eq!(
            Event::parse(json!([1, 2, 3]), Utc::now()).unwrap_err(),
            EventError::NotAnObject
        );
    }

    #[test]
    fn test_unknown_resource_type() {
        let mut raw = record_reviewed();
        raw["trigger"]["alias"] = json!("form.submitted");
        assert_eq!(
            Event::parse(raw, Utc::now()).unwrap_err(),
            EventError::UnknownResourceType("form".into())
        );

        let mut raw = record_reviewed();
        raw["trigger"]["alias"] = json!("foo");
        assert_eq!(
            Event::parse(raw, Utc::now()).unwrap_err(),
            EventError::UnknownResourceType("foo".into())
        );
    }

    #[test]
    fn test_unknown_action() {
        let mut raw = record_reviewed();
        raw["trigger"]["alias"] = json!("record.exploded");
        assert_eq!(
            Event::parse(raw, Utc::now()).unwrap_err(),
            EventError::UnknownAction("record.exploded".into())
        );
    }

    #[test]
    fn test_missing_data() {
        let mut raw = record_reviewed();
        raw["data"].as_object_mut().unwrap().remove("record");
        assert_eq!(
            Event::parse(raw, Utc::now()).unwrap_err(),
            EventError::MissingField("data.record".into())
        );

        let mut raw = record_reviewed();
        raw["data"]["record"].as_object_mut().unwrap().remove("id");
        assert_eq!(
            Event::parse(raw, Utc::now()).unwrap_err(),
            EventError::MissingField("data.record.id".into())
        );
    }

    #[test]
    fn test_timestamp() {
        let mut raw = record_reviewed();
        raw["trigger"].as_object_mut().unwrap().remove("triggered_at");
        let event = Event::parse(raw, Utc::now()).unwrap();
        assert_eq!(event.event_time, None);

        let mut raw = record_reviewed();
        raw["trigger"]["triggered_at"] = json!(1680794270);
        assert!(matches!(
            Event::parse(raw, Utc::now()),
            Err(EventError::InvalidTimestamp(_))
        ));

        let mut raw = record_reviewed();
        raw["trigger"]["triggered_at"] = json!("last tuesday");
        assert_eq!(
            Event::parse(raw, Utc::now()).unwrap_err(),
            EventError::InvalidTimestamp("last tuesday".into())
        );
    }
}
