//! Local mirrors of remote vendor resources.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::scrub::Scrubbers;

/// Terminal success status of records and checks.
pub const ACCEPTED: &str = "accepted";

/// Terminal success status of clients.
pub const APPROVED: &str = "approved";

/// The kinds of remote resource mirrored locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Client,
    Record,
    Check,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [ResourceKind::Client, ResourceKind::Record, ResourceKind::Check];

    /// Map an event resource tag (the first segment of an action) to a kind.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "client" => Some(ResourceKind::Client),
            "record" => Some(ResourceKind::Record),
            "check" => Some(ResourceKind::Check),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Client => "client",
            ResourceKind::Record => "record",
            ResourceKind::Check => "check",
        }
    }

    /// Capitalised name used in webhook responses.
    pub fn label(&self) -> &'static str {
        match self {
            ResourceKind::Client => "Client",
            ResourceKind::Record => "Record",
            ResourceKind::Check => "Check",
        }
    }

    /// Collection path on the vendor API.
    pub fn base_href(&self) -> &'static str {
        match self {
            ResourceKind::Client => "clients",
            ResourceKind::Record => "records",
            ResourceKind::Check => "checks",
        }
    }

    /// Status value that marks the workflow as finished and successful.
    pub fn completion_status(&self) -> &'static str {
        match self {
            ResourceKind::Client => APPROVED,
            ResourceKind::Record | ResourceKind::Check => ACCEPTED,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::from_tag(&s.to_ascii_lowercase())
            .ok_or_else(|| format!("unknown resource kind: {s} (expected client, record or check)"))
    }
}

/// Client status values accepted by the vendor's PATCH endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientStatus {
    Approved,
    Rejected,
    /// Needs review
    Pending,
}

impl ClientStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientStatus::Approved => APPROVED,
            ClientStatus::Rejected => "rejected",
            ClientStatus::Pending => "pending",
        }
    }
}

/// A vendor payload that could not be mapped onto a local value.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("payload is missing field {0:?}")]
    MissingField(&'static str),
    #[error("field {field:?} has invalid timestamp {value:?}")]
    InvalidTimestamp { field: &'static str, value: String },
    #[error("payload is for {found}, expected {expected}")]
    IdMismatch { expected: String, found: String },
}

/// Locally persisted mirror of a client, record or check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub kind: ResourceKind,
    pub remote_id: String,
    pub status: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    /// Time of the most recent status change reported by the vendor.
    pub updated_at: Option<DateTime<Utc>>,
    /// Scrubbed JSON last returned by the vendor.
    pub raw: Option<Value>,
    /// Reference of the local user this resource belongs to.
    pub owner: Option<String>,
    /// Client id of a record, record id of a check.
    pub parent_id: Option<String>,
    pub check_type: Option<String>,
    pub perform_url: Option<String>,
}

impl Resource {
    pub fn new(kind: ResourceKind, remote_id: impl Into<String>) -> Self {
        Resource {
            kind,
            remote_id: remote_id.into(),
            status: None,
            created_at: None,
            updated_at: None,
            raw: None,
            owner: None,
            parent_id: None,
            check_type: None,
            perform_url: None,
        }
    }

    /// Build a resource straight from a vendor response.
    pub fn from_raw(kind: ResourceKind, raw: Value, scrubbers: &Scrubbers) -> Result<Self, PayloadError> {
        let mut resource = Resource::new(kind, String::new());
        resource.parse(raw, scrubbers)?;
        Ok(resource)
    }

    /// API path of this resource, relative to the API root.
    pub fn href(&self) -> String {
        format!("{}/{}", self.kind.base_href(), self.remote_id)
    }

    /// True once the resource reached its successful terminal status.
    pub fn is_clear(&self) -> bool {
        self.status.as_deref() == Some(self.kind.completion_status())
    }

    /// Overwrite the local fields from a vendor payload.
    ///
    /// The payload is scrubbed first, and nothing is modified unless the
    /// whole payload parses. A resource that already has an id only accepts
    /// a payload carrying that same id.
    pub fn parse(&mut self, raw: Value, scrubbers: &Scrubbers) -> Result<&mut Self, PayloadError> {
        let raw = scrubbers.scrub(self.kind, raw);

        // check payloads built from record steps carry the id under "check"
        let id_key = if self.kind == ResourceKind::Check && raw.get("check").is_some() {
            "check"
        } else {
            "id"
        };
        let remote_id = raw
            .get(id_key)
            .and_then(json_id)
            .ok_or(PayloadError::MissingField(id_key))?;
        if !self.remote_id.is_empty() && self.remote_id != remote_id {
            return Err(PayloadError::IdMismatch {
                expected: self.remote_id.clone(),
                found: remote_id,
            });
        }
        let status = raw
            .get("status")
            .and_then(Value::as_str)
            .ok_or(PayloadError::MissingField("status"))?
            .to_string();
        let created_at = raw
            .get("created_at")
            .and_then(Value::as_str)
            .ok_or(PayloadError::MissingField("created_at"))?;
        let created_at = parse_timestamp(created_at).map_err(|_| PayloadError::InvalidTimestamp {
            field: "created_at",
            value: created_at.to_string(),
        })?;

        match self.kind {
            ResourceKind::Check => {
                if let Some(check_type) = raw.get("type").and_then(Value::as_str) {
                    self.check_type = Some(check_type.to_string());
                }
            }
            ResourceKind::Record => {
                // the vendor sends `false` rather than null when there is no URL
                self.perform_url = raw
                    .get("perform_url")
                    .and_then(Value::as_str)
                    .map(str::to_string);
            }
            ResourceKind::Client => {}
        }

        self.remote_id = remote_id;
        self.status = Some(status);
        self.created_at = Some(created_at);
        self.raw = Some(raw);
        Ok(self)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.label(), self.remote_id)
    }
}

/// Read a vendor identifier, which may be a JSON string or number.
pub fn json_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse an RFC 3339 timestamp into UTC.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record_json() -> Value {
        json!({
            "object": "record",
            "id": 789012,
            "status": "pending",
            "email": "marty@example.com",
            "perform_url": false,
            "client": 123456,
            "created_at": "2022-05-22T08:22:12Z",
            "updated_at": "2022-05-22T08:22:12Z"
        })
    }

    #[test]
    fn test_kind_tags() {
        for kind in ResourceKind::ALL {
            assert_eq!(ResourceKind::from_tag(kind.as_str()), Some(kind));
        }
        assert_eq!(ResourceKind::from_tag("form"), None);
        assert_eq!("Record".parse::<ResourceKind>(), Ok(ResourceKind::Record));
        assert!("applicant".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn test_href() {
        let resource = Resource::new(ResourceKind::Client, "123");
        assert_eq!(resource.href(), "clients/123");
        assert_eq!(Resource::new(ResourceKind::Check, "9").href(), "checks/9");
    }

    #[test]
    fn test_parse_record() {
        let record = Resource::from_raw(ResourceKind::Record, record_json(), &Scrubbers::default()).unwrap();

        assert_eq!(record.remote_id, "789012");
        assert_eq!(record.status.as_deref(), Some("pending"));
        assert_eq!(
            record.created_at,
            Some(parse_timestamp("2022-05-22T08:22:12Z").unwrap())
        );
        assert_eq!(record.perform_url, None);
        assert_eq!(record.raw, Some(record_json()));
        assert_eq!(record.updated_at, None);
    }

    #[test]
    fn test_parse_client_is_scrubbed() {
        let raw = json!({
            "id": 123456,
            "status": "pending",
            "email": "marty@example.com",
            "created_at": "2022-05-21T14:15:22Z"
        });

        let client = Resource::from_raw(ResourceKind::Client, raw, &Scrubbers::default()).unwrap();

        assert_eq!(
            client.raw,
            Some(json!({"id": 123456, "status": "pending", "created_at": "2022-05-21T14:15:22Z"}))
        );
    }

    #[test]
    fn test_parse_check_prefers_check_key() {
        let raw = json!({
            "check": "3456789",
            "type": "check.photo_id",
            "status": "pending",
            "created_at": "2023-04-06T11:37:14Z"
        });

        let check = Resource::from_raw(ResourceKind::Check, raw, &Scrubbers::default()).unwrap();

        assert_eq!(check.remote_id, "3456789");
        assert_eq!(check.check_type.as_deref(), Some("check.photo_id"));
    }

    #[test]
    fn test_parse_failure_leaves_resource_untouched() {
        let mut record = Resource::new(ResourceKind::Record, "1");
        record.status = Some("pending".into());
        let before = record.clone();

        let err = record
            .parse(json!({"id": 1, "created_at": "2022-05-22T08:22:12Z"}), &Scrubbers::default())
            .unwrap_err();
        assert!(matches!(err, PayloadError::MissingField("status")));

        let err = record
            .parse(json!({"id": 1, "status": "complete", "created_at": "yesterday"}), &Scrubbers::default())
            .unwrap_err();
        assert!(matches!(err, PayloadError::InvalidTimestamp { field: "created_at", .. }));

        assert_eq!(record, before);
    }

    #[test]
    fn test_parse_rejects_other_id() {
        let mut check = Resource::new(ResourceKind::Check, "3456789");
        let before = check.clone();
        let raw = json!({
            "check": "999",
            "status": "accepted",
            "created_at": "2023-04-06T11:37:14Z"
        });

        let err = check.parse(raw, &Scrubbers::default()).unwrap_err();

        assert!(matches!(err, PayloadError::IdMismatch { ref found, .. } if found == "999"));
        assert_eq!(check, before);
    }

    #[test]
    fn test_is_clear() {
        let mut record = Resource::new(ResourceKind::Record, "1");
        assert!(!record.is_clear());
        record.status = Some(ACCEPTED.into());
        assert!(record.is_clear());

        let mut client = Resource::new(ResourceKind::Client, "2");
        client.status = Some(ACCEPTED.into());
        assert!(!client.is_clear());
        client.status = Some(ClientStatus::Approved.as_str().into());
        assert!(client.is_clear());
    }

    #[test]
    fn test_json_id() {
        assert_eq!(json_id(&json!("abc")), Some("abc".to_string()));
        assert_eq!(json_id(&json!(42)), Some("42".to_string()));
        assert_eq!(json_id(&json!("")), None);
        assert_eq!(json_id(&json!(null)), None);
    }
}
