//! Record steps and the reviews attached to them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::resource::{json_id, parse_timestamp, PayloadError};

/// What a record step asks the client to complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum StepTarget {
    /// Remote id of the check
    Check(String),
    /// Remote id of the form
    Form(String),
}

/// One step of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub remote_id: String,
    pub record_id: String,
    /// Vendor step type, e.g. "check.photo_id" or "form".
    pub step_type: String,
    pub target: StepTarget,
    pub raw: Value,
}

impl Step {
    /// Build a step from an entry of a record's `steps` array.
    ///
    /// Returns `None` for entries that are neither checks nor forms.
    pub fn from_raw(record_id: &str, raw: &Value) -> Option<Step> {
        let step_type = raw.get("type").and_then(Value::as_str)?.to_string();
        let remote_id = raw.get("id").and_then(json_id)?;

        let target = if step_type.contains("check") {
            StepTarget::Check(raw.get("check").and_then(json_id)?)
        } else if step_type.contains("form") {
            StepTarget::Form(raw.get("form").and_then(json_id)?)
        } else {
            return None;
        };

        Some(Step {
            remote_id,
            record_id: record_id.to_string(),
            step_type,
            target,
            raw: raw.clone(),
        })
    }

    /// API path listing the reviews of this step.
    pub fn reviews_href(&self) -> String {
        format!("records/{}/steps/{}/reviews", self.record_id, self.remote_id)
    }
}

/// A reviewer's assessment of a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub remote_id: String,
    pub step_id: String,
    pub status: String,
    pub created_at: Option<DateTime<Utc>>,
    pub raw: Value,
}

impl Review {
    pub fn parse(step_id: &str, raw: Value) -> Result<Review, PayloadError> {
        let remote_id = raw
            .get("id")
            .and_then(json_id)
            .ok_or(PayloadError::MissingField("id"))?;
        let status = raw
            .get("status")
            .and_then(Value::as_str)
            .ok_or(PayloadError::MissingField("status"))?
            .to_string();
        let created_at = match raw.get("created_at").and_then(Value::as_str) {
            Some(value) => Some(parse_timestamp(value).map_err(|_| PayloadError::InvalidTimestamp {
                field: "created_at",
                value: value.to_string(),
            })?),
            None => None,
        };

        Ok(Review {
            remote_id,
            step_id: step_id.to_string(),
            status,
            created_at,
            raw,
        })
    }
}
