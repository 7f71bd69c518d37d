//! Creating and updating resources on the vendor side.
//!
//! Each call sends one request to the vendor and stores what comes back, so
//! the local mirror starts out consistent with the remote object.

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::api::ApiError;
use crate::mirror::Mirror;
use crate::models::{ClientStatus, PayloadError, Resource, ResourceKind, Step, StepTarget};
use crate::store::StoreError;

/// Timestamp format the vendor expects in request bodies.
const EXPIRY_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("expected a {expected}, got a {found}")]
    WrongKind {
        expected: ResourceKind,
        found: ResourceKind,
    },
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The local person a vendor client is created for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applicant {
    /// Local user reference, kept as the owner of everything created.
    pub reference: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// How the vendor tells the client about a new record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Notification {
    #[default]
    Email,
    None,
}

impl Notification {
    fn to_json(self) -> Value {
        match self {
            Notification::Email => json!("email"),
            Notification::None => json!(false),
        }
    }
}

fn ensure_kind(resource: &Resource, expected: ResourceKind) -> Result<(), ProvisionError> {
    if resource.kind != expected {
        return Err(ProvisionError::WrongKind {
            expected,
            found: resource.kind,
        });
    }
    Ok(())
}

/// Send numeric ids back as numbers, which is how the vendor issued them.
fn id_value(remote_id: &str) -> Value {
    remote_id
        .parse::<u64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::from(remote_id))
}

impl Mirror {
    /// Register an applicant as a vendor client.
    ///
    /// `extra` is merged into the request body, so any other client property
    /// the vendor accepts (dob, country, ...) can be passed through.
    pub async fn create_client(&self, applicant: &Applicant, extra: Map<String, Value>) -> Result<Resource, ProvisionError> {
        let mut data = Map::new();
        data.insert(
            "name".into(),
            json!({
                "first_name": applicant.first_name,
                "last_name": applicant.last_name,
            }),
        );
        data.insert("email".into(), json!(applicant.email));
        data.extend(extra);

        let response = self.api.post("clients", &Value::Object(data)).await?;
        let mut client = Resource::from_raw(ResourceKind::Client, response, &self.scrubbers)?;
        client.owner = Some(applicant.reference.clone());
        self.store.insert(&client).await?;

        info!(remote_id = %client.remote_id, owner = %applicant.reference, "client_created");
        Ok(client)
    }

    /// Create a record for a client, along with its steps.
    ///
    /// `steps` are sent as given. Check steps in the response get a local
    /// check (reused if one already exists), form steps are kept as steps.
    pub async fn create_record(
        &self,
        client: &Resource,
        steps: Vec<Value>,
        notification: Notification,
        reminder: bool,
    ) -> Result<Resource, ProvisionError> {
        ensure_kind(client, ResourceKind::Client)?;

        let data = json!({
            "client": id_value(&client.remote_id),
            "notification": notification.to_json(),
            "reminder": reminder,
            "steps": steps,
        });
        let response = self.api.post("records", &data).await?;

        let mut record = Resource::from_raw(ResourceKind::Record, response, &self.scrubbers)?;
        record.owner = client.owner.clone();
        record.parent_id = Some(client.remote_id.clone());
        self.store.insert(&record).await?;

        let raw_steps = record
            .raw
            .as_ref()
            .and_then(|raw| raw.get("steps"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        for raw_step in &raw_steps {
            let Some(step) = Step::from_raw(&record.remote_id, raw_step) else {
                debug!(record_id = %record.remote_id, step = %raw_step, "step_skipped");
                continue;
            };
            if let StepTarget::Check(check_id) = &step.target {
                self.get_or_create_check(&record, check_id, &step.step_type).await?;
            }
            self.store.save_step(&step).await?;
        }

        info!(
            remote_id = %record.remote_id,
            client_id = %client.remote_id,
            steps = raw_steps.len(),
            "record_created"
        );
        Ok(record)
    }

    async fn get_or_create_check(&self, record: &Resource, check_id: &str, check_type: &str) -> Result<Resource, ProvisionError> {
        if let Some(check) = self.store.get(ResourceKind::Check, check_id).await? {
            return Ok(check);
        }

        let mut check = Resource::new(ResourceKind::Check, check_id);
        check.owner = record.owner.clone();
        check.parent_id = Some(record.remote_id.clone());
        check.check_type = Some(check_type.to_string());
        self.store.insert(&check).await?;
        Ok(check)
    }

    /// Set a client's status on the vendor side and store the result.
    pub async fn update_client_status(&self, client: &mut Resource, status: ClientStatus) -> Result<(), ProvisionError> {
        ensure_kind(client, ResourceKind::Client)?;

        let response = self
            .api
            .patch(&client.href(), &json!({"status": status.as_str()}))
            .await?;
        client.parse(response, &self.scrubbers)?;
        self.store.save(client).await?;

        info!(remote_id = %client.remote_id, status = status.as_str(), "client_status_updated");
        Ok(())
    }

    /// Move the deadline by which the client must complete a record.
    pub async fn update_record_expiry(&self, record: &mut Resource, expired_at: DateTime<Utc>) -> Result<(), ProvisionError> {
        ensure_kind(record, ResourceKind::Record)?;

        let expired_at = expired_at.format(EXPIRY_FORMAT).to_string();
        let response = self
            .api
            .patch(&record.href(), &json!({"expired_at": expired_at}))
            .await?;
        record.parse(response, &self.scrubbers)?;
        self.store.save(record).await?;

        info!(remote_id = %record.remote_id, expired_at = %expired_at, "record_expiry_updated");
        Ok(())
    }
}
