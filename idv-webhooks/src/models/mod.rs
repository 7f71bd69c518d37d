//! Local representations of vendor resources and webhook events.

pub mod event;
pub mod resource;
pub mod step;

pub use event::{Event, EventError, KNOWN_ACTIONS, RECORD_REVIEWED};
pub use resource::{
    json_id, parse_timestamp, ClientStatus, PayloadError, Resource, ResourceKind, ACCEPTED,
    APPROVED,
};
pub use step::{Review, Step, StepTarget};
