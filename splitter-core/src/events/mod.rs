//! Change-notification bus.
//!
//! Every create, update and delete of a resource is announced on a subject
//! built by the [`SubjectRouter`]. Notifications carry identifiers only;
//! stream sessions react to them by re-fetching from the database, so
//! duplicate or dropped notifications within a burst are harmless.

pub mod bus;
pub mod local;
pub mod nats;
pub mod subjects;
pub mod types;

pub use bus::{Bus, BusError, BusMessage, EventBus, Subscription};
pub use local::{DEFAULT_SUBSCRIBER_BUFFER, LocalBus};
pub use nats::NatsBus;
pub use subjects::{SubjectRouter, Token, is_valid_token, subject_matches};
pub use types::{EventKind, ResourceEvent};
