//! Background processors.
//!
//! - `OutboxRelay`: publishes deletion events queued by the cascade
//!   coordinator in outbox mode

pub mod outbox_relay;

pub use outbox_relay::{OutboxRelay, OutboxStore, RelayError};
