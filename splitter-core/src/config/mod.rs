//! Runtime configuration types shared between the core and the server.
//!
//! Loading and parsing happen in the server crate; these are the validated
//! values handed to the stream controllers and the cascade coordinator.

mod config_store;
mod settings;

pub use config_store::{ConfigStore, ConfigWatcher};
pub use settings::{OutboxSettings, PublishMode, StreamSettings};
