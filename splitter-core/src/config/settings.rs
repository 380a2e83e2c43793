use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing of every live stream session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSettings {
    /// A `still_alive` frame is sent after this long without a real update.
    pub heartbeat: Duration,
    /// Hard cap on the lifetime of one session. Clients reopen after it.
    pub session_cap: Duration,
}

impl StreamSettings {
    pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(60);
    pub const DEFAULT_SESSION_CAP: Duration = Duration::from_secs(60 * 60);
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            heartbeat: Self::DEFAULT_HEARTBEAT,
            session_cap: Self::DEFAULT_SESSION_CAP,
        }
    }
}

/// How the cascade coordinator announces deletions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishMode {
    /// Publish every event concurrently inside the transaction and commit
    /// only when all publishes succeeded. A failed publish rolls the store
    /// back, but events that already reached the bus stay there.
    #[default]
    Direct,
    /// Persist events in the outbox table in the same transaction and let
    /// the relay publish them after commit.
    Outbox,
}

/// Delivery loop settings of the outbox relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutboxSettings {
    /// Fallback polling period when no commit wakes the relay.
    pub poll_interval: Duration,
    /// Maximum rows fetched per delivery round.
    pub batch_size: u32,
}

impl Default for OutboxSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            batch_size: 100,
        }
    }
}
