//! Frames pushed over the live resource websockets.
//!
//! # Protocol
//!
//! 1. Right after the upgrade the server sends the current value
//!    (`snapshot`, `ids` or `rate`).
//! 2. Every change to the watched resource produces a new value frame.
//!    Bursts of changes are coalesced into one frame holding the latest
//!    state.
//! 3. When nothing changed for a full heartbeat period the server sends
//!    `{"type":"still_alive"}`.
//! 4. A failure is reported with exactly one [`StreamTermination::Error`]
//!    frame followed by a close frame carrying the matching
//!    [`StreamCloseCode`]. Cancellation and the session time cap close the
//!    socket with [`StreamCloseCode::NORMAL`].

use serde::{Deserialize, Serialize};

use super::status::ErrorBody;

/// Update on a single-resource stream.
///
/// ```json
/// {"type":"snapshot","resource":{"id":"cat-1","groupId":"grp-1","name":""}}
/// {"type":"still_alive"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResourceUpdate<T> {
    Snapshot { resource: T },
    StillAlive,
}

/// Update on a child-id-set stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IdSetUpdate {
    Ids { ids: Vec<String> },
    StillAlive,
}

/// Update on the exchange-rate stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExchangeRateUpdate {
    Rate { rate: f64 },
    StillAlive,
}

/// The terminal frame of a failed stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamTermination {
    Error(ErrorBody),
}

/// Websocket close codes used by the live streams.
///
/// Codes in the 4000–4999 range are reserved for application use by
/// [RFC 6455 §7.4.2](https://www.rfc-editor.org/rfc/rfc6455#section-7.4.2).
pub struct StreamCloseCode;

impl StreamCloseCode {
    /// Client cancel, server shutdown or session cap reached.
    pub const NORMAL: u16 = 1000;

    pub const INTERNAL_ERROR: u16 = 1011;

    pub const INVALID_ARGUMENT: u16 = 4400;

    /// The resource did not exist when the stream was opened.
    pub const NOT_FOUND: u16 = 4404;

    /// The resource was deleted while the stream was open.
    pub const DATA_LOSS: u16 = 4410;

    pub const CANCELED: u16 = 4499;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::StatusCode;

    #[test]
    fn test_frames_are_tagged_by_type() {
        let ids = IdSetUpdate::Ids {
            ids: vec!["cat-1".into(), "cat-2".into()],
        };
        assert_eq!(
            serde_json::to_string(&ids).unwrap(),
            r#"{"type":"ids","ids":["cat-1","cat-2"]}"#
        );
        assert_eq!(
            serde_json::to_string(&IdSetUpdate::StillAlive).unwrap(),
            r#"{"type":"still_alive"}"#
        );
        assert_eq!(
            serde_json::to_string(&ExchangeRateUpdate::Rate { rate: 1.1 }).unwrap(),
            r#"{"type":"rate","rate":1.1}"#
        );
    }

    #[test]
    fn test_termination_flattens_error_body() {
        let frame = StreamTermination::Error(ErrorBody::new(StatusCode::DataLoss, "gone"));
        assert_eq!(
            serde_json::to_string(&frame).unwrap(),
            r#"{"type":"error","status":"data_loss","message":"gone"}"#
        );
    }

    #[test]
    fn test_error_frame_is_not_a_resource_update() {
        let json = r#"{"type":"error","status":"not_found","message":"x"}"#;
        assert!(serde_json::from_str::<ResourceUpdate<serde_json::Value>>(json).is_err());
        assert!(serde_json::from_str::<StreamTermination>(json).is_ok());
    }
}
