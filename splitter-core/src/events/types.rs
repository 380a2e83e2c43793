//! Payloads published on the bus.

use crate::entities::ResourceKind;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Last segment of a concrete subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
}

impl EventKind {
    pub fn segment(self) -> &'static str {
        match self {
            EventKind::Created => "Created",
            EventKind::Updated => "Updated",
            EventKind::Deleted => "Deleted",
        }
    }
}

/// JSON body of a resource notification.
///
/// Subscribers only use it for logging; the subject alone is enough to
/// trigger a re-fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEvent {
    pub kind: String,
    pub event: EventKind,
    pub id: String,
    pub scope: SmallVec<[String; 2]>,
}

impl ResourceEvent {
    pub fn new(
        kind: ResourceKind,
        event: EventKind,
        id: impl Into<String>,
        scope: SmallVec<[String; 2]>,
    ) -> Self {
        Self {
            kind: kind.segment().to_string(),
            event,
            id: id.into(),
            scope,
        }
    }

    pub fn to_bytes(&self) -> Result<bytes::Bytes, serde_json::Error> {
        serde_json::to_vec(self).map(bytes::Bytes::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn test_payload_shape() {
        let event = ResourceEvent::new(
            ResourceKind::Category,
            EventKind::Deleted,
            "cat-1",
            smallvec!["grp-1".to_string()],
        );
        let json: serde_json::Value = serde_json::from_slice(&event.to_bytes().unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "kind": "Category",
                "event": "Deleted",
                "id": "cat-1",
                "scope": ["grp-1"],
            })
        );
    }
}
