//! Terminal stream and RPC failure descriptions.
//!
//! Every failure carries a coarse [`StatusCode`] plus structured
//! [`ErrorInfo`] so that clients can branch on the reason without parsing
//! human-readable text.

use serde::{Deserialize, Serialize};

use super::stream::StreamCloseCode;

/// Outcome class of a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    /// The request carried a malformed id or scope.
    InvalidArgument,
    /// The requested resource does not exist.
    NotFound,
    /// The resource existed when the stream opened and has since been deleted.
    DataLoss,
    /// A store, bus or upstream failure.
    Internal,
    /// A message could not be delivered to the client.
    Canceled,
}

impl StatusCode {
    /// The websocket close code used when a stream ends with this status.
    pub fn close_code(self) -> u16 {
        match self {
            StatusCode::InvalidArgument => StreamCloseCode::INVALID_ARGUMENT,
            StatusCode::NotFound => StreamCloseCode::NOT_FOUND,
            StatusCode::DataLoss => StreamCloseCode::DATA_LOSS,
            StatusCode::Internal => StreamCloseCode::INTERNAL_ERROR,
            StatusCode::Canceled => StreamCloseCode::CANCELED,
        }
    }

    /// Inverse of [`close_code`](Self::close_code).
    pub fn from_close_code(code: u16) -> Option<Self> {
        match code {
            StreamCloseCode::INVALID_ARGUMENT => Some(StatusCode::InvalidArgument),
            StreamCloseCode::NOT_FOUND => Some(StatusCode::NotFound),
            StreamCloseCode::DATA_LOSS => Some(StatusCode::DataLoss),
            StreamCloseCode::INTERNAL_ERROR => Some(StatusCode::Internal),
            StreamCloseCode::CANCELED => Some(StatusCode::Canceled),
            _ => None,
        }
    }
}

/// Machine-readable failure reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorReason {
    DbSelectFailed,
    DbDeleteFailed,
    MessageSubscriptionFailed,
    MessagePublicationFailed,
    SendCurrentResourceFailed,
    SendStreamAliveFailed,
    ExchangeRateUnavailable,
}

/// A reason scoped to the service domain that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub reason: ErrorReason,
    pub domain: String,
}

/// Body of a failed call: the JSON of an HTTP error response, and the
/// payload of the terminal `error` frame on a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub status: StatusCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<ErrorInfo>,
}

impl ErrorBody {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: Vec::new(),
        }
    }

    pub fn with_reason(mut self, reason: ErrorReason, domain: impl Into<String>) -> Self {
        self.details.push(ErrorInfo {
            reason,
            domain: domain.into(),
        });
        self
    }

    /// The first structured reason, if any.
    pub fn reason(&self) -> Option<ErrorReason> {
        self.details.first().map(|info| info.reason)
    }
}
