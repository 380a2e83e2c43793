//! Clients for the splitter server.
//!
//! Gated behind the `client` cargo feature so downstream crates that only
//! need the shared types do not pull in `reqwest` or `tokio-tungstenite`.

mod resources;
mod stream;

pub use resources::ResourceClient;
pub use stream::{LiveStream, StreamClient};

use reqwest::StatusCode;
use url::Url;

use crate::objects::ErrorBody;

/// Errors produced by the SDK clients.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level failure (DNS, TLS, connection reset, …).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Websocket handshake or framing failure.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The server rejected the call with a structured error.
    #[error("{} ({:?})", .0.message, .0.status)]
    Rejected(ErrorBody),

    /// The server returned a non-2xx status code without a structured body.
    #[error("api error: status {status}, body: {body}")]
    Api { status: StatusCode, body: String },

    /// A frame or body could not be deserialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The base URL could not be joined with the endpoint path.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("base url cannot carry a path: {0}")]
    BaseUrl(Url),
}

/// Append escaped path segments to `base`.
fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, ClientError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| ClientError::BaseUrl(base.clone()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_escapes_segments() {
        let base = Url::parse("ws://localhost:8080/api/").unwrap();
        let url = endpoint(&base, &["groups", "grp 1", "ws"]).unwrap();
        assert_eq!(url.as_str(), "ws://localhost:8080/api/groups/grp%201/ws");
    }

    #[test]
    fn test_endpoint_rejects_opaque_base() {
        let base = Url::parse("mailto:someone@example.com").unwrap();
        assert!(matches!(
            endpoint(&base, &["groups"]),
            Err(ClientError::BaseUrl(_))
        ));
    }
}
