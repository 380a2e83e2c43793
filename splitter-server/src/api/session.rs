//! Websocket side of a stream session.
//!
//! A [`Session`] owns the socket. Incoming frames are drained by a reader
//! task whose only job is to notice the client going away; outgoing frames
//! are written through [`WsSink`]. How the session ended is turned into a
//! status, an optional terminal `error` frame and a close code exactly once,
//! in [`Session::finish`].

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::stream::{SplitSink, StreamExt};
use futures_util::SinkExt;
use serde::Serialize;
use splitter_core::streaming::{ClientGone, StreamError, UpdateSink};
use splitter_sdk::objects::{
    ErrorBody, ErrorReason, StatusCode, StreamCloseCode, StreamTermination,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Writes JSON text frames to the client.
pub struct WsSink {
    sender: SplitSink<WebSocket, Message>,
}

impl<M: Serialize + Send> UpdateSink<M> for WsSink {
    async fn deliver(&mut self, message: M) -> Result<(), ClientGone> {
        let json = serde_json::to_string(&message).map_err(|_| ClientGone)?;
        self.sender
            .send(Message::Text(json.into()))
            .await
            .map_err(|_| ClientGone)
    }
}

pub struct Session {
    pub sink: WsSink,
    reader: JoinHandle<()>,
    client_gone: watch::Receiver<bool>,
    shutdown: watch::Receiver<bool>,
}

impl Session {
    pub fn open(socket: WebSocket, shutdown: watch::Receiver<bool>) -> Self {
        let (sender, mut receiver) = socket.split();
        let (gone_tx, client_gone) = watch::channel(false);
        let reader = tokio::spawn(async move {
            loop {
                match receiver.next().await {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
            tracing::debug!("Client closed the stream");
            let _ = gone_tx.send(true);
        });
        Self {
            sink: WsSink { sender },
            reader,
            client_gone,
            shutdown,
        }
    }

    /// Resolves when the client goes away or the server shuts down.
    pub fn done(&self) -> impl Future<Output = ()> + Send + 'static {
        let client_gone = self.client_gone.clone();
        let shutdown = self.shutdown.clone();
        async move {
            tokio::select! {
                _ = raised(client_gone) => {}
                _ = raised(shutdown) => {
                    tracing::debug!("Stream ended by server shutdown");
                }
            }
        }
    }

    /// Report how the session ended and close the socket.
    pub async fn finish(self, result: Result<(), StreamError>, error_domain: &str) {
        match result {
            Ok(()) => self.close(StreamCloseCode::NORMAL, "").await,
            Err(err) => {
                log_stream_error(&err);
                self.fail(classify(&err, error_domain)).await;
            }
        }
    }

    /// Send the terminal `error` frame and the matching close code.
    pub async fn fail(mut self, body: ErrorBody) {
        let code = body.status.close_code();
        let reason = close_reason(&body.message);
        let _ = self.sink.deliver(StreamTermination::Error(body)).await;
        self.close(code, &reason).await;
    }

    async fn close(mut self, code: u16, reason: &str) {
        let frame = CloseFrame {
            code,
            reason: reason.to_string().into(),
        };
        let _ = self.sink.sender.send(Message::Close(Some(frame))).await;
        self.reader.abort();
    }
}

async fn raised(mut flag: watch::Receiver<bool>) {
    let _ = flag.wait_for(|raised| *raised).await;
}

/// Close frame reasons are limited to 123 bytes.
fn close_reason(message: &str) -> String {
    const LIMIT: usize = 123;
    if message.len() <= LIMIT {
        return message.to_string();
    }
    let mut end = LIMIT;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    message[..end].to_string()
}

fn log_stream_error(err: &StreamError) {
    match err {
        StreamError::NotFound | StreamError::NoLongerFound => {
            tracing::debug!(error = %err, "Stream ended")
        }
        StreamError::SendCurrent | StreamError::SendAlive => {
            tracing::info!(error = %err, "Stream client unreachable")
        }
        _ => tracing::error!(error = ?err, "Stream failed"),
    }
}

/// Map a session failure to its wire status and reason.
pub fn classify(err: &StreamError, error_domain: &str) -> ErrorBody {
    let (status, message, reason) = match err {
        StreamError::NotFound => (StatusCode::NotFound, "resource not found", None),
        StreamError::NoLongerFound => (StatusCode::DataLoss, "resource no longer found", None),
        StreamError::Subscribe { .. } | StreamError::SubscriptionClosed => (
            StatusCode::Internal,
            "failed to subscribe to resource changes",
            Some(ErrorReason::MessageSubscriptionFailed),
        ),
        StreamError::Store(_) => (
            StatusCode::Internal,
            "failed to read resource",
            Some(ErrorReason::DbSelectFailed),
        ),
        StreamError::RateUnavailable(_) => (
            StatusCode::Internal,
            "exchange rate unavailable",
            Some(ErrorReason::ExchangeRateUnavailable),
        ),
        StreamError::SendCurrent => (
            StatusCode::Canceled,
            "failed to send current resource",
            Some(ErrorReason::SendCurrentResourceFailed),
        ),
        StreamError::SendAlive => (
            StatusCode::Canceled,
            "failed to send stream alive message",
            Some(ErrorReason::SendStreamAliveFailed),
        ),
    };
    let body = ErrorBody::new(status, message);
    match reason {
        Some(reason) => body.with_reason(reason, error_domain),
        None => body,
    }
}

/// Failure for an id that cannot be used in a subject.
pub fn invalid_argument(field: &str) -> ErrorBody {
    ErrorBody::new(
        StatusCode::InvalidArgument,
        format!("{field} is not a valid identifier"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use splitter_core::events::BusError;

    const DOMAIN: &str = "splitter.example.com";

    #[test]
    fn test_not_found_and_data_loss_carry_no_reason() {
        let body = classify(&StreamError::NotFound, DOMAIN);
        assert_eq!(body.status, StatusCode::NotFound);
        assert!(body.details.is_empty());
        assert_eq!(body.status.close_code(), StreamCloseCode::NOT_FOUND);

        let body = classify(&StreamError::NoLongerFound, DOMAIN);
        assert_eq!(body.status, StatusCode::DataLoss);
        assert_eq!(body.status.close_code(), StreamCloseCode::DATA_LOSS);
    }

    #[test]
    fn test_infrastructure_failures_are_internal_with_reason() {
        let subscribe = StreamError::Subscribe {
            pattern: "splitter.Group.>".to_string(),
            source: BusError::Subscribe {
                pattern: "splitter.Group.>".to_string(),
                source: "nats down".into(),
            },
        };
        let body = classify(&subscribe, DOMAIN);
        assert_eq!(body.status, StatusCode::Internal);
        assert_eq!(body.reason(), Some(ErrorReason::MessageSubscriptionFailed));
        assert_eq!(body.details[0].domain, DOMAIN);

        let body = classify(&StreamError::Store(sqlx::Error::PoolTimedOut), DOMAIN);
        assert_eq!(body.reason(), Some(ErrorReason::DbSelectFailed));
        assert_eq!(body.status.close_code(), StreamCloseCode::INTERNAL_ERROR);
    }

    #[test]
    fn test_delivery_failures_are_canceled() {
        let body = classify(&StreamError::SendCurrent, DOMAIN);
        assert_eq!(body.status, StatusCode::Canceled);
        assert_eq!(body.reason(), Some(ErrorReason::SendCurrentResourceFailed));

        let body = classify(&StreamError::SendAlive, DOMAIN);
        assert_eq!(body.reason(), Some(ErrorReason::SendStreamAliveFailed));
        assert_eq!(body.status.close_code(), StreamCloseCode::CANCELED);
    }

    #[test]
    fn test_close_reason_is_truncated_on_char_boundary() {
        assert_eq!(close_reason("resource not found"), "resource not found");
        let long = "é".repeat(100);
        let reason = close_reason(&long);
        assert!(reason.len() <= 123);
        assert_eq!(reason.len() % 2, 0);
    }
}
