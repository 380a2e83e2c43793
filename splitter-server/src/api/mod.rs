//! HTTP and websocket API.

mod delete;
mod session;
mod streams;

use crate::state::AppState;
use axum::Router;

/// Build the API router: stream endpoints and cascade deletes.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(streams::router())
        .merge(delete::router())
}
