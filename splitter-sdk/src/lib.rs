//! Wire types shared by the expense splitter server and its clients.
//!
//! The `client` feature adds a websocket consumer for the live streams and
//! an HTTP client for the cascade-delete endpoints.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![forbid(unsafe_code)]

#[cfg(feature = "client")]
pub mod client;
pub mod objects;
