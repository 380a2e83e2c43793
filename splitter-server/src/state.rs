//! Application state shared across all request handlers.

use splitter_core::cascade::CascadeDelete;
use splitter_core::config::{ConfigStore, StreamSettings};
use splitter_core::events::{Bus, SubjectRouter};
use splitter_core::framework::DatabaseProcessor;
use splitter_core::rates::HttpRateProvider;
use splitter_core::streaming::ExchangeRateSource;
use std::sync::Arc;
use tokio::sync::watch;

pub type Cascade = CascadeDelete<DatabaseProcessor, Bus>;
pub type RateSource = ExchangeRateSource<DatabaseProcessor, HttpRateProvider>;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseProcessor,
    pub bus: Bus,
    pub router: SubjectRouter,
    /// Domain of every structured error reason.
    pub error_domain: Arc<str>,
    /// Read when a stream opens; reloaded on SIGHUP.
    pub streaming: ConfigStore<StreamSettings>,
    pub cascade: Arc<Cascade>,
    pub rates: Arc<RateSource>,
    /// Flips to `true` when the server shuts down; ends every open stream.
    pub shutdown: watch::Receiver<bool>,
}
