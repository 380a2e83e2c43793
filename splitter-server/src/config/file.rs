//! TOML file configuration structures.
//!
//! These structs directly map to the `splitter-config.toml` file format.
//! Every section is optional.

use serde::{Deserialize, Serialize};
use splitter_core::config::PublishMode;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub subjects: SubjectsConfig,
    #[serde(default)]
    pub errors: ErrorsConfig,
    #[serde(default)]
    pub streaming: StreamingConfig,
    #[serde(default)]
    pub cascade: CascadeConfig,
    #[serde(default)]
    pub rates: RatesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8080)
}

/// Message bus. Without a `url` the in-process bus is used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    pub url: Option<String>,
    #[serde(default = "default_subscription_capacity")]
    pub subscription_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            url: None,
            subscription_capacity: default_subscription_capacity(),
        }
    }
}

fn default_subscription_capacity() -> usize {
    1024
}

/// First segment(s) of every subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectsConfig {
    #[serde(default = "default_subject_domain")]
    pub domain: String,
}

impl Default for SubjectsConfig {
    fn default() -> Self {
        Self {
            domain: default_subject_domain(),
        }
    }
}

fn default_subject_domain() -> String {
    "expensesplitter".to_string()
}

/// Domain attached to every structured error reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorsConfig {
    #[serde(default = "default_error_domain")]
    pub domain: String,
}

impl Default for ErrorsConfig {
    fn default() -> Self {
        Self {
            domain: default_error_domain(),
        }
    }
}

fn default_error_domain() -> String {
    "expensesplitter.example.com".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingConfig {
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    #[serde(default = "default_session_cap_secs")]
    pub session_cap_secs: u64,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            heartbeat_secs: default_heartbeat_secs(),
            session_cap_secs: default_session_cap_secs(),
        }
    }
}

fn default_heartbeat_secs() -> u64 {
    60
}

fn default_session_cap_secs() -> u64 {
    3600
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeConfig {
    #[serde(default)]
    pub mode: PublishMode,
    #[serde(default = "default_outbox_poll_interval_ms")]
    pub outbox_poll_interval_ms: u64,
    #[serde(default = "default_outbox_batch_size")]
    pub outbox_batch_size: u32,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            mode: PublishMode::default(),
            outbox_poll_interval_ms: default_outbox_poll_interval_ms(),
            outbox_batch_size: default_outbox_batch_size(),
        }
    }
}

fn default_outbox_poll_interval_ms() -> u64 {
    1000
}

fn default_outbox_batch_size() -> u32 {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatesConfig {
    #[serde(default = "default_rates_base_url")]
    pub base_url: String,
    #[serde(default = "default_rates_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RatesConfig {
    fn default() -> Self {
        Self {
            base_url: default_rates_base_url(),
            timeout_secs: default_rates_timeout_secs(),
        }
    }
}

fn default_rates_base_url() -> String {
    splitter_core::rates::DEFAULT_RATES_BASE_URL.to_string()
}

fn default_rates_timeout_secs() -> u64 {
    10
}
