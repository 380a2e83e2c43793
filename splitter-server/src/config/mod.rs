//! Configuration module for splitter-server.
//!
//! Handles loading configuration from the TOML file, CLI arguments and
//! environment variables, and turns it into the validated core settings.

pub mod file;

use crate::config::file::FileConfig;
use splitter_core::config::{OutboxSettings, PublishMode, StreamSettings};
use splitter_core::events::SubjectRouter;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("invalid rates base url: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

/// Bus connection settings. Read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusSettings {
    pub url: Option<String>,
    pub subscription_capacity: usize,
}

/// Validated configuration.
///
/// `streaming` and `outbox` are applied again on SIGHUP; everything else
/// takes a restart.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub listen: SocketAddr,
    pub bus: BusSettings,
    pub router: SubjectRouter,
    pub error_domain: String,
    pub streaming: StreamSettings,
    pub publish_mode: PublishMode,
    pub outbox: OutboxSettings,
    pub rates_base_url: Url,
    pub rates_timeout: Duration,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Read, apply CLI overrides and validate.
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        self.parse(&config_content)
    }

    /// Reload the configuration (used during SIGHUP).
    pub fn reload(&self) -> Result<LoadedConfig, ConfigError> {
        self.load()
    }

    fn parse(&self, content: &str) -> Result<LoadedConfig, ConfigError> {
        let mut file_config: FileConfig = toml::from_str(content)?;
        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }
        build_loaded_config(file_config)
    }
}

fn build_loaded_config(file_config: FileConfig) -> Result<LoadedConfig, ConfigError> {
    let FileConfig {
        server,
        bus,
        subjects,
        errors,
        streaming,
        cascade,
        rates,
    } = file_config;

    let router = SubjectRouter::new(subjects.domain.clone()).ok_or_else(|| {
        ConfigError::ValidationError(format!(
            "subject domain {:?} must be dot-separated tokens without wildcards or whitespace",
            subjects.domain
        ))
    })?;
    if errors.domain.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "error domain must not be empty".to_string(),
        ));
    }
    for (name, value) in [
        ("streaming.heartbeat_secs", streaming.heartbeat_secs),
        ("streaming.session_cap_secs", streaming.session_cap_secs),
        ("cascade.outbox_poll_interval_ms", cascade.outbox_poll_interval_ms),
        ("cascade.outbox_batch_size", u64::from(cascade.outbox_batch_size)),
        ("rates.timeout_secs", rates.timeout_secs),
    ] {
        if value == 0 {
            return Err(ConfigError::ValidationError(format!("{name} must be positive")));
        }
    }
    if bus.subscription_capacity == 0 {
        return Err(ConfigError::ValidationError(
            "bus.subscription_capacity must be positive".to_string(),
        ));
    }

    Ok(LoadedConfig {
        listen: server.listen,
        bus: BusSettings {
            url: bus.url,
            subscription_capacity: bus.subscription_capacity,
        },
        router,
        error_domain: errors.domain,
        streaming: StreamSettings {
            heartbeat: Duration::from_secs(streaming.heartbeat_secs),
            session_cap: Duration::from_secs(streaming.session_cap_secs),
        },
        publish_mode: cascade.mode,
        outbox: OutboxSettings {
            poll_interval: Duration::from_millis(cascade.outbox_poll_interval_ms),
            batch_size: cascade.outbox_batch_size,
        },
        rates_base_url: Url::parse(&rates.base_url)?,
        rates_timeout: Duration::from_secs(rates.timeout_secs),
    })
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loader(listen: Option<SocketAddr>) -> ConfigLoader {
        ConfigLoader::new("./splitter-config.toml", listen)
    }

    #[test]
    fn test_defaults_match_reference_timings() {
        let loaded = loader(None).parse("").unwrap();
        assert_eq!(loaded.streaming, StreamSettings::default());
        assert_eq!(loaded.outbox, OutboxSettings::default());
        assert_eq!(loaded.publish_mode, PublishMode::Direct);
        assert_eq!(loaded.router.domain(), "expensesplitter");
        assert_eq!(loaded.bus.url, None);
    }

    #[test]
    fn test_listen_override_wins() {
        let listen: SocketAddr = "127.0.0.1:9999".parse().unwrap();
        let loaded = loader(Some(listen))
            .parse("[server]\nlisten = \"0.0.0.0:1\"")
            .unwrap();
        assert_eq!(loaded.listen, listen);
    }

    #[test]
    fn test_sections_become_core_settings() {
        let loaded = loader(None)
            .parse(
                r#"
[streaming]
heartbeat_secs = 5
session_cap_secs = 30

[cascade]
mode = "outbox"
outbox_poll_interval_ms = 200
outbox_batch_size = 7
"#,
            )
            .unwrap();
        assert_eq!(loaded.streaming.heartbeat, Duration::from_secs(5));
        assert_eq!(loaded.streaming.session_cap, Duration::from_secs(30));
        assert_eq!(loaded.publish_mode, PublishMode::Outbox);
        assert_eq!(loaded.outbox.poll_interval, Duration::from_millis(200));
        assert_eq!(loaded.outbox.batch_size, 7);
    }

    #[test]
    fn test_rejects_invalid_values() {
        for content in [
            "[subjects]\ndomain = \"split.*\"",
            "[subjects]\ndomain = \"\"",
            "[errors]\ndomain = \" \"",
            "[streaming]\nheartbeat_secs = 0",
            "[cascade]\noutbox_batch_size = 0",
            "[bus]\nsubscription_capacity = 0",
        ] {
            assert!(
                matches!(loader(None).parse(content), Err(ConfigError::ValidationError(_))),
                "{content}"
            );
        }
        assert!(matches!(
            loader(None).parse("[rates]\nbase_url = \"not a url\""),
            Err(ConfigError::UrlError(_))
        ));
        assert!(matches!(
            loader(None).parse("[cascade]\nmode = \"sometimes\""),
            Err(ConfigError::ParseError(_))
        ));
    }
}
