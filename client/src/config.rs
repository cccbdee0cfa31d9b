use std::time::Duration;

use office_shared::config::DEFAULT_WS_URL;
use thiserror::Error;
use url::Url;

use crate::publisher::PublishPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid server URL `{url}`: {source}")]
    BadUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("server URL must use ws:// or wss://, got `{0}`")]
    BadScheme(String),
    #[error("environment variable {var} has invalid value `{value}`")]
    BadEnv { var: &'static str, value: String },
    #[error("invalid client configuration: {0}")]
    Invalid(String),
}

/// How a client reaches the relay and how often it ticks.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub url: Url,
    pub tick_rate_hz: u32,
    pub reconnect_initial: Duration,
    pub reconnect_max: Duration,
    pub publish: PublishPolicy,
}

impl ClientConfig {
    pub fn new(url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            url: parse_ws_url(url)?,
            tick_rate_hz: 60,
            reconnect_initial: Duration::from_millis(1000),
            reconnect_max: Duration::from_millis(30_000),
            publish: PublishPolicy::default(),
        })
    }

    /// Defaults overridden by `OFFICE_WS_URL` and `OFFICE_TICK_HZ`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let url = lookup("OFFICE_WS_URL").unwrap_or_else(|| DEFAULT_WS_URL.to_string());
        let mut config = Self::new(&url)?;
        if let Some(hz) = lookup("OFFICE_TICK_HZ") {
            config.tick_rate_hz = hz.parse().map_err(|_| ConfigError::BadEnv {
                var: "OFFICE_TICK_HZ",
                value: hz.clone(),
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate_hz == 0 {
            return Err(ConfigError::Invalid("tick_rate_hz must be > 0".to_string()));
        }
        if self.reconnect_initial.is_zero() || self.reconnect_max < self.reconnect_initial {
            return Err(ConfigError::Invalid(
                "reconnect_max must be >= reconnect_initial > 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate_hz as f64)
    }
}

fn parse_ws_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|source| ConfigError::BadUrl {
        url: raw.to_string(),
        source,
    })?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(ConfigError::BadScheme(other.to_string())),
    }
}
