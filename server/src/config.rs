use office_shared::config::{InvalidSpawnPoint, SpawnPoint, DEFAULT_PORT};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid server configuration: {0}")]
    Invalid(String),
    #[error("environment variable {var} has invalid value `{value}`")]
    BadEnv { var: &'static str, value: String },
    #[error(transparent)]
    Spawn(#[from] InvalidSpawnPoint),
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub spawn: SpawnPoint,
    /// Messages buffered per connection before the relay evicts it.
    pub outbound_queue_capacity: usize,
    /// Largest inbound WebSocket message. Panel snapshots travel as data
    /// URLs, so this is generous.
    pub max_message_bytes: usize,
    /// `move` messages beyond this rate are dropped.
    pub max_moves_per_sec: u32,
    /// Undecodable frames tolerated before the connection is closed.
    pub max_parse_errors: u32,
    pub ping_interval_secs: u64,
    /// A connection with no inbound frame for this long is treated as gone.
    pub idle_timeout_secs: u64,
    /// A peer that doesn't accept a frame within this long is dropped.
    pub write_timeout_secs: u64,
    /// Fixed seed for identity allocation; entropy when unset.
    pub rng_seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: format!("0.0.0.0:{DEFAULT_PORT}"),
            spawn: SpawnPoint::default(),
            outbound_queue_capacity: 256,
            max_message_bytes: 4 * 1024 * 1024,
            max_moves_per_sec: 120,
            max_parse_errors: 5,
            ping_interval_secs: 15,
            idle_timeout_secs: 45,
            write_timeout_secs: 10,
            rng_seed: None,
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `OFFICE_LISTEN_ADDR` and `OFFICE_RNG_SEED`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(addr) = lookup("OFFICE_LISTEN_ADDR") {
            config.listen_addr = addr;
        }
        if let Some(seed) = lookup("OFFICE_RNG_SEED") {
            let parsed = seed.parse().map_err(|_| ConfigError::BadEnv {
                var: "OFFICE_RNG_SEED",
                value: seed.clone(),
            })?;
            config.rng_seed = Some(parsed);
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.spawn.validate()?;
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "listen_addr `{}` is not a socket address",
                self.listen_addr
            )));
        }
        if self.outbound_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "outbound_queue_capacity must be > 0".to_string(),
            ));
        }
        if self.max_message_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_message_bytes must be > 0".to_string(),
            ));
        }
        if self.max_moves_per_sec == 0 {
            return Err(ConfigError::Invalid(
                "max_moves_per_sec must be > 0".to_string(),
            ));
        }
        if self.ping_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "ping_interval_secs must be > 0".to_string(),
            ));
        }
        if self.write_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "write_timeout_secs must be > 0".to_string(),
            ));
        }
        if self.idle_timeout_secs <= self.ping_interval_secs {
            return Err(ConfigError::Invalid(
                "idle_timeout_secs must exceed ping_interval_secs".to_string(),
            ));
        }
        Ok(())
    }
}
