use std::path::Path;
use std::time::Duration;
use std::{env, fs, io};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::{
    DEFAULT_HEALTH_POLL_INTERVAL_MS, DEFAULT_HEALTH_TIMEOUT_MS, DEFAULT_REQUEST_TIMEOUT_MS,
    DEFAULT_STREAM_BUFFER,
};

pub const GATEWAY_CONFIG_PATH_ENV: &str = "GATEWAY_CONFIG_PATH";
pub const COUNTER_CONFIG_PATH_ENV: &str = "COUNTER_CONFIG_PATH";
const DEFAULT_GATEWAY_CONFIG_PATH: &str = "./gateway.yaml";
const DEFAULT_COUNTER_CONFIG_PATH: &str = "./counter.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file `{path}`: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    pub address: String,
    /// A required backend that fails its startup health poll aborts the
    /// process; an optional one starts degraded.
    #[serde(default = "default_true")]
    pub required: bool,
}

impl BackendConfig {
    fn new(address: &str) -> Self {
        BackendConfig {
            address: address.to_string(),
            required: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendsConfig {
    pub exact: BackendConfig,
    pub fuzzy: BackendConfig,
    pub partial: BackendConfig,
    pub phrase: BackendConfig,
    pub extended: BackendConfig,
}

impl Default for BackendsConfig {
    fn default() -> Self {
        BackendsConfig {
            exact: BackendConfig::new("http://localhost:50060"),
            fuzzy: BackendConfig::new("http://localhost:50061"),
            partial: BackendConfig::new("http://localhost:50062"),
            phrase: BackendConfig::new("http://localhost:50063"),
            extended: BackendConfig::new("http://localhost:50064"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub bind_address: String,
    pub version: String,
    pub backends: BackendsConfig,
    /// Counter service address. Absent means usage counting is disabled.
    pub counter: Option<String>,
    /// Tracing collector address. Absent means tracing is disabled.
    pub tracing_collector: Option<String>,
    pub request_timeout_ms: u64,
    pub health_timeout_ms: u64,
    pub health_poll_interval_ms: u64,
    pub dial_attempts: u32,
    pub dial_retry_delay_ms: u64,
    pub stream_buffer: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            bind_address: "0.0.0.0:8080".to_string(),
            version: "dev".to_string(),
            backends: BackendsConfig::default(),
            counter: Some("http://localhost:50053".to_string()),
            tracing_collector: None,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            health_timeout_ms: DEFAULT_HEALTH_TIMEOUT_MS,
            health_poll_interval_ms: DEFAULT_HEALTH_POLL_INTERVAL_MS,
            dial_attempts: 3,
            dial_retry_delay_ms: 10_000,
            stream_buffer: DEFAULT_STREAM_BUFFER,
        }
    }
}

impl GatewayConfig {
    /// Load from `GATEWAY_CONFIG_PATH` (or `./gateway.yaml`), then apply
    /// env overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = env::var(GATEWAY_CONFIG_PATH_ENV)
            .unwrap_or_else(|_| DEFAULT_GATEWAY_CONFIG_PATH.to_string());
        let mut config: GatewayConfig = read_yaml_or_default(&path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: GatewayConfig =
            serde_yaml::from_str(contents).map_err(|source| ConfigError::Parse {
                path: "<inline>".to_string(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        override_string("BIND_ADDRESS", &mut self.bind_address);
        override_string("VERSION", &mut self.version);
        override_string("EXACT_SERVICE", &mut self.backends.exact.address);
        override_string("FUZZY_SERVICE", &mut self.backends.fuzzy.address);
        override_string("PARTIAL_SERVICE", &mut self.backends.partial.address);
        override_string("PHRASE_SERVICE", &mut self.backends.phrase.address);
        override_string("EXTENDED_SERVICE", &mut self.backends.extended.address);
        override_optional("COUNTER_SERVICE", &mut self.counter);
        override_optional("TRACING_COLLECTOR", &mut self.tracing_collector);
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_ms == 0 || self.health_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        if self.dial_attempts == 0 {
            return Err(ConfigError::Invalid(
                "dial_attempts must be at least 1".to_string(),
            ));
        }
        for (name, backend) in self.backend_entries() {
            if backend.address.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "backend `{name}` has an empty address"
                )));
            }
        }
        Ok(())
    }

    /// Backends in a stable order, keyed by their service name.
    pub fn backend_entries(&self) -> [(&'static str, &BackendConfig); 5] {
        [
            ("exact", &self.backends.exact),
            ("fuzzy", &self.backends.fuzzy),
            ("partial", &self.backends.partial),
            ("phrase", &self.backends.phrase),
            ("extended", &self.backends.extended),
        ]
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }

    pub fn health_poll_interval(&self) -> Duration {
        Duration::from_millis(self.health_poll_interval_ms)
    }

    pub fn dial_retry_delay(&self) -> Duration {
        Duration::from_millis(self.dial_retry_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterConfig {
    pub bind_address: String,
    pub version: String,
    pub tracing_collector: Option<String>,
    pub stream_buffer: usize,
}

impl Default for CounterConfig {
    fn default() -> Self {
        CounterConfig {
            bind_address: "0.0.0.0:50053".to_string(),
            version: "dev".to_string(),
            tracing_collector: None,
            stream_buffer: DEFAULT_STREAM_BUFFER,
        }
    }
}

impl CounterConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = env::var(COUNTER_CONFIG_PATH_ENV)
            .unwrap_or_else(|_| DEFAULT_COUNTER_CONFIG_PATH.to_string());
        let mut config: CounterConfig = read_yaml_or_default(&path)?;
        override_string("BIND_ADDRESS", &mut config.bind_address);
        override_string("VERSION", &mut config.version);
        override_optional("TRACING_COLLECTOR", &mut config.tracing_collector);
        Ok(config)
    }
}

fn default_true() -> bool {
    true
}

fn read_yaml_or_default<T>(path: &str) -> Result<T, ConfigError>
where
    T: Default + for<'de> Deserialize<'de>,
{
    if !Path::new(path).exists() {
        tracing::info!(path = %path, "config file not found, using defaults");
        return Ok(T::default());
    }

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_string(),
        source,
    })?;

    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_string(),
        source,
    })
}

fn override_string(key: &str, target: &mut String) {
    if let Ok(value) = env::var(key) {
        if !value.is_empty() {
            *target = value;
        }
    }
}

fn override_optional(key: &str, target: &mut Option<String>) {
    if let Ok(value) = env::var(key) {
        *target = if value.is_empty() { None } else { Some(value) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serial_test::serial;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = GatewayConfig::from_yaml(
            r#"
version: v0.4.2
backends:
  exact:
    address: http://exact:50060
  fuzzy:
    address: http://fuzzy:50060
    required: false
  partial:
    address: http://partial:50060
  phrase:
    address: http://phrase:50060
  extended:
    address: http://extended:50060
tracing_collector: http://tracer:50052
"#,
        )
        .unwrap();

        assert_eq!(config.version, "v0.4.2");
        assert!(config.backends.exact.required);
        assert!(!config.backends.fuzzy.required);
        assert_eq!(config.tracing_collector.as_deref(), Some("http://tracer:50052"));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.health_poll_interval(), Duration::from_secs(1));
        assert_eq!(config.dial_attempts, 3);
    }

    #[test]
    fn test_invalid_timeout_is_rejected() {
        let result = GatewayConfig::from_yaml("request_timeout_ms: 0");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_malformed_yaml_is_rejected() {
        let result = GatewayConfig::from_yaml("backends: [not, a, map]");
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    #[serial]
    fn test_missing_file_uses_defaults_with_env_overrides() {
        env::set_var(GATEWAY_CONFIG_PATH_ENV, "/nonexistent/gateway.yaml");
        env::set_var("EXACT_SERVICE", "http://exact-override:50060");
        env::set_var("TRACING_COLLECTOR", "");
        env::set_var("VERSION", "v9.9.9");

        let config = GatewayConfig::load().unwrap();

        env::remove_var(GATEWAY_CONFIG_PATH_ENV);
        env::remove_var("EXACT_SERVICE");
        env::remove_var("TRACING_COLLECTOR");
        env::remove_var("VERSION");

        assert_eq!(config.backends.exact.address, "http://exact-override:50060");
        assert_eq!(config.backends.fuzzy.address, "http://localhost:50061");
        assert_eq!(config.tracing_collector, None);
        assert_eq!(config.version, "v9.9.9");
    }

    #[test]
    #[serial]
    fn test_counter_config_from_file() {
        let path = env::temp_dir().join(format!("counter-config-{}.yaml", std::process::id()));
        fs::write(&path, "bind_address: 127.0.0.1:7000\nversion: v1\n").unwrap();
        env::set_var(COUNTER_CONFIG_PATH_ENV, &path);

        let config = CounterConfig::load().unwrap();

        env::remove_var(COUNTER_CONFIG_PATH_ENV);
        let _ = fs::remove_file(&path);

        assert_eq!(config.bind_address, "127.0.0.1:7000");
        assert_eq!(config.version, "v1");
        assert_eq!(config.stream_buffer, DEFAULT_STREAM_BUFFER);
    }
}
