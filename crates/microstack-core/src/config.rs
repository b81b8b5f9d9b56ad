//! Configuration management for the MicroStack server.
//!
//! All configuration is driven by environment variables.

use std::path::PathBuf;

/// Error raised when the environment contains an unusable configuration value.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configured port is not an integer in `[1, 65535]`.
    #[error("invalid MICROSTACK_PORT: {0} (must be an integer between 1 and 65535)")]
    InvalidPort(String),
}

/// Global configuration for the MicroStack server.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MicroStackConfig {
    /// Bind address for the gateway.
    pub host: String,
    /// Bind port for the gateway.
    pub port: u16,
    /// Data directory; the function runtime's scratch tree lives under it.
    pub data_dir: PathBuf,
}

impl Default for MicroStackConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 1337,
            data_dir: PathBuf::from("/tmp/microstack"),
        }
    }
}

impl MicroStackConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPort`] if `MICROSTACK_PORT` is set but
    /// is not an integer in `[1, 65535]`. An invalid port is a fatal startup
    /// error; the caller should refuse to boot.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("MICROSTACK_HOST") {
            config.host = v;
        }
        if let Ok(v) = std::env::var("MICROSTACK_PORT") {
            config.port = parse_port(&v)?;
        }
        if let Ok(v) = std::env::var("MICROSTACK_DATA_DIR") {
            config.data_dir = PathBuf::from(v);
        }

        Ok(config)
    }

    /// The scratch directory root used by the function runtime.
    #[must_use]
    pub fn runtime_dir(&self) -> PathBuf {
        self.data_dir.join("runtime")
    }

    /// The `host:port` string the gateway binds to.
    #[must_use]
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parse a port string, rejecting non-integers and zero.
fn parse_port(raw: &str) -> Result<u16, ConfigError> {
    match raw.trim().parse::<u16>() {
        Ok(port) if port >= 1 => Ok(port),
        _ => Err(ConfigError::InvalidPort(raw.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_create_default_config() {
        let config = MicroStackConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 1337);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/microstack"));
    }

    #[test]
    fn test_should_derive_runtime_dir_from_data_dir() {
        let config = MicroStackConfig::default();
        assert_eq!(config.runtime_dir(), PathBuf::from("/tmp/microstack/runtime"));
    }

    #[test]
    fn test_should_format_listen_addr() {
        let config = MicroStackConfig::default();
        assert_eq!(config.listen_addr(), "0.0.0.0:1337");
    }

    #[test]
    fn test_should_accept_valid_ports() {
        assert_eq!(parse_port("1").unwrap(), 1);
        assert_eq!(parse_port("1337").unwrap(), 1337);
        assert_eq!(parse_port("65535").unwrap(), 65535);
    }

    #[test]
    fn test_should_reject_invalid_ports() {
        assert!(parse_port("0").is_err());
        assert!(parse_port("65536").is_err());
        assert!(parse_port("-1").is_err());
        assert!(parse_port("http").is_err());
        assert!(parse_port("").is_err());
    }
}
