use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Runtime configuration of the proxy process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the pool document (`radius_pool_config.json`)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Authentication UDP port (default: 1812, 0 = ephemeral)
    #[serde(default = "default_authentication_port")]
    pub authentication_port: u16,

    /// Accounting UDP port (default: 1813, 0 = ephemeral)
    #[serde(default = "default_accounting_port")]
    pub accounting_port: u16,

    /// IPv4 listen address
    #[serde(default = "default_listen_v4")]
    pub listen_v4: String,

    /// IPv6 listen address
    #[serde(default = "default_listen_v6")]
    pub listen_v6: String,

    /// Bind the IPv6 sockets as well (default: true)
    #[serde(default = "default_enable_ipv6")]
    pub enable_ipv6: bool,

    /// Log level: "trace", "debug", "info", "warn", "error" (default: "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/radius-proxy")
}

fn default_authentication_port() -> u16 {
    1812
}

fn default_accounting_port() -> u16 {
    1813
}

fn default_listen_v4() -> String {
    Ipv4Addr::UNSPECIFIED.to_string()
}

fn default_listen_v6() -> String {
    Ipv6Addr::UNSPECIFIED.to_string()
}

fn default_enable_ipv6() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: default_data_dir(),
            authentication_port: default_authentication_port(),
            accounting_port: default_accounting_port(),
            listen_v4: default_listen_v4(),
            listen_v6: default_listen_v6(),
            enable_ipv6: default_enable_ipv6(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Loopback-only configuration on ephemeral ports
    pub fn loopback(data_dir: impl Into<PathBuf>) -> Self {
        Config {
            data_dir: data_dir.into(),
            authentication_port: 0,
            accounting_port: 0,
            listen_v4: Ipv4Addr::LOCALHOST.to_string(),
            listen_v6: Ipv6Addr::LOCALHOST.to_string(),
            enable_ipv6: false,
            ..Default::default()
        }
    }

    /// IPv4 and (when enabled) IPv6 bind addresses for the authentication port
    pub fn authentication_addrs(&self) -> Result<(SocketAddr, Option<SocketAddr>), ConfigError> {
        self.listen_addrs(self.authentication_port)
    }

    /// IPv4 and (when enabled) IPv6 bind addresses for the accounting port
    pub fn accounting_addrs(&self) -> Result<(SocketAddr, Option<SocketAddr>), ConfigError> {
        self.listen_addrs(self.accounting_port)
    }

    fn listen_addrs(&self, port: u16) -> Result<(SocketAddr, Option<SocketAddr>), ConfigError> {
        let v4 = SocketAddr::new(IpAddr::V4(self.parse_v4()?), port);
        let v6 = if self.enable_ipv6 {
            Some(SocketAddr::new(IpAddr::V6(self.parse_v6()?), port))
        } else {
            None
        };
        Ok((v4, v6))
    }

    fn parse_v4(&self) -> Result<Ipv4Addr, ConfigError> {
        self.listen_v4
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("Invalid IPv4 listen address: {}", self.listen_v4)))
    }

    fn parse_v6(&self) -> Result<Ipv6Addr, ConfigError> {
        self.listen_v6
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("Invalid IPv6 listen address: {}", self.listen_v6)))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.parse_v4()?;
        if self.enable_ipv6 {
            self.parse_v6()?;
        }

        if self.authentication_port != 0 && self.authentication_port == self.accounting_port {
            return Err(ConfigError::Invalid(format!(
                "Authentication and accounting share port {}",
                self.authentication_port
            )));
        }

        if self.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("Data directory cannot be empty".to_string()));
        }

        match self.log_level.to_ascii_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            other => Err(ConfigError::Invalid(format!("Unknown log level: {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.authentication_port, 1812);
        assert_eq!(config.accounting_port, 1813);
        assert!(config.enable_ipv6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_keys_use_defaults() {
        let config: Config = serde_json::from_str(r#"{"accounting_port": 11813}"#).unwrap();
        assert_eq!(config.accounting_port, 11813);
        assert_eq!(config.authentication_port, 1812);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_listen_addrs() {
        let config = Config::default();
        let (v4, v6) = config.authentication_addrs().unwrap();
        assert_eq!(v4, "0.0.0.0:1812".parse::<SocketAddr>().unwrap());
        assert_eq!(v6, Some("[::]:1812".parse().unwrap()));

        let config = Config {
            enable_ipv6: false,
            ..Default::default()
        };
        assert_eq!(config.accounting_addrs().unwrap().1, None);
    }

    #[test]
    fn test_bracketed_ipv6_listen_address() {
        let config = Config {
            listen_v6: "[::1]".to_string(),
            ..Default::default()
        };
        let (_, v6) = config.accounting_addrs().unwrap();
        assert_eq!(v6, Some("[::1]:1813".parse().unwrap()));
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.listen_v4 = "::1".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.accounting_port = 1812;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.log_level = "loud".to_string();
        assert!(config.validate().is_err());

        // IPv6 address is not checked when IPv6 is off
        let mut config = Config::default();
        config.enable_ipv6 = false;
        config.listen_v6 = "bogus".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_loopback_config() {
        let config = Config::loopback("/tmp/radius");
        assert!(config.validate().is_ok());
        let (v4, v6) = config.accounting_addrs().unwrap();
        assert_eq!(v4.ip(), IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(v4.port(), 0);
        assert!(v6.is_none());
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("proxy.json");
        let config = Config {
            data_dir: dir.path().to_path_buf(),
            authentication_port: 11812,
            ..Default::default()
        };

        config.to_file(&path).unwrap();
        assert_eq!(Config::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_from_file_rejects_invalid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("proxy.json");
        fs::write(&path, r#"{"listen_v4": "not-an-ip"}"#).unwrap();
        assert!(matches!(Config::from_file(&path), Err(ConfigError::Invalid(_))));

        fs::write(&path, "{").unwrap();
        assert!(matches!(Config::from_file(&path), Err(ConfigError::Parse(_))));
    }
}
