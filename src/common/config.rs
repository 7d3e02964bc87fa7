//! Configuration file handling

use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::paths;
use super::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Daemon settings
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Client connection settings
    #[serde(default)]
    pub client: ClientConfig,
}

/// Daemon configuration
#[derive(Debug, Deserialize)]
pub struct DaemonConfig {
    /// Socket path to listen on (defaults to the runtime dir)
    #[serde(default)]
    pub sock_path: Option<PathBuf>,

    /// Store database path (defaults to the data dir)
    #[serde(default)]
    pub db_path: Option<PathBuf>,

    /// Drop a connection that sends nothing for this long (never when unset)
    #[serde(default)]
    pub client_idle_timeout_secs: Option<u64>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            sock_path: None,
            db_path: None,
            client_idle_timeout_secs: None,
        }
    }
}

/// Client retry settings for reaching a daemon that may still be starting
#[derive(Debug, Deserialize)]
pub struct ClientConfig {
    /// Number of connection attempts before giving up
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,

    /// Delay between connection attempts
    #[serde(default = "default_connect_delay")]
    pub connect_delay_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_attempts: default_connect_attempts(),
            connect_delay_ms: default_connect_delay(),
        }
    }
}

fn default_connect_attempts() -> u32 {
    100
}
fn default_connect_delay() -> u64 {
    10
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        match paths::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| super::Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }

    /// Socket path, with an explicit override taking precedence
    pub fn sock_path(&self, cli: Option<PathBuf>) -> PathBuf {
        cli.or_else(|| self.daemon.sock_path.clone())
            .unwrap_or_else(paths::default_socket_path)
    }

    /// Store path, with an explicit override taking precedence
    pub fn db_path(&self, cli: Option<PathBuf>) -> Result<PathBuf> {
        cli.or_else(|| self.daemon.db_path.clone())
            .or_else(paths::default_db_path)
            .ok_or_else(|| {
                super::Error::ConfigParse(
                    "no home directory found; pass --db explicitly".to_string(),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.client.connect_attempts, 100);
        assert_eq!(config.client.connect_delay_ms, 10);
        assert_eq!(config.daemon.client_idle_timeout_secs, None);
        assert!(config.daemon.sock_path.is_none());
    }

    #[test]
    fn test_partial_config() {
        let config = Config::parse(
            r#"
            [daemon]
            sock_path = "/tmp/custom.sock"

            [client]
            connect_attempts = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.sock_path(None), PathBuf::from("/tmp/custom.sock"));
        assert_eq!(
            config.sock_path(Some(PathBuf::from("/tmp/flag.sock"))),
            PathBuf::from("/tmp/flag.sock")
        );
        assert_eq!(config.client.connect_attempts, 5);
        assert_eq!(config.client.connect_delay_ms, 10);
    }

    #[test]
    fn test_invalid_config_is_reported() {
        let err = Config::parse("[client]\nconnect_attempts = \"many\"").unwrap_err();
        assert!(matches!(err, super::super::Error::ConfigParse(_)));
    }
}
