//! Configuration management for the server.

use std::env;
use std::path::PathBuf;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// PostgreSQL connection URL; the in-memory backend is used when unset
    pub database_url: Option<String>,
    /// Where the in-memory backend keeps its JSON snapshot, if anywhere
    pub snapshot_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            database_url: None,
            snapshot_path: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let database_url = non_empty_var("DATABASE_URL");
        let snapshot_path = non_empty_var("SNAPSHOT_PATH").map(PathBuf::from);

        if database_url.is_some() && snapshot_path.is_some() {
            return Err(ConfigError::ConflictingBackends);
        }

        Ok(Self {
            host,
            port,
            database_url,
            snapshot_path,
        })
    }

    /// Address to bind, as `host:port`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("DATABASE_URL and SNAPSHOT_PATH are mutually exclusive")]
    ConflictingBackends,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_memory_backend() {
        let config = Config::default();
        assert!(config.database_url.is_none());
        assert_eq!(config.bind_addr(), "0.0.0.0:3000");
    }
}
