//! Configuration management for the folder server

use agime_folders::FolderConfig;
use anyhow::{Context, Result};
use std::net::IpAddr;
use std::path::PathBuf;

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host (default: 0.0.0.0)
    pub host: String,

    /// Server port (default: 8090)
    pub port: u16,

    /// JSON file with initial folders and documents
    pub seed_file: Option<PathBuf>,

    /// CORS allowed origins (comma-separated). If empty, any origin is allowed.
    pub cors_allowed_origins: Option<String>,

    pub folders: FolderConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8090
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let host = std::env::var("FOLDERS_SERVER_HOST").unwrap_or_else(|_| default_host());
        host.parse::<IpAddr>()
            .with_context(|| format!("Invalid FOLDERS_SERVER_HOST '{}'", host))?;
        let port = std::env::var("FOLDERS_SERVER_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(default_port);
        let seed_file = std::env::var("FOLDERS_SEED_FILE")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);
        let cors_allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .ok()
            .filter(|s| !s.trim().is_empty());

        Ok(Self {
            host,
            port,
            seed_file,
            cors_allowed_origins,
            folders: FolderConfig::from_env(),
        })
    }

    pub fn allowed_origins(&self) -> Vec<String> {
        self.cors_allowed_origins
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_origins() {
        let config = Config {
            host: default_host(),
            port: default_port(),
            seed_file: None,
            cors_allowed_origins: Some("http://a.test, ,http://b.test".into()),
            folders: FolderConfig::default(),
        };
        assert_eq!(
            config.allowed_origins(),
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
    }
}
