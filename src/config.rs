//! Runtime configuration for the CLI and HTTP server.
//!
//! Resolution order: built-in defaults, then an optional TOML file, then
//! `COUNTY_MARKET_*` environment variables.

use crate::error::{MarketError, MarketResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "county-market.toml";

pub const ENV_CONFIG: &str = "COUNTY_MARKET_CONFIG";
pub const ENV_DB: &str = "COUNTY_MARKET_DB";
pub const ENV_HOST: &str = "COUNTY_MARKET_HOST";
pub const ENV_PORT: &str = "COUNTY_MARKET_PORT";
pub const ENV_LOG: &str = "COUNTY_MARKET_LOG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// SQLite database holding `counties` and `county_metrics`.
    pub database_path: PathBuf,
    pub server_host: String,
    pub server_port: u16,
    /// Page size used when a caller does not ask for one.
    pub default_page_size: u32,
    pub max_page_size: u32,
    /// Fallback tracing filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("county_market.db"),
            server_host: "127.0.0.1".to_string(),
            server_port: 8080,
            default_page_size: 10,
            max_page_size: 100,
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load from `path`, else `COUNTY_MARKET_CONFIG`, else `county-market.toml` if present,
    /// then apply env overrides.
    pub fn load(path: Option<&Path>) -> MarketResult<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// `load` with environment reads going through `lookup`.
    pub fn load_with<F>(path: Option<&Path>, lookup: F) -> MarketResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let chosen = path
            .map(Path::to_path_buf)
            .or_else(|| lookup(ENV_CONFIG).map(PathBuf::from));

        let mut config = match chosen {
            Some(p) => Self::from_file(&p)?,
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.exists() {
                    Self::from_file(fallback)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_overrides(&lookup)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> MarketResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
            .map_err(|e| MarketError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml(text: &str) -> MarketResult<Self> {
        toml::from_str(text).map_err(|e| MarketError::Config(e.to_string()))
    }

    /// Apply `COUNTY_MARKET_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> MarketResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db) = lookup(ENV_DB) {
            self.database_path = PathBuf::from(db);
        }
        if let Some(host) = lookup(ENV_HOST) {
            self.server_host = host;
        }
        if let Some(port) = lookup(ENV_PORT) {
            self.server_port = port
                .trim()
                .parse()
                .map_err(|_| MarketError::Config(format!("{} is not a valid port: '{}'", ENV_PORT, port)))?;
        }
        if let Some(level) = lookup(ENV_LOG) {
            self.log_level = level;
        }
        Ok(())
    }

    pub fn validate(&self) -> MarketResult<()> {
        if self.server_port == 0 {
            return Err(MarketError::Config("server_port must not be 0".to_string()));
        }
        if self.max_page_size == 0 {
            return Err(MarketError::Config("max_page_size must be at least 1".to_string()));
        }
        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            return Err(MarketError::Config(format!(
                "default_page_size must be between 1 and max_page_size ({})",
                self.max_page_size
            )));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml("server_port = 9000\nmax_page_size = 50\n").unwrap();
        assert_eq!(config.server_port, 9000);
        assert_eq!(config.max_page_size, 50);
        assert_eq!(config.default_page_size, 10);
        assert_eq!(config.database_path, PathBuf::from("county_market.db"));
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        assert!(matches!(
            AppConfig::from_toml("server_port = \"soon\""),
            Err(MarketError::Config(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("market.toml");
        std::fs::write(&path, "database_path = \"/tmp/market.db\"\nlog_level = \"debug\"\n").unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/market.db"));
        assert_eq!(config.log_level, "debug");

        assert!(AppConfig::from_file(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_DB, "/data/counties.db"),
            (ENV_PORT, "3001"),
            (ENV_LOG, "warn"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/data/counties.db"));
        assert_eq!(config.server_port, 3001);
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.server_host, "127.0.0.1");
    }

    #[test]
    fn test_config_file_from_env() {
        let dir = tempdir().unwrap();
        let env_file = dir.path().join("market.toml");
        let flag_file = dir.path().join("flag.toml");
        std::fs::write(&env_file, "server_port = 9100\n").unwrap();
        std::fs::write(&flag_file, "server_port = 9200\n").unwrap();

        let env: HashMap<&str, String> = [
            (ENV_CONFIG, env_file.display().to_string()),
            (ENV_LOG, "trace".to_string()),
        ]
        .into_iter()
        .collect();
        let lookup = |key: &str| env.get(key).cloned();

        let config = AppConfig::load_with(None, lookup).unwrap();
        assert_eq!(config.server_port, 9100);
        assert_eq!(config.log_level, "trace");

        // An explicit path wins over the environment
        let config = AppConfig::load_with(Some(&flag_file), lookup).unwrap();
        assert_eq!(config.server_port, 9200);

        let missing = HashMap::from([(ENV_CONFIG, dir.path().join("gone.toml").display().to_string())]);
        assert!(AppConfig::load_with(None, |key: &str| missing.get(key).cloned()).is_err());
    }

    #[test]
    fn test_bad_port_override() {
        let mut config = AppConfig::default();
        let result = config.apply_overrides(|key| (key == ENV_PORT).then(|| "http".to_string()));
        assert!(matches!(result, Err(MarketError::Config(_))));
    }

    #[test]
    fn test_validate_page_sizes() {
        let config = AppConfig {
            default_page_size: 200,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());

        let config = AppConfig {
            max_page_size: 0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
