//! Application configuration sourced from the environment and an optional `.env` file

use crate::error::DashboardError;
use crate::model::DEFAULT_CLUSTERS;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

/// Default location of the SQLite record store
pub const DEFAULT_DB_PATH: &str = "data/sales.db";

/// Dotenv file read from the working directory
pub const ENV_FILE: &str = ".env";

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Path of the SQLite database holding the `sales` table
    pub db_path: PathBuf,
    pub log_level: String,
    /// Number of customer segments requested from the clustering step
    pub clusters: usize,
}

impl AppConfig {
    /// Config from `.env` in the working directory when present, else the environment alone
    pub fn load() -> Result<Self, DashboardError> {
        let env_file = Path::new(ENV_FILE);
        if env_file.is_file() {
            Self::from_env_file(env_file)
        } else {
            Self::from_env()
        }
    }

    /// Create application config from environment variables
    pub fn from_env() -> Result<Self, DashboardError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Environment variables first, then `KEY=value` entries of a dotenv file.
    ///
    /// The process environment is left untouched.
    pub fn from_env_file(path: &Path) -> Result<Self, DashboardError> {
        let invalid = |e: dotenv::Error| {
            DashboardError::Config(format!("Invalid env file {}: {}", path.display(), e))
        };

        let mut file_vars = HashMap::new();
        for entry in dotenv::from_path_iter(path).map_err(invalid)? {
            let (key, value) = entry.map_err(invalid)?;
            file_vars.insert(key, value);
        }

        Self::from_lookup(|key| env::var(key).ok().or_else(|| file_vars.get(key).cloned()))
    }

    /// Build the config from an arbitrary key lookup.
    ///
    /// Recognised keys: `SALES_DB_PATH`, `LOG_LEVEL`, `SEGMENT_CLUSTERS`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DashboardError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_path = lookup("SALES_DB_PATH")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));

        let log_level = lookup("LOG_LEVEL")
            .unwrap_or_else(|| "info".to_string())
            .to_lowercase();

        if !VALID_LOG_LEVELS.contains(&log_level.as_str()) {
            return Err(DashboardError::Config(format!(
                "Invalid LOG_LEVEL: {}. Must be one of: {:?}",
                log_level, VALID_LOG_LEVELS
            )));
        }

        let clusters = match lookup("SEGMENT_CLUSTERS") {
            Some(raw) => raw.trim().parse::<usize>().map_err(|_| {
                DashboardError::Config(format!("Invalid SEGMENT_CLUSTERS: {}", raw))
            })?,
            None => DEFAULT_CLUSTERS,
        };

        Ok(Self {
            db_path,
            log_level,
            clusters,
        })
    }

    /// Apply command-line overrides on top of the environment
    pub fn with_overrides(mut self, db_path: Option<PathBuf>, verbose: bool) -> Self {
        if let Some(path) = db_path {
            self.db_path = path;
        }
        if verbose {
            self.log_level = "debug".to_string();
        }
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            log_level: "info".to_string(),
            clusters: DEFAULT_CLUSTERS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = AppConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.clusters, 3);
    }

    #[test]
    fn test_reads_environment_values() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("SALES_DB_PATH", "/tmp/other.db"),
            ("LOG_LEVEL", "DEBUG"),
            ("SEGMENT_CLUSTERS", "5"),
        ]))
        .unwrap();

        assert_eq!(config.db_path, PathBuf::from("/tmp/other.db"));
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.clusters, 5);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(AppConfig::from_lookup(lookup_from(&[("LOG_LEVEL", "loud")])).is_err());
        assert!(AppConfig::from_lookup(lookup_from(&[("SEGMENT_CLUSTERS", "three")])).is_err());
    }

    #[test]
    fn test_reads_env_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# local overrides").unwrap();
        writeln!(file, "SEGMENT_CLUSTERS=4").unwrap();
        writeln!(file, "LOG_LEVEL=warn").unwrap();

        let config = AppConfig::from_env_file(file.path()).unwrap();
        assert_eq!(config.clusters, 4);
        assert_eq!(config.log_level, "warn");
        assert!(env::var("SEGMENT_CLUSTERS").is_err());
    }

    #[test]
    fn test_env_file_values_are_validated() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "SEGMENT_CLUSTERS=lots").unwrap();
        assert!(AppConfig::from_env_file(file.path()).is_err());

        assert!(AppConfig::from_env_file(Path::new("/nonexistent/.env")).is_err());
    }

    #[test]
    fn test_cli_overrides() {
        let config = AppConfig::default().with_overrides(Some(PathBuf::from("x.db")), true);
        assert_eq!(config.db_path, PathBuf::from("x.db"));
        assert_eq!(config.log_level, "debug");
    }
}
