use crate::core::db::Database;
use crate::core::{DbError, Result};
use crate::policy::FailurePolicy;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
}

/// Settings for opening one database handle.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_driver")]
    pub driver: String,
    pub source: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    pub foreign_keys: Option<bool>,
}

fn default_driver() -> String {
    "sqlite".to_string()
}

/// Loads configuration from a TOML file at the given path.
///
/// # Example
///
/// ```no_run
/// let config = dbwrapper::config::load_config("dbwrapper.toml")?;
/// let db = dbwrapper::Database::from_config(&config.database)?;
/// # Ok::<(), dbwrapper::DbError>(())
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).map_err(|e| DbError::Config(e.to_string()))
}

impl Database {
    /// Opens a handle from its configuration section.
    pub fn from_config(config: &DatabaseConfig) -> Result<Database> {
        let mut builder = Database::builder()
            .driver(&config.driver)
            .source(&config.source)
            .prefix(&config.prefix)
            .failure_policy(config.failure_policy);
        if let Some(enabled) = config.foreign_keys {
            builder = builder.foreign_keys(enabled);
        }
        builder.open()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE_CONFIG: &str = r#"
[database]
driver = "sqlite3"
source = ":memory:"
prefix = "wp_"
failure_policy = "fail_fast"
foreign_keys = true
"#;

    #[test]
    fn test_parse_config() {
        let config = parse_config(SAMPLE_CONFIG).expect("Failed to parse sample config");
        let db = config.database;
        assert_eq!(db.driver, "sqlite3");
        assert_eq!(db.source, ":memory:");
        assert_eq!(db.prefix, "wp_");
        assert_eq!(db.failure_policy, FailurePolicy::FailFast);
        assert_eq!(db.foreign_keys, Some(true));
    }

    #[test]
    fn test_defaults() {
        let config = parse_config("[database]\nsource = \"app.db\"\n").unwrap();
        assert_eq!(config.database.driver, "sqlite");
        assert_eq!(config.database.prefix, "");
        assert_eq!(config.database.failure_policy, FailurePolicy::ReturnError);
        assert_eq!(config.database.foreign_keys, None);
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(parse_config("[database]\n"), Err(DbError::Config(_))));
        assert!(matches!(
            parse_config("[database]\nsource = \"x\"\nfailure_policy = \"retry\"\n"),
            Err(DbError::Config(_))
        ));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE_CONFIG.as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();
        let db = Database::from_config(&config.database).unwrap();
        assert_eq!(db.prefix(), "wp_");
        assert_eq!(db.failure_policy(), FailurePolicy::FailFast);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(load_config("/nonexistent/dbwrapper.toml"), Err(DbError::Io(_))));
    }
}
