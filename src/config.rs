//! Configuration with layered resolution using figment.
//!
//! Resolution order (highest priority last):
//! 1. Built-in defaults
//! 2. `workshop-ledger.toml` in the working directory (or an explicit path)
//! 3. Environment variables: `WORKSHOP_LEDGER_*`
//!
//! ```toml
//! database_path = "ledger.db"
//! unassigned_label = "Unassigned"
//! standard_tax_rate_id = "T1"
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "workshop-ledger.toml";
pub const ENV_PREFIX: &str = "WORKSHOP_LEDGER_";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Figment(#[from] Box<figment::Error>),

    #[error("unassigned_label must not be empty")]
    EmptyUnassignedLabel,
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Figment(Box::new(err))
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// SQLite file holding nominal codes, rules and tax rates
    pub database_path: PathBuf,

    /// Label written for items no rule assigns
    pub unassigned_label: String,

    /// Overrides the tax rate flagged as standard in the store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard_tax_rate_id: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_path: PathBuf::from("workshop-ledger.db"),
            unassigned_label: "Unassigned".to_string(),
            standard_tax_rate_id: None,
        }
    }
}

impl Config {
    /// Load from the default file in the working directory plus environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE))
    }

    /// Load from a specific TOML file plus environment; a missing file is fine
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        Self::from_figment(
            Figment::from(Serialized::defaults(Config::default()))
                .merge(Toml::file(path))
                .merge(Env::prefixed(ENV_PREFIX)),
        )
    }

    fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Config = figment.extract()?;
        if config.unassigned_label.trim().is_empty() {
            return Err(ConfigError::EmptyUnassignedLabel);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_when_file_missing() {
        let config = Config::from_figment(
            Figment::from(Serialized::defaults(Config::default()))
                .merge(Toml::file("/nonexistent/workshop-ledger.toml")),
        )
        .unwrap();

        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "database_path = \"/tmp/garage.db\"").unwrap();
        writeln!(file, "standard_tax_rate_id = \"T1\"").unwrap();

        let config = Config::from_figment(
            Figment::from(Serialized::defaults(Config::default())).merge(Toml::file(file.path())),
        )
        .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/garage.db"));
        assert_eq!(config.standard_tax_rate_id.as_deref(), Some("T1"));
        assert_eq!(config.unassigned_label, "Unassigned");
    }

    #[test]
    fn test_blank_unassigned_label_rejected() {
        let result = Config::from_figment(
            Figment::from(Serialized::defaults(Config::default()))
                .merge(Toml::string("unassigned_label = \"  \"")),
        );

        assert!(matches!(result, Err(ConfigError::EmptyUnassignedLabel)));
    }
}
