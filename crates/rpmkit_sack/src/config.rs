use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading a configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration file")]
    IoError(#[from] std::io::Error),

    /// The configuration is not valid TOML or has unexpected values.
    #[error("error parsing configuration: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Settings that decide which packages of a [`crate::Sack`] are visible to queries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SackConfig {
    /// Glob patterns on the name or NEVRA of available packages to hide.
    pub excludepkgs: Vec<String>,

    /// If not empty, only available packages matching one of these globs stay visible.
    pub includepkgs: Vec<String>,

    /// Hide `src` and `nosrc` packages.
    pub exclude_source_packages: bool,
}

impl SackConfig {
    /// Parses a configuration from TOML text.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }

    /// Reads a configuration from a TOML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod test {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn test_parse() {
        let config = SackConfig::from_toml_str(
            r#"
            excludepkgs = ["kernel*", "wget-1.19.5-5.fc29.x86_64"]
            exclude_source_packages = true
            "#,
        )
        .unwrap();
        assert_eq!(config.excludepkgs.len(), 2);
        assert!(config.includepkgs.is_empty());
        assert!(config.exclude_source_packages);

        assert_eq!(SackConfig::from_toml_str("").unwrap(), SackConfig::default());
        assert_matches!(
            SackConfig::from_toml_str("excludepkgs = 1"),
            Err(ConfigError::ParseError(_))
        );
    }
}
