use std::path::Path;

use rpmkit_sack::ConfigError;
use serde::{Deserialize, Serialize};

/// The solver defaults consulted when a [`crate::GoalJobSettings`] leaves a setting on
/// [`crate::GoalSetting::Auto`], together with the package policies of the goal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Install and upgrade jobs must select the newest matching version.
    pub best: bool,

    /// Jobs that match nothing, or cannot be satisfied, fail the whole goal instead of being
    /// skipped.
    pub strict: bool,

    /// Removing a package also removes the dependencies nothing else needs anymore.
    pub clean_requirements_on_remove: bool,

    /// Names of installed packages that may never be removed.
    pub protected_packages: Vec<String>,

    /// Names of packages that are installed side by side instead of being upgraded.
    pub installonlypkgs: Vec<String>,

    /// How many versions of an installonly package are kept. `0` keeps every version.
    pub installonly_limit: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            best: true,
            strict: true,
            clean_requirements_on_remove: true,
            protected_packages: vec!["dnf".to_owned()],
            installonlypkgs: vec![
                "kernel".to_owned(),
                "kernel-core".to_owned(),
                "kernel-modules".to_owned(),
            ],
            installonly_limit: 3,
        }
    }
}

impl SolverConfig {
    /// Parses a configuration from TOML text. Missing keys keep their defaults.
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
    fn test_defaults() {
        let config = SolverConfig::from_toml_str("").unwrap();
        assert_eq!(config, SolverConfig::default());
        assert!(config.best && config.strict && config.clean_requirements_on_remove);
        assert_eq!(config.protected_packages, ["dnf"]);
    }

    #[test]
    fn test_parse() {
        let config = SolverConfig::from_toml_str(
            r#"
            best = false
            protected_packages = ["dnf", "systemd"]
            installonly_limit = 2
            "#,
        )
        .unwrap();
        assert!(!config.best);
        assert!(config.strict);
        assert_eq!(config.protected_packages, ["dnf", "systemd"]);
        assert_eq!(config.installonly_limit, 2);

        assert_matches!(
            SolverConfig::from_toml_str("best = \"yes\""),
            Err(ConfigError::ParseError(_))
        );
    }
}
