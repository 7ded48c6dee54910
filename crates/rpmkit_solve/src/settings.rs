use rpmkit_sack::ResolveSpecSettings;

use crate::config::SolverConfig;

/// A tri-state job setting. [`GoalSetting::Auto`] defers to the [`SolverConfig`].
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub enum GoalSetting {
    /// Use the value from the configuration.
    #[default]
    Auto,
    /// Override the configuration.
    Set(bool),
}

impl GoalSetting {
    /// Returns the overridden value, or `default`.
    pub fn resolve(self, default: bool) -> bool {
        match self {
            GoalSetting::Auto => default,
            GoalSetting::Set(value) => value,
        }
    }
}

impl From<bool> for GoalSetting {
    fn from(value: bool) -> Self {
        GoalSetting::Set(value)
    }
}

/// Settings attached to a single job of a [`crate::Goal`].
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct GoalJobSettings {
    /// How the package spec of the job is interpreted.
    pub resolve: ResolveSpecSettings,

    /// Fail the goal if the job matches nothing or cannot be satisfied. A job that is not strict
    /// is skipped instead.
    pub strict: GoalSetting,

    /// Only the newest matching version may be installed.
    pub best: GoalSetting,

    /// Also remove dependencies that are no longer needed. Only used by remove jobs.
    pub clean_requirements_on_remove: GoalSetting,

    /// If not empty, the spec only matches available packages from these repositories.
    pub from_repo_ids: Vec<String>,

    /// If not empty, install, upgrade and distupgrade jobs only pick packages from these
    /// repositories.
    pub to_repo_ids: Vec<String>,
}

impl GoalJobSettings {
    pub(crate) fn strict(&self, config: &SolverConfig) -> bool {
        self.strict.resolve(config.strict)
    }

    pub(crate) fn best(&self, config: &SolverConfig) -> bool {
        self.best.resolve(config.best)
    }

    pub(crate) fn clean_requirements_on_remove(&self, config: &SolverConfig) -> bool {
        self.clean_requirements_on_remove
            .resolve(config.clean_requirements_on_remove)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_resolve_against_config() {
        let config = SolverConfig {
            best: false,
            ..Default::default()
        };
        let mut settings = GoalJobSettings::default();
        assert!(!settings.best(&config));
        assert!(settings.strict(&config));

        settings.best = true.into();
        settings.strict = GoalSetting::Set(false);
        assert!(settings.best(&config));
        assert!(!settings.strict(&config));
    }
}
