//! Explains why a [`crate::Goal`] could not be resolved.

use std::fmt::Formatter;

use strum::Display;

/// The kind of rule a problem entry reports.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ProblemRule {
    /// Nothing matches the spec of a job.
    JobNothingProvides,
    /// Every package matching the spec of a job is hidden by excludes.
    JobUnknownPackage,
    /// The job cannot be carried out for the packages it matched.
    JobUnsupported,
    /// The job needs an installed package but only matched available ones.
    JobNotInstalled,
    /// The jobs contradict each other.
    JobConflict,
    /// Two packages conflict.
    PkgConflicts,
    /// A package obsoletes another one that must stay.
    PkgObsoletes,
    /// None of the providers of a requirement can be installed.
    PkgRequires,
    /// Nothing provides a requirement.
    PkgNothingProvides,
    /// Two versions of a package cannot be installed together.
    PkgSameName,
    /// A package conflicts with itself.
    PkgSelfConflict,
    /// An installed package cannot be kept.
    PkgInstalledKeep,
    /// The transaction would remove a protected package.
    RemovalOfProtected,
    /// The transaction would remove the running kernel.
    RemovalOfRunningKernel,
}

impl ProblemRule {
    /// Returns true for rules about the jobs rather than about packages.
    pub fn is_job_rule(self) -> bool {
        matches!(
            self,
            ProblemRule::JobNothingProvides
                | ProblemRule::JobUnknownPackage
                | ProblemRule::JobUnsupported
                | ProblemRule::JobNotInstalled
                | ProblemRule::JobConflict
        )
    }
}

/// One rule of a problem together with a human readable description.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct ProblemEntry {
    /// The kind of rule.
    pub rule: ProblemRule,
    /// Describes the rule in terms of packages and dependencies.
    pub detail: String,
}

impl ProblemEntry {
    pub(crate) fn new(rule: ProblemRule, detail: impl Into<String>) -> Self {
        Self {
            rule,
            detail: detail.into(),
        }
    }
}

/// The problems found while resolving a goal. Each problem is a group of rules that cannot be
/// satisfied together.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ProblemList {
    problems: Vec<Vec<ProblemEntry>>,
}

impl ProblemList {
    pub(crate) fn push(&mut self, problem: Vec<ProblemEntry>) {
        if !problem.is_empty() {
            self.problems.push(problem);
        }
    }

    /// The number of problems.
    pub fn len(&self) -> usize {
        self.problems.len()
    }

    /// True if there are no problems.
    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    /// Returns the entries of a single problem.
    pub fn get(&self, index: usize) -> Option<&[ProblemEntry]> {
        self.problems.get(index).map(Vec::as_slice)
    }

    /// Iterates over the problems.
    pub fn iter(&self) -> impl Iterator<Item = &[ProblemEntry]> + '_ {
        self.problems.iter().map(Vec::as_slice)
    }

    /// Iterates over the entries of every problem.
    pub fn entries(&self) -> impl Iterator<Item = &ProblemEntry> + '_ {
        self.problems.iter().flatten()
    }

    /// Returns true if any problem contains an entry with the given rule.
    pub fn has_rule(&self, rule: ProblemRule) -> bool {
        self.entries().any(|entry| entry.rule == rule)
    }
}

impl std::fmt::Display for ProblemList {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (index, problem) in self.problems.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(f, "Problem {}:", index + 1)?;
            for entry in problem {
                write!(f, "\n  - {}", entry.detail)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ProblemList {}
