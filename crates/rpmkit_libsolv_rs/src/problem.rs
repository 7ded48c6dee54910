//! Types to examine why a problem was unsatisfiable, and to report the causes to the user.

use std::fmt::{Display, Formatter};

use itertools::Itertools;

use crate::{DependencyId, DependencyProvider, JobId, SolvableId};

/// A single rule that takes part in an unsatisfiable conflict.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum ProblemClause {
    /// An install job requires one of the candidates.
    JobRequires {
        /// The job.
        job: JobId,
        /// The candidates of the job, empty if nothing matched.
        candidates: Vec<SolvableId>,
    },

    /// An erase job forbids the solvable.
    JobForbids {
        /// The job.
        job: JobId,
        /// The forbidden solvable.
        solvable: SolvableId,
    },

    /// A solvable requires one of the candidates of a dependency.
    Requires {
        /// The requiring solvable.
        solvable: SolvableId,
        /// The dependency.
        dependency: DependencyId,
        /// The solvables that provide the dependency, empty if there are none.
        candidates: Vec<SolvableId>,
    },

    /// A solvable conflicts with another one.
    Conflicts {
        /// The solvable that declares the conflict.
        solvable: SolvableId,
        /// The solvable that provides the conflicting dependency.
        other: SolvableId,
        /// The conflicting dependency.
        dependency: DependencyId,
    },

    /// A solvable obsoletes another one.
    Obsoletes {
        /// The solvable that declares the obsoletes.
        solvable: SolvableId,
        /// The obsoleted solvable.
        other: SolvableId,
        /// The obsoletes dependency.
        dependency: DependencyId,
    },

    /// Two solvables share a name and cannot be installed together.
    SameName {
        /// The first solvable.
        solvable: SolvableId,
        /// The second solvable.
        other: SolvableId,
    },

    /// A solvable conflicts with itself.
    SelfConflict {
        /// The solvable.
        solvable: SolvableId,
        /// The conflicting dependency.
        dependency: DependencyId,
    },
}

impl ProblemClause {
    /// The job this clause comes from, if any.
    pub fn job(&self) -> Option<JobId> {
        match self {
            ProblemClause::JobRequires { job, .. } | ProblemClause::JobForbids { job, .. } => {
                Some(*job)
            }
            _ => None,
        }
    }
}

/// Represents the cause of the solver being unable to find a solution
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Problem {
    /// The clauses involved in an unsatisfiable conflict
    clauses: Vec<ProblemClause>,
}

impl Problem {
    pub(crate) fn add_clause(&mut self, clause: ProblemClause) {
        if !self.clauses.contains(&clause) {
            self.clauses.push(clause);
        }
    }

    /// The clauses that take part in the conflict.
    pub fn clauses(&self) -> &[ProblemClause] {
        &self.clauses
    }

    /// The jobs that take part in the conflict.
    pub fn jobs(&self) -> impl Iterator<Item = JobId> + '_ {
        self.clauses.iter().filter_map(ProblemClause::job).unique()
    }

    /// Returns an object that renders the problem as one line per clause.
    pub fn display<'a, D: DependencyProvider>(&'a self, provider: &'a D) -> DisplayProblem<'a, D> {
        DisplayProblem {
            problem: self,
            provider,
        }
    }
}

/// Renders a [`Problem`] using the names known to a [`DependencyProvider`].
pub struct DisplayProblem<'a, D: DependencyProvider> {
    problem: &'a Problem,
    provider: &'a D,
}

impl<D: DependencyProvider> Display for DisplayProblem<'_, D> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let provider = self.provider;
        let candidates = |candidates: &[SolvableId]| {
            candidates
                .iter()
                .map(|&s| provider.display_solvable(s))
                .join(" | ")
        };
        for clause in &self.problem.clauses {
            match clause {
                ProblemClause::JobRequires { job, candidates: c } if c.is_empty() => {
                    writeln!(f, "job {} has no candidates", job.index())?
                }
                ProblemClause::JobRequires { job, candidates: c } => {
                    writeln!(f, "job {} requires one of {}", job.index(), candidates(c))?
                }
                ProblemClause::JobForbids { job, solvable } => writeln!(
                    f,
                    "job {} forbids {}",
                    job.index(),
                    provider.display_solvable(*solvable)
                )?,
                ProblemClause::Requires {
                    solvable,
                    dependency,
                    candidates: c,
                } if c.is_empty() => writeln!(
                    f,
                    "nothing provides {} needed by {}",
                    provider.display_dependency(*dependency),
                    provider.display_solvable(*solvable)
                )?,
                ProblemClause::Requires {
                    solvable,
                    dependency,
                    ..
                } => writeln!(
                    f,
                    "{} requires {}, but none of the providers can be installed",
                    provider.display_solvable(*solvable),
                    provider.display_dependency(*dependency)
                )?,
                ProblemClause::Conflicts {
                    solvable,
                    other,
                    dependency,
                } => writeln!(
                    f,
                    "{} conflicts with {} provided by {}",
                    provider.display_solvable(*solvable),
                    provider.display_dependency(*dependency),
                    provider.display_solvable(*other)
                )?,
                ProblemClause::Obsoletes {
                    solvable,
                    other,
                    dependency,
                } => writeln!(
                    f,
                    "{} obsoletes {} provided by {}",
                    provider.display_solvable(*solvable),
                    provider.display_dependency(*dependency),
                    provider.display_solvable(*other)
                )?,
                ProblemClause::SameName { solvable, other } => writeln!(
                    f,
                    "cannot install both {} and {}",
                    provider.display_solvable(*solvable),
                    provider.display_solvable(*other)
                )?,
                ProblemClause::SelfConflict {
                    solvable,
                    dependency,
                } => writeln!(
                    f,
                    "{} conflicts with {} provided by itself",
                    provider.display_solvable(*solvable),
                    provider.display_dependency(*dependency)
                )?,
            }
        }
        Ok(())
    }
}
