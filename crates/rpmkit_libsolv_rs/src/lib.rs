//! A SAT solver for dependency resolution using conflict-driven clause learning (CDCL), as
//! described in [An Extensible SAT-solver](http://minisat.se/downloads/MiniSat.pdf). The clause
//! shapes and the watch lists are modelled on [libsolv](https://github.com/openSUSE/libsolv).
//!
//! The solver knows nothing about package formats. Everything it needs is asked from a
//! [`DependencyProvider`]: which solvables share a name, which solvables satisfy a requirement and
//! which solvables conflict with or obsolete each other.

#![deny(missing_docs)]

mod arena;
mod id;
pub mod problem;
mod solve_jobs;
mod solver;

pub use id::{DependencyId, JobId, NameId, SolvableId};
pub use problem::{Problem, ProblemClause};
pub use solve_jobs::{Job, JobKind, SolveJobs};
pub use solver::{Solution, Solver};

/// A dependency of a solvable together with the solvables that match it.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Requirement {
    /// The provider's id of the dependency, used when reporting problems.
    pub dependency: DependencyId,

    /// The solvables that match the dependency. For requirements they are sorted with the
    /// solvable that should be tried first at the front.
    pub candidates: Vec<SolvableId>,
}

/// The relations of a single solvable.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Dependencies {
    /// One candidate of each requirement must be installed together with the solvable.
    pub requires: Vec<Requirement>,

    /// None of the candidates may be installed together with the solvable.
    pub conflicts: Vec<Requirement>,

    /// The candidates are replaced by the solvable and may not be installed together with it.
    pub obsoletes: Vec<Requirement>,
}

/// Describes the universe of solvables to the [`Solver`].
pub trait DependencyProvider {
    /// The number of solvables, not counting the root. Valid ids are `1..=solvable_count()`.
    fn solvable_count(&self) -> usize;

    /// The name of a solvable.
    fn solvable_name(&self, solvable: SolvableId) -> NameId;

    /// Returns true if the solvable may be installed next to other solvables with the same name.
    fn allows_multiple_instances(&self, _solvable: SolvableId) -> bool {
        false
    }

    /// Returns the relations of a solvable.
    fn get_dependencies(&self, solvable: SolvableId) -> Dependencies;

    /// Formats a solvable for problem reports and logs.
    fn display_solvable(&self, solvable: SolvableId) -> String;

    /// Formats a dependency for problem reports and logs.
    fn display_dependency(&self, dependency: DependencyId) -> String;
}
