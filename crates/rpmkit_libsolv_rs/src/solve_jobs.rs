use crate::arena::ArenaId;
use crate::id::{JobId, SolvableId};

/// What a [`Job`] asks for.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum JobKind {
    /// One of the solvables must be installed. The solver tries them in order.
    Install(Vec<SolvableId>),

    /// None of the solvables may be installed.
    Erase(Vec<SolvableId>),
}

/// A single request to the solver.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Job {
    /// The id returned by [`SolveJobs::push`].
    pub id: JobId,

    /// What the job asks for.
    pub kind: JobKind,

    /// A weak job is dropped if it makes the problem unsatisfiable.
    pub weak: bool,
}

/// Configures the jobs that should be resolved by [`crate::Solver`]
#[derive(Debug, Default, Clone)]
pub struct SolveJobs {
    pub(crate) jobs: Vec<Job>,
}

impl SolveJobs {
    /// Adds a job and returns its id.
    pub fn push(&mut self, kind: JobKind, weak: bool) -> JobId {
        let id = JobId::from_usize(self.jobs.len());
        self.jobs.push(Job { id, kind, weak });
        id
    }

    /// One of `candidates` must be installed.
    pub fn install(&mut self, candidates: Vec<SolvableId>) -> JobId {
        self.push(JobKind::Install(candidates), false)
    }

    /// None of `solvables` may be installed.
    pub fn erase(&mut self, solvables: Vec<SolvableId>) -> JobId {
        self.push(JobKind::Erase(solvables), false)
    }

    /// Returns the job with the given id.
    pub fn get(&self, id: JobId) -> &Job {
        &self.jobs[id.to_usize()]
    }

    /// Iterates over the jobs in the order they were added.
    pub fn iter(&self) -> impl Iterator<Item = &Job> + '_ {
        self.jobs.iter()
    }

    /// The number of jobs.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// True if no job was added.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
