use crate::arena::Arena;
use crate::id::{ClauseId, DependencyId, JobId, LearntClauseId, RequirementId, SolvableId};
use crate::solver::assignment::DecisionMap;
use crate::DependencyProvider;

use std::fmt::{Debug, Formatter};

/// Where a requirement comes from.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum RequirementOrigin {
    /// An install job. The requiring solvable is the root.
    Job(JobId),
    /// A dependency of a solvable.
    Dependency(DependencyId),
}

/// The candidates of a requirement, stored outside of the [`Clause`] to keep it small.
pub(crate) struct RequirementInfo {
    pub(crate) candidates: Vec<SolvableId>,
    pub(crate) origin: RequirementOrigin,
}

/// A disjunction of literals over solvables, e.g. `(¬A ∨ B1 ∨ B2)`.
///
/// Only the shapes that dependency resolution needs are supported, so that the thousands of
/// clauses of a real transaction stay small. Requirement candidates and learnt literals live in
/// separate arenas. Assignments are tracked in the [`DecisionMap`].
#[derive(Copy, Clone, Debug)]
pub(crate) enum Clause {
    /// An assertion that the root solvable must be installed
    ///
    /// In SAT terms: (root)
    InstallRoot,
    /// The solvable requires one of the candidates of the requirement. Install jobs are requires
    /// clauses of the root.
    ///
    /// In SAT terms: (¬A ∨ B1 ∨ B2 ∨ ... ∨ B99), where B1 to B99 represent the candidates
    Requires(SolvableId, RequirementId),
    /// Ensures only a single solvable of a name is installed
    ///
    /// In SAT terms: (¬A ∨ ¬B)
    ForbidMultipleInstances(SolvableId, SolvableId),
    /// The first solvable conflicts with the second through the dependency
    ///
    /// In SAT terms: (¬A ∨ ¬B)
    Conflicts(SolvableId, SolvableId, DependencyId),
    /// The first solvable obsoletes the second through the dependency
    ///
    /// In SAT terms: (¬A ∨ ¬B)
    Obsoletes(SolvableId, SolvableId, DependencyId),
    /// An erase job forbids the solvable
    ///
    /// In SAT terms: (¬root ∨ ¬B). Note that we could encode this as an assertion (¬B), but that
    /// would require additional logic in the solver.
    Forbid(SolvableId, JobId),
    /// The solvable conflicts with itself and can never be installed
    ///
    /// In SAT terms: (¬A)
    SelfConflict(SolvableId, DependencyId),
    /// A clause learnt during solving
    ///
    /// The learnt clause id can be used to retrieve the clause's literals, which are stored
    /// elsewhere to prevent the size of [`Clause`] from blowing up
    Learnt(LearntClauseId),
}

impl Clause {
    /// Returns the ids of the solvables that will be watched right after the clause is created
    fn initial_watches(
        &self,
        learnt_clauses: &Arena<LearntClauseId, Vec<Literal>>,
        requirements: &Arena<RequirementId, RequirementInfo>,
    ) -> Option<[SolvableId; 2]> {
        match *self {
            Clause::InstallRoot | Clause::SelfConflict(..) => None,
            Clause::ForbidMultipleInstances(s1, s2)
            | Clause::Conflicts(s1, s2, _)
            | Clause::Obsoletes(s1, s2, _) => Some([s1, s2]),
            Clause::Forbid(s, _) => Some([SolvableId::root(), s]),
            Clause::Learnt(learnt_id) => match learnt_clauses[learnt_id].as_slice() {
                // No need for watches, since we learned an assertion
                [] | [_] => None,
                [first, .., last] => Some([first.solvable_id, last.solvable_id]),
            },
            Clause::Requires(id, requirement) => requirements[requirement]
                .candidates
                .first()
                .map(|&candidate| [id, candidate]),
        }
    }

    /// Visits each literal in the clause
    pub(crate) fn visit_literals(
        &self,
        learnt_clauses: &Arena<LearntClauseId, Vec<Literal>>,
        requirements: &Arena<RequirementId, RequirementInfo>,
        mut visit: impl FnMut(Literal),
    ) {
        match *self {
            Clause::InstallRoot => visit(Literal::positive(SolvableId::root())),
            Clause::Learnt(learnt_id) => learnt_clauses[learnt_id].iter().copied().for_each(&mut visit),
            Clause::Requires(solvable_id, requirement) => {
                visit(Literal::negative(solvable_id));
                requirements[requirement]
                    .candidates
                    .iter()
                    .map(|&candidate| Literal::positive(candidate))
                    .for_each(&mut visit);
            }
            Clause::ForbidMultipleInstances(s1, s2)
            | Clause::Conflicts(s1, s2, _)
            | Clause::Obsoletes(s1, s2, _) => {
                visit(Literal::negative(s1));
                visit(Literal::negative(s2));
            }
            Clause::Forbid(s, _) => {
                visit(Literal::negative(SolvableId::root()));
                visit(Literal::negative(s));
            }
            Clause::SelfConflict(s, _) => visit(Literal::negative(s)),
        }
    }
}

/// A [`Clause`] together with its two watched solvables. Every clause sits in the watch list of
/// both watched solvables; `next_watches` holds the next clause of each list.
#[derive(Clone)]
pub(crate) struct ClauseState {
    pub(crate) watched_literals: [SolvableId; 2],
    next_watches: [ClauseId; 2],
    pub(crate) kind: Clause,
}

impl ClauseState {
    pub(crate) fn new(
        kind: Clause,
        learnt_clauses: &Arena<LearntClauseId, Vec<Literal>>,
        requirements: &Arena<RequirementId, RequirementInfo>,
    ) -> Self {
        let watched_literals = kind
            .initial_watches(learnt_clauses, requirements)
            .unwrap_or([SolvableId::null(), SolvableId::null()]);

        let clause = Self {
            watched_literals,
            next_watches: [ClauseId::null(), ClauseId::null()],
            kind,
        };

        debug_assert!(!clause.has_watches() || watched_literals[0] != watched_literals[1]);

        clause
    }

    pub(crate) fn debug<'a, D: DependencyProvider>(
        &self,
        provider: &'a D,
        requirements: &'a Arena<RequirementId, RequirementInfo>,
    ) -> ClauseDebug<'a, D> {
        ClauseDebug {
            kind: self.kind,
            provider,
            requirements,
        }
    }

    pub(crate) fn link_to_clause(&mut self, watch_index: usize, linked_clause: ClauseId) {
        self.next_watches[watch_index] = linked_clause;
    }

    pub(crate) fn get_linked_clause(&self, watch_index: usize) -> ClauseId {
        self.next_watches[watch_index]
    }

    fn watch_index(&self, solvable_id: SolvableId) -> usize {
        if self.watched_literals[0] == solvable_id {
            0
        } else {
            debug_assert_eq!(self.watched_literals[1], solvable_id);
            1
        }
    }

    /// Skips `linked_clause` in the watch list of `watched_solvable`.
    pub(crate) fn unlink_clause(
        &mut self,
        linked_clause: &ClauseState,
        watched_solvable: SolvableId,
        linked_clause_watch_index: usize,
    ) {
        let index = self.watch_index(watched_solvable);
        self.next_watches[index] = linked_clause.next_watches[linked_clause_watch_index];
    }

    #[inline]
    pub(crate) fn next_watched_clause(&self, solvable_id: SolvableId) -> ClauseId {
        self.next_watches[self.watch_index(solvable_id)]
    }

    /// If the watch on `solvable_id` has become false, returns the watched literals and the index
    /// of that watch.
    pub(crate) fn watch_turned_false(
        &self,
        solvable_id: SolvableId,
        decision_map: &DecisionMap,
        learnt_clauses: &Arena<LearntClauseId, Vec<Literal>>,
    ) -> Option<([Literal; 2], usize)> {
        let literals = self.watched_literals(learnt_clauses);
        let index = self.watch_index(solvable_id);
        (literals[index].eval(decision_map) == Some(false)).then_some((literals, index))
    }

    pub(crate) fn has_watches(&self) -> bool {
        // If the first watch is not null, the second won't be either
        !self.watched_literals[0].is_null()
    }

    pub(crate) fn watched_literals(
        &self,
        learnt_clauses: &Arena<LearntClauseId, Vec<Literal>>,
    ) -> [Literal; 2] {
        self.watched_literals.map(|watched| match self.kind {
            Clause::Learnt(learnt_id) => learnt_clauses[learnt_id]
                .iter()
                .copied()
                .find(|l| l.solvable_id == watched)
                .unwrap_or(Literal::negative(watched)),
            Clause::Requires(requiring, _) if requiring == watched => Literal::negative(watched),
            Clause::Requires(..) => Literal::positive(watched),
            Clause::InstallRoot => Literal::positive(watched),
            Clause::SelfConflict(..)
            | Clause::ForbidMultipleInstances(..)
            | Clause::Conflicts(..)
            | Clause::Obsoletes(..)
            | Clause::Forbid(..) => Literal::negative(watched),
        })
    }

    /// Finds a solvable to move a watch to: one that is not watched yet and whose literal is
    /// not false.
    pub(crate) fn next_unwatched_variable(
        &self,
        learnt_clauses: &Arena<LearntClauseId, Vec<Literal>>,
        requirements: &Arena<RequirementId, RequirementInfo>,
        decision_map: &DecisionMap,
    ) -> Option<SolvableId> {
        let can_watch = |literal: &Literal| {
            !self.watched_literals.contains(&literal.solvable_id)
                && literal.eval(decision_map) != Some(false)
        };

        match self.kind {
            Clause::Learnt(learnt_id) => learnt_clauses[learnt_id]
                .iter()
                .copied()
                .find(|l| can_watch(l))
                .map(|l| l.solvable_id),
            Clause::Requires(solvable_id, requirement) => {
                std::iter::once(Literal::negative(solvable_id))
                    .chain(
                        requirements[requirement]
                            .candidates
                            .iter()
                            .map(|&candidate| Literal::positive(candidate)),
                    )
                    .find(can_watch)
                    .map(|l| l.solvable_id)
            }
            Clause::InstallRoot
            | Clause::SelfConflict(..)
            | Clause::ForbidMultipleInstances(..)
            | Clause::Conflicts(..)
            | Clause::Obsoletes(..)
            | Clause::Forbid(..) => None,
        }
    }
}

/// A solvable or its negation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) struct Literal {
    pub(crate) solvable_id: SolvableId,
    pub(crate) negate: bool,
}

impl Literal {
    pub(crate) fn positive(solvable_id: SolvableId) -> Self {
        Self {
            solvable_id,
            negate: false,
        }
    }

    pub(crate) fn negative(solvable_id: SolvableId) -> Self {
        Self {
            solvable_id,
            negate: true,
        }
    }

    /// The value of the solvable that makes this literal true.
    pub(crate) fn satisfying_value(self) -> bool {
        !self.negate
    }

    /// `None` while the solvable is unassigned.
    pub(crate) fn eval(self, decision_map: &DecisionMap) -> Option<bool> {
        decision_map
            .value(self.solvable_id)
            .map(|value| value != self.negate)
    }
}

/// A representation of a clause that implements [`Debug`]
pub(crate) struct ClauseDebug<'a, D: DependencyProvider> {
    kind: Clause,
    provider: &'a D,
    requirements: &'a Arena<RequirementId, RequirementInfo>,
}

impl<D: DependencyProvider> Debug for ClauseDebug<'_, D> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let solvable = |id: SolvableId| {
            if id.is_root() {
                String::from("<root>")
            } else {
                self.provider.display_solvable(id)
            }
        };
        match self.kind {
            Clause::InstallRoot => write!(f, "install root"),
            Clause::Learnt(learnt_id) => write!(f, "learnt clause {learnt_id:?}"),
            Clause::Requires(solvable_id, requirement) => {
                match self.requirements[requirement].origin {
                    RequirementOrigin::Job(job) => write!(f, "job {} requires a candidate", job.index()),
                    RequirementOrigin::Dependency(dependency) => write!(
                        f,
                        "{} requires {}",
                        solvable(solvable_id),
                        self.provider.display_dependency(dependency)
                    ),
                }
            }
            Clause::Conflicts(s1, s2, dependency) => write!(
                f,
                "{} conflicts with {} by {}",
                solvable(s1),
                solvable(s2),
                self.provider.display_dependency(dependency)
            ),
            Clause::Obsoletes(s1, s2, dependency) => write!(
                f,
                "{} obsoletes {} by {}",
                solvable(s1),
                solvable(s2),
                self.provider.display_dependency(dependency)
            ),
            Clause::Forbid(s, job) => write!(f, "job {} forbids {}", job.index(), solvable(s)),
            Clause::SelfConflict(s, dependency) => write!(
                f,
                "{} conflicts with itself by {}",
                solvable(s),
                self.provider.display_dependency(dependency)
            ),
            Clause::ForbidMultipleInstances(s1, s2) => {
                write!(f, "only one of {} and {} allowed", solvable(s1), solvable(s2))
            }
        }
    }
}
