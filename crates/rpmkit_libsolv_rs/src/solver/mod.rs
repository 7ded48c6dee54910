use crate::{
    arena::{Arena, ArenaId},
    id::{ClauseId, JobId, LearntClauseId, NameId, RequirementId, SolvableId},
    problem::{Problem, ProblemClause},
    solve_jobs::{JobKind, SolveJobs},
    DependencyProvider,
};

use itertools::Itertools;
use std::collections::{BTreeMap, HashSet};

use clause::{Clause, ClauseState, Literal, RequirementInfo, RequirementOrigin};
use assignment::{Decision, DecisionTracker};
use watch_map::WatchMap;

mod assignment;
pub(crate) mod clause;
mod watch_map;

/// The result of a successful [`Solver::solve`] call.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Solution {
    /// The solvables that are installed in the solution, in ascending order.
    pub installed: Vec<SolvableId>,

    /// The weak jobs that had to be dropped to find the solution, in the order they were dropped.
    pub disabled_jobs: Vec<JobId>,
}

/// Drives the SAT solving process
pub struct Solver<D: DependencyProvider> {
    provider: D,

    clauses: Arena<ClauseId, ClauseState>,
    watches: WatchMap,

    learnt_clauses: Arena<LearntClauseId, Vec<Literal>>,
    learnt_why: Arena<LearntClauseId, Vec<ClauseId>>,
    learnt_clause_ids: Vec<ClauseId>,

    /// The candidates of every requires clause.
    requirements: Arena<RequirementId, RequirementInfo>,

    decision_tracker: DecisionTracker,
}

impl<D: DependencyProvider> Solver<D> {
    /// Create a solver, using the provided dependency provider
    pub fn new(provider: D) -> Self {
        Self {
            provider,
            clauses: Arena::new(),
            watches: WatchMap::new(0),
            learnt_clauses: Arena::new(),
            learnt_why: Arena::new(),
            learnt_clause_ids: Vec::new(),
            requirements: Arena::new(),
            decision_tracker: DecisionTracker::new(0),
        }
    }

    /// Returns a reference to the provider used by the solver
    pub fn provider(&self) -> &D {
        &self.provider
    }

    /// Consumes the solver and returns its provider.
    pub fn into_provider(self) -> D {
        self.provider
    }

    /// Solves the provided `jobs` and returns the solvables that make up the solution
    ///
    /// Weak jobs that take part in an unsatisfiable conflict are dropped one at a time, the most
    /// recently added one first, after which solving starts over. Returns a [`Problem`] if the
    /// conflict does not involve any weak job.
    pub fn solve(&mut self, jobs: &SolveJobs) -> Result<Solution, Problem> {
        let mut disabled_jobs = Vec::new();
        loop {
            match self.solve_with_disabled(jobs, &disabled_jobs) {
                Ok(installed) => {
                    return Ok(Solution {
                        installed,
                        disabled_jobs,
                    })
                }
                Err(core) => {
                    let weak_job = core
                        .iter()
                        .filter_map(|&clause_id| self.clause_job(clause_id))
                        .filter(|&job| jobs.get(job).weak && !disabled_jobs.contains(&job))
                        .max();

                    let Some(job) = weak_job else {
                        return Err(self.build_problem(&core));
                    };

                    tracing::info!("=== Disabling weak job {} and starting over", job.index());
                    disabled_jobs.push(job);
                }
            }
        }
    }

    fn solve_with_disabled(
        &mut self,
        jobs: &SolveJobs,
        disabled_jobs: &[JobId],
    ) -> Result<Vec<SolvableId>, Vec<ClauseId>> {
        // Clear state
        let solvable_count = self.provider.solvable_count() + 1;
        self.decision_tracker = DecisionTracker::new(solvable_count);
        self.watches = WatchMap::new(solvable_count);
        self.learnt_clauses.clear();
        self.learnt_why.clear();
        self.learnt_clause_ids.clear();
        self.requirements.clear();
        self.clauses.clear();

        // The first clause will always be the install root clause. Here we verify that this is
        // indeed the case.
        let root_clause = self.alloc_clause(Clause::InstallRoot);
        assert_eq!(root_clause, ClauseId::install_root());

        // Create clauses for the jobs, the dependencies of their candidates, and so forth
        self.add_clauses_for_jobs(jobs, disabled_jobs);

        // Create watches chains
        self.make_watches();

        // Run SAT
        self.run_sat()?;

        Ok(self
            .decision_tracker
            .stack()
            .filter(|d| d.value && !d.solvable_id.is_root())
            .map(|d| d.solvable_id)
            .sorted()
            .collect())
    }

    fn alloc_clause(&mut self, kind: Clause) -> ClauseId {
        let clause = ClauseState::new(kind, &self.learnt_clauses, &self.requirements);
        self.clauses.alloc(clause)
    }

    fn display_solvable(&self, solvable: SolvableId) -> String {
        if solvable.is_root() {
            String::from("<root>")
        } else {
            self.provider.display_solvable(solvable)
        }
    }

    /// Adds clauses for the jobs, the dependencies of the candidates of install jobs, their
    /// dependencies, and so forth
    ///
    /// This function makes sure we only generate clauses for the solvables involved in the problem,
    /// traversing the graph of requirements and ignoring unrelated packages. The graph is
    /// traversed depth-first.
    fn add_clauses_for_jobs(&mut self, jobs: &SolveJobs, disabled_jobs: &[JobId]) {
        let mut visited = HashSet::new();
        let mut stack = Vec::new();

        for job in jobs.iter().filter(|job| !disabled_jobs.contains(&job.id)) {
            match &job.kind {
                JobKind::Install(candidates) => {
                    let requirement = self.requirements.alloc(RequirementInfo {
                        candidates: candidates.iter().copied().unique().collect(),
                        origin: RequirementOrigin::Job(job.id),
                    });
                    self.alloc_clause(Clause::Requires(SolvableId::root(), requirement));
                    for &candidate in candidates.iter().rev() {
                        if visited.insert(candidate) {
                            stack.push(candidate);
                        }
                    }
                }
                JobKind::Erase(solvables) => {
                    for &solvable in solvables.iter().unique() {
                        self.alloc_clause(Clause::Forbid(solvable, job.id));
                    }
                }
            }
        }

        let mut names: BTreeMap<NameId, Vec<SolvableId>> = BTreeMap::new();
        while let Some(solvable_id) = stack.pop() {
            if !self.provider.allows_multiple_instances(solvable_id) {
                names
                    .entry(self.provider.solvable_name(solvable_id))
                    .or_default()
                    .push(solvable_id);
            }

            let dependencies = self.provider.get_dependencies(solvable_id);

            // Iterate over all the requirements and create clauses.
            for requirement in dependencies.requires {
                // A requirement that the solvable satisfies itself is always true
                if requirement.candidates.contains(&solvable_id) {
                    continue;
                }

                for &candidate in requirement.candidates.iter().rev() {
                    if visited.insert(candidate) {
                        stack.push(candidate);
                    }
                }

                let requirement_id = self.requirements.alloc(RequirementInfo {
                    candidates: requirement.candidates.into_iter().unique().collect(),
                    origin: RequirementOrigin::Dependency(requirement.dependency),
                });
                self.alloc_clause(Clause::Requires(solvable_id, requirement_id));
            }

            for conflict in dependencies.conflicts {
                for candidate in conflict.candidates.into_iter().unique() {
                    if candidate == solvable_id {
                        self.alloc_clause(Clause::SelfConflict(solvable_id, conflict.dependency));
                    } else {
                        self.alloc_clause(Clause::Conflicts(
                            solvable_id,
                            candidate,
                            conflict.dependency,
                        ));
                    }
                }
            }

            for obsolete in dependencies.obsoletes {
                for candidate in obsolete.candidates.into_iter().unique() {
                    if candidate != solvable_id {
                        self.alloc_clause(Clause::Obsoletes(
                            solvable_id,
                            candidate,
                            obsolete.dependency,
                        ));
                    }
                }
            }
        }

        // Add clauses ensuring only a single candidate per package name is installed
        for solvables in names.into_values() {
            for (a, b) in solvables.into_iter().sorted().tuple_combinations() {
                self.alloc_clause(Clause::ForbidMultipleInstances(a, b));
            }
        }
    }

    /// Conflict-driven clause learning over the generated clauses.
    ///
    /// Level 1 holds the root and every assertion. Each further level starts by installing the
    /// preferred undecided candidate of an unsatisfied requirement (see
    /// [`Solver::resolve_dependencies`]) and then propagates its consequences. A conflict above
    /// level 1 is analyzed into a learnt clause and the solver backjumps. A conflict at level 1
    /// makes the jobs unsatisfiable.
    fn run_sat(&mut self) -> Result<(), Vec<ClauseId>> {
        assert!(self.decision_tracker.is_empty());

        let level = 1;
        self.decision_tracker
            .try_add_decision(
                Decision::new(SolvableId::root(), true, ClauseId::install_root()),
                level,
            )
            .expect("bug: solvable was already decided!");

        self.decide_assertions(level)
            .map_err(|cause| self.analyze_unsolvable(cause))?;
        self.propagate(level)
            .map_err(|(_, _, cause)| self.analyze_unsolvable(cause))?;
        self.resolve_dependencies(level).map(drop)
    }

    /// Decides the clauses with a single literal: requirements without candidates (`¬A`, or
    /// `¬root` for a job, which conflicts immediately) and self conflicts.
    fn decide_assertions(&mut self, level: u32) -> Result<(), ClauseId> {
        tracing::info!("=== Deciding assertions");

        for clause_id in (0..self.clauses.len()).map(ClauseId::from_usize) {
            let clause = &self.clauses[clause_id];
            let solvable_id = match clause.kind {
                Clause::Requires(solvable_id, _) if !clause.has_watches() => solvable_id,
                Clause::SelfConflict(solvable_id, _) => solvable_id,
                _ => continue,
            };

            let decided = self
                .decision_tracker
                .try_add_decision(Decision::new(solvable_id, false, clause_id), level)
                .map_err(|_| clause_id)?;

            if decided {
                tracing::info!("Set {} = false", self.display_solvable(solvable_id));
            }
        }

        Ok(())
    }

    /// Keeps installing candidates until every requirement of an installed solvable is met.
    fn resolve_dependencies(&mut self, mut level: u32) -> Result<u32, Vec<ClauseId>> {
        while let Some((clause_id, required_by, candidate)) = self.next_choice() {
            level = self.set_propagate_learn(level, candidate, required_by, clause_id)?;
        }
        Ok(level)
    }

    /// The first requires clause, in clause order, whose solvable is installed while none of its
    /// candidates is. Returns the clause, its solvable and the first undecided candidate.
    fn next_choice(&self) -> Option<(ClauseId, SolvableId, SolvableId)> {
        let decisions = &self.decision_tracker;
        self.clauses.iter().find_map(|(clause_id, clause)| {
            let Clause::Requires(solvable_id, requirement) = clause.kind else {
                return None;
            };
            if decisions.assigned_value(solvable_id) != Some(true) {
                return None;
            }

            let candidates = &self.requirements[requirement].candidates;
            if candidates
                .iter()
                .any(|&c| decisions.assigned_value(c) == Some(true))
            {
                return None;
            }

            candidates
                .iter()
                .copied()
                .find(|&c| decisions.assigned_value(c).is_none())
                .map(|candidate| (clause_id, solvable_id, candidate))
        })
    }

    /// Installs `solvable` on a new level to satisfy the requires clause `clause_id` of
    /// `required_by`, then propagates and learns until no conflict remains.
    ///
    /// Returns the level the solver ends up on, or the conflict core when the jobs are
    /// unsatisfiable.
    fn set_propagate_learn(
        &mut self,
        mut level: u32,
        solvable: SolvableId,
        required_by: SolvableId,
        clause_id: ClauseId,
    ) -> Result<u32, Vec<ClauseId>> {
        level += 1;

        tracing::info!(
            "╤══ Install {} at level {level} (required by {})",
            self.display_solvable(solvable),
            self.display_solvable(required_by),
        );

        self.decision_tracker
            .try_add_decision(Decision::new(solvable, true, clause_id), level)
            .expect("bug: solvable was already decided!");

        loop {
            let Err((conflicting_solvable, attempted_value, conflicting_clause)) =
                self.propagate(level)
            else {
                tracing::info!("╘══ Propagation succeeded");
                break;
            };

            tracing::info!(
                "├─ Propagation conflicted: could not set {} to {attempted_value}",
                self.display_solvable(conflicting_solvable)
            );
            tracing::info!(
                "│  During unit propagation for clause: {:?}",
                self.clauses[conflicting_clause].debug(&self.provider, &self.requirements)
            );

            if level == 1 {
                tracing::info!("╘══ UNSOLVABLE");
                return Err(self.analyze_unsolvable(conflicting_clause));
            }

            let (new_level, learned_clause_id, literal) =
                self.analyze(level, conflicting_solvable, conflicting_clause);
            level = new_level;

            tracing::info!("├─ Backtracked to level {level}");

            // The learnt clause is unit on the new level
            let decision = literal.satisfying_value();
            self.decision_tracker
                .try_add_decision(
                    Decision::new(literal.solvable_id, decision, learned_clause_id),
                    level,
                )
                .expect("bug: solvable was already decided!");
            tracing::info!(
                "├─ Propagate after learn: {} = {decision}",
                self.display_solvable(literal.solvable_id)
            );
        }

        Ok(level)
    }

    /// Unit propagation with two watched literals per clause.
    ///
    /// For every decision not yet propagated, walks the clauses watching its solvable. A clause
    /// whose watch became false moves the watch to another literal that is not false, or else
    /// forces its other watched literal. Returns the solvable, value and clause of the first
    /// assignment that contradicts an earlier one.
    fn propagate(&mut self, level: u32) -> Result<(), (SolvableId, bool, ClauseId)> {
        // Learnt clauses with a single literal have no watches
        for &clause_id in self.learnt_clause_ids.iter() {
            let Clause::Learnt(learnt_index) = self.clauses[clause_id].kind else {
                continue;
            };

            let &[literal] = self.learnt_clauses[learnt_index].as_slice() else {
                continue;
            };
            let decision = literal.satisfying_value();

            let decided = self
                .decision_tracker
                .try_add_decision(
                    Decision::new(literal.solvable_id, decision, clause_id),
                    level,
                )
                .map_err(|_| (literal.solvable_id, decision, clause_id))?;

            if decided {
                tracing::info!(
                    "├─ Propagate assertion {} = {}",
                    self.display_solvable(literal.solvable_id),
                    decision
                );
            }
        }

        // Watched solvables
        while let Some(decision) = self.decision_tracker.next_unpropagated() {
            let pkg = decision.solvable_id;

            let mut old_predecessor_clause_id: Option<ClauseId>;
            let mut predecessor_clause_id: Option<ClauseId> = None;
            let mut clause_id = self.watches.first_clause_watching_solvable(pkg);
            while !clause_id.is_null() {
                debug_assert!(
                    predecessor_clause_id != Some(clause_id),
                    "Linked list is circular!"
                );

                let (predecessor_clause, clause) =
                    if let Some(prev_clause_id) = predecessor_clause_id {
                        let (predecessor_clause, clause) =
                            self.clauses.get_two_mut(prev_clause_id, clause_id);
                        (Some(predecessor_clause), clause)
                    } else {
                        (None, &mut self.clauses[clause_id])
                    };

                old_predecessor_clause_id = predecessor_clause_id;
                predecessor_clause_id = Some(clause_id);

                let this_clause_id = clause_id;
                clause_id = clause.next_watched_clause(pkg);

                let Some((watched_literals, watch_index)) = clause.watch_turned_false(
                    pkg,
                    self.decision_tracker.map(),
                    &self.learnt_clauses,
                ) else {
                    continue;
                };

                if let Some(variable) = clause.next_unwatched_variable(
                    &self.learnt_clauses,
                    &self.requirements,
                    self.decision_tracker.map(),
                ) {
                    debug_assert!(!clause.watched_literals.contains(&variable));

                    self.watches.update_watched(
                        predecessor_clause,
                        clause,
                        this_clause_id,
                        watch_index,
                        pkg,
                        variable,
                    );

                    // The clause left this list, so its predecessor stays the predecessor
                    predecessor_clause_id = old_predecessor_clause_id;
                } else {
                    // Unit clause
                    let remaining_watch = watched_literals[1 - watch_index];
                    let value = remaining_watch.satisfying_value();
                    let decided = self
                        .decision_tracker
                        .try_add_decision(
                            Decision::new(remaining_watch.solvable_id, value, this_clause_id),
                            level,
                        )
                        .map_err(|_| (remaining_watch.solvable_id, value, this_clause_id))?;

                    if decided && !matches!(clause.kind, Clause::ForbidMultipleInstances(..)) {
                        tracing::info!(
                            "├─ Propagate {} = {}. {:?}",
                            self.display_solvable(remaining_watch.solvable_id),
                            value,
                            self.clauses[this_clause_id].debug(&self.provider, &self.requirements),
                        );
                    }
                }
            }
        }

        Ok(())
    }

    /// Collects the clauses that take part in an unrecoverable conflict, starting from the clause
    /// that triggered it
    ///
    /// Walks the decision log backwards and adds the clause that caused each decision involved in
    /// the conflict. Decisions made later can only depend on earlier ones, so a single pass is
    /// enough.
    fn analyze_unsolvable(&self, clause_id: ClauseId) -> Vec<ClauseId> {
        tracing::info!("=== ANALYZE UNSOLVABLE");

        let mut core = Vec::new();
        let mut seen = HashSet::new();
        let mut involved = HashSet::new();
        self.add_to_core(clause_id, &mut core, &mut seen, &mut involved);

        for decision in self.decision_tracker.stack().rev() {
            if decision.solvable_id.is_root() || !involved.contains(&decision.solvable_id) {
                continue;
            }

            self.add_to_core(decision.derived_from, &mut core, &mut seen, &mut involved);
        }

        core
    }

    /// Adds the clause with `clause_id` to the conflict core and marks its solvables as involved
    ///
    /// Because learnt clauses are not relevant for the user, they are not added to the core.
    /// Instead, we add the clauses that caused them.
    fn add_to_core(
        &self,
        clause_id: ClauseId,
        core: &mut Vec<ClauseId>,
        seen: &mut HashSet<ClauseId>,
        involved: &mut HashSet<SolvableId>,
    ) {
        if !seen.insert(clause_id) {
            return;
        }

        let kind = self.clauses[clause_id].kind;
        kind.visit_literals(&self.learnt_clauses, &self.requirements, |literal| {
            involved.insert(literal.solvable_id);
        });

        match kind {
            Clause::Learnt(learnt_clause_id) => {
                for &cause in &self.learnt_why[learnt_clause_id] {
                    self.add_to_core(cause, core, seen, involved);
                }
            }
            _ => core.push(clause_id),
        }
    }

    /// First-UIP conflict analysis.
    ///
    /// Resolves the conflicting clause against the reasons of the decisions on the current level
    /// until a single literal of that level remains, and records the result as a learnt clause.
    /// Returns the level to backjump to, the learnt clause and its one literal that is not false
    /// after the backjump.
    fn analyze(
        &mut self,
        mut current_level: u32,
        mut conflicting_solvable: SolvableId,
        mut clause_id: ClauseId,
    ) -> (u32, ClauseId, Literal) {
        let mut seen = HashSet::new();
        let mut causes_at_current_level = 0u32;
        let mut learnt = Vec::new();
        let mut back_track_to = 0;

        let mut s_value;
        let mut learnt_why = Vec::new();
        let mut first_iteration = true;
        loop {
            learnt_why.push(clause_id);

            self.clauses[clause_id].kind.visit_literals(
                &self.learnt_clauses,
                &self.requirements,
                |literal| {
                    if (!first_iteration && literal.solvable_id == conflicting_solvable)
                        || !seen.insert(literal.solvable_id)
                    {
                        return;
                    }

                    let decision_level = self.decision_tracker.level(literal.solvable_id);
                    if decision_level == current_level {
                        causes_at_current_level += 1;
                    } else if decision_level > 1 {
                        let assigned = self.decision_tracker.assigned_value(literal.solvable_id);
                        learnt.push(if assigned == Some(true) {
                            Literal::negative(literal.solvable_id)
                        } else {
                            Literal::positive(literal.solvable_id)
                        });
                        back_track_to = back_track_to.max(decision_level);
                    }
                },
            );

            first_iteration = false;

            // Walk back to the most recent decision that took part in the conflict
            loop {
                let (last_decision, last_decision_level) = self
                    .decision_tracker
                    .undo_last()
                    .expect("bug: ran out of decisions while analyzing a conflict");

                conflicting_solvable = last_decision.solvable_id;
                s_value = last_decision.value;
                clause_id = last_decision.derived_from;

                current_level = last_decision_level;
                if seen.contains(&last_decision.solvable_id) {
                    break;
                }
            }

            causes_at_current_level = causes_at_current_level.saturating_sub(1);
            if causes_at_current_level == 0 {
                break;
            }
        }

        let last_literal = Literal {
            solvable_id: conflicting_solvable,
            negate: s_value,
        };
        learnt.push(last_literal);

        let learnt_id = self.learnt_clauses.alloc(learnt.clone());
        self.learnt_why.alloc(learnt_why);

        let clause_id = self.alloc_clause(Clause::Learnt(learnt_id));
        self.learnt_clause_ids.push(clause_id);

        let clause = &mut self.clauses[clause_id];
        if clause.has_watches() {
            self.watches.start_watching(clause, clause_id);
        }

        tracing::info!("├─ Learnt disjunction:");
        for lit in learnt {
            tracing::info!(
                "│  - {}{}",
                if lit.negate { "NOT " } else { "" },
                self.display_solvable(lit.solvable_id)
            );
        }

        let target_level = back_track_to.max(1);
        self.decision_tracker.undo_until(target_level);

        (target_level, clause_id, last_literal)
    }

    fn make_watches(&mut self) {
        for (clause_id, clause) in self.clauses.iter_mut() {
            if clause.has_watches() {
                self.watches.start_watching(clause, clause_id);
            }
        }
    }

    /// Returns the job a clause was created for.
    fn clause_job(&self, clause_id: ClauseId) -> Option<JobId> {
        match self.clauses[clause_id].kind {
            Clause::Requires(_, requirement) => match self.requirements[requirement].origin {
                RequirementOrigin::Job(job) => Some(job),
                RequirementOrigin::Dependency(_) => None,
            },
            Clause::Forbid(_, job) => Some(job),
            _ => None,
        }
    }

    fn build_problem(&self, core: &[ClauseId]) -> Problem {
        let mut problem = Problem::default();
        for &clause_id in core {
            let clause = match self.clauses[clause_id].kind {
                Clause::InstallRoot | Clause::Learnt(_) => continue,
                Clause::Requires(solvable, requirement) => {
                    let info = &self.requirements[requirement];
                    match info.origin {
                        RequirementOrigin::Job(job) => ProblemClause::JobRequires {
                            job,
                            candidates: info.candidates.clone(),
                        },
                        RequirementOrigin::Dependency(dependency) => ProblemClause::Requires {
                            solvable,
                            dependency,
                            candidates: info.candidates.clone(),
                        },
                    }
                }
                Clause::ForbidMultipleInstances(solvable, other) => {
                    ProblemClause::SameName { solvable, other }
                }
                Clause::Conflicts(solvable, other, dependency) => ProblemClause::Conflicts {
                    solvable,
                    other,
                    dependency,
                },
                Clause::Obsoletes(solvable, other, dependency) => ProblemClause::Obsoletes {
                    solvable,
                    other,
                    dependency,
                },
                Clause::Forbid(solvable, job) => ProblemClause::JobForbids { job, solvable },
                Clause::SelfConflict(solvable, dependency) => ProblemClause::SelfConflict {
                    solvable,
                    dependency,
                },
            };
            problem.add_clause(clause);
        }
        problem
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{Dependencies, DependencyId, Requirement};
    use indexmap::IndexSet;

    // A tiny packaging system for tests: a package is a name and an integer version, a spec is a
    // name and an optional half-open version range like `b 1..3`. A single number `b 2` means
    // exactly that version.
    #[derive(Default)]
    struct TestPackage {
        name: String,
        version: u32,
        requires: Vec<DependencyId>,
        conflicts: Vec<DependencyId>,
        obsoletes: Vec<DependencyId>,
    }

    #[derive(Default)]
    struct TestProvider {
        packages: Vec<TestPackage>,
        names: IndexSet<String>,
        specs: Vec<(String, Option<(u32, u32)>)>,
        multiple_instances: Vec<String>,
    }

    impl TestProvider {
        fn from_packages(packages: &[(&str, u32, Vec<&str>)]) -> Self {
            let mut provider = Self::default();
            for (name, version, requires) in packages {
                provider.add_package(name, *version, requires, &[], &[]);
            }
            provider
        }

        fn spec(&mut self, spec: &str) -> DependencyId {
            let mut split = spec.split(' ');
            let name = split.next().unwrap().to_owned();
            let range = split.next().map(|range| match range.split_once("..") {
                Some((start, end)) => (start.parse().unwrap(), end.parse().unwrap()),
                None => {
                    let version: u32 = range.parse().unwrap();
                    (version, version + 1)
                }
            });
            self.specs.push((name, range));
            DependencyId::new(self.specs.len() as u32 - 1)
        }

        fn add_package(
            &mut self,
            name: &str,
            version: u32,
            requires: &[&str],
            conflicts: &[&str],
            obsoletes: &[&str],
        ) -> SolvableId {
            self.names.insert(name.to_owned());
            let package = TestPackage {
                name: name.to_owned(),
                version,
                requires: requires.iter().map(|s| self.spec(s)).collect(),
                conflicts: conflicts.iter().map(|s| self.spec(s)).collect(),
                obsoletes: obsoletes.iter().map(|s| self.spec(s)).collect(),
            };
            self.packages.push(package);
            SolvableId::new(self.packages.len() as u32)
        }

        fn package(&self, solvable: SolvableId) -> &TestPackage {
            &self.packages[solvable.index() as usize - 1]
        }

        /// All packages matching the spec, highest version first.
        fn candidates(&self, dependency: DependencyId) -> Vec<SolvableId> {
            let (name, range) = &self.specs[dependency.index() as usize];
            (1..=self.packages.len() as u32)
                .map(SolvableId::new)
                .filter(|&s| {
                    let package = self.package(s);
                    &package.name == name
                        && range.map_or(true, |(start, end)| {
                            package.version >= start && package.version < end
                        })
                })
                .sorted_by_key(|&s| std::cmp::Reverse(self.package(s).version))
                .collect()
        }

        fn jobs(&mut self, install: &[&str]) -> SolveJobs {
            let mut jobs = SolveJobs::default();
            for spec in install {
                let dependency = self.spec(spec);
                jobs.install(self.candidates(dependency));
            }
            jobs
        }

        fn requirements(&self, dependencies: &[DependencyId]) -> Vec<Requirement> {
            dependencies
                .iter()
                .map(|&dependency| Requirement {
                    dependency,
                    candidates: self.candidates(dependency),
                })
                .collect()
        }
    }

    impl DependencyProvider for TestProvider {
        fn solvable_count(&self) -> usize {
            self.packages.len()
        }

        fn solvable_name(&self, solvable: SolvableId) -> NameId {
            let index = self.names.get_index_of(&self.package(solvable).name).unwrap();
            NameId::new(index as u32)
        }

        fn allows_multiple_instances(&self, solvable: SolvableId) -> bool {
            self.multiple_instances
                .contains(&self.package(solvable).name)
        }

        fn get_dependencies(&self, solvable: SolvableId) -> Dependencies {
            let package = self.package(solvable);
            Dependencies {
                requires: self.requirements(&package.requires),
                conflicts: self.requirements(&package.conflicts),
                obsoletes: self.requirements(&package.obsoletes),
            }
        }

        fn display_solvable(&self, solvable: SolvableId) -> String {
            let package = self.package(solvable);
            format!("{}={}", package.name, package.version)
        }

        fn display_dependency(&self, dependency: DependencyId) -> String {
            let (name, range) = &self.specs[dependency.index() as usize];
            match range {
                Some((start, end)) if *end == start + 1 => format!("{name} {start}"),
                Some((start, end)) => format!("{name} {start}..{end}"),
                None => name.clone(),
            }
        }
    }

    fn solution_to_string(solver: &Solver<TestProvider>, solution: &Solution) -> String {
        solution
            .installed
            .iter()
            .map(|&s| solver.provider().display_solvable(s))
            .join("\n")
    }

    /// Test whether we can select a version, this is the most basic operation
    #[test]
    fn test_unit_propagation_1() {
        let mut provider = TestProvider::from_packages(&[("asdf", 1, vec![])]);
        let jobs = provider.jobs(&["asdf"]);
        let mut solver = Solver::new(provider);
        let solution = solver.solve(&jobs).unwrap();

        assert_eq!(solution_to_string(&solver, &solution), "asdf=1");
        assert!(solution.disabled_jobs.is_empty());
    }

    /// Test if we can also select a nested version
    #[test]
    fn test_unit_propagation_nested() {
        let mut provider = TestProvider::from_packages(&[
            ("asdf", 1, vec!["efgh"]),
            ("efgh", 4, vec![]),
            ("dummy", 6, vec![]),
        ]);
        let jobs = provider.jobs(&["asdf"]);
        let mut solver = Solver::new(provider);
        let solution = solver.solve(&jobs).unwrap();

        insta::assert_snapshot!(solution_to_string(&solver, &solution), @r###"
        asdf=1
        efgh=4
        "###);
    }

    /// Test if we can resolve multiple versions at once
    #[test]
    fn test_resolve_multiple() {
        let mut provider = TestProvider::from_packages(&[
            ("asdf", 1, vec![]),
            ("asdf", 2, vec![]),
            ("efgh", 4, vec![]),
            ("efgh", 5, vec![]),
        ]);
        let jobs = provider.jobs(&["asdf", "efgh 4..5"]);
        let mut solver = Solver::new(provider);
        let solution = solver.solve(&jobs).unwrap();

        insta::assert_snapshot!(solution_to_string(&solver, &solution), @r###"
        asdf=2
        efgh=4
        "###);
    }

    /// Picking `y=2` pulls in two packages that conflict with each other, which is only found out
    /// after the choice was made, so the solver has to learn and backtrack
    #[test]
    #[tracing_test::traced_test]
    fn test_resolve_with_backtracking() {
        let mut provider = TestProvider::default();
        provider.add_package("y", 2, &["p", "q"], &[], &[]);
        provider.add_package("y", 1, &[], &[], &[]);
        provider.add_package("p", 1, &[], &["q"], &[]);
        provider.add_package("q", 1, &[], &[], &[]);
        let jobs = provider.jobs(&["y"]);
        let mut solver = Solver::new(provider);
        let solution = solver.solve(&jobs).unwrap();

        assert_eq!(solution_to_string(&solver, &solution), "y=1");
        assert!(solution.disabled_jobs.is_empty());
        assert!(logs_contain("Learnt disjunction"));
    }

    #[test]
    fn test_unsat_missing_dependency() {
        let mut provider = TestProvider::from_packages(&[("a", 1, vec!["b 2"]), ("b", 1, vec![])]);
        let jobs = provider.jobs(&["a"]);
        let mut solver = Solver::new(provider);
        let problem = solver.solve(&jobs).unwrap_err();

        let mut lines = problem
            .display(solver.provider())
            .to_string()
            .lines()
            .map(str::to_owned)
            .collect::<Vec<_>>();
        lines.sort();
        assert_eq!(
            lines,
            vec![
                "job 0 requires one of a=1".to_owned(),
                "nothing provides b 2 needed by a=1".to_owned(),
            ]
        );
        let job = jobs.iter().next().unwrap().id;
        assert_eq!(problem.jobs().collect::<Vec<_>>(), vec![job]);
    }

    #[test]
    fn test_unsat_job_without_candidates() {
        let mut provider = TestProvider::from_packages(&[("a", 1, vec![])]);
        let jobs = provider.jobs(&["missing"]);
        let mut solver = Solver::new(provider);
        let problem = solver.solve(&jobs).unwrap_err();

        insta::assert_snapshot!(problem.display(solver.provider()).to_string(), @"job 0 has no candidates");
    }

    #[test]
    fn test_unsat_conflict() {
        let mut provider = TestProvider::default();
        provider.add_package("a", 1, &[], &["b"], &[]);
        provider.add_package("b", 1, &[], &[], &[]);
        let jobs = provider.jobs(&["a", "b"]);
        let mut solver = Solver::new(provider);
        let problem = solver.solve(&jobs).unwrap_err();

        assert!(problem
            .clauses()
            .iter()
            .any(|clause| matches!(clause, ProblemClause::Conflicts { .. })));
        assert_eq!(problem.jobs().count(), 2);
    }

    #[test]
    fn test_weak_job_is_disabled() {
        let mut provider = TestProvider::default();
        provider.add_package("a", 1, &[], &["b"], &[]);
        provider.add_package("b", 1, &[], &[], &[]);

        let mut jobs = SolveJobs::default();
        let a = provider.spec("a");
        let b = provider.spec("b");
        jobs.install(provider.candidates(a));
        let weak = jobs.push(JobKind::Install(provider.candidates(b)), true);

        let mut solver = Solver::new(provider);
        let solution = solver.solve(&jobs).unwrap();
        assert_eq!(solution_to_string(&solver, &solution), "a=1");
        assert_eq!(solution.disabled_jobs, vec![weak]);
    }

    #[test]
    fn test_erase_job() {
        let mut provider = TestProvider::from_packages(&[
            ("a", 1, vec![]),
            ("a", 2, vec![]),
            ("c", 1, vec!["a"]),
        ]);
        let a2 = SolvableId::new(2);
        let mut jobs = provider.jobs(&["c"]);
        jobs.erase(vec![a2]);

        let mut solver = Solver::new(provider);
        let solution = solver.solve(&jobs).unwrap();
        insta::assert_snapshot!(solution_to_string(&solver, &solution), @r###"
        a=1
        c=1
        "###);
    }

    #[test]
    fn test_obsoletes_replace_kept_package() {
        let mut provider = TestProvider::default();
        let old = provider.add_package("old", 1, &[], &[], &[]);
        provider.add_package("new", 1, &[], &[], &["old"]);

        let mut jobs = provider.jobs(&["new"]);
        let keep = jobs.push(JobKind::Install(vec![old]), true);

        let mut solver = Solver::new(provider);
        let solution = solver.solve(&jobs).unwrap();
        assert_eq!(solution_to_string(&solver, &solution), "new=1");
        assert_eq!(solution.disabled_jobs, vec![keep]);
    }

    #[test]
    fn test_multiple_instances() {
        let mut provider =
            TestProvider::from_packages(&[("kernel", 1, vec![]), ("kernel", 2, vec![])]);
        provider.multiple_instances.push("kernel".to_owned());
        let mut jobs = SolveJobs::default();
        jobs.install(vec![SolvableId::new(1)]);
        jobs.install(vec![SolvableId::new(2)]);

        let mut solver = Solver::new(provider);
        let solution = solver.solve(&jobs).unwrap();
        insta::assert_snapshot!(solution_to_string(&solver, &solution), @r###"
        kernel=1
        kernel=2
        "###);
    }

    #[test]
    fn test_same_name_problem() {
        let provider = TestProvider::from_packages(&[("a", 1, vec![]), ("a", 2, vec![])]);
        let mut jobs = SolveJobs::default();
        jobs.install(vec![SolvableId::new(1)]);
        jobs.install(vec![SolvableId::new(2)]);

        let mut solver = Solver::new(provider);
        let problem = solver.solve(&jobs).unwrap_err();
        assert!(problem.clauses().contains(&ProblemClause::SameName {
            solvable: SolvableId::new(1),
            other: SolvableId::new(2),
        }));
    }

    #[test]
    fn test_self_conflict() {
        let mut provider = TestProvider::default();
        provider.add_package("a", 1, &[], &["a"], &[]);
        let jobs = provider.jobs(&["a"]);
        let mut solver = Solver::new(provider);
        let problem = solver.solve(&jobs).unwrap_err();

        assert!(problem
            .clauses()
            .iter()
            .any(|clause| matches!(clause, ProblemClause::SelfConflict { .. })));
    }

    #[test]
    fn test_cyclic_dependencies() {
        let mut provider = TestProvider::from_packages(&[
            ("a", 2, vec!["b 0..10"]),
            ("b", 5, vec!["a 2..4"]),
        ]);
        let jobs = provider.jobs(&["a 0..100"]);
        let mut solver = Solver::new(provider);
        let solution = solver.solve(&jobs).unwrap();

        insta::assert_snapshot!(solution_to_string(&solver, &solution), @r###"
        a=2
        b=5
        "###);
    }
}
