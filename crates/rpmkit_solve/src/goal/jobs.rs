//! Translates the jobs of a goal into solver jobs.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
};

use itertools::Itertools;
use rpmkit_libsolv_rs::{JobKind, Problem, ProblemClause, SolveJobs, SolvableId};
use rpmkit_sack::{ExcludeFlags, PackageId, PackageSet, Pool, Query, QueryError};
use rpmkit_types::{compare_evr, QueryCmp};

use super::{GoalAction, GoalJob, JobTarget};
use crate::{
    config::SolverConfig,
    problem::{ProblemEntry, ProblemList, ProblemRule},
    provider::{arch_compatible, package_id, solvable_id, RpmProvider},
    settings::GoalJobSettings,
    transaction::TransactionItemReason,
};

/// Why a solver job exists.
#[derive(Debug, Clone)]
pub(crate) enum JobOrigin {
    /// Keeps an installed package, or one of its replacements, installed.
    Keep(PackageId),
    /// Comes from a job of the goal.
    User(String),
}

/// The solver jobs of a goal and what the goal needs to know to classify the solution.
#[derive(Debug, Default)]
pub(crate) struct Translated {
    pub jobs: SolveJobs,
    /// Indexed by [`rpmkit_libsolv_rs::JobId::index`].
    pub origins: Vec<JobOrigin>,
    /// Problems found before solving.
    pub problems: ProblemList,
    /// Candidates of install jobs.
    pub user_installs: HashSet<PackageId>,
    /// Installed packages the remove jobs asked for.
    pub user_removes: HashSet<PackageId>,
    pub clean_requirements: bool,
    pub reason_changes: Vec<(PackageId, TransactionItemReason)>,
}

struct PendingJob {
    kind: JobKind,
    weak: bool,
    description: String,
}

/// The packages a job matched.
struct Selection {
    packages: Vec<PackageId>,
    /// True if the spec matched as a NEVRA, in which case every matched name is handled on
    /// its own.
    by_name: bool,
}

pub(crate) struct JobBuilder<'a, 'p> {
    pool: &'a Arc<Pool>,
    provider: &'a RpmProvider<'p>,
    config: &'a SolverConfig,
    protected: &'a HashSet<PackageId>,

    pending: Vec<PendingJob>,
    /// Installed packages a job takes care of. They do not get a keep job.
    targeted: HashSet<PackageId>,
    has_remove: bool,
    translated: Translated,
}

impl<'a, 'p> JobBuilder<'a, 'p> {
    pub fn new(
        pool: &'a Arc<Pool>,
        provider: &'a RpmProvider<'p>,
        config: &'a SolverConfig,
        protected: &'a HashSet<PackageId>,
    ) -> Self {
        Self {
            pool,
            provider,
            config,
            protected,
            pending: Vec::new(),
            targeted: HashSet::new(),
            has_remove: false,
            translated: Translated::default(),
        }
    }

    fn is_installed(&self, id: PackageId) -> bool {
        self.pool.is_installed(id)
    }

    fn repo_name(&self, id: PackageId) -> Option<&str> {
        let package = self.pool.package(id)?;
        self.pool.repo(package.repo).map(|repo| repo.name.as_str())
    }

    fn in_repos(&self, id: PackageId, repos: &[String]) -> bool {
        repos.is_empty()
            || self
                .repo_name(id)
                .is_some_and(|name| repos.iter().any(|repo| repo == name))
    }

    fn is_source(&self, id: PackageId) -> bool {
        matches!(&*self.provider.arch(id), "src" | "nosrc")
    }

    /// The installed packages with the given name.
    fn installed_named(&self, name: &str) -> Vec<PackageId> {
        self.pool
            .packages()
            .filter(|&(id, p)| self.is_installed(id) && &*self.pool.str(p.name) == name)
            .map(|(id, _)| id)
            .collect()
    }

    /// The visible available packages with the given name.
    fn available_named(&self, name: &str) -> Vec<PackageId> {
        self.pool
            .packages()
            .filter(|&(id, p)| {
                !self.is_installed(id)
                    && self.provider.is_visible(id)
                    && &*self.pool.str(p.name) == name
            })
            .map(|(id, _)| id)
            .collect()
    }

    fn problem(&mut self, settings: &GoalJobSettings, rule: ProblemRule, detail: String) {
        if settings.strict(self.config) {
            self.translated
                .problems
                .push(vec![ProblemEntry::new(rule, detail)]);
        } else {
            tracing::warn!("{detail}");
        }
    }

    fn push(&mut self, kind: JobKind, settings: &GoalJobSettings, description: String) {
        tracing::debug!("job '{description}': {kind:?}");
        self.pending.push(PendingJob {
            kind,
            weak: !settings.strict(self.config),
            description,
        });
    }

    /// Resolves the spec of a job against the visible and installed packages.
    fn select_spec(
        &self,
        spec: &str,
        settings: &GoalJobSettings,
        flags: ExcludeFlags,
    ) -> Result<Selection, QueryError> {
        let mut query = Query::from_pool(self.pool, flags);
        if !settings.from_repo_ids.is_empty() {
            let repos: Vec<&str> = settings.from_repo_ids.iter().map(String::as_str).collect();
            let mut allowed = Query::from_pool(self.pool, flags);
            allowed.filter_repo_name(QueryCmp::Eq, &repos)?;
            let mut installed = Query::from_pool(self.pool, flags);
            installed.filter_installed()?;
            allowed.union(&installed)?;
            query.filter_pkg(QueryCmp::Eq, &allowed.package_set()?)?;
        }
        let (_, nevra) = query.resolve_pkg_spec(spec, &settings.resolve)?;
        let packages = query.package_set()?.ids().collect();
        Ok(Selection {
            packages,
            by_name: nevra.is_some(),
        })
    }

    /// Returns the packages a job refers to, or records why there are none.
    fn select(&mut self, job: &GoalJob) -> Option<Selection> {
        let spec = match &job.target {
            JobTarget::All => {
                return Some(Selection {
                    packages: self
                        .pool
                        .packages()
                        .map(|(id, _)| id)
                        .filter(|&id| self.is_installed(id))
                        .collect(),
                    by_name: true,
                })
            }
            JobTarget::Packages(packages) => {
                return Some(self.select_packages(packages));
            }
            JobTarget::Spec(spec) => spec,
        };

        let selection = match self.select_spec(spec, &job.settings, ExcludeFlags::APPLY_EXCLUDES) {
            Ok(selection) => selection,
            Err(err) => {
                self.problem(
                    &job.settings,
                    ProblemRule::JobUnsupported,
                    format!("Cannot resolve argument '{spec}': {err}"),
                );
                return None;
            }
        };
        if !selection.packages.is_empty() {
            return Some(selection);
        }

        let excluded = self
            .select_spec(spec, &job.settings, ExcludeFlags::IGNORE_EXCLUDES)
            .is_ok_and(|selection| !selection.packages.is_empty());
        if excluded {
            self.problem(
                &job.settings,
                ProblemRule::JobUnknownPackage,
                format!("All matches were filtered out by exclude filtering for argument: {spec}"),
            );
        } else {
            self.problem(
                &job.settings,
                ProblemRule::JobNothingProvides,
                format!("No match for argument: {spec}"),
            );
        }
        None
    }

    fn select_packages(&self, packages: &PackageSet) -> Selection {
        Selection {
            packages: packages
                .ids()
                .filter(|&id| self.provider.is_visible(id))
                .collect(),
            by_name: true,
        }
    }

    /// Splits packages into groups that are handled by one solver job each.
    fn groups(&self, selection: &Selection) -> Vec<Vec<PackageId>> {
        if selection.by_name {
            let mut by_name: BTreeMap<Arc<str>, Vec<PackageId>> = BTreeMap::new();
            for &id in &selection.packages {
                by_name.entry(self.provider.name(id)).or_default().push(id);
            }
            by_name.into_values().collect()
        } else {
            vec![selection.packages.clone()]
        }
    }

    fn describe(target: &JobTarget, action: GoalAction) -> String {
        let verb = match action {
            GoalAction::Install => "install",
            GoalAction::Remove => "remove",
            GoalAction::Upgrade => "upgrade",
            GoalAction::Distupgrade => "distupgrade",
            GoalAction::Reinstall => "reinstall",
            GoalAction::ReasonChange(_) => "reason change",
        };
        match target {
            JobTarget::Spec(spec) => format!("{verb} {spec}"),
            JobTarget::Packages(packages) => {
                format!("{verb} {}", packages.iter().map(|p| p.to_string()).join(", "))
            }
            JobTarget::All => format!("{verb} all"),
        }
    }

    fn argument(target: &JobTarget) -> String {
        match target {
            JobTarget::Spec(spec) => spec.clone(),
            JobTarget::Packages(packages) => packages.iter().map(|p| p.to_string()).join(", "),
            JobTarget::All => "*".to_owned(),
        }
    }

    /// Adds a job of the goal.
    pub fn add(&mut self, job: &GoalJob) {
        let Some(selection) = self.select(job) else {
            return;
        };
        match job.action {
            GoalAction::Install => self.add_install(job, &selection),
            GoalAction::Remove => self.add_remove(job, &selection),
            GoalAction::Upgrade => self.add_upgrade(job, &selection, false),
            GoalAction::Distupgrade => self.add_upgrade(job, &selection, true),
            GoalAction::Reinstall => self.add_reinstall(job, &selection),
            GoalAction::ReasonChange(reason) => self.add_reason_change(job, &selection, reason),
        }
    }

    fn not_installed(&mut self, job: &GoalJob) {
        let argument = Self::argument(&job.target);
        self.problem(
            &job.settings,
            ProblemRule::JobNotInstalled,
            format!("Packages for argument '{argument}' available, but not installed."),
        );
    }

    /// Orders candidates newest first, preferring installed packages among equal versions.
    fn sort_candidates(&self, candidates: &mut [PackageId]) {
        candidates.sort_by(|&a, &b| {
            compare_evr(&self.provider.evr(b), &self.provider.evr(a))
                .then_with(|| self.is_installed(b).cmp(&self.is_installed(a)))
                .then(a.cmp(&b))
        });
    }

    /// Keeps only the newest version of every name.
    fn newest_per_name(&self, candidates: Vec<PackageId>) -> Vec<PackageId> {
        let mut newest: HashMap<Arc<str>, Arc<str>> = HashMap::new();
        for &id in &candidates {
            let evr = self.provider.evr(id);
            newest
                .entry(self.provider.name(id))
                .and_modify(|best| {
                    if compare_evr(&evr, &**best).is_gt() {
                        *best = evr.clone();
                    }
                })
                .or_insert_with(|| evr.clone());
        }
        candidates
            .into_iter()
            .filter(|&id| {
                newest
                    .get(&self.provider.name(id))
                    .is_some_and(|best| compare_evr(&self.provider.evr(id), best).is_eq())
            })
            .collect()
    }

    fn add_install(&mut self, job: &GoalJob, selection: &Selection) {
        let argument = Self::argument(&job.target);
        let packages: Vec<PackageId> = selection
            .packages
            .iter()
            .copied()
            .filter(|&id| !self.is_source(id))
            .collect();
        if packages.is_empty() {
            self.problem(
                &job.settings,
                ProblemRule::JobUnsupported,
                format!("Argument '{argument}' matches only source packages."),
            );
            return;
        }

        let selection = Selection {
            packages,
            by_name: selection.by_name,
        };
        let description = Self::describe(&job.target, job.action);
        for group in self.groups(&selection) {
            let mut candidates: Vec<PackageId> = group
                .into_iter()
                .filter(|&id| self.is_installed(id) || self.in_repos(id, &job.settings.to_repo_ids))
                .collect();
            if job.settings.best(self.config) {
                candidates = self.newest_per_name(candidates);
            }
            if candidates.is_empty() {
                self.problem(
                    &job.settings,
                    ProblemRule::JobNothingProvides,
                    format!("No match for argument: {argument}"),
                );
                continue;
            }
            self.sort_candidates(&mut candidates);
            if candidates.iter().all(|&id| self.is_installed(id)) {
                tracing::info!(
                    "package {} is already installed",
                    self.provider.nevra(candidates[0])
                );
            }
            self.translated.user_installs.extend(&candidates);
            self.push(
                JobKind::Install(candidates.into_iter().map(solvable_id).collect()),
                &job.settings,
                description.clone(),
            );
        }
    }

    fn add_remove(&mut self, job: &GoalJob, selection: &Selection) {
        let installed: Vec<PackageId> = selection
            .packages
            .iter()
            .copied()
            .filter(|&id| self.is_installed(id))
            .collect();
        if installed.is_empty() {
            let argument = Self::argument(&job.target);
            self.problem(
                &job.settings,
                ProblemRule::JobNotInstalled,
                format!("No packages to remove for argument: {argument}"),
            );
            return;
        }

        // Available packages of a removed name may not sneak back in as a replacement
        let mut erase = installed.clone();
        for &id in installed.iter().unique_by(|&&id| self.provider.name(id)) {
            if !self.provider.is_installonly(id) {
                erase.extend(self.available_named(&self.provider.name(id)));
            }
        }

        self.has_remove = true;
        self.translated.clean_requirements |= job.settings.clean_requirements_on_remove(self.config);
        self.translated.user_removes.extend(&installed);
        self.targeted.extend(&installed);
        let description = Self::describe(&job.target, job.action);
        self.pending.push(PendingJob {
            kind: JobKind::Erase(erase.into_iter().map(solvable_id).collect()),
            weak: false,
            description,
        });
    }

    /// Upgrades, or with `distupgrade` synchronizes, the installed packages of every name the
    /// selection matched.
    fn add_upgrade(&mut self, job: &GoalJob, selection: &Selection, distupgrade: bool) {
        let description = Self::describe(&job.target, job.action);
        let matched: HashSet<PackageId> = selection.packages.iter().copied().collect();
        let names: Vec<Arc<str>> = selection
            .packages
            .iter()
            .map(|&id| self.provider.name(id))
            .unique()
            .collect();

        let mut found_installed = false;
        for name in names {
            let installed = self.installed_named(&name);
            if installed.is_empty() {
                continue;
            }
            found_installed = true;

            // Available packages of the name the job may pick
            let restrict_to_matched = matches!(job.target, JobTarget::Spec(_) | JobTarget::Packages(_))
                && selection.packages.iter().any(|id| !self.is_installed(*id));
            let available: Vec<PackageId> = self
                .available_named(&name)
                .into_iter()
                .filter(|id| !restrict_to_matched || matched.contains(id))
                .filter(|&id| self.in_repos(id, &job.settings.to_repo_ids))
                .filter(|&id| {
                    installed
                        .iter()
                        .any(|&i| arch_compatible(&self.provider.arch(i), &self.provider.arch(id)))
                })
                .collect();
            let newest_installed = installed
                .iter()
                .copied()
                .max_by(|&a, &b| compare_evr(&self.provider.evr(a), &self.provider.evr(b)))
                .expect("bug: installed is not empty");
            let installonly = self.provider.is_installonly(newest_installed);

            let mut candidates: Vec<PackageId> = if distupgrade && !installonly {
                available
            } else {
                let installed_evr = self.provider.evr(newest_installed);
                available
                    .into_iter()
                    .filter(|&id| compare_evr(&self.provider.evr(id), &installed_evr).is_gt())
                    .collect()
            };
            if candidates.is_empty() {
                tracing::debug!("nothing to {description} for {name}");
                continue;
            }
            if job.settings.best(self.config) || distupgrade {
                candidates = self.newest_per_name(candidates);
            }
            self.sort_candidates(&mut candidates);

            if installonly {
                // A new version is installed next to the old ones
                self.push(
                    JobKind::Install(candidates.into_iter().map(solvable_id).collect()),
                    &job.settings,
                    description.clone(),
                );
                continue;
            }

            if distupgrade {
                // Keep the installed package if it already is the target version
                let target = candidates[0];
                if let Some(&same) = installed
                    .iter()
                    .find(|&&i| self.provider.same_nevra(i, target))
                {
                    candidates.insert(0, same);
                }
            } else if !job.settings.best(self.config) {
                candidates.push(newest_installed);
            }

            self.targeted.extend(&installed);
            self.push(
                JobKind::Install(candidates.into_iter().map(solvable_id).collect()),
                &job.settings,
                description.clone(),
            );
        }

        if !found_installed {
            self.not_installed(job);
        }
    }

    fn add_reinstall(&mut self, job: &GoalJob, selection: &Selection) {
        let description = Self::describe(&job.target, job.action);
        let installed: Vec<PackageId> = selection
            .packages
            .iter()
            .copied()
            .filter(|&id| self.is_installed(id))
            .collect();
        if installed.is_empty() {
            self.not_installed(job);
            return;
        }

        for id in installed {
            let name = self.provider.name(id);
            let same: Vec<PackageId> = self
                .available_named(&name)
                .into_iter()
                .filter(|&a| self.provider.same_nevra(a, id))
                .filter(|&a| self.in_repos(a, &job.settings.to_repo_ids))
                .collect();
            if same.is_empty() {
                self.problem(
                    &job.settings,
                    ProblemRule::JobUnsupported,
                    format!("Installed package {} not available.", self.provider.nevra(id)),
                );
                continue;
            }
            self.targeted.insert(id);
            self.push(
                JobKind::Install(same.into_iter().map(solvable_id).collect()),
                &job.settings,
                description.clone(),
            );
            self.pending.push(PendingJob {
                kind: JobKind::Erase(vec![solvable_id(id)]),
                weak: false,
                description: description.clone(),
            });
        }
    }

    fn add_reason_change(
        &mut self,
        job: &GoalJob,
        selection: &Selection,
        reason: TransactionItemReason,
    ) {
        let installed: Vec<PackageId> = selection
            .packages
            .iter()
            .copied()
            .filter(|&id| self.is_installed(id))
            .collect();
        if installed.is_empty() {
            self.not_installed(job);
            return;
        }
        self.translated
            .reason_changes
            .extend(installed.into_iter().map(|id| (id, reason)));
    }

    /// The candidates of the keep job of an installed package: the package itself, then newer
    /// versions of it and the packages that obsolete it.
    fn keep_candidates(
        &self,
        id: PackageId,
        obsoleters: &HashMap<PackageId, Vec<PackageId>>,
    ) -> Vec<PackageId> {
        let mut candidates = vec![id];
        if self.provider.is_installonly(id) {
            return candidates;
        }
        let evr = self.provider.evr(id);
        let arch = self.provider.arch(id);
        let mut newer: Vec<PackageId> = self
            .available_named(&self.provider.name(id))
            .into_iter()
            .filter(|&a| {
                arch_compatible(&self.provider.arch(a), &arch)
                    && compare_evr(&self.provider.evr(a), &evr).is_gt()
            })
            .collect();
        self.sort_candidates(&mut newer);
        candidates.extend(newer);
        candidates.extend(obsoleters.get(&id).into_iter().flatten().copied());
        candidates
    }

    /// Maps installed packages to the visible available packages that obsolete them.
    fn obsoleters(&self) -> HashMap<PackageId, Vec<PackageId>> {
        let mut result: HashMap<PackageId, Vec<PackageId>> = HashMap::new();
        for (id, _) in self.pool.packages() {
            if self.is_installed(id) || !self.provider.is_visible(id) {
                continue;
            }
            for (_, obsoleted) in self.provider.obsoletes(id) {
                for other in obsoleted.into_iter().filter(|&o| self.is_installed(o)) {
                    result.entry(other).or_default().push(id);
                }
            }
        }
        result
    }

    /// Adds the keep jobs of the installed packages followed by the jobs of the goal.
    ///
    /// Keep jobs are weak if packages may be erased. The solver drops weak jobs added last
    /// first, so protected packages come first and the jobs of the goal last.
    pub fn finish(mut self, allow_erasing: bool) -> Translated {
        let weak_keep = allow_erasing || self.has_remove;
        let obsoleters = self.obsoleters();
        let keep: Vec<PackageId> = self
            .pool
            .packages()
            .map(|(id, _)| id)
            .filter(|&id| self.is_installed(id) && !self.targeted.contains(&id))
            .sorted_by_key(|id| (!self.protected.contains(id), *id))
            .collect();

        for id in keep {
            let candidates = self.keep_candidates(id, &obsoleters);
            self.translated.jobs.push(
                JobKind::Install(candidates.into_iter().map(solvable_id).collect()),
                weak_keep,
            );
            self.translated.origins.push(JobOrigin::Keep(id));
        }

        for job in std::mem::take(&mut self.pending) {
            self.translated.jobs.push(job.kind, job.weak);
            self.translated.origins.push(JobOrigin::User(job.description));
        }
        self.translated
    }
}

/// Turns the conflict reported by the solver into a problem list.
pub(crate) fn describe_problem(
    provider: &RpmProvider<'_>,
    origins: &[JobOrigin],
    problem: &Problem,
) -> ProblemList {
    use rpmkit_libsolv_rs::DependencyProvider;

    let nevra = |solvable: SolvableId| provider.nevra(package_id(solvable));
    let mut entries: Vec<ProblemEntry> = Vec::new();
    for clause in problem.clauses() {
        let entry = match clause {
            ProblemClause::JobRequires { job, candidates } => match &origins[job.index()] {
                JobOrigin::Keep(id) => ProblemEntry::new(
                    ProblemRule::PkgInstalledKeep,
                    format!("problem with installed package {}", provider.nevra(*id)),
                ),
                JobOrigin::User(description) if candidates.is_empty() => ProblemEntry::new(
                    ProblemRule::JobNothingProvides,
                    format!("nothing provides requested {description}"),
                ),
                JobOrigin::User(_) => {
                    ProblemEntry::new(ProblemRule::JobConflict, "conflicting requests")
                }
            },
            ProblemClause::JobForbids { .. } => {
                ProblemEntry::new(ProblemRule::JobConflict, "conflicting requests")
            }
            ProblemClause::Requires {
                solvable,
                dependency,
                candidates,
            } if candidates.is_empty() => ProblemEntry::new(
                ProblemRule::PkgNothingProvides,
                format!(
                    "nothing provides {} needed by {}",
                    provider.display_dependency(*dependency),
                    nevra(*solvable)
                ),
            ),
            ProblemClause::Requires {
                solvable,
                dependency,
                ..
            } => ProblemEntry::new(
                ProblemRule::PkgRequires,
                format!(
                    "package {} requires {}, but none of the providers can be installed",
                    nevra(*solvable),
                    provider.display_dependency(*dependency)
                ),
            ),
            ProblemClause::Conflicts {
                solvable,
                other,
                dependency,
            } => ProblemEntry::new(
                ProblemRule::PkgConflicts,
                format!(
                    "package {} conflicts with {} provided by {}",
                    nevra(*solvable),
                    provider.display_dependency(*dependency),
                    nevra(*other)
                ),
            ),
            ProblemClause::Obsoletes {
                solvable,
                other,
                dependency,
            } => ProblemEntry::new(
                ProblemRule::PkgObsoletes,
                format!(
                    "package {} obsoletes {} provided by {}",
                    nevra(*solvable),
                    provider.display_dependency(*dependency),
                    nevra(*other)
                ),
            ),
            ProblemClause::SameName { solvable, other } => ProblemEntry::new(
                ProblemRule::PkgSameName,
                format!(
                    "cannot install both {} and {}",
                    nevra(*solvable),
                    nevra(*other)
                ),
            ),
            ProblemClause::SelfConflict {
                solvable,
                dependency,
            } => ProblemEntry::new(
                ProblemRule::PkgSelfConflict,
                format!(
                    "package {} conflicts with {} provided by itself",
                    nevra(*solvable),
                    provider.display_dependency(*dependency)
                ),
            ),
        };
        if !entries.contains(&entry) {
            entries.push(entry);
        }
    }

    let mut problems = ProblemList::default();
    problems.push(entries);
    problems
}

