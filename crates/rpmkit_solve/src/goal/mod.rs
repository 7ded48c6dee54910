//! The [`Goal`] collects install, upgrade and remove requests and resolves them into a
//! transaction.

use std::{
    collections::{BTreeSet, HashMap, HashSet},
    str::FromStr,
    sync::Arc,
};

use itertools::Itertools;
use rpmkit_libsolv_rs::Solver;
use rpmkit_sack::{ExcludeFlags, Package, PackageId, PackageSet, Pool, PoolRef, Query, Sack};
use rpmkit_types::{
    is_glob_pattern, ParseReldepError, ParsedReldep, QueryCmp, StringMatcher,
    StringMatcherParseError,
};
use thiserror::Error;

use crate::{
    config::SolverConfig,
    problem::ProblemList,
    provider::{package_id, RpmProvider},
    settings::GoalJobSettings,
    transaction::{Transaction, TransactionItem, TransactionItemAction, TransactionItemReason},
};

mod classify;
mod jobs;

/// Errors that are detected while a job is added to a [`Goal`].
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum GoalError {
    /// The package spec is empty.
    #[error("the package spec is empty")]
    EmptySpec,

    /// The package spec is not a valid glob pattern.
    #[error(transparent)]
    InvalidPattern(#[from] StringMatcherParseError),

    /// The package spec looks like a dependency but cannot be parsed as one.
    #[error(transparent)]
    Reldep(#[from] ParseReldepError),

    /// The packages belong to a different pool than the goal.
    #[error("the packages belong to a different pool")]
    IncompatiblePool,
}

/// What a job asks for.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum GoalAction {
    Install,
    Remove,
    Upgrade,
    Distupgrade,
    Reinstall,
    ReasonChange(TransactionItemReason),
}

/// The packages a job refers to.
#[derive(Debug, Clone)]
pub(crate) enum JobTarget {
    Spec(String),
    Packages(PackageSet),
    All,
}

#[derive(Debug, Clone)]
pub(crate) struct GoalJob {
    pub action: GoalAction,
    pub target: JobTarget,
    pub settings: GoalJobSettings,
}

/// Accumulates jobs and resolves them into a transaction.
///
/// Package specs are validated when a job is added but only matched against the pool when
/// [`Goal::resolve`] runs. Resolving again discards the previous outcome.
///
/// ```
/// use rpmkit_sack::{LoadRepoFlags, PackageMetadata, RepoMetadata, Sack};
/// use rpmkit_solve::{Goal, GoalJobSettings};
///
/// let mut repo = RepoMetadata::new("fedora");
/// repo.packages.push(PackageMetadata {
///     name: "wget".to_owned(),
///     version: "1.19.5".to_owned(),
///     release: "5.fc29".to_owned(),
///     arch: "x86_64".to_owned(),
///     ..Default::default()
/// });
/// let mut sack = Sack::new();
/// sack.load_repo(repo, LoadRepoFlags::ALL).unwrap();
///
/// let mut goal = Goal::new(&sack);
/// goal.add_install("wget", GoalJobSettings::default()).unwrap();
/// goal.resolve(false).unwrap();
/// assert_eq!(goal.list_installs()[0].full_nevra().unwrap(), "wget-0:1.19.5-5.fc29.x86_64");
/// ```
#[derive(Debug)]
pub struct Goal {
    pool: Arc<Pool>,
    config: SolverConfig,
    jobs: Vec<GoalJob>,
    protected: BTreeSet<PackageId>,
    running_kernel: Option<PackageId>,
    installed_reasons: HashMap<String, TransactionItemReason>,
    transaction: Option<Transaction>,
    problems: ProblemList,
}

impl Goal {
    /// Creates a goal over the pool of `sack` with the default [`SolverConfig`].
    pub fn new(sack: &Sack) -> Self {
        Self::with_config(sack, SolverConfig::default())
    }

    /// Creates a goal over the pool of `sack`.
    pub fn with_config(sack: &Sack, config: SolverConfig) -> Self {
        Self {
            pool: sack.pool().clone(),
            config,
            jobs: Vec::new(),
            protected: BTreeSet::new(),
            running_kernel: None,
            installed_reasons: HashMap::new(),
            transaction: None,
            problems: ProblemList::default(),
        }
    }

    /// The configuration the goal resolves with.
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    fn pool_ref(&self) -> PoolRef {
        PoolRef::from(&self.pool)
    }

    fn check_pool(&self, pool: &PoolRef) -> Result<(), GoalError> {
        if pool.same_pool(&self.pool_ref()) {
            Ok(())
        } else {
            Err(GoalError::IncompatiblePool)
        }
    }

    fn push_spec(
        &mut self,
        action: GoalAction,
        spec: &str,
        settings: GoalJobSettings,
    ) -> Result<(), GoalError> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(GoalError::EmptySpec);
        }
        if spec.contains(char::is_whitespace) {
            ParsedReldep::from_str(spec)?;
        } else if is_glob_pattern(spec) {
            StringMatcher::new(QueryCmp::Glob, spec)?;
        }
        self.jobs.push(GoalJob {
            action,
            target: JobTarget::Spec(spec.to_owned()),
            settings,
        });
        Ok(())
    }

    fn push_packages(
        &mut self,
        action: GoalAction,
        packages: &PackageSet,
        settings: GoalJobSettings,
    ) -> Result<(), GoalError> {
        self.check_pool(packages.pool())?;
        self.jobs.push(GoalJob {
            action,
            target: JobTarget::Packages(packages.clone()),
            settings,
        });
        Ok(())
    }

    /// Installs the best package matching `spec`. Specs are NEVRAs, provides or file paths
    /// and may contain globs.
    pub fn add_install(&mut self, spec: &str, settings: GoalJobSettings) -> Result<(), GoalError> {
        self.push_spec(GoalAction::Install, spec, settings)
    }

    /// Removes the installed packages matching `spec`.
    pub fn add_remove(&mut self, spec: &str, settings: GoalJobSettings) -> Result<(), GoalError> {
        self.push_spec(GoalAction::Remove, spec, settings)
    }

    /// Upgrades the installed packages whose name matches `spec`.
    pub fn add_upgrade(&mut self, spec: &str, settings: GoalJobSettings) -> Result<(), GoalError> {
        self.push_spec(GoalAction::Upgrade, spec, settings)
    }

    /// Synchronizes the installed packages matching `spec` with the newest available version,
    /// which may be a downgrade.
    pub fn add_distupgrade(
        &mut self,
        spec: &str,
        settings: GoalJobSettings,
    ) -> Result<(), GoalError> {
        self.push_spec(GoalAction::Distupgrade, spec, settings)
    }

    /// Installs the same version of the installed packages matching `spec` again.
    pub fn add_reinstall(
        &mut self,
        spec: &str,
        settings: GoalJobSettings,
    ) -> Result<(), GoalError> {
        self.push_spec(GoalAction::Reinstall, spec, settings)
    }

    /// Records a new install reason for the installed packages matching `spec`.
    pub fn add_reason_change(
        &mut self,
        spec: &str,
        reason: TransactionItemReason,
        settings: GoalJobSettings,
    ) -> Result<(), GoalError> {
        self.push_spec(GoalAction::ReasonChange(reason), spec, settings)
    }

    /// Upgrades every installed package.
    pub fn add_upgrade_all(&mut self, settings: GoalJobSettings) {
        self.jobs.push(GoalJob {
            action: GoalAction::Upgrade,
            target: JobTarget::All,
            settings,
        });
    }

    /// Synchronizes every installed package with the newest available version.
    pub fn add_distupgrade_all(&mut self, settings: GoalJobSettings) {
        self.jobs.push(GoalJob {
            action: GoalAction::Distupgrade,
            target: JobTarget::All,
            settings,
        });
    }

    /// Installs one of `packages` for each name in the set.
    pub fn add_rpm_install(
        &mut self,
        packages: &PackageSet,
        settings: GoalJobSettings,
    ) -> Result<(), GoalError> {
        self.push_packages(GoalAction::Install, packages, settings)
    }

    /// Removes the installed packages of the set.
    pub fn add_rpm_remove(
        &mut self,
        packages: &PackageSet,
        settings: GoalJobSettings,
    ) -> Result<(), GoalError> {
        self.push_packages(GoalAction::Remove, packages, settings)
    }

    /// Upgrades installed packages to packages of the set.
    pub fn add_rpm_upgrade(
        &mut self,
        packages: &PackageSet,
        settings: GoalJobSettings,
    ) -> Result<(), GoalError> {
        self.push_packages(GoalAction::Upgrade, packages, settings)
    }

    /// Drops every job added so far.
    pub fn clear_jobs(&mut self) {
        self.jobs.clear();
    }

    /// The number of jobs.
    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// Replaces the protected packages. Installed packages named in
    /// [`SolverConfig::protected_packages`] stay protected as well.
    pub fn set_protected_packages(&mut self, packages: &PackageSet) -> Result<(), GoalError> {
        self.check_pool(packages.pool())?;
        self.protected = packages.ids().collect();
        Ok(())
    }

    /// Protects `packages` in addition to the packages protected before.
    pub fn add_protected(&mut self, packages: &PackageSet) -> Result<(), GoalError> {
        self.check_pool(packages.pool())?;
        self.protected.extend(packages.ids());
        Ok(())
    }

    /// Sets the kernel the system runs, which may never be removed.
    pub fn set_running_kernel(&mut self, package: &Package) -> Result<(), GoalError> {
        self.check_pool(package.pool())?;
        self.running_kernel = Some(package.id());
        Ok(())
    }

    /// Sets the recorded install reasons of installed packages by name. Packages without a
    /// recorded reason count as [`TransactionItemReason::Unknown`], which keeps them installed
    /// when nothing needs them.
    pub fn set_installed_reasons(
        &mut self,
        reasons: impl IntoIterator<Item = (String, TransactionItemReason)>,
    ) {
        self.installed_reasons = reasons.into_iter().collect();
    }

    /// The protected packages: the explicitly protected ones and the installed packages named
    /// in the configuration.
    fn protected_packages(&self) -> HashSet<PackageId> {
        let names: HashSet<&str> = self
            .config
            .protected_packages
            .iter()
            .map(String::as_str)
            .collect();
        self.pool
            .packages()
            .filter(|&(id, package)| {
                self.pool.is_installed(id) && names.contains(&*self.pool.str(package.name))
            })
            .map(|(id, _)| id)
            .chain(self.protected.iter().copied())
            .collect()
    }

    fn installed_reason(&self, id: PackageId) -> TransactionItemReason {
        self.pool
            .package(id)
            .and_then(|p| self.installed_reasons.get(&*self.pool.str(p.name)))
            .copied()
            .unwrap_or_default()
    }

    /// Resolves the jobs into a transaction.
    ///
    /// On success the transaction replaces the outcome of a previous resolve. On failure the
    /// problems are returned and also kept, see [`Goal::problems`].
    pub fn resolve(&mut self, allow_erasing: bool) -> Result<(), ProblemList> {
        self.transaction = None;
        self.problems = ProblemList::default();

        match self.solve(allow_erasing) {
            Ok(transaction) => {
                tracing::debug!(
                    "resolved {} jobs into {} transaction items",
                    self.jobs.len(),
                    transaction.items.len()
                );
                self.transaction = Some(transaction);
                Ok(())
            }
            Err(problems) => {
                tracing::debug!("resolving failed with {} problems", problems.len());
                self.problems = problems.clone();
                Err(problems)
            }
        }
    }

    fn solve(&self, allow_erasing: bool) -> Result<Transaction, ProblemList> {
        let pool = &self.pool;

        let mut visible = Query::from_pool(pool, ExcludeFlags::APPLY_EXCLUDES)
            .package_set()
            .expect("bug: the goal keeps its pool alive")
            .map()
            .clone();
        let before: BTreeSet<PackageId> = pool
            .packages()
            .map(|(id, _)| id)
            .filter(|&id| pool.is_installed(id))
            .collect();
        for &id in &before {
            visible.add(id).expect("bug: map is sized to the pool");
        }

        let installonly = pool
            .installonly()
            .into_iter()
            .chain(self.config.installonlypkgs.iter().cloned())
            .collect();
        let provider = RpmProvider::new(pool, visible, installonly);
        let protected = self.protected_packages();

        let mut builder = jobs::JobBuilder::new(pool, &provider, &self.config, &protected);
        for job in &self.jobs {
            builder.add(job);
        }
        let translated = builder.finish(allow_erasing);
        if !translated.problems.is_empty() {
            return Err(translated.problems);
        }

        let mut solver = Solver::new(provider);
        let solution = match solver.solve(&translated.jobs) {
            Ok(solution) => solution,
            Err(problem) => {
                return Err(jobs::describe_problem(
                    solver.provider(),
                    &translated.origins,
                    &problem,
                ))
            }
        };
        let provider = solver.into_provider();

        for job in &solution.disabled_jobs {
            match &translated.origins[job.index()] {
                jobs::JobOrigin::User(description) => {
                    tracing::warn!("skipping '{description}' because it cannot be satisfied")
                }
                jobs::JobOrigin::Keep(id) => {
                    tracing::debug!("installed package {} may be removed", provider.nevra(*id))
                }
            }
        }

        let after: BTreeSet<PackageId> = solution.installed.iter().map(|&s| package_id(s)).collect();
        classify::Classifier {
            provider: &provider,
            pool: self.pool_ref(),
            config: &self.config,
            translated: &translated,
            protected: &protected,
            running_kernel: self.running_kernel,
            installed_reason: &|id| self.installed_reason(id),
        }
        .classify(before, after)
    }

    /// The problems of the last failed resolve.
    pub fn problems(&self) -> &ProblemList {
        &self.problems
    }

    /// The items of the last successful resolve, ordered by package.
    pub fn transaction_items(&self) -> &[TransactionItem] {
        self.transaction
            .as_ref()
            .map_or(&[], |transaction| transaction.items.as_slice())
    }

    fn list(&self, actions: &[TransactionItemAction]) -> Vec<Package> {
        self.transaction
            .as_ref()
            .map(|transaction| {
                actions
                    .iter()
                    .flat_map(|&action| transaction.packages_with(action))
                    .sorted_by_key(Package::id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Packages installed without replacing a package of the same name.
    pub fn list_installs(&self) -> Vec<Package> {
        self.list(&[TransactionItemAction::Install, TransactionItemAction::Obsolete])
    }

    /// Packages that replace an older version.
    pub fn list_upgrades(&self) -> Vec<Package> {
        self.list(&[TransactionItemAction::Upgrade])
    }

    /// Packages that replace a newer version.
    pub fn list_downgrades(&self) -> Vec<Package> {
        self.list(&[TransactionItemAction::Downgrade])
    }

    /// Installed packages that are removed without a replacement.
    pub fn list_removals(&self) -> Vec<Package> {
        self.list(&[TransactionItemAction::Remove])
    }

    /// Packages installed again in the same version.
    pub fn list_reinstalls(&self) -> Vec<Package> {
        self.list(&[TransactionItemAction::Reinstall])
    }

    /// Installed packages removed because an inbound package obsoletes them.
    pub fn list_obsoleted(&self) -> Vec<Package> {
        self.list(&[TransactionItemAction::Obsoleted])
    }

    /// Installed packages that stay but that nothing installed by the user needs anymore.
    pub fn list_unneeded(&self) -> Vec<Package> {
        self.transaction
            .as_ref()
            .map(|transaction| transaction.unneeded.clone())
            .unwrap_or_default()
    }

    /// The installed packages `package` replaces: older or newer versions of it and the
    /// packages it obsoletes.
    pub fn list_obsoleted_by_package(&self, package: &Package) -> Vec<Package> {
        self.transaction
            .as_ref()
            .and_then(|transaction| transaction.replaces.get(&package.id()))
            .filter(|_| package.pool().same_pool(&self.pool_ref()))
            .cloned()
            .unwrap_or_default()
    }

    /// Why `package` is installed after the transaction, or why it is removed.
    pub fn get_reason(&self, package: &Package) -> TransactionItemReason {
        if !package.pool().same_pool(&self.pool_ref()) {
            return TransactionItemReason::Unknown;
        }
        if let Some(item) = self
            .transaction
            .as_ref()
            .and_then(|transaction| transaction.item(package))
        {
            return item.reason();
        }
        if self.pool.is_installed(package.id()) {
            self.installed_reason(package.id())
        } else {
            TransactionItemReason::Unknown
        }
    }
}

#[cfg(test)]
mod test {
    use assert_matches::assert_matches;
    use rpmkit_sack::{LoadRepoFlags, PackageMetadata, RepoMetadata};

    use super::*;

    fn sack() -> Sack {
        let mut repo = RepoMetadata::new("fedora");
        repo.packages.push(PackageMetadata {
            name: "wget".to_owned(),
            version: "1.19.5".to_owned(),
            release: "5.fc29".to_owned(),
            arch: "x86_64".to_owned(),
            ..Default::default()
        });
        let mut sack = Sack::new();
        sack.load_repo(repo, LoadRepoFlags::ALL).unwrap();
        sack
    }

    #[test]
    fn test_invalid_specs() {
        let sack = sack();
        let mut goal = Goal::new(&sack);
        assert_matches!(
            goal.add_install("  ", GoalJobSettings::default()),
            Err(GoalError::EmptySpec)
        );
        assert_matches!(
            goal.add_install("wget-[", GoalJobSettings::default()),
            Err(GoalError::InvalidPattern(_))
        );
        assert_matches!(
            goal.add_install("wget >== 1", GoalJobSettings::default()),
            Err(GoalError::Reldep(_))
        );
        assert_eq!(goal.job_count(), 0);

        goal.add_install("wget >= 1", GoalJobSettings::default())
            .unwrap();
        goal.add_remove("w?et", GoalJobSettings::default()).unwrap();
        assert_eq!(goal.job_count(), 2);
    }

    #[test]
    fn test_incompatible_pool() {
        let sack = sack();
        let other = Sack::new();
        let mut goal = Goal::new(&sack);
        let packages = PackageSet::new(&other.pool_ref()).unwrap();
        assert_matches!(
            goal.add_rpm_install(&packages, GoalJobSettings::default()),
            Err(GoalError::IncompatiblePool)
        );
        assert_matches!(
            goal.set_protected_packages(&packages),
            Err(GoalError::IncompatiblePool)
        );
    }

    #[test]
    fn test_lists_before_resolve() {
        let sack = sack();
        let goal = Goal::new(&sack);
        assert!(goal.list_installs().is_empty());
        assert!(goal.transaction_items().is_empty());
        assert!(goal.problems().is_empty());

        let wget = sack.query(ExcludeFlags::APPLY_EXCLUDES).run().unwrap();
        assert_eq!(goal.get_reason(&wget[0]), TransactionItemReason::Unknown);
    }
}
