use std::{path::Path, sync::Arc};

use rpmkit_types::{QueryCmp, StringMatcher};

use crate::{
    advisory::AdvisoryQuery,
    config::SackConfig,
    exclude_flags::ExcludeFlags,
    pool::{Pool, PoolRef},
    query::{Query, QueryError},
    repo::{load_repo, LoadError, LoadRepoFlags, RepoMetadata},
    solv_map::SolvMap,
    PackageSet, PackageSetError, RepoId,
};

/// Owns a [`Pool`] and its lifecycle.
///
/// Repositories are loaded first, then the pool is queried. Queries and handles only keep a weak
/// reference to the pool: as long as one of them is alive the pool cannot be modified and
/// loading fails with [`LoadError::PoolInUse`]. [`Sack::reset`] replaces the pool, after which
/// the remaining handles report [`crate::PoolError::PoolDropped`].
#[derive(Debug)]
pub struct Sack {
    pool: Arc<Pool>,
    config: SackConfig,
}

impl Default for Sack {
    fn default() -> Self {
        Self::new()
    }
}

impl Sack {
    /// Creates a sack with an empty pool.
    pub fn new() -> Self {
        Self {
            pool: Arc::new(Pool::new()),
            config: SackConfig::default(),
        }
    }

    fn pool_mut(&mut self) -> Result<&mut Pool, LoadError> {
        Arc::get_mut(&mut self.pool).ok_or(LoadError::PoolInUse)
    }

    /// Loads an available repository.
    pub fn load_repo(
        &mut self,
        metadata: RepoMetadata,
        flags: LoadRepoFlags,
    ) -> Result<RepoId, LoadError> {
        load_repo(self.pool_mut()?, metadata, flags, false)
    }

    /// Loads the repository of installed packages. There can only be one.
    pub fn load_system_repo(&mut self, metadata: RepoMetadata) -> Result<RepoId, LoadError> {
        load_repo(self.pool_mut()?, metadata, LoadRepoFlags::ALL, true)
    }

    /// Reads a repository document from a JSON file and loads it as an available repository.
    pub fn load_repo_file(
        &mut self,
        path: impl AsRef<Path>,
        flags: LoadRepoFlags,
    ) -> Result<RepoId, LoadError> {
        let metadata = RepoMetadata::from_path(path)?;
        self.load_repo(metadata, flags)
    }

    /// The configuration applied last.
    pub fn config(&self) -> &SackConfig {
        &self.config
    }

    /// Hides the available packages selected by `config` from queries that apply regular
    /// excludes. Only packages loaded so far are affected.
    pub fn apply_config(&mut self, config: &SackConfig) -> Result<(), QueryError> {
        let globs = |patterns: &[String]| {
            patterns
                .iter()
                .map(|pattern| StringMatcher::new(QueryCmp::Glob, pattern))
                .collect::<Result<Vec<_>, _>>()
        };
        let excludepkgs = globs(&config.excludepkgs)?;
        let includepkgs = globs(&config.includepkgs)?;

        let pool = &self.pool;
        let mut excluded = SolvMap::new(pool.package_count());
        let mut included = SolvMap::new(pool.package_count());
        for (id, package) in pool.packages() {
            if pool.is_installed(id) {
                continue;
            }
            let name = pool.str(package.name);
            let nevra = pool.package_nevra(id).unwrap_or_default();
            let matches = |globs: &[StringMatcher]| {
                globs
                    .iter()
                    .any(|glob| glob.matches(&name) || glob.matches(&nevra))
            };
            let source = matches!(&*pool.str(package.arch), "src" | "nosrc");
            if matches(&excludepkgs) || (config.exclude_source_packages && source) {
                excluded.add(id).expect("bug: map is sized to the pool");
            }
            if matches(&includepkgs) {
                included.add(id).expect("bug: map is sized to the pool");
            }
        }

        tracing::debug!(
            "configuration excludes {} packages and includes {}",
            excluded.count(),
            included.count()
        );
        pool.add_excludes(&excluded);
        if !config.includepkgs.is_empty() {
            pool.add_includes(&included);
        }
        self.config = config.clone();
        Ok(())
    }

    fn check_pool(&self, packages: &PackageSet) -> Result<(), PackageSetError> {
        if packages.pool().same_pool(&self.pool_ref()) {
            Ok(())
        } else {
            Err(PackageSetError::IncompatiblePool)
        }
    }

    /// Hides `packages` from queries that apply regular excludes.
    pub fn add_excludes(&self, packages: &PackageSet) -> Result<(), PackageSetError> {
        self.check_pool(packages)?;
        self.pool.add_excludes(packages.map());
        Ok(())
    }

    /// Hides `packages` from queries that apply modular excludes.
    pub fn add_module_excludes(&self, packages: &PackageSet) -> Result<(), PackageSetError> {
        self.check_pool(packages)?;
        self.pool.add_module_excludes(packages.map());
        Ok(())
    }

    /// Hides every available package that is not in `packages`, or in a set added before, from
    /// queries that apply regular excludes.
    pub fn add_includes(&self, packages: &PackageSet) -> Result<(), PackageSetError> {
        self.check_pool(packages)?;
        self.pool.add_includes(packages.map());
        Ok(())
    }

    /// Drops every exclude and include.
    pub fn clear_excludes(&self) {
        self.pool.clear_excludes();
    }

    /// Sets the names of packages that may be installed in several versions at once.
    pub fn set_installonly<S: Into<String>>(&self, names: impl IntoIterator<Item = S>) {
        self.pool.set_installonly(names.into_iter().map(Into::into));
    }

    /// Replaces the pool by an empty one. Handles to the old pool become invalid.
    pub fn reset(&mut self) {
        tracing::debug!("resetting the pool");
        self.pool = Arc::new(Pool::new());
        self.config = SackConfig::default();
    }

    /// Creates a query over the packages not hidden by the excludes selected with `flags`.
    pub fn query(&self, flags: ExcludeFlags) -> Query {
        Query::from_pool(&self.pool, flags)
    }

    /// Creates a query over the loaded advisories.
    pub fn advisory_query(&self) -> AdvisoryQuery {
        AdvisoryQuery::from_pool(&self.pool)
    }

    /// A weak handle to the pool.
    pub fn pool_ref(&self) -> PoolRef {
        PoolRef::from(&self.pool)
    }

    /// The pool.
    pub fn pool(&self) -> &Arc<Pool> {
        &self.pool
    }

    /// The number of loaded packages.
    pub fn package_count(&self) -> usize {
        self.pool.package_count()
    }
}
