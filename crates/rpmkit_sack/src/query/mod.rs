//! Queries over the packages of a pool.

mod apply;
mod filter;
mod spec;

use std::sync::Arc;

use rpmkit_types::{QueryCmp, StringMatcherParseError};
use thiserror::Error;

use self::{apply::apply_filter, filter::CompiledFilter};
use crate::{
    exclude_flags::ExcludeFlags,
    pool::{DepKind, Pool, PoolError, PoolRef},
    reldep::ReldepError,
    solv_map::SolvMap,
    Package, PackageSet, ReldepList,
};

pub use filter::{DepPatterns, Filter, FilterKey};
pub use spec::ResolveSpecSettings;

/// Errors returned when building or evaluating a [`Query`].
#[derive(Debug, Error)]
pub enum QueryError {
    /// The comparison cannot be used with the key.
    #[error("the '{cmp}' comparison is not supported for the '{key}' key")]
    NotSupportedCmpType {
        /// The key of the filter.
        key: String,
        /// The rejected comparison.
        cmp: QueryCmp,
    },

    /// The filter values are malformed.
    #[error("bad query: {0}")]
    BadQuery(String),

    /// Filters cannot be added to a query that was already evaluated.
    #[error("the query was already applied, clone or clear it before adding filters")]
    QueryAlreadyApplied,

    /// The operands belong to different pools.
    #[error("the operands belong to different pools")]
    IncompatiblePool,

    /// A pattern could not be compiled.
    #[error(transparent)]
    InvalidPattern(#[from] StringMatcherParseError),

    /// A dependency pattern is invalid.
    #[error(transparent)]
    Reldep(#[from] ReldepError),

    /// The pool no longer exists or an id is invalid.
    #[error(transparent)]
    Pool(#[from] PoolError),
}

impl QueryError {
    pub(crate) fn not_supported(key: FilterKey, cmp: QueryCmp) -> Self {
        QueryError::NotSupportedCmpType {
            key: key.to_string(),
            cmp,
        }
    }
}

#[derive(Debug, Clone)]
enum QueryState {
    /// Filters waiting to be evaluated.
    Unapplied(Vec<CompiledFilter>),
    /// The evaluated result.
    Applied(SolvMap),
}

/// A lazily evaluated selection of packages.
///
/// Filters are validated when they are added but only evaluated by the first call that needs the
/// result, like [`Query::run`] or [`Query::len`]. Every filter narrows the result, the patterns
/// within one filter are alternatives. Once evaluated the result is fixed: adding a filter fails
/// with [`QueryError::QueryAlreadyApplied`] until the query is cleared.
///
/// ```
/// # use rpmkit_sack::{ExcludeFlags, Filter, PackageMetadata, RepoMetadata, Sack, LoadRepoFlags};
/// # use rpmkit_types::QueryCmp;
/// let mut sack = Sack::new();
/// let mut repo = RepoMetadata::new("fedora");
/// repo.packages.push(PackageMetadata {
///     name: "wget".into(),
///     version: "1.19.5".into(),
///     release: "5.fc29".into(),
///     arch: "x86_64".into(),
///     ..Default::default()
/// });
/// sack.load_repo(repo, LoadRepoFlags::ALL).unwrap();
///
/// let mut query = sack.query(ExcludeFlags::APPLY_EXCLUDES);
/// query.filter(Filter::Name(QueryCmp::Glob, vec!["wg*".into()])).unwrap();
/// let nevras = query
///     .run()
///     .unwrap()
///     .iter()
///     .map(|p| p.nevra().unwrap())
///     .collect::<Vec<_>>();
/// assert_eq!(nevras, ["wget-1.19.5-5.fc29.x86_64"]);
/// ```
#[derive(Debug, Clone)]
pub struct Query {
    pool: PoolRef,
    flags: ExcludeFlags,
    base: SolvMap,
    state: QueryState,
}

impl Query {
    /// Creates a query over every package of the pool that is not hidden by the excludes
    /// selected with `flags`.
    pub fn new(pool: &PoolRef, flags: ExcludeFlags) -> Result<Self, QueryError> {
        Ok(Self::from_pool(&pool.upgrade()?, flags))
    }

    /// Like [`Query::new`] for a pool that is known to be alive.
    pub fn from_pool(pool: &Arc<Pool>, flags: ExcludeFlags) -> Self {
        let mut base = SolvMap::full(pool.package_count());
        base.difference(&pool.excluded(flags));
        Self {
            pool: PoolRef::from(pool),
            flags,
            base,
            state: QueryState::Unapplied(Vec::new()),
        }
    }

    /// The pool the query selects from.
    pub fn pool(&self) -> &PoolRef {
        &self.pool
    }

    /// The exclude flags the query was created with.
    pub fn exclude_flags(&self) -> ExcludeFlags {
        self.flags
    }

    /// Returns true if the result was evaluated.
    pub fn is_applied(&self) -> bool {
        matches!(self.state, QueryState::Applied(_))
    }

    /// Validates and stages a filter.
    pub fn filter(&mut self, filter: Filter) -> Result<&mut Self, QueryError> {
        if self.is_applied() {
            return Err(QueryError::QueryAlreadyApplied);
        }
        let pool = self.pool.upgrade()?;
        let compiled = filter.compile(&pool, &self.pool)?;
        if let QueryState::Unapplied(filters) = &mut self.state {
            filters.push(compiled);
        }
        Ok(self)
    }

    /// Stages a filter given as text, for example `("name", Glob, ["wget*"])`.
    pub fn filter_key(
        &mut self,
        key: &str,
        cmp: QueryCmp,
        patterns: &[&str],
    ) -> Result<&mut Self, QueryError> {
        let key = key
            .parse::<FilterKey>()
            .map_err(|_| QueryError::BadQuery(format!("unknown filter key '{key}'")))?;
        self.filter(Filter::from_key(key, cmp, patterns)?)
    }

    /// Filters on the package name.
    pub fn filter_name(&mut self, cmp: QueryCmp, patterns: &[&str]) -> Result<&mut Self, QueryError> {
        self.filter(Filter::Name(cmp, to_strings(patterns)))
    }

    /// Filters on the architecture.
    pub fn filter_arch(&mut self, cmp: QueryCmp, patterns: &[&str]) -> Result<&mut Self, QueryError> {
        self.filter(Filter::Arch(cmp, to_strings(patterns)))
    }

    /// Filters on `[epoch:]version-release`.
    pub fn filter_evr(&mut self, cmp: QueryCmp, patterns: &[&str]) -> Result<&mut Self, QueryError> {
        self.filter(Filter::Evr(cmp, to_strings(patterns)))
    }

    /// Filters on the NEVRA.
    pub fn filter_nevra(&mut self, cmp: QueryCmp, patterns: &[&str]) -> Result<&mut Self, QueryError> {
        self.filter(Filter::Nevra(cmp, to_strings(patterns)))
    }

    /// Filters on the name of the repository.
    pub fn filter_repo_name(
        &mut self,
        cmp: QueryCmp,
        patterns: &[&str],
    ) -> Result<&mut Self, QueryError> {
        self.filter(Filter::RepoName(cmp, to_strings(patterns)))
    }

    /// Filters on provided capabilities.
    pub fn filter_provides(
        &mut self,
        cmp: QueryCmp,
        patterns: &[&str],
    ) -> Result<&mut Self, QueryError> {
        self.filter(Filter::Dependency(
            DepKind::Provides,
            cmp,
            DepPatterns::Strings(to_strings(patterns)),
        ))
    }

    /// Filters on required capabilities.
    pub fn filter_requires(
        &mut self,
        cmp: QueryCmp,
        patterns: &[&str],
    ) -> Result<&mut Self, QueryError> {
        self.filter(Filter::Dependency(
            DepKind::Requires,
            cmp,
            DepPatterns::Strings(to_strings(patterns)),
        ))
    }

    /// Filters on dependencies of `kind` that intersect one of `reldeps`.
    pub fn filter_reldeps(
        &mut self,
        kind: DepKind,
        cmp: QueryCmp,
        reldeps: &ReldepList,
    ) -> Result<&mut Self, QueryError> {
        self.filter(Filter::Dependency(
            kind,
            cmp,
            DepPatterns::Reldeps(reldeps.clone()),
        ))
    }

    /// Filters on membership in `packages`.
    pub fn filter_pkg(&mut self, cmp: QueryCmp, packages: &PackageSet) -> Result<&mut Self, QueryError> {
        self.filter(Filter::Pkg(cmp, packages.clone()))
    }

    /// Keeps only the newest versions per name.
    pub fn filter_latest(&mut self) -> Result<&mut Self, QueryError> {
        self.filter(Filter::Latest(true))
    }

    /// Keeps only installed packages.
    pub fn filter_installed(&mut self) -> Result<&mut Self, QueryError> {
        self.filter(Filter::Installed(true))
    }

    /// Keeps only available packages.
    pub fn filter_available(&mut self) -> Result<&mut Self, QueryError> {
        self.filter(Filter::Available(true))
    }

    /// Keeps only available updates of installed packages.
    pub fn filter_upgrades(&mut self) -> Result<&mut Self, QueryError> {
        self.filter(Filter::Upgrades(true))
    }

    /// Evaluates the staged filters. Does nothing if the query was already applied.
    pub fn apply(&mut self) -> Result<&mut Self, QueryError> {
        if let QueryState::Unapplied(filters) = &self.state {
            let pool = self.pool.upgrade()?;
            let result = evaluate(&pool, &self.base, filters);
            tracing::debug!(
                "applied {} filters, {} of {} packages match",
                filters.len(),
                result.count(),
                self.base.count()
            );
            self.state = QueryState::Applied(result);
        }
        Ok(self)
    }

    /// Applies the query and returns a reference to the result.
    fn result(&mut self) -> Result<&SolvMap, QueryError> {
        self.apply()?;
        match &self.state {
            QueryState::Applied(result) => Ok(result),
            QueryState::Unapplied(_) => unreachable!("the query was just applied"),
        }
    }

    /// Computes the result without changing the query.
    fn evaluated(&self) -> Result<SolvMap, QueryError> {
        match &self.state {
            QueryState::Applied(result) => Ok(result.clone()),
            QueryState::Unapplied(filters) => {
                let pool = self.pool.upgrade()?;
                Ok(evaluate(&pool, &self.base, filters))
            }
        }
    }

    /// Applies the query and returns the matching packages in ascending id order.
    pub fn run(&mut self) -> Result<Vec<Package>, QueryError> {
        let pool = self.pool.clone();
        Ok(self
            .result()?
            .iter()
            .map(|id| Package::from_parts(pool.clone(), id))
            .collect())
    }

    /// Applies the query and returns the result as a package set.
    pub fn package_set(&mut self) -> Result<PackageSet, QueryError> {
        let pool = self.pool.clone();
        Ok(PackageSet::from_map(pool, self.result()?.clone()))
    }

    /// Applies the query and returns the number of matching packages.
    pub fn len(&mut self) -> Result<usize, QueryError> {
        Ok(self.result()?.count())
    }

    /// Applies the query and returns true if nothing matched.
    pub fn is_empty(&mut self) -> Result<bool, QueryError> {
        Ok(self.result()?.is_empty())
    }

    /// Drops the staged filters and the result. The query selects every package again that it
    /// selected when it was created.
    pub fn clear(&mut self) -> &mut Self {
        self.state = QueryState::Unapplied(Vec::new());
        self
    }

    fn combine(
        &mut self,
        other: &Query,
        op: impl FnOnce(&mut SolvMap, &SolvMap),
    ) -> Result<&mut Self, QueryError> {
        if !self.pool.same_pool(&other.pool) {
            return Err(QueryError::IncompatiblePool);
        }
        let other = other.evaluated()?;
        let mut result = self.result()?.clone();
        op(&mut result, &other);
        self.state = QueryState::Applied(result);
        Ok(self)
    }

    /// Adds the packages matched by `other`. Both queries are applied first.
    pub fn union(&mut self, other: &Query) -> Result<&mut Self, QueryError> {
        self.combine(other, SolvMap::union)
    }

    /// Keeps the packages also matched by `other`. Both queries are applied first.
    pub fn intersection(&mut self, other: &Query) -> Result<&mut Self, QueryError> {
        self.combine(other, SolvMap::intersect)
    }

    /// Removes the packages matched by `other`. Both queries are applied first.
    pub fn difference(&mut self, other: &Query) -> Result<&mut Self, QueryError> {
        self.combine(other, SolvMap::difference)
    }

    /// A new unapplied query with the same base whose result starts out as `result`.
    fn narrowed(&self, result: SolvMap) -> Query {
        Query {
            pool: self.pool.clone(),
            flags: self.flags,
            base: self.base.clone(),
            state: QueryState::Unapplied(vec![CompiledFilter::Pkg {
                map: result,
                negate: false,
            }]),
        }
    }
}

fn evaluate(pool: &Pool, base: &SolvMap, filters: &[CompiledFilter]) -> SolvMap {
    let mut result = base.clone();
    for filter in filters {
        if result.is_empty() {
            break;
        }
        apply_filter(pool, base, &mut result, filter);
    }
    result
}

fn to_strings(patterns: &[&str]) -> Vec<String> {
    patterns.iter().map(|p| p.to_string()).collect()
}
