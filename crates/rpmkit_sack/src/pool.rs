//! The [`Pool`] owns every string, dependency and package record. Everything else refers to its
//! contents by id.

use std::{
    collections::{HashMap, HashSet},
    fmt::{Debug, Formatter},
    sync::{Arc, Weak},
};

use indexmap::IndexSet;
use parking_lot::RwLock;
use rpmkit_types::{ranges_overlap, ParsedReldep, RelOperator};
use strum::{Display, EnumIter};
use thiserror::Error;

use crate::{
    advisory::Advisory,
    exclude_flags::ExcludeFlags,
    id::{PackageId, RepoId, ReldepId, StringId},
    repo::{Changelog, DeltaRpm},
    solv_map::SolvMap,
};

/// Errors that occur when resolving ids against a pool.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Error)]
pub enum PoolError {
    /// The id does not refer to anything in the pool.
    #[error("invalid id {0}")]
    InvalidId(u32),

    /// The pool the handle refers to no longer exists.
    #[error("the pool was dropped or reset")]
    PoolDropped,
}

/// The kinds of dependencies a package carries.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum DepKind {
    /// Capabilities the package offers.
    Provides,
    /// Capabilities that must be installed with the package.
    Requires,
    /// Capabilities that may not be installed with the package.
    Conflicts,
    /// Packages that are replaced by the package.
    Obsoletes,
    /// Weak requirements.
    Recommends,
    /// Hints for additional packages.
    Suggests,
    /// Reverse weak requirements.
    Supplements,
    /// Reverse hints.
    Enhances,
}

/// The parts of an interned relational dependency.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ReldepData {
    /// The dependency name. For rich dependencies the complete expression.
    pub name: StringId,
    /// The comparison, `None` for unversioned dependencies.
    pub op: Option<RelOperator>,
    /// The EVR the comparison refers to.
    pub evr: Option<StringId>,
    /// True for boolean dependencies, which are kept opaque.
    pub rich: bool,
}

/// A repository the packages of the pool come from.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RepoData {
    /// The unique name of the repository.
    pub name: String,
    /// Lower values are preferred.
    pub priority: i32,
    /// Lower values are preferred among repositories of the same priority.
    pub cost: u32,
    /// True for the repository of installed packages.
    pub system: bool,
}

/// The record of a single package.
#[derive(Debug, Clone)]
pub struct PackageData {
    /// The package name.
    pub name: StringId,
    /// The epoch, `0` when the metadata carries none.
    pub epoch: u64,
    /// The version.
    pub version: StringId,
    /// The release.
    pub release: StringId,
    /// The architecture.
    pub arch: StringId,
    /// `[epoch:]version-release`, the epoch is omitted when it is `0`.
    pub evr: StringId,
    /// The repository the package was loaded from.
    pub repo: RepoId,
    /// One line summary.
    pub summary: String,
    /// Long description.
    pub description: String,
    /// Upstream URL.
    pub url: String,
    /// License string.
    pub license: String,
    /// Size of the package file in bytes.
    pub size: u64,
    /// Size of the installed files in bytes.
    pub install_size: u64,
    /// Checksum of the package file.
    pub checksum: Option<String>,
    /// File name of the source package.
    pub sourcerpm: Option<String>,
    /// Build time as a unix timestamp.
    pub buildtime: u64,
    /// Files owned by the package.
    pub files: Vec<StringId>,
    /// Changelog entries.
    pub changelogs: Vec<Changelog>,
    /// Delta packages.
    pub deltas: Vec<DeltaRpm>,
    /// Provided capabilities, including the implicit `name = evr`.
    pub provides: Vec<ReldepId>,
    /// Required capabilities.
    pub requires: Vec<ReldepId>,
    /// Conflicting capabilities.
    pub conflicts: Vec<ReldepId>,
    /// Obsoleted capabilities.
    pub obsoletes: Vec<ReldepId>,
    /// Weak requirements.
    pub recommends: Vec<ReldepId>,
    /// Hints.
    pub suggests: Vec<ReldepId>,
    /// Reverse weak requirements.
    pub supplements: Vec<ReldepId>,
    /// Reverse hints.
    pub enhances: Vec<ReldepId>,
}

impl PackageData {
    /// The dependencies of the given kind.
    pub fn deps(&self, kind: DepKind) -> &[ReldepId] {
        match kind {
            DepKind::Provides => &self.provides,
            DepKind::Requires => &self.requires,
            DepKind::Conflicts => &self.conflicts,
            DepKind::Obsoletes => &self.obsoletes,
            DepKind::Recommends => &self.recommends,
            DepKind::Suggests => &self.suggests,
            DepKind::Supplements => &self.supplements,
            DepKind::Enhances => &self.enhances,
        }
    }
}

#[derive(Default)]
struct Excludes {
    regular: Option<SolvMap>,
    modular: Option<SolvMap>,
    includes: Option<SolvMap>,
}

/// Stores the interned strings, dependencies and package records of a package universe.
///
/// Strings and dependencies can be interned through a shared reference, so handles can add new
/// dependencies while queries read the pool. Packages and repositories are only added while
/// loading, which requires exclusive access.
#[derive(Default)]
pub struct Pool {
    strings: RwLock<IndexSet<Arc<str>>>,
    reldeps: RwLock<IndexSet<ReldepData>>,

    repos: Vec<RepoData>,
    packages: Vec<PackageData>,
    advisories: Vec<Arc<Advisory>>,

    /// Maps a provided name to the packages providing it
    provides: HashMap<StringId, Vec<(PackageId, ReldepId)>>,

    /// Maps a file path to the packages containing it
    files: HashMap<StringId, Vec<PackageId>>,

    excludes: RwLock<Excludes>,
    installonly: RwLock<HashSet<String>>,
}

impl Debug for Pool {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("repos", &self.repos)
            .field("packages", &self.packages.len())
            .field("strings", &self.strings.read().len())
            .field("reldeps", &self.reldeps.read().len())
            .finish()
    }
}

impl Pool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns a string into the pool, returning its [`StringId`]. Interning the same string
    /// twice returns the same id.
    pub fn intern(&self, value: &str) -> StringId {
        if let Some(id) = self.lookup(value) {
            return id;
        }
        let (index, _) = self.strings.write().insert_full(Arc::from(value));
        StringId::from_index(index)
    }

    /// Returns the id of a string that was interned before.
    pub fn lookup(&self, value: &str) -> Option<StringId> {
        self.strings
            .read()
            .get_index_of(value)
            .map(StringId::from_index)
    }

    /// Returns the string associated with the id.
    pub fn resolve(&self, id: StringId) -> Result<Arc<str>, PoolError> {
        id.to_index()
            .and_then(|index| self.strings.read().get_index(index).cloned())
            .ok_or(PoolError::InvalidId(id.value()))
    }

    /// Returns the string associated with an id handed out by this pool.
    ///
    /// Panics if the id was not created by this pool.
    pub fn str(&self, id: StringId) -> Arc<str> {
        let index = id.to_index().expect("bug: the null string id was stored");
        self.strings.read()[index].clone()
    }

    /// Interns a dependency and returns its id. Identical dependencies share an id.
    pub fn intern_reldep(&self, reldep: ReldepData) -> ReldepId {
        if let Some(index) = self.reldeps.read().get_index_of(&reldep) {
            return ReldepId::from_index(index);
        }
        let (index, _) = self.reldeps.write().insert_full(reldep);
        ReldepId::from_index(index)
    }

    /// Interns a parsed dependency string.
    pub fn intern_parsed_reldep(&self, reldep: &ParsedReldep) -> ReldepId {
        let data = ReldepData {
            name: self.intern(&reldep.name),
            op: reldep.op,
            evr: reldep.version.as_deref().map(|evr| self.intern(evr)),
            rich: reldep.rich,
        };
        self.intern_reldep(data)
    }

    /// Returns the parts of a dependency.
    pub fn reldep(&self, id: ReldepId) -> Result<ReldepData, PoolError> {
        self.reldeps
            .read()
            .get_index(id.index())
            .copied()
            .ok_or(PoolError::InvalidId(id.value()))
    }

    /// Formats a dependency as `name [op evr]`.
    pub fn reldep_to_string(&self, id: ReldepId) -> Result<String, PoolError> {
        let reldep = self.reldep(id)?;
        let name = self.resolve(reldep.name)?;
        Ok(match (reldep.op, reldep.evr) {
            (Some(op), Some(evr)) => format!("{name} {op} {}", self.resolve(evr)?),
            _ => name.to_string(),
        })
    }

    /// The number of packages in the pool.
    pub fn package_count(&self) -> usize {
        self.packages.len()
    }

    /// Returns the record of a package.
    pub fn package(&self, id: PackageId) -> Option<&PackageData> {
        self.packages.get(id.index())
    }

    /// Iterates over all packages in id order.
    pub fn packages(&self) -> impl Iterator<Item = (PackageId, &PackageData)> + '_ {
        self.packages
            .iter()
            .enumerate()
            .map(|(index, package)| (PackageId::from_index(index), package))
    }

    /// The repositories in load order.
    pub fn repos(&self) -> impl Iterator<Item = (RepoId, &RepoData)> + '_ {
        self.repos
            .iter()
            .enumerate()
            .map(|(index, repo)| (RepoId::from_index(index), repo))
    }

    /// Returns a repository by id.
    pub fn repo(&self, id: RepoId) -> Option<&RepoData> {
        self.repos.get(id.index())
    }

    /// Returns a repository by name.
    pub fn repo_by_name(&self, name: &str) -> Option<RepoId> {
        self.repos
            .iter()
            .position(|repo| repo.name == name)
            .map(RepoId::from_index)
    }

    /// The repository of installed packages, if one was loaded.
    pub fn system_repo(&self) -> Option<RepoId> {
        self.repos
            .iter()
            .position(|repo| repo.system)
            .map(RepoId::from_index)
    }

    /// Returns true if the package comes from the system repository.
    pub fn is_installed(&self, id: PackageId) -> bool {
        self.package(id)
            .and_then(|package| self.repo(package.repo))
            .is_some_and(|repo| repo.system)
    }

    /// The update advisories that were loaded.
    pub fn advisories(&self) -> &[Arc<Advisory>] {
        &self.advisories
    }

    /// Formats a package as `name-[epoch:]version-release.arch`.
    pub fn package_nevra(&self, id: PackageId) -> Option<String> {
        let package = self.package(id)?;
        Some(format!(
            "{}-{}.{}",
            self.str(package.name),
            self.str(package.evr),
            self.str(package.arch)
        ))
    }

    /// Formats a package as `name-epoch:version-release.arch`, always including the epoch.
    pub fn package_full_nevra(&self, id: PackageId) -> Option<String> {
        let package = self.package(id)?;
        Some(format!(
            "{}-{}:{}-{}.{}",
            self.str(package.name),
            package.epoch,
            self.str(package.version),
            self.str(package.release),
            self.str(package.arch)
        ))
    }

    /// Returns the packages that provide the dependency.
    ///
    /// Names starting with `/` also match the files of packages. Rich dependencies are only
    /// provided by packages that provide the complete expression.
    pub fn whatprovides(&self, reldep: ReldepId) -> Vec<PackageId> {
        let Ok(dep) = self.reldep(reldep) else {
            return Vec::new();
        };

        let mut result = Vec::new();
        if let Some(providers) = self.provides.get(&dep.name) {
            for &(package, provide) in providers {
                if self.provide_matches(&dep, provide) {
                    result.push(package);
                }
            }
        }

        if !dep.rich && self.str(dep.name).starts_with('/') {
            if let Some(packages) = self.files.get(&dep.name) {
                result.extend(packages.iter().copied());
            }
        }

        result.sort();
        result.dedup();
        result
    }

    /// Returns true if the provide satisfies the version range of `dep`.
    pub(crate) fn provide_matches(&self, dep: &ReldepData, provide: ReldepId) -> bool {
        let Ok(provide) = self.reldep(provide) else {
            return false;
        };
        self.ranges_overlap(dep, &provide)
    }

    /// Returns true if two dependencies with the same name can be satisfied together.
    pub(crate) fn ranges_overlap(&self, a: &ReldepData, b: &ReldepData) -> bool {
        match (a.op.zip(a.evr), b.op.zip(b.evr)) {
            (Some((op1, evr1)), Some((op2, evr2))) => {
                ranges_overlap(Some(op1), &self.str(evr1), Some(op2), &self.str(evr2))
            }
            _ => true,
        }
    }

    /// Iterates over all provides in package order, together with the providing package.
    pub(crate) fn all_provides(&self) -> impl Iterator<Item = (PackageId, ReldepId)> + '_ {
        self.packages()
            .flat_map(|(id, package)| package.provides.iter().map(move |&dep| (id, dep)))
    }

    /// Returns the packages that contain the file.
    pub(crate) fn packages_with_file(&self, path: &str) -> &[PackageId] {
        self.lookup(path)
            .and_then(|id| self.files.get(&id))
            .map_or(&[], Vec::as_slice)
    }

    pub(crate) fn add_repo(&mut self, repo: RepoData) -> RepoId {
        self.repos.push(repo);
        RepoId::from_index(self.repos.len() - 1)
    }

    pub(crate) fn add_package(&mut self, package: PackageData) -> PackageId {
        let id = PackageId::from_index(self.packages.len());
        for &provide in &package.provides {
            if let Ok(dep) = self.reldep(provide) {
                self.provides.entry(dep.name).or_default().push((id, provide));
            }
        }
        for &file in &package.files {
            self.files.entry(file).or_default().push(id);
        }
        self.packages.push(package);
        id
    }

    pub(crate) fn add_advisory(&mut self, advisory: Advisory) {
        self.advisories.push(Arc::new(advisory));
    }

    /// Returns the packages that are hidden from a query created with `flags`.
    pub(crate) fn excluded(&self, flags: ExcludeFlags) -> SolvMap {
        let mut result = SolvMap::new(self.package_count());
        let excludes = self.excludes.read();
        if !flags.contains(ExcludeFlags::IGNORE_REGULAR_EXCLUDES) {
            if let Some(regular) = &excludes.regular {
                result.union(regular);
            }
            if let Some(includes) = &excludes.includes {
                for (id, _) in self.packages() {
                    if !self.is_installed(id) && !includes.contains(id) {
                        result.add(id).expect("bug: map is sized to the pool");
                    }
                }
            }
        }
        if !flags.contains(ExcludeFlags::IGNORE_MODULAR_EXCLUDES) {
            if let Some(modular) = &excludes.modular {
                result.union(modular);
            }
        }
        result
    }

    pub(crate) fn add_excludes(&self, map: &SolvMap) {
        self.excludes
            .write()
            .regular
            .get_or_insert_with(|| SolvMap::new(0))
            .union(map);
    }

    pub(crate) fn add_module_excludes(&self, map: &SolvMap) {
        self.excludes
            .write()
            .modular
            .get_or_insert_with(|| SolvMap::new(0))
            .union(map);
    }

    pub(crate) fn add_includes(&self, map: &SolvMap) {
        self.excludes
            .write()
            .includes
            .get_or_insert_with(|| SolvMap::new(0))
            .union(map);
    }

    pub(crate) fn clear_excludes(&self) {
        *self.excludes.write() = Excludes::default();
    }

    /// Names of packages that may be installed in several versions at once.
    pub fn installonly(&self) -> HashSet<String> {
        self.installonly.read().clone()
    }

    pub(crate) fn set_installonly(&self, names: impl IntoIterator<Item = String>) {
        *self.installonly.write() = names.into_iter().collect();
    }
}

/// A non-owning handle to a [`Pool`].
///
/// Handles do not keep the pool alive. Once the pool is dropped, or replaced by
/// [`crate::Sack::reset`], every operation through the handle fails with
/// [`PoolError::PoolDropped`].
#[derive(Clone, Debug)]
pub struct PoolRef(Weak<Pool>);

impl PoolRef {
    /// Returns the pool, or an error if it no longer exists.
    pub fn upgrade(&self) -> Result<Arc<Pool>, PoolError> {
        self.0.upgrade().ok_or(PoolError::PoolDropped)
    }

    /// Returns true if the pool still exists.
    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }

    /// Returns true if both handles refer to the same pool.
    pub fn same_pool(&self, other: &PoolRef) -> bool {
        Weak::ptr_eq(&self.0, &other.0)
    }
}

impl From<&Arc<Pool>> for PoolRef {
    fn from(pool: &Arc<Pool>) -> Self {
        PoolRef(Arc::downgrade(pool))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_intern_is_deterministic() {
        let pool = Pool::new();
        let a = pool.intern("glibc");
        let b = pool.intern("bash");
        assert_ne!(a, b);
        assert_eq!(pool.intern("glibc"), a);
        assert_eq!(pool.lookup("bash"), Some(b));
        assert_eq!(pool.lookup("zsh"), None);
        assert_eq!(&*pool.resolve(a).unwrap(), "glibc");
    }

    #[test]
    fn test_resolve_invalid_id() {
        let pool = Pool::new();
        pool.intern("glibc");
        assert_matches!(pool.resolve(StringId::new(0)), Err(PoolError::InvalidId(0)));
        assert_matches!(pool.resolve(StringId::new(2)), Err(PoolError::InvalidId(2)));
    }

    #[test]
    fn test_reldeps_are_interned() {
        let pool = Pool::new();
        let a = pool.intern_parsed_reldep(&"glibc >= 2.28".parse().unwrap());
        let b = pool.intern_parsed_reldep(&"glibc >= 2.28".parse().unwrap());
        let c = pool.intern_parsed_reldep(&"glibc".parse().unwrap());
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(pool.reldep_to_string(a).unwrap(), "glibc >= 2.28");
        assert_eq!(pool.reldep_to_string(c).unwrap(), "glibc");
        assert_matches!(pool.reldep(ReldepId::new(42)), Err(PoolError::InvalidId(42)));
    }

    #[test]
    fn test_pool_ref_liveness() {
        let pool = Arc::new(Pool::new());
        let handle = PoolRef::from(&pool);
        let other = PoolRef::from(&Arc::new(Pool::new()));
        assert!(handle.is_alive());
        assert!(handle.same_pool(&handle.clone()));
        assert!(!handle.same_pool(&other));
        assert!(!other.is_alive());

        drop(pool);
        assert_matches!(handle.upgrade(), Err(PoolError::PoolDropped));
    }
}
