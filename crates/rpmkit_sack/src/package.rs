use std::{
    cmp::Ordering,
    fmt::{Display, Formatter},
    hash::{Hash, Hasher},
};

use rpmkit_types::{compare_evr, rpmvercmp};

use crate::{
    pool::{DepKind, PackageData, Pool, PoolError, PoolRef},
    repo::{Changelog, DeltaRpm},
    PackageId, ReldepList, RepoId,
};

/// A handle to a package in a pool.
///
/// The handle does not copy any data, every accessor reads from the pool. Accessors fail with
/// [`PoolError::PoolDropped`] once the pool is gone.
#[derive(Debug, Clone)]
pub struct Package {
    pool: PoolRef,
    id: PackageId,
}

impl Package {
    /// Creates a handle, checking that the id exists in the pool.
    pub fn new(pool: &PoolRef, id: PackageId) -> Result<Self, PoolError> {
        if id.index() >= pool.upgrade()?.package_count() {
            return Err(PoolError::InvalidId(id.index() as u32));
        }
        Ok(Self::from_parts(pool.clone(), id))
    }

    pub(crate) fn from_parts(pool: PoolRef, id: PackageId) -> Self {
        Self { pool, id }
    }

    /// The id of the package.
    pub fn id(&self) -> PackageId {
        self.id
    }

    /// The pool the package belongs to.
    pub fn pool(&self) -> &PoolRef {
        &self.pool
    }

    fn with<T>(&self, f: impl FnOnce(&Pool, &PackageData) -> T) -> Result<T, PoolError> {
        let pool = self.pool.upgrade()?;
        let data = pool
            .package(self.id)
            .ok_or(PoolError::InvalidId(self.id.index() as u32))?;
        Ok(f(&pool, data))
    }

    /// The package name.
    pub fn name(&self) -> Result<String, PoolError> {
        self.with(|pool, p| pool.str(p.name).to_string())
    }

    /// The epoch, `0` if none is set.
    pub fn epoch(&self) -> Result<u64, PoolError> {
        self.with(|_, p| p.epoch)
    }

    /// The version.
    pub fn version(&self) -> Result<String, PoolError> {
        self.with(|pool, p| pool.str(p.version).to_string())
    }

    /// The release.
    pub fn release(&self) -> Result<String, PoolError> {
        self.with(|pool, p| pool.str(p.release).to_string())
    }

    /// The architecture.
    pub fn arch(&self) -> Result<String, PoolError> {
        self.with(|pool, p| pool.str(p.arch).to_string())
    }

    /// `[epoch:]version-release`, without the epoch when it is `0`.
    pub fn evr(&self) -> Result<String, PoolError> {
        self.with(|pool, p| pool.str(p.evr).to_string())
    }

    /// `name-[epoch:]version-release.arch`
    pub fn nevra(&self) -> Result<String, PoolError> {
        let pool = self.pool.upgrade()?;
        pool.package_nevra(self.id)
            .ok_or(PoolError::InvalidId(self.id.index() as u32))
    }

    /// `name-epoch:version-release.arch`, always with the epoch.
    pub fn full_nevra(&self) -> Result<String, PoolError> {
        let pool = self.pool.upgrade()?;
        pool.package_full_nevra(self.id)
            .ok_or(PoolError::InvalidId(self.id.index() as u32))
    }

    /// `name.arch`
    pub fn na(&self) -> Result<String, PoolError> {
        self.with(|pool, p| format!("{}.{}", pool.str(p.name), pool.str(p.arch)))
    }

    /// One line summary.
    pub fn summary(&self) -> Result<String, PoolError> {
        self.with(|_, p| p.summary.clone())
    }

    /// Long description.
    pub fn description(&self) -> Result<String, PoolError> {
        self.with(|_, p| p.description.clone())
    }

    /// Upstream URL.
    pub fn url(&self) -> Result<String, PoolError> {
        self.with(|_, p| p.url.clone())
    }

    /// License string.
    pub fn license(&self) -> Result<String, PoolError> {
        self.with(|_, p| p.license.clone())
    }

    /// Size of the package file in bytes.
    pub fn size(&self) -> Result<u64, PoolError> {
        self.with(|_, p| p.size)
    }

    /// Size of the installed files in bytes.
    pub fn install_size(&self) -> Result<u64, PoolError> {
        self.with(|_, p| p.install_size)
    }

    /// Checksum of the package file.
    pub fn checksum(&self) -> Result<Option<String>, PoolError> {
        self.with(|_, p| p.checksum.clone())
    }

    /// File name of the source package.
    pub fn sourcerpm(&self) -> Result<Option<String>, PoolError> {
        self.with(|_, p| p.sourcerpm.clone())
    }

    /// Build time as a unix timestamp.
    pub fn buildtime(&self) -> Result<u64, PoolError> {
        self.with(|_, p| p.buildtime)
    }

    /// Files owned by the package. Only primary paths unless file lists were loaded.
    pub fn files(&self) -> Result<Vec<String>, PoolError> {
        self.with(|pool, p| p.files.iter().map(|&f| pool.str(f).to_string()).collect())
    }

    /// Changelog entries.
    pub fn changelogs(&self) -> Result<Vec<Changelog>, PoolError> {
        self.with(|_, p| p.changelogs.clone())
    }

    /// Delta packages.
    pub fn deltas(&self) -> Result<Vec<DeltaRpm>, PoolError> {
        self.with(|_, p| p.deltas.clone())
    }

    /// The dependencies of the given kind.
    pub fn deps(&self, kind: DepKind) -> Result<ReldepList, PoolError> {
        self.with(|_, p| ReldepList::from_ids(self.pool.clone(), p.deps(kind).to_vec()))
    }

    /// Provided capabilities.
    pub fn provides(&self) -> Result<ReldepList, PoolError> {
        self.deps(DepKind::Provides)
    }

    /// Required capabilities.
    pub fn requires(&self) -> Result<ReldepList, PoolError> {
        self.deps(DepKind::Requires)
    }

    /// Conflicting capabilities.
    pub fn conflicts(&self) -> Result<ReldepList, PoolError> {
        self.deps(DepKind::Conflicts)
    }

    /// Obsoleted capabilities.
    pub fn obsoletes(&self) -> Result<ReldepList, PoolError> {
        self.deps(DepKind::Obsoletes)
    }

    /// Weak requirements.
    pub fn recommends(&self) -> Result<ReldepList, PoolError> {
        self.deps(DepKind::Recommends)
    }

    /// Hints.
    pub fn suggests(&self) -> Result<ReldepList, PoolError> {
        self.deps(DepKind::Suggests)
    }

    /// Reverse weak requirements.
    pub fn supplements(&self) -> Result<ReldepList, PoolError> {
        self.deps(DepKind::Supplements)
    }

    /// Reverse hints.
    pub fn enhances(&self) -> Result<ReldepList, PoolError> {
        self.deps(DepKind::Enhances)
    }

    /// The repository the package was loaded from.
    pub fn repo_id(&self) -> Result<RepoId, PoolError> {
        self.with(|_, p| p.repo)
    }

    /// The name of the repository the package was loaded from.
    pub fn repo_name(&self) -> Result<String, PoolError> {
        self.with(|pool, p| {
            pool.repo(p.repo)
                .map(|repo| repo.name.clone())
                .unwrap_or_default()
        })
    }

    /// Returns true if the package comes from the system repository.
    pub fn is_installed(&self) -> Result<bool, PoolError> {
        Ok(self.pool.upgrade()?.is_installed(self.id))
    }

    /// Orders by name, then EVR, then architecture.
    pub fn compare_nevra(&self, other: &Package) -> Result<Ordering, PoolError> {
        let pool = self.pool.upgrade()?;
        let other_pool = other.pool.upgrade()?;
        let invalid = |id: PackageId| PoolError::InvalidId(id.index() as u32);
        let a = pool.package(self.id).ok_or(invalid(self.id))?;
        let b = other_pool.package(other.id).ok_or(invalid(other.id))?;
        Ok(pool
            .str(a.name)
            .cmp(&other_pool.str(b.name))
            .then_with(|| compare_evr(&pool.str(a.evr), &other_pool.str(b.evr)))
            .then_with(|| rpmvercmp(&pool.str(a.arch), &other_pool.str(b.arch))))
    }
}

impl PartialEq for Package {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.pool.same_pool(&other.pool)
    }
}

impl Eq for Package {}

impl Hash for Package {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Display for Package {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.nevra() {
            Ok(nevra) => f.write_str(&nevra),
            Err(_) => write!(f, "<package {} of a dropped pool>", self.id),
        }
    }
}

#[cfg(test)]
mod test {
    use assert_matches::assert_matches;

    use super::*;
    use crate::{test_utils::sack_with, PackageMetadata};

    #[test]
    fn test_accessors() {
        let sack = sack_with(&[PackageMetadata {
            name: "wget".to_owned(),
            epoch: 0,
            version: "1.19.5".to_owned(),
            release: "5.fc29".to_owned(),
            arch: "x86_64".to_owned(),
            summary: "A utility for retrieving files".to_owned(),
            size: 42,
            files: vec!["/usr/bin/wget".to_owned()],
            requires: vec!["libc.so.6".to_owned()],
            ..Default::default()
        }]);
        let package = Package::new(&sack.pool_ref(), PackageId::new(0)).unwrap();

        assert_eq!(package.name().unwrap(), "wget");
        assert_eq!(package.evr().unwrap(), "1.19.5-5.fc29");
        assert_eq!(package.nevra().unwrap(), "wget-1.19.5-5.fc29.x86_64");
        assert_eq!(package.full_nevra().unwrap(), "wget-0:1.19.5-5.fc29.x86_64");
        assert_eq!(package.na().unwrap(), "wget.x86_64");
        assert_eq!(package.summary().unwrap(), "A utility for retrieving files");
        assert_eq!(package.size().unwrap(), 42);
        assert_eq!(package.files().unwrap(), ["/usr/bin/wget"]);
        assert_eq!(package.requires().unwrap().len(), 1);
        assert_eq!(package.provides().unwrap().len(), 1);
        assert_eq!(package.repo_name().unwrap(), "test");
        assert!(!package.is_installed().unwrap());
        assert_eq!(package.to_string(), "wget-1.19.5-5.fc29.x86_64");
    }

    #[test]
    fn test_invalid_id() {
        let sack = sack_with(&[]);
        assert_matches!(
            Package::new(&sack.pool_ref(), PackageId::new(3)),
            Err(PoolError::InvalidId(3))
        );
    }

    #[test]
    fn test_dropped_pool() {
        let mut sack = sack_with(&[PackageMetadata {
            name: "wget".to_owned(),
            version: "1.0".to_owned(),
            release: "1".to_owned(),
            arch: "noarch".to_owned(),
            ..Default::default()
        }]);
        let package = Package::new(&sack.pool_ref(), PackageId::new(0)).unwrap();
        sack.reset();
        assert_matches!(package.name(), Err(PoolError::PoolDropped));
        assert_eq!(package.to_string(), "<package 0 of a dropped pool>");
    }
}
