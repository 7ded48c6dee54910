//! Feeds the packages of a [`Pool`] to the SAT solver.

use std::{cmp::Ordering, collections::HashSet};

use rpmkit_libsolv_rs::{
    Dependencies, DependencyId, DependencyProvider, NameId, Requirement, SolvableId,
};
use rpmkit_sack::{PackageId, Pool, ReldepId, SolvMap};
use rpmkit_types::compare_evr;

pub(crate) fn solvable_id(package: PackageId) -> SolvableId {
    SolvableId::new(package.index() as u32 + 1)
}

pub(crate) fn package_id(solvable: SolvableId) -> PackageId {
    debug_assert!(solvable.index() > 0, "the root is not a package");
    PackageId::new(solvable.index() - 1)
}

/// Returns true if packages of the two architectures can replace each other.
pub(crate) fn arch_compatible(a: &str, b: &str) -> bool {
    a == b || a == "noarch" || b == "noarch"
}

/// Requirements on these names are satisfied by rpm itself.
fn is_rpmlib(name: &str) -> bool {
    name.starts_with("rpmlib(")
}

/// Describes the visible part of a pool to [`rpmkit_libsolv_rs::Solver`].
///
/// Solvable `n` is package `n - 1`. Packages that are not visible are never offered as
/// candidates, so the solver can only pick installed packages and packages not hidden by
/// excludes.
pub(crate) struct RpmProvider<'p> {
    pool: &'p Pool,
    visible: SolvMap,
    installonly: HashSet<String>,
}

impl<'p> RpmProvider<'p> {
    pub fn new(pool: &'p Pool, visible: SolvMap, installonly: HashSet<String>) -> Self {
        Self {
            pool,
            visible,
            installonly,
        }
    }

    pub fn pool(&self) -> &'p Pool {
        self.pool
    }

    pub fn is_visible(&self, id: PackageId) -> bool {
        self.visible.contains(id)
    }

    pub fn is_installonly(&self, id: PackageId) -> bool {
        self.pool
            .package(id)
            .is_some_and(|p| self.installonly.contains(&*self.pool.str(p.name)))
    }

    pub fn name(&self, id: PackageId) -> std::sync::Arc<str> {
        self.pool.str(self.data(id).name)
    }

    pub fn evr(&self, id: PackageId) -> std::sync::Arc<str> {
        self.pool.str(self.data(id).evr)
    }

    pub fn arch(&self, id: PackageId) -> std::sync::Arc<str> {
        self.pool.str(self.data(id).arch)
    }

    pub fn nevra(&self, id: PackageId) -> String {
        self.pool.package_nevra(id).unwrap_or_default()
    }

    fn data(&self, id: PackageId) -> &'p rpmkit_sack::PackageData {
        self.pool
            .package(id)
            .expect("bug: package ids come from the pool")
    }

    /// Orders packages newest first.
    pub fn compare_newest_first(&self, a: PackageId, b: PackageId) -> Ordering {
        compare_evr(&self.evr(b), &self.evr(a)).then(a.cmp(&b))
    }

    /// Returns true if the two packages have the same name, EVR and a compatible architecture.
    pub fn same_nevra(&self, a: PackageId, b: PackageId) -> bool {
        let (pa, pb) = (self.data(a), self.data(b));
        pa.name == pb.name && pa.evr == pb.evr && pa.arch == pb.arch
    }

    /// The visible packages that satisfy a dependency.
    pub fn providers(&self, dep: ReldepId) -> Vec<PackageId> {
        self.pool
            .whatprovides(dep)
            .into_iter()
            .filter(|&id| self.is_visible(id))
            .collect()
    }

    /// The visible packages with the name of the dependency whose version falls in its range.
    pub fn obsoleted_by(&self, dep: ReldepId) -> Vec<PackageId> {
        let Ok(data) = self.pool.reldep(dep) else {
            return Vec::new();
        };
        self.providers(dep)
            .into_iter()
            .filter(|&id| self.data(id).name == data.name)
            .collect()
    }

    /// Returns true if the dependency takes part in solving.
    fn is_solvable_dep(&self, dep: ReldepId) -> bool {
        self.pool
            .reldep(dep)
            .is_ok_and(|data| !data.rich && !is_rpmlib(&self.pool.str(data.name)))
    }

    /// The requirements of a package, each with its providers ordered by preference: installed
    /// packages first, then newer versions, then packages of the same architecture.
    pub fn requirements(&self, id: PackageId) -> Vec<(ReldepId, Vec<PackageId>)> {
        let arch = self.arch(id);
        self.data(id)
            .requires
            .iter()
            .filter(|&&dep| self.is_solvable_dep(dep))
            .map(|&dep| {
                let mut candidates = self.providers(dep);
                candidates.sort_by(|&a, &b| {
                    let installed = self
                        .pool
                        .is_installed(b)
                        .cmp(&self.pool.is_installed(a));
                    let same_arch = |p| arch_compatible(&self.arch(p), &arch);
                    installed
                        .then_with(|| compare_evr(&self.evr(b), &self.evr(a)))
                        .then_with(|| same_arch(b).cmp(&same_arch(a)))
                        .then(a.cmp(&b))
                });
                (dep, candidates)
            })
            .collect()
    }

    fn conflicts(&self, id: PackageId) -> Vec<(ReldepId, Vec<PackageId>)> {
        let name = self.data(id).name;
        self.data(id)
            .conflicts
            .iter()
            .filter(|&&dep| self.is_solvable_dep(dep))
            .map(|&dep| {
                // Packages may conflict with what they provide themselves, unless the conflict
                // names the package
                let names_self = self.pool.reldep(dep).is_ok_and(|d| d.name == name);
                let candidates = self
                    .providers(dep)
                    .into_iter()
                    .filter(|&other| other != id || names_self)
                    .collect();
                (dep, candidates)
            })
            .collect()
    }

    /// The obsoletes of a package that is not installed. Installed packages obsolete nothing.
    pub fn obsoletes(&self, id: PackageId) -> Vec<(ReldepId, Vec<PackageId>)> {
        if self.pool.is_installed(id) {
            return Vec::new();
        }
        let name = self.data(id).name;
        self.data(id)
            .obsoletes
            .iter()
            .map(|&dep| {
                let candidates = self
                    .obsoleted_by(dep)
                    .into_iter()
                    .filter(|&other| self.data(other).name != name)
                    .collect();
                (dep, candidates)
            })
            .collect()
    }
}

fn requirement(dep: ReldepId, candidates: Vec<PackageId>) -> Requirement {
    Requirement {
        dependency: DependencyId::new(dep.value()),
        candidates: candidates.into_iter().map(solvable_id).collect(),
    }
}

impl DependencyProvider for RpmProvider<'_> {
    fn solvable_count(&self) -> usize {
        self.pool.package_count()
    }

    fn solvable_name(&self, solvable: SolvableId) -> NameId {
        NameId::new(self.data(package_id(solvable)).name.value())
    }

    fn allows_multiple_instances(&self, solvable: SolvableId) -> bool {
        self.is_installonly(package_id(solvable))
    }

    fn get_dependencies(&self, solvable: SolvableId) -> Dependencies {
        let id = package_id(solvable);
        let convert = |deps: Vec<(ReldepId, Vec<PackageId>)>| {
            deps.into_iter()
                .map(|(dep, candidates)| requirement(dep, candidates))
                .collect()
        };
        Dependencies {
            requires: convert(self.requirements(id)),
            conflicts: convert(self.conflicts(id)),
            obsoletes: convert(self.obsoletes(id)),
        }
    }

    fn display_solvable(&self, solvable: SolvableId) -> String {
        self.nevra(package_id(solvable))
    }

    fn display_dependency(&self, dependency: DependencyId) -> String {
        self.pool
            .reldep_to_string(ReldepId::new(dependency.index()))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod test {
    use rpmkit_sack::{LoadRepoFlags, PackageMetadata, RepoMetadata, Sack};

    use super::*;

    fn package(name: &str, version: &str) -> PackageMetadata {
        PackageMetadata {
            name: name.to_owned(),
            version: version.to_owned(),
            release: "1".to_owned(),
            arch: "x86_64".to_owned(),
            ..Default::default()
        }
    }

    fn sack() -> Sack {
        let mut sack = Sack::new();
        let mut system = RepoMetadata::new("@System");
        system.packages = vec![package("libfoo", "1.0")];
        sack.load_system_repo(system).unwrap();

        let mut repo = RepoMetadata::new("repo");
        repo.packages = vec![
            package("libfoo", "2.0"),
            package("libfoo", "1.0"),
            PackageMetadata {
                requires: vec!["libfoo".to_owned(), "rpmlib(CompressedFileNames) <= 3.0.4-1".to_owned()],
                conflicts: vec!["mta".to_owned(), "app".to_owned()],
                provides: vec!["mta".to_owned()],
                obsoletes: vec!["oldapp < 2".to_owned(), "app < 1".to_owned()],
                ..package("app", "1.0")
            },
            package("oldapp", "1.5"),
        ];
        sack.load_repo(repo, LoadRepoFlags::ALL).unwrap();
        sack
    }

    #[test]
    fn test_ids() {
        let id = PackageId::new(4);
        assert_eq!(solvable_id(id), SolvableId::new(5));
        assert_eq!(package_id(solvable_id(id)), id);
    }

    #[test]
    fn test_dependencies() {
        let sack = sack();
        let pool = sack.pool();
        let visible = SolvMap::full(pool.package_count());
        let provider = RpmProvider::new(pool, visible, HashSet::new());
        let app = solvable_id(PackageId::new(3));

        let deps = provider.get_dependencies(app);

        // rpmlib() requirements are dropped, installed providers come first
        assert_eq!(deps.requires.len(), 1);
        let candidates: Vec<_> = deps.requires[0]
            .candidates
            .iter()
            .map(|&s| provider.display_solvable(s))
            .collect();
        assert_eq!(
            candidates,
            ["libfoo-1.0-1.x86_64", "libfoo-2.0-1.x86_64", "libfoo-1.0-1.x86_64"]
        );
        assert_eq!(provider.display_dependency(deps.requires[0].dependency), "libfoo");

        // Conflicting with an own provide is fine, conflicting with the own name is not
        assert_eq!(deps.conflicts.len(), 2);
        assert!(deps.conflicts[0].candidates.is_empty());
        assert_eq!(deps.conflicts[1].candidates, [app]);

        // Obsoletes match names, not provides, and never the package itself
        assert_eq!(deps.obsoletes[0].candidates, [solvable_id(PackageId::new(4))]);
        assert!(deps.obsoletes[1].candidates.is_empty());
    }

    #[test]
    fn test_visibility() {
        let sack = sack();
        let pool = sack.pool();
        let mut visible = SolvMap::new(pool.package_count());
        visible.add(PackageId::new(0)).unwrap();
        visible.add(PackageId::new(3)).unwrap();
        let provider = RpmProvider::new(pool, visible, HashSet::from(["libfoo".to_owned()]));

        let deps = provider.get_dependencies(solvable_id(PackageId::new(3)));
        assert_eq!(deps.requires[0].candidates, [solvable_id(PackageId::new(0))]);
        assert!(provider.allows_multiple_instances(solvable_id(PackageId::new(1))));
        assert!(!provider.allows_multiple_instances(solvable_id(PackageId::new(3))));
    }
}
