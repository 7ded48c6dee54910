//! Repository metadata documents and the code that loads them into a [`Pool`].

use std::{
    ops::{BitOr, BitOrAssign},
    path::Path,
};

use rpmkit_types::{ParsedReldep, RelOperator};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    advisory::Advisory,
    id::{ReldepId, RepoId},
    pool::{PackageData, Pool, RepoData, ReldepData},
};

/// The metadata of a single repository: its packages and optionally its update advisories.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct RepoMetadata {
    /// The unique name of the repository.
    pub name: String,

    /// Lower values are preferred.
    #[serde(default = "default_priority")]
    pub priority: i32,

    /// Lower values are preferred among repositories of the same priority.
    #[serde(default = "default_cost")]
    pub cost: u32,

    /// The packages in the repository.
    #[serde(default)]
    pub packages: Vec<PackageMetadata>,

    /// Update advisories, only loaded with [`LoadRepoFlags::USE_UPDATEINFO`].
    #[serde(default)]
    pub advisories: Vec<Advisory>,
}

fn default_priority() -> i32 {
    99
}

fn default_cost() -> u32 {
    1000
}

impl RepoMetadata {
    /// Creates an empty repository.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priority: default_priority(),
            cost: default_cost(),
            packages: Vec::new(),
            advisories: Vec::new(),
        }
    }

    /// Reads a repository document from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

/// A single package record as found in repository metadata.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct PackageMetadata {
    /// The package name.
    pub name: String,
    /// The epoch, `0` if the metadata does not carry one.
    #[serde(default)]
    pub epoch: u64,
    /// The version.
    pub version: String,
    /// The release.
    pub release: String,
    /// The architecture, `noarch`, `src` and `nosrc` included.
    pub arch: String,

    /// One line summary.
    #[serde(default)]
    pub summary: String,
    /// Long description.
    #[serde(default)]
    pub description: String,
    /// Upstream URL.
    #[serde(default)]
    pub url: String,
    /// License string.
    #[serde(default)]
    pub license: String,
    /// Size of the package file in bytes.
    #[serde(default)]
    pub size: u64,
    /// Size of the installed files in bytes.
    #[serde(default)]
    pub install_size: u64,
    /// Checksum of the package file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    /// The file name of the source package this package was built from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sourcerpm: Option<String>,
    /// Build time as a unix timestamp.
    #[serde(default)]
    pub buildtime: u64,

    /// Provided capabilities.
    #[serde(default)]
    pub provides: Vec<String>,
    /// Required capabilities.
    #[serde(default)]
    pub requires: Vec<String>,
    /// Conflicting capabilities.
    #[serde(default)]
    pub conflicts: Vec<String>,
    /// Obsoleted capabilities.
    #[serde(default)]
    pub obsoletes: Vec<String>,
    /// Weak requirements.
    #[serde(default)]
    pub recommends: Vec<String>,
    /// Hints.
    #[serde(default)]
    pub suggests: Vec<String>,
    /// Reverse weak requirements.
    #[serde(default)]
    pub supplements: Vec<String>,
    /// Reverse hints.
    #[serde(default)]
    pub enhances: Vec<String>,

    /// Files owned by the package.
    #[serde(default)]
    pub files: Vec<String>,
    /// Changelog entries, only loaded with [`LoadRepoFlags::USE_OTHER`].
    #[serde(default)]
    pub changelogs: Vec<Changelog>,
    /// Delta packages, only loaded with [`LoadRepoFlags::USE_PRESTO`].
    #[serde(default)]
    pub deltas: Vec<DeltaRpm>,
}

/// A single changelog entry of a package.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Changelog {
    /// Who wrote the entry.
    pub author: String,
    /// When the entry was written, as a unix timestamp.
    pub timestamp: u64,
    /// The text of the entry.
    pub text: String,
}

/// A delta package that turns an older installed version into this package.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct DeltaRpm {
    /// Location of the delta relative to the repository.
    pub location: String,
    /// The EVR the delta applies to.
    pub base_evr: String,
    /// Download size in bytes.
    #[serde(default)]
    pub size: u64,
    /// Checksum of the delta file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// Selects the optional parts of repository metadata that are loaded.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub struct LoadRepoFlags(u8);

impl LoadRepoFlags {
    /// Only primary metadata.
    pub const NONE: Self = Self(0);
    /// Keep the complete file lists instead of only the primary paths.
    pub const USE_FILELISTS: Self = Self(1 << 0);
    /// Keep delta package records.
    pub const USE_PRESTO: Self = Self(1 << 1);
    /// Load update advisories.
    pub const USE_UPDATEINFO: Self = Self(1 << 2);
    /// Keep changelogs.
    pub const USE_OTHER: Self = Self(1 << 3);
    /// Everything.
    pub const ALL: Self = Self(
        Self::USE_FILELISTS.0 | Self::USE_PRESTO.0 | Self::USE_UPDATEINFO.0 | Self::USE_OTHER.0,
    );

    /// Returns true if every bit of `other` is set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for LoadRepoFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for LoadRepoFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Errors that can occur while loading a repository.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The metadata file could not be read.
    #[error("failed to read repository metadata")]
    Io(#[from] std::io::Error),

    /// The metadata is not a valid repository document.
    #[error("failed to parse repository metadata")]
    Json(#[from] serde_json::Error),

    /// Handles to the pool are still alive, so it cannot be modified.
    #[error("the pool is still referenced by queries or packages")]
    PoolInUse,

    /// A repository with the same name, or a second system repository, was loaded before.
    #[error("repository '{0}' is already loaded")]
    DuplicateRepo(String),
}

/// Returns true for the paths that primary metadata carries: executables and configuration.
pub(crate) fn is_primary_file(path: &str) -> bool {
    path.contains("/bin/")
        || path.contains("/sbin/")
        || path.starts_with("/etc/")
        || path == "/usr/lib/sendmail"
}

/// Adds the repository and its packages to the pool.
pub(crate) fn load_repo(
    pool: &mut Pool,
    metadata: RepoMetadata,
    flags: LoadRepoFlags,
    system: bool,
) -> Result<RepoId, LoadError> {
    if pool.repo_by_name(&metadata.name).is_some() || (system && pool.system_repo().is_some()) {
        return Err(LoadError::DuplicateRepo(metadata.name));
    }

    let repo = pool.add_repo(RepoData {
        name: metadata.name.clone(),
        priority: metadata.priority,
        cost: metadata.cost,
        system,
    });

    let package_count = metadata.packages.len();
    for package in metadata.packages {
        let data = package_data(pool, repo, package, flags);
        pool.add_package(data);
    }

    let mut advisory_count = 0;
    if flags.contains(LoadRepoFlags::USE_UPDATEINFO) {
        advisory_count = metadata.advisories.len();
        for advisory in metadata.advisories {
            pool.add_advisory(advisory);
        }
    }

    tracing::debug!(
        "loaded repository '{}' with {package_count} packages and {advisory_count} advisories",
        metadata.name
    );
    Ok(repo)
}

fn package_data(
    pool: &Pool,
    repo: RepoId,
    package: PackageMetadata,
    flags: LoadRepoFlags,
) -> PackageData {
    let evr = if package.epoch == 0 {
        format!("{}-{}", package.version, package.release)
    } else {
        format!("{}:{}-{}", package.epoch, package.version, package.release)
    };
    let name = pool.intern(&package.name);
    let evr = pool.intern(&evr);

    let nevra = format!("{}-{}.{}", package.name, pool.str(evr), package.arch);
    let mut provides = intern_deps(pool, &nevra, &package.provides);
    let self_provide = pool.intern_reldep(ReldepData {
        name,
        op: Some(RelOperator::Eq),
        evr: Some(evr),
        rich: false,
    });
    if !provides.contains(&self_provide) {
        provides.push(self_provide);
    }

    let files = package
        .files
        .iter()
        .filter(|path| flags.contains(LoadRepoFlags::USE_FILELISTS) || is_primary_file(path))
        .map(|path| pool.intern(path))
        .collect();

    PackageData {
        name,
        epoch: package.epoch,
        version: pool.intern(&package.version),
        release: pool.intern(&package.release),
        arch: pool.intern(&package.arch),
        evr,
        repo,
        summary: package.summary,
        description: package.description,
        url: package.url,
        license: package.license,
        size: package.size,
        install_size: package.install_size,
        checksum: package.checksum,
        sourcerpm: package.sourcerpm,
        buildtime: package.buildtime,
        files,
        changelogs: if flags.contains(LoadRepoFlags::USE_OTHER) {
            package.changelogs
        } else {
            Vec::new()
        },
        deltas: if flags.contains(LoadRepoFlags::USE_PRESTO) {
            package.deltas
        } else {
            Vec::new()
        },
        provides,
        requires: intern_deps(pool, &nevra, &package.requires),
        conflicts: intern_deps(pool, &nevra, &package.conflicts),
        obsoletes: intern_deps(pool, &nevra, &package.obsoletes),
        recommends: intern_deps(pool, &nevra, &package.recommends),
        suggests: intern_deps(pool, &nevra, &package.suggests),
        supplements: intern_deps(pool, &nevra, &package.supplements),
        enhances: intern_deps(pool, &nevra, &package.enhances),
    }
}

fn intern_deps(pool: &Pool, package: &str, deps: &[String]) -> Vec<ReldepId> {
    deps.iter()
        .filter_map(|dep| match dep.parse::<ParsedReldep>() {
            Ok(parsed) => Some(pool.intern_parsed_reldep(&parsed)),
            Err(err) => {
                tracing::warn!("ignoring dependency of {package}: {err}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;
    use tracing_test::traced_test;

    fn package(name: &str, version: &str) -> PackageMetadata {
        PackageMetadata {
            name: name.to_owned(),
            version: version.to_owned(),
            release: "1".to_owned(),
            arch: "x86_64".to_owned(),
            ..Default::default()
        }
    }

    #[rstest]
    #[case("/usr/bin/wget", true)]
    #[case("/usr/sbin/ldconfig", true)]
    #[case("/etc/wgetrc", true)]
    #[case("/usr/lib/sendmail", true)]
    #[case("/usr/share/doc/wget/README", false)]
    #[case("/usr/lib64/libc.so.6", false)]
    fn test_primary_files(#[case] path: &str, #[case] expected: bool) {
        assert_eq!(is_primary_file(path), expected);
    }

    #[test]
    fn test_implicit_self_provide() {
        let mut pool = Pool::new();
        let mut repo = RepoMetadata::new("fedora");
        let mut explicit = package("wget", "1.19.5");
        explicit.provides = vec!["wget = 1.19.5-1".to_owned(), "webclient".to_owned()];
        let mut epoch = package("bash", "5.0");
        epoch.epoch = 2;
        repo.packages = vec![explicit, epoch];
        load_repo(&mut pool, repo, LoadRepoFlags::NONE, false).unwrap();

        let wget = pool.package(crate::PackageId::new(0)).unwrap();
        assert_eq!(wget.provides.len(), 2);

        let bash = pool.package(crate::PackageId::new(1)).unwrap();
        assert_eq!(bash.provides.len(), 1);
        assert_eq!(pool.reldep_to_string(bash.provides[0]).unwrap(), "bash = 2:5.0-1");
    }

    #[test]
    fn test_load_flags() {
        let mut pool = Pool::new();
        let mut repo = RepoMetadata::new("fedora");
        let mut wget = package("wget", "1.19.5");
        wget.files = vec!["/usr/bin/wget".to_owned(), "/usr/share/man/wget.1".to_owned()];
        wget.changelogs = vec![Changelog {
            author: "packager".to_owned(),
            timestamp: 1,
            text: "- rebuilt".to_owned(),
        }];
        repo.packages = vec![wget];
        let mut full = repo.clone();
        full.name = "fedora-full".to_owned();

        load_repo(&mut pool, repo, LoadRepoFlags::NONE, false).unwrap();
        load_repo(&mut pool, full, LoadRepoFlags::ALL, false).unwrap();

        let primary = pool.package(crate::PackageId::new(0)).unwrap();
        assert_eq!(primary.files.len(), 1);
        assert!(primary.changelogs.is_empty());

        let full = pool.package(crate::PackageId::new(1)).unwrap();
        assert_eq!(full.files.len(), 2);
        assert_eq!(full.changelogs.len(), 1);
    }

    #[test]
    #[traced_test]
    fn test_invalid_dependency_is_skipped() {
        let mut pool = Pool::new();
        let mut repo = RepoMetadata::new("fedora");
        let mut wget = package("wget", "1.19.5");
        wget.requires = vec!["libc >= ".to_owned(), "openssl".to_owned()];
        repo.packages = vec![wget];
        load_repo(&mut pool, repo, LoadRepoFlags::NONE, false).unwrap();
        assert_eq!(pool.package(crate::PackageId::new(0)).unwrap().requires.len(), 1);
        assert!(logs_contain("ignoring dependency of wget-1.19.5-1.x86_64"));
    }

    #[test]
    fn test_duplicate_repo() {
        let mut pool = Pool::new();
        load_repo(&mut pool, RepoMetadata::new("fedora"), LoadRepoFlags::NONE, false).unwrap();
        assert_matches!(
            load_repo(&mut pool, RepoMetadata::new("fedora"), LoadRepoFlags::NONE, false),
            Err(LoadError::DuplicateRepo(name)) if name == "fedora"
        );
        load_repo(&mut pool, RepoMetadata::new("@System"), LoadRepoFlags::ALL, true).unwrap();
        assert_matches!(
            load_repo(&mut pool, RepoMetadata::new("rpmdb"), LoadRepoFlags::ALL, true),
            Err(LoadError::DuplicateRepo(_))
        );
    }

    #[test]
    fn test_parse_document() {
        let repo: RepoMetadata = serde_json::from_str(
            r#"{"name": "updates", "packages": [{"name": "wget", "version": "1.0", "release": "1", "arch": "noarch"}]}"#,
        )
        .unwrap();
        assert_eq!(repo.priority, 99);
        assert_eq!(repo.cost, 1000);
        assert_eq!(repo.packages[0].epoch, 0);
    }
}
