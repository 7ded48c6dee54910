//! Update advisories (errata) and the query to search them.

use std::sync::Arc;

use rpmkit_types::{compare_evr, QueryCmp, StringMatcher, StringMatcherParseError};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{
    pool::{Pool, PoolRef},
    query::QueryError,
    PackageSet,
};

/// The kind of an advisory.
#[derive(
    Debug, Default, Copy, Clone, Eq, PartialEq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AdvisoryKind {
    /// Fixes a security issue.
    Security,
    /// Fixes bugs.
    Bugfix,
    /// Adds features.
    Enhancement,
    /// Introduces a new package.
    Newpackage,
    /// Anything else.
    #[default]
    #[serde(other)]
    Unknown,
}

/// The kind of an external reference of an advisory.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    /// A CVE identifier.
    Cve,
    /// A bug tracker entry.
    Bugzilla,
    /// A vendor specific reference.
    Vendor,
}

/// A reference to an external resource like a CVE or a bug.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct AdvisoryReference {
    /// The kind of reference.
    #[serde(rename = "type")]
    pub kind: ReferenceKind,
    /// The identifier within the referenced system.
    pub id: String,
    /// Where to find the reference.
    #[serde(default)]
    pub url: String,
    /// The title of the referenced resource.
    #[serde(default)]
    pub title: String,
}

/// A package version fixed by an advisory.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct AdvisoryPackage {
    /// The package name.
    pub name: String,
    /// The epoch.
    #[serde(default)]
    pub epoch: u64,
    /// The version.
    pub version: String,
    /// The release.
    pub release: String,
    /// The architecture.
    pub arch: String,
    /// The file name of the package.
    #[serde(default)]
    pub filename: String,
}

impl AdvisoryPackage {
    /// `[epoch:]version-release`, the epoch is omitted when it is `0`.
    pub fn evr(&self) -> String {
        if self.epoch == 0 {
            format!("{}-{}", self.version, self.release)
        } else {
            format!("{}:{}-{}", self.epoch, self.version, self.release)
        }
    }
}

/// An update advisory.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Advisory {
    /// The unique advisory id, for example `FEDORA-2019-0a1b2c`.
    pub name: String,
    /// The kind of update.
    #[serde(rename = "type", default)]
    pub kind: AdvisoryKind,
    /// The severity, empty if unknown.
    #[serde(default)]
    pub severity: String,
    /// Publication time as a unix timestamp.
    #[serde(default)]
    pub buildtime: u64,
    /// A short title.
    #[serde(default)]
    pub title: String,
    /// External references.
    #[serde(default)]
    pub references: Vec<AdvisoryReference>,
    /// The fixed package versions.
    #[serde(default)]
    pub packages: Vec<AdvisoryPackage>,
}

/// Searches the advisories loaded into a pool.
///
/// Unlike [`crate::Query`] filters are evaluated immediately, every filter narrows the current
/// result.
#[derive(Debug, Clone)]
pub struct AdvisoryQuery {
    pool: PoolRef,
    advisories: Vec<Arc<Advisory>>,
}

impl AdvisoryQuery {
    /// Creates a query over every advisory of the pool.
    pub fn new(pool: &PoolRef) -> Result<Self, QueryError> {
        Ok(Self::from_pool(&pool.upgrade()?))
    }

    /// Creates a query over every advisory of the pool.
    pub fn from_pool(pool: &Arc<Pool>) -> Self {
        Self {
            pool: PoolRef::from(pool),
            advisories: pool.advisories().to_vec(),
        }
    }

    fn retain_strings(
        &mut self,
        key: &str,
        cmp: QueryCmp,
        patterns: &[&str],
        values: impl Fn(&Advisory) -> Vec<&str>,
    ) -> Result<&mut Self, QueryError> {
        let matchers = patterns
            .iter()
            .map(|pattern| StringMatcher::new(cmp, pattern))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| match err {
                StringMatcherParseError::UnsupportedCmp(cmp) => QueryError::NotSupportedCmpType {
                    key: key.to_owned(),
                    cmp,
                },
                err => QueryError::InvalidPattern(err),
            })?;
        let negate = cmp.is_negated();
        self.advisories.retain(|advisory| {
            let matched = values(advisory)
                .into_iter()
                .any(|value| matchers.iter().any(|m| m.matches(value)));
            matched != negate
        });
        Ok(self)
    }

    /// Keeps advisories whose name matches one of the patterns.
    pub fn filter_name(&mut self, cmp: QueryCmp, patterns: &[&str]) -> Result<&mut Self, QueryError> {
        self.retain_strings("name", cmp, patterns, |a| vec![a.name.as_str()])
    }

    /// Keeps advisories of the given kinds.
    pub fn filter_type(&mut self, kinds: &[AdvisoryKind]) -> &mut Self {
        self.advisories.retain(|advisory| kinds.contains(&advisory.kind));
        self
    }

    /// Keeps advisories whose severity matches one of the patterns.
    pub fn filter_severity(
        &mut self,
        cmp: QueryCmp,
        patterns: &[&str],
    ) -> Result<&mut Self, QueryError> {
        self.retain_strings("severity", cmp, patterns, |a| vec![a.severity.as_str()])
    }

    /// Keeps advisories that reference one of the CVEs.
    pub fn filter_cve(&mut self, cmp: QueryCmp, patterns: &[&str]) -> Result<&mut Self, QueryError> {
        self.retain_strings("cve", cmp, patterns, |a| {
            reference_ids(a, Some(ReferenceKind::Cve))
        })
    }

    /// Keeps advisories that reference one of the bugs.
    pub fn filter_bug(&mut self, cmp: QueryCmp, patterns: &[&str]) -> Result<&mut Self, QueryError> {
        self.retain_strings("bug", cmp, patterns, |a| {
            reference_ids(a, Some(ReferenceKind::Bugzilla))
        })
    }

    /// Keeps advisories with a reference of any kind matching one of the patterns.
    pub fn filter_reference(
        &mut self,
        cmp: QueryCmp,
        patterns: &[&str],
    ) -> Result<&mut Self, QueryError> {
        self.retain_strings("reference", cmp, patterns, |a| reference_ids(a, None))
    }

    /// Keeps advisories that list a version of one of the packages, with the same name and
    /// architecture, for which `advisory version <cmp> package version` holds.
    pub fn filter_packages(
        &mut self,
        packages: &PackageSet,
        cmp: QueryCmp,
    ) -> Result<&mut Self, QueryError> {
        let matches = self.package_matcher(packages, cmp)?;
        self.advisories
            .retain(|advisory| advisory.packages.iter().any(&matches));
        Ok(self)
    }

    /// Returns the advisory packages of the current result that relate to `packages` as described
    /// by [`AdvisoryQuery::filter_packages`].
    pub fn get_advisory_packages(
        &self,
        packages: &PackageSet,
        cmp: QueryCmp,
    ) -> Result<Vec<AdvisoryPackage>, QueryError> {
        let matches = self.package_matcher(packages, cmp)?;
        Ok(self
            .advisories
            .iter()
            .flat_map(|advisory| advisory.packages.iter())
            .filter(|package| matches(package))
            .cloned()
            .collect())
    }

    fn package_matcher(
        &self,
        packages: &PackageSet,
        cmp: QueryCmp,
    ) -> Result<impl Fn(&AdvisoryPackage) -> bool, QueryError> {
        if !matches!(
            cmp,
            QueryCmp::Eq | QueryCmp::Lt | QueryCmp::Lte | QueryCmp::Gt | QueryCmp::Gte
        ) {
            return Err(QueryError::NotSupportedCmpType {
                key: "packages".to_owned(),
                cmp,
            });
        }
        if !packages.pool().same_pool(&self.pool) {
            return Err(QueryError::IncompatiblePool);
        }

        let pool = self.pool.upgrade()?;
        let candidates = packages
            .ids()
            .filter_map(|id| pool.package(id))
            .map(|p| {
                (
                    pool.str(p.name).to_string(),
                    pool.str(p.arch).to_string(),
                    pool.str(p.evr).to_string(),
                )
            })
            .collect::<Vec<_>>();

        Ok(move |package: &AdvisoryPackage| {
            let evr = package.evr();
            candidates.iter().any(|(name, arch, candidate_evr)| {
                *name == package.name
                    && *arch == package.arch
                    && cmp.ordering_matches(compare_evr(&evr, candidate_evr))
            })
        })
    }

    /// The number of advisories in the result.
    pub fn len(&self) -> usize {
        self.advisories.len()
    }

    /// Returns true if no advisory matched.
    pub fn is_empty(&self) -> bool {
        self.advisories.is_empty()
    }

    /// Iterates over the matching advisories in load order.
    pub fn iter(&self) -> impl Iterator<Item = &Advisory> + '_ {
        self.advisories.iter().map(Arc::as_ref)
    }
}

fn reference_ids(advisory: &Advisory, kind: Option<ReferenceKind>) -> Vec<&str> {
    advisory
        .references
        .iter()
        .filter(|r| kind.map_or(true, |kind| r.kind == kind))
        .map(|r| r.id.as_str())
        .collect()
}

#[cfg(test)]
mod test {
    use assert_matches::assert_matches;
    use rstest::rstest;

    use super::*;
    use crate::{test_utils::sack_from_fixtures, ExcludeFlags};

    #[test]
    fn test_deserialize() {
        let advisory: Advisory = serde_json::from_str(
            r#"{
                "name": "FEDORA-2019-1",
                "type": "security",
                "severity": "moderate",
                "references": [{"type": "cve", "id": "CVE-2019-1"}],
                "packages": [{"name": "pkg", "epoch": 1, "version": "1.2", "release": "3", "arch": "x86_64"}]
            }"#,
        )
        .unwrap();
        assert_eq!(advisory.kind, AdvisoryKind::Security);
        assert_eq!(advisory.references[0].kind, ReferenceKind::Cve);
        assert_eq!(advisory.packages[0].evr(), "1:1.2-3");

        let unknown: Advisory = serde_json::from_str(r#"{"name": "X", "type": "newfeature"}"#).unwrap();
        assert_eq!(unknown.kind, AdvisoryKind::Unknown);
    }

    fn names(query: &AdvisoryQuery) -> Vec<&str> {
        query.iter().map(|a| a.name.as_str()).collect()
    }

    #[test]
    fn test_filter_name() {
        let sack = sack_from_fixtures(&["advisories"]);
        let mut query = sack.advisory_query();
        assert_eq!(query.len(), 4);
        query.filter_name(QueryCmp::Glob, &["*2020-1"]).unwrap();
        assert_eq!(names(&query), ["DNF-2020-1"]);
    }

    #[test]
    fn test_filters() {
        let sack = sack_from_fixtures(&["advisories"]);

        let mut query = sack.advisory_query();
        query.filter_type(&[AdvisoryKind::Bugfix]);
        assert_eq!(names(&query), ["DNF-2020-1", "PKG-OLDER"]);

        let mut query = sack.advisory_query();
        query.filter_cve(QueryCmp::Eq, &["1111", "3333"]).unwrap();
        assert_eq!(names(&query), ["DNF-2019-1", "DNF-2020-1"]);
        query.filter_bug(QueryCmp::Eq, &["2222"]).unwrap();
        assert_eq!(names(&query), ["DNF-2020-1"]);

        let mut query = sack.advisory_query();
        query.filter_severity(QueryCmp::Neq, &["critical"]).unwrap();
        assert_eq!(names(&query), ["DNF-2019-1", "PKG-NEWER", "PKG-OLDER"]);

        let mut query = sack.advisory_query();
        query.filter_reference(QueryCmp::Contains, &["22"]).unwrap();
        assert_eq!(names(&query), ["DNF-2020-1"]);

        assert_matches!(
            sack.advisory_query().filter_name(QueryCmp::Gt, &["x"]),
            Err(QueryError::NotSupportedCmpType { .. })
        );
    }

    #[rstest]
    #[case(QueryCmp::Gt, &["PKG-NEWER"])]
    #[case(QueryCmp::Gte, &["DNF-2019-1", "PKG-NEWER"])]
    #[case(QueryCmp::Eq, &["DNF-2019-1"])]
    #[case(QueryCmp::Lte, &["DNF-2019-1", "PKG-OLDER"])]
    #[case(QueryCmp::Lt, &["PKG-OLDER"])]
    fn test_filter_packages(#[case] cmp: QueryCmp, #[case] expected: &[&str]) {
        let sack = sack_from_fixtures(&["advisories"]);
        let packages = sack
            .query(ExcludeFlags::APPLY_EXCLUDES)
            .package_set()
            .unwrap();

        let mut query = sack.advisory_query();
        query.filter_packages(&packages, cmp).unwrap();
        assert_eq!(names(&query), expected);
    }

    #[test]
    fn test_get_advisory_packages() {
        let sack = sack_from_fixtures(&["advisories"]);
        let packages = sack
            .query(ExcludeFlags::APPLY_EXCLUDES)
            .package_set()
            .unwrap();
        let query = sack.advisory_query();
        let newer = query
            .get_advisory_packages(&packages, QueryCmp::Gt)
            .unwrap();
        assert_eq!(newer.len(), 1);
        assert_eq!(newer[0].evr(), "4.0-1");

        assert_matches!(
            query.get_advisory_packages(&packages, QueryCmp::Glob),
            Err(QueryError::NotSupportedCmpType { .. })
        );
        let other = sack_from_fixtures(&[]);
        assert_matches!(
            query.get_advisory_packages(
                &other.query(ExcludeFlags::APPLY_EXCLUDES).package_set().unwrap(),
                QueryCmp::Eq
            ),
            Err(QueryError::IncompatiblePool)
        );
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("bugfix".parse::<AdvisoryKind>().unwrap(), AdvisoryKind::Bugfix);
        assert_eq!(AdvisoryKind::Newpackage.to_string(), "newpackage");
    }
}
