//! The typed filters of a [`super::Query`] and their validation.

use rpmkit_types::{
    Nevra, NevraForm, ParsedReldep, QueryCmp, RelOperator, StringMatcher, StringMatcherParseError,
};
use strum::{Display, EnumIter, EnumString};

use super::QueryError;
use crate::{
    pool::{DepKind, Pool, PoolRef},
    reldep::ReldepError,
    solv_map::SolvMap,
    PackageSet, ReldepList,
};

/// The keys a query can filter on, as accepted by [`super::Query::filter_key`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum FilterKey {
    /// Package name.
    Name,
    /// Architecture.
    Arch,
    /// Summary.
    Summary,
    /// Description.
    Description,
    /// Upstream URL.
    Url,
    /// Source package file name.
    Sourcerpm,
    /// Repository name.
    #[strum(serialize = "reponame")]
    RepoName,
    /// Owned files.
    File,
    /// Epoch.
    Epoch,
    /// Version.
    Version,
    /// Release.
    Release,
    /// Epoch, version and release.
    Evr,
    /// NEVRA, a missing epoch counts as `0`.
    Nevra,
    /// NEVRA with an explicit epoch.
    NevraStrict,
    /// Provided capabilities.
    Provides,
    /// Required capabilities.
    Requires,
    /// Conflicting capabilities.
    Conflicts,
    /// Obsoleted capabilities.
    Obsoletes,
    /// Weak requirements.
    Recommends,
    /// Hints.
    Suggests,
    /// Reverse weak requirements.
    Supplements,
    /// Reverse hints.
    Enhances,
    /// Package set membership.
    Pkg,
    /// Newest version per name.
    Latest,
    /// Newest version per name and architecture.
    LatestPerArch,
    /// Installed packages with an available update.
    Upgradable,
    /// Installed packages with an available older version.
    Downgradable,
    /// Available updates of installed packages.
    Upgrades,
    /// Available older versions of installed packages.
    Downgrades,
    /// Empties the result.
    Empty,
    /// Installed packages.
    Installed,
    /// Available packages.
    Available,
    /// Installed packages not available from any repository.
    Extras,
    /// Names installed in several versions.
    Duplicated,
    /// Packages built after a timestamp.
    Recent,
}

impl From<DepKind> for FilterKey {
    fn from(kind: DepKind) -> Self {
        match kind {
            DepKind::Provides => FilterKey::Provides,
            DepKind::Requires => FilterKey::Requires,
            DepKind::Conflicts => FilterKey::Conflicts,
            DepKind::Obsoletes => FilterKey::Obsoletes,
            DepKind::Recommends => FilterKey::Recommends,
            DepKind::Suggests => FilterKey::Suggests,
            DepKind::Supplements => FilterKey::Supplements,
            DepKind::Enhances => FilterKey::Enhances,
        }
    }
}

/// The patterns of a dependency filter.
#[derive(Debug, Clone)]
pub enum DepPatterns {
    /// Dependency strings like `glibc >= 2.28`. With a glob comparison the name may be a glob.
    Strings(Vec<String>),
    /// Interned dependencies.
    Reldeps(ReldepList),
}

/// A single filter. Patterns within one filter are alternatives, the filters of a query must all
/// match.
///
/// Boolean filters keep the packages with the property when `true` and the packages without it
/// when `false`.
#[derive(Debug, Clone)]
pub enum Filter {
    /// Package name.
    Name(QueryCmp, Vec<String>),
    /// Architecture.
    Arch(QueryCmp, Vec<String>),
    /// Summary.
    Summary(QueryCmp, Vec<String>),
    /// Description.
    Description(QueryCmp, Vec<String>),
    /// Upstream URL.
    Url(QueryCmp, Vec<String>),
    /// Source package file name.
    Sourcerpm(QueryCmp, Vec<String>),
    /// Name of the repository the package comes from.
    RepoName(QueryCmp, Vec<String>),
    /// Any file owned by the package.
    File(QueryCmp, Vec<String>),
    /// Epoch, compared numerically.
    Epoch(QueryCmp, Vec<u64>),
    /// Version, compared with `rpmvercmp` or matched by glob.
    Version(QueryCmp, Vec<String>),
    /// Release, compared with `rpmvercmp` or matched by glob.
    Release(QueryCmp, Vec<String>),
    /// `[epoch:]version-release`, compared as EVR.
    Evr(QueryCmp, Vec<String>),
    /// NEVRA. Ordering comparisons parse the pattern and compare the EVR of packages with the
    /// same name and architecture, a missing epoch counts as `0`. String comparisons match the
    /// NEVRA with and without epoch.
    Nevra(QueryCmp, Vec<String>),
    /// Like [`Filter::Nevra`] but the patterns must carry an explicit epoch.
    NevraStrict(QueryCmp, Vec<String>),
    /// Dependencies of the given kind.
    Dependency(DepKind, QueryCmp, DepPatterns),
    /// Membership in a package set.
    Pkg(QueryCmp, PackageSet),
    /// The packages with the highest EVR per name.
    Latest(bool),
    /// The packages with the highest EVR per name and architecture.
    LatestPerArch(bool),
    /// Installed packages for which an update is available.
    Upgradable(bool),
    /// Installed packages for which an older version is available.
    Downgradable(bool),
    /// Available packages that update an installed package.
    Upgrades(bool),
    /// Available packages that are older than an installed package.
    Downgrades(bool),
    /// `true` empties the result.
    Empty(bool),
    /// Packages from the system repository.
    Installed(bool),
    /// Packages from other repositories.
    Available(bool),
    /// Installed packages that are not available in the same version from any repository.
    Extras(bool),
    /// Installed packages whose name is installed in several versions, ignoring installonly
    /// packages.
    Duplicated(bool),
    /// Packages built after the timestamp.
    Recent(u64),
}

impl Filter {
    /// The key of the filter.
    pub fn key(&self) -> FilterKey {
        match self {
            Filter::Name(..) => FilterKey::Name,
            Filter::Arch(..) => FilterKey::Arch,
            Filter::Summary(..) => FilterKey::Summary,
            Filter::Description(..) => FilterKey::Description,
            Filter::Url(..) => FilterKey::Url,
            Filter::Sourcerpm(..) => FilterKey::Sourcerpm,
            Filter::RepoName(..) => FilterKey::RepoName,
            Filter::File(..) => FilterKey::File,
            Filter::Epoch(..) => FilterKey::Epoch,
            Filter::Version(..) => FilterKey::Version,
            Filter::Release(..) => FilterKey::Release,
            Filter::Evr(..) => FilterKey::Evr,
            Filter::Nevra(..) => FilterKey::Nevra,
            Filter::NevraStrict(..) => FilterKey::NevraStrict,
            Filter::Dependency(kind, ..) => FilterKey::from(*kind),
            Filter::Pkg(..) => FilterKey::Pkg,
            Filter::Latest(_) => FilterKey::Latest,
            Filter::LatestPerArch(_) => FilterKey::LatestPerArch,
            Filter::Upgradable(_) => FilterKey::Upgradable,
            Filter::Downgradable(_) => FilterKey::Downgradable,
            Filter::Upgrades(_) => FilterKey::Upgrades,
            Filter::Downgrades(_) => FilterKey::Downgrades,
            Filter::Empty(_) => FilterKey::Empty,
            Filter::Installed(_) => FilterKey::Installed,
            Filter::Available(_) => FilterKey::Available,
            Filter::Extras(_) => FilterKey::Extras,
            Filter::Duplicated(_) => FilterKey::Duplicated,
            Filter::Recent(_) => FilterKey::Recent,
        }
    }

    /// Builds a filter from its textual form.
    pub fn from_key(key: FilterKey, cmp: QueryCmp, patterns: &[&str]) -> Result<Self, QueryError> {
        let strings = || patterns.iter().map(|p| p.to_string()).collect::<Vec<_>>();
        let deps = |kind| Filter::Dependency(kind, cmp, DepPatterns::Strings(strings()));
        let filter = match key {
            FilterKey::Name => Filter::Name(cmp, strings()),
            FilterKey::Arch => Filter::Arch(cmp, strings()),
            FilterKey::Summary => Filter::Summary(cmp, strings()),
            FilterKey::Description => Filter::Description(cmp, strings()),
            FilterKey::Url => Filter::Url(cmp, strings()),
            FilterKey::Sourcerpm => Filter::Sourcerpm(cmp, strings()),
            FilterKey::RepoName => Filter::RepoName(cmp, strings()),
            FilterKey::File => Filter::File(cmp, strings()),
            FilterKey::Epoch => Filter::Epoch(
                cmp,
                patterns
                    .iter()
                    .map(|p| {
                        p.parse::<u64>()
                            .map_err(|_| QueryError::BadQuery(format!("'{p}' is not a valid epoch")))
                    })
                    .collect::<Result<_, _>>()?,
            ),
            FilterKey::Version => Filter::Version(cmp, strings()),
            FilterKey::Release => Filter::Release(cmp, strings()),
            FilterKey::Evr => Filter::Evr(cmp, strings()),
            FilterKey::Nevra => Filter::Nevra(cmp, strings()),
            FilterKey::NevraStrict => Filter::NevraStrict(cmp, strings()),
            FilterKey::Provides => deps(DepKind::Provides),
            FilterKey::Requires => deps(DepKind::Requires),
            FilterKey::Conflicts => deps(DepKind::Conflicts),
            FilterKey::Obsoletes => deps(DepKind::Obsoletes),
            FilterKey::Recommends => deps(DepKind::Recommends),
            FilterKey::Suggests => deps(DepKind::Suggests),
            FilterKey::Supplements => deps(DepKind::Supplements),
            FilterKey::Enhances => deps(DepKind::Enhances),
            FilterKey::Pkg => {
                return Err(QueryError::BadQuery(
                    "the pkg filter only accepts a package set".to_owned(),
                ))
            }
            FilterKey::Recent => {
                let value = single_value(key, cmp, patterns)?;
                Filter::Recent(value.parse().map_err(|_| {
                    QueryError::BadQuery(format!("'{value}' is not a valid timestamp"))
                })?)
            }
            flag => {
                let value = parse_bool(single_value(key, cmp, patterns)?)?;
                match flag {
                    FilterKey::Latest => Filter::Latest(value),
                    FilterKey::LatestPerArch => Filter::LatestPerArch(value),
                    FilterKey::Upgradable => Filter::Upgradable(value),
                    FilterKey::Downgradable => Filter::Downgradable(value),
                    FilterKey::Upgrades => Filter::Upgrades(value),
                    FilterKey::Downgrades => Filter::Downgrades(value),
                    FilterKey::Empty => Filter::Empty(value),
                    FilterKey::Installed => Filter::Installed(value),
                    FilterKey::Available => Filter::Available(value),
                    FilterKey::Extras => Filter::Extras(value),
                    _ => Filter::Duplicated(value),
                }
            }
        };
        Ok(filter)
    }
}

/// Keys that only accept `=` with a single value.
fn single_value<'a>(key: FilterKey, cmp: QueryCmp, patterns: &[&'a str]) -> Result<&'a str, QueryError> {
    if cmp != QueryCmp::Eq {
        return Err(QueryError::not_supported(key, cmp));
    }
    match patterns {
        [value] => Ok(*value),
        _ => Err(QueryError::BadQuery(format!(
            "the {key} filter takes exactly one value"
        ))),
    }
}

fn parse_bool(value: &str) -> Result<bool, QueryError> {
    match value {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        _ => Err(QueryError::BadQuery(format!("'{value}' is not a boolean"))),
    }
}

/// The package attributes that are matched as strings.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum StringField {
    Name,
    Arch,
    Summary,
    Description,
    Url,
    Sourcerpm,
    RepoName,
    File,
    Version,
    Release,
    Nevra,
}

/// The package attributes that are compared as versions.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum VersionField {
    Version,
    Release,
    Evr,
}

/// The filters that depend on more than the package itself.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum Flag {
    Latest,
    LatestPerArch,
    Upgradable,
    Downgradable,
    Upgrades,
    Downgrades,
    Empty,
    Installed,
    Available,
    Extras,
    Duplicated,
}

/// Matches a single dependency of a package.
#[derive(Debug, Clone)]
pub(crate) struct DepMatcher {
    pub name: StringMatcher,
    pub op: Option<RelOperator>,
    pub evr: Option<String>,
}

/// A validated filter, ready to be evaluated. Negated comparisons are stored as their positive
/// counterpart plus `negate`.
#[derive(Debug, Clone)]
pub(crate) enum CompiledFilter {
    Strings {
        field: StringField,
        matchers: Vec<StringMatcher>,
        negate: bool,
    },
    Epoch {
        cmp: QueryCmp,
        values: Vec<u64>,
        negate: bool,
    },
    Version {
        field: VersionField,
        cmp: QueryCmp,
        patterns: Vec<String>,
        negate: bool,
    },
    Nevra {
        cmp: QueryCmp,
        strict: bool,
        patterns: Vec<Nevra>,
        negate: bool,
    },
    Dependency {
        kind: DepKind,
        matchers: Vec<DepMatcher>,
        negate: bool,
    },
    Pkg {
        map: SolvMap,
        negate: bool,
    },
    Flag {
        flag: Flag,
        value: bool,
    },
    Recent(u64),
}

fn string_matchers(
    key: FilterKey,
    cmp: QueryCmp,
    patterns: &[String],
) -> Result<Vec<StringMatcher>, QueryError> {
    patterns
        .iter()
        .map(|pattern| {
            StringMatcher::new(cmp, pattern).map_err(|err| match err {
                StringMatcherParseError::UnsupportedCmp(_) => QueryError::not_supported(key, cmp),
                err => QueryError::InvalidPattern(err),
            })
        })
        .collect()
}

fn compile_strings(
    key: FilterKey,
    field: StringField,
    cmp: QueryCmp,
    patterns: &[String],
) -> Result<CompiledFilter, QueryError> {
    Ok(CompiledFilter::Strings {
        field,
        matchers: string_matchers(key, cmp, patterns)?,
        negate: cmp.is_negated(),
    })
}

fn compile_version(
    key: FilterKey,
    field: VersionField,
    cmp: QueryCmp,
    patterns: Vec<String>,
) -> Result<CompiledFilter, QueryError> {
    if cmp.is_ordering() {
        return Ok(CompiledFilter::Version {
            field,
            cmp: cmp.positive(),
            patterns,
            negate: cmp.is_negated(),
        });
    }
    let string_field = match field {
        VersionField::Version => StringField::Version,
        VersionField::Release => StringField::Release,
        VersionField::Evr => return Err(QueryError::not_supported(key, cmp)),
    };
    if !matches!(cmp, QueryCmp::Glob | QueryCmp::NotGlob) {
        return Err(QueryError::not_supported(key, cmp));
    }
    compile_strings(key, string_field, cmp, &patterns)
}

fn compile_nevra(
    key: FilterKey,
    cmp: QueryCmp,
    patterns: &[String],
    strict: bool,
) -> Result<CompiledFilter, QueryError> {
    if !cmp.is_ordering() {
        if strict {
            return Err(QueryError::not_supported(key, cmp));
        }
        return compile_strings(key, StringField::Nevra, cmp, patterns);
    }
    let patterns = patterns
        .iter()
        .map(|pattern| {
            let nevra = Nevra::parse(pattern, NevraForm::Nevra)
                .map_err(|err| QueryError::BadQuery(err.to_string()))?;
            if strict && nevra.epoch.is_none() {
                return Err(QueryError::BadQuery(format!(
                    "'{pattern}' does not specify an epoch"
                )));
            }
            Ok(nevra)
        })
        .collect::<Result<_, _>>()?;
    Ok(CompiledFilter::Nevra {
        cmp: cmp.positive(),
        strict,
        patterns,
        negate: cmp.is_negated(),
    })
}

fn compile_dependency(
    pool: &Pool,
    pool_ref: &PoolRef,
    kind: DepKind,
    cmp: QueryCmp,
    patterns: DepPatterns,
) -> Result<CompiledFilter, QueryError> {
    let key = FilterKey::from(kind);
    let matchers = match patterns {
        DepPatterns::Reldeps(list) => {
            if !matches!(cmp, QueryCmp::Eq | QueryCmp::Neq) {
                return Err(QueryError::not_supported(key, cmp));
            }
            if !list.pool().same_pool(pool_ref) {
                return Err(QueryError::IncompatiblePool);
            }
            list.ids()
                .iter()
                .map(|&id| {
                    let reldep = pool.reldep(id)?;
                    Ok(DepMatcher {
                        name: StringMatcher::Exact(pool.resolve(reldep.name)?.to_string()),
                        op: reldep.op,
                        evr: reldep.evr.map(|evr| pool.resolve(evr)).transpose()?.map(|e| e.to_string()),
                    })
                })
                .collect::<Result<Vec<_>, QueryError>>()?
        }
        DepPatterns::Strings(patterns) => {
            if !matches!(
                cmp,
                QueryCmp::Eq
                    | QueryCmp::Neq
                    | QueryCmp::Glob
                    | QueryCmp::NotGlob
                    | QueryCmp::IGlob
                    | QueryCmp::NotIGlob
            ) {
                return Err(QueryError::not_supported(key, cmp));
            }
            patterns
                .iter()
                .map(|pattern| {
                    let parsed: ParsedReldep = pattern.parse().map_err(ReldepError::from)?;
                    let name = StringMatcher::new(cmp, &parsed.name)?;
                    Ok(DepMatcher {
                        name,
                        op: parsed.op,
                        evr: parsed.version,
                    })
                })
                .collect::<Result<Vec<_>, QueryError>>()?
        }
    };
    Ok(CompiledFilter::Dependency {
        kind,
        matchers,
        negate: cmp.is_negated(),
    })
}

impl Filter {
    /// Validates the filter and prepares it for evaluation.
    pub(crate) fn compile(self, pool: &Pool, pool_ref: &PoolRef) -> Result<CompiledFilter, QueryError> {
        let key = self.key();
        let flag = |flag: Flag, value: bool| -> Result<CompiledFilter, QueryError> {
            Ok(CompiledFilter::Flag { flag, value })
        };
        match self {
            Filter::Name(cmp, p) => compile_strings(key, StringField::Name, cmp, &p),
            Filter::Arch(cmp, p) => compile_strings(key, StringField::Arch, cmp, &p),
            Filter::Summary(cmp, p) => compile_strings(key, StringField::Summary, cmp, &p),
            Filter::Description(cmp, p) => compile_strings(key, StringField::Description, cmp, &p),
            Filter::Url(cmp, p) => compile_strings(key, StringField::Url, cmp, &p),
            Filter::Sourcerpm(cmp, p) => compile_strings(key, StringField::Sourcerpm, cmp, &p),
            Filter::RepoName(cmp, p) => compile_strings(key, StringField::RepoName, cmp, &p),
            Filter::File(cmp, p) => compile_strings(key, StringField::File, cmp, &p),
            Filter::Epoch(cmp, values) => {
                if !cmp.is_ordering() {
                    return Err(QueryError::not_supported(key, cmp));
                }
                Ok(CompiledFilter::Epoch {
                    cmp: cmp.positive(),
                    values,
                    negate: cmp.is_negated(),
                })
            }
            Filter::Version(cmp, p) => compile_version(key, VersionField::Version, cmp, p),
            Filter::Release(cmp, p) => compile_version(key, VersionField::Release, cmp, p),
            Filter::Evr(cmp, p) => compile_version(key, VersionField::Evr, cmp, p),
            Filter::Nevra(cmp, p) => compile_nevra(key, cmp, &p, false),
            Filter::NevraStrict(cmp, p) => compile_nevra(key, cmp, &p, true),
            Filter::Dependency(kind, cmp, patterns) => {
                compile_dependency(pool, pool_ref, kind, cmp, patterns)
            }
            Filter::Pkg(cmp, set) => {
                if !matches!(cmp, QueryCmp::Eq | QueryCmp::Neq) {
                    return Err(QueryError::not_supported(key, cmp));
                }
                if !set.pool().same_pool(pool_ref) {
                    return Err(QueryError::IncompatiblePool);
                }
                Ok(CompiledFilter::Pkg {
                    map: set.map().clone(),
                    negate: cmp.is_negated(),
                })
            }
            Filter::Latest(value) => flag(Flag::Latest, value),
            Filter::LatestPerArch(value) => flag(Flag::LatestPerArch, value),
            Filter::Upgradable(value) => flag(Flag::Upgradable, value),
            Filter::Downgradable(value) => flag(Flag::Downgradable, value),
            Filter::Upgrades(value) => flag(Flag::Upgrades, value),
            Filter::Downgrades(value) => flag(Flag::Downgrades, value),
            Filter::Empty(value) => flag(Flag::Empty, value),
            Filter::Installed(value) => flag(Flag::Installed, value),
            Filter::Available(value) => flag(Flag::Available, value),
            Filter::Extras(value) => flag(Flag::Extras, value),
            Filter::Duplicated(value) => flag(Flag::Duplicated, value),
            Filter::Recent(timestamp) => Ok(CompiledFilter::Recent(timestamp)),
        }
    }
}
