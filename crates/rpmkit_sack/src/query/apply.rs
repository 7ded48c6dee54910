//! Evaluation of compiled filters.

use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet},
};

use rpmkit_types::{compare_evr, compare_evr_with, ranges_overlap, rpmvercmp, EvrCmpMode};

use super::filter::{CompiledFilter, DepMatcher, Flag, StringField, VersionField};
use crate::{
    pool::{DepKind, PackageData, Pool},
    solv_map::SolvMap,
    PackageId, StringId,
};

/// Narrows `result` to the packages that pass `filter`. `base` holds every package the query may
/// return, it is the reference for filters that compare installed and available packages.
pub(super) fn apply_filter(pool: &Pool, base: &SolvMap, result: &mut SolvMap, filter: &CompiledFilter) {
    match filter {
        CompiledFilter::Strings {
            field,
            matchers,
            negate,
        } => retain_packages(pool, result, |id, p| {
            let matched = string_values(pool, id, p, *field)
                .iter()
                .any(|value| matchers.iter().any(|m| m.matches(value)));
            matched != *negate
        }),
        CompiledFilter::Epoch {
            cmp,
            values,
            negate,
        } => retain_packages(pool, result, |_, p| {
            let matched = values
                .iter()
                .any(|value| cmp.ordering_matches(p.epoch.cmp(value)));
            matched != *negate
        }),
        CompiledFilter::Version {
            field,
            cmp,
            patterns,
            negate,
        } => retain_packages(pool, result, |_, p| {
            let matched = patterns.iter().any(|pattern| {
                let ordering = match field {
                    VersionField::Version => rpmvercmp(&pool.str(p.version), pattern),
                    VersionField::Release => rpmvercmp(&pool.str(p.release), pattern),
                    VersionField::Evr => compare_evr(&pool.str(p.evr), pattern),
                };
                cmp.ordering_matches(ordering)
            });
            matched != *negate
        }),
        CompiledFilter::Nevra {
            cmp,
            strict,
            patterns,
            negate,
        } => {
            let mode = if *strict {
                EvrCmpMode::Strict
            } else {
                EvrCmpMode::Compare
            };
            retain_packages(pool, result, |_, p| {
                let name = pool.str(p.name);
                let arch = pool.str(p.arch);
                let evr = format!("{}:{}-{}", p.epoch, pool.str(p.version), pool.str(p.release));
                let matched = patterns.iter().any(|nevra| {
                    nevra.name == *name
                        && nevra.arch.as_deref() == Some(&*arch)
                        && nevra.evr().is_some_and(|pattern| {
                            cmp.ordering_matches(compare_evr_with(&evr, &pattern, mode))
                        })
                });
                matched != *negate
            })
        }
        CompiledFilter::Dependency {
            kind,
            matchers,
            negate,
        } => retain_packages(pool, result, |_, p| {
            let matched = matchers.iter().any(|m| dep_matches(pool, p, *kind, m));
            matched != *negate
        }),
        CompiledFilter::Pkg { map, negate } => result.retain(|id| map.contains(id) != *negate),
        CompiledFilter::Recent(timestamp) => {
            retain_packages(pool, result, |_, p| p.buildtime > *timestamp)
        }
        CompiledFilter::Flag { flag, value } => apply_flag(pool, base, result, *flag, *value),
    }
}

fn retain_packages(
    pool: &Pool,
    result: &mut SolvMap,
    mut keep: impl FnMut(PackageId, &PackageData) -> bool,
) {
    result.retain(|id| pool.package(id).is_some_and(|p| keep(id, p)));
}

fn string_values(pool: &Pool, id: PackageId, p: &PackageData, field: StringField) -> Vec<String> {
    match field {
        StringField::Name => vec![pool.str(p.name).to_string()],
        StringField::Arch => vec![pool.str(p.arch).to_string()],
        StringField::Summary => vec![p.summary.clone()],
        StringField::Description => vec![p.description.clone()],
        StringField::Url => vec![p.url.clone()],
        StringField::Sourcerpm => p.sourcerpm.iter().cloned().collect(),
        StringField::RepoName => pool
            .repo(p.repo)
            .map(|repo| repo.name.clone())
            .into_iter()
            .collect(),
        StringField::File => p.files.iter().map(|&f| pool.str(f).to_string()).collect(),
        StringField::Version => vec![pool.str(p.version).to_string()],
        StringField::Release => vec![pool.str(p.release).to_string()],
        StringField::Nevra => pool
            .package_nevra(id)
            .into_iter()
            .chain(pool.package_full_nevra(id))
            .collect(),
    }
}

fn dep_matches(pool: &Pool, p: &PackageData, kind: DepKind, matcher: &DepMatcher) -> bool {
    let matches_dep = p.deps(kind).iter().any(|&dep| {
        let Ok(data) = pool.reldep(dep) else {
            return false;
        };
        if !matcher.name.matches(&pool.str(data.name)) {
            return false;
        }
        match (matcher.op, &matcher.evr, data.op, data.evr) {
            (Some(op), Some(evr), Some(dep_op), Some(dep_evr)) => {
                ranges_overlap(Some(op), evr, Some(dep_op), &pool.str(dep_evr))
            }
            _ => true,
        }
    });
    if matches_dep {
        return true;
    }

    // File paths are provided by the packages that own them
    kind == DepKind::Provides
        && matcher.op.is_none()
        && matcher.name.as_exact().is_some_and(|path| {
            path.starts_with('/') && p.files.iter().any(|&f| &*pool.str(f) == path)
        })
}

fn arch_compatible(a: &str, b: &str) -> bool {
    a == b || a == "noarch" || b == "noarch"
}

/// The installed and the available packages of `base`, grouped by name.
struct ByName {
    installed: HashMap<StringId, Vec<PackageId>>,
    available: HashMap<StringId, Vec<PackageId>>,
}

impl ByName {
    fn new(pool: &Pool, base: &SolvMap) -> Self {
        let mut installed: HashMap<_, Vec<_>> = HashMap::new();
        let mut available: HashMap<_, Vec<_>> = HashMap::new();
        for id in base {
            let Some(p) = pool.package(id) else {
                continue;
            };
            if pool.is_installed(id) {
                installed.entry(p.name).or_default().push(id);
            } else {
                available.entry(p.name).or_default().push(id);
            }
        }
        Self {
            installed,
            available,
        }
    }
}

/// Returns true if one of `others` with the same name and a compatible architecture compares to
/// `p` as `ordering`.
fn has_relative(
    pool: &Pool,
    p: &PackageData,
    others: &HashMap<StringId, Vec<PackageId>>,
    ordering: Ordering,
) -> bool {
    let Some(candidates) = others.get(&p.name) else {
        return false;
    };
    let arch = pool.str(p.arch);
    let evr = pool.str(p.evr);
    candidates.iter().filter_map(|&id| pool.package(id)).any(|other| {
        arch_compatible(&arch, &pool.str(other.arch))
            && compare_evr(&pool.str(other.evr), &evr) == ordering
    })
}

/// The packages with the highest EVR among the packages of `result` with the same name, and
/// architecture if `per_arch` is set. Ties are all kept.
fn latest(pool: &Pool, result: &SolvMap, per_arch: bool) -> HashSet<PackageId> {
    let mut groups: HashMap<(StringId, Option<StringId>), Vec<PackageId>> = HashMap::new();
    for id in result {
        let Some(p) = pool.package(id) else {
            continue;
        };
        let group = groups
            .entry((p.name, per_arch.then_some(p.arch)))
            .or_default();
        let ordering = group
            .first()
            .and_then(|&current| pool.package(current))
            .map_or(Ordering::Greater, |current| {
                compare_evr(&pool.str(p.evr), &pool.str(current.evr))
            });
        match ordering {
            Ordering::Greater => {
                group.clear();
                group.push(id);
            }
            Ordering::Equal => group.push(id),
            Ordering::Less => {}
        }
    }
    groups.into_values().flatten().collect()
}

fn apply_flag(pool: &Pool, base: &SolvMap, result: &mut SolvMap, flag: Flag, value: bool) {
    match flag {
        Flag::Empty => {
            if value {
                result.clear();
            }
        }
        Flag::Installed => result.retain(|id| pool.is_installed(id) == value),
        Flag::Available => result.retain(|id| !pool.is_installed(id) == value),
        Flag::Latest | Flag::LatestPerArch => {
            let latest = latest(pool, result, flag == Flag::LatestPerArch);
            result.retain(|id| latest.contains(&id) == value);
        }
        Flag::Upgrades | Flag::Downgrades | Flag::Upgradable | Flag::Downgradable => {
            let by_name = ByName::new(pool, base);
            retain_packages(pool, result, |id, p| {
                let installed = pool.is_installed(id);
                let matched = match flag {
                    Flag::Upgrades => {
                        !installed && has_relative(pool, p, &by_name.installed, Ordering::Less)
                    }
                    Flag::Downgrades => {
                        !installed && has_relative(pool, p, &by_name.installed, Ordering::Greater)
                    }
                    Flag::Upgradable => {
                        installed && has_relative(pool, p, &by_name.available, Ordering::Greater)
                    }
                    _ => installed && has_relative(pool, p, &by_name.available, Ordering::Less),
                };
                matched == value
            });
        }
        Flag::Extras => {
            let by_name = ByName::new(pool, base);
            retain_packages(pool, result, |id, p| {
                let extra = pool.is_installed(id)
                    && !by_name.available.get(&p.name).is_some_and(|candidates| {
                        candidates
                            .iter()
                            .filter_map(|&c| pool.package(c))
                            .any(|c| c.evr == p.evr && c.arch == p.arch)
                    });
                extra == value
            });
        }
        Flag::Duplicated => {
            let by_name = ByName::new(pool, base);
            let installonly = pool.installonly();
            retain_packages(pool, result, |id, p| {
                let duplicated = pool.is_installed(id)
                    && !installonly.contains(&*pool.str(p.name))
                    && by_name
                        .installed
                        .get(&p.name)
                        .is_some_and(|installed| installed.len() > 1);
                duplicated == value
            });
        }
    }
}
