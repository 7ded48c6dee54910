//! Turns the set of packages the solver picked into transaction items.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    sync::Arc,
};

use itertools::Itertools;
use rpmkit_sack::{Package, PackageId, PoolRef};
use rpmkit_types::compare_evr;

use super::jobs::Translated;
use crate::{
    config::SolverConfig,
    problem::{ProblemEntry, ProblemList, ProblemRule},
    provider::RpmProvider,
    transaction::{Transaction, TransactionItem, TransactionItemAction, TransactionItemReason},
};

use TransactionItemAction as Action;
use TransactionItemReason as Reason;

pub(crate) struct Classifier<'a, 'p> {
    pub provider: &'a RpmProvider<'p>,
    pub pool: PoolRef,
    pub config: &'a SolverConfig,
    pub translated: &'a Translated,
    pub protected: &'a HashSet<PackageId>,
    pub running_kernel: Option<PackageId>,
    pub installed_reason: &'a dyn Fn(PackageId) -> TransactionItemReason,
}

/// What happens to a package that is part of the transaction.
#[derive(Debug, Copy, Clone)]
struct Change {
    action: Action,
    reason: Reason,
}

impl Classifier<'_, '_> {
    fn package(&self, id: PackageId) -> Package {
        Package::new(&self.pool, id).expect("bug: the pool outlives the goal")
    }

    /// The packages of `set` that are reachable from `roots` through requirements.
    fn needed(
        &self,
        set: &BTreeSet<PackageId>,
        roots: impl IntoIterator<Item = PackageId>,
    ) -> HashSet<PackageId> {
        let mut needed = HashSet::new();
        let mut stack: Vec<PackageId> = roots.into_iter().collect();
        while let Some(id) = stack.pop() {
            if !needed.insert(id) {
                continue;
            }
            for (_, providers) in self.provider.requirements(id) {
                stack.extend(
                    providers
                        .into_iter()
                        .filter(|p| set.contains(p) && !needed.contains(p)),
                );
            }
        }
        needed
    }

    /// The packages of `set` that are needed by packages installed for a reason that keeps
    /// them installed.
    fn needed_by_reason(
        &self,
        set: &BTreeSet<PackageId>,
        reason: impl Fn(PackageId) -> Reason,
    ) -> HashSet<PackageId> {
        let roots = set
            .iter()
            .copied()
            .filter(|&id| !reason(id).is_removable_when_unneeded())
            .collect_vec();
        self.needed(set, roots)
    }

    /// Returns true if a package of `set` other than `id` has a requirement that only `id`
    /// satisfies within `set`.
    fn is_required_exclusively(&self, set: &BTreeSet<PackageId>, id: PackageId) -> bool {
        set.iter().filter(|&&other| other != id).any(|&other| {
            self.provider
                .requirements(other)
                .into_iter()
                .any(|(_, providers)| {
                    let mut in_set = providers.into_iter().filter(|p| set.contains(p));
                    in_set.next() == Some(id) && in_set.all(|p| p == id)
                })
        })
    }

    fn is_untouchable(&self, id: PackageId) -> bool {
        self.protected.contains(&id) || self.running_kernel == Some(id)
    }

    /// Pairs the new packages with the removed packages of the same name, records the changes
    /// of both sides and returns the pairs.
    fn pair(
        &self,
        new: &BTreeSet<PackageId>,
        gone: &BTreeSet<PackageId>,
        changes: &mut BTreeMap<PackageId, Change>,
    ) -> Vec<(PackageId, PackageId)> {
        let by_name = |set: &BTreeSet<PackageId>| {
            let mut map: HashMap<Arc<str>, Vec<PackageId>> = HashMap::new();
            for &id in set {
                if !self.provider.is_installonly(id) {
                    map.entry(self.provider.name(id)).or_default().push(id);
                }
            }
            map
        };
        let gone_by_name = by_name(gone);

        let mut pairs = Vec::new();
        for (name, new_ids) in by_name(new) {
            let Some(gone_ids) = gone_by_name.get(&name) else {
                continue;
            };
            for (&inbound, &outbound) in new_ids.iter().zip(gone_ids) {
                let (action, replaced) = if self.provider.same_nevra(inbound, outbound) {
                    (Action::Reinstall, Action::Reinstalled)
                } else if compare_evr(&self.provider.evr(inbound), &self.provider.evr(outbound))
                    .is_lt()
                {
                    (Action::Downgrade, Action::Downgraded)
                } else {
                    (Action::Upgrade, Action::Upgraded)
                };

                let old_reason = (self.installed_reason)(outbound);
                let reason = if self.translated.user_installs.contains(&inbound)
                    && old_reason.is_removable_when_unneeded()
                {
                    Reason::User
                } else {
                    old_reason
                };
                changes.insert(inbound, Change { action, reason });
                changes.insert(
                    outbound,
                    Change {
                        action: replaced,
                        reason: old_reason,
                    },
                );
                pairs.push((inbound, outbound));
            }
        }
        pairs
    }

    /// Removes installed packages nothing needs anymore after the requested removals.
    fn clean_requirements(
        &self,
        before: &BTreeSet<PackageId>,
        after: &BTreeSet<PackageId>,
        reason_after: &dyn Fn(PackageId) -> Reason,
    ) -> BTreeSet<PackageId> {
        let needed_before = self.needed_by_reason(before, |id| (self.installed_reason)(id));
        let needed_after = self.needed_by_reason(after, reason_after);

        let mut candidates: BTreeSet<PackageId> = after
            .intersection(before)
            .copied()
            .filter(|id| !needed_after.contains(id) && needed_before.contains(id))
            .filter(|&id| reason_after(id).is_removable_when_unneeded())
            .filter(|&id| !self.is_untouchable(id))
            .collect();

        // Packages that stay may still require some of the candidates
        loop {
            let mut keep = None;
            'search: for &other in after.difference(&candidates) {
                for (_, providers) in self.provider.requirements(other) {
                    let in_after = providers
                        .into_iter()
                        .filter(|p| after.contains(p))
                        .collect_vec();
                    if !in_after.is_empty() && in_after.iter().all(|p| candidates.contains(p)) {
                        keep = Some(in_after[0]);
                        break 'search;
                    }
                }
            }
            match keep {
                Some(id) => {
                    candidates.remove(&id);
                }
                None => break,
            }
        }

        for &id in &candidates {
            tracing::debug!("{} is no longer needed", self.provider.nevra(id));
        }
        candidates
    }

    /// Removes the oldest installed versions of install-only packages above the limit.
    fn limit_installonly(&self, after: &BTreeSet<PackageId>) -> BTreeSet<PackageId> {
        let limit = self.config.installonly_limit;
        let mut removed = BTreeSet::new();
        if limit == 0 {
            return removed;
        }

        let groups = after
            .iter()
            .copied()
            .filter(|&id| self.provider.is_installonly(id))
            .into_group_map_by(|&id| self.provider.name(id));
        let mut remaining = after.clone();
        for (name, mut versions) in groups.into_iter().sorted_by(|a, b| a.0.cmp(&b.0)) {
            if versions.len() <= limit {
                continue;
            }
            let mut excess = versions.len() - limit;
            versions.sort_by(|&a, &b| self.provider.compare_newest_first(b, a));
            for id in versions {
                if excess == 0 {
                    break;
                }
                if !self.provider.pool().is_installed(id)
                    || self.is_untouchable(id)
                    || self.is_required_exclusively(&remaining, id)
                {
                    continue;
                }
                tracing::debug!(
                    "removing {} to keep {limit} versions of {name}",
                    self.provider.nevra(id)
                );
                remaining.remove(&id);
                removed.insert(id);
                excess -= 1;
            }
        }
        removed
    }

    fn check_removals(&self, changes: &BTreeMap<PackageId, Change>) -> Result<(), ProblemList> {
        let removed = changes
            .iter()
            .filter(|(_, change)| matches!(change.action, Action::Remove | Action::Obsoleted))
            .map(|(&id, _)| id)
            .collect_vec();

        let mut problems = ProblemList::default();
        let protected = removed
            .iter()
            .filter(|&&id| self.protected.contains(&id))
            .map(|&id| self.provider.name(id))
            .sorted()
            .dedup()
            .join(", ");
        if !protected.is_empty() {
            problems.push(vec![ProblemEntry::new(
                ProblemRule::RemovalOfProtected,
                format!(
                    "The operation would result in removing the following protected packages: {protected}"
                ),
            )]);
        }
        if let Some(kernel) = self.running_kernel.filter(|id| removed.contains(id)) {
            problems.push(vec![ProblemEntry::new(
                ProblemRule::RemovalOfRunningKernel,
                format!(
                    "The operation would result in removing of running kernel: {}",
                    self.provider.nevra(kernel)
                ),
            )]);
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }

    /// Compares the installed packages with the packages picked by the solver.
    pub fn classify(
        self,
        before: BTreeSet<PackageId>,
        mut after: BTreeSet<PackageId>,
    ) -> Result<Transaction, ProblemList> {
        let new: BTreeSet<PackageId> = after.difference(&before).copied().collect();
        let solver_gone: BTreeSet<PackageId> = before.difference(&after).copied().collect();

        let mut changes = BTreeMap::new();
        let pairs = self.pair(&new, &solver_gone, &mut changes);

        for &id in &new {
            if changes.contains_key(&id) {
                continue;
            }
            let reason = if self.translated.user_installs.contains(&id) {
                Reason::User
            } else {
                // Another version of an install-only package keeps the reason of the installed
                // ones
                before
                    .iter()
                    .find(|&&old| self.provider.name(old) == self.provider.name(id))
                    .map_or(Reason::Dependency, |&old| (self.installed_reason)(old))
            };
            changes.insert(
                id,
                Change {
                    action: Action::Install,
                    reason,
                },
            );
        }

        let reason_changes: HashMap<PackageId, Reason> =
            self.translated.reason_changes.iter().copied().collect();
        let inbound_reasons: HashMap<PackageId, Reason> = changes
            .iter()
            .map(|(&id, change)| (id, change.reason))
            .collect();
        let reason_after = |id: PackageId| {
            if let Some(&reason) = reason_changes.get(&id) {
                reason
            } else if let Some(&reason) = inbound_reasons.get(&id) {
                reason
            } else {
                (self.installed_reason)(id)
            }
        };

        let mut cleaned = BTreeSet::new();
        if self.translated.clean_requirements {
            cleaned = self.clean_requirements(&before, &after, &reason_after);
            after.retain(|id| !cleaned.contains(id));
        }
        let limited = self.limit_installonly(&after);
        after.retain(|id| !limited.contains(id));
        cleaned.extend(limited);

        let mut replaces: HashMap<PackageId, Vec<PackageId>> = HashMap::new();
        for &(inbound, outbound) in &pairs {
            replaces.entry(inbound).or_default().push(outbound);
        }

        let gone = before.difference(&after).copied().collect_vec();
        for id in gone {
            if changes.contains_key(&id) {
                continue;
            }
            let obsoleter = (!cleaned.contains(&id))
                .then(|| {
                    new.iter().copied().find(|&inbound| {
                        self.provider
                            .obsoletes(inbound)
                            .into_iter()
                            .any(|(_, obsoleted)| obsoleted.contains(&id))
                    })
                })
                .flatten();

            let change = match obsoleter {
                Some(inbound) => {
                    if let Some(change) = changes.get_mut(&inbound) {
                        if change.action == Action::Install {
                            change.action = Action::Obsolete;
                        }
                    }
                    replaces.entry(inbound).or_default().push(id);
                    Change {
                        action: Action::Obsoleted,
                        reason: (self.installed_reason)(id),
                    }
                }
                None => Change {
                    action: Action::Remove,
                    reason: if cleaned.contains(&id) {
                        Reason::Clean
                    } else if self.translated.user_removes.contains(&id) {
                        Reason::User
                    } else {
                        Reason::Dependency
                    },
                },
            };
            changes.insert(id, change);
        }

        self.check_removals(&changes)?;

        // Packages that stay may get a new reason
        let stays = before.intersection(&after).copied().collect_vec();
        for &id in &stays {
            let installed = (self.installed_reason)(id);
            let reason = match reason_changes.get(&id) {
                Some(&reason) => reason,
                None if self.translated.user_installs.contains(&id)
                    && installed.is_removable_when_unneeded() =>
                {
                    Reason::User
                }
                None => continue,
            };
            if reason != installed {
                changes.insert(
                    id,
                    Change {
                        action: Action::ReasonChange,
                        reason,
                    },
                );
            }
        }

        let needed = self.needed_by_reason(&after, |id| {
            changes
                .get(&id)
                .map_or_else(|| reason_after(id), |change| change.reason)
        });
        let unneeded = stays
            .into_iter()
            .filter(|id| !needed.contains(id))
            .map(|id| self.package(id))
            .collect();

        let items = changes
            .iter()
            .map(|(&id, change)| {
                TransactionItem::new(self.package(id), change.action, change.reason)
            })
            .collect();
        let replaces = replaces
            .into_iter()
            .map(|(inbound, replaced)| {
                let packages = replaced
                    .into_iter()
                    .sorted()
                    .map(|id| self.package(id))
                    .collect();
                (inbound, packages)
            })
            .collect();

        Ok(Transaction {
            items,
            replaces,
            unneeded,
        })
    }
}
