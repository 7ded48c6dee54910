use std::collections::HashMap;

use rpmkit_sack::{Package, PackageId};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// What a transaction does to a package.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Display)]
pub enum TransactionItemAction {
    /// The package is installed.
    Install,
    /// The package replaces an older version.
    Upgrade,
    /// The package is replaced by a newer version.
    Upgraded,
    /// The package replaces a newer version.
    Downgrade,
    /// The package is replaced by an older version.
    Downgraded,
    /// The package is installed again.
    Reinstall,
    /// The package is replaced by the same version.
    Reinstalled,
    /// The package is removed.
    Remove,
    /// The package is installed and obsoletes installed packages.
    Obsolete,
    /// The package is removed because an installed package obsoletes it.
    Obsoleted,
    /// Only the reason the package is installed for changes.
    ReasonChange,
}

impl TransactionItemAction {
    /// Returns true for actions that put a package on the system.
    pub fn is_inbound(self) -> bool {
        matches!(
            self,
            TransactionItemAction::Install
                | TransactionItemAction::Upgrade
                | TransactionItemAction::Downgrade
                | TransactionItemAction::Reinstall
                | TransactionItemAction::Obsolete
        )
    }

    /// Returns true for actions that take a package off the system.
    pub fn is_outbound(self) -> bool {
        matches!(
            self,
            TransactionItemAction::Upgraded
                | TransactionItemAction::Downgraded
                | TransactionItemAction::Reinstalled
                | TransactionItemAction::Remove
                | TransactionItemAction::Obsoleted
        )
    }
}

/// Why a package is, or was, installed.
#[derive(
    Debug,
    Default,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum TransactionItemReason {
    /// Pulled in by another package.
    Dependency,
    /// Requested by the user.
    User,
    /// Removed because nothing needs it anymore.
    Clean,
    /// Pulled in by a weak dependency.
    WeakDependency,
    /// Part of an installed group.
    Group,
    /// Nothing is recorded.
    #[default]
    Unknown,
}

impl TransactionItemReason {
    /// Returns true if packages installed for this reason may be removed once nothing needs them.
    pub fn is_removable_when_unneeded(self) -> bool {
        matches!(
            self,
            TransactionItemReason::Dependency | TransactionItemReason::WeakDependency
        )
    }
}

/// A package together with what the transaction does to it.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TransactionItem {
    package: Package,
    action: TransactionItemAction,
    reason: TransactionItemReason,
}

impl TransactionItem {
    pub(crate) fn new(
        package: Package,
        action: TransactionItemAction,
        reason: TransactionItemReason,
    ) -> Self {
        Self {
            package,
            action,
            reason,
        }
    }

    /// The package.
    pub fn package(&self) -> &Package {
        &self.package
    }

    /// What happens to the package.
    pub fn action(&self) -> TransactionItemAction {
        self.action
    }

    /// Why it happens.
    pub fn reason(&self) -> TransactionItemReason {
        self.reason
    }
}

/// The outcome of a successful resolve.
#[derive(Debug, Clone, Default)]
pub(crate) struct Transaction {
    pub items: Vec<TransactionItem>,

    /// Maps an inbound package to the installed packages it replaces or obsoletes.
    pub replaces: HashMap<PackageId, Vec<Package>>,

    /// Installed packages that stay but are no longer needed.
    pub unneeded: Vec<Package>,
}

impl Transaction {
    pub fn packages_with(&self, action: TransactionItemAction) -> Vec<Package> {
        self.items
            .iter()
            .filter(|item| item.action == action)
            .map(|item| item.package.clone())
            .collect()
    }

    pub fn item(&self, package: &Package) -> Option<&TransactionItem> {
        self.items.iter().find(|item| &item.package == package)
    }
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(TransactionItemReason::Dependency, "dependency")]
    #[case(TransactionItemReason::WeakDependency, "weak-dependency")]
    #[case(TransactionItemReason::User, "user")]
    fn test_reason_strings(#[case] reason: TransactionItemReason, #[case] text: &str) {
        assert_eq!(reason.to_string(), text);
        assert_eq!(TransactionItemReason::from_str(text).unwrap(), reason);
    }

    #[test]
    fn test_directions() {
        assert!(TransactionItemAction::Obsolete.is_inbound());
        assert!(TransactionItemAction::Obsoleted.is_outbound());
        assert!(!TransactionItemAction::ReasonChange.is_inbound());
        assert!(!TransactionItemAction::ReasonChange.is_outbound());
    }
}
