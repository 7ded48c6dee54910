#![deny(missing_docs)]
//! `rpmkit-sack` holds a universe of RPM packages in memory and answers questions about it.
//!
//! A [`Sack`] owns the [`Pool`] that stores every package, interned string and dependency.
//! Repositories are loaded into it from [`RepoMetadata`] documents. Afterwards [`Query`] selects
//! packages by name, version, dependencies and more, and [`AdvisoryQuery`] searches update
//! advisories. Packages, dependencies and package sets are small handles that refer to the pool
//! by id.

mod advisory;
mod config;
mod exclude_flags;
mod id;
mod package;
mod package_set;
mod pool;
mod query;
mod reldep;
mod reldep_list;
mod repo;
mod sack;
mod solv_map;

pub use advisory::{
    Advisory, AdvisoryKind, AdvisoryPackage, AdvisoryQuery, AdvisoryReference, ReferenceKind,
};
pub use config::{ConfigError, SackConfig};
pub use exclude_flags::ExcludeFlags;
pub use id::{PackageId, RepoId, ReldepId, StringId};
pub use package::Package;
pub use package_set::{PackageSet, PackageSetError};
pub use pool::{DepKind, PackageData, Pool, PoolError, PoolRef, RepoData, ReldepData};
pub use query::{DepPatterns, Filter, FilterKey, Query, QueryError, ResolveSpecSettings};
pub use reldep::{Reldep, ReldepError};
pub use reldep_list::ReldepList;
pub use repo::{Changelog, DeltaRpm, LoadError, LoadRepoFlags, PackageMetadata, RepoMetadata};
pub use sack::Sack;
pub use solv_map::{SolvMap, SolvMapError, SolvMapIter};
