#![deny(missing_docs)]
//! `rpmkit-types` contains the value types of the RPM ecosystem that do not depend on a package
//! pool: versions and their comparison, package coordinates, dependency strings and the
//! comparisons used by queries. The library itself doesn't load or solve anything.

pub mod evr;
mod matcher;
mod nevra;
mod query_cmp;
pub mod reldep;

pub use evr::{compare_evr, compare_evr_with, rpmvercmp, Evr, EvrCmpMode, EvrRef, ParseEvrError};
pub use matcher::{is_glob_pattern, StringMatcher, StringMatcherParseError};
pub use nevra::{Nevra, NevraForm, ParseNevraError};
pub use query_cmp::{ParseQueryCmpError, QueryCmp};
pub use reldep::{
    ranges_overlap, ParseReldepError, ParseReldepErrorKind, ParsedReldep, RelOperator,
};
