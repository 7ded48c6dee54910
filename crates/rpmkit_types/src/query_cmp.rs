use std::{cmp::Ordering, str::FromStr};

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, IntoEnumIterator};
use thiserror::Error;

/// A comparison used by query filters.
///
/// Ordering comparisons (`Eq`, `Lt`, ...) compare versions or numbers, the remaining
/// comparisons match strings. Every string comparison except `StartsWith`, `EndsWith` and the
/// regex variants has a negated counterpart.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Hash, Display, AsRefStr, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum QueryCmp {
    /// Equal.
    Eq,
    /// Not equal.
    Neq,
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// Glob pattern match.
    Glob,
    /// Glob pattern does not match.
    NotGlob,
    /// Case-insensitive glob match.
    #[strum(serialize = "iglob")]
    #[serde(rename = "iglob")]
    IGlob,
    /// Case-insensitive glob does not match.
    #[strum(serialize = "not_iglob")]
    #[serde(rename = "not_iglob")]
    NotIGlob,
    /// Case-insensitive equality.
    #[strum(serialize = "iexact")]
    #[serde(rename = "iexact")]
    IExact,
    /// Case-insensitive inequality.
    #[strum(serialize = "not_iexact")]
    #[serde(rename = "not_iexact")]
    NotIExact,
    /// Substring match.
    Contains,
    /// Substring does not match.
    NotContains,
    /// Case-insensitive substring match.
    #[strum(serialize = "icontains")]
    #[serde(rename = "icontains")]
    IContains,
    /// Case-insensitive substring does not match.
    #[strum(serialize = "not_icontains")]
    #[serde(rename = "not_icontains")]
    NotIContains,
    /// Prefix match.
    #[strum(serialize = "startswith")]
    #[serde(rename = "startswith")]
    StartsWith,
    /// Suffix match.
    #[strum(serialize = "endswith")]
    #[serde(rename = "endswith")]
    EndsWith,
    /// Regular expression search.
    Regex,
    /// Case-insensitive regular expression search.
    #[strum(serialize = "iregex")]
    #[serde(rename = "iregex")]
    IRegex,
}

/// Returned when a string does not name a [`QueryCmp`].
#[derive(Debug, Clone, Eq, PartialEq, Error)]
#[error("unknown comparison '{0}'")]
pub struct ParseQueryCmpError(pub String);

impl QueryCmp {
    /// True for the negated comparisons like `Neq` and `NotGlob`.
    pub fn is_negated(self) -> bool {
        matches!(
            self,
            QueryCmp::Neq
                | QueryCmp::NotGlob
                | QueryCmp::NotIGlob
                | QueryCmp::NotIExact
                | QueryCmp::NotContains
                | QueryCmp::NotIContains
        )
    }

    /// The comparison with negation removed. Negated filters are evaluated by matching the
    /// positive comparison and excluding every hit.
    pub fn positive(self) -> QueryCmp {
        match self {
            QueryCmp::Neq => QueryCmp::Eq,
            QueryCmp::NotGlob => QueryCmp::Glob,
            QueryCmp::NotIGlob => QueryCmp::IGlob,
            QueryCmp::NotIExact => QueryCmp::IExact,
            QueryCmp::NotContains => QueryCmp::Contains,
            QueryCmp::NotIContains => QueryCmp::IContains,
            other => other,
        }
    }

    /// True for `Eq`, `Neq`, `Lt`, `Lte`, `Gt` and `Gte`.
    pub fn is_ordering(self) -> bool {
        matches!(
            self,
            QueryCmp::Eq | QueryCmp::Neq | QueryCmp::Lt | QueryCmp::Lte | QueryCmp::Gt | QueryCmp::Gte
        )
    }

    /// True for the case-insensitive comparisons.
    pub fn is_icase(self) -> bool {
        matches!(
            self,
            QueryCmp::IGlob
                | QueryCmp::NotIGlob
                | QueryCmp::IExact
                | QueryCmp::NotIExact
                | QueryCmp::IContains
                | QueryCmp::NotIContains
                | QueryCmp::IRegex
        )
    }

    /// For ordering comparisons, returns true if a value comparing to the pattern as `ordering`
    /// is accepted. Always false for string comparisons.
    pub fn ordering_matches(self, ordering: Ordering) -> bool {
        match self {
            QueryCmp::Eq => ordering == Ordering::Equal,
            QueryCmp::Neq => ordering != Ordering::Equal,
            QueryCmp::Lt => ordering == Ordering::Less,
            QueryCmp::Lte => ordering != Ordering::Greater,
            QueryCmp::Gt => ordering == Ordering::Greater,
            QueryCmp::Gte => ordering != Ordering::Less,
            _ => false,
        }
    }
}

impl FromStr for QueryCmp {
    type Err = ParseQueryCmpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let symbolic = match s {
            "=" | "==" => Some(QueryCmp::Eq),
            "!=" => Some(QueryCmp::Neq),
            "<" => Some(QueryCmp::Lt),
            "<=" => Some(QueryCmp::Lte),
            ">" => Some(QueryCmp::Gt),
            ">=" => Some(QueryCmp::Gte),
            _ => None,
        };
        symbolic
            .or_else(|| QueryCmp::iter().find(|cmp| cmp.as_ref() == s))
            .ok_or_else(|| ParseQueryCmpError(s.to_owned()))
    }
}
