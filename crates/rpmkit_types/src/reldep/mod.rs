//! Relational dependencies such as `glibc >= 2.28` and the rules to decide whether two of them
//! can be satisfied by the same package.

mod parse;

use std::{
    cmp::Ordering,
    fmt::{Display, Formatter},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::evr::{compare_evr_with, EvrCmpMode};

pub use parse::{ParseReldepError, ParseReldepErrorKind};

/// The comparison operator of a versioned dependency.
///
/// The discriminants are the bit flags used by the solver: `>` is `1`, `=` is `2` and `<` is
/// `4`. The combined operators are the union of their parts.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum RelOperator {
    /// `>`
    #[serde(rename = ">")]
    Gt = 1,
    /// `=`
    #[serde(rename = "=")]
    Eq = 2,
    /// `>=`
    #[serde(rename = ">=")]
    Ge = 3,
    /// `<`
    #[serde(rename = "<")]
    Lt = 4,
    /// `<=`
    #[serde(rename = "<=")]
    Le = 6,
}

const FLAG_GT: u8 = 1;
const FLAG_EQ: u8 = 2;
const FLAG_LT: u8 = 4;

impl RelOperator {
    /// The solver bit flags of the operator.
    pub fn flags(self) -> u8 {
        self as u8
    }

    /// The textual representation.
    pub fn as_str(self) -> &'static str {
        match self {
            RelOperator::Gt => ">",
            RelOperator::Eq => "=",
            RelOperator::Ge => ">=",
            RelOperator::Lt => "<",
            RelOperator::Le => "<=",
        }
    }

    /// Returns true if a version that compares to the reference as `ordering` is accepted.
    pub fn matches(self, ordering: Ordering) -> bool {
        let flag = match ordering {
            Ordering::Less => FLAG_LT,
            Ordering::Equal => FLAG_EQ,
            Ordering::Greater => FLAG_GT,
        };
        self.flags() & flag != 0
    }
}

impl Display for RelOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelOperator {
    type Err = ParseReldepErrorKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ">" => Ok(RelOperator::Gt),
            "=" | "==" => Ok(RelOperator::Eq),
            ">=" => Ok(RelOperator::Ge),
            "<" => Ok(RelOperator::Lt),
            "<=" => Ok(RelOperator::Le),
            _ => Err(ParseReldepErrorKind::InvalidOperator(s.to_owned())),
        }
    }
}

/// A dependency string split into its parts, before it is interned into a pool.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ParsedReldep {
    /// The dependency name. For rich dependencies this is the complete expression.
    pub name: String,

    /// The operator, `None` for unversioned dependencies.
    pub op: Option<RelOperator>,

    /// The version the operator refers to.
    pub version: Option<String>,

    /// True for boolean dependencies like `(a if b)`. These are kept as a single opaque name.
    pub rich: bool,
}

impl ParsedReldep {
    /// Constructs an unversioned dependency.
    pub fn unversioned(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            op: None,
            version: None,
            rich: false,
        }
    }

    /// Constructs a versioned dependency.
    pub fn versioned(name: impl Into<String>, op: RelOperator, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            op: Some(op),
            version: Some(version.into()),
            rich: false,
        }
    }
}

impl FromStr for ParsedReldep {
    type Err = ParseReldepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse::parse_reldep(s)
    }
}

impl Display for ParsedReldep {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match (&self.op, &self.version) {
            (Some(op), Some(version)) => write!(f, "{} {op} {version}", self.name),
            _ => write!(f, "{}", self.name),
        }
    }
}

/// Returns true if there is a version that satisfies both `op1 evr1` and `op2 evr2`.
///
/// A side without operator matches every version. Releases that are missing on either side are
/// ignored, so `foo >= 1.0` overlaps with `foo = 1.0-3`.
pub fn ranges_overlap(
    op1: Option<RelOperator>,
    evr1: &str,
    op2: Option<RelOperator>,
    evr2: &str,
) -> bool {
    let (Some(op1), Some(op2)) = (op1, op2) else {
        return true;
    };
    let (f1, f2) = (op1.flags(), op2.flags());

    // Both ranges are open towards the same side.
    if f1 & f2 & (FLAG_GT | FLAG_LT) != 0 {
        return true;
    }

    match compare_evr_with(evr1, evr2, EvrCmpMode::MatchRelease) {
        Ordering::Equal => f1 & f2 & FLAG_EQ != 0,
        Ordering::Less => f1 & FLAG_GT != 0 || f2 & FLAG_LT != 0,
        Ordering::Greater => f1 & FLAG_LT != 0 || f2 & FLAG_GT != 0,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(None, "", Some(RelOperator::Ge), "1.0", true)]
    #[case(Some(RelOperator::Eq), "1.0-3", Some(RelOperator::Ge), "1.0", true)]
    #[case(Some(RelOperator::Eq), "1.0-3", Some(RelOperator::Gt), "1.0", false)]
    #[case(Some(RelOperator::Eq), "2.0", Some(RelOperator::Gt), "1.0", true)]
    #[case(Some(RelOperator::Eq), "0.9", Some(RelOperator::Gt), "1.0", false)]
    #[case(Some(RelOperator::Lt), "1.0", Some(RelOperator::Lt), "5.0", true)]
    #[case(Some(RelOperator::Lt), "1.0", Some(RelOperator::Gt), "5.0", false)]
    #[case(Some(RelOperator::Le), "5.0", Some(RelOperator::Ge), "5.0", true)]
    #[case(Some(RelOperator::Lt), "5.0", Some(RelOperator::Ge), "5.0", false)]
    #[case(Some(RelOperator::Eq), "1:1.0", Some(RelOperator::Ge), "2.0", true)]
    #[case(Some(RelOperator::Eq), "1.0-1", Some(RelOperator::Eq), "1.0-2", false)]
    fn test_ranges_overlap(
        #[case] op1: Option<RelOperator>,
        #[case] evr1: &str,
        #[case] op2: Option<RelOperator>,
        #[case] evr2: &str,
        #[case] expected: bool,
    ) {
        assert_eq!(ranges_overlap(op1, evr1, op2, evr2), expected);
        assert_eq!(ranges_overlap(op2, evr2, op1, evr1), expected);
    }

    #[test]
    fn test_operator_matches() {
        assert!(RelOperator::Ge.matches(Ordering::Equal));
        assert!(RelOperator::Ge.matches(Ordering::Greater));
        assert!(!RelOperator::Ge.matches(Ordering::Less));
        assert!(RelOperator::Le.matches(Ordering::Less));
        assert!(!RelOperator::Eq.matches(Ordering::Less));
    }

    #[test]
    fn test_display() {
        let reldep: ParsedReldep = "delgado > 1.2".parse().unwrap();
        insta::assert_snapshot!(reldep.to_string(), @"delgado > 1.2");
        let reldep: ParsedReldep = "python3-dnf>=4.0".parse().unwrap();
        insta::assert_snapshot!(reldep.to_string(), @"python3-dnf >= 4.0");
    }
}
