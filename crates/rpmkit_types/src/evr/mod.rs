//! Epoch-version-release handling.
//!
//! An EVR is written as `[epoch:]version[-release]`. The epoch is a non-negative integer that
//! dominates the comparison, the version and the release are compared with [`rpmvercmp`].

mod vercmp;

use std::{
    cmp::Ordering,
    fmt::{Display, Formatter},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use vercmp::rpmvercmp;

/// Selects how missing parts of an EVR are treated when comparing.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub enum EvrCmpMode {
    /// A missing epoch equals epoch `0`. A missing release sorts before any release.
    #[default]
    Compare,

    /// Like [`EvrCmpMode::Compare`] but a release that is missing on either side matches any
    /// release. This is how a dependency like `foo >= 1.0` matches the provide `foo = 1.0-3`.
    MatchRelease,

    /// A missing epoch is genuinely absent and sorts before every explicit epoch, including `0`.
    Strict,
}

/// Borrowed view of an EVR string split into its three parts.
///
/// Splitting never fails: a prefix before `:` is only taken as epoch if it consists of digits,
/// otherwise it stays part of the version.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct EvrRef<'a> {
    /// The epoch digits, if present.
    pub epoch: Option<&'a str>,
    /// The version part.
    pub version: &'a str,
    /// The release part, if present.
    pub release: Option<&'a str>,
}

impl<'a> EvrRef<'a> {
    /// Splits an EVR string on the first `:` and then on the first `-`.
    pub fn split(evr: &'a str) -> Self {
        let (epoch, rest) = match evr.split_once(':') {
            Some((epoch, rest)) if !epoch.is_empty() && epoch.bytes().all(|c| c.is_ascii_digit()) => {
                (Some(epoch), rest)
            }
            _ => (None, evr),
        };
        let (version, release) = match rest.split_once('-') {
            Some((version, release)) => (version, Some(release)),
            None => (rest, None),
        };
        Self {
            epoch,
            version,
            release,
        }
    }

    /// Compares two EVRs with the given mode.
    pub fn compare(&self, other: &EvrRef<'_>, mode: EvrCmpMode) -> Ordering {
        let epoch_ordering = match mode {
            EvrCmpMode::Strict => match (self.epoch, other.epoch) {
                (Some(a), Some(b)) => rpmvercmp(a, b),
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
            },
            _ => rpmvercmp(self.epoch.unwrap_or("0"), other.epoch.unwrap_or("0")),
        };
        if epoch_ordering != Ordering::Equal {
            return epoch_ordering;
        }

        let version_ordering = rpmvercmp(self.version, other.version);
        if version_ordering != Ordering::Equal {
            return version_ordering;
        }

        match (self.release, other.release) {
            (Some(a), Some(b)) => rpmvercmp(a, b),
            (None, None) => Ordering::Equal,
            _ if mode == EvrCmpMode::MatchRelease => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
        }
    }
}

/// Compares two EVR strings, treating a missing epoch as `0`.
///
/// ```
/// # use std::cmp::Ordering;
/// # use rpmkit_types::compare_evr;
/// assert_eq!(compare_evr("1:1.0-1", "0:9.0-1"), Ordering::Greater);
/// assert_eq!(compare_evr("1.0-1", "0:1.0-1"), Ordering::Equal);
/// ```
pub fn compare_evr(evr1: &str, evr2: &str) -> Ordering {
    compare_evr_with(evr1, evr2, EvrCmpMode::Compare)
}

/// Compares two EVR strings using the given [`EvrCmpMode`].
pub fn compare_evr_with(evr1: &str, evr2: &str, mode: EvrCmpMode) -> Ordering {
    if evr1 == evr2 {
        return Ordering::Equal;
    }
    EvrRef::split(evr1).compare(&EvrRef::split(evr2), mode)
}

/// An owned, validated epoch-version-release triple.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Evr {
    epoch: Option<u64>,
    version: String,
    release: Option<String>,
}

/// An error that can occur when parsing an [`Evr`].
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ParseEvrError {
    /// The string was empty.
    #[error("empty evr")]
    Empty,

    /// The part before `:` is not a number.
    #[error("invalid epoch '{0}'")]
    InvalidEpoch(String),

    /// There is no version between the epoch and the release.
    #[error("missing version in '{0}'")]
    MissingVersion(String),

    /// There is a `-` but nothing after it.
    #[error("missing release in '{0}'")]
    MissingRelease(String),
}

impl Evr {
    /// Constructs a new EVR from its parts.
    pub fn new(epoch: Option<u64>, version: impl Into<String>, release: Option<String>) -> Self {
        Self {
            epoch,
            version: version.into(),
            release,
        }
    }

    /// The epoch, `None` if it was not specified.
    pub fn epoch(&self) -> Option<u64> {
        self.epoch
    }

    /// The epoch, defaulting to `0`.
    pub fn epoch_or_default(&self) -> u64 {
        self.epoch.unwrap_or(0)
    }

    /// The version part.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The release part, if present.
    pub fn release(&self) -> Option<&str> {
        self.release.as_deref()
    }

    /// Compares two EVRs with the given mode.
    pub fn compare(&self, other: &Evr, mode: EvrCmpMode) -> Ordering {
        let epoch_ordering = match mode {
            EvrCmpMode::Strict => self.epoch.cmp(&other.epoch),
            _ => self.epoch_or_default().cmp(&other.epoch_or_default()),
        };
        epoch_ordering.then_with(|| {
            let this = EvrRef {
                epoch: None,
                version: &self.version,
                release: self.release.as_deref(),
            };
            let that = EvrRef {
                epoch: None,
                version: &other.version,
                release: other.release.as_deref(),
            };
            this.compare(&that, mode)
        })
    }
}

impl FromStr for Evr {
    type Err = ParseEvrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseEvrError::Empty);
        }

        let (epoch, rest) = match s.split_once(':') {
            Some((epoch, rest)) => {
                let epoch = epoch
                    .parse::<u64>()
                    .map_err(|_| ParseEvrError::InvalidEpoch(epoch.to_owned()))?;
                (Some(epoch), rest)
            }
            None => (None, s),
        };

        let (version, release) = match rest.split_once('-') {
            Some((_, "")) => return Err(ParseEvrError::MissingRelease(s.to_owned())),
            Some((version, release)) => (version, Some(release.to_owned())),
            None => (rest, None),
        };
        if version.is_empty() {
            return Err(ParseEvrError::MissingVersion(s.to_owned()));
        }

        Ok(Self {
            epoch,
            version: version.to_owned(),
            release,
        })
    }
}

impl Display for Evr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(epoch) = self.epoch {
            write!(f, "{epoch}:")?;
        }
        write!(f, "{}", self.version)?;
        if let Some(release) = &self.release {
            write!(f, "-{release}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("1:1.0-1", "0:9.0-1", Ordering::Greater)]
    #[case("1.0-1", "0:1.0-1", Ordering::Equal)]
    #[case("2:1.0", "10:0.1", Ordering::Less)]
    #[case("1.0-1", "1.0-2", Ordering::Less)]
    #[case("1.0", "1.0-1", Ordering::Less)]
    #[case("1.19.5-5.fc29", "1.19.5-4.fc29", Ordering::Greater)]
    #[case("0:1.0~beta-1", "1.0-1", Ordering::Less)]
    fn test_compare_evr(#[case] a: &str, #[case] b: &str, #[case] expected: Ordering) {
        assert_eq!(compare_evr(a, b), expected);
        assert_eq!(compare_evr(b, a), expected.reverse());
    }

    #[test]
    fn test_match_release() {
        assert_eq!(
            compare_evr_with("1.0", "1.0-3", EvrCmpMode::MatchRelease),
            Ordering::Equal
        );
        assert_eq!(
            compare_evr_with("1.0-2", "1.0-3", EvrCmpMode::MatchRelease),
            Ordering::Less
        );
    }

    #[test]
    fn test_strict_epoch() {
        assert_eq!(
            compare_evr_with("1.0-1", "0:1.0-1", EvrCmpMode::Strict),
            Ordering::Less
        );
        assert_eq!(
            compare_evr_with("0:1.0-1", "0:1.0-1", EvrCmpMode::Strict),
            Ordering::Equal
        );

        let a: Evr = "1.0-1".parse().unwrap();
        let b: Evr = "0:1.0-1".parse().unwrap();
        assert_eq!(a.compare(&b, EvrCmpMode::Compare), Ordering::Equal);
        assert_eq!(a.compare(&b, EvrCmpMode::Strict), Ordering::Less);
    }

    #[test]
    fn test_split() {
        assert_eq!(
            EvrRef::split("3:1.2-4.fc29"),
            EvrRef {
                epoch: Some("3"),
                version: "1.2",
                release: Some("4.fc29")
            }
        );
        assert_eq!(
            EvrRef::split("x:1.2"),
            EvrRef {
                epoch: None,
                version: "x:1.2",
                release: None
            }
        );
    }

    #[test]
    fn test_parse_evr() {
        let evr: Evr = "2:1.19.5-5.fc29".parse().unwrap();
        assert_eq!(evr.epoch(), Some(2));
        assert_eq!(evr.version(), "1.19.5");
        assert_eq!(evr.release(), Some("5.fc29"));
        assert_eq!(evr.to_string(), "2:1.19.5-5.fc29");

        let evr: Evr = "1.0".parse().unwrap();
        assert_eq!(evr.epoch(), None);
        assert_eq!(evr.release(), None);
        assert_eq!(evr.to_string(), "1.0");

        assert_matches!(Evr::from_str(""), Err(ParseEvrError::Empty));
        assert_matches!(Evr::from_str("a:1.0"), Err(ParseEvrError::InvalidEpoch(_)));
        assert_matches!(Evr::from_str("1:-1"), Err(ParseEvrError::MissingVersion(_)));
        assert_matches!(Evr::from_str("1.0-"), Err(ParseEvrError::MissingRelease(_)));
    }

    fn evr_strategy() -> impl Strategy<Value = String> {
        (
            prop::option::of(0u8..3),
            "[0-9a-c~^.]{1,6}",
            prop::option::of("[0-9a-c~^.]{1,4}"),
        )
            .prop_map(|(epoch, version, release)| {
                let mut evr = String::new();
                if let Some(epoch) = epoch {
                    evr.push_str(&format!("{epoch}:"));
                }
                evr.push_str(&version);
                if let Some(release) = release {
                    evr.push('-');
                    evr.push_str(&release);
                }
                evr
            })
    }

    proptest! {
        #[test]
        fn compare_evr_is_reflexive(a in evr_strategy()) {
            prop_assert_eq!(compare_evr(&a, &a), Ordering::Equal);
        }

        #[test]
        fn compare_evr_is_antisymmetric(a in evr_strategy(), b in evr_strategy()) {
            prop_assert_eq!(compare_evr(&a, &b), compare_evr(&b, &a).reverse());
        }

        #[test]
        fn compare_evr_is_transitive(a in evr_strategy(), b in evr_strategy(), c in evr_strategy()) {
            let ab = compare_evr(&a, &b);
            let bc = compare_evr(&b, &c);
            if ab == bc {
                prop_assert_eq!(compare_evr(&a, &c), ab);
            }
        }
    }
}
