use std::fmt::{Display, Formatter};

use glob::MatchOptions;
use thiserror::Error;

use crate::QueryCmp;

/// A compiled string comparison. Build one with [`StringMatcher::new`] from a [`QueryCmp`] and a
/// pattern, then test candidates with [`StringMatcher::matches`].
///
/// Negated comparisons are compiled to their positive counterpart, callers decide how to combine
/// negated matches.
#[derive(Debug, Clone)]
pub enum StringMatcher {
    /// Match the string exactly.
    Exact(String),
    /// Case-insensitive equality. The stored string is lowercase.
    IExact(String),
    /// Match by glob. `*` matches any run of characters, `?` a single character.
    Glob(glob::Pattern, bool),
    /// Search with a regular expression. The expression is not anchored.
    Regex(regex::Regex),
    /// Substring match.
    Contains(String),
    /// Case-insensitive substring match. The stored string is lowercase.
    IContains(String),
    /// Prefix match.
    StartsWith(String),
    /// Suffix match.
    EndsWith(String),
}

/// Error when compiling a [`StringMatcher`]
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum StringMatcherParseError {
    /// Could not parse the string as a glob
    #[error("invalid glob: {glob}")]
    InvalidGlob {
        /// The invalid glob
        glob: String,
    },

    /// Could not parse the string as a regex
    #[error("invalid regex: {regex}")]
    InvalidRegex {
        /// The invalid regex
        regex: String,
    },

    /// The comparison does not apply to strings
    #[error("'{0}' cannot be used to match strings")]
    UnsupportedCmp(QueryCmp),
}

impl StringMatcher {
    /// Compiles `pattern` for the given comparison.
    pub fn new(cmp: QueryCmp, pattern: &str) -> Result<Self, StringMatcherParseError> {
        let matcher = match cmp.positive() {
            QueryCmp::Eq => StringMatcher::Exact(pattern.to_owned()),
            QueryCmp::IExact => StringMatcher::IExact(pattern.to_lowercase()),
            QueryCmp::Glob | QueryCmp::IGlob => StringMatcher::Glob(
                glob::Pattern::new(pattern).map_err(|_| StringMatcherParseError::InvalidGlob {
                    glob: pattern.to_owned(),
                })?,
                cmp.is_icase(),
            ),
            QueryCmp::Regex | QueryCmp::IRegex => StringMatcher::Regex(
                regex::RegexBuilder::new(pattern)
                    .case_insensitive(cmp.is_icase())
                    .build()
                    .map_err(|_| StringMatcherParseError::InvalidRegex {
                        regex: pattern.to_owned(),
                    })?,
            ),
            QueryCmp::Contains => StringMatcher::Contains(pattern.to_owned()),
            QueryCmp::IContains => StringMatcher::IContains(pattern.to_lowercase()),
            QueryCmp::StartsWith => StringMatcher::StartsWith(pattern.to_owned()),
            QueryCmp::EndsWith => StringMatcher::EndsWith(pattern.to_owned()),
            other => return Err(StringMatcherParseError::UnsupportedCmp(other)),
        };
        Ok(matcher)
    }

    /// Match string against [`StringMatcher`].
    pub fn matches(&self, other: &str) -> bool {
        match self {
            StringMatcher::Exact(s) => s == other,
            StringMatcher::IExact(s) => *s == other.to_lowercase(),
            StringMatcher::Glob(glob, icase) => glob.matches_with(
                other,
                MatchOptions {
                    case_sensitive: !icase,
                    require_literal_separator: false,
                    require_literal_leading_dot: false,
                },
            ),
            StringMatcher::Regex(regex) => regex.is_match(other),
            StringMatcher::Contains(s) => other.contains(s.as_str()),
            StringMatcher::IContains(s) => other.to_lowercase().contains(s.as_str()),
            StringMatcher::StartsWith(s) => other.starts_with(s.as_str()),
            StringMatcher::EndsWith(s) => other.ends_with(s.as_str()),
        }
    }

    /// Returns the literal string if this matcher only accepts a single exact value. Used to
    /// replace scans by index lookups.
    pub fn as_exact(&self) -> Option<&str> {
        match self {
            StringMatcher::Exact(s) => Some(s),
            _ => None,
        }
    }
}

/// Returns true if `pattern` contains glob metacharacters.
pub fn is_glob_pattern(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

impl PartialEq for StringMatcher {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (StringMatcher::Exact(s1), StringMatcher::Exact(s2))
            | (StringMatcher::IExact(s1), StringMatcher::IExact(s2))
            | (StringMatcher::Contains(s1), StringMatcher::Contains(s2))
            | (StringMatcher::IContains(s1), StringMatcher::IContains(s2))
            | (StringMatcher::StartsWith(s1), StringMatcher::StartsWith(s2))
            | (StringMatcher::EndsWith(s1), StringMatcher::EndsWith(s2)) => s1 == s2,
            (StringMatcher::Glob(g1, i1), StringMatcher::Glob(g2, i2)) => {
                g1.as_str() == g2.as_str() && i1 == i2
            }
            (StringMatcher::Regex(r1), StringMatcher::Regex(r2)) => r1.as_str() == r2.as_str(),
            _ => false,
        }
    }
}

impl Eq for StringMatcher {}

impl Display for StringMatcher {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StringMatcher::Exact(s)
            | StringMatcher::IExact(s)
            | StringMatcher::Contains(s)
            | StringMatcher::IContains(s)
            | StringMatcher::StartsWith(s)
            | StringMatcher::EndsWith(s) => write!(f, "{s}"),
            StringMatcher::Glob(s, _) => write!(f, "{}", s.as_str()),
            StringMatcher::Regex(s) => write!(f, "{}", s.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;

    #[rstest]
    #[case(QueryCmp::Eq, "wget", "wget", true)]
    #[case(QueryCmp::Eq, "wget", "Wget", false)]
    #[case(QueryCmp::IExact, "WGET", "wget", true)]
    #[case(QueryCmp::Glob, "dwm*", "dwm-debuginfo", true)]
    #[case(QueryCmp::Glob, "*2020-1", "DNF-2020-1", true)]
    #[case(QueryCmp::Glob, "*2020-1", "DNF-2019-1", false)]
    #[case(QueryCmp::Glob, "glib?", "glibc", true)]
    #[case(QueryCmp::Glob, "DWM*", "dwm", false)]
    #[case(QueryCmp::IGlob, "DWM*", "dwm", true)]
    #[case(QueryCmp::NotGlob, "dwm*", "dwm", true)]
    #[case(QueryCmp::Glob, "/usr/*/wget", "/usr/bin/wget", true)]
    #[case(QueryCmp::Regex, "^lib.*c$", "glibc", false)]
    #[case(QueryCmp::Regex, "lib", "glibc", true)]
    #[case(QueryCmp::IRegex, "^GLIBC", "glibc-common", true)]
    #[case(QueryCmp::Contains, "debug", "dwm-debuginfo", true)]
    #[case(QueryCmp::IContains, "DEBUG", "dwm-debuginfo", true)]
    #[case(QueryCmp::StartsWith, "dwm-", "dwm-doc", true)]
    #[case(QueryCmp::EndsWith, "info", "dwm-debuginfo", true)]
    #[case(QueryCmp::EndsWith, "info", "dwm", false)]
    fn test_matches(
        #[case] cmp: QueryCmp,
        #[case] pattern: &str,
        #[case] candidate: &str,
        #[case] expected: bool,
    ) {
        let matcher = StringMatcher::new(cmp, pattern).unwrap();
        assert_eq!(matcher.matches(candidate), expected);
    }

    #[test]
    fn test_invalid() {
        assert_matches!(
            StringMatcher::new(QueryCmp::Glob, "[a"),
            Err(StringMatcherParseError::InvalidGlob { .. })
        );
        assert_matches!(
            StringMatcher::new(QueryCmp::Regex, "(a"),
            Err(StringMatcherParseError::InvalidRegex { .. })
        );
        assert_matches!(
            StringMatcher::new(QueryCmp::Lt, "a"),
            Err(StringMatcherParseError::UnsupportedCmp(QueryCmp::Lt))
        );
    }

    #[test]
    fn test_equality() {
        assert_eq!(
            StringMatcher::new(QueryCmp::Glob, "foo*").unwrap(),
            StringMatcher::new(QueryCmp::NotGlob, "foo*").unwrap()
        );
        assert_ne!(
            StringMatcher::new(QueryCmp::Glob, "foo*").unwrap(),
            StringMatcher::new(QueryCmp::IGlob, "foo*").unwrap()
        );
        assert_eq!(
            StringMatcher::new(QueryCmp::Eq, "foo").unwrap().as_exact(),
            Some("foo")
        );
        assert!(is_glob_pattern("dwm*"));
        assert!(!is_glob_pattern("dwm"));
    }
}
