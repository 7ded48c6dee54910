use nom::{
    bytes::complete::{take_while, take_while1},
    character::complete::multispace0,
    IResult,
};
use thiserror::Error;

use super::{ParsedReldep, RelOperator};

/// The keywords that may connect the operands of a rich dependency.
const RICH_KEYWORDS: [&str; 7] = ["and", "or", "if", "unless", "else", "with", "without"];

/// The reason why a dependency string could not be parsed.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ParseReldepErrorKind {
    /// The string is empty or whitespace.
    #[error("empty dependency")]
    Empty,

    /// The name is missing.
    #[error("expected a dependency name")]
    ExpectedName,

    /// The operator is not one of `=`, `==`, `<`, `<=`, `>`, `>=`.
    #[error("invalid operator '{0}'")]
    InvalidOperator(String),

    /// An operator is not followed by a version.
    #[error("expected a version after the operator")]
    ExpectedVersion,

    /// There is input left after the version.
    #[error("unexpected trailing characters")]
    TrailingCharacters,

    /// The parentheses of a rich dependency do not match.
    #[error("unbalanced parentheses")]
    UnbalancedParentheses,

    /// A parenthesized expression does not use any of the rich dependency keywords.
    #[error("expected one of {} in rich dependency", RICH_KEYWORDS.join(", "))]
    ExpectedRichKeyword,
}

/// An error that occurred while parsing a dependency string.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
#[error("failed to parse dependency '{input}' at offset {offset}: {kind}")]
pub struct ParseReldepError {
    /// The complete input.
    pub input: String,
    /// Byte offset into `input` where the problem was detected.
    pub offset: usize,
    /// What went wrong.
    pub kind: ParseReldepErrorKind,
}

type Res<'i, O> = IResult<&'i str, O, nom::error::Error<&'i str>>;

fn is_operator_char(c: char) -> bool {
    matches!(c, '<' | '>' | '=')
}

fn name_parser(input: &str) -> Res<'_, &str> {
    take_while1(|c: char| !c.is_whitespace() && !is_operator_char(c))(input)
}

fn operator_parser(input: &str) -> Res<'_, &str> {
    take_while1(is_operator_char)(input)
}

fn version_parser(input: &str) -> Res<'_, &str> {
    take_while(|c: char| !c.is_whitespace())(input)
}

/// Parses `name`, `name op version` or a rich dependency in parentheses.
pub(super) fn parse_reldep(input: &str) -> Result<ParsedReldep, ParseReldepError> {
    let error = |rest: &str, kind| ParseReldepError {
        input: input.to_owned(),
        offset: input.len() - rest.len(),
        kind,
    };

    let (rest, _) = multispace0::<_, nom::error::Error<&str>>(input)
        .map_err(|_| error(input, ParseReldepErrorKind::Empty))?;
    if rest.is_empty() {
        return Err(error(rest, ParseReldepErrorKind::Empty));
    }

    if rest.starts_with('(') {
        return parse_rich(rest.trim_end())
            .map(|()| ParsedReldep {
                name: rest.trim_end().to_owned(),
                op: None,
                version: None,
                rich: true,
            })
            .map_err(|(offset_in_rest, kind)| {
                error(&rest[offset_in_rest.min(rest.len())..], kind)
            });
    }

    let (rest, name) =
        name_parser(rest).map_err(|_| error(rest, ParseReldepErrorKind::ExpectedName))?;
    let (rest, _) = multispace0::<_, nom::error::Error<&str>>(rest)
        .map_err(|_| error(rest, ParseReldepErrorKind::TrailingCharacters))?;
    if rest.is_empty() {
        return Ok(ParsedReldep::unversioned(name));
    }

    let (after_op, op_str) =
        operator_parser(rest).map_err(|_| error(rest, ParseReldepErrorKind::TrailingCharacters))?;
    let op: RelOperator = op_str.parse().map_err(|kind| error(rest, kind))?;

    let (rest, _) = multispace0::<_, nom::error::Error<&str>>(after_op)
        .map_err(|_| error(after_op, ParseReldepErrorKind::ExpectedVersion))?;
    let (rest, version) =
        version_parser(rest).map_err(|_| error(rest, ParseReldepErrorKind::ExpectedVersion))?;
    if version.is_empty() {
        return Err(error(rest, ParseReldepErrorKind::ExpectedVersion));
    }

    let (rest, _) = multispace0::<_, nom::error::Error<&str>>(rest)
        .map_err(|_| error(rest, ParseReldepErrorKind::TrailingCharacters))?;
    if !rest.is_empty() {
        return Err(error(rest, ParseReldepErrorKind::TrailingCharacters));
    }

    Ok(ParsedReldep::versioned(name, op, version))
}

/// Validates the shape of a rich dependency: balanced parentheses around the whole expression and
/// at least one keyword. On failure returns the offset into `input` and the error kind.
fn parse_rich(input: &str) -> Result<(), (usize, ParseReldepErrorKind)> {
    let mut depth = 0usize;
    for (offset, c) in input.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or((offset, ParseReldepErrorKind::UnbalancedParentheses))?;
                if depth == 0 && offset + 1 != input.len() {
                    return Err((offset + 1, ParseReldepErrorKind::TrailingCharacters));
                }
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err((input.len(), ParseReldepErrorKind::UnbalancedParentheses));
    }

    let has_keyword = input
        .split(|c: char| c.is_whitespace() || c == '(' || c == ')')
        .any(|word| RICH_KEYWORDS.contains(&word));
    if !has_keyword {
        return Err((0, ParseReldepErrorKind::ExpectedRichKeyword));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;

    #[rstest]
    #[case("wget", "wget", None, None)]
    #[case("  wget  ", "wget", None, None)]
    #[case("delgado > 1.2", "delgado", Some(RelOperator::Gt), Some("1.2"))]
    #[case("glibc>=2.28", "glibc", Some(RelOperator::Ge), Some("2.28"))]
    #[case("glibc == 2.28-9", "glibc", Some(RelOperator::Eq), Some("2.28-9"))]
    #[case("pkgconfig(libfoo) <= 1:2.0", "pkgconfig(libfoo)", Some(RelOperator::Le), Some("1:2.0"))]
    #[case("/usr/bin/sh", "/usr/bin/sh", None, None)]
    fn test_parse_simple(
        #[case] input: &str,
        #[case] name: &str,
        #[case] op: Option<RelOperator>,
        #[case] version: Option<&str>,
    ) {
        let reldep = parse_reldep(input).unwrap();
        assert_eq!(reldep.name, name);
        assert_eq!(reldep.op, op);
        assert_eq!(reldep.version.as_deref(), version);
        assert!(!reldep.rich);
    }

    #[rstest]
    #[case("(a and b)")]
    #[case("(foo if bar)")]
    #[case("(python3-foo unless (python2 >= 2.7 or baz))")]
    #[case("(a with b)")]
    fn test_parse_rich(#[case] input: &str) {
        let reldep = parse_reldep(input).unwrap();
        assert!(reldep.rich);
        assert_eq!(reldep.name, input);
        assert_eq!(reldep.op, None);
    }

    #[test]
    fn test_parse_errors() {
        assert_matches!(
            parse_reldep("   "),
            Err(ParseReldepError {
                kind: ParseReldepErrorKind::Empty,
                ..
            })
        );
        assert_matches!(
            parse_reldep("foo =< 1.0"),
            Err(ParseReldepError {
                offset: 4,
                kind: ParseReldepErrorKind::InvalidOperator(_),
                ..
            })
        );
        assert_matches!(
            parse_reldep("foo >= "),
            Err(ParseReldepError {
                kind: ParseReldepErrorKind::ExpectedVersion,
                ..
            })
        );
        assert_matches!(
            parse_reldep("foo >= 1.0 bar"),
            Err(ParseReldepError {
                offset: 11,
                kind: ParseReldepErrorKind::TrailingCharacters,
                ..
            })
        );
        assert_matches!(
            parse_reldep(">= 1.0"),
            Err(ParseReldepError {
                offset: 0,
                kind: ParseReldepErrorKind::ExpectedName,
                ..
            })
        );
        assert_matches!(
            parse_reldep("(a and b"),
            Err(ParseReldepError {
                kind: ParseReldepErrorKind::UnbalancedParentheses,
                ..
            })
        );
        assert_matches!(
            parse_reldep("(a b)"),
            Err(ParseReldepError {
                kind: ParseReldepErrorKind::ExpectedRichKeyword,
                ..
            })
        );
    }

    #[test]
    fn test_error_message() {
        let err = parse_reldep("foo >= 1.0 bar").unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"failed to parse dependency 'foo >= 1.0 bar' at offset 11: unexpected trailing characters");
    }
}
