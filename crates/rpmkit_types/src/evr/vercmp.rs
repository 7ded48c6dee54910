use std::cmp::Ordering;

/// Compares two version (or release) strings using the RPM segment algorithm.
///
/// Both strings are split into alternating runs of digits and letters; all other characters act as
/// separators. Numeric runs are compared as integers (leading zeros are ignored), alphabetic runs
/// are compared bytewise and a numeric run is always newer than an alphabetic one.
///
/// Two characters are treated specially:
///
/// * `~` sorts before anything, even the end of the string, so `1.0~rc1` is older than `1.0`.
/// * `^` sorts after the end of the string but before anything else, so `1.0^git1` is newer than
///   `1.0` but older than `1.0.1`.
pub fn rpmvercmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let mut one = a.as_bytes();
    let mut two = b.as_bytes();

    loop {
        one = skip_separators(one);
        two = skip_separators(two);

        // Tilde sorts lower than everything else, including the end of the string.
        match (one.first(), two.first()) {
            (Some(b'~'), Some(b'~')) => {
                one = &one[1..];
                two = &two[1..];
                continue;
            }
            (Some(b'~'), _) => return Ordering::Less,
            (_, Some(b'~')) => return Ordering::Greater,
            _ => {}
        }

        // Caret is like tilde, except that the end of the string sorts lower.
        match (one.first(), two.first()) {
            (Some(b'^'), Some(b'^')) => {
                one = &one[1..];
                two = &two[1..];
                continue;
            }
            (None, Some(b'^')) => return Ordering::Less,
            (Some(b'^'), None) => return Ordering::Greater,
            (_, Some(b'^')) => return Ordering::Greater,
            (Some(b'^'), _) => return Ordering::Less,
            _ => {}
        }

        if one.is_empty() || two.is_empty() {
            break;
        }

        let is_numeric = one[0].is_ascii_digit();
        let (segment_one, rest_one) = split_segment(one, is_numeric);
        let (segment_two, rest_two) = split_segment(two, is_numeric);

        // The first segment is never empty because we just checked its leading byte. The second
        // one is empty if the segment types differ, numeric segments are newer than alpha ones.
        if segment_two.is_empty() {
            return if is_numeric {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }

        let ordering = if is_numeric {
            compare_numeric(segment_one, segment_two)
        } else {
            segment_one.cmp(segment_two)
        };
        if ordering != Ordering::Equal {
            return ordering;
        }

        one = rest_one;
        two = rest_two;
    }

    // Whichever string still has characters left is the newer one.
    match (one.is_empty(), two.is_empty()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        _ => Ordering::Greater,
    }
}

fn skip_separators(s: &[u8]) -> &[u8] {
    let start = s
        .iter()
        .position(|&c| c.is_ascii_alphanumeric() || c == b'~' || c == b'^')
        .unwrap_or(s.len());
    &s[start..]
}

fn split_segment(s: &[u8], numeric: bool) -> (&[u8], &[u8]) {
    let end = s
        .iter()
        .position(|c| {
            if numeric {
                !c.is_ascii_digit()
            } else {
                !c.is_ascii_alphabetic()
            }
        })
        .unwrap_or(s.len());
    s.split_at(end)
}

fn compare_numeric(a: &[u8], b: &[u8]) -> Ordering {
    let a = strip_leading_zeros(a);
    let b = strip_leading_zeros(b);
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn strip_leading_zeros(s: &[u8]) -> &[u8] {
    let start = s.iter().position(|&c| c != b'0').unwrap_or(s.len());
    &s[start..]
}

#[cfg(test)]
mod test {
    use super::rpmvercmp;
    use rstest::rstest;
    use std::cmp::Ordering;

    #[rstest]
    #[case("1.0", "1.0", Ordering::Equal)]
    #[case("1.0", "2.0", Ordering::Less)]
    #[case("2.0.1", "2.0", Ordering::Greater)]
    #[case("5.5p1", "5.5p2", Ordering::Less)]
    #[case("5.5p10", "5.5p1", Ordering::Greater)]
    #[case("10xyz", "10.1xyz", Ordering::Less)]
    #[case("xyz10", "xyz10.1", Ordering::Less)]
    #[case("xyz.4", "xyz.4", Ordering::Equal)]
    #[case("xyz.4", "8", Ordering::Less)]
    #[case("8", "xyz.4", Ordering::Greater)]
    #[case("1b", "1.0", Ordering::Less)]
    #[case("010", "10", Ordering::Equal)]
    #[case("1.0010", "1.9", Ordering::Greater)]
    #[case("1.05", "1.5", Ordering::Equal)]
    #[case("2a", "2.0", Ordering::Less)]
    #[case("a", "b", Ordering::Less)]
    #[case("1.0a", "1.0", Ordering::Greater)]
    #[case("1_0", "1.0", Ordering::Equal)]
    #[case("1.0~rc1", "1.0", Ordering::Less)]
    #[case("1.0~rc1", "1.0~rc2", Ordering::Less)]
    #[case("1.0~rc1~git123", "1.0~rc1", Ordering::Less)]
    #[case("1.0^", "1.0", Ordering::Greater)]
    #[case("1.0^git1", "1.0", Ordering::Greater)]
    #[case("1.0^git1", "1.01", Ordering::Less)]
    #[case("1.0^20160101", "1.0.1", Ordering::Less)]
    #[case("1.0^20160101^git1", "1.0^20160101", Ordering::Greater)]
    #[case("1.0~rc1^git1", "1.0~rc1", Ordering::Greater)]
    #[case("1.0^git1~pre", "1.0^git1", Ordering::Less)]
    fn test_rpmvercmp(#[case] a: &str, #[case] b: &str, #[case] expected: Ordering) {
        assert_eq!(rpmvercmp(a, b), expected, "{a} vs {b}");
        assert_eq!(rpmvercmp(b, a), expected.reverse(), "{b} vs {a}");
    }
}
