//! The output comparator (spec §4.G, resolved per the pinned token-line
//! policy rather than jd4's native `_compare` extension): trailing
//! per-line whitespace is ignored, trailing blank lines at end-of-output are
//! ignored, and internal whitespace is significant.

/// Compares two byte streams under the judge's output policy.
pub fn outputs_match(actual: &[u8], expected: &[u8]) -> bool {
    let mut actual_lines = significant_lines(actual);
    let mut expected_lines = significant_lines(expected);
    loop {
        match (actual_lines.next(), expected_lines.next()) {
            (Some(a), Some(e)) => {
                if trim_trailing_whitespace(a) != trim_trailing_whitespace(e) {
                    return false;
                }
            }
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// Splits on `\n` and drops trailing empty lines (i.e. trailing blank lines
/// at EOF), so `"a\nb\n"` and `"a\nb"` and `"a\nb\n\n\n"` all yield the same
/// two lines.
fn significant_lines(bytes: &[u8]) -> impl Iterator<Item = &[u8]> {
    let mut lines: Vec<&[u8]> = bytes.split(|&b| b == b'\n').collect();
    while matches!(lines.last(), Some(line) if line.is_empty()) {
        lines.pop();
    }
    lines.into_iter()
}

fn trim_trailing_whitespace(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|&b| !b.is_ascii_whitespace())
        .map(|i| i + 1)
        .unwrap_or(0);
    &line[..end]
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn identical_outputs_match() {
        assert!(outputs_match(b"3\n", b"3\n"));
    }

    #[test]
    fn trailing_blank_lines_are_ignored() {
        assert!(outputs_match(b"3\n", b"3\n\n\n"));
        assert!(outputs_match(b"3", b"3\n"));
    }

    #[test]
    fn trailing_per_line_whitespace_is_ignored() {
        assert!(outputs_match(b"3 \t\n4\n", b"3\n4\n"));
    }

    #[test]
    fn internal_whitespace_is_significant() {
        assert!(!outputs_match(b"3  4\n", b"3 4\n"));
    }

    #[test]
    fn differing_content_does_not_match() {
        assert!(!outputs_match(b"3\n", b"4\n"));
    }

    #[test]
    fn differing_line_counts_do_not_match() {
        assert!(!outputs_match(b"3\n4\n", b"3\n"));
    }
}
