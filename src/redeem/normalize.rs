use std::collections::HashSet;

/// Number of alphanumeric characters in a well-formed redemption code.
const CODE_LENGTH: usize = 12;

/// Characters per hyphen-separated group.
const GROUP_LENGTH: usize = 4;

/// Canonicalizes one line of hand-typed code text.
///
/// Every character that is not an ASCII letter or digit is dropped and the
/// remainder uppercased. Exactly 12 remaining characters are regrouped as
/// `XXXX-XXXX-XXXX`; any other length is returned as-is.
///
/// Distractor characters pasted into the middle of a code are recovered:
/// `2WGX干3783扰BQRJ` becomes `2WGX-3783-BQRJ`.
pub fn normalize_code(raw: &str) -> String {
    let chars: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if chars.len() != CODE_LENGTH {
        return chars;
    }

    chars
        .as_bytes()
        .chunks(GROUP_LENGTH)
        .map(|group| String::from_utf8_lossy(group))
        .collect::<Vec<_>>()
        .join("-")
}

/// Turns raw input lines into the ordered list of codes for one batch.
///
/// Lines are normalized, empty results discarded, and duplicates removed
/// keeping the first occurrence.
pub fn parse_code_lines<I, S>(lines: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    lines
        .into_iter()
        .map(|line| normalize_code(line.as_ref()))
        .filter(|code| !code.is_empty())
        .filter(|code| seen.insert(code.clone()))
        .collect()
}
