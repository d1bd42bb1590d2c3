/// Number of digits in a captcha.
pub const CAPTCHA_DIGITS: usize = 4;

/// Extracts the captcha digits from raw recognized text.
///
/// Whitespace and any other non-digit characters are dropped. Exactly 4
/// digits are returned as-is, longer runs are truncated to the first 4, and
/// fewer than 4 digits is a failed recognition.
///
/// Truncation favours submitting a candidate: a wrong guess is rejected by
/// the service and retried next round.
pub fn extract_captcha_digits(text: &str) -> Option<String> {
    let digits: String = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .filter(|c| c.is_ascii_digit())
        .collect();

    if digits.len() < CAPTCHA_DIGITS {
        return None;
    }

    Some(digits[..CAPTCHA_DIGITS].to_string())
}
