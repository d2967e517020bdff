//! Digit fingerprints and OTP extraction.
//!
//! All functions here are pure; the index builder, the correlator and the
//! reply monitor agree on what a "number" is by sharing them.

use std::sync::LazyLock;

use regex::Regex;

/// Number of trailing digits that make up a fingerprint.
pub const FINGERPRINT_LEN: usize = 4;

/// Minimum digits a candidate needs before it is treated as a number.
pub const MIN_CANDIDATE_DIGITS: usize = 6;

static CANDIDATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\d\s\-()+.]{4,}").expect("static regex"));
static OTP_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{3})\s*-\s*(\d{3})").expect("static regex"));
static OTP_PLAIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{6})\b").expect("static regex"));

/// The index key for `value`: its last four digits, or all of its digits
/// left-padded with zeros when there are fewer than four.
///
/// ```
/// use courier_client::pattern::fingerprint_of;
/// assert_eq!(fingerprint_of("+1 (555) 123-4567"), "4567");
/// assert_eq!(fingerprint_of("12"), "0012");
/// ```
pub fn fingerprint_of(value: &str) -> String {
    let digits = only_digits(value);
    if digits.len() >= FINGERPRINT_LEN {
        digits[digits.len() - FINGERPRINT_LEN..].to_owned()
    } else {
        format!("{digits:0>width$}", width = FINGERPRINT_LEN)
    }
}

/// Pulls a six-digit code out of `text`.
///
/// The split form `123-456` wins over a bare `123456` when both occur.
pub fn extract_otp(text: &str) -> Option<String> {
    if let Some(c) = OTP_SPLIT.captures(text) {
        return Some(format!("{}{}", &c[1], &c[2]));
    }
    OTP_PLAIN.captures(text).map(|c| c[1].to_owned())
}

/// Every phone-number-like run in `text`, reduced to its digits.
///
/// A run is a stretch of digits, whitespace and `-()+.` at least four
/// characters long; it only counts when it holds six digits or more.
pub fn digit_candidates(text: &str) -> Vec<String> {
    CANDIDATE
        .find_iter(text)
        .map(|m| only_digits(m.as_str()))
        .filter(|d| d.len() >= MIN_CANDIDATE_DIGITS)
        .collect()
}

fn only_digits(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}
