//! Helpers for classifying and rendering raw cell text.

use crate::Cell;

/// Spellings that CSV exports use for a missing value.
const MISSING_MARKERS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan",
    "1.#IND", "1.#QNAN", "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a",
    "nan", "null",
];

pub(crate) fn is_missing_marker(raw: &str) -> bool {
    MISSING_MARKERS.contains(&raw)
}

/// Classifies one CSV field into a [`Cell`].
///
/// Only plain decimal literals become numbers. Anything a number parse would
/// damage (leading `+`, leading zeros, digit runs past `i64`) stays text.
pub(crate) fn classify(raw: &str) -> Cell {
    let trimmed = raw.trim();
    if is_missing_marker(trimmed) {
        return Cell::Empty;
    }
    match split_decimal(trimmed) {
        Some((int, None)) => match int.parse::<i64>() {
            Ok(v) => Cell::Int(v),
            Err(_) => Cell::Text(trimmed.to_owned()),
        },
        Some((_, Some(_))) => match trimmed.parse::<f64>() {
            Ok(v) if v.is_finite() => Cell::Float(v),
            _ => Cell::Text(trimmed.to_owned()),
        },
        None => Cell::Text(trimmed.to_owned()),
    }
}

pub(crate) fn render_float(v: f64) -> Option<String> {
    if v.is_nan() {
        return None;
    }
    // `Display` for f64 already omits a zero fraction (5.0 → "5").
    if v == 0.0 {
        return Some("0".to_owned());
    }
    Some(format!("{v}"))
}

/// Splits `-?<int>[.<frac>]` into its integer and fraction parts.
///
/// The integer part must not carry a superfluous leading zero; the fraction
/// may be empty (`"5."`).
fn split_decimal(text: &str) -> Option<(&str, Option<&str>)> {
    let (int, frac) = match text.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (text, None),
    };
    let digits = int.strip_prefix('-').unwrap_or(int);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    if let Some(f) = frac {
        if !f.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
    }
    Some((int, frac))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_numbers() {
        assert_eq!(classify("5"), Cell::Int(5));
        assert_eq!(classify(" 5.0 "), Cell::Float(5.0));
        assert_eq!(classify("-2.25"), Cell::Float(-2.25));
        assert_eq!(classify("nan"), Cell::Empty);
        assert_eq!(classify("   "), Cell::Empty);
    }

    #[test]
    fn classify_keeps_lossy_numbers_as_text() {
        assert_eq!(classify("+15551234"), Cell::Text("+15551234".into()));
        assert_eq!(classify("0012"), Cell::Text("0012".into()));
        assert_eq!(classify("555-1234"), Cell::Text("555-1234".into()));
        let long = "123456789012345678901234";
        assert_eq!(classify(long), Cell::Text(long.into()));
    }
}
