//! Parsing of compact difficulty strings such as `"3.49G"` or `"250k"`.

use serde_json::Value;

/// Magnitude letters in the order they are searched for.
const SCALES: &[(char, f64)] = &[('G', 1e9), ('M', 1e6), ('K', 1e3)];

/// Parse a device-reported difficulty into a plain number.
///
/// The leading run of digits and dots is the numeral; the scale comes from
/// the first of `G`, `M`, `K` (case-insensitive) found anywhere in the
/// string. Non-strings, strings without a leading numeral and malformed
/// numerals all yield `None`.
///
/// A result of `0.0` is returned as-is; callers omit the field in that case.
pub fn parse_difficulty(value: &Value) -> Option<f64> {
    parse_difficulty_str(value.as_str()?)
}

/// String form of [`parse_difficulty`].
pub fn parse_difficulty_str(s: &str) -> Option<f64> {
    let normalized = s.trim().to_uppercase();

    let end = normalized
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(normalized.len());
    if end == 0 {
        return None;
    }

    let base: f64 = normalized[..end].parse().ok()?;

    let scale = SCALES
        .iter()
        .find(|(letter, _)| normalized.contains(*letter))
        .map_or(1.0, |(_, scale)| *scale);

    Some(base * scale)
}
