//! Byte budgets written as `256MB`, `64 KB` or plain byte counts.

use thiserror::Error;

const KIB: usize = 1024;
const MIB: usize = 1024 * KIB;
const GIB: usize = 1024 * MIB;

/// A memory budget that is not a whole number with a known unit.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid size '{input}': use a byte count or a KB, MB or GB amount")]
pub struct SizeParseError {
    input: String,
}

/// Parse a byte budget.
///
/// Bare numbers are bytes; `K`/`KB`, `M`/`MB` and `G`/`GB` are binary
/// multiples. Case and whitespace between number and unit are ignored.
///
/// ```
/// use geoloop::config::parse_size;
///
/// assert_eq!(parse_size("64").unwrap(), 64);
/// assert_eq!(parse_size("16 KB").unwrap(), 16 * 1024);
/// assert_eq!(parse_size("256mb").unwrap(), 256 * 1024 * 1024);
/// ```
pub fn parse_size(s: &str) -> Result<usize, SizeParseError> {
    let error = || SizeParseError {
        input: s.to_string(),
    };

    let upper = s.trim().to_ascii_uppercase();
    let amount = upper.trim_end_matches(|c: char| c.is_ascii_alphabetic());
    let unit = match &upper[amount.len()..] {
        "" | "B" => 1,
        "K" | "KB" => KIB,
        "M" | "MB" => MIB,
        "G" | "GB" => GIB,
        _ => return Err(error()),
    };

    amount
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_mul(unit))
        .ok_or_else(error)
}

/// Render a byte budget in the largest unit that divides it exactly.
///
/// ```
/// use geoloop::config::format_size;
///
/// assert_eq!(format_size(256 * 1024 * 1024), "256MB");
/// assert_eq!(format_size(1000), "1000");
/// ```
pub fn format_size(bytes: usize) -> String {
    [(GIB, "GB"), (MIB, "MB"), (KIB, "KB")]
        .iter()
        .find(|(unit, _)| bytes >= *unit && bytes % unit == 0)
        .map(|(unit, suffix)| format!("{}{}", bytes / unit, suffix))
        .unwrap_or_else(|| bytes.to_string())
}
