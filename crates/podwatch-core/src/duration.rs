//! Duration strings as they appear in podwatch.toml.

use std::time::Duration;

/// Unit suffixes, longest first so "ms" wins over "s" and "m".
const UNITS: [(&str, u64); 3] = [("ms", 1), ("s", 1_000), ("m", 60_000)];

/// Parse "500ms", "5s" or "2m" into a [`Duration`].
///
/// A bare number is read as seconds. Returns `None` for unknown units,
/// negative or fractional values, and values that overflow.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let (digits, millis_per_unit) = UNITS
        .iter()
        .find_map(|(suffix, factor)| s.strip_suffix(suffix).map(|rest| (rest, *factor)))
        .unwrap_or((s, 1_000));
    let value = digits.parse::<u64>().ok()?;
    value.checked_mul(millis_per_unit).map(Duration::from_millis)
}
