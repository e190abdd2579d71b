//! Small shared helpers: environment lookups and duration literals.

use std::time::Duration;

/// Read an environment variable, falling back to a default.
pub fn env_or(key: &str, fallback: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| fallback.to_string())
}

/// Parse a duration literal such as `90s`, `30m`, `1h` or `7d`.
///
/// The accepted grammar is a non-zero integer followed by a single unit
/// suffix. Anything else (including negative values, zero, or a missing
/// unit) is rejected.
pub fn parse_duration(input: &str) -> Option<Duration> {
    let input = input.trim();
    let split = input.find(|c: char| !c.is_ascii_digit())?;
    let (digits, unit) = input.split_at(split);

    let amount: u64 = digits.parse().ok()?;
    if amount == 0 {
        return None;
    }

    let secs = match unit {
        "s" => amount,
        "m" => amount.checked_mul(60)?,
        "h" => amount.checked_mul(60 * 60)?,
        "d" => amount.checked_mul(24 * 60 * 60)?,
        _ => return None,
    };

    Some(Duration::from_secs(secs))
}
