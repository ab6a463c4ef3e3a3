//! Duration strings as accepted by the `dur` query parameter.
//!
//! Grammar: an optional sign followed by one or more `<decimal><unit>` terms,
//! e.g. `"45m"`, `"1h30m"`, `"2.5d"`. Units are `ns`, `us`/`µs`, `ms`, `s`,
//! `m`, `h`, `d` (24h) and `w` (7d). A bare `"0"` is also accepted.

use crate::Error;
use chrono::Duration;

const NANOS_PER_SECOND: i128 = 1_000_000_000;

/// Longest fractional part that is still honoured; extra digits are ignored.
const MAX_FRACTION_DIGITS: usize = 18;

fn unit_nanos(unit: &str) -> Option<i128> {
    let nanos = match unit {
        "ns" => 1,
        "us" | "µs" | "μs" => 1_000,
        "ms" => 1_000_000,
        "s" => NANOS_PER_SECOND,
        "m" => 60 * NANOS_PER_SECOND,
        "h" => 3_600 * NANOS_PER_SECOND,
        "d" => 86_400 * NANOS_PER_SECOND,
        "w" => 7 * 86_400 * NANOS_PER_SECOND,
        _ => return None,
    };
    Some(nanos)
}

/// Scale a decimal literal (`"12"`, `"1.5"`, `".5"`) by `unit` nanoseconds.
fn scale_term(number: &str, unit: i128) -> Option<i128> {
    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !fraction.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let whole: i128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut nanos = whole.checked_mul(unit)?;

    let fraction = &fraction[..fraction.len().min(MAX_FRACTION_DIGITS)];
    if !fraction.is_empty() {
        let digits: i128 = fraction.parse().ok()?;
        let divisor = 10_i128.checked_pow(fraction.len() as u32)?;
        nanos = nanos.checked_add(digits.checked_mul(unit)? / divisor)?;
    }
    Some(nanos)
}

/// Parse a duration string into a signed `chrono::Duration`.
pub fn parse_duration(raw: &str) -> Result<Duration, Error> {
    let invalid = || Error::InvalidDuration(raw.to_string());

    let mut rest = raw.trim();
    let negative = if let Some(stripped) = rest.strip_prefix('-') {
        rest = stripped;
        true
    } else {
        rest = rest.strip_prefix('+').unwrap_or(rest);
        false
    };

    if rest == "0" {
        return Ok(Duration::zero());
    }
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total: i128 = 0;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_len);
        if number.is_empty() {
            return Err(invalid());
        }

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);
        let unit = unit_nanos(unit).ok_or_else(invalid)?;

        let term = scale_term(number, unit).ok_or_else(invalid)?;
        total = total.checked_add(term).ok_or_else(invalid)?;
        rest = tail;
    }

    let nanos = i64::try_from(total).map_err(|_| invalid())?;
    Ok(Duration::nanoseconds(if negative { -nanos } else { nanos }))
}
