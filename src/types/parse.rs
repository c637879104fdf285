//! Value grammars used by the option codec.
//!
//! Durations follow the Go duration syntax (`300ms`, `1.5h`, `2h45m`) and a
//! bare integer is read as nanoseconds. Timestamps accept RFC 3339, a few
//! naive UTC layouts, or Unix seconds. All parsers fail loudly; nothing is
//! ever coerced to zero.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

const NANOS_PER_SEC: u128 = 1_000_000_000;

const NAIVE_LAYOUTS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
];

/// Parses a non-negative duration.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use periodic_tasks::types::parse::parse_duration;
///
/// assert_eq!(parse_duration("30s"), Ok(Duration::from_secs(30)));
/// assert_eq!(parse_duration("1h30m"), Ok(Duration::from_secs(5400)));
/// assert_eq!(parse_duration("1.5s"), Ok(Duration::from_millis(1500)));
/// assert_eq!(parse_duration("250"), Ok(Duration::from_nanos(250)));
/// assert!(parse_duration("soon").is_err());
/// assert!(parse_duration("-5s").is_err());
/// ```
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err("empty duration".to_string());
    }
    if trimmed.starts_with('-') {
        return Err("negative durations are not allowed".to_string());
    }
    let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if unsigned == "0" {
        return Ok(Duration::ZERO);
    }

    // A value without any unit letter is a nanosecond count.
    let has_unit = unsigned
        .chars()
        .any(|c| matches!(c, 'n' | 's' | 'u' | 'µ' | 'μ' | 'm' | 'h'));
    let normalized = if has_unit {
        unsigned.to_string()
    } else {
        format!("{unsigned}ns")
    };

    let mut rest = normalized.as_str();
    let mut total: u128 = 0;
    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let number = &rest[..number_end];
        if number.is_empty() || number == "." {
            return Err(format!("expected a number before {rest:?}"));
        }
        rest = &rest[number_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = &rest[..unit_end];
        rest = &rest[unit_end..];

        let scale = unit_scale(unit)?;
        let component = scaled_component(number, scale)?;
        total = total
            .checked_add(component)
            .ok_or_else(|| "duration overflows".to_string())?;
    }

    let secs = u64::try_from(total / NANOS_PER_SEC).map_err(|_| "duration overflows".to_string())?;
    // Remainder is always below one second.
    let nanos = (total % NANOS_PER_SEC) as u32;
    Ok(Duration::new(secs, nanos))
}

fn unit_scale(unit: &str) -> Result<u128, String> {
    match unit {
        "ns" => Ok(1),
        "us" | "µs" | "μs" => Ok(1_000),
        "ms" => Ok(1_000_000),
        "s" => Ok(NANOS_PER_SEC),
        "m" => Ok(60 * NANOS_PER_SEC),
        "h" => Ok(3_600 * NANOS_PER_SEC),
        "" => Err("missing unit".to_string()),
        other => Err(format!("unknown unit {other:?}")),
    }
}

fn scaled_component(number: &str, scale: u128) -> Result<u128, String> {
    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if fraction.contains('.') {
        return Err(format!("malformed number {number:?}"));
    }

    let whole: u128 = if whole.is_empty() {
        0
    } else {
        whole
            .parse()
            .map_err(|_| format!("number {whole:?} is out of range"))?
    };
    let mut value = whole
        .checked_mul(scale)
        .ok_or_else(|| "duration overflows".to_string())?;

    if !fraction.is_empty() {
        // Digits past nanosecond precision cannot change the result.
        let digits = &fraction[..fraction.len().min(18)];
        let numerator: u128 = digits
            .parse()
            .map_err(|_| format!("malformed fraction {fraction:?}"))?;
        let denominator = 10u128.pow(digits.len() as u32);
        value = value
            .checked_add(numerator * scale / denominator)
            .ok_or_else(|| "duration overflows".to_string())?;
    }
    Ok(value)
}

/// Renders a duration in the same grammar [`parse_duration`] accepts,
/// using the largest unit that represents it exactly.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use periodic_tasks::types::parse::format_duration;
///
/// assert_eq!(format_duration(Duration::from_secs(30)), "30s");
/// assert_eq!(format_duration(Duration::from_secs(7200)), "2h");
/// assert_eq!(format_duration(Duration::from_millis(1500)), "1500ms");
/// assert_eq!(format_duration(Duration::ZERO), "0s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let nanos = duration.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }
    for (unit, scale) in [
        ("h", 3_600 * NANOS_PER_SEC),
        ("m", 60 * NANOS_PER_SEC),
        ("s", NANOS_PER_SEC),
        ("ms", 1_000_000),
        ("us", 1_000),
    ] {
        if nanos % scale == 0 {
            return format!("{}{unit}", nanos / scale);
        }
    }
    format!("{nanos}ns")
}

/// Parses an absolute instant, normalised to UTC.
///
/// # Examples
///
/// ```
/// use periodic_tasks::types::parse::parse_timestamp;
///
/// let at = parse_timestamp("2026-03-01T08:00:00+02:00").unwrap();
/// assert_eq!(at.to_rfc3339(), "2026-03-01T06:00:00+00:00");
///
/// assert!(parse_timestamp("2026-03-01").is_ok());
/// assert!(parse_timestamp("1767225600").is_ok());
/// assert!(parse_timestamp("next tuesday").is_err());
/// ```
pub fn parse_timestamp(input: &str) -> Result<DateTime<Utc>, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err("empty timestamp".to_string());
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }
    for layout in NAIVE_LAYOUTS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, layout) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }
    if let Ok(secs) = trimmed.parse::<i64>() {
        return DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| format!("unix timestamp {secs} is out of range"));
    }

    Err("not a recognised timestamp".to_string())
}

/// Parses a retry ceiling.
///
/// # Examples
///
/// ```
/// use periodic_tasks::types::parse::parse_retry_count;
///
/// assert_eq!(parse_retry_count(" 5 "), Ok(5));
/// assert!(parse_retry_count("five").is_err());
/// assert!(parse_retry_count("-1").is_err());
/// ```
pub fn parse_retry_count(input: &str) -> Result<u32, String> {
    let trimmed = input.trim();
    trimmed
        .parse::<u32>()
        .map_err(|e| format!("not a non-negative integer: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn duration_units() {
        assert_eq!(parse_duration("10ns"), Ok(Duration::from_nanos(10)));
        assert_eq!(parse_duration("10us"), Ok(Duration::from_micros(10)));
        assert_eq!(parse_duration("10µs"), Ok(Duration::from_micros(10)));
        assert_eq!(parse_duration("10ms"), Ok(Duration::from_millis(10)));
        assert_eq!(parse_duration("10s"), Ok(Duration::from_secs(10)));
        assert_eq!(parse_duration("10m"), Ok(Duration::from_secs(600)));
        assert_eq!(parse_duration("10h"), Ok(Duration::from_secs(36_000)));
    }

    #[test]
    fn duration_compound_and_fractional() {
        assert_eq!(parse_duration("2h45m"), Ok(Duration::from_secs(9_900)));
        assert_eq!(parse_duration("1m30.5s"), Ok(Duration::from_millis(90_500)));
        assert_eq!(parse_duration(".5s"), Ok(Duration::from_millis(500)));
        assert_eq!(parse_duration("+3s"), Ok(Duration::from_secs(3)));
        assert_eq!(parse_duration(" 3s "), Ok(Duration::from_secs(3)));
    }

    #[test]
    fn duration_zero_forms() {
        assert_eq!(parse_duration("0"), Ok(Duration::ZERO));
        assert_eq!(parse_duration("0s"), Ok(Duration::ZERO));
    }

    #[test]
    fn duration_bare_integer_is_nanoseconds() {
        assert_eq!(parse_duration("1000000000"), Ok(Duration::from_secs(1)));
    }

    #[test]
    fn duration_rejects_malformed_values() {
        for bad in ["", "   ", "s", "abc", "10x", "1..5s", "-1s", "1e5", "."] {
            assert!(parse_duration(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn duration_rejects_overflow() {
        assert!(parse_duration("99999999999999999999999999999999999999999h").is_err());
    }

    #[test]
    fn duration_rejects_fraction_that_overflows_whole_part() {
        // The whole part scales to just under u128::MAX; the fraction tips it over.
        let err = parse_duration("340282366920938463463374607431768211.999us").unwrap_err();
        assert!(err.contains("overflows"), "got: {err}");
    }

    #[test]
    fn format_then_parse_is_stable() {
        for d in [
            Duration::from_secs(30),
            Duration::from_millis(1_250),
            Duration::from_nanos(7),
            Duration::from_secs(86_400),
        ] {
            assert_eq!(parse_duration(&format_duration(d)), Ok(d));
        }
    }

    #[test]
    fn timestamp_layouts() {
        let expected = Utc.with_ymd_and_hms(2026, 1, 2, 15, 4, 5).unwrap();
        assert_eq!(parse_timestamp("2026-01-02T15:04:05Z"), Ok(expected));
        assert_eq!(parse_timestamp("2026-01-02T15:04:05"), Ok(expected));
        assert_eq!(parse_timestamp("2026-01-02 15:04:05"), Ok(expected));
        assert_eq!(
            parse_timestamp(&expected.timestamp().to_string()),
            Ok(expected)
        );
        assert_eq!(
            parse_timestamp("2026-01-02"),
            Ok(Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn timestamp_rejects_garbage() {
        for bad in ["", "yesterday", "2026-13-01", "2026-01-02T25:00:00Z"] {
            assert!(parse_timestamp(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn retry_count() {
        assert_eq!(parse_retry_count("0"), Ok(0));
        assert_eq!(parse_retry_count("25"), Ok(25));
        assert!(parse_retry_count("").is_err());
        assert!(parse_retry_count("2.5").is_err());
    }
}
