//! Time utilities: local wall-clock "now" and lenient timestamp parsing.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;

/// Current wall-clock time in an IANA tz like "America/Chicago".
pub fn local_now(tz: &str) -> Result<NaiveDateTime> {
    local_time_of(Utc::now(), tz)
}

/// Convert a UTC instant to naive local time in `tz`.
pub fn local_time_of(instant: DateTime<Utc>, tz: &str) -> Result<NaiveDateTime> {
    let tz: Tz = tz
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid timezone: {tz}"))?;
    Ok(instant.with_timezone(&tz).naive_local())
}

/// Parse RFC 3339, naive ISO-8601 (`T` or space separated, optional
/// fraction) or a bare date (midnight).
///
/// Offsets are dropped: the wall-clock time as written is kept.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.naive_local());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(ndt);
        }
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| anyhow::anyhow!("invalid timestamp '{raw}': {e}"))?;
    Ok(date.and_time(NaiveTime::MIN))
}

/// Storage format for timestamps.
pub fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_chicago_wall_clock() {
        // Feb is CST (UTC-6)
        let utc = Utc.with_ymd_and_hms(2026, 2, 21, 5, 59, 0).unwrap();
        let local = local_time_of(utc, "America/Chicago").unwrap();
        assert_eq!(local.to_string(), "2026-02-20 23:59:00");
        assert!(local_time_of(utc, "Mars/Olympus").is_err());
    }

    #[test]
    fn test_parse_timestamp_variants() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 8)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2024-01-08T14:30:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-01-08 14:30:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-01-08T14:30:00-06:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-01-08T14:30:00.000").unwrap(), expected);
        assert_eq!(
            parse_timestamp("2024-01-08").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 8).unwrap().and_time(NaiveTime::MIN)
        );
        assert!(parse_timestamp("last tuesday").is_err());
    }

    #[test]
    fn test_format_round_trips() {
        let ts = NaiveDate::from_ymd_opt(2024, 5, 2)
            .unwrap()
            .and_hms_milli_opt(7, 5, 9, 250)
            .unwrap();
        assert_eq!(parse_timestamp(&format_timestamp(ts)).unwrap(), ts);
    }
}
