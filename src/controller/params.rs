//! Typed query parameter decoding
//!
//! Each decoder turns the raw query string value (or its absence) into a
//! typed value, or fails with `InvalidParameter`. Absent values decode to an
//! explicit sentinel (`Unbounded`, `LogLevel::All`, `Unlimited`).

use crate::common::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use std::fmt;
use std::str::FromStr;

/// Literal accepted in place of a date to mean "no bound"
pub const DEFAULT_BOUND: &str = "DEFAULT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeBound {
    Unbounded,
    At(DateTime<Utc>),
}

impl TimeBound {
    /// RFC 3339 form used when forwarding to nodes
    pub fn to_query_value(&self) -> Option<String> {
        match self {
            TimeBound::Unbounded => None,
            TimeBound::At(t) => Some(t.to_rfc3339_opts(SecondsFormat::Millis, true)),
        }
    }
}

/// Parse a date parameter.
///
/// Accepted forms: `yyyy-MM-dd`, `yyyy-MM-ddTHH:mm`, and
/// `yyyy-MM-ddTHH:mm:ss[.SSS][offset]` where the offset is `Z`, `+HHMM` or
/// `+HH:MM`. Missing time fields are zero, a missing offset is UTC.
pub fn parse_time_bound(name: &str, raw: Option<&str>) -> Result<TimeBound> {
    match raw.map(str::trim) {
        None | Some("") => Ok(TimeBound::Unbounded),
        Some(s) if s.eq_ignore_ascii_case(DEFAULT_BOUND) => Ok(TimeBound::Unbounded),
        Some(s) => parse_instant(s).map(TimeBound::At).ok_or_else(|| {
            Error::InvalidParameter(format!("invalid date for {}: '{}'", name, s))
        }),
    }
}

/// Fixed-width fields every accepted form starts with (`d` is a digit)
const FIELD_LAYOUT: &[u8] = b"dddd-dd-ddTdd:dd:dd";

/// Offset layouts tried after the seconds field
const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%dT%H:%M:%S%.f%:z"];

/// chrono accepts single-digit fields; dates here are always zero-padded
fn has_fixed_width_fields(s: &str) -> bool {
    let b = s.as_bytes();
    (b.len() == 10 || b.len() == 16 || b.len() >= FIELD_LAYOUT.len())
        && b.iter().zip(FIELD_LAYOUT).all(|(c, l)| match l {
            b'd' => c.is_ascii_digit(),
            l => c == l,
        })
}

fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.to_ascii_uppercase();
    if !has_fixed_width_fields(&s) {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(&s, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }
    if let Ok(t) = NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M") {
        return Some(Utc.from_utc_datetime(&t));
    }

    if s.len() < FIELD_LAYOUT.len() {
        return None;
    }

    // Milliseconds at most
    let tail = &s[FIELD_LAYOUT.len()..];
    if let Some(frac) = tail.strip_prefix('.') {
        if frac.bytes().take_while(u8::is_ascii_digit).count() > 3 {
            return None;
        }
    }

    let with_offset = match s.strip_suffix('Z') {
        Some(local) => format!("{}+0000", local),
        None if tail.contains(['+', '-']) => s.clone(),
        None => format!("{}+0000", s),
    };
    OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(&with_offset, fmt).ok())
        .map(|t| t.with_timezone(&Utc))
}

/// Inclusive time window; either end may be unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub from: TimeBound,
    pub to: TimeBound,
}

impl TimeRange {
    pub const UNBOUNDED: TimeRange = TimeRange {
        from: TimeBound::Unbounded,
        to: TimeBound::Unbounded,
    };
}

pub fn parse_time_range(from: Option<&str>, to: Option<&str>) -> Result<TimeRange> {
    let range = TimeRange {
        from: parse_time_bound("from", from)?,
        to: parse_time_bound("to", to)?,
    };
    if let (TimeBound::At(f), TimeBound::At(t)) = (range.from, range.to) {
        if f > t {
            return Err(Error::InvalidParameter(format!(
                "'from' ({}) is after 'to' ({})",
                f.to_rfc3339(),
                t.to_rfc3339()
            )));
        }
    }
    Ok(range)
}

/// Log severity filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Off,
    Fatal,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
    All,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Off => "OFF",
            LogLevel::Fatal => "FATAL",
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
            LogLevel::All => "ALL",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OFF" => Ok(LogLevel::Off),
            "FATAL" => Ok(LogLevel::Fatal),
            "ERROR" => Ok(LogLevel::Error),
            "WARN" => Ok(LogLevel::Warn),
            "INFO" => Ok(LogLevel::Info),
            "DEBUG" => Ok(LogLevel::Debug),
            "TRACE" => Ok(LogLevel::Trace),
            "ALL" => Ok(LogLevel::All),
            _ => Err(Error::InvalidParameter(format!("invalid log level: '{}'", s))),
        }
    }
}

/// Parse the `level` parameter; absent means `All`
pub fn parse_level(raw: Option<&str>) -> Result<LogLevel> {
    match raw {
        None => Ok(LogLevel::All),
        Some(s) => s.parse(),
    }
}

/// Cap on the number of log entries returned per node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryLimit {
    Unlimited,
    AtMost(u32),
}

/// Parse the `n` parameter; must be a positive integer when present
pub fn parse_limit(raw: Option<&str>) -> Result<EntryLimit> {
    match raw.map(str::trim) {
        None => Ok(EntryLimit::Unlimited),
        Some(s) => match s.parse::<u32>() {
            Ok(n) if n > 0 => Ok(EntryLimit::AtMost(n)),
            _ => Err(Error::InvalidParameter(format!(
                "n must be a positive integer, got '{}'",
                s
            ))),
        },
    }
}

/// Decoded parameters of a log read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogQuery {
    pub range: TimeRange,
    pub level: LogLevel,
    pub limit: EntryLimit,
}

impl LogQuery {
    /// Query pairs to forward; sentinels are left out
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(from) = self.range.from.to_query_value() {
            pairs.push(("from".to_string(), from));
        }
        if let Some(to) = self.range.to.to_query_value() {
            pairs.push(("to".to_string(), to));
        }
        if self.level != LogLevel::All {
            pairs.push(("level".to_string(), self.level.to_string()));
        }
        if let EntryLimit::AtMost(n) = self.limit {
            pairs.push(("n".to_string(), n.to_string()));
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> TimeBound {
        TimeBound::At(DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc))
    }

    #[test]
    fn test_absent_and_default_are_unbounded() {
        assert_eq!(parse_time_bound("from", None).unwrap(), TimeBound::Unbounded);
        assert_eq!(parse_time_bound("from", Some("DEFAULT")).unwrap(), TimeBound::Unbounded);
        assert_eq!(parse_time_bound("from", Some("default")).unwrap(), TimeBound::Unbounded);
    }

    #[test]
    fn test_date_forms() {
        assert_eq!(
            parse_time_bound("from", Some("2017-06-23")).unwrap(),
            at("2017-06-23T00:00:00Z")
        );
        assert_eq!(
            parse_time_bound("from", Some("2017-06-23T09:53")).unwrap(),
            at("2017-06-23T09:53:00Z")
        );
        assert_eq!(
            parse_time_bound("from", Some("2017-06-23T09:53:13")).unwrap(),
            at("2017-06-23T09:53:13Z")
        );
        assert_eq!(
            parse_time_bound("from", Some("2017-06-23t09:53:13.5z")).unwrap(),
            at("2017-06-23T09:53:13.500Z")
        );
        assert_eq!(
            parse_time_bound("from", Some("2017-06-23T09:53:13.549-0400")).unwrap(),
            at("2017-06-23T13:53:13.549Z")
        );
        assert_eq!(
            parse_time_bound("from", Some("2017-06-23T09:53:13+01:00")).unwrap(),
            at("2017-06-23T08:53:13Z")
        );
    }

    #[test]
    fn test_invalid_dates() {
        for bad in [
            "yesterday",
            "2017-6-23",
            "2017-02-30",
            "2017-06-23T9:53",
            "2017-06-23T09:53+01:00",
            "2017-06-23T25:00:00",
            "2017-06-23T09:53:13.1234",
            "2017-06-23T09:53:13+1",
            "2017-06-23T25:00",
            "2017-06-23T09:53:13.",
            "2017-06-23T09:53:13Z+01:00",
            "2017-06-23T09:53:1é",
        ] {
            assert!(
                matches!(parse_time_bound("to", Some(bad)), Err(Error::InvalidParameter(_))),
                "accepted {}",
                bad
            );
        }
    }

    #[test]
    fn test_range_order() {
        assert!(parse_time_range(Some("2017-06-24"), Some("2017-06-23")).is_err());
        let range = parse_time_range(Some("2017-06-23"), None).unwrap();
        assert_eq!(range.to, TimeBound::Unbounded);
        assert_eq!(parse_time_range(None, None).unwrap(), TimeRange::UNBOUNDED);
    }

    #[test]
    fn test_levels() {
        assert_eq!(parse_level(None).unwrap(), LogLevel::All);
        assert_eq!(parse_level(Some("warn")).unwrap(), LogLevel::Warn);
        assert_eq!(parse_level(Some("ERROR")).unwrap(), LogLevel::Error);
        assert!(matches!(parse_level(Some("LOUD")), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_limit() {
        assert_eq!(parse_limit(None).unwrap(), EntryLimit::Unlimited);
        assert_eq!(parse_limit(Some("25")).unwrap(), EntryLimit::AtMost(25));
        assert!(parse_limit(Some("0")).is_err());
        assert!(parse_limit(Some("-3")).is_err());
        assert!(parse_limit(Some("ten")).is_err());
    }

    #[test]
    fn test_log_query_pairs_skip_sentinels() {
        let query = LogQuery {
            range: parse_time_range(Some("2017-06-23T09:53:13+01:00"), None).unwrap(),
            level: LogLevel::All,
            limit: EntryLimit::AtMost(10),
        };
        assert_eq!(
            query.query_pairs(),
            vec![
                ("from".to_string(), "2017-06-23T08:53:13.000Z".to_string()),
                ("n".to_string(), "10".to_string()),
            ]
        );
    }
}
