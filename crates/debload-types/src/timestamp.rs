use std::fmt;

use chrono::{DateTime, FixedOffset, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// An instant with the UTC offset it was recorded in.
///
/// Changelog trailers and signatures carry their own offsets, and the offset
/// is part of every revision and release identifier, so it is kept rather
/// than normalized away.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    /// Whole seconds since the UNIX epoch.
    pub seconds: i64,
    /// Sub-second part, in microseconds.
    pub microseconds: u32,
    /// Offset from UTC, in minutes.
    pub offset_minutes: i16,
}

impl Timestamp {
    /// Create a timestamp from explicit parts.
    pub fn new(seconds: i64, microseconds: u32, offset_minutes: i16) -> Self {
        Self {
            seconds,
            microseconds,
            offset_minutes,
        }
    }

    /// A UTC timestamp at the given whole second.
    pub fn from_unix(seconds: i64) -> Self {
        Self::new(seconds, 0, 0)
    }

    /// Parse an RFC 2822 date, as found in Debian changelog trailers.
    pub fn parse_rfc2822(s: &str) -> Result<Self, TypeError> {
        DateTime::parse_from_rfc2822(s.trim())
            .map(Self::from)
            .map_err(|e| TypeError::InvalidTimestamp(format!("{s:?}: {e}")))
    }

    /// Parse an RFC 3339 date.
    pub fn parse_rfc3339(s: &str) -> Result<Self, TypeError> {
        DateTime::parse_from_rfc3339(s.trim())
            .map(Self::from)
            .map_err(|e| TypeError::InvalidTimestamp(format!("{s:?}: {e}")))
    }

    /// Convert to a chrono datetime in the recorded offset.
    pub fn to_datetime(&self) -> Result<DateTime<FixedOffset>, TypeError> {
        let offset = FixedOffset::east_opt(i32::from(self.offset_minutes) * 60)
            .ok_or_else(|| TypeError::InvalidTimestamp(format!("offset {}", self.offset_minutes)))?;
        let utc = Utc
            .timestamp_opt(self.seconds, self.microseconds * 1_000)
            .single()
            .ok_or_else(|| TypeError::InvalidTimestamp(format!("seconds {}", self.seconds)))?;
        Ok(utc.with_timezone(&offset))
    }

    /// Git-style offset rendering: `+HHMM` / `-HHMM`.
    pub fn git_offset(&self) -> String {
        let sign = if self.offset_minutes < 0 { '-' } else { '+' };
        let abs = self.offset_minutes.unsigned_abs();
        format!("{sign}{:02}{:02}", abs / 60, abs % 60)
    }

    /// Git-style rendering used in manifests: `<seconds>[.<micros>] <offset>`.
    ///
    /// The fractional part is only written when non-zero.
    pub fn to_git_string(&self) -> String {
        if self.microseconds == 0 {
            format!("{} {}", self.seconds, self.git_offset())
        } else {
            let frac = format!("{:06}", self.microseconds);
            format!(
                "{}.{} {}",
                self.seconds,
                frac.trim_end_matches('0'),
                self.git_offset()
            )
        }
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for Timestamp {
    fn from(dt: DateTime<Tz>) -> Self {
        let offset_secs = dt.offset().fix().local_minus_utc();
        Self {
            seconds: dt.timestamp(),
            microseconds: dt.timestamp_subsec_micros(),
            offset_minutes: (offset_secs / 60) as i16,
        }
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.to_git_string())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Ok(dt) => write!(f, "{}", dt.to_rfc3339()),
            Err(_) => write!(f, "{}", self.to_git_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_changelog_date() {
        let ts = Timestamp::parse_rfc2822("Mon, 05 Jan 2015 10:11:12 +0100").unwrap();
        assert_eq!(ts.seconds, 1_420_449_072);
        assert_eq!(ts.offset_minutes, 60);
        assert_eq!(ts.to_git_string(), "1420449072 +0100");
    }

    #[test]
    fn negative_offset_rendering() {
        let ts = Timestamp::new(0, 0, -330);
        assert_eq!(ts.git_offset(), "-0530");
    }

    #[test]
    fn fractional_seconds_are_trimmed() {
        let ts = Timestamp::new(10, 500_000, 0);
        assert_eq!(ts.to_git_string(), "10.5 +0000");
    }

    #[test]
    fn datetime_roundtrip_keeps_offset() {
        let ts = Timestamp::parse_rfc3339("2015-01-05T10:11:12+02:00").unwrap();
        let dt = ts.to_datetime().unwrap();
        assert_eq!(Timestamp::from(dt), ts);
        assert_eq!(dt.to_rfc3339(), "2015-01-05T10:11:12+02:00");
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            Timestamp::parse_rfc2822("yesterday"),
            Err(TypeError::InvalidTimestamp(_))
        ));
    }
}
