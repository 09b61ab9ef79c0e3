use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TracesimError};

/// Half-open generation window `[start, end)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        let range = Self { start, end };
        range.validate()?;
        Ok(range)
    }

    /// The window of length `span` ending now.
    pub fn last(span: Duration) -> Result<Self> {
        let span = chrono::Duration::from_std(span)
            .map_err(|e| TracesimError::Parse(format!("failed to convert duration: {e}")))?;
        Self::ending_at(Utc::now(), span)
    }

    pub fn ending_at(end: DateTime<Utc>, span: chrono::Duration) -> Result<Self> {
        let start = end.checked_sub_signed(span).ok_or_else(|| {
            TracesimError::Config(format!("window of {span} ending at {end} is out of range"))
        })?;
        Self::new(start, end)
    }

    pub fn validate(&self) -> Result<()> {
        if self.start >= self.end {
            return Err(TracesimError::Config(format!(
                "time range start {} must be before end {}",
                self.start.to_rfc3339(),
                self.end.to_rfc3339()
            )));
        }
        Ok(())
    }

    pub fn duration_ms(&self) -> i64 {
        (self.end - self.start).num_milliseconds()
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }
}

pub fn parse_time_or_relative(input: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Ok(ts.with_timezone(&Utc));
    }

    if let Ok(duration) = humantime::parse_duration(input) {
        return Ok(Utc::now()
            - chrono::Duration::from_std(duration).map_err(|e| {
                TracesimError::Parse(format!("failed to parse duration to chrono: {e}"))
            })?);
    }

    Err(TracesimError::Parse(format!(
        "expected RFC3339 time or duration, got {input}"
    )))
}

pub fn parse_duration_str(input: &str) -> Result<Duration> {
    humantime::parse_duration(input)
        .map_err(|e| TracesimError::Parse(format!("invalid duration {input}: {e}")))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn parses_rfc3339() {
        let ts = parse_time_or_relative("2026-01-01T00:00:00Z").unwrap();
        assert_eq!(ts.to_rfc3339(), "2026-01-01T00:00:00+00:00");
    }

    #[test]
    fn parses_duration() {
        let now = Utc::now();
        let ts = parse_time_or_relative("5m").unwrap();
        assert!(ts < now);
    }

    #[test]
    fn rejects_invalid() {
        assert!(parse_time_or_relative("nope").is_err());
        assert!(parse_duration_str("soon").is_err());
    }

    #[test]
    fn range_requires_start_before_end() {
        let t0 = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        assert!(TimeRange::new(t0, t0).is_err());
        let range = TimeRange::new(t0, t0 + chrono::Duration::seconds(2)).unwrap();
        assert_eq!(range.duration_ms(), 2000);
        assert!(range.contains(t0));
        assert!(!range.contains(range.end));
    }

    #[test]
    fn last_window_ends_now() {
        let range = TimeRange::last(Duration::from_secs(3600)).unwrap();
        assert_eq!(range.duration_ms(), 3_600_000);
    }

    #[test]
    fn ending_at_keeps_the_anchor() {
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let range = TimeRange::ending_at(t0, chrono::Duration::minutes(15)).unwrap();
        assert_eq!(range.end, t0);
        assert_eq!(range.duration_ms(), 15 * 60 * 1000);
        assert!(TimeRange::ending_at(t0, chrono::Duration::zero()).is_err());
    }
}
