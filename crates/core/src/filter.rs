use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TracesimError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    StartAsc,
    StartDesc,
    DurationDesc,
}

impl FromStr for SortOrder {
    type Err = TracesimError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "start_asc" | "ts_asc" => Ok(Self::StartAsc),
            "start_desc" | "ts_desc" => Ok(Self::StartDesc),
            "duration_desc" => Ok(Self::DurationDesc),
            _ => Err(TracesimError::Parse(format!("unknown sort order: {s}"))),
        }
    }
}

/// Inclusive, optionally open-ended time window used by queries and
/// windowed analyses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TimeWindow {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn all() -> Self {
        Self {
            since: None,
            until: None,
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        if let Some(since) = self.since
            && ts < since
        {
            return false;
        }
        if let Some(until) = self.until
            && ts > until
        {
            return false;
        }
        true
    }

    /// Clips `[start, end]` to the window. `None` unless the overlap has
    /// positive length; touching a boundary is not overlap. A zero-length
    /// interval is kept as is when the window contains it.
    pub fn clip(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        if start == end {
            return self.contains(start).then_some((start, end));
        }
        let start = self.since.map_or(start, |since| start.max(since));
        let end = self.until.map_or(end, |until| end.min(until));
        (start < end).then_some((start, end))
    }
}
