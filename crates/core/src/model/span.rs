use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TracesimError};
use crate::ids::{SpanId, TraceId};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpanStatus {
    #[default]
    Success,
    Error,
    Timeout,
    Cancelled,
}

impl SpanStatus {
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Error | Self::Timeout)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Error => "ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Trace-level status: Error dominates Timeout, which dominates
    /// everything else. Cancelled spans do not fail a trace.
    pub fn aggregate<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = SpanStatus>,
    {
        let mut saw_timeout = false;
        for status in statuses {
            match status {
                Self::Error => return Self::Error,
                Self::Timeout => saw_timeout = true,
                Self::Success | Self::Cancelled => {}
            }
        }
        if saw_timeout {
            Self::Timeout
        } else {
            Self::Success
        }
    }
}

impl fmt::Display for SpanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpanStatus {
    type Err = TracesimError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "SUCCESS" | "OK" => Ok(Self::Success),
            "ERROR" => Ok(Self::Error),
            "TIMEOUT" => Ok(Self::Timeout),
            "CANCELLED" | "CANCELED" => Ok(Self::Cancelled),
            _ => Err(TracesimError::Parse(format!("unknown span status: {s}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpanLog {
    pub ts: DateTime<Utc>,
    pub message: String,
    pub fields: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Span {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub parent_span_id: Option<SpanId>,
    pub service: String,
    pub operation: String,
    pub start_ts: DateTime<Utc>,
    pub end_ts: DateTime<Utc>,
    pub duration_ms: i64,
    pub status: SpanStatus,
    pub tags: BTreeMap<String, String>,
    pub logs: Vec<SpanLog>,
}

impl Span {
    pub fn is_root(&self) -> bool {
        self.parent_span_id.is_none()
    }

    /// Interval length recomputed from the timestamps, never negative.
    pub fn interval_ms(&self) -> i64 {
        (self.end_ts - self.start_ts).num_milliseconds().max(0)
    }
}
