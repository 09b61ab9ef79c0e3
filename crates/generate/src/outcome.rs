use std::collections::BTreeMap;

use chrono::Duration;
use rand::Rng;
use tracesim_core::config::GeneratorConfig;
use tracesim_core::model::{Span, SpanLog, SpanStatus};

/// Independent per-span failure rolls. Failures never cascade to
/// ancestors; only the trace-level status reflects them, via
/// [`SpanStatus::aggregate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutcomePolicy {
    error_rate: f64,
    timeout_ratio: f64,
}

impl OutcomePolicy {
    pub fn new(error_rate: f64, timeout_ratio: f64) -> Self {
        Self {
            error_rate: error_rate.clamp(0.0, 1.0),
            timeout_ratio: timeout_ratio.clamp(0.0, 1.0),
        }
    }

    pub fn from_config(cfg: &GeneratorConfig) -> Self {
        Self::new(cfg.error_rate, cfg.timeout_ratio)
    }

    pub fn roll<R: Rng + ?Sized>(&self, rng: &mut R) -> SpanStatus {
        if !rng.gen_bool(self.error_rate) {
            return SpanStatus::Success;
        }
        if rng.gen_bool(self.timeout_ratio) {
            SpanStatus::Timeout
        } else {
            SpanStatus::Error
        }
    }
}

/// Adds the status code tag and, for failed spans, the error tag and a log
/// entry placed inside the span's interval.
pub fn decorate<R: Rng + ?Sized>(span: &mut Span, rng: &mut R) {
    let (code, message) = match span.status {
        SpanStatus::Error => ("500", Some("request failed")),
        SpanStatus::Timeout => ("504", Some("deadline exceeded")),
        SpanStatus::Cancelled => ("499", None),
        SpanStatus::Success => ("200", None),
    };
    span.tags
        .insert("http.status_code".to_string(), code.to_string());

    let Some(message) = message else {
        return;
    };
    span.tags.insert("error".to_string(), "true".to_string());

    let at = rng.gen_range(0..=span.duration_ms.max(0));
    let mut fields = BTreeMap::new();
    fields.insert("error.kind".to_string(), span.status.as_str().to_string());
    fields.insert("service".to_string(), span.service.clone());
    span.logs.push(SpanLog {
        ts: span.start_ts + Duration::milliseconds(at),
        message: message.to_string(),
        fields,
    });
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use tracesim_core::ids::{SpanId, TraceId};

    use super::*;

    fn span(status: SpanStatus) -> Span {
        let t0 = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        Span {
            trace_id: TraceId::parse("4bf92f3577b34da6a3ce929d0e0e4736").unwrap(),
            span_id: SpanId::from_u64(1),
            parent_span_id: None,
            service: "orders".to_string(),
            operation: "CreateOrder".to_string(),
            start_ts: t0,
            end_ts: t0 + Duration::milliseconds(40),
            duration_ms: 40,
            status,
            tags: BTreeMap::new(),
            logs: Vec::new(),
        }
    }

    #[test]
    fn zero_rate_never_fails() {
        let policy = OutcomePolicy::new(0.0, 0.5);
        let mut rng = StdRng::seed_from_u64(3);
        assert!((0..500).all(|_| policy.roll(&mut rng) == SpanStatus::Success));
    }

    #[test]
    fn full_rate_splits_by_timeout_ratio() {
        let mut rng = StdRng::seed_from_u64(3);
        let all_errors = OutcomePolicy::new(1.0, 0.0);
        assert!((0..100).all(|_| all_errors.roll(&mut rng) == SpanStatus::Error));
        let all_timeouts = OutcomePolicy::new(1.0, 1.0);
        assert!((0..100).all(|_| all_timeouts.roll(&mut rng) == SpanStatus::Timeout));

        let mixed = OutcomePolicy::new(1.0, 0.2);
        let timeouts = (0..5_000)
            .filter(|_| mixed.roll(&mut rng) == SpanStatus::Timeout)
            .count();
        assert!((800..1_200).contains(&timeouts), "timeouts={timeouts}");
    }

    #[test]
    fn decorate_failed_span_adds_log_inside_interval() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut s = span(SpanStatus::Timeout);
        decorate(&mut s, &mut rng);
        assert_eq!(s.tags["http.status_code"], "504");
        assert_eq!(s.tags["error"], "true");
        assert_eq!(s.logs.len(), 1);
        assert_eq!(s.logs[0].message, "deadline exceeded");
        assert!(s.logs[0].ts >= s.start_ts && s.logs[0].ts <= s.end_ts);

        let mut ok = span(SpanStatus::Success);
        decorate(&mut ok, &mut rng);
        assert!(ok.logs.is_empty());
        assert!(!ok.tags.contains_key("error"));
    }
}
