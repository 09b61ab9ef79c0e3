use std::collections::BTreeMap;

use chrono::{DateTime, Duration, TimeZone, Utc};
use tracesim_core::ids::{SpanId, TraceId};
use tracesim_core::model::{Span, SpanStatus, Trace};

pub fn base_ts() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap()
}

pub fn trace_id(n: u64) -> TraceId {
    TraceId::parse(&format!("{n:032x}")).unwrap()
}

/// A span with offsets in milliseconds from [`base_ts`].
pub fn span(
    trace: u64,
    id: u64,
    parent: Option<u64>,
    service: &str,
    start_ms: i64,
    end_ms: i64,
    status: SpanStatus,
) -> Span {
    Span {
        trace_id: trace_id(trace),
        span_id: SpanId::from_u64(id),
        parent_span_id: parent.map(SpanId::from_u64),
        service: service.to_string(),
        operation: format!("GET /{service}"),
        start_ts: base_ts() + Duration::milliseconds(start_ms),
        end_ts: base_ts() + Duration::milliseconds(end_ms),
        duration_ms: end_ms - start_ms,
        status,
        tags: BTreeMap::new(),
        logs: Vec::new(),
    }
}

/// gateway(0-100) -> auth(5-25), orders(20-90) -> postgres(30-70, error), redis(40-60).
pub fn checkout_trace(n: u64) -> Trace {
    Trace::assemble(vec![
        span(n, 1, None, "gateway", 0, 100, SpanStatus::Success),
        span(n, 2, Some(1), "auth", 5, 25, SpanStatus::Success),
        span(n, 3, Some(1), "orders", 20, 90, SpanStatus::Success),
        span(n, 4, Some(3), "postgres", 30, 70, SpanStatus::Error),
        span(n, 5, Some(3), "redis", 40, 60, SpanStatus::Success),
    ])
    .unwrap()
}

/// Root with two children covering the same interval.
pub fn overlapping_siblings(n: u64) -> Trace {
    Trace::assemble(vec![
        span(n, 1, None, "a", 0, 100, SpanStatus::Success),
        span(n, 2, Some(1), "b", 10, 60, SpanStatus::Success),
        span(n, 3, Some(1), "c", 10, 60, SpanStatus::Success),
    ])
    .unwrap()
}

/// A single a -> b call; `child_ms` is the callee's duration.
pub fn call_pair(n: u64, child_ms: i64, child_status: SpanStatus) -> Trace {
    Trace::assemble(vec![
        span(n, 1, None, "a", 0, child_ms + 10, SpanStatus::Success),
        span(n, 2, Some(1), "b", 5, 5 + child_ms, child_status),
    ])
    .unwrap()
}

/// Linear chain, each span nested `step_ms` inside its parent on both ends.
pub fn chain(n: u64, services: &[&str], step_ms: i64) -> Trace {
    let len = services.len() as i64;
    let spans = services
        .iter()
        .enumerate()
        .map(|(i, svc)| {
            let i = i as i64;
            let parent = (i > 0).then_some(i as u64);
            span(
                n,
                i as u64 + 1,
                parent,
                svc,
                i * step_ms,
                (2 * len - i) * step_ms,
                SpanStatus::Success,
            )
        })
        .collect();
    Trace::assemble(spans).unwrap()
}

pub fn single_span(n: u64, duration_ms: i64, status: SpanStatus) -> Trace {
    Trace::assemble(vec![span(n, 1, None, "solo", 0, duration_ms, status)]).unwrap()
}

/// A trace with no spans at all, as produced by lossy ingestion.
pub fn empty_trace(n: u64) -> Trace {
    Trace {
        trace_id: trace_id(n),
        root_span_id: SpanId::from_u64(1),
        root_service: String::new(),
        start_ts: base_ts(),
        end_ts: base_ts(),
        total_duration_ms: 0,
        span_count: 0,
        status: SpanStatus::Success,
        spans: Vec::new(),
    }
}
