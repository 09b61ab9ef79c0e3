use std::collections::BTreeMap;

use tracesim_core::ids::TraceId;
use tracesim_core::model::{SpanStatus, Trace};
use tracesim_core::report::{ServiceLatency, TraceStatistics};
use tracesim_core::stats;
use tracing::info;

/// Batch-level statistics; an empty batch gives all zeros.
pub fn calculate_statistics(traces: &[Trace]) -> TraceStatistics {
    if traces.is_empty() {
        return TraceStatistics::default();
    }

    let mut success_count = 0;
    let mut error_count = 0;
    let mut timeout_count = 0;
    for trace in traces {
        match trace.status {
            SpanStatus::Error => error_count += 1,
            SpanStatus::Timeout => timeout_count += 1,
            SpanStatus::Success | SpanStatus::Cancelled => success_count += 1,
        }
    }

    let durations = traces
        .iter()
        .map(|t| t.total_duration_ms as f64)
        .collect::<Vec<_>>();
    let span_counts = traces
        .iter()
        .map(|t| t.span_count as f64)
        .collect::<Vec<_>>();
    let duration = stats::describe(&durations);
    let spans = stats::describe(&span_counts);
    let total = traces.len() as f64;

    let out = TraceStatistics {
        total_traces: traces.len(),
        success_count,
        error_count,
        timeout_count,
        min_duration_ms: duration.min,
        max_duration_ms: duration.max,
        avg_duration_ms: duration.mean,
        p50_duration_ms: duration.p50,
        p90_duration_ms: duration.p90,
        p99_duration_ms: duration.p99,
        avg_span_count: spans.mean,
        p50_span_count: spans.p50,
        p90_span_count: spans.p90,
        p99_span_count: spans.p99,
        error_rate: error_count as f64 / total,
        timeout_rate: timeout_count as f64 / total,
    };

    info!(
        traces = out.total_traces,
        errors = out.error_count,
        timeouts = out.timeout_count,
        p99_ms = out.p99_duration_ms,
        "computed trace statistics"
    );
    out
}

/// Span duration summary per service, ordered by service name.
pub fn service_latency(traces: &[Trace]) -> Vec<ServiceLatency> {
    let mut by_service: BTreeMap<&str, (Vec<f64>, usize)> = BTreeMap::new();
    for span in traces.iter().flat_map(|t| &t.spans) {
        let entry = by_service.entry(span.service.as_str()).or_default();
        entry.0.push(span.duration_ms as f64);
        if span.status.is_failure() {
            entry.1 += 1;
        }
    }

    by_service
        .into_iter()
        .map(|(service, (durations, error_count))| ServiceLatency {
            service: service.to_string(),
            latency: stats::describe(&durations),
            error_count,
        })
        .collect()
}

/// Traces whose total duration falls outside the Tukey fences of the batch.
pub fn detect_outlier_traces(traces: &[Trace]) -> Vec<TraceId> {
    let durations = traces
        .iter()
        .map(|t| t.total_duration_ms as f64)
        .collect::<Vec<_>>();
    stats::detect_outliers_iqr(&durations)
        .into_iter()
        .map(|idx| traces[idx].trace_id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use testkit::{call_pair, checkout_trace, single_span};

    use super::*;

    #[test]
    fn empty_batch_is_all_zeros() {
        assert_eq!(calculate_statistics(&[]), TraceStatistics::default());
        assert!(service_latency(&[]).is_empty());
        assert!(detect_outlier_traces(&[]).is_empty());
    }

    #[test]
    fn counts_and_rates_by_trace_status() {
        let traces = vec![
            single_span(1, 10, SpanStatus::Success),
            single_span(2, 20, SpanStatus::Error),
            single_span(3, 30, SpanStatus::Timeout),
            single_span(4, 40, SpanStatus::Success),
        ];
        let stats = calculate_statistics(&traces);
        assert_eq!(stats.total_traces, 4);
        assert_eq!(stats.success_count, 2);
        assert_eq!(stats.error_count, 1);
        assert_eq!(stats.timeout_count, 1);
        assert_eq!(stats.error_rate, 0.25);
        assert_eq!(stats.timeout_rate, 0.25);
        assert_eq!(stats.min_duration_ms, 10.0);
        assert_eq!(stats.max_duration_ms, 40.0);
        assert_eq!(stats.avg_duration_ms, 25.0);
        assert_eq!(stats.p50_duration_ms, 20.0);
        assert_eq!(stats.p99_duration_ms, 40.0);
        assert_eq!(stats.avg_span_count, 1.0);
        assert!(stats.p50_duration_ms <= stats.p90_duration_ms);
        assert!(stats.p90_duration_ms <= stats.p99_duration_ms);
    }

    #[test]
    fn latency_per_service() {
        let traces = vec![checkout_trace(1), checkout_trace(2)];
        let latency = service_latency(&traces);
        let postgres = latency.iter().find(|l| l.service == "postgres").unwrap();
        assert_eq!(postgres.latency.count, 2);
        assert_eq!(postgres.latency.mean, 40.0);
        assert_eq!(postgres.error_count, 2);
        assert_eq!(latency[0].service, "auth");
    }

    #[test]
    fn one_slow_trace_is_an_outlier() {
        let mut traces = (1..=9)
            .map(|n| call_pair(n, 20, SpanStatus::Success))
            .collect::<Vec<_>>();
        traces.push(call_pair(10, 5_000, SpanStatus::Success));
        assert_eq!(detect_outlier_traces(&traces), vec![testkit::trace_id(10)]);
    }
}
