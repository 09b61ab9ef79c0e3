use tracesim_core::model::Trace;
use tracesim_core::report::SlowSpanSet;
use tracesim_core::stats::{self, DEFAULT_ZSCORE_K};
use tracing::debug;

/// Spans strictly slower than `threshold_ms`, slowest first.
///
/// Without an explicit threshold, `mean + 2 * std_dev` of the trace's span
/// durations is used; traces with fewer than two spans yield nothing then.
pub fn detect_slow_spans(trace: &Trace, threshold_ms: Option<f64>) -> SlowSpanSet {
    let threshold = match threshold_ms {
        Some(t) => t,
        None => {
            if trace.spans.len() < 2 {
                return SlowSpanSet::default();
            }
            let durations = trace
                .spans
                .iter()
                .map(|s| s.duration_ms as f64)
                .collect::<Vec<_>>();
            stats::mean(&durations) + DEFAULT_ZSCORE_K * stats::std_dev(&durations)
        }
    };

    let mut spans = trace
        .spans
        .iter()
        .filter(|s| s.duration_ms as f64 > threshold)
        .cloned()
        .collect::<Vec<_>>();
    spans.sort_by(|a, b| b.duration_ms.cmp(&a.duration_ms));

    debug!(trace_id = %trace.trace_id, threshold, slow = spans.len(), "slow span scan");
    SlowSpanSet {
        threshold_ms: threshold,
        spans,
    }
}
