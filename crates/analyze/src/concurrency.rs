use chrono::{DateTime, Utc};
use tracesim_core::filter::TimeWindow;
use tracesim_core::model::Trace;
use tracesim_core::report::ConcurrencyReport;

/// Ordering of events sharing a timestamp: ends, then starts, then the ends
/// of zero-length spans, so the counter never goes negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Edge {
    End,
    Start,
    InstantEnd,
}

pub fn analyze_concurrency(trace: &Trace) -> ConcurrencyReport {
    let intervals = trace
        .spans
        .iter()
        .map(|s| (s.start_ts, s.end_ts))
        .collect::<Vec<_>>();
    sweep(&intervals, trace.total_duration_ms)
}

/// Concurrency with span intervals clipped to `window`; spans entirely
/// outside it are ignored. The wall-clock extent is that of the clipped
/// intervals.
pub fn analyze_concurrency_in_window(trace: &Trace, window: &TimeWindow) -> ConcurrencyReport {
    let intervals = trace
        .spans
        .iter()
        .filter_map(|s| window.clip(s.start_ts, s.end_ts))
        .collect::<Vec<_>>();

    let extent = match (
        intervals.iter().map(|(s, _)| *s).min(),
        intervals.iter().map(|(_, e)| *e).max(),
    ) {
        (Some(start), Some(end)) => (end - start).num_milliseconds(),
        _ => 0,
    };
    sweep(&intervals, extent)
}

fn sweep(intervals: &[(DateTime<Utc>, DateTime<Utc>)], wall_ms: i64) -> ConcurrencyReport {
    if intervals.is_empty() {
        return ConcurrencyReport::default();
    }

    let mut events = Vec::with_capacity(intervals.len() * 2);
    let mut busy_ms = 0i64;
    for &(start, end) in intervals {
        let end = end.max(start);
        busy_ms += (end - start).num_milliseconds();
        events.push((start, Edge::Start));
        events.push((end, if end == start { Edge::InstantEnd } else { Edge::End }));
    }
    events.sort();

    let mut current = 0usize;
    let mut peak = 0usize;
    let mut total = 0usize;
    for (_, edge) in &events {
        match edge {
            Edge::Start => current += 1,
            Edge::End | Edge::InstantEnd => current = current.saturating_sub(1),
        }
        peak = peak.max(current);
        total += current;
    }

    let parallelization_ratio = if busy_ms > 0 {
        (wall_ms.max(0) as f64 / busy_ms as f64).min(1.0)
    } else {
        0.0
    };

    ConcurrencyReport {
        max_concurrent_spans: peak,
        avg_concurrent_spans: total as f64 / events.len() as f64,
        parallelization_ratio,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use testkit::{base_ts, chain, empty_trace, overlapping_siblings, single_span, span};
    use tracesim_core::model::SpanStatus;

    use super::*;

    #[test]
    fn overlapping_siblings_peak_at_three() {
        let report = analyze_concurrency(&overlapping_siblings(1));
        assert_eq!(report.max_concurrent_spans, 3);
        // counters after each event: 1, 2, 3, 2, 1, 0
        assert!((report.avg_concurrent_spans - 1.5).abs() < 1e-9);
        assert!((report.parallelization_ratio - 0.5).abs() < 1e-9);
    }

    #[test]
    fn back_to_back_spans_do_not_overlap() {
        let trace = Trace::assemble(vec![
            span(1, 1, None, "a", 0, 10, SpanStatus::Success),
            span(1, 2, Some(1), "b", 10, 20, SpanStatus::Success),
        ])
        .unwrap();
        let report = analyze_concurrency(&trace);
        assert_eq!(report.max_concurrent_spans, 1);
    }

    #[test]
    fn single_span_is_fully_serial() {
        let report = analyze_concurrency(&single_span(1, 40, SpanStatus::Success));
        assert_eq!(report.max_concurrent_spans, 1);
        assert_eq!(report.parallelization_ratio, 1.0);
    }

    #[test]
    fn zero_length_spans_are_counted_without_underflow() {
        let report = analyze_concurrency(&single_span(1, 0, SpanStatus::Success));
        assert_eq!(report.max_concurrent_spans, 1);
        assert_eq!(report.parallelization_ratio, 0.0);
    }

    #[test]
    fn empty_trace_reports_zeros() {
        assert_eq!(
            analyze_concurrency(&empty_trace(1)),
            ConcurrencyReport::default()
        );
    }

    #[test]
    fn window_clips_and_drops_spans() {
        let trace = chain(1, &["a", "b", "c"], 10);
        // a: 0-60, b: 10-50, c: 20-40
        let window = TimeWindow {
            since: Some(base_ts() + Duration::milliseconds(45)),
            until: Some(base_ts() + Duration::milliseconds(100)),
        };
        let report = analyze_concurrency_in_window(&trace, &window);
        assert_eq!(report.max_concurrent_spans, 2);

        let outside = TimeWindow {
            since: Some(base_ts() + Duration::milliseconds(500)),
            until: None,
        };
        assert_eq!(
            analyze_concurrency_in_window(&trace, &outside),
            ConcurrencyReport::default()
        );
    }

    #[test]
    fn window_ignores_spans_ending_on_its_start() {
        let trace = chain(1, &["a", "b", "c"], 10);
        let window = TimeWindow {
            since: Some(base_ts() + Duration::milliseconds(50)),
            until: None,
        };
        // b ends at 50 and c at 40; only a overlaps.
        let report = analyze_concurrency_in_window(&trace, &window);
        assert_eq!(report.max_concurrent_spans, 1);
        assert!((report.avg_concurrent_spans - 0.5).abs() < 1e-9);
        assert!((report.parallelization_ratio - 1.0).abs() < 1e-9);
    }
}
