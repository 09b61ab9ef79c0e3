use std::cmp::Reverse;

use tracesim_core::filter::SortOrder;
use tracesim_core::model::Trace;
use tracesim_core::report::{TraceListItem, TracesQuery};
use tracing::debug;

/// Trace summaries matching `req`, sorted and truncated to `req.limit`.
///
/// The service filter matches any span in the trace, not only the root.
pub fn list_traces(traces: &[Trace], req: &TracesQuery) -> Vec<TraceListItem> {
    let mut items = traces
        .iter()
        .filter(|t| req.window.contains(t.start_ts))
        .filter(|t| req.status.is_none_or(|status| t.status == status))
        .filter(|t| {
            req.service
                .as_deref()
                .is_none_or(|service| t.services().any(|s| s == service))
        })
        .map(|t| TraceListItem {
            trace_id: t.trace_id.clone(),
            root_service: t.root_service.clone(),
            root_operation: t.root().map(|r| r.operation.clone()).unwrap_or_default(),
            start_ts: t.start_ts,
            duration_ms: t.total_duration_ms,
            span_count: t.span_count,
            status: t.status,
        })
        .collect::<Vec<_>>();

    match req.sort {
        SortOrder::StartAsc => items.sort_by_key(|i| i.start_ts),
        SortOrder::StartDesc => items.sort_by_key(|i| Reverse(i.start_ts)),
        SortOrder::DurationDesc => items.sort_by_key(|i| Reverse(i.duration_ms)),
    }

    let matched = items.len();
    items.truncate(req.limit);
    debug!(matched, returned = items.len(), "listed traces");
    items
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use testkit::{base_ts, call_pair, checkout_trace, single_span};
    use tracesim_core::filter::TimeWindow;
    use tracesim_core::ids::TraceId;
    use tracesim_core::model::SpanStatus;

    use super::*;

    fn shifted(mut trace: Trace, offset_ms: i64) -> Trace {
        let shift = Duration::milliseconds(offset_ms);
        trace.start_ts += shift;
        trace.end_ts += shift;
        for span in &mut trace.spans {
            span.start_ts += shift;
            span.end_ts += shift;
        }
        trace
    }

    fn batch() -> Vec<Trace> {
        vec![
            shifted(single_span(1, 50, SpanStatus::Success), 0),
            shifted(single_span(2, 200, SpanStatus::Error), 1_000),
            shifted(checkout_trace(3), 2_000),
            shifted(call_pair(4, 10, SpanStatus::Timeout), 3_000),
        ]
    }

    fn ids(items: &[TraceListItem]) -> Vec<TraceId> {
        items.iter().map(|i| i.trace_id.clone()).collect()
    }

    #[test]
    fn list_traces_sorts_by_duration() {
        let req = TracesQuery {
            sort: SortOrder::DurationDesc,
            ..TracesQuery::default()
        };
        let items = list_traces(&batch(), &req);
        let durations = items.iter().map(|i| i.duration_ms).collect::<Vec<_>>();
        assert_eq!(durations, vec![200, 100, 50, 20]);
    }

    #[test]
    fn start_order_and_limit() {
        let req = TracesQuery {
            sort: SortOrder::StartDesc,
            limit: 2,
            ..TracesQuery::default()
        };
        let items = list_traces(&batch(), &req);
        assert_eq!(ids(&items), vec![testkit::trace_id(4), testkit::trace_id(3)]);
    }

    #[test]
    fn filters_combine() {
        let req = TracesQuery {
            service: Some("postgres".into()),
            ..TracesQuery::default()
        };
        let items = list_traces(&batch(), &req);
        assert_eq!(ids(&items), vec![testkit::trace_id(3)]);
        assert_eq!(items[0].root_operation, "GET /gateway");

        let req = TracesQuery {
            status: Some(SpanStatus::Error),
            ..TracesQuery::default()
        };
        // checkout_trace aggregates to Error through its postgres span
        assert_eq!(
            ids(&list_traces(&batch(), &req)),
            vec![testkit::trace_id(2), testkit::trace_id(3)]
        );

        let req = TracesQuery {
            window: TimeWindow {
                since: Some(base_ts() + Duration::milliseconds(1_500)),
                until: None,
            },
            ..TracesQuery::default()
        };
        assert_eq!(list_traces(&batch(), &req).len(), 2);
    }
}
