use std::collections::{BTreeMap, HashMap};

use tracesim_core::model::Trace;
use tracesim_core::report::{ServiceDependencyGraph, ServiceEdge, ServiceNode};
use tracing::info;

#[derive(Debug, Default)]
struct EdgeAcc {
    call_count: usize,
    error_count: usize,
    avg_latency_ms: f64,
}

/// Caller -> callee edges from every parent/child span pair across `traces`.
///
/// A node's call count is the number of spans the service executed. Edge
/// latency is the running mean of the callee span durations. Nodes and
/// edges come out ordered by service name.
pub fn build_service_dependency_graph(traces: &[Trace]) -> ServiceDependencyGraph {
    let mut nodes: BTreeMap<&str, usize> = BTreeMap::new();
    let mut edges: BTreeMap<(&str, &str), EdgeAcc> = BTreeMap::new();

    for trace in traces {
        let by_id = trace
            .spans
            .iter()
            .map(|s| (&s.span_id, s))
            .collect::<HashMap<_, _>>();

        for span in &trace.spans {
            *nodes.entry(span.service.as_str()).or_default() += 1;

            let parent = span.parent_span_id.as_ref().and_then(|p| by_id.get(p).copied());
            let Some(parent) = parent else {
                continue;
            };
            let acc = edges
                .entry((parent.service.as_str(), span.service.as_str()))
                .or_default();
            acc.call_count += 1;
            if span.status.is_failure() {
                acc.error_count += 1;
            }
            acc.avg_latency_ms +=
                (span.duration_ms as f64 - acc.avg_latency_ms) / acc.call_count as f64;
        }
    }

    let graph = ServiceDependencyGraph {
        nodes: nodes
            .into_iter()
            .map(|(service, call_count)| ServiceNode {
                service: service.to_string(),
                call_count,
            })
            .collect(),
        edges: edges
            .into_iter()
            .map(|((source, target), acc)| ServiceEdge {
                source: source.to_string(),
                target: target.to_string(),
                call_count: acc.call_count,
                error_count: acc.error_count,
                avg_latency_ms: acc.avg_latency_ms,
            })
            .collect(),
    };

    info!(
        traces = traces.len(),
        services = graph.nodes.len(),
        edges = graph.edges.len(),
        "built service dependency graph"
    );
    graph
}
