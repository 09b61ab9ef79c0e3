use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::filter::{SortOrder, TimeWindow};
use crate::ids::TraceId;
use crate::model::span::{Span, SpanStatus};
use crate::stats::Summary;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SlowSpanSet {
    pub threshold_ms: f64,
    pub spans: Vec<Span>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CriticalPath {
    pub spans: Vec<Span>,
    pub total_duration_ms: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct ConcurrencyReport {
    pub max_concurrent_spans: usize,
    pub avg_concurrent_spans: f64,
    pub parallelization_ratio: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceNode {
    pub service: String,
    pub call_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceEdge {
    pub source: String,
    pub target: String,
    pub call_count: usize,
    pub error_count: usize,
    pub avg_latency_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ServiceDependencyGraph {
    pub nodes: Vec<ServiceNode>,
    pub edges: Vec<ServiceEdge>,
}

impl ServiceDependencyGraph {
    pub fn edge(&self, source: &str, target: &str) -> Option<&ServiceEdge> {
        self.edges
            .iter()
            .find(|e| e.source == source && e.target == target)
    }

    pub fn node(&self, service: &str) -> Option<&ServiceNode> {
        self.nodes.iter().find(|n| n.service == service)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TraceStatistics {
    pub total_traces: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub timeout_count: usize,
    pub min_duration_ms: f64,
    pub max_duration_ms: f64,
    pub avg_duration_ms: f64,
    pub p50_duration_ms: f64,
    pub p90_duration_ms: f64,
    pub p99_duration_ms: f64,
    pub avg_span_count: f64,
    pub p50_span_count: f64,
    pub p90_span_count: f64,
    pub p99_span_count: f64,
    pub error_rate: f64,
    pub timeout_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceLatency {
    pub service: String,
    pub latency: Summary,
    pub error_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracesQuery {
    pub service: Option<String>,
    pub status: Option<SpanStatus>,
    pub window: TimeWindow,
    pub sort: SortOrder,
    pub limit: usize,
}

impl Default for TracesQuery {
    fn default() -> Self {
        Self {
            service: None,
            status: None,
            window: TimeWindow::all(),
            sort: SortOrder::StartAsc,
            limit: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceListItem {
    pub trace_id: TraceId,
    pub root_service: String,
    pub root_operation: String,
    pub start_ts: DateTime<Utc>,
    pub duration_ms: i64,
    pub span_count: usize,
    pub status: SpanStatus,
}
