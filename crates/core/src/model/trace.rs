use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TracesimError};
use crate::ids::{SpanId, TraceId};
use crate::model::span::{Span, SpanStatus};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trace {
    pub trace_id: TraceId,
    pub root_span_id: SpanId,
    pub root_service: String,
    pub start_ts: DateTime<Utc>,
    pub end_ts: DateTime<Utc>,
    pub total_duration_ms: i64,
    pub span_count: usize,
    pub status: SpanStatus,
    pub spans: Vec<Span>,
}

impl Trace {
    /// Builds a trace from its root and the remaining spans, deriving every
    /// aggregate field. The root is stored first.
    pub fn from_root(root: Span, descendants: Vec<Span>) -> Self {
        let mut spans = Vec::with_capacity(descendants.len() + 1);
        spans.push(root);
        spans.extend(descendants);

        let root = &spans[0];
        let end_ts = spans
            .iter()
            .map(|s| s.end_ts)
            .max()
            .unwrap_or(root.end_ts);
        let status = SpanStatus::aggregate(spans.iter().map(|s| s.status));

        Self {
            trace_id: root.trace_id.clone(),
            root_span_id: root.span_id.clone(),
            root_service: root.service.clone(),
            start_ts: root.start_ts,
            end_ts,
            total_duration_ms: (end_ts - root.start_ts).num_milliseconds().max(0),
            span_count: spans.len(),
            status,
            spans,
        }
    }

    /// Validates tree shape of spans obtained elsewhere (fixtures, files)
    /// and assembles the trace.
    pub fn assemble(spans: Vec<Span>) -> Result<Self> {
        let roots = spans.iter().filter(|s| s.is_root()).count();
        if roots != 1 {
            return Err(TracesimError::InvalidArgument(format!(
                "trace must have exactly one root span, found {roots}"
            )));
        }

        let mut ids = HashSet::new();
        for span in &spans {
            if !ids.insert(span.span_id.clone()) {
                return Err(TracesimError::InvalidArgument(format!(
                    "duplicate span id: {}",
                    span.span_id
                )));
            }
        }

        let trace_id = spans[0].trace_id.clone();
        for span in &spans {
            if span.trace_id != trace_id {
                return Err(TracesimError::InvalidArgument(format!(
                    "span {} belongs to trace {}, expected {trace_id}",
                    span.span_id, span.trace_id
                )));
            }
            if let Some(parent) = &span.parent_span_id
                && !ids.contains(parent)
            {
                return Err(TracesimError::InvalidArgument(format!(
                    "span {} references unknown parent {parent}",
                    span.span_id
                )));
            }
        }

        let root_idx = spans.iter().position(|s| s.is_root()).unwrap_or(0);
        let reached = reachable_from(&spans, root_idx);
        if reached < spans.len() {
            return Err(TracesimError::InvalidArgument(format!(
                "{} span(s) are unreachable from root {}; parent links form a cycle",
                spans.len() - reached,
                spans[root_idx].span_id
            )));
        }

        let mut spans = spans;
        let root = spans.remove(root_idx);
        Ok(Self::from_root(root, spans))
    }

    pub fn root(&self) -> Option<&Span> {
        self.spans.iter().find(|s| s.span_id == self.root_span_id)
    }

    pub fn find_span(&self, span_id: &SpanId) -> Option<&Span> {
        self.spans.iter().find(|s| &s.span_id == span_id)
    }

    pub fn services(&self) -> impl Iterator<Item = &str> {
        self.spans.iter().map(|s| s.service.as_str())
    }
}

/// Counts spans reachable from `root_idx` by following child links.
fn reachable_from(spans: &[Span], root_idx: usize) -> usize {
    let mut children: HashMap<&SpanId, Vec<usize>> = HashMap::new();
    for (idx, span) in spans.iter().enumerate() {
        if let Some(parent) = &span.parent_span_id {
            children.entry(parent).or_default().push(idx);
        }
    }

    let mut seen = HashSet::from([root_idx]);
    let mut stack = vec![root_idx];
    while let Some(idx) = stack.pop() {
        if let Some(kids) = children.get(&spans[idx].span_id) {
            for &kid in kids {
                if seen.insert(kid) {
                    stack.push(kid);
                }
            }
        }
    }
    seen.len()
}
