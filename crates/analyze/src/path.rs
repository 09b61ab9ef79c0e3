use tracesim_core::model::Trace;
use tracesim_core::report::CriticalPath;

use crate::tree::SpanTree;

/// Levels on the deepest root-to-leaf path; the root alone counts as 1.
pub fn calculate_depth(trace: &Trace) -> usize {
    SpanTree::new(trace)
        .bfs()
        .into_iter()
        .map(|(_, level)| level)
        .max()
        .unwrap_or(0)
}

/// Root-to-leaf path with the largest summed span duration. Ties go to the
/// child that appears first in the trace.
pub fn critical_path(trace: &Trace) -> CriticalPath {
    let tree = SpanTree::new(trace);
    let Some(root) = tree.root_index() else {
        return CriticalPath::default();
    };

    let order = tree.bfs();
    let mut best = vec![0i64; trace.spans.len()];
    let mut next = vec![None; trace.spans.len()];
    for &(idx, _) in order.iter().rev() {
        let mut pick: Option<(usize, i64)> = None;
        for &child in tree.children(idx) {
            if pick.is_none_or(|(_, cost)| best[child] > cost) {
                pick = Some((child, best[child]));
            }
        }
        best[idx] = tree.span(idx).duration_ms + pick.map_or(0, |(_, cost)| cost);
        next[idx] = pick.map(|(child, _)| child);
    }

    let mut spans = Vec::new();
    let mut cursor = Some(root);
    while let Some(idx) = cursor {
        spans.push(tree.span(idx).clone());
        cursor = next[idx];
    }

    CriticalPath {
        total_duration_ms: best[root],
        spans,
    }
}

/// Follows the child that finishes last from the root down. The total is
/// the root's wall-clock duration.
pub fn wall_clock_critical_path(trace: &Trace) -> CriticalPath {
    let tree = SpanTree::new(trace);
    let Some(root) = tree.root_index() else {
        return CriticalPath::default();
    };

    let mut spans = Vec::new();
    let mut cursor = Some(root);
    while let Some(idx) = cursor {
        spans.push(tree.span(idx).clone());
        cursor = tree
            .children(idx)
            .iter()
            .copied()
            .reduce(|a, b| if tree.span(b).end_ts > tree.span(a).end_ts { b } else { a });
    }

    CriticalPath {
        total_duration_ms: tree.span(root).interval_ms(),
        spans,
    }
}
