use std::collections::{HashMap, HashSet, VecDeque};

use tracesim_core::ids::SpanId;
use tracesim_core::model::{Span, Trace};

/// Parent/child index over a trace's spans.
///
/// Spans whose parent is missing, and spans caught in a parent cycle, are
/// never reached from the root and stay out of [`SpanTree::bfs`].
#[derive(Debug)]
pub struct SpanTree<'a> {
    trace: &'a Trace,
    index: HashMap<&'a SpanId, usize>,
    children: Vec<Vec<usize>>,
    root: Option<usize>,
}

impl<'a> SpanTree<'a> {
    pub fn new(trace: &'a Trace) -> Self {
        let mut index = HashMap::with_capacity(trace.spans.len());
        for (idx, span) in trace.spans.iter().enumerate() {
            index.entry(&span.span_id).or_insert(idx);
        }

        let mut children = vec![Vec::new(); trace.spans.len()];
        for (idx, span) in trace.spans.iter().enumerate() {
            if let Some(parent) = &span.parent_span_id
                && let Some(&p) = index.get(parent)
                && p != idx
            {
                children[p].push(idx);
            }
        }

        let root = index
            .get(&trace.root_span_id)
            .copied()
            .filter(|&idx| trace.spans[idx].is_root())
            .or_else(|| trace.spans.iter().position(Span::is_root));

        Self {
            trace,
            index,
            children,
            root,
        }
    }

    pub fn root(&self) -> Option<&'a Span> {
        self.root.map(|idx| &self.trace.spans[idx])
    }

    pub fn root_index(&self) -> Option<usize> {
        self.root
    }

    pub fn span(&self, idx: usize) -> &'a Span {
        &self.trace.spans[idx]
    }

    pub fn index_of(&self, span_id: &SpanId) -> Option<usize> {
        self.index.get(span_id).copied()
    }

    /// Children in span order.
    pub fn children(&self, idx: usize) -> &[usize] {
        &self.children[idx]
    }

    /// Breadth-first `(index, level)` pairs starting at the root (level 1).
    pub fn bfs(&self) -> Vec<(usize, usize)> {
        self.root.map_or_else(Vec::new, |root| self.bfs_from(root))
    }

    pub fn bfs_from(&self, start: usize) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([(start, 1usize)]);
        while let Some((idx, level)) = queue.pop_front() {
            if !seen.insert(idx) {
                continue;
            }
            out.push((idx, level));
            queue.extend(self.children[idx].iter().map(|&c| (c, level + 1)));
        }
        out
    }
}

/// The span with `span_id` and everything beneath it, ordered by start time.
/// Unknown ids give an empty list.
pub fn subtree(trace: &Trace, span_id: &SpanId) -> Vec<Span> {
    let tree = SpanTree::new(trace);
    let Some(start) = tree.index_of(span_id) else {
        return Vec::new();
    };

    let mut out = tree
        .bfs_from(start)
        .into_iter()
        .map(|(idx, _)| trace.spans[idx].clone())
        .collect::<Vec<_>>();
    out.sort_by_key(|s| s.start_ts);
    out
}
