use std::collections::{BTreeMap, HashSet};

use chrono::Duration;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore, SeedableRng};
use tracesim_core::config::GeneratorConfig;
use tracesim_core::error::Result;
use tracesim_core::ids::{SpanId, TraceId};
use tracesim_core::model::{Span, SpanStatus, Trace};
use tracing::{debug, info};

use crate::outcome::{OutcomePolicy, decorate};
use crate::timing::{SpanTiming, TimingModel, settle};

/// Above this many spans in one trace, only the spine keeps growing so the
/// target depth is still reached without unbounded fan-out.
pub const MAX_SPANS_PER_TRACE: usize = 10_000;

const DEFAULT_METHODS: [&str; 3] = ["GET", "POST", "PUT"];

/// Builds synthetic traces from a validated [`GeneratorConfig`].
///
/// Every trace is built from its own seed drawn from the caller's RNG, so a
/// batch is reproducible under a fixed seed and each trace can be rebuilt in
/// isolation with [`TraceGenerator::generate_one`].
#[derive(Debug, Clone)]
pub struct TraceGenerator {
    config: GeneratorConfig,
    timing: TimingModel,
    outcomes: OutcomePolicy,
    entry_services: Vec<usize>,
    callees: Vec<Vec<usize>>,
}

#[derive(Debug)]
struct PlannedSpan {
    parent: Option<usize>,
    service: usize,
    level: usize,
    spine: bool,
    span_id: SpanId,
    status: SpanStatus,
}

/// Per-trace state threaded through construction.
struct BuildContext<'a> {
    rng: &'a mut StdRng,
    target_depth: usize,
    used_ids: HashSet<u64>,
    planned: Vec<PlannedSpan>,
    timings: Vec<SpanTiming>,
}

impl BuildContext<'_> {
    fn next_span_id(&mut self) -> SpanId {
        loop {
            let candidate = self.rng.next_u64();
            if candidate != 0 && self.used_ids.insert(candidate) {
                return SpanId::from_u64(candidate);
            }
        }
    }

    fn parents(&self) -> Vec<Option<usize>> {
        self.planned.iter().map(|p| p.parent).collect()
    }
}

impl TraceGenerator {
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        config.validate()?;

        let index_of = |id: &str| config.services.iter().position(|s| s.id == id);
        let callees = config
            .services
            .iter()
            .map(|svc| svc.calls.iter().filter_map(|c| index_of(c)).collect())
            .collect::<Vec<Vec<usize>>>();

        let called = callees.iter().flatten().copied().collect::<HashSet<_>>();
        let mut entry_services = (0..config.services.len())
            .filter(|idx| !called.contains(idx))
            .collect::<Vec<_>>();
        if entry_services.is_empty() {
            entry_services = (0..config.services.len()).collect();
        }

        Ok(Self {
            timing: TimingModel::from_config(&config),
            outcomes: OutcomePolicy::from_config(&config),
            config,
            entry_services,
            callees,
        })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Generates `count` traces, seeded from the config when a seed is set
    /// and from OS entropy otherwise.
    pub fn generate(&self, count: usize) -> Vec<Trace> {
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.generate_with_rng(&mut rng, count)
    }

    pub fn generate_with_rng<R: Rng + ?Sized>(&self, rng: &mut R, count: usize) -> Vec<Trace> {
        let traces = (0..count)
            .map(|_| self.generate_one(rng.next_u64()))
            .collect::<Vec<_>>();

        let spans = traces.iter().map(|t| t.span_count).sum::<usize>();
        let failed = traces.iter().filter(|t| t.status.is_failure()).count();
        info!(traces = traces.len(), spans, failed, "generated trace batch");
        traces
    }

    pub fn generate_one(&self, seed: u64) -> Trace {
        let mut rng = StdRng::seed_from_u64(seed);
        let trace = self.build(&mut rng);
        debug!(
            trace_id = %trace.trace_id,
            root = %trace.root_service,
            spans = trace.span_count,
            duration_ms = trace.total_duration_ms,
            status = %trace.status,
            "generated trace"
        );
        trace
    }

    fn build(&self, rng: &mut StdRng) -> Trace {
        let trace_id = TraceId::random(rng);
        let range = self.config.time_range;
        let start_offset = rng.gen_range(0..range.duration_ms().max(1));
        let start = range.start + Duration::milliseconds(start_offset);
        let target_depth = rng.gen_range(self.config.min_depth..=self.config.max_depth);

        let root_service = *self
            .entry_services
            .choose(rng)
            .unwrap_or(&0);
        let root_timing = self.timing.root(rng, start);
        let root_status = self.outcomes.roll(rng);

        let mut ctx = BuildContext {
            rng,
            target_depth,
            used_ids: HashSet::new(),
            planned: Vec::new(),
            timings: Vec::new(),
        };
        let root_id = ctx.next_span_id();
        ctx.planned.push(PlannedSpan {
            parent: None,
            service: root_service,
            level: 1,
            spine: true,
            span_id: root_id,
            status: root_status,
        });
        ctx.timings.push(root_timing);

        self.expand(&mut ctx);

        let parents = ctx.parents();
        settle(&mut ctx.timings, &parents);

        let mut root = self.materialize(ctx.rng, &ctx.planned, &ctx.timings, 0, &trace_id);
        decorate(&mut root, ctx.rng);
        let descendants = (1..ctx.planned.len())
            .map(|idx| {
                let mut span =
                    self.materialize(ctx.rng, &ctx.planned, &ctx.timings, idx, &trace_id);
                decorate(&mut span, ctx.rng);
                span
            })
            .collect::<Vec<_>>();

        Trace::from_root(root, descendants)
    }

    /// Depth-first expansion with an explicit stack; spans are appended in
    /// creation order, so every parent precedes its children.
    fn expand(&self, ctx: &mut BuildContext<'_>) {
        let bp = self.config.branch_probability;
        let mut stack = vec![0usize];

        while let Some(idx) = stack.pop() {
            let (level, spine, service) = {
                let p = &ctx.planned[idx];
                (p.level, p.spine, p.service)
            };
            if level >= ctx.target_depth {
                continue;
            }

            let saturated = ctx.planned.len() >= MAX_SPANS_PER_TRACE;
            let children = if spine {
                let extra = if !saturated && ctx.rng.gen_bool(bp) {
                    ctx.rng.gen_range(1..=2)
                } else {
                    0
                };
                1 + extra
            } else if !saturated && ctx.rng.gen_bool(bp) {
                ctx.rng.gen_range(1..=3)
            } else {
                0
            };

            for n in 0..children {
                let child_service = self.pick_callee(ctx.rng, service);
                let timing = self.timing.child(ctx.rng, &ctx.timings[idx]);
                let status = self.outcomes.roll(ctx.rng);
                let span_id = ctx.next_span_id();
                ctx.planned.push(PlannedSpan {
                    parent: Some(idx),
                    service: child_service,
                    level: level + 1,
                    spine: spine && n == 0,
                    span_id,
                    status,
                });
                ctx.timings.push(timing);
                stack.push(ctx.planned.len() - 1);
            }
        }
    }

    /// Prefers a declared callee, then any other service, then itself when
    /// the catalog has a single entry.
    fn pick_callee<R: Rng + ?Sized>(&self, rng: &mut R, caller: usize) -> usize {
        if let Some(callee) = self.callees[caller].choose(rng) {
            return *callee;
        }
        let total = self.config.services.len();
        if total == 1 {
            return caller;
        }
        let pick = rng.gen_range(0..total - 1);
        if pick >= caller { pick + 1 } else { pick }
    }

    fn materialize(
        &self,
        rng: &mut StdRng,
        planned: &[PlannedSpan],
        timings: &[SpanTiming],
        idx: usize,
        trace_id: &TraceId,
    ) -> Span {
        let span = &planned[idx];
        let spec = &self.config.services[span.service];
        let operation = match spec.operations.choose(rng) {
            Some(op) => op.clone(),
            None => {
                let method = DEFAULT_METHODS.choose(rng).unwrap_or(&"GET");
                format!("{method} /{}", spec.id)
            }
        };

        let timing = timings[idx];
        let mut tags = BTreeMap::new();
        tags.insert("component".to_string(), spec.id.clone());
        tags.insert(
            "span.kind".to_string(),
            if span.parent.is_none() { "server" } else { "client" }.to_string(),
        );
        tags.insert("depth".to_string(), span.level.to_string());

        Span {
            trace_id: trace_id.clone(),
            span_id: span.span_id.clone(),
            parent_span_id: span.parent.map(|p| planned[p].span_id.clone()),
            service: spec.id.clone(),
            operation,
            start_ts: timing.start,
            end_ts: timing.end,
            duration_ms: timing.duration_ms(),
            status: span.status,
            tags,
            logs: Vec::new(),
        }
    }
}
