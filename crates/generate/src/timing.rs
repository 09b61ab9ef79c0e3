use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use tracesim_core::config::GeneratorConfig;

/// Interval bookkeeping for one span while its trace is being built.
///
/// `work_ms` is the span's own work; `end` starts at `start + work_ms` and
/// only grows when [`settle`] folds child intervals into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanTiming {
    pub start: DateTime<Utc>,
    pub work_ms: i64,
    pub end: DateTime<Utc>,
}

impl SpanTiming {
    pub fn new(start: DateTime<Utc>, work_ms: i64) -> Self {
        Self {
            start,
            work_ms,
            end: start + Duration::milliseconds(work_ms),
        }
    }

    pub fn duration_ms(&self) -> i64 {
        (self.end - self.start).num_milliseconds()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingModel {
    duration_min_ms: u64,
    duration_max_ms: u64,
    max_start_offset_ms: u64,
}

impl TimingModel {
    pub fn new(duration_min_ms: u64, duration_max_ms: u64, max_start_offset_ms: u64) -> Self {
        Self {
            duration_min_ms,
            duration_max_ms: duration_max_ms.max(duration_min_ms),
            max_start_offset_ms,
        }
    }

    pub fn from_config(cfg: &GeneratorConfig) -> Self {
        Self::new(
            cfg.duration_min_ms,
            cfg.duration_max_ms,
            cfg.max_start_offset_ms,
        )
    }

    /// Own work time, uniform over the configured bounds.
    pub fn sample_work_ms<R: Rng + ?Sized>(&self, rng: &mut R) -> i64 {
        rng.gen_range(self.duration_min_ms..=self.duration_max_ms) as i64
    }

    pub fn root<R: Rng + ?Sized>(&self, rng: &mut R, start: DateTime<Utc>) -> SpanTiming {
        SpanTiming::new(start, self.sample_work_ms(rng))
    }

    /// A child starts no earlier than its parent and no later than the end
    /// of the parent's own work.
    pub fn child<R: Rng + ?Sized>(&self, rng: &mut R, parent: &SpanTiming) -> SpanTiming {
        let bound = self.max_start_offset_ms.min(parent.work_ms.max(0) as u64);
        let offset = rng.gen_range(0..=bound) as i64;
        SpanTiming::new(
            parent.start + Duration::milliseconds(offset),
            self.sample_work_ms(rng),
        )
    }
}

/// Extends every span's end to cover its latest child, which establishes
/// `child.end <= parent.end` for the whole tree.
///
/// `parents[i]` must be smaller than `i`, i.e. spans are stored
/// parent-before-child.
pub fn settle(timings: &mut [SpanTiming], parents: &[Option<usize>]) {
    debug_assert_eq!(timings.len(), parents.len());
    for idx in (0..timings.len()).rev() {
        let Some(parent) = parents[idx] else {
            continue;
        };
        debug_assert!(parent < idx, "span {idx} stored before its parent {parent}");
        if timings[idx].end > timings[parent].end {
            timings[parent].end = timings[idx].end;
        }
    }
}
