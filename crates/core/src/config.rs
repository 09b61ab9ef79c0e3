use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TracesimError};
use crate::time::{TimeRange, parse_duration_str};

/// Longest own work time or child start offset a span may be configured with.
pub const MAX_SPAN_DURATION_MS: u64 = 24 * 60 * 60 * 1000;
pub const MAX_DEPTH: usize = 64;
/// Seeded runs without an explicit `time_range` end their window here
/// (2026-01-01T00:00:00Z) so timestamps repeat across runs.
pub const SEEDED_WINDOW_END_SECS: i64 = 1_767_225_600;

/// One logical service in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceSpec {
    pub id: String,
    /// Services this one prefers to call when it spawns children.
    #[serde(default)]
    pub calls: Vec<String>,
    /// Operation labels; a generic label is derived from `id` when empty.
    #[serde(default)]
    pub operations: Vec<String>,
}

impl ServiceSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            calls: Vec::new(),
            operations: Vec::new(),
        }
    }

    pub fn calling<I, S>(mut self, callees: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.calls = callees.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_operations<I, S>(mut self, operations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.operations = operations.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratorConfig {
    pub services: Vec<ServiceSpec>,
    pub min_depth: usize,
    pub max_depth: usize,
    pub error_rate: f64,
    /// Share of failed spans reported as `Timeout` instead of `Error`.
    pub timeout_ratio: f64,
    pub duration_min_ms: u64,
    pub duration_max_ms: u64,
    pub branch_probability: f64,
    /// Upper bound on how long after its parent starts a child may start.
    pub max_start_offset_ms: u64,
    pub time_range: TimeRange,
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        let end = chrono::Utc::now();
        Self {
            services: default_catalog(),
            min_depth: 2,
            max_depth: 5,
            error_rate: 0.05,
            timeout_ratio: 0.2,
            duration_min_ms: 5,
            duration_max_ms: 250,
            branch_probability: 0.4,
            max_start_offset_ms: 20,
            time_range: TimeRange {
                start: end - chrono::Duration::hours(1),
                end,
            },
            seed: None,
        }
    }
}

fn default_catalog() -> Vec<ServiceSpec> {
    vec![
        ServiceSpec::new("api-gateway")
            .calling(["auth", "orders", "inventory"])
            .with_operations(["GET /v1/orders", "POST /v1/orders", "GET /v1/products"]),
        ServiceSpec::new("auth")
            .calling(["redis", "postgres"])
            .with_operations(["ValidateToken", "LoadSession"]),
        ServiceSpec::new("orders")
            .calling(["inventory", "payments", "postgres", "notifications"])
            .with_operations(["CreateOrder", "GetOrder", "ListOrders"]),
        ServiceSpec::new("inventory")
            .calling(["postgres", "redis"])
            .with_operations(["ReserveStock", "CheckStock"]),
        ServiceSpec::new("payments")
            .calling(["postgres"])
            .with_operations(["Charge", "Refund"]),
        ServiceSpec::new("notifications").with_operations(["SendEmail", "PublishEvent"]),
        ServiceSpec::new("postgres").with_operations(["SELECT", "INSERT", "UPDATE"]),
        ServiceSpec::new("redis").with_operations(["GET", "SET", "EXPIRE"]),
    ]
}

impl GeneratorConfig {
    pub fn load() -> Result<Self> {
        Self::load_with_seed(None)
    }

    /// Defaults, then the config file, then the environment, then `seed`.
    pub fn load_with_seed(seed: Option<u64>) -> Result<Self> {
        let mut cfg = Self::default();
        let mut range_pinned = false;
        let config_path = config_file_path();
        if let Some(file_overrides) = load_file_overrides(&config_path)? {
            range_pinned |= apply_overrides(&mut cfg, file_overrides, "config file")?;
        }
        let env_overrides = load_env_overrides()?;
        range_pinned |= apply_overrides(&mut cfg, env_overrides, "environment")?;
        cfg.finish(seed, range_pinned)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        Self::from_file_with_seed(path, None)
    }

    pub fn from_file_with_seed(path: &Path, seed: Option<u64>) -> Result<Self> {
        let mut cfg = Self::default();
        let overrides = load_file_overrides(path)?.ok_or_else(|| {
            TracesimError::Config(format!("config file not found: {}", path.display()))
        })?;
        let range_pinned = apply_overrides(&mut cfg, overrides, "config file")?;
        cfg.finish(seed, range_pinned)
    }

    /// Applies the seed layer and validates. A seeded config whose window was
    /// not given as an absolute `time_range` keeps its length but ends at
    /// [`SEEDED_WINDOW_END_SECS`].
    fn finish(mut self, seed: Option<u64>, range_pinned: bool) -> Result<Self> {
        if seed.is_some() {
            self.seed = seed;
        }
        if self.seed.is_some() && !range_pinned {
            self.time_range = seeded_window(self.time_range.end - self.time_range.start)?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.services.is_empty() {
            return Err(TracesimError::Config(
                "service catalog cannot be empty".to_string(),
            ));
        }

        let mut ids = HashSet::new();
        for svc in &self.services {
            if svc.id.trim().is_empty() {
                return Err(TracesimError::Config("service id cannot be empty".to_string()));
            }
            if !ids.insert(svc.id.as_str()) {
                return Err(TracesimError::Config(format!(
                    "duplicate service id: {}",
                    svc.id
                )));
            }
        }
        for svc in &self.services {
            if let Some(unknown) = svc.calls.iter().find(|c| !ids.contains(c.as_str())) {
                return Err(TracesimError::Config(format!(
                    "service {} calls unknown service {unknown}",
                    svc.id
                )));
            }
        }

        if self.min_depth < 1 {
            return Err(TracesimError::Config("min_depth must be at least 1".to_string()));
        }
        if self.max_depth > MAX_DEPTH {
            return Err(TracesimError::Config(format!(
                "max_depth {} exceeds the limit of {MAX_DEPTH}",
                self.max_depth
            )));
        }
        if self.min_depth > self.max_depth {
            return Err(TracesimError::Config(format!(
                "min_depth {} exceeds max_depth {}",
                self.min_depth, self.max_depth
            )));
        }
        check_probability("error_rate", self.error_rate)?;
        check_probability("timeout_ratio", self.timeout_ratio)?;
        check_probability("branch_probability", self.branch_probability)?;
        if self.duration_min_ms == 0 {
            return Err(TracesimError::Config(
                "duration_min_ms must be positive".to_string(),
            ));
        }
        if self.duration_min_ms > self.duration_max_ms {
            return Err(TracesimError::Config(format!(
                "duration_min_ms {} exceeds duration_max_ms {}",
                self.duration_min_ms, self.duration_max_ms
            )));
        }
        check_span_ms("duration_max_ms", self.duration_max_ms)?;
        check_span_ms("max_start_offset_ms", self.max_start_offset_ms)?;
        self.time_range.validate()
    }

    pub fn service(&self, id: &str) -> Option<&ServiceSpec> {
        self.services.iter().find(|s| s.id == id)
    }
}

fn check_span_ms(name: &str, value: u64) -> Result<()> {
    if value > MAX_SPAN_DURATION_MS {
        return Err(TracesimError::Config(format!(
            "{name} {value} exceeds the limit of {MAX_SPAN_DURATION_MS}"
        )));
    }
    Ok(())
}

fn seeded_window(span: chrono::Duration) -> Result<TimeRange> {
    let end = DateTime::<Utc>::from_timestamp(SEEDED_WINDOW_END_SECS, 0).ok_or_else(|| {
        TracesimError::Config(format!("bad seeded window end: {SEEDED_WINDOW_END_SECS}"))
    })?;
    TimeRange::ending_at(end, span)
}

fn check_probability(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(TracesimError::Config(format!(
            "{name} must be within [0, 1], got {value}"
        )));
    }
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
struct ConfigOverrides {
    services: Option<Vec<ServiceSpec>>,
    min_depth: Option<usize>,
    max_depth: Option<usize>,
    error_rate: Option<f64>,
    timeout_ratio: Option<f64>,
    duration_min_ms: Option<u64>,
    duration_max_ms: Option<u64>,
    branch_probability: Option<f64>,
    max_start_offset_ms: Option<u64>,
    window: Option<String>,
    time_range: Option<TimeRange>,
    seed: Option<u64>,
}

fn config_file_path() -> PathBuf {
    if let Ok(path) = env::var("TRACESIM_CONFIG") {
        return PathBuf::from(path);
    }

    let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let config_home = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(home).join(".config"));
    config_home.join("tracesim/config.toml")
}

fn load_file_overrides(path: &Path) -> Result<Option<ConfigOverrides>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| TracesimError::Io(format!("failed reading {}: {e}", path.display())))?;
    let parsed: ConfigOverrides = toml::from_str(&raw)
        .map_err(|e| TracesimError::Config(format!("failed parsing {}: {e}", path.display())))?;
    Ok(Some(parsed))
}

fn load_env_overrides() -> Result<ConfigOverrides> {
    Ok(ConfigOverrides {
        services: None,
        min_depth: env_parse("TRACESIM_MIN_DEPTH")?,
        max_depth: env_parse("TRACESIM_MAX_DEPTH")?,
        error_rate: env_parse("TRACESIM_ERROR_RATE")?,
        timeout_ratio: env_parse("TRACESIM_TIMEOUT_RATIO")?,
        duration_min_ms: env_parse("TRACESIM_DURATION_MIN_MS")?,
        duration_max_ms: env_parse("TRACESIM_DURATION_MAX_MS")?,
        branch_probability: env_parse("TRACESIM_BRANCH_PROBABILITY")?,
        max_start_offset_ms: None,
        window: env::var("TRACESIM_WINDOW").ok(),
        time_range: None,
        seed: env_parse("TRACESIM_SEED")?,
    })
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(v) => v
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| TracesimError::Config(format!("bad {key} in environment: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Returns true when `overrides` pinned an absolute `time_range`.
fn apply_overrides(
    cfg: &mut GeneratorConfig,
    overrides: ConfigOverrides,
    source: &str,
) -> Result<bool> {
    if let Some(v) = overrides.services {
        cfg.services = v;
    }
    if let Some(v) = overrides.min_depth {
        cfg.min_depth = v;
    }
    if let Some(v) = overrides.max_depth {
        cfg.max_depth = v;
    }
    if let Some(v) = overrides.error_rate {
        cfg.error_rate = v;
    }
    if let Some(v) = overrides.timeout_ratio {
        cfg.timeout_ratio = v;
    }
    if let Some(v) = overrides.duration_min_ms {
        cfg.duration_min_ms = v;
    }
    if let Some(v) = overrides.duration_max_ms {
        cfg.duration_max_ms = v;
    }
    if let Some(v) = overrides.branch_probability {
        cfg.branch_probability = v;
    }
    if let Some(v) = overrides.max_start_offset_ms {
        cfg.max_start_offset_ms = v;
    }
    let range_pinned = overrides.time_range.is_some() && overrides.window.is_none();
    if let Some(v) = overrides.time_range {
        cfg.time_range = v;
    }
    if let Some(v) = overrides.window {
        let span = parse_duration_str(&v).map_err(|e| {
            TracesimError::Config(format!("bad window in {source}: {e} (value={v})"))
        })?;
        cfg.time_range = TimeRange::last(span).map_err(|e| {
            TracesimError::Config(format!("bad window in {source}: {e} (value={v})"))
        })?;
    }
    if let Some(v) = overrides.seed {
        cfg.seed = Some(v);
    }
    Ok(range_pinned)
}
