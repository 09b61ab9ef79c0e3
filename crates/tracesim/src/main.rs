mod output;
mod telemetry;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracesim_analyze::{
    analyze_concurrency, analyze_concurrency_in_window, build_service_dependency_graph,
    calculate_depth, calculate_statistics, critical_path, detect_outlier_traces,
    detect_slow_spans, list_traces, service_latency, wall_clock_critical_path,
};
use tracesim_core::config::GeneratorConfig;
use tracesim_core::filter::{SortOrder, TimeWindow};
use tracesim_core::ids::TraceId;
use tracesim_core::model::{SpanStatus, Trace};
use tracesim_core::report::{
    ConcurrencyReport, CriticalPath, ServiceDependencyGraph, ServiceLatency, SlowSpanSet,
    TraceStatistics, TracesQuery,
};
use tracesim_core::time::parse_time_or_relative;
use tracesim_generate::TraceGenerator;
use tracing::info;

use crate::output::{
    print_analysis_human, print_inspection_human, print_trace_human, print_traces_human,
};
use crate::telemetry::init_cli_tracing;

#[derive(Parser, Debug)]
#[command(name = "tracesim")]
#[command(about = "Generate and analyze synthetic distributed traces")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true, help = "Generator config file (TOML)")]
    config: Option<PathBuf>,

    #[arg(long, global = true, help = "Seed for reproducible output")]
    seed: Option<u64>,

    #[arg(long, global = true, default_value_t = 10)]
    count: usize,
}

#[derive(Args, Debug)]
struct SourceArgs {
    #[arg(long, help = "Read traces from a JSON file instead of generating them")]
    input: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Generate traces")]
    Generate {
        #[arg(short, long, help = "Write traces as JSON to this file")]
        output: Option<PathBuf>,
    },
    #[command(about = "Batch statistics, service dependencies and latency")]
    Analyze {
        #[command(flatten)]
        source: SourceArgs,
    },
    #[command(about = "Per-trace slow spans, depth, critical paths and concurrency")]
    Inspect {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long, help = "Only inspect this trace")]
        trace: Option<String>,
        #[arg(long, help = "Slow span threshold in milliseconds")]
        threshold_ms: Option<f64>,
        #[arg(long)]
        since: Option<String>,
        #[arg(long)]
        until: Option<String>,
    },
    #[command(about = "List traces")]
    Traces {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long)]
        since: Option<String>,
        #[arg(long)]
        until: Option<String>,
        #[arg(long)]
        service: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: usize,
        #[arg(long, default_value = "start_asc")]
        sort: String,
    },
}

#[derive(Debug, Serialize)]
struct AnalysisReport {
    statistics: TraceStatistics,
    dependencies: ServiceDependencyGraph,
    service_latency: Vec<ServiceLatency>,
    outlier_traces: Vec<TraceId>,
}

#[derive(Debug, Serialize)]
struct TraceInspection {
    trace_id: TraceId,
    status: SpanStatus,
    span_count: usize,
    depth: usize,
    slow_spans: SlowSpanSet,
    critical_path: CriticalPath,
    wall_clock_path: CriticalPath,
    concurrency: ConcurrencyReport,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_cli_tracing();

    match cli.command {
        Commands::Generate { ref output } => {
            let traces = generate(&cli)?;
            if let Some(path) = output {
                write_traces(path, &traces)?;
                info!(path = %path.display(), traces = traces.len(), "wrote traces");
            } else if cli.json {
                println!("{}", serde_json::to_string_pretty(&traces)?);
            } else {
                for trace in &traces {
                    print_trace_human(trace);
                }
            }
            Ok(())
        }
        Commands::Analyze { ref source } => {
            let traces = load_or_generate(&cli, source)?;
            let report = AnalysisReport {
                statistics: calculate_statistics(&traces),
                dependencies: build_service_dependency_graph(&traces),
                service_latency: service_latency(&traces),
                outlier_traces: detect_outlier_traces(&traces),
            };
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_analysis_human(&report);
            }
            Ok(())
        }
        Commands::Inspect {
            ref source,
            ref trace,
            threshold_ms,
            ref since,
            ref until,
        } => {
            let traces = load_or_generate(&cli, source)?;
            let window = parse_window(since.clone(), until.clone())?;
            let windowed = since.is_some() || until.is_some();

            let wanted = trace.as_deref().map(TraceId::parse).transpose()?;
            let selected = traces
                .iter()
                .filter(|t| wanted.as_ref().is_none_or(|id| &t.trace_id == id))
                .collect::<Vec<_>>();
            if let Some(id) = &wanted
                && selected.is_empty()
            {
                anyhow::bail!("trace not found: {id}");
            }

            let inspections = selected
                .into_iter()
                .map(|t| TraceInspection {
                    trace_id: t.trace_id.clone(),
                    status: t.status,
                    span_count: t.span_count,
                    depth: calculate_depth(t),
                    slow_spans: detect_slow_spans(t, threshold_ms),
                    critical_path: critical_path(t),
                    wall_clock_path: wall_clock_critical_path(t),
                    concurrency: if windowed {
                        analyze_concurrency_in_window(t, &window)
                    } else {
                        analyze_concurrency(t)
                    },
                })
                .collect::<Vec<_>>();

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&inspections)?);
            } else {
                for inspection in &inspections {
                    print_inspection_human(inspection);
                }
            }
            Ok(())
        }
        Commands::Traces {
            ref source,
            ref since,
            ref until,
            ref service,
            ref status,
            limit,
            ref sort,
        } => {
            let traces = load_or_generate(&cli, source)?;
            let req = TracesQuery {
                service: service.clone(),
                status: status.as_deref().map(SpanStatus::from_str).transpose()?,
                window: parse_window(since.clone(), until.clone())?,
                sort: SortOrder::from_str(sort)?,
                limit,
            };
            let items = list_traces(&traces, &req);
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else {
                print_traces_human(&items);
            }
            Ok(())
        }
    }
}

fn generator_config(cli: &Cli) -> anyhow::Result<GeneratorConfig> {
    let cfg = match &cli.config {
        Some(path) => GeneratorConfig::from_file_with_seed(path, cli.seed)?,
        None => GeneratorConfig::load_with_seed(cli.seed)?,
    };
    Ok(cfg)
}

fn generate(cli: &Cli) -> anyhow::Result<Vec<Trace>> {
    let generator = TraceGenerator::new(generator_config(cli)?)?;
    Ok(generator.generate(cli.count))
}

fn load_or_generate(cli: &Cli, source: &SourceArgs) -> anyhow::Result<Vec<Trace>> {
    match &source.input {
        Some(path) => read_traces(path),
        None => generate(cli),
    }
}

fn read_traces(path: &Path) -> anyhow::Result<Vec<Trace>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read traces from {}", path.display()))?;
    let traces = serde_json::from_str::<Vec<Trace>>(&raw)
        .with_context(|| format!("parse traces in {}", path.display()))?
        .into_iter()
        .enumerate()
        .map(|(idx, trace)| {
            let trace_id = trace.trace_id;
            Trace::assemble(trace.spans).with_context(|| {
                format!("invalid trace {trace_id} (#{idx}) in {}", path.display())
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    info!(path = %path.display(), traces = traces.len(), "loaded traces");
    Ok(traces)
}

fn write_traces(path: &Path, traces: &[Trace]) -> anyhow::Result<()> {
    let body = serde_json::to_string_pretty(traces)?;
    std::fs::write(path, body).with_context(|| format!("write traces to {}", path.display()))
}

fn parse_window(since: Option<String>, until: Option<String>) -> anyhow::Result<TimeWindow> {
    let since = since.map(|v| parse_time_or_relative(&v)).transpose()?;
    let until = until.map(|v| parse_time_or_relative(&v)).transpose()?;
    Ok(TimeWindow { since, until })
}
