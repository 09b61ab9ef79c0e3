use std::io::IsTerminal;

use chrono::SecondsFormat;
use owo_colors::OwoColorize;
use tracesim_analyze::SpanTree;
use tracesim_core::model::{SpanStatus, Trace};
use tracesim_core::report::{CriticalPath, TraceListItem};

use crate::{AnalysisReport, TraceInspection};

pub fn print_trace_human(trace: &Trace) {
    println!(
        "TRACE {} {} duration={}ms spans={} status={}",
        trace.trace_id,
        trace.start_ts.to_rfc3339_opts(SecondsFormat::Millis, true),
        trace.total_duration_ms,
        trace.span_count,
        status_label(trace.status)
    );
    print_span_tree(trace);
}

pub fn print_traces_human(items: &[TraceListItem]) {
    for item in items {
        println!(
            "trace={} start={} duration={}ms spans={} status={} root=\"{} {}\"",
            item.trace_id,
            item.start_ts.to_rfc3339_opts(SecondsFormat::Millis, true),
            item.duration_ms,
            item.span_count,
            status_label(item.status),
            item.root_service,
            item.root_operation
        );
    }
    println!("-- {} traces --", items.len());
}

pub fn print_analysis_human(report: &AnalysisReport) {
    let s = &report.statistics;
    println!(
        "traces={} success={} error={} timeout={} error_rate={:.3} timeout_rate={:.3}",
        s.total_traces,
        s.success_count,
        s.error_count,
        s.timeout_count,
        s.error_rate,
        s.timeout_rate
    );
    println!(
        "duration_ms min={} avg={:.1} p50={} p90={} p99={} max={}",
        s.min_duration_ms,
        s.avg_duration_ms,
        s.p50_duration_ms,
        s.p90_duration_ms,
        s.p99_duration_ms,
        s.max_duration_ms
    );
    println!(
        "spans avg={:.1} p50={} p90={} p99={}",
        s.avg_span_count, s.p50_span_count, s.p90_span_count, s.p99_span_count
    );

    println!("-- dependencies --");
    for edge in &report.dependencies.edges {
        println!(
            "{} -> {} calls={} errors={} avg={:.1}ms",
            edge.source, edge.target, edge.call_count, edge.error_count, edge.avg_latency_ms
        );
    }

    println!("-- service latency --");
    for svc in &report.service_latency {
        println!(
            "{} spans={} errors={} p50={}ms p99={}ms",
            svc.service, svc.latency.count, svc.error_count, svc.latency.p50, svc.latency.p99
        );
    }

    if !report.outlier_traces.is_empty() {
        println!("-- outlier traces --");
        for id in &report.outlier_traces {
            println!("{id}");
        }
    }
}

pub fn print_inspection_human(v: &TraceInspection) {
    println!(
        "TRACE {} status={} spans={} depth={}",
        v.trace_id,
        status_label(v.status),
        v.span_count,
        v.depth
    );
    println!(
        "concurrency max={} avg={:.2} parallelization={:.2}",
        v.concurrency.max_concurrent_spans,
        v.concurrency.avg_concurrent_spans,
        v.concurrency.parallelization_ratio
    );
    print_path("critical_path", &v.critical_path);
    print_path("wall_clock_path", &v.wall_clock_path);
    println!(
        "slow_spans threshold={:.1}ms count={}",
        v.slow_spans.threshold_ms,
        v.slow_spans.spans.len()
    );
    for span in &v.slow_spans.spans {
        println!("  {} {} ({}ms)", span.service, span.operation, span.duration_ms);
    }
}

fn print_path(label: &str, path: &CriticalPath) {
    let hops = path
        .spans
        .iter()
        .map(|s| s.service.as_str())
        .collect::<Vec<_>>()
        .join(" > ");
    println!("{label}={}ms {hops}", path.total_duration_ms);
}

fn status_label(status: SpanStatus) -> String {
    if !std::io::stdout().is_terminal() {
        return status.to_string();
    }
    match status {
        SpanStatus::Success => status.green().to_string(),
        SpanStatus::Error => status.red().to_string(),
        SpanStatus::Timeout => status.yellow().to_string(),
        SpanStatus::Cancelled => status.bright_black().to_string(),
    }
}

fn print_span_tree(trace: &Trace) {
    for line in render_span_tree(trace) {
        println!("{line}");
    }
}

/// One indented line per span, parents before children in span order.
fn render_span_tree(trace: &Trace) -> Vec<String> {
    let tree = SpanTree::new(trace);
    let mut lines = Vec::with_capacity(trace.spans.len());
    let mut stack = tree.root_index().map(|root| (root, 0)).into_iter().collect::<Vec<_>>();
    while let Some((idx, depth)) = stack.pop() {
        let span = tree.span(idx);
        lines.push(format!(
            "{}{} {} ({}ms) {}",
            "  ".repeat(depth),
            span.service,
            span.operation,
            span.duration_ms,
            status_label(span.status)
        ));
        stack.extend(tree.children(idx).iter().rev().map(|&child| (child, depth + 1)));
    }
    lines
}
