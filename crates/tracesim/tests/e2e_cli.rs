use std::path::Path;
use std::process::{Command, Output};

use serial_test::serial;
use tracesim_core::model::SpanStatus;

fn bin() -> &'static str {
    env!("CARGO_BIN_EXE_tracesim")
}

/// Runs the binary with no inherited tracesim settings.
fn run(home: &Path, args: &[&str]) -> Output {
    let mut cmd = Command::new(bin());
    for (key, _) in std::env::vars() {
        if key.starts_with("TRACESIM_") {
            cmd.env_remove(key);
        }
    }
    cmd.env("XDG_CONFIG_HOME", home)
        .env("RUST_LOG", "warn")
        .args(args)
        .output()
        .unwrap()
}

fn stdout(out: &Output) -> String {
    assert!(
        out.status.success(),
        "tracesim failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8(out.stdout.clone()).unwrap()
}

#[test]
fn generate_json_is_reproducible() {
    let home = tempfile::tempdir().unwrap();
    let args = ["generate", "--json", "--seed", "42", "--count", "5"];
    let first = stdout(&run(home.path(), &args));
    let second = stdout(&run(home.path(), &args));
    assert_eq!(first, second);

    let traces: serde_json::Value = serde_json::from_str(&first).unwrap();
    let traces = traces.as_array().unwrap();
    assert_eq!(traces.len(), 5);
    for trace in traces {
        let spans = trace["spans"].as_array().unwrap();
        assert_eq!(trace["span_count"].as_u64().unwrap() as usize, spans.len());
        assert!(spans[0]["parent_span_id"].is_null());
        let start = trace["start_ts"].as_str().unwrap();
        assert!(start.starts_with("2025-12-31T23:"), "unanchored start {start}");
    }
}

#[test]
fn generate_human_prints_span_tree() {
    let home = tempfile::tempdir().unwrap();
    let out = stdout(&run(home.path(), &["generate", "--seed", "1", "--count", "2"]));
    assert_eq!(out.lines().filter(|l| l.starts_with("TRACE ")).count(), 2);
    assert!(out.lines().any(|l| l.starts_with("  ")), "no child spans:\n{out}");
}

#[test]
fn analyze_reads_a_trace_file() {
    let home = tempfile::tempdir().unwrap();
    let file = home.path().join("traces.json");
    let traces = vec![
        testkit::call_pair(1, 20, SpanStatus::Success),
        testkit::call_pair(2, 40, SpanStatus::Error),
    ];
    std::fs::write(&file, serde_json::to_string(&traces).unwrap()).unwrap();

    let out = stdout(&run(
        home.path(),
        &["analyze", "--json", "--input", file.to_str().unwrap()],
    ));
    let report: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(report["statistics"]["total_traces"], 2);
    assert_eq!(report["statistics"]["error_count"], 1);
    let edges = report["dependencies"]["edges"].as_array().unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0]["source"], "a");
    assert_eq!(edges[0]["target"], "b");
    assert_eq!(edges[0]["call_count"], 2);
}

#[test]
fn analyze_rejects_malformed_trace_file() {
    let home = tempfile::tempdir().unwrap();
    let file = home.path().join("traces.json");
    let mut trace = serde_json::to_value(testkit::checkout_trace(1)).unwrap();
    trace["span_count"] = 99.into();
    trace["status"] = "SUCCESS".into();
    trace["spans"][2]["parent_span_id"] = serde_json::Value::Null;
    std::fs::write(&file, serde_json::to_string(&[trace]).unwrap()).unwrap();

    let out = run(
        home.path(),
        &["analyze", "--json", "--input", file.to_str().unwrap()],
    );
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("invalid trace"), "{stderr}");
}

#[test]
fn inspect_single_trace() {
    let home = tempfile::tempdir().unwrap();
    let file = home.path().join("traces.json");
    let traces = vec![testkit::checkout_trace(7), testkit::overlapping_siblings(8)];
    std::fs::write(&file, serde_json::to_string(&traces).unwrap()).unwrap();

    let id = format!("{:032x}", 8);
    let out = stdout(&run(
        home.path(),
        &["inspect", "--json", "--input", file.to_str().unwrap(), "--trace", &id],
    ));
    let report: serde_json::Value = serde_json::from_str(&out).unwrap();
    let report = report.as_array().unwrap();
    assert_eq!(report.len(), 1);
    assert_eq!(report[0]["depth"], 2);
    assert_eq!(report[0]["concurrency"]["max_concurrent_spans"], 3);

    let missing = run(
        home.path(),
        &["inspect", "--input", file.to_str().unwrap(), "--trace", &format!("{:032x}", 9)],
    );
    assert!(!missing.status.success());
}

#[test]
fn traces_lists_sorted_by_duration() {
    let home = tempfile::tempdir().unwrap();
    let out = stdout(&run(
        home.path(),
        &[
            "traces", "--json", "--seed", "3", "--count", "20", "--sort", "duration_desc",
            "--limit", "5",
        ],
    ));
    let items: serde_json::Value = serde_json::from_str(&out).unwrap();
    let durations = items
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["duration_ms"].as_i64().unwrap())
        .collect::<Vec<_>>();
    assert_eq!(durations.len(), 5);
    assert!(durations.windows(2).all(|w| w[0] >= w[1]));
}

#[test]
fn bad_sort_is_rejected() {
    let home = tempfile::tempdir().unwrap();
    let out = run(home.path(), &["traces", "--sort", "sideways"]);
    assert!(!out.status.success());
}

#[test]
#[serial]
fn config_file_drives_generation() {
    let home = tempfile::tempdir().unwrap();
    let cfg = home.path().join("tracesim.toml");
    std::fs::write(
        &cfg,
        r#"
min_depth = 2
max_depth = 2
error_rate = 1.0
timeout_ratio = 1.0
branch_probability = 0.0

[[services]]
id = "edge"
calls = ["store"]

[[services]]
id = "store"
"#,
    )
    .unwrap();

    let out = stdout(&run(
        home.path(),
        &["generate", "--json", "--count", "3", "--seed", "5", "--config", cfg.to_str().unwrap()],
    ));
    let traces: serde_json::Value = serde_json::from_str(&out).unwrap();
    for trace in traces.as_array().unwrap() {
        assert_eq!(trace["status"], "TIMEOUT");
        assert_eq!(trace["root_service"], "edge");
        assert_eq!(trace["span_count"], 2);
    }

    let bad = home.path().join("bad.toml");
    std::fs::write(&bad, "min_depth = 4\nmax_depth = 2\n").unwrap();
    let out = run(home.path(), &["generate", "--config", bad.to_str().unwrap()]);
    assert!(!out.status.success());
}
