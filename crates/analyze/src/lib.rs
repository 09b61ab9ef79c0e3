pub mod concurrency;
pub mod graph;
pub mod path;
pub mod query;
pub mod slow;
pub mod summary;
pub mod tree;

pub use concurrency::{analyze_concurrency, analyze_concurrency_in_window};
pub use graph::build_service_dependency_graph;
pub use path::{calculate_depth, critical_path, wall_clock_critical_path};
pub use query::list_traces;
pub use slow::detect_slow_spans;
pub use summary::{calculate_statistics, detect_outlier_traces, service_latency};
pub use tree::{SpanTree, subtree};
