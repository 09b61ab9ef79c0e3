pub mod span;
pub mod trace;

pub use span::{Span, SpanLog, SpanStatus};
pub use trace::Trace;
