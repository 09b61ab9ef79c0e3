pub mod generator;
pub mod outcome;
pub mod timing;

pub use generator::TraceGenerator;
pub use outcome::OutcomePolicy;
pub use timing::{SpanTiming, TimingModel};
