pub mod pipeline;
pub mod sink;
pub mod tailer;

pub use pipeline::{Pipeline, QueueDepths};
pub use sink::{Sink, StdoutSink, build_sink};
pub use tailer::Tailer;
