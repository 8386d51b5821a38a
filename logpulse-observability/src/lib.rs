pub mod metrics;

pub use metrics::{MetricsCollector, MetricsEvent, MetricsSnapshot};
