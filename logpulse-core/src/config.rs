use figment::{Figment, providers::{Env, Format, Yaml}};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level LogPulse configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PulseConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
}

/// Input file settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Path of the access log to follow.
    #[serde(default = "default_input_path")]
    pub path: String,
    /// Sleep between read attempts once end-of-file is reached.
    /// Tests inject a near-zero value to avoid slow runs.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Named time zone the log timestamps are re-anchored into.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

/// Worker-pool and queue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Capacity of the raw-line and parsed-record queues. Producers block
    /// once a queue is full — capacity exhaustion never drops a line.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Capacity of the metrics event queue.
    #[serde(default = "default_queue_capacity")]
    pub event_queue_capacity: usize,
    #[serde(default = "default_parser_workers")]
    pub parser_workers: usize,
    #[serde(default = "default_sink_workers")]
    pub sink_workers: usize,
}

/// Record sink settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// InfluxDB write endpoint, e.g. `http://localhost:8086/write?db=access`.
    /// Empty → records are printed to stdout.
    #[serde(default)]
    pub influx_dsn: String,
}

/// Monitor HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_monitor_addr")]
    pub addr: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Interval between throughput samples.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,
}

// ── Defaults ──────────────────────────────────────────────────

fn default_input_path() -> String { "./access.log".into() }
fn default_poll_interval() -> u64 { 500 }
fn default_timezone() -> String { "Asia/Shanghai".into() }
fn default_queue_capacity() -> usize { 200 }
fn default_parser_workers() -> usize { 2 }
fn default_sink_workers() -> usize { 2 }
fn default_monitor_addr() -> String { "0.0.0.0:9193".into() }
fn default_true() -> bool { true }
fn default_tick_interval() -> u64 { 1 }

// ── Impls ─────────────────────────────────────────────────────

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            input: InputConfig::default(),
            pipeline: PipelineConfig::default(),
            sink: SinkConfig::default(),
            monitor: MonitorConfig::default(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            path: default_input_path(),
            poll_interval_ms: default_poll_interval(),
            timezone: default_timezone(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            event_queue_capacity: default_queue_capacity(),
            parser_workers: default_parser_workers(),
            sink_workers: default_sink_workers(),
        }
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            influx_dsn: String::new(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            addr: default_monitor_addr(),
            enabled: true,
            tick_interval_secs: default_tick_interval(),
        }
    }
}

impl PulseConfig {
    /// Load configuration from YAML file + env overrides. Env keys use a
    /// double-underscore separator (`LOGPULSE__INPUT__POLL_INTERVAL_MS`) so
    /// field names containing underscores survive the split.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let config: PulseConfig = Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed("LOGPULSE__").split("__"))
            .extract()?;
        Ok(config)
    }
}
