//! Record sinks.
//!
//! Sink forwarding is fire-and-forget from the pipeline's perspective: a
//! sink failure is logged by the sink itself and never propagates into the
//! worker loops.

use logpulse_core::config::SinkConfig;
use logpulse_core::{LogRecord, PulseError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Destination for parsed records.
pub trait Sink: Send + Sync {
    fn consume(&self, record: LogRecord);

    /// Short name for startup logging.
    fn name(&self) -> &'static str;
}

/// Select a sink from config: an InfluxDB DSN when set, stdout otherwise.
pub fn build_sink(config: &SinkConfig) -> Result<Arc<dyn Sink>, PulseError> {
    if config.influx_dsn.is_empty() {
        info!("No sink DSN configured — records go to stdout");
        return Ok(Arc::new(StdoutSink));
    }
    let sink = InfluxSink::new(&config.influx_dsn)?;
    info!(dsn = %config.influx_dsn, "Using InfluxDB sink");
    Ok(Arc::new(sink))
}

// ── Stdout ───────────────────────────────────────────────────────

/// Prints each record as one JSON line.
pub struct StdoutSink;

impl Sink for StdoutSink {
    fn consume(&self, record: LogRecord) {
        match serde_json::to_string(&record) {
            Ok(line) => println!("{line}"),
            Err(e) => error!(error = %e, "Failed to serialize record"),
        }
    }

    fn name(&self) -> &'static str {
        "stdout"
    }
}

// ── InfluxDB ─────────────────────────────────────────────────────

/// Pushes each record to an InfluxDB write endpoint as line protocol.
pub struct InfluxSink {
    client: reqwest::blocking::Client,
    write_url: String,
}

impl InfluxSink {
    /// `dsn` is the full write URL, e.g. `http://localhost:8086/write?db=access`.
    pub fn new(dsn: &str) -> Result<Self, PulseError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| PulseError::Sink(e.to_string()))?;
        Ok(Self {
            client,
            write_url: dsn.to_string(),
        })
    }
}

impl Sink for InfluxSink {
    fn consume(&self, record: LogRecord) {
        let body = line_protocol(&record);
        match self.client.post(&self.write_url).body(body).send() {
            Ok(resp) if resp.status().is_success() => {
                debug!(path = %record.path, "Record written to InfluxDB");
            }
            Ok(resp) => {
                error!(status = %resp.status(), "InfluxDB write rejected");
            }
            Err(e) => {
                error!(error = %e, "InfluxDB connection error");
            }
        }
    }

    fn name(&self) -> &'static str {
        "influxdb"
    }
}

/// Render one record as InfluxDB line protocol, nanosecond timestamp.
pub fn line_protocol(record: &LogRecord) -> String {
    format!(
        "access_log,method={},scheme={},status={},path={} \
         bytes_sent={}i,upstream_time={},request_time={} {}",
        escape_tag(&record.method),
        escape_tag(&record.scheme),
        escape_tag(&record.status),
        escape_tag(&record.path),
        record.bytes_sent,
        record.upstream_time,
        record.request_time,
        record.timestamp.timestamp_nanos_opt().unwrap_or_default(),
    )
}

/// Escape the characters InfluxDB treats specially in tag values.
fn escape_tag(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, ',' | ' ' | '=') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
