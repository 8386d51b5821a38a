//! Event-driven metrics aggregation.
//!
//! Producers (the parser workers) push discrete [`MetricsEvent`]s into a
//! bounded queue; one collector loop drains it and is the sole writer of the
//! counters. A separate ticker samples the line counter into a two-slot
//! sliding window from which throughput is derived. Snapshots are computed
//! fresh on every query and never persisted.

use crossbeam_channel::Receiver;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

/// One discrete pipeline observation. Every consumed raw line produces
/// exactly one event — `LineHandled` on parse success, `ParseFailed` on any
/// classified parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricsEvent {
    LineHandled,
    ParseFailed,
}

/// Point-in-time view answered by the monitor API.
///
/// Field names on the wire match the legacy monitor contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    #[serde(rename = "handleLine")]
    pub lines_handled: u64,
    #[serde(rename = "tps")]
    pub throughput: f64,
    #[serde(rename = "readChanLen")]
    pub raw_queue_depth: usize,
    #[serde(rename = "writeChanLen")]
    pub parsed_queue_depth: usize,
    #[serde(rename = "runTime")]
    pub uptime: String,
    #[serde(rename = "errNum")]
    pub parse_errors: u64,
}

/// Owns the counters, the throughput window, and the prometheus registry.
///
/// Single-writer discipline: only the event loop mutates the counters, only
/// the ticker touches the window. Queue-depth gauges are set at snapshot
/// time from the instantaneous channel lengths.
pub struct MetricsCollector {
    registry: Registry,
    lines_handled: IntCounter,
    parse_errors: IntCounter,
    raw_queue_depth: IntGauge,
    parsed_queue_depth: IntGauge,
    started_at: Instant,
    tick_interval: Duration,
    window: Mutex<VecDeque<u64>>,
}

impl MetricsCollector {
    pub fn new(tick_interval: Duration) -> anyhow::Result<Self> {
        let registry = Registry::new();

        let lines_handled = IntCounter::new(
            "logpulse_lines_handled_total",
            "Raw lines parsed into records",
        )?;
        let parse_errors = IntCounter::new(
            "logpulse_parse_errors_total",
            "Raw lines dropped with a parse error",
        )?;
        let raw_queue_depth = IntGauge::new(
            "logpulse_raw_queue_depth",
            "Raw lines waiting for a parser worker",
        )?;
        let parsed_queue_depth = IntGauge::new(
            "logpulse_parsed_queue_depth",
            "Records waiting for a sink worker",
        )?;

        registry.register(Box::new(lines_handled.clone()))?;
        registry.register(Box::new(parse_errors.clone()))?;
        registry.register(Box::new(raw_queue_depth.clone()))?;
        registry.register(Box::new(parsed_queue_depth.clone()))?;

        Ok(Self {
            registry,
            lines_handled,
            parse_errors,
            raw_queue_depth,
            parsed_queue_depth,
            started_at: Instant::now(),
            tick_interval,
            window: Mutex::new(VecDeque::with_capacity(3)),
        })
    }

    /// Apply one event to the counters.
    pub fn apply(&self, event: MetricsEvent) {
        match event {
            MetricsEvent::LineHandled => self.lines_handled.inc(),
            MetricsEvent::ParseFailed => self.parse_errors.inc(),
        }
    }

    /// Drain the event queue until every sender is gone.
    /// Runs on a dedicated thread; the sole mutator of the counters.
    pub fn run_event_loop(&self, events: Receiver<MetricsEvent>) {
        while let Ok(event) = events.recv() {
            self.apply(event);
        }
        debug!("metrics event queue closed");
    }

    /// Sample the line counter into the sliding window. The window holds at
    /// most the two most recent samples; a third evicts the oldest.
    pub fn sample(&self) {
        let mut window = self.window.lock().unwrap_or_else(|e| e.into_inner());
        window.push_back(self.lines_handled.get());
        while window.len() > 2 {
            window.pop_front();
        }
    }

    /// Sample at the fixed tick interval until shutdown is requested.
    pub fn run_ticker(&self, shutdown: &AtomicBool) {
        // Sleep in short slices so a shutdown request is noticed well before
        // a full tick interval elapses.
        const SLICE: Duration = Duration::from_millis(25);
        loop {
            let mut slept = Duration::ZERO;
            while slept < self.tick_interval {
                if shutdown.load(Ordering::Relaxed) {
                    return;
                }
                let step = SLICE.min(self.tick_interval - slept);
                std::thread::sleep(step);
                slept += step;
            }
            if shutdown.load(Ordering::Relaxed) {
                return;
            }
            self.sample();
        }
    }

    /// Lines per second between the two most recent samples.
    /// Zero until two samples exist.
    pub fn throughput(&self) -> f64 {
        let window = self.window.lock().unwrap_or_else(|e| e.into_inner());
        if window.len() < 2 {
            return 0.0;
        }
        let delta = window[1].saturating_sub(window[0]);
        delta as f64 / self.tick_interval.as_secs_f64()
    }

    /// Compute a fresh snapshot from the counters and the queue depths at
    /// this instant.
    pub fn snapshot(&self, raw_queue_depth: usize, parsed_queue_depth: usize) -> MetricsSnapshot {
        self.raw_queue_depth.set(raw_queue_depth as i64);
        self.parsed_queue_depth.set(parsed_queue_depth as i64);

        MetricsSnapshot {
            lines_handled: self.lines_handled.get(),
            throughput: self.throughput(),
            raw_queue_depth,
            parsed_queue_depth,
            uptime: format_duration(self.started_at.elapsed()),
            parse_errors: self.parse_errors.get(),
        }
    }

    /// Render prometheus text exposition format.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap_or(());
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Compact human-readable duration: `4.2s`, `3m27.5s`, `1h2m3.0s`.
pub fn format_duration(d: Duration) -> String {
    let total = d.as_secs_f64();
    let hours = (total / 3600.0) as u64;
    let minutes = ((total % 3600.0) / 60.0) as u64;
    let seconds = total % 60.0;
    if hours > 0 {
        format!("{hours}h{minutes}m{seconds:.1}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds:.1}s")
    } else {
        format!("{seconds:.1}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use std::sync::Arc;

    fn collector() -> MetricsCollector {
        MetricsCollector::new(Duration::from_secs(1)).unwrap()
    }

    // ── Counters ─────────────────────────────────────────────────

    #[test]
    fn line_handled_increments_only_the_line_counter() {
        let mc = collector();
        mc.apply(MetricsEvent::LineHandled);
        mc.apply(MetricsEvent::LineHandled);
        let snap = mc.snapshot(0, 0);
        assert_eq!(snap.lines_handled, 2);
        assert_eq!(snap.parse_errors, 0);
    }

    #[test]
    fn parse_failed_increments_only_the_error_counter() {
        let mc = collector();
        mc.apply(MetricsEvent::ParseFailed);
        let snap = mc.snapshot(0, 0);
        assert_eq!(snap.parse_errors, 1);
        assert_eq!(snap.lines_handled, 0);
    }

    // ── Throughput window ────────────────────────────────────────

    #[test]
    fn throughput_is_zero_before_two_samples() {
        let mc = collector();
        assert_eq!(mc.throughput(), 0.0);
        mc.sample();
        assert_eq!(mc.throughput(), 0.0);
    }

    #[test]
    fn throughput_is_counter_delta_over_interval() {
        let mc = collector();
        for _ in 0..100 {
            mc.apply(MetricsEvent::LineHandled);
        }
        mc.sample();
        for _ in 0..45 {
            mc.apply(MetricsEvent::LineHandled);
        }
        mc.sample();
        assert_eq!(mc.throughput(), 45.0);
    }

    #[test]
    fn third_sample_evicts_the_oldest() {
        let mc = collector();
        mc.sample(); // 0
        for _ in 0..10 {
            mc.apply(MetricsEvent::LineHandled);
        }
        mc.sample(); // 10
        assert_eq!(mc.throughput(), 10.0);
        mc.sample(); // 10 — window is now [10, 10]
        assert_eq!(mc.throughput(), 0.0);
    }

    #[test]
    fn five_second_interval_divides_the_delta() {
        let mc = MetricsCollector::new(Duration::from_secs(5)).unwrap();
        mc.sample();
        for _ in 0..100 {
            mc.apply(MetricsEvent::LineHandled);
        }
        mc.sample();
        assert_eq!(mc.throughput(), 20.0);
    }

    // ── Event loop ───────────────────────────────────────────────

    #[test]
    fn event_loop_drains_until_senders_are_gone() {
        let mc = Arc::new(collector());
        let (tx, rx) = bounded(16);
        let loop_mc = Arc::clone(&mc);
        let handle = std::thread::spawn(move || loop_mc.run_event_loop(rx));

        for _ in 0..3 {
            tx.send(MetricsEvent::LineHandled).unwrap();
        }
        tx.send(MetricsEvent::ParseFailed).unwrap();
        drop(tx);
        handle.join().unwrap();

        let snap = mc.snapshot(0, 0);
        assert_eq!(snap.lines_handled, 3);
        assert_eq!(snap.parse_errors, 1);
    }

    #[test]
    fn ticker_exits_promptly_on_shutdown() {
        // Interval far longer than the test; exit must not wait out a tick.
        let mc = Arc::new(MetricsCollector::new(Duration::from_secs(60)).unwrap());
        let shutdown = Arc::new(AtomicBool::new(false));

        let ticker_mc = Arc::clone(&mc);
        let ticker_flag = Arc::clone(&shutdown);
        let started = Instant::now();
        let handle = std::thread::spawn(move || ticker_mc.run_ticker(&ticker_flag));

        std::thread::sleep(Duration::from_millis(50));
        shutdown.store(true, Ordering::Relaxed);
        handle.join().unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
    }

    // ── Snapshot wire format ─────────────────────────────────────

    #[test]
    fn snapshot_serializes_with_legacy_field_names() {
        let mc = collector();
        mc.apply(MetricsEvent::LineHandled);
        let json = serde_json::to_value(mc.snapshot(7, 3)).unwrap();
        assert_eq!(json["handleLine"], 1);
        assert_eq!(json["errNum"], 0);
        assert_eq!(json["readChanLen"], 7);
        assert_eq!(json["writeChanLen"], 3);
        assert_eq!(json["tps"], 0.0);
        assert!(json["runTime"].as_str().unwrap().ends_with('s'));
    }

    #[test]
    fn snapshot_reflects_queue_depths_passed_in() {
        let mc = collector();
        let snap = mc.snapshot(150, 42);
        assert_eq!(snap.raw_queue_depth, 150);
        assert_eq!(snap.parsed_queue_depth, 42);
    }

    // ── Prometheus render ────────────────────────────────────────

    #[test]
    fn render_contains_all_metric_names() {
        let mc = collector();
        mc.apply(MetricsEvent::LineHandled);
        mc.snapshot(5, 2);
        let text = mc.render();
        assert!(text.contains("logpulse_lines_handled_total"));
        assert!(text.contains("logpulse_parse_errors_total"));
        assert!(text.contains("logpulse_raw_queue_depth"));
        assert!(text.contains("logpulse_parsed_queue_depth"));
    }

    // ── format_duration ──────────────────────────────────────────

    #[test]
    fn format_duration_seconds_only() {
        assert_eq!(format_duration(Duration::from_millis(4200)), "4.2s");
    }

    #[test]
    fn format_duration_minutes_and_seconds() {
        assert_eq!(format_duration(Duration::from_millis(207_500)), "3m27.5s");
    }

    #[test]
    fn format_duration_hours() {
        assert_eq!(format_duration(Duration::from_secs(3723)), "1h2m3.0s");
    }
}
