// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  LogPulse — streaming access-log pipeline
//
//  Data plane:  tail → parse → sink over bounded crossbeam queues
//  Monitor API: axum on a dedicated tokio thread
//  Config:      YAML + LOGPULSE_* env overrides
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use clap::Parser;
use crossbeam_channel::bounded;
use logpulse_core::config::PulseConfig;
use logpulse_core::parser::LineParser;
use logpulse_monitor::MonitorServer;
use logpulse_observability::{MetricsCollector, MetricsEvent};
use logpulse_pipeline::{Pipeline, Tailer, build_sink};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{error, info};

/// Global shutdown flag — set by the signal handler, shared with the
/// tailer and the ticker. Initialized before the handler is installed so
/// the handler itself only performs an atomic store.
static SHUTDOWN: OnceLock<Arc<AtomicBool>> = OnceLock::new();

fn shutdown_flag() -> Arc<AtomicBool> {
    Arc::clone(SHUTDOWN.get_or_init(|| Arc::new(AtomicBool::new(false))))
}

#[derive(Parser, Debug)]
#[command(name = "logpulse", version, about = "LogPulse — streaming access-log pipeline")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "logpulse.yaml")]
    config: PathBuf,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Access log to follow (overrides config)
    #[arg(long)]
    input: Option<String>,

    /// InfluxDB write endpoint (overrides config)
    #[arg(long)]
    sink_dsn: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ── Tracing ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .with_target(false)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "LogPulse starting");

    // ── Config ──
    let mut config = if cli.config.exists() {
        info!(path = %cli.config.display(), "Loading config file");
        PulseConfig::load(&cli.config)?
    } else {
        info!("No config file found, using defaults");
        PulseConfig::default()
    };
    if let Some(input) = cli.input {
        config.input.path = input;
    }
    if let Some(dsn) = cli.sink_dsn {
        config.sink.influx_dsn = dsn;
    }

    // ── Metrics collector + event queue ──
    let tick_interval = Duration::from_secs(config.monitor.tick_interval_secs);
    let collector = Arc::new(MetricsCollector::new(tick_interval)?);
    let (events_tx, events_rx) = bounded::<MetricsEvent>(config.pipeline.event_queue_capacity);

    // ── Pipeline ──
    let parser = LineParser::new(&config.input.timezone)?;
    let sink = build_sink(&config.sink)?;
    let pipeline = Pipeline::new(config.pipeline.clone(), parser, sink, events_tx);
    let depths = pipeline.depths();
    let raw_tx = pipeline.raw_sender();
    let mut handles = pipeline.spawn();

    // ── Tailer ──
    let tailer = Tailer::new(
        &config.input.path,
        Duration::from_millis(config.input.poll_interval_ms),
        shutdown_flag(),
    );
    let input_path = config.input.path.clone();
    handles.push(
        std::thread::Builder::new()
            .name("pulse-tail".to_string())
            .spawn(move || {
                if let Err(e) = tailer.follow(raw_tx) {
                    // No input means no pipeline — fatal by design.
                    error!(error = %e, path = %input_path, "Tailer failed");
                    std::process::exit(1);
                }
            })
            .expect("Failed to spawn tailer thread"),
    );

    // ── Metrics event loop + throughput ticker ──
    {
        let collector = Arc::clone(&collector);
        handles.push(
            std::thread::Builder::new()
                .name("pulse-metrics".to_string())
                .spawn(move || collector.run_event_loop(events_rx))
                .expect("Failed to spawn metrics thread"),
        );
    }
    {
        let collector = Arc::clone(&collector);
        let shutdown = shutdown_flag();
        handles.push(
            std::thread::Builder::new()
                .name("pulse-ticker".to_string())
                .spawn(move || collector.run_ticker(&shutdown))
                .expect("Failed to spawn ticker thread"),
        );
    }

    // ── Monitor API on a dedicated tokio thread ──
    let monitor_config = config.monitor.clone();
    if monitor_config.enabled {
        let addr = monitor_config.addr.clone();
        let server = MonitorServer::new(monitor_config, Arc::clone(&collector), depths);
        std::thread::Builder::new()
            .name("pulse-monitor".to_string())
            .spawn(move || {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("Failed to build tokio runtime for monitor");

                rt.block_on(async {
                    if let Err(e) = server.start().await {
                        tracing::error!(error = %e, "Monitor API failed");
                    }
                });
            })
            .expect("Failed to spawn monitor thread");

        info!(addr = %addr, "Monitor API started");
    }

    info!(
        input = %config.input.path,
        parser_workers = config.pipeline.parser_workers,
        sink_workers = config.pipeline.sink_workers,
        "LogPulse is ready — following the log"
    );

    // ── Graceful shutdown: wait for SIGTERM/SIGINT ──
    let shutdown = shutdown_flag();
    setup_signal_handler();

    while !shutdown.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(100));
    }

    info!("Shutdown signal received, draining pipeline...");

    // The tailer exits at its next poll and drops the last raw-queue
    // sender; parser workers drain and close the parsed queue; sink
    // workers drain; the event queue closes last and the collector exits.
    for handle in handles {
        let _ = handle.join();
    }

    info!("LogPulse stopped");
    Ok(())
}

fn setup_signal_handler() {
    // SIGTERM (docker stop) + SIGINT (Ctrl+C)
    for sig in [libc::SIGTERM, libc::SIGINT] {
        unsafe {
            libc::signal(sig, signal_handler as libc::sighandler_t);
        }
    }
}

extern "C" fn signal_handler(_sig: libc::c_int) {
    if let Some(flag) = SHUTDOWN.get() {
        flag.store(true, Ordering::Relaxed);
    }
}
