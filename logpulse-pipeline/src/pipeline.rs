//! Four-stage pipeline wiring: tail → parse → sink, with one metrics event
//! per consumed line.
//!
//! The two bounded queues are the only coupling between stages. A full
//! queue blocks its producer and an empty queue blocks its consumers, so
//! under sustained overload the Tailer itself stalls — admission control,
//! never loss. Because several parser workers drain the same queue, record
//! order relative to the file is not preserved; that relaxation buys
//! throughput.

use crate::sink::Sink;
use crossbeam_channel::{Receiver, Sender, bounded};
use logpulse_core::config::PipelineConfig;
use logpulse_core::{LineParser, LogRecord};
use logpulse_observability::MetricsEvent;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

/// Receiver clones used only for instantaneous depth inspection by the
/// monitor API. They never consume elements.
#[derive(Clone)]
pub struct QueueDepths {
    raw: Receiver<Vec<u8>>,
    parsed: Receiver<LogRecord>,
}

impl QueueDepths {
    pub fn raw_depth(&self) -> usize {
        self.raw.len()
    }

    pub fn parsed_depth(&self) -> usize {
        self.parsed.len()
    }
}

/// Owns the raw-line and parsed-record queues and the two worker pools.
pub struct Pipeline {
    config: PipelineConfig,
    parser: LineParser,
    sink: Arc<dyn Sink>,
    events: Sender<MetricsEvent>,
    raw_tx: Sender<Vec<u8>>,
    raw_rx: Receiver<Vec<u8>>,
    parsed_tx: Sender<LogRecord>,
    parsed_rx: Receiver<LogRecord>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        parser: LineParser,
        sink: Arc<dyn Sink>,
        events: Sender<MetricsEvent>,
    ) -> Self {
        let (raw_tx, raw_rx) = bounded(config.queue_capacity);
        let (parsed_tx, parsed_rx) = bounded(config.queue_capacity);
        Self {
            config,
            parser,
            sink,
            events,
            raw_tx,
            raw_rx,
            parsed_tx,
            parsed_rx,
        }
    }

    /// Sender half of the raw-line queue — handed to the Tailer.
    pub fn raw_sender(&self) -> Sender<Vec<u8>> {
        self.raw_tx.clone()
    }

    pub fn depths(&self) -> QueueDepths {
        QueueDepths {
            raw: self.raw_rx.clone(),
            parsed: self.parsed_rx.clone(),
        }
    }

    /// Spawn the parser and sink worker pools.
    ///
    /// Consumes the pipeline so the channel halves it holds are released:
    /// shutdown then cascades in stage order — the Tailer drops the last
    /// raw sender, parser workers drain and exit dropping the parsed
    /// senders, sink workers drain and exit, and with them the last event
    /// senders are gone.
    pub fn spawn(self) -> Vec<JoinHandle<()>> {
        let mut handles =
            Vec::with_capacity(self.config.parser_workers + self.config.sink_workers);

        for worker_id in 0..self.config.parser_workers {
            let parser = self.parser.clone();
            let raw_rx = self.raw_rx.clone();
            let parsed_tx = self.parsed_tx.clone();
            let events = self.events.clone();
            let handle = std::thread::Builder::new()
                .name(format!("pulse-parse-{worker_id}"))
                .spawn(move || parse_loop(worker_id, parser, raw_rx, parsed_tx, events))
                .expect("Failed to spawn parser worker");
            handles.push(handle);
        }

        for worker_id in 0..self.config.sink_workers {
            let sink = Arc::clone(&self.sink);
            let parsed_rx = self.parsed_rx.clone();
            let handle = std::thread::Builder::new()
                .name(format!("pulse-sink-{worker_id}"))
                .spawn(move || sink_loop(worker_id, sink, parsed_rx))
                .expect("Failed to spawn sink worker");
            handles.push(handle);
        }

        info!(
            parser_workers = self.config.parser_workers,
            sink_workers = self.config.sink_workers,
            queue_capacity = self.config.queue_capacity,
            sink = self.sink.name(),
            "Pipeline workers spawned"
        );
        handles
    }
}

/// Parser worker: dequeue raw line, parse, forward on success. Exactly one
/// event per line — `LineHandled` or `ParseFailed`, never both. A bad line
/// is counted, logged, and permanently dropped.
fn parse_loop(
    worker_id: usize,
    parser: LineParser,
    raw_rx: Receiver<Vec<u8>>,
    parsed_tx: Sender<LogRecord>,
    events: Sender<MetricsEvent>,
) {
    while let Ok(line) = raw_rx.recv() {
        match parser.parse(&line) {
            Ok(record) => {
                if parsed_tx.send(record).is_err() {
                    break;
                }
                let _ = events.send(MetricsEvent::LineHandled);
            }
            Err(e) => {
                warn!(worker = worker_id, step = e.step(), error = %e, "Dropping unparseable line");
                let _ = events.send(MetricsEvent::ParseFailed);
            }
        }
    }
    debug!(worker = worker_id, "raw-line queue closed; parser worker exiting");
}

/// Sink worker: dequeue record, forward. Fire-and-forget.
fn sink_loop(worker_id: usize, sink: Arc<dyn Sink>, parsed_rx: Receiver<LogRecord>) {
    while let Ok(record) = parsed_rx.recv() {
        sink.consume(record);
    }
    debug!(worker = worker_id, "parsed queue closed; sink worker exiting");
}
