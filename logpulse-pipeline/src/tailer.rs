//! Follows a growing file, emitting each appended line.
//!
//! Polling design: after reaching end-of-file the tailer sleeps for the
//! configured interval and retries, so delivery latency is bounded below by
//! the poll interval. Content already present when `follow` starts is
//! skipped — the pipeline only observes future appends.

use crossbeam_channel::Sender;
use logpulse_core::PulseError;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info};

pub struct Tailer {
    path: PathBuf,
    poll_interval: Duration,
    shutdown: Arc<AtomicBool>,
}

impl Tailer {
    pub fn new(
        path: impl Into<PathBuf>,
        poll_interval: Duration,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            path: path.into(),
            poll_interval,
            shutdown,
        }
    }

    /// Follow the file from its current end, sending each complete line
    /// (trailing `\n` stripped) into the raw-line queue. Blocks on a full
    /// queue — admission control, never loss.
    ///
    /// Returns `Err` on open failure or any read error other than
    /// end-of-file; both are fatal to the pipeline. Returns `Ok(())` once
    /// shutdown is requested or every queue receiver is gone.
    pub fn follow(self, lines: Sender<Vec<u8>>) -> Result<(), PulseError> {
        let file = File::open(&self.path)?;
        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::End(0))?;

        info!(path = %self.path.display(), "Following log file from current end");

        let mut buf: Vec<u8> = Vec::new();
        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                debug!("shutdown requested; tailer exiting");
                return Ok(());
            }

            reader.read_until(b'\n', &mut buf)?;
            if buf.last().copied() == Some(b'\n') {
                buf.pop();
                if lines.send(std::mem::take(&mut buf)).is_err() {
                    debug!("raw-line queue closed; tailer exiting");
                    return Ok(());
                }
                continue;
            }

            // End of file. `buf` may hold the prefix of a line the writer
            // has not finished — keep it and wait for the rest.
            std::thread::sleep(self.poll_interval);
        }
    }
}
