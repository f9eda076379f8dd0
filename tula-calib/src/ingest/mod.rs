//! Accelerometer ingestion loop
//!
//! Reads the line-framed accelerometer stream, converts each valid record to
//! an attitude estimate and publishes it to [`SharedAttitude`].
//!
//! # Resilience
//!
//! - Malformed or partial records are dropped silently (best-effort framing)
//! - Read errors and timeouts never end the loop; it retries the next read
//! - A severed transport stalls publication, which readers observe as "no
//!   newer timestamp". Errors are logged with rate limiting.
//!
//! The loop runs until [`RunControl::cancel`] is called.

pub mod framing;

use crate::attitude::AttitudeEstimator;
use crate::core::state::{RunControl, SharedAttitude};
use crate::error::Error;
use crate::transport::Transport;
use framing::{LineFramer, parse_record};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Minimum interval between repeated read error logs
const ERROR_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// Back-off after an empty read
const IDLE_SLEEP: Duration = Duration::from_millis(1);

/// Back-off after a read error
const ERROR_SLEEP: Duration = Duration::from_millis(10);

/// Counters reported when the loop exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Complete lines seen
    pub lines: u64,
    /// Records published to the shared slot
    pub published: u64,
    /// Lines discarded as malformed
    pub discarded: u64,
    /// Transport read errors swallowed
    pub read_errors: u64,
}

/// Logs the first error immediately, then at most once per interval
struct ErrorThrottle {
    last_log: Option<Instant>,
    suppressed: u64,
}

impl ErrorThrottle {
    fn new() -> Self {
        Self {
            last_log: None,
            suppressed: 0,
        }
    }

    fn report(&mut self, err: &Error) {
        let due = self
            .last_log
            .is_none_or(|t| t.elapsed() >= ERROR_LOG_INTERVAL);
        if due {
            if self.suppressed > 0 {
                log::warn!(
                    "Accelerometer read error: {} ({} similar errors suppressed)",
                    err,
                    self.suppressed
                );
            } else {
                log::warn!("Accelerometer read error: {}", err);
            }
            self.last_log = Some(Instant::now());
            self.suppressed = 0;
        } else {
            self.suppressed += 1;
        }
    }
}

/// Background reader publishing attitude estimates
pub struct AccelReader<T: Transport> {
    transport: T,
    tag: String,
    estimator: AttitudeEstimator,
    shared: Arc<SharedAttitude>,
    run: Arc<RunControl>,
}

impl<T: Transport> AccelReader<T> {
    pub fn new(
        transport: T,
        tag: &str,
        estimator: AttitudeEstimator,
        shared: Arc<SharedAttitude>,
        run: Arc<RunControl>,
    ) -> Self {
        Self {
            transport,
            tag: tag.to_string(),
            estimator,
            shared,
            run,
        }
    }

    /// Read until the run is cancelled
    pub fn run(mut self) -> IngestStats {
        let mut framer = LineFramer::new();
        let mut buf = [0u8; 4096];
        let mut stats = IngestStats::default();
        let mut throttle = ErrorThrottle::new();

        log::info!("Accelerometer reader started (tag {})", self.tag);

        while self.run.is_running() {
            match self.transport.read(&mut buf) {
                Ok(0) => thread::sleep(IDLE_SLEEP),
                Ok(n) => {
                    let tag = self.tag.as_str();
                    let estimator = &self.estimator;
                    let shared = &self.shared;
                    framer.push(&buf[..n], |line| {
                        stats.lines += 1;
                        match parse_record(line, tag) {
                            Some(raw) => {
                                let (theta, psi) = estimator.estimate(raw);
                                shared.publish(theta, psi, raw);
                                stats.published += 1;
                            }
                            None => {
                                log::trace!("Discarded line: {:?}", line);
                                stats.discarded += 1;
                            }
                        }
                    });
                }
                Err(e) => {
                    stats.read_errors += 1;
                    throttle.report(&e);
                    thread::sleep(ERROR_SLEEP);
                }
            }
        }

        log::info!(
            "Accelerometer reader exiting ({} published, {} discarded, {} read errors)",
            stats.published,
            stats.discarded,
            stats.read_errors
        );
        stats
    }
}

impl<T: Transport + 'static> AccelReader<T> {
    /// Run the loop on a named thread
    pub fn spawn(self) -> crate::error::Result<JoinHandle<IngestStats>> {
        thread::Builder::new()
            .name("accel-reader".to_string())
            .spawn(move || self.run())
            .map_err(|e| Error::Other(format!("Failed to spawn accelerometer reader: {}", e)))
    }
}
