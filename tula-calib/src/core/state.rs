//! Shared state between the ingestion thread and the driving flow
//!
//! - [`SharedAttitude`]: single-slot holder of the newest [`AttitudeSample`].
//!   One writer (ingestion loop), any number of readers. The slot is swapped
//!   whole under a short mutex, so readers never see a partial sample.
//! - [`RunControl`]: run/pause/progress flags driven by the operator and
//!   polled by every loop.

use super::types::{AttitudeSample, Axis};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Upper bound on a single pause wait before flags are re-read
const PAUSE_POLL: Duration = Duration::from_millis(100);

/// Read access to the current angle of an axis
///
/// The controller depends on this instead of [`SharedAttitude`] directly so
/// tests can substitute a scripted feed.
pub trait AttitudeSource: Send + Sync {
    /// Current angle in degrees, `None` until the first sample arrives
    fn angle(&self, axis: Axis) -> Option<f64>;
}

/// Latest-wins attitude slot
#[derive(Debug, Default)]
pub struct SharedAttitude {
    slot: Mutex<Option<AttitudeSample>>,
    fresh: Condvar,
}

impl SharedAttitude {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the slot with a new sample stamped now
    ///
    /// Timestamps are forced strictly increasing so that a changed timestamp
    /// always identifies a new sample, even when two records land within the
    /// same microsecond.
    pub fn publish(&self, theta: f64, psi: f64, raw: [i32; 3]) -> AttitudeSample {
        let now = now_us();
        let sample = {
            let mut slot = self.slot.lock();
            let timestamp_us = match *slot {
                Some(prev) if now <= prev.timestamp_us => prev.timestamp_us + 1,
                _ => now,
            };
            let sample = AttitudeSample {
                theta,
                psi,
                raw,
                timestamp_us,
            };
            *slot = Some(sample);
            sample
        };
        self.fresh.notify_all();
        sample
    }

    /// Newest sample, if any
    #[inline]
    pub fn latest(&self) -> Option<AttitudeSample> {
        *self.slot.lock()
    }

    /// Wait up to `timeout` for a sample whose timestamp differs from `last_ts`
    ///
    /// Returns immediately when the slot already holds such a sample.
    /// Intermediate samples published while the caller was busy are not
    /// replayed; only the newest is returned.
    pub fn wait_newer(&self, last_ts: Option<u64>, timeout: Duration) -> Option<AttitudeSample> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.slot.lock();
        loop {
            if let Some(sample) = *slot
                && Some(sample.timestamp_us) != last_ts
            {
                return Some(sample);
            }
            if self.fresh.wait_until(&mut slot, deadline).timed_out() {
                return match *slot {
                    Some(sample) if Some(sample.timestamp_us) != last_ts => Some(sample),
                    _ => None,
                };
            }
        }
    }
}

impl AttitudeSource for SharedAttitude {
    fn angle(&self, axis: Axis) -> Option<f64> {
        self.latest().map(|s| s.angle(axis))
    }
}

/// Run, pause and progress flags
///
/// Passed by `Arc` to every component. `cancel()` propagates within one loop
/// iteration; `pause()` suspends motion until `resume()`.
#[derive(Debug)]
pub struct RunControl {
    running: AtomicBool,
    paused: AtomicBool,
    progress: AtomicU8,
    gate: Mutex<()>,
    wake: Condvar,
}

impl RunControl {
    /// New control in the running, unpaused state
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            paused: AtomicBool::new(false),
            progress: AtomicU8::new(0),
            gate: Mutex::new(()),
            wake: Condvar::new(),
        }
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn pause(&self) {
        if !self.paused.swap(true, Ordering::AcqRel) {
            log::info!("Pause requested");
        }
    }

    pub fn resume(&self) {
        let was_paused = {
            let _gate = self.gate.lock();
            self.paused.swap(false, Ordering::AcqRel)
        };
        if was_paused {
            log::info!("Resume requested");
        }
        self.wake.notify_all();
    }

    /// Stop the run; every loop exits at its next iteration
    pub fn cancel(&self) {
        {
            let _gate = self.gate.lock();
            self.running.store(false, Ordering::Release);
            self.paused.store(false, Ordering::Release);
        }
        self.wake.notify_all();
    }

    /// Cancel and reset progress
    pub fn emergency_stop(&self) {
        log::warn!("Emergency stop");
        self.cancel();
        self.set_progress(0);
    }

    #[inline]
    pub fn progress(&self) -> u8 {
        self.progress.load(Ordering::Relaxed)
    }

    pub fn set_progress(&self, percent: u8) {
        self.progress.store(percent.min(100), Ordering::Relaxed);
    }

    /// Block while paused; returns how long the call was suspended
    ///
    /// Returns `Duration::ZERO` without blocking when not paused. A cancel
    /// also ends the wait.
    pub fn wait_while_paused(&self) -> Duration {
        if !self.is_paused() {
            return Duration::ZERO;
        }
        let start = Instant::now();
        let mut gate = self.gate.lock();
        while self.is_paused() && self.is_running() {
            self.wake.wait_for(&mut gate, PAUSE_POLL);
        }
        start.elapsed()
    }
}

impl Default for RunControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Microseconds since the Unix epoch
pub fn now_us() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}
