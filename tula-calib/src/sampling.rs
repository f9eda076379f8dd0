//! Sampling engine
//!
//! Two interchangeable strategies, both consuming only *fresh* samples (a
//! sample is fresh when its timestamp differs from the last one consumed):
//!
//! | Mode | Rows appended | x/y/z | norm |
//! |------|---------------|-------|------|
//! | [`SamplingMode::Raw`] | one per sample | raw counts | per sample |
//! | [`SamplingMode::Average`] | one per capture | mean counts | of the mean triplet |
//!
//! Waiting for a fresh sample is bounded by `poll_ms`, after which the run
//! flag is checked, so a capture is cancellable. While paused nothing is
//! consumed, and samples published before the resume are skipped.

use crate::attitude::AttitudeEstimator;
use crate::config::SamplingConfig;
use crate::core::state::{RunControl, SharedAttitude};
use crate::core::types::{AttitudeSample, DatasetRow};
use crate::sequence::dataset::Dataset;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Acquisition strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SamplingMode {
    /// One row per fresh sample
    Raw,
    /// One row holding the mean of N fresh samples
    Average,
}

/// Result of one capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOutcome {
    Complete,
    Cancelled,
}

/// Captures measurement rows from the shared attitude slot
pub struct Sampler {
    mode: SamplingMode,
    samples: usize,
    poll: Duration,
    estimator: AttitudeEstimator,
    attitude: Arc<SharedAttitude>,
    run: Arc<RunControl>,
}

impl Sampler {
    pub fn new(
        config: &SamplingConfig,
        estimator: AttitudeEstimator,
        attitude: Arc<SharedAttitude>,
        run: Arc<RunControl>,
    ) -> Self {
        Self {
            mode: config.mode,
            samples: config.samples,
            poll: config.poll_interval(),
            estimator,
            attitude,
            run,
        }
    }

    #[inline]
    pub fn mode(&self) -> SamplingMode {
        self.mode
    }

    /// Capture one measurement point at commanded theta `theta_cmd`
    pub fn capture(&self, theta_cmd: f64, dataset: &mut Dataset) -> SampleOutcome {
        match self.mode {
            SamplingMode::Raw => self.capture_raw(theta_cmd, dataset),
            SamplingMode::Average => self.capture_average(theta_cmd, dataset),
        }
    }

    fn capture_raw(&self, theta_cmd: f64, dataset: &mut Dataset) -> SampleOutcome {
        let mut last_ts = None;
        for _ in 0..self.samples {
            let Some(sample) = self.next_fresh(&mut last_ts) else {
                return SampleOutcome::Cancelled;
            };
            let counts = sample.raw.map(f64::from);
            dataset.push(DatasetRow {
                timestamp_us: sample.timestamp_us,
                theta_cmd,
                theta: sample.theta,
                psi: sample.psi,
                x: counts[0],
                y: counts[1],
                z: counts[2],
                norm: self.estimator.norm(counts),
            });
        }
        SampleOutcome::Complete
    }

    fn capture_average(&self, theta_cmd: f64, dataset: &mut Dataset) -> SampleOutcome {
        let mut last_ts = None;
        let mut sums = [0.0f64; 3];
        let mut last = None;

        for _ in 0..self.samples {
            let Some(sample) = self.next_fresh(&mut last_ts) else {
                return SampleOutcome::Cancelled;
            };
            for (sum, &count) in sums.iter_mut().zip(sample.raw.iter()) {
                *sum += f64::from(count);
            }
            last = Some(sample);
        }

        let Some(last) = last else {
            return SampleOutcome::Complete;
        };
        let n = self.samples as f64;
        let mean = sums.map(|s| s / n);
        dataset.push(DatasetRow {
            timestamp_us: last.timestamp_us,
            theta_cmd,
            theta: last.theta,
            psi: last.psi,
            x: mean[0],
            y: mean[1],
            z: mean[2],
            norm: self.estimator.norm(mean),
        });
        SampleOutcome::Complete
    }

    /// Block until a sample newer than `last_ts` arrives; `None` if cancelled
    fn next_fresh(&self, last_ts: &mut Option<u64>) -> Option<AttitudeSample> {
        loop {
            if !self.run.is_running() {
                log::warn!("Sampling cancelled");
                return None;
            }
            if !self.run.wait_while_paused().is_zero() {
                // Samples from before the pause are stale
                *last_ts = self.attitude.latest().map(|s| s.timestamp_us).or(*last_ts);
                continue;
            }
            if let Some(sample) = self.attitude.wait_newer(*last_ts, self.poll) {
                if self.run.is_paused() {
                    continue;
                }
                *last_ts = Some(sample.timestamp_us);
                return Some(sample);
            }
        }
    }
}
