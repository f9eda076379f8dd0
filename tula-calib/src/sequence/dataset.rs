//! Calibration dataset and its CSV artifact
//!
//! Rows are appended during the run and written once at the end, in
//! insertion order, under a fixed header.

use crate::core::types::DatasetRow;
use crate::error::Result;
use chrono::{DateTime, Local, TimeZone, Utc};
use std::path::{Path, PathBuf};

/// Column header of every artifact
pub const HEADER: [&str; 8] = [
    "time", "theta_cmd", "theta", "psi", "x_lsb", "y_lsb", "z_lsb", "norm",
];

/// Growing list of measurement rows
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    rows: Vec<DatasetRow>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(&mut self, row: DatasetRow) {
        self.rows.push(row);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[inline]
    pub fn rows(&self) -> &[DatasetRow] {
        &self.rows
    }

    /// Write header and rows to `path`
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut wtr = csv::Writer::from_path(path)?;
        wtr.write_record(HEADER)?;

        for row in &self.rows {
            wtr.write_record(&[
                format_timestamp(row.timestamp_us),
                row.theta_cmd.to_string(),
                row.theta.to_string(),
                row.psi.to_string(),
                row.x.to_string(),
                row.y.to_string(),
                row.z.to_string(),
                row.norm.to_string(),
            ])?;
        }

        wtr.flush()?;
        Ok(())
    }

    /// Write to a fresh `scan_<start time>.csv` in `dir`, returning its path
    pub fn persist(&self, dir: &Path, started: DateTime<Local>) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = artifact_path(dir, started);
        self.write_csv(&path)?;
        log::info!("Saved {} rows to {}", self.rows.len(), path.display());
        Ok(path)
    }
}

/// First non-existing `scan_YYYYmmdd_HHMMSS[_N].csv` in `dir`
pub fn artifact_path(dir: &Path, started: DateTime<Local>) -> PathBuf {
    let stem = format!("scan_{}", started.format("%Y%m%d_%H%M%S"));
    let mut path = dir.join(format!("{}.csv", stem));
    let mut n = 1;
    while path.exists() {
        path = dir.join(format!("{}_{}.csv", stem, n));
        n += 1;
    }
    path
}

/// ISO-8601 UTC with millisecond precision, e.g. `2024-05-01T12:00:00.123Z`
pub fn format_timestamp(timestamp_us: u64) -> String {
    let secs = (timestamp_us / 1_000_000) as i64;
    let nanos = ((timestamp_us % 1_000_000) * 1_000) as u32;
    match Utc.timestamp_opt(secs, nanos).single() {
        Some(t) => t.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        None => timestamp_us.to_string(),
    }
}
