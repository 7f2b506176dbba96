//! Progress snapshots sent to the caller while fragments complete.
//!
//! Consumers can compute rate = bytes_done / elapsed_secs and
//! ETA = (total_bytes - bytes_done) / rate.

/// Snapshot of download progress (CLI-friendly).
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressStats {
    /// Bytes in completed fragments.
    pub bytes_done: u64,
    /// Total size in bytes, if known.
    pub total_bytes: Option<u64>,
    /// Seconds since the download started.
    pub elapsed_secs: f64,
    pub fragments_done: usize,
    pub fragment_count: usize,
}

impl ProgressStats {
    /// Bytes per second (0 if elapsed is 0).
    pub fn bytes_per_sec(&self) -> f64 {
        if self.elapsed_secs <= 0.0 {
            return 0.0;
        }
        self.bytes_done as f64 / self.elapsed_secs
    }

    /// Estimated seconds remaining (None if the size or the rate is unknown).
    pub fn eta_secs(&self) -> Option<f64> {
        let remaining = self.total_bytes?.saturating_sub(self.bytes_done);
        if remaining == 0 {
            return Some(0.0);
        }
        let rate = self.bytes_per_sec();
        if rate <= 0.0 {
            return None;
        }
        Some(remaining as f64 / rate)
    }

    /// Fraction complete in [0.0, 1.0], by fragment count when the size is unknown.
    pub fn fraction(&self) -> f64 {
        match self.total_bytes {
            Some(0) => 1.0,
            Some(total) => (self.bytes_done as f64 / total as f64).min(1.0),
            None if self.fragment_count == 0 => 1.0,
            None => self.fragments_done as f64 / self.fragment_count as f64,
        }
    }
}
