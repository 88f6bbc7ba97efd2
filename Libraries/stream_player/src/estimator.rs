use std::sync::{Arc, Mutex};

use tracing::trace;

pub const SLOW_DECAY: f64 = 0.99;
pub const FAST_DECAY: f64 = 0.98;
/// Belief before any transfer has been observed, in bits per second.
pub const INITIAL_BANDWIDTH: f64 = 500_000.0;

/// Two exponentially weighted moving averages over observed transfer rates.
///
/// One instance is shared by every track of a session since all tracks go through the same
/// network path.
#[derive(Debug, Clone, PartialEq)]
pub struct BandwidthEstimator {
    slow: f64,
    fast: f64,
}

impl Default for BandwidthEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl BandwidthEstimator {
    pub fn new() -> Self {
        Self { slow: INITIAL_BANDWIDTH, fast: INITIAL_BANDWIDTH }
    }

    /**
     * Records `bytes_delta` bytes received over `millis_delta` milliseconds.
     * Samples without elapsed time carry no rate and are dropped.
     */
    pub fn observe(&mut self, bytes_delta: u64, millis_delta: f64) {
        if millis_delta.is_nan() || millis_delta <= 0.0 {
            return;
        }
        let bw = 8000.0 * bytes_delta as f64 / millis_delta;
        self.slow = SLOW_DECAY * self.slow + (1.0 - SLOW_DECAY) * bw;
        self.fast = FAST_DECAY * self.fast + (1.0 - FAST_DECAY) * bw;
        trace!("bandwidth sample {:.0} bps, slow {:.0}, fast {:.0}", bw, self.slow, self.fast);
    }

    pub fn slow(&self) -> f64 {
        self.slow
    }

    pub fn fast(&self) -> f64 {
        self.fast
    }

    /// The conservative estimate: the lower of both averages.
    pub fn estimate(&self) -> f64 {
        self.slow.min(self.fast)
    }
}

pub type SharedEstimator = Arc<Mutex<BandwidthEstimator>>;

pub fn shared_estimator() -> SharedEstimator {
    Arc::new(Mutex::new(BandwidthEstimator::new()))
}

/// Runs `f` on the estimator. A poisoned lock still holds valid averages, so it is recovered.
pub fn with_estimator<T>(shared: &SharedEstimator, f: impl FnOnce(&mut BandwidthEstimator) -> T) -> T {
    let mut guard = shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    f(&mut guard)
}

/// Turns cumulative progress reports of one transfer into estimator samples.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    last: Option<(u64, f64)>,   // (bytes loaded, timestamp ms) of the previous report
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a progress report. The first report of a transfer only records the starting point.
    pub fn report(&mut self, loaded: u64, timestamp_ms: f64, shared: &SharedEstimator) {
        if let Some((last_loaded, last_ms)) = self.last {
            if timestamp_ms != last_ms {
                let bytes = loaded.saturating_sub(last_loaded);
                with_estimator(shared, |e| e.observe(bytes, timestamp_ms - last_ms));
            }
        }
        self.last = Some((loaded, timestamp_ms));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converges_to_constant_rate() {
        let mut estimator = BandwidthEstimator::new();
        // 250 KB every 100 ms = 20 Mbit/s
        for _ in 0..1000 {
            estimator.observe(250_000, 100.0);
        }
        let rate = 20_000_000.0;
        assert!((estimator.slow() - rate).abs() / rate < 0.01);
        assert!((estimator.fast() - rate).abs() / rate < 0.01);
    }

    #[test]
    fn estimate_is_the_lower_average() {
        let mut estimator = BandwidthEstimator::new();
        estimator.observe(125_000, 1000.0);
        assert!(estimator.fast() > estimator.slow());
        assert_eq!(estimator.estimate(), estimator.slow());

        estimator.observe(0, 0.0);
        assert_eq!(estimator.estimate(), estimator.slow());
    }

    #[test]
    fn first_progress_report_is_skipped() {
        let shared = shared_estimator();
        let mut tracker = ProgressTracker::new();
        tracker.report(1_000_000, 10.0, &shared);
        assert_eq!(with_estimator(&shared, |e| e.slow()), INITIAL_BANDWIDTH);

        // same timestamp again: no rate
        tracker.report(1_100_000, 10.0, &shared);
        assert_eq!(with_estimator(&shared, |e| e.slow()), INITIAL_BANDWIDTH);

        tracker.report(1_200_000, 110.0, &shared);
        let expected = 0.99 * INITIAL_BANDWIDTH + 0.01 * 8000.0 * 100_000.0 / 100.0;
        assert!((with_estimator(&shared, |e| e.slow()) - expected).abs() < 1e-6);
    }
}
