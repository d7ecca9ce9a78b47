//! HdrHistogram-backed latency recording for one run.
//!
//! [`LatencyRecorder`] is single-owner: the executor's result callback feeds
//! it every outcome as it completes, so no locking is involved. Success and
//! failure latencies go into separate histograms so a burst of fast
//! rejections does not drag the success percentiles down.
//!
//! All values are in milliseconds.

use std::collections::BTreeMap;

use hdrhistogram::Histogram;

use crate::loadtest::report::Outcome;

/// Point-in-time copy of the recorder state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LatencySnapshot {
    /// Success latency P50.
    pub p50: u64,
    /// Success latency P95.
    pub p95: u64,
    /// Success latency P99.
    pub p99: u64,
    /// Slowest task of the run, successful or not.
    pub max: u64,
    /// Mean latency across every task.
    pub mean: f64,
    pub success_count: u64,
    pub error_count: u64,
    /// Failure counts keyed by error category, sorted by name.
    pub error_categories: BTreeMap<String, u64>,
}

impl LatencySnapshot {
    pub fn total(&self) -> u64 {
        self.success_count + self.error_count
    }

    /// Fraction of tasks that failed (0.0..=1.0).
    pub fn error_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.error_count as f64 / total as f64
    }
}

/// Accumulates per-task latencies and failure categories.
pub struct LatencyRecorder {
    success_histogram: Histogram<u64>,
    error_histogram: Histogram<u64>,
    error_categories: BTreeMap<String, u64>,
}

impl Default for LatencyRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl LatencyRecorder {
    /// Creates a recorder with 3 significant figures and auto-resizing histograms.
    pub fn new() -> Self {
        Self {
            success_histogram: new_histogram(),
            error_histogram: new_histogram(),
            error_categories: BTreeMap::new(),
        }
    }

    /// Records one finished task.
    ///
    /// Failures without a request error are counted under `"unknown"`.
    pub fn record<T: Outcome>(&mut self, outcome: &T) {
        let ms = u64::try_from(outcome.elapsed().as_millis()).unwrap_or(u64::MAX);
        if outcome.is_ok() {
            record_ms(&mut self.success_histogram, ms);
            return;
        }
        record_ms(&mut self.error_histogram, ms);
        let category = outcome
            .error()
            .map(|e| e.error_category())
            .unwrap_or("unknown");
        *self
            .error_categories
            .entry(category.to_owned())
            .or_insert(0) += 1;
    }

    pub fn success_count(&self) -> u64 {
        self.success_histogram.len()
    }

    pub fn error_count(&self) -> u64 {
        self.error_histogram.len()
    }

    pub fn snapshot(&self) -> LatencySnapshot {
        let success = &self.success_histogram;
        let errors = &self.error_histogram;
        let quantile = |q: f64| {
            if success.is_empty() {
                0
            } else {
                success.value_at_quantile(q)
            }
        };

        let total = success.len() + errors.len();
        let mean = if total == 0 {
            0.0
        } else {
            (success.mean() * success.len() as f64 + errors.mean() * errors.len() as f64)
                / total as f64
        };

        LatencySnapshot {
            p50: quantile(0.50),
            p95: quantile(0.95),
            p99: quantile(0.99),
            max: success.max().max(errors.max()),
            mean,
            success_count: success.len(),
            error_count: errors.len(),
            error_categories: self.error_categories.clone(),
        }
    }
}

/// Records `ms`, growing the histogram as needed. Only a value beyond what
/// the histogram can ever cover is clamped.
fn record_ms(histogram: &mut Histogram<u64>, ms: u64) {
    if histogram.record(ms).is_err() {
        histogram.saturating_record(ms);
    }
}

fn new_histogram() -> Histogram<u64> {
    let mut histogram = Histogram::<u64>::new(3).expect("3 sigfigs is always valid");
    histogram.auto(true);
    histogram
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loadtest::error::RequestError;
    use std::time::Duration;

    struct Sample {
        ms: u64,
        error: Option<RequestError>,
    }

    impl Outcome for Sample {
        fn is_ok(&self) -> bool {
            self.error.is_none()
        }

        fn error(&self) -> Option<&RequestError> {
            self.error.as_ref()
        }

        fn elapsed(&self) -> Duration {
            Duration::from_millis(self.ms)
        }
    }

    fn ok(ms: u64) -> Sample {
        Sample { ms, error: None }
    }

    fn failed(ms: u64, error: RequestError) -> Sample {
        Sample {
            ms,
            error: Some(error),
        }
    }

    #[test]
    fn test_empty_snapshot_is_zero() {
        let snap = LatencyRecorder::new().snapshot();
        assert_eq!(snap, LatencySnapshot::default());
        assert_eq!(snap.error_rate(), 0.0);
    }

    #[test]
    fn test_percentiles_from_successes_only() {
        let mut recorder = LatencyRecorder::new();
        for ms in 1..=100 {
            recorder.record(&ok(ms));
        }
        recorder.record(&failed(5_000, RequestError::Timeout));

        let snap = recorder.snapshot();
        assert_eq!(snap.p50, 50);
        assert!((94..=96).contains(&snap.p95), "p95 = {}", snap.p95);
        assert!((98..=100).contains(&snap.p99), "p99 = {}", snap.p99);
        assert!(snap.max >= 4_990, "max should include failures: {}", snap.max);
        assert_eq!(snap.success_count, 100);
        assert_eq!(snap.error_count, 1);
    }

    #[test]
    fn test_multi_second_latencies_keep_their_scale() {
        let mut recorder = LatencyRecorder::new();
        for _ in 0..10 {
            recorder.record(&ok(3_000));
        }
        recorder.record(&failed(30_000, RequestError::Timeout));

        let snap = recorder.snapshot();
        assert!((2_990..=3_010).contains(&snap.p50), "p50 = {}", snap.p50);
        assert!((2_990..=3_010).contains(&snap.p99), "p99 = {}", snap.p99);
        assert!((29_950..=30_050).contains(&snap.max), "max = {}", snap.max);
        // (10 * 3000 + 30000) / 11
        assert!((snap.mean - 5_454.5).abs() < 20.0, "mean = {}", snap.mean);
        assert_eq!(snap.success_count, 10);
        assert_eq!(snap.error_count, 1);
    }

    #[test]
    fn test_first_sample_beyond_initial_range_is_kept() {
        let mut recorder = LatencyRecorder::new();
        recorder.record(&failed(5_000, RequestError::Timeout));

        let snap = recorder.snapshot();
        assert!((4_990..=5_010).contains(&snap.max), "max = {}", snap.max);
        assert_eq!(snap.error_count, 1);
    }

    #[test]
    fn test_error_categories_counted() {
        let mut recorder = LatencyRecorder::new();
        recorder.record(&failed(10, RequestError::Timeout));
        recorder.record(&failed(10, RequestError::Timeout));
        recorder.record(&failed(
            10,
            RequestError::Http {
                status: 500,
                body: String::new(),
            },
        ));
        recorder.record(&failed(10, RequestError::Sentinel));
        recorder.record(&ok(10));

        let snap = recorder.snapshot();
        assert_eq!(snap.error_categories.get("timeout"), Some(&2));
        assert_eq!(snap.error_categories.get("http"), Some(&1));
        assert_eq!(snap.error_categories.get("sentinel"), Some(&1));
        assert_eq!(snap.total(), 5);
        assert!((snap.error_rate() - 0.8).abs() < f64::EPSILON);
    }
}
