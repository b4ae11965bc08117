//! Speed and progress arithmetic shared by the download and upload probes.

use super::Throughput;
use crate::settings::{FallbackPolicy, FallbackRange};
use rand::Rng;
use std::time::Duration;

/// `bytes * 8 / (seconds * 1e6)`. `None` when no time has elapsed.
pub fn speed_mbps(bytes: u64, elapsed: Duration) -> Option<f64> {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return None;
    }
    Some((bytes as f64 * 8.0) / (secs * 1_000_000.0))
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// One live update from a throughput probe.
#[derive(Debug, Clone, PartialEq)]
pub struct ThroughputProgress {
    /// 1-based index of the trial the update belongs to.
    pub trial: usize,
    pub trials: usize,
    /// Bytes moved so far in this trial.
    pub bytes: u64,
    /// Instantaneous sample, or the final value on the closing update.
    pub speed_mbps: f64,
    /// Best over completed trials.
    pub best_mbps: f64,
    pub percent: f64,
}

/// Running maximum over speed samples.
#[derive(Debug, Clone, Copy, Default)]
pub struct BestOf {
    best: Option<f64>,
}

impl BestOf {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a sample and returns the best seen so far.
    pub fn observe(&mut self, mbps: f64) -> f64 {
        let mbps = mbps.max(0.0);
        let best = self.best.map_or(mbps, |best| best.max(mbps));
        self.best = Some(best);
        best
    }

    pub fn merge(&mut self, other: &BestOf) {
        if let Some(mbps) = other.best {
            self.observe(mbps);
        }
    }

    pub fn best(&self) -> Option<f64> {
        self.best
    }
}

/// Clamps reported progress to `[0, 100]` and never lets it go backwards.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressTracker {
    percent: f64,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self, percent: f64) -> f64 {
        if percent.is_finite() {
            self.percent = self.percent.max(percent.clamp(0.0, 100.0));
        }
        self.percent
    }

    pub fn complete(&mut self) -> f64 {
        self.percent = 100.0;
        self.percent
    }

    pub fn percent(&self) -> f64 {
        self.percent
    }
}

/// Progress of trial `index` (0-based) of `trials`, given the fraction of
/// that trial already transferred.
pub fn trial_percent(index: usize, trials: usize, fraction: f64) -> f64 {
    if trials == 0 {
        return 100.0;
    }
    (index as f64 + fraction.clamp(0.0, 1.0)) / trials as f64 * 100.0
}

/// Uniform draw from `[min, max)`, rounded to one decimal and still below `max`.
pub fn synthetic_mbps<R: Rng + ?Sized>(range: FallbackRange, rng: &mut R) -> f64 {
    let raw = rng.gen_range(range.min..range.max);
    let ceiling = (range.max - 0.1).max(range.min);
    round1(raw).min(ceiling).max(range.min)
}

/// Final phase value from the best sample, applying the fallback policy when
/// nothing was measured.
pub fn conclude(best: Option<f64>, policy: FallbackPolicy, range: FallbackRange) -> Throughput {
    match (best, policy) {
        (Some(mbps), _) => Throughput::Measured(round1(mbps)),
        (None, FallbackPolicy::Synthetic) => {
            Throughput::Synthetic(synthetic_mbps(range, &mut rand::thread_rng()))
        }
        (None, FallbackPolicy::Unmeasurable) => Throughput::Unmeasurable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn speed_formula_matches_megabits() {
        assert_eq!(speed_mbps(1_000_000, Duration::from_millis(500)), Some(16.0));
        assert_eq!(speed_mbps(500_000, Duration::from_secs(1)), Some(4.0));
        assert_eq!(speed_mbps(1_000, Duration::ZERO), None);
    }

    #[test]
    fn round1_keeps_one_decimal() {
        assert_eq!(round1(16.04), 16.0);
        assert_eq!(round1(16.06), 16.1);
        assert_eq!(round1(0.0), 0.0);
    }

    #[test]
    fn best_of_never_decreases() {
        let mut best = BestOf::new();
        assert_eq!(best.best(), None);
        assert_eq!(best.observe(12.0), 12.0);
        assert_eq!(best.observe(8.0), 12.0);
        assert_eq!(best.observe(30.5), 30.5);
        assert_eq!(best.observe(-1.0), 30.5);

        let mut phase = BestOf::new();
        phase.merge(&BestOf::new());
        assert_eq!(phase.best(), None);
        phase.merge(&best);
        assert_eq!(phase.best(), Some(30.5));
    }

    #[test]
    fn progress_is_monotonic_and_clamped() {
        let mut progress = ProgressTracker::new();
        assert_eq!(progress.advance(40.0), 40.0);
        assert_eq!(progress.advance(20.0), 40.0);
        assert_eq!(progress.advance(140.0), 100.0);
        assert_eq!(progress.advance(f64::NAN), 100.0);

        let mut progress = ProgressTracker::new();
        assert_eq!(progress.advance(-5.0), 0.0);
        assert_eq!(progress.complete(), 100.0);
    }

    #[test]
    fn trial_percent_scales_by_fraction() {
        assert_eq!(trial_percent(0, 4, 0.5), 12.5);
        assert_eq!(trial_percent(1, 2, 1.0), 100.0);
        assert_eq!(trial_percent(2, 4, 2.0), 75.0);
        assert_eq!(trial_percent(0, 0, 0.0), 100.0);
    }

    #[test]
    fn synthetic_values_stay_in_range() {
        let range = FallbackRange { min: 10.0, max: 25.0 };
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..10_000 {
            let mbps = synthetic_mbps(range, &mut rng);
            assert!((10.0..25.0).contains(&mbps), "{mbps} out of range");
            assert_eq!(round1(mbps), mbps);
        }
    }

    #[test]
    fn conclude_applies_policy_only_without_samples() {
        let range = FallbackRange { min: 10.0, max: 25.0 };
        assert_eq!(
            conclude(Some(16.04), FallbackPolicy::Synthetic, range),
            Throughput::Measured(16.0)
        );
        assert_eq!(
            conclude(None, FallbackPolicy::Unmeasurable, range),
            Throughput::Unmeasurable
        );
        match conclude(None, FallbackPolicy::Synthetic, range) {
            Throughput::Synthetic(mbps) => assert!((10.0..25.0).contains(&mbps)),
            other => panic!("expected synthetic value, got {other:?}"),
        }
    }
}
