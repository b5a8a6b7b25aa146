use std::collections::VecDeque;

/// Sliding-window estimator of audio-vs-video timestamp skew for a turn.
/// Not thread-safe — only the turn task that owns a [`crate::Session`]
/// ever touches its tracker.
#[derive(Debug, Clone)]
pub struct DriftTracker {
    window: usize,
    samples: VecDeque<f64>,
}

impl DriftTracker {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            samples: VecDeque::with_capacity(window.max(1)),
        }
    }

    /// Append `video_ts - audio_ts` to the ring, evicting the oldest
    /// sample once the window is full, and return the new sample.
    pub fn update(&mut self, audio_ts_ms: f64, video_ts_ms: f64) -> f64 {
        let drift = video_ts_ms - audio_ts_ms;
        if self.samples.len() == self.window {
            self.samples.pop_front();
        }
        self.samples.push_back(drift);
        drift
    }

    pub fn mean_drift_ms(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    pub fn max_abs_drift_ms(&self) -> f64 {
        self.samples
            .iter()
            .map(|d| d.abs())
            .fold(0.0, f64::max)
    }

    pub fn is_within_budget(&self, budget_ms: f64) -> bool {
        self.mean_drift_ms().abs() <= budget_ms
    }

    pub fn reset(&mut self) {
        self.samples.clear();
    }
}

impl Default for DriftTracker {
    fn default() -> Self {
        Self::new(10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_is_zero_when_empty() {
        let tracker = DriftTracker::new(10);
        assert_eq!(tracker.mean_drift_ms(), 0.0);
    }

    #[test]
    fn mean_matches_average_of_samples() {
        let mut tracker = DriftTracker::new(10);
        tracker.update(0.0, 10.0); // +10
        tracker.update(0.0, 20.0); // +20
        tracker.update(0.0, 0.0); // 0
        assert!((tracker.mean_drift_ms() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn max_abs_picks_largest_magnitude() {
        let mut tracker = DriftTracker::new(10);
        tracker.update(0.0, 5.0);
        tracker.update(0.0, -40.0);
        tracker.update(0.0, 12.0);
        assert_eq!(tracker.max_abs_drift_ms(), 40.0);
    }

    #[test]
    fn reset_clears_ring() {
        let mut tracker = DriftTracker::new(10);
        tracker.update(0.0, 100.0);
        tracker.reset();
        assert_eq!(tracker.mean_drift_ms(), 0.0);
    }

    #[test]
    fn window_evicts_oldest_sample() {
        let mut tracker = DriftTracker::new(2);
        tracker.update(0.0, 100.0); // evicted
        tracker.update(0.0, 10.0);
        tracker.update(0.0, 20.0);
        assert!((tracker.mean_drift_ms() - 15.0).abs() < 1e-9);
    }

    #[test]
    fn within_budget_checks_abs_mean() {
        let mut tracker = DriftTracker::new(10);
        tracker.update(0.0, 50.0);
        tracker.update(0.0, 60.0);
        assert!(tracker.is_within_budget(80.0));
        assert!(!tracker.is_within_budget(40.0));
    }
}
