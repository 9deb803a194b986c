//! Rolling transfer-speed estimate.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const DEFAULT_WINDOW: Duration = Duration::from_secs(5);
const DEFAULT_MAX_SAMPLES: usize = 100;

/// Bytes-per-second estimate over a bounded window of recent samples.
///
/// Reports 0.0 (and no ETA) until two samples span a measurable
/// interval.
pub struct SpeedCalculator {
    inner: Mutex<SpeedInner>,
}

struct SpeedInner {
    samples: VecDeque<(Instant, u64)>,
    window: Duration,
    max_samples: usize,
}

impl SpeedCalculator {
    pub fn new() -> Self {
        Self::with_window(DEFAULT_WINDOW, DEFAULT_MAX_SAMPLES)
    }

    /// A calculator with an explicit time window and sample cap.
    pub fn with_window(window: Duration, max_samples: usize) -> Self {
        Self {
            inner: Mutex::new(SpeedInner {
                samples: VecDeque::new(),
                window,
                max_samples: max_samples.max(2),
            }),
        }
    }

    /// Records `bytes` as transferred now.
    pub fn add_sample(&self, bytes: u64) {
        let mut s = self.inner.lock().unwrap();
        let now = Instant::now();
        s.samples.push_back((now, bytes));

        let cutoff = now - s.window;
        while let Some(&(taken, _)) = s.samples.front() {
            if taken < cutoff || s.samples.len() > s.max_samples {
                s.samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// Average speed across the current window, in bytes per second.
    pub fn bytes_per_second(&self) -> f64 {
        let s = self.inner.lock().unwrap();
        let (Some(&(first, _)), Some(&(last, _))) = (s.samples.front(), s.samples.back()) else {
            return 0.0;
        };
        let elapsed = last.duration_since(first);
        if elapsed.is_zero() {
            return 0.0;
        }
        let total: u64 = s.samples.iter().map(|&(_, bytes)| bytes).sum();
        total as f64 / elapsed.as_secs_f64()
    }

    /// Time left for `remaining_bytes` at the current speed, or `None`
    /// before a speed estimate exists.
    pub fn eta(&self, remaining_bytes: u64) -> Option<Duration> {
        let speed = self.bytes_per_second();
        (speed > 0.0).then(|| Duration::from_secs_f64(remaining_bytes as f64 / speed))
    }

    /// Forgets all samples, e.g. when a transfer restarts.
    pub fn reset(&self) {
        self.inner.lock().unwrap().samples.clear();
    }
}

impl Default for SpeedCalculator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_speed_before_two_spaced_samples() {
        let calc = SpeedCalculator::new();
        assert_eq!(calc.bytes_per_second(), 0.0);
        calc.add_sample(1024);
        assert_eq!(calc.bytes_per_second(), 0.0);
        assert!(calc.eta(4096).is_none());
    }

    #[test]
    fn speed_is_positive_after_spaced_samples() {
        let calc = SpeedCalculator::new();
        calc.add_sample(1024);
        std::thread::sleep(Duration::from_millis(20));
        calc.add_sample(1024);
        assert!(calc.bytes_per_second() > 0.0);
        assert!(calc.eta(4096).is_some());
    }

    #[test]
    fn reset_clears_samples() {
        let calc = SpeedCalculator::new();
        calc.add_sample(1024);
        std::thread::sleep(Duration::from_millis(10));
        calc.add_sample(1024);
        calc.reset();
        assert_eq!(calc.bytes_per_second(), 0.0);
    }

    #[test]
    fn sample_count_is_bounded() {
        let calc = SpeedCalculator::with_window(Duration::from_secs(60), 4);
        for _ in 0..10 {
            calc.add_sample(1);
        }
        assert!(calc.inner.lock().unwrap().samples.len() <= 4);
    }

    #[test]
    fn old_samples_fall_out_of_the_window() {
        let calc = SpeedCalculator::with_window(Duration::from_millis(10), 100);
        calc.add_sample(1_000_000);
        std::thread::sleep(Duration::from_millis(25));
        calc.add_sample(10);
        // Only the fresh sample survives, so no interval exists yet.
        assert_eq!(calc.bytes_per_second(), 0.0);
    }
}
