//! Randomized inter-request delay.
//!
//! The pause between consecutive targets is the sole throttling mechanism:
//! it keeps the request rate low enough not to trip rate limits or IP
//! blocking on the target host. It is a politeness measure, not a
//! scheduling primitive.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Inclusive bounds for the uniform random sleep between requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    pub min: Duration,
    pub max: Duration,
}

impl DelayRange {
    /// Bounds in milliseconds. `max` is clamped up to `min` when inverted.
    pub fn from_millis(min_ms: u64, max_ms: u64) -> Self {
        Self {
            min: Duration::from_millis(min_ms),
            max: Duration::from_millis(max_ms.max(min_ms)),
        }
    }

    /// No delay at all (useful in tests).
    pub fn zero() -> Self {
        Self::from_millis(0, 0)
    }

    /// Draw a duration uniformly from `[min, max]`.
    pub fn sample(&self) -> Duration {
        let min_ms = self.min.as_millis() as u64;
        let max_ms = self.max.as_millis() as u64;
        if max_ms <= min_ms {
            return self.min;
        }
        let span = max_ms - min_ms + 1;
        Duration::from_millis(min_ms + next_rand() % span)
    }
}

impl Default for DelayRange {
    /// 200–500 ms, enough to avoid hammering a single host.
    fn default() -> Self {
        Self::from_millis(200, 500)
    }
}

// ---------------------------------------------------------------------------
// Deterministic jitter based on std — avoids pulling in the `rand` crate.
// xorshift seeded from the clock, mixed with a call counter so that
// back-to-back draws within one clock tick still differ.
// ---------------------------------------------------------------------------

static DRAWS: AtomicU64 = AtomicU64::new(0);

fn next_rand() -> u64 {
    let tick = DRAWS.fetch_add(1, Ordering::Relaxed);
    let mut x = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    x ^= tick.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    // xorshift64
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    x
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_stays_within_bounds() {
        let range = DelayRange::from_millis(200, 500);
        for _ in 0..1000 {
            let d = range.sample();
            assert!(d >= Duration::from_millis(200));
            assert!(d <= Duration::from_millis(500));
        }
    }

    #[test]
    fn distribution_is_not_degenerate() {
        let range = DelayRange::from_millis(0, 300);
        let samples: Vec<Duration> = (0..200).map(|_| range.sample()).collect();
        let first = samples[0];
        assert!(
            samples.iter().any(|&d| d != first),
            "200 draws from a 301ms span should not all be equal"
        );
    }

    #[test]
    fn degenerate_range_returns_min() {
        let range = DelayRange::from_millis(50, 50);
        assert_eq!(range.sample(), Duration::from_millis(50));
    }

    #[test]
    fn inverted_bounds_are_clamped() {
        let range = DelayRange::from_millis(300, 100);
        assert_eq!(range.min, Duration::from_millis(300));
        assert_eq!(range.max, Duration::from_millis(300));
    }

    #[test]
    fn zero_range_is_zero() {
        assert_eq!(DelayRange::zero().sample(), Duration::ZERO);
    }
}
