//! Sliding-window event counter
//!
//! Stores event counts with timestamps and evicts entries older than the
//! window on every access. Used for throughput display, the autoscale
//! trigger and the dead-session signal.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Events recorded at a single instant
#[derive(Debug, Clone, Copy)]
struct Bucket {
    at: Instant,
    count: u64,
}

/// Thread-safe counter over a trailing time window
///
/// `rate()` returns the number of events whose timestamp falls within
/// `[now - window, now]`. Increments and reads may come from any task.
#[derive(Debug)]
pub struct RateCounter {
    window: Duration,
    /// Buckets ordered by timestamp (oldest first)
    buckets: Mutex<VecDeque<Bucket>>,
}

impl RateCounter {
    /// Create a counter over the given window
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            buckets: Mutex::new(VecDeque::with_capacity(64)),
        }
    }

    /// One-second window
    pub fn per_second() -> Self {
        Self::new(Duration::from_secs(1))
    }

    /// One-minute window
    pub fn per_minute() -> Self {
        Self::new(Duration::from_secs(60))
    }

    /// Window duration
    #[inline]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record `n` events now
    #[inline]
    pub fn incr(&self, n: u64) {
        self.incr_at(n, Instant::now());
    }

    /// Record `n` events at `at`
    ///
    /// Timestamps are expected to be non-decreasing across calls.
    pub fn incr_at(&self, n: u64, at: Instant) {
        if n == 0 {
            return;
        }

        let mut buckets = self.buckets.lock();
        Self::evict_old(&mut buckets, self.window, at);

        match buckets.back_mut() {
            Some(last) if last.at == at => last.count += n,
            _ => buckets.push_back(Bucket { at, count: n }),
        }
    }

    /// Number of events within the trailing window
    #[inline]
    pub fn rate(&self) -> u64 {
        self.rate_at(Instant::now())
    }

    /// Number of events within `[now - window, now]`
    pub fn rate_at(&self, now: Instant) -> u64 {
        let mut buckets = self.buckets.lock();
        Self::evict_old(&mut buckets, self.window, now);

        buckets
            .iter()
            .take_while(|b| b.at <= now)
            .map(|b| b.count)
            .sum()
    }

    fn evict_old(buckets: &mut VecDeque<Bucket>, window: Duration, now: Instant) {
        // Before the monotonic clock has advanced a full window nothing can be old
        let Some(cutoff) = now.checked_sub(window) else {
            return;
        };

        while let Some(front) = buckets.front() {
            if front.at < cutoff {
                buckets.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_empty_counter() {
        let counter = RateCounter::per_second();
        assert_eq!(counter.rate(), 0);
        assert_eq!(counter.window(), Duration::from_secs(1));
    }

    #[test]
    fn test_incr_and_rate() {
        let counter = RateCounter::per_minute();
        counter.incr(1);
        counter.incr(4);
        assert_eq!(counter.rate(), 5);
    }

    #[test]
    fn test_incr_zero_is_noop() {
        let counter = RateCounter::per_minute();
        counter.incr(0);
        assert_eq!(counter.rate(), 0);
    }

    #[test]
    fn test_eviction_after_window() {
        let counter = RateCounter::new(Duration::from_millis(50));
        counter.incr(3);

        thread::sleep(Duration::from_millis(80));

        counter.incr(1);
        assert_eq!(counter.rate(), 1);
    }

    #[test]
    fn test_window_edges() {
        let counter = RateCounter::new(Duration::from_secs(10));
        let base = Instant::now();

        counter.incr_at(1, base);
        counter.incr_at(2, base + Duration::from_secs(5));

        // Lower bound is inclusive
        assert_eq!(counter.rate_at(base + Duration::from_secs(10)), 3);
        // Events in the future of `now` are not counted
        assert_eq!(counter.rate_at(base + Duration::from_secs(1)), 1);
    }

    #[test]
    fn test_concurrent_increments() {
        let counter = Arc::new(RateCounter::per_minute());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    for _ in 0..250 {
                        counter.incr(1);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(counter.rate(), 1000);
    }

    proptest! {
        #[test]
        fn prop_rate_counts_events_inside_window(
            mut offsets in proptest::collection::vec(0u64..5_000, 0..64),
            extra in 0u64..2_000,
        ) {
            offsets.sort_unstable();
            let window = Duration::from_millis(1_000);
            // Keep the base far enough from process start that `now - window` exists
            let base = Instant::now() + Duration::from_secs(2);
            let counter = RateCounter::new(window);

            for &off in &offsets {
                counter.incr_at(1, base + Duration::from_millis(off));
            }

            let query = offsets.last().copied().unwrap_or(0) + extra;
            let now = base + Duration::from_millis(query);
            let expected = offsets
                .iter()
                .filter(|&&off| off <= query && off + 1_000 >= query)
                .count() as u64;

            prop_assert_eq!(counter.rate_at(now), expected);
        }
    }
}
