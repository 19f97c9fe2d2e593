//! Pool-wide metrics
//!
//! Counters are updated from session inbound loops through the event bus
//! and read by the status reporter. Snapshots are plain values.

use crate::core::RateCounter;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Pool metrics collector
pub struct PoolMetrics {
    /// Received frames, all sessions, last second
    per_second: RateCounter,
    /// Received frames, all sessions, last minute
    per_minute: RateCounter,
    /// Join confirmations seen
    joined: AtomicU64,
    /// JOIN commands sent
    joins_issued: AtomicU64,
    sessions_created: AtomicU64,
    sessions_retired: AtomicU64,
    start_time: Instant,
}

/// Metrics snapshot for the status line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub received_per_second: u64,
    pub received_per_minute: u64,
    /// Rates of the current dispatch target
    pub current_per_second: u64,
    pub current_per_minute: u64,
    /// Channels flagged joined in the registry
    pub joined_channels: usize,
    pub queued_channels: usize,
    pub joins_confirmed: u64,
    pub joins_issued: u64,
    pub sessions_total: usize,
    pub sessions_connected: usize,
    pub sessions_created: u64,
    pub sessions_retired: u64,
    pub uptime_seconds: u64,
}

impl PoolMetrics {
    pub fn new() -> Self {
        Self {
            per_second: RateCounter::per_second(),
            per_minute: RateCounter::per_minute(),
            joined: AtomicU64::new(0),
            joins_issued: AtomicU64::new(0),
            sessions_created: AtomicU64::new(0),
            sessions_retired: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// One inbound frame on any session
    #[inline]
    pub fn record_received(&self) {
        self.per_second.incr(1);
        self.per_minute.incr(1);
    }

    #[inline]
    pub fn record_joined(&self) {
        self.joined.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_join_issued(&self) {
        self.joins_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_created(&self) {
        self.sessions_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_retired(&self) {
        self.sessions_retired.fetch_add(1, Ordering::Relaxed);
    }

    /// Counter part of a snapshot; the pool fills in the gauges it owns
    pub fn snapshot(&self) -> PoolStats {
        PoolStats {
            received_per_second: self.per_second.rate(),
            received_per_minute: self.per_minute.rate(),
            joins_confirmed: self.joined.load(Ordering::Relaxed),
            joins_issued: self.joins_issued.load(Ordering::Relaxed),
            sessions_created: self.sessions_created.load(Ordering::Relaxed),
            sessions_retired: self.sessions_retired.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            ..PoolStats::default()
        }
    }
}

impl Default for PoolMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PoolMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PoolMetrics").field(&self.snapshot()).finish()
    }
}

impl fmt::Display for PoolStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pool {}/s {}/min | current {}/s {}/min | joined {} queued {} | sessions {}/{}",
            self.received_per_second,
            self.received_per_minute,
            self.current_per_second,
            self.current_per_minute,
            self.joined_channels,
            self.queued_channels,
            self.sessions_connected,
            self.sessions_total,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_metrics_are_zero() {
        let metrics = PoolMetrics::new();
        let stats = metrics.snapshot();

        assert_eq!(stats.received_per_minute, 0);
        assert_eq!(stats.joins_issued, 0);
        assert_eq!(stats.sessions_created, 0);
    }

    #[test]
    fn test_record_counters() {
        let metrics = PoolMetrics::new();

        for _ in 0..5 {
            metrics.record_received();
        }
        metrics.record_join_issued();
        metrics.record_join_issued();
        metrics.record_joined();
        metrics.record_session_created();
        metrics.record_session_retired();

        let stats = metrics.snapshot();
        assert_eq!(stats.received_per_second, 5);
        assert_eq!(stats.received_per_minute, 5);
        assert_eq!(stats.joins_issued, 2);
        assert_eq!(stats.joins_confirmed, 1);
        assert_eq!(stats.sessions_created, 1);
        assert_eq!(stats.sessions_retired, 1);
    }

    #[test]
    fn test_status_line() {
        let stats = PoolStats {
            received_per_second: 3,
            received_per_minute: 120,
            current_per_second: 1,
            current_per_minute: 40,
            joined_channels: 7,
            queued_channels: 2,
            sessions_total: 2,
            sessions_connected: 1,
            ..PoolStats::default()
        };

        assert_eq!(
            stats.to_string(),
            "pool 3/s 120/min | current 1/s 40/min | joined 7 queued 2 | sessions 1/2"
        );
    }
}
