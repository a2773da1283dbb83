//! Stream metrics for Framecast
//!
//! Counters shared by a session's capture worker and all of its viewer
//! loops, plus rolling averages for the per-frame pipeline stages.

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Maximum number of samples to keep for rolling averages
const MAX_SAMPLES: usize = 120;

/// Rolling average calculator for timing data
#[derive(Debug)]
struct RollingAverage {
    samples: VecDeque<Duration>,
    max_samples: usize,
}

impl RollingAverage {
    fn new(max_samples: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(max_samples),
            max_samples,
        }
    }

    fn add(&mut self, duration: Duration) {
        if self.samples.len() >= self.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(duration);
    }

    fn average_ms(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let total: Duration = self.samples.iter().sum();
        (total / self.samples.len() as u32).as_secs_f64() * 1000.0
    }
}

/// Point-in-time view of a session's metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    /// Frames read from the upstream source
    pub frames_captured: u64,
    /// Chunks delivered to viewers (summed over viewers)
    pub chunks_emitted: u64,
    /// Frames a slow viewer never saw because its queue overflowed
    pub frames_dropped: u64,
    /// Overlays skipped because of bad data
    pub overlays_skipped: u64,
    /// Frames dropped because encoding failed
    pub encode_failures: u64,
    /// Viewers currently attached
    pub viewers: u64,
    /// Average composite time in milliseconds
    pub composite_ms: f64,
    /// Average encode time in milliseconds
    pub encode_ms: f64,
    /// Seconds since the metrics were created
    pub uptime_secs: f64,
}

/// Thread-safe metrics collector
#[derive(Debug)]
pub struct StreamMetrics {
    frames_captured: AtomicU64,
    chunks_emitted: AtomicU64,
    frames_dropped: AtomicU64,
    overlays_skipped: AtomicU64,
    encode_failures: AtomicU64,
    viewers: AtomicU64,
    composite_latency: RwLock<RollingAverage>,
    encode_latency: RwLock<RollingAverage>,
    start_time: Instant,
}

impl Default for StreamMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            frames_captured: AtomicU64::new(0),
            chunks_emitted: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            overlays_skipped: AtomicU64::new(0),
            encode_failures: AtomicU64::new(0),
            viewers: AtomicU64::new(0),
            composite_latency: RwLock::new(RollingAverage::new(MAX_SAMPLES)),
            encode_latency: RwLock::new(RollingAverage::new(MAX_SAMPLES)),
            start_time: Instant::now(),
        }
    }

    pub fn record_frame_captured(&self) {
        self.frames_captured.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_chunk_emitted(&self) {
        self.chunks_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frames_dropped(&self, count: u64) {
        self.frames_dropped.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_overlays_skipped(&self, count: u64) {
        self.overlays_skipped.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_encode_failure(&self) {
        self.encode_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record composite stage timing
    pub fn record_composite(&self, duration: Duration) {
        self.composite_latency.write().add(duration);
    }

    /// Record encode stage timing
    pub fn record_encode(&self, duration: Duration) {
        self.encode_latency.write().add(duration);
    }

    /// Count a viewer as attached until the guard drops
    pub fn viewer_guard(self: &Arc<Self>) -> ViewerGuard {
        self.viewers.fetch_add(1, Ordering::Relaxed);
        ViewerGuard {
            metrics: Arc::clone(self),
        }
    }

    /// Viewers currently attached
    pub fn viewers(&self) -> u64 {
        self.viewers.load(Ordering::Relaxed)
    }

    /// Take a snapshot of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            chunks_emitted: self.chunks_emitted.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            overlays_skipped: self.overlays_skipped.load(Ordering::Relaxed),
            encode_failures: self.encode_failures.load(Ordering::Relaxed),
            viewers: self.viewers.load(Ordering::Relaxed),
            composite_ms: self.composite_latency.read().average_ms(),
            encode_ms: self.encode_latency.read().average_ms(),
            uptime_secs: self.start_time.elapsed().as_secs_f64(),
        }
    }
}

/// Decrements the viewer gauge on drop
#[derive(Debug)]
pub struct ViewerGuard {
    metrics: Arc<StreamMetrics>,
}

impl Drop for ViewerGuard {
    fn drop(&mut self) {
        self.metrics.viewers.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolling_average() {
        let mut avg = RollingAverage::new(3);
        assert_eq!(avg.average_ms(), 0.0);
        avg.add(Duration::from_millis(10));
        avg.add(Duration::from_millis(20));
        avg.add(Duration::from_millis(30));
        assert!((avg.average_ms() - 20.0).abs() < 0.01);

        // Oldest sample falls out
        avg.add(Duration::from_millis(40));
        assert!((avg.average_ms() - 30.0).abs() < 0.01);
    }

    #[test]
    fn test_counters() {
        let metrics = StreamMetrics::new();
        metrics.record_frame_captured();
        metrics.record_frame_captured();
        metrics.record_chunk_emitted();
        metrics.record_frames_dropped(3);
        metrics.record_overlays_skipped(2);
        metrics.record_encode_failure();

        let snap = metrics.snapshot();
        assert_eq!(snap.frames_captured, 2);
        assert_eq!(snap.chunks_emitted, 1);
        assert_eq!(snap.frames_dropped, 3);
        assert_eq!(snap.overlays_skipped, 2);
        assert_eq!(snap.encode_failures, 1);
    }

    #[test]
    fn test_viewer_guard() {
        let metrics = Arc::new(StreamMetrics::new());
        let a = metrics.viewer_guard();
        let b = metrics.viewer_guard();
        assert_eq!(metrics.viewers(), 2);
        drop(a);
        assert_eq!(metrics.viewers(), 1);
        drop(b);
        assert_eq!(metrics.viewers(), 0);
    }
}
