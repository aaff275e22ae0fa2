use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use fauxcam_codec::CodecStats;
use fauxcam_core::metrics::Metrics;

const DEFAULT_WINDOW: usize = 120;

/// Rolling timing metrics for an engine stage.
///
/// # Example
/// ```rust
/// use fauxcam::metrics::StageMetrics;
///
/// let metrics = StageMetrics::default();
/// metrics.record(std::time::Duration::from_millis(5));
/// assert_eq!(metrics.total_samples(), 1);
/// ```
#[derive(Default, Clone)]
pub struct StageMetrics {
    inner: Arc<StageState>,
}

#[derive(Default)]
struct StageState {
    count: AtomicU64,
    last_nanos: AtomicU64,
    window: Mutex<WindowState>,
}

struct WindowState {
    samples: VecDeque<u64>,
    max: usize,
}

impl Default for WindowState {
    fn default() -> Self {
        Self {
            samples: VecDeque::new(),
            max: DEFAULT_WINDOW,
        }
    }
}

impl StageMetrics {
    /// Record a single duration sample.
    pub fn record(&self, dur: Duration) {
        let nanos = dur.as_nanos().min(u64::MAX as u128) as u64;
        self.inner.count.fetch_add(1, Ordering::Relaxed);
        self.inner.last_nanos.store(nanos, Ordering::Relaxed);
        if let Ok(mut win) = self.inner.window.lock() {
            win.samples.push_back(nanos);
            while win.samples.len() > win.max {
                win.samples.pop_front();
            }
        }
    }

    /// Total samples recorded over the lifetime.
    pub fn total_samples(&self) -> u64 {
        self.inner.count.load(Ordering::Relaxed)
    }

    /// Rolling average of samples in milliseconds.
    pub fn avg_millis(&self) -> Option<f64> {
        self.inner.window.lock().ok().and_then(|w| {
            let count = w.samples.len();
            if count == 0 {
                return None;
            }
            let total: u128 = w.samples.iter().map(|n| *n as u128).sum();
            Some(total as f64 / 1_000_000.0 / count as f64)
        })
    }

    /// Most recent sample in milliseconds.
    pub fn last_millis(&self) -> Option<f64> {
        let last = self.inner.last_nanos.load(Ordering::Relaxed);
        if last == 0 {
            None
        } else {
            Some(last as f64 / 1_000_000.0)
        }
    }
}

/// Counters and stage timings collected by a [`crate::FrameEngine`].
#[derive(Clone, Default)]
pub struct EngineMetrics {
    /// Compositing (scale/zoom/pan) timing.
    pub compose: StageMetrics,
    /// Pixel format encoding timing.
    pub encode: StageMetrics,
    /// Plane write timing.
    pub write: StageMetrics,
    /// Encoded-frame cache hits/misses and fallback transitions.
    pub frames: Arc<Metrics>,
    placeholders: Arc<AtomicU64>,
    written: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
}

impl EngineMetrics {
    pub(crate) fn placeholder(&self) {
        self.placeholders.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn written(&self) {
        self.written.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, compositor: &Metrics, codec: CodecStats) -> EngineStats {
        EngineStats {
            cache_hits: self.frames.hits(),
            cache_misses: self.frames.misses(),
            fallbacks: self.frames.fallbacks(),
            placeholders: self.placeholders.load(Ordering::Relaxed),
            frames_written: self.written.load(Ordering::Relaxed),
            frames_failed: self.failed.load(Ordering::Relaxed),
            compositor_allocations: compositor.allocations(),
            compose_avg_millis: self.compose.avg_millis(),
            encode_avg_millis: self.encode.avg_millis(),
            write_avg_millis: self.write.avg_millis(),
            codec,
        }
    }
}

/// Point-in-time view of engine behavior.
#[derive(Clone, Debug)]
pub struct EngineStats {
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// Fallback transitions (one per stage abandoned).
    pub fallbacks: u64,
    pub placeholders: u64,
    pub frames_written: u64,
    pub frames_failed: u64,
    /// Scratch buffer (re)allocations by the compositor.
    pub compositor_allocations: u64,
    pub compose_avg_millis: Option<f64>,
    pub encode_avg_millis: Option<f64>,
    pub write_avg_millis: Option<f64>,
    /// Registry stats for every encode, frame requests included.
    pub codec: CodecStats,
}
