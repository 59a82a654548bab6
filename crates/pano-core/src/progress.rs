//! Cooperative progress reporting and cancellation.
//!
//! Long-running passes poll a [`ProgressSink`] at defined points (optimizer
//! iterations, sampler point counts). A `false` return requests cancellation;
//! the pass aborts promptly without corrupting already-committed state and
//! reports the cancellation through its result flags.

/// Receiver for progress updates from long-running algorithms.
///
/// Implementations take `&self` so a sink can be shared across parallel
/// workers; use interior mutability (atomics) when state is needed.
pub trait ProgressSink: Sync {
    /// Report progress in `[0, 1]` with a short stage description.
    ///
    /// Returns `false` to request cancellation.
    fn report(&self, progress: f64, stage: &str) -> bool;
}

/// Sink that ignores progress and never cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _progress: f64, _stage: &str) -> bool {
        true
    }
}

/// Sink that cancels after a fixed number of reports; test helper.
#[derive(Debug)]
pub struct CancelAfter {
    remaining: std::sync::atomic::AtomicUsize,
}

impl CancelAfter {
    pub fn new(reports: usize) -> Self {
        Self {
            remaining: std::sync::atomic::AtomicUsize::new(reports),
        }
    }
}

impl ProgressSink for CancelAfter {
    fn report(&self, _progress: f64, _stage: &str) -> bool {
        use std::sync::atomic::Ordering;
        loop {
            let cur = self.remaining.load(Ordering::Relaxed);
            if cur == 0 {
                return false;
            }
            if self
                .remaining
                .compare_exchange(cur, cur - 1, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                return true;
            }
        }
    }
}
