//! Progress-callback trait for per-paper digest events.
//!
//! Inject an [`Arc<dyn DigestProgressCallback>`] via
//! [`crate::config::DigestConfigBuilder::progress_callback`] to receive
//! events as the orchestrator works through the selected papers.
//!
//! # Example
//!
//! ```rust
//! use paper_gist::{DigestConfig, DigestProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct SkipCounter {
//!     skipped: AtomicUsize,
//! }
//!
//! impl DigestProgressCallback for SkipCounter {
//!     fn on_paper_skipped(&self, index: usize, total: usize, _title: &str, error: &str) {
//!         self.skipped.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("paper {index}/{total} skipped: {error}");
//!     }
//! }
//!
//! let config = DigestConfig::builder()
//!     .progress_callback(Arc::new(SkipCounter { skipped: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the orchestrator as it processes each paper.
///
/// Papers are processed strictly one after another, but the trait is
/// `Send + Sync` so implementations can be shared with other tasks. All
/// methods default to no-ops.
pub trait DigestProgressCallback: Send + Sync {
    /// Called once before the first paper.
    ///
    /// # Arguments
    /// * `total` — number of papers selected from the feed
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called before the gist of a paper is requested.
    ///
    /// # Arguments
    /// * `index` — 1-indexed position in the selection
    /// * `total` — papers in the selection
    /// * `title` — paper title
    fn on_paper_start(&self, index: usize, total: usize, title: &str) {
        let _ = (index, total, title);
    }

    /// Called when a paper made it into the batch.
    ///
    /// # Arguments
    /// * `has_figure` — whether a figure was extracted
    fn on_paper_complete(&self, index: usize, total: usize, has_figure: bool) {
        let _ = (index, total, has_figure);
    }

    /// Called when a paper was dropped because its gist failed.
    fn on_paper_skipped(&self, index: usize, total: usize, title: &str, error: &str) {
        let _ = (index, total, title, error);
    }

    /// Called once after every paper has been attempted.
    ///
    /// # Arguments
    /// * `total` — papers attempted
    /// * `kept`  — papers in the final batch
    fn on_batch_complete(&self, total: usize, kept: usize) {
        let _ = (total, kept);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl DigestProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::DigestConfig`].
pub type ProgressCallback = Arc<dyn DigestProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        skips: AtomicUsize,
        kept: AtomicUsize,
    }

    impl DigestProgressCallback for TrackingCallback {
        fn on_paper_start(&self, _index: usize, _total: usize, _title: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_paper_complete(&self, _index: usize, _total: usize, _has_figure: bool) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_paper_skipped(&self, _index: usize, _total: usize, _title: &str, _error: &str) {
            self.skips.fetch_add(1, Ordering::SeqCst);
        }

        fn on_batch_complete(&self, _total: usize, kept: usize) {
            self.kept.store(kept, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(3);
        cb.on_paper_start(1, 3, "A");
        cb.on_paper_complete(1, 3, true);
        cb.on_paper_skipped(2, 3, "B", "schema");
        cb.on_batch_complete(3, 2);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback {
            starts: AtomicUsize::new(0),
            completes: AtomicUsize::new(0),
            skips: AtomicUsize::new(0),
            kept: AtomicUsize::new(0),
        };

        tracker.on_paper_start(1, 2, "A");
        tracker.on_paper_complete(1, 2, false);
        tracker.on_paper_start(2, 2, "B");
        tracker.on_paper_skipped(2, 2, "B", "model down");
        tracker.on_batch_complete(2, 1);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.skips.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.kept.load(Ordering::SeqCst), 1);
    }
}
