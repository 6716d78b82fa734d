//! Progress-callback trait for per-formula render events.
//!
//! Inject an [`Arc<dyn RenderProgressCallback>`] via
//! [`crate::config::ConfigBuilder::progress_callback`] to receive events as
//! the rewriter walks the document.
//!
//! # Example
//!
//! ```rust
//! use texcache::{Config, RenderProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     rendered: AtomicUsize,
//! }
//!
//! impl RenderProgressCallback for CountingCallback {
//!     fn on_render_complete(&self, index: usize, total: usize, file_name: &str) {
//!         self.rendered.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{index}/{total} → {file_name}");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { rendered: AtomicUsize::new(0) });
//!
//! let config = Config::builder()
//!     .progress_callback(counter as Arc<dyn RenderProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the rewriter as it processes each formula occurrence.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Occurrences are processed strictly in document
/// order, one at a time.
pub trait RenderProgressCallback: Send + Sync {
    /// Called once after the document has been scanned.
    ///
    /// # Arguments
    /// * `total` — number of formula occurrences found
    fn on_run_start(&self, total: usize) {
        let _ = total;
    }

    /// Called before an occurrence is addressed and rendered.
    ///
    /// # Arguments
    /// * `index`   — 1-indexed position in document order
    /// * `total`   — total occurrences
    /// * `formula` — verbatim formula text
    fn on_formula_start(&self, index: usize, total: usize, formula: &str) {
        let _ = (index, total, formula);
    }

    /// Called when the artefact already existed and no render was needed.
    fn on_cache_hit(&self, index: usize, total: usize, file_name: &str) {
        let _ = (index, total, file_name);
    }

    /// Called when the external pipeline produced a new artefact.
    fn on_render_complete(&self, index: usize, total: usize, file_name: &str) {
        let _ = (index, total, file_name);
    }

    /// Called once after every occurrence rendered successfully.
    ///
    /// # Arguments
    /// * `rendered`   — occurrences that went through the external pipeline
    /// * `cache_hits` — occurrences served from the cache
    fn on_run_complete(&self, rendered: usize, cache_hits: usize) {
        let _ = (rendered, cache_hits);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl RenderProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::Config`].
pub type ProgressCallback = Arc<dyn RenderProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        hits: AtomicUsize,
        renders: AtomicUsize,
    }

    impl RenderProgressCallback for TrackingCallback {
        fn on_formula_start(&self, _index: usize, _total: usize, _formula: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_cache_hit(&self, _index: usize, _total: usize, _file_name: &str) {
            self.hits.fetch_add(1, Ordering::SeqCst);
        }

        fn on_render_complete(&self, _index: usize, _total: usize, _file_name: &str) {
            self.renders.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start(2);
        cb.on_formula_start(1, 2, "x^2");
        cb.on_render_complete(1, 2, "abc.png");
        cb.on_cache_hit(2, 2, "abc.png");
        cb.on_run_complete(1, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_formula_start(1, 2, "a");
        tracker.on_render_complete(1, 2, "a.png");
        tracker.on_formula_start(2, 2, "a");
        tracker.on_cache_hit(2, 2, "a.png");

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.renders.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.hits.load(Ordering::SeqCst), 1);
    }
}
