//! Progress-callback trait: the presentation layer's view of a request.
//!
//! Inject an [`Arc<dyn SummaryProgressCallback>`] via
//! [`crate::config::SummaryConfigBuilder::progress_callback`] to receive
//! page-level acquisition events, warnings, and retry notifications.
//!
//! Every warning the pipeline logs through `tracing` is also delivered here,
//! so a UI can show the user why a page was skipped or why the request is
//! waiting, without scraping logs.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdfsum::{SummaryProgressCallback, SummaryConfig};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! struct Printer;
//!
//! impl SummaryProgressCallback for Printer {
//!     fn on_retry(&self, attempt: u32, delay: Duration) {
//!         eprintln!("rate limited on attempt {attempt}, waiting {delay:?}");
//!     }
//! }
//!
//! let config = SummaryConfig::builder()
//!     .progress_callback(Arc::new(Printer) as Arc<dyn SummaryProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::TextSource;
use std::sync::Arc;
use std::time::Duration;

/// Called by the pipeline as it acquires text and summarises it.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. A single request calls these sequentially, but one
/// callback may be shared by concurrent requests, hence `Send + Sync`.
pub trait SummaryProgressCallback: Send + Sync {
    /// Called once the page count is known, before the first page is read.
    fn on_acquire_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called after a page's text has been resolved.
    ///
    /// # Arguments
    /// * `page_num`: 1-indexed page number
    /// * `source`  : where the text came from
    /// * `chars`   : characters contributed to the blob
    fn on_page_extracted(&self, page_num: usize, source: TextSource, chars: usize) {
        let _ = (page_num, source, chars);
    }

    /// Called for a non-fatal page problem (skip, OCR fallback failure).
    fn on_page_warning(&self, page_num: usize, message: &str) {
        let _ = (page_num, message);
    }

    /// Called when the acquired text was cut to the configured budget.
    fn on_truncated(&self, kept_chars: usize, total_chars: usize) {
        let _ = (kept_chars, total_chars);
    }

    /// Called just before each remote summarization attempt (1-indexed).
    fn on_summary_attempt(&self, attempt: u32, max_attempts: u32) {
        let _ = (attempt, max_attempts);
    }

    /// Called when `attempt` was rate limited and the loop is about to wait `delay`.
    fn on_retry(&self, attempt: u32, delay: Duration) {
        let _ = (attempt, delay);
    }

    /// Called once a summary has been produced.
    fn on_summary_complete(&self, summary_chars: usize) {
        let _ = summary_chars;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl SummaryProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::SummaryConfig`].
pub type ProgressCallback = Arc<dyn SummaryProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        pages: AtomicUsize,
        warnings: AtomicUsize,
        retries: AtomicUsize,
    }

    impl SummaryProgressCallback for TrackingCallback {
        fn on_page_extracted(&self, _page_num: usize, _source: TextSource, _chars: usize) {
            self.pages.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_warning(&self, _page_num: usize, _message: &str) {
            self.warnings.fetch_add(1, Ordering::SeqCst);
        }

        fn on_retry(&self, _attempt: u32, _delay: Duration) {
            self.retries.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_acquire_start(3);
        cb.on_page_extracted(1, TextSource::Embedded, 10);
        cb.on_page_warning(2, "broken");
        cb.on_truncated(10, 20);
        cb.on_summary_attempt(1, 3);
        cb.on_retry(1, Duration::from_secs(1));
        cb.on_summary_complete(42);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_page_extracted(1, TextSource::Embedded, 100);
        tracker.on_page_extracted(2, TextSource::Ocr, 50);
        tracker.on_page_warning(3, "render failed");
        tracker.on_retry(1, Duration::from_millis(500));

        assert_eq!(tracker.pages.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.warnings.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.retries.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_acquire_start(10);
        cb.on_summary_complete(512);
    }
}
