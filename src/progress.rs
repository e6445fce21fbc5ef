//! Progress-callback trait for per-item batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::BatchConfigBuilder::progress_callback`] to receive events
//! as workers pick up and finish items. Events arrive in completion order and
//! may come from several tasks at once.
//!
//! # Example
//!
//! ```rust
//! use edgequake_ocrbatch::{BatchConfig, BatchProgressCallback, OutcomeRecord};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct Counter(AtomicUsize);
//!
//! impl BatchProgressCallback for Counter {
//!     fn on_item_complete(&self, record: &OutcomeRecord) {
//!         let done = self.0.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{done}: {} -> {:?}", record.source_path.display(), record.status);
//!     }
//! }
//!
//! let config = BatchConfig::builder()
//!     .progress_callback(Arc::new(Counter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use crate::output::OutcomeRecord;
use std::path::Path;
use std::sync::Arc;

/// Called by the batch runner as it processes items.
///
/// All methods have default no-op implementations.
///
/// # Thread safety
///
/// `on_item_start` and `on_item_complete` are called concurrently from up to
/// `worker_count` tasks; protect shared state accordingly.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once, after discovery, before any item starts.
    fn on_batch_start(&self, total_items: usize) {
        let _ = total_items;
    }

    /// Called when a worker picks up an item.
    fn on_item_start(&self, source: &Path) {
        let _ = source;
    }

    /// Called once per item with its final record.
    fn on_item_complete(&self, record: &OutcomeRecord) {
        let _ = record;
    }

    /// Called once after every item has a record.
    ///
    /// `succeeded` counts records with status `success`.
    fn on_batch_complete(&self, total_items: usize, succeeded: usize) {
        let _ = (total_items, succeeded);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::BatchConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
