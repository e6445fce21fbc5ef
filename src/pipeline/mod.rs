//! Batch pipeline stages.
//!
//! Each submodule does exactly one job, so each can be tested with fake
//! engines and temporary directories.
//!
//! ## Data Flow
//!
//! ```text
//! discover ──▶ batch ──▶ retry ──▶ (engine) ──▶ persist
//!   (walk)    (pool)   (attempts)              (atomic writes)
//!                │
//!                └──▶ report   (one JSON array at the end)
//! ```
//!
//! 1. [`discover`]: recursive, sorted enumeration plus output-path mapping
//! 2. [`batch`]   : one spawned task per item on a bounded pool; panics
//!    become error records
//! 3. [`retry`]   : bounded attempts with a fixed delay and a fresh engine
//!    per attempt; the image per-item function lives here
//! 4. [`splice`]  : markdown per-item function: OCR every image reference
//!    and insert the text by span
//! 5. [`report`]  : serialise every outcome once, when the batch is done
//! 6. [`persist`] : temp-file-then-rename writes and directory merging

pub mod batch;
pub mod discover;
pub mod persist;
pub mod report;
pub mod retry;
pub mod splice;
