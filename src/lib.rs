//! # edgequake-ocrbatch
//!
//! Fault-tolerant batch OCR over folders of images, markdown trees and PDFs.
//!
//! ## Why this crate?
//!
//! OCR engines crash, run out of GPU memory, hit rate limits and time out.
//! On a folder of ten thousand scans, one bad file must not stop the run, and
//! a transient failure deserves another try with a clean engine. This crate
//! wraps any single-image recognizer in bounded retries, runs items on a
//! fixed-size worker pool and writes one JSON report describing what
//! happened to every item.
//!
//! ## Pipeline Overview
//!
//! ```text
//! input dir
//!  │
//!  ├─ 1. Discover  recursive walk, sorted, extension filter
//!  ├─ 2. Dispatch  one task per item, at most `worker_count` in flight
//!  ├─ 3. Retry     fresh engine per attempt, fixed delay, `max_retries` cap
//!  ├─ 4. Persist   .txt per image / annotated .md / PDF → .md + images/
//!  └─ 5. Report    processing_report.json, written once at the end
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_ocrbatch::{ocr_images, BatchConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Vision provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let config = BatchConfig::builder().worker_count(4).build()?;
//!     let summary = ocr_images("scans", "output/ocr_results/scans", &config).await?;
//!     eprintln!(
//!         "{} ok, {} empty, {} failed → {:?}",
//!         summary.succeeded(),
//!         summary.no_text(),
//!         summary.failed(),
//!         summary.report_path
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Engines
//!
//! | Engine | Selected by | Notes |
//! |--------|-------------|-------|
//! | Vision LLM | `EngineKind::Vision` (default) | any `edgequake-llm` provider |
//! | External program | `EngineKind::Command` | one process per attempt, e.g. a PaddleOCR wrapper |
//! | Your own | [`ocr_images_with`] | implement [`ImageRecognizer`] + [`RecognizerFactory`] |
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ocrbatch` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-ocrbatch = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod document;
pub mod engine;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{BatchConfig, BatchConfigBuilder, EngineKind, SpliceMarkers};
pub use convert::{
    annotate_markdown, annotate_markdown_sync, annotate_markdown_with, convert_pdfs,
    convert_pdfs_sync, ocr_images, ocr_images_sync, ocr_images_with,
};
pub use document::{AnalyzedDocument, DocumentAnalyzer, ParseMode};
pub use engine::{
    CommandRecognizer, EngineFactory, ImageRecognizer, RecognizerFactory, TextLine,
    VisionRecognizer,
};
pub use error::{OcrBatchError, RecognitionError};
pub use output::{BatchSummary, OutcomeRecord, OutcomeStatus};
pub use pipeline::retry::RetryPolicy;
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{ocr_images_stream, ocr_images_stream_with, OutcomeStream};
