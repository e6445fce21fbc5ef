//! Error types for the edgequake-ocrbatch library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`OcrBatchError`]: **Fatal**: the batch cannot start at all (input
//!   directory missing, invalid configuration, provider not configured), or
//!   the final report could not be persisted. Returned as `Err` from the
//!   top-level entry points in [`crate::convert`].
//!
//! * [`RecognitionError`]: **Per item**: one image, document or PDF failed.
//!   It is retried by [`crate::pipeline::retry`] when transient and ends up as
//!   the `error` field of an [`crate::output::OutcomeRecord`] when the retries
//!   are exhausted. Sibling items are never affected.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-ocrbatch library.
#[derive(Debug, Error)]
pub enum OcrBatchError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input directory does not exist.
    #[error("Input directory not found: '{path}'")]
    InputNotFound { path: PathBuf },

    /// Input path exists but is not a directory.
    #[error("Input path is not a directory: '{path}'")]
    NotADirectory { path: PathBuf },

    /// The directory walk failed (permission denied, broken entry, …).
    #[error("Failed to scan '{path}': {detail}")]
    Discovery { path: PathBuf, detail: String },

    // ── Engine errors ─────────────────────────────────────────────────────
    /// The configured LLM provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create the output directory or write an output file.
    #[error("Failed to write output '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The batch finished but `processing_report.json` could not be written.
    ///
    /// Per-item artifacts already on disk are left in place.
    #[error("Failed to write processing report '{path}': {detail}")]
    ReportWriteFailed { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single work item.
///
/// Everything except [`RecognitionError::SourceMissing`] is treated as
/// transient: the retry layer discards the engine that produced it and tries
/// again with a fresh one.
#[derive(Debug, Clone, Error, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum RecognitionError {
    /// The source file vanished or never existed. Retrying cannot help.
    #[error("source not found: {path}")]
    SourceMissing { path: PathBuf },

    /// The engine could not be constructed (provider, library binding, …).
    #[error("engine initialisation failed: {detail}")]
    EngineInit { detail: String },

    /// The image could not be decoded or re-encoded.
    #[error("cannot decode image {path}: {detail}")]
    Decode { path: PathBuf, detail: String },

    /// The vision provider returned an error.
    #[error("provider call failed: {detail}")]
    Provider { detail: String },

    /// The external OCR program could not be spawned or exited non-zero.
    #[error("OCR command failed ({status}): {stderr}")]
    CommandFailed { status: String, stderr: String },

    /// pdfium could not open, render or read the document.
    #[error("PDF processing failed for {path}: {detail}")]
    Pdf { path: PathBuf, detail: String },

    /// Reading the source or writing the artifact failed.
    #[error("I/O error on {path}: {detail}")]
    Io { path: PathBuf, detail: String },

    /// The worker task panicked outside of the retry wrapper.
    #[error("worker task aborted: {detail}")]
    TaskPanicked { detail: String },
}

impl RecognitionError {
    /// Whether another attempt with a fresh engine may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, RecognitionError::SourceMissing { .. })
    }

    pub(crate) fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        RecognitionError::Io {
            path: path.into(),
            detail: err.to_string(),
        }
    }
}
