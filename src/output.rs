//! Result types: one [`OutcomeRecord`] per work item, one [`BatchSummary`]
//! per run.
//!
//! `OutcomeRecord` is also the element type of `processing_report.json`, so
//! its serde shape is part of the on-disk format.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Terminal status of one work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Text was recognised and the artifact written.
    Success,
    /// The engine ran fine but found nothing. Not an error; never retried.
    NoTextFound,
    /// Retries exhausted, source missing, or the worker task aborted.
    Error,
}

/// Normalised result of processing one work item.
///
/// Created exactly once per item by whichever attempt terminated it, and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    /// The image, markdown document or PDF that was processed.
    pub source_path: PathBuf,
    /// Where the artifact was (or would have been) written.
    pub output_path: PathBuf,
    pub status: OutcomeStatus,
    /// Recognised text segments; empty unless `status` is `success`.
    #[serde(default)]
    pub texts: Vec<String>,
    /// Stringified failure; present iff `status` is `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Attempts consumed, 1-based.
    pub attempts: u32,
}

impl OutcomeRecord {
    pub fn success(
        source: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        texts: Vec<String>,
        attempts: u32,
    ) -> Self {
        Self {
            source_path: source.into(),
            output_path: output.into(),
            status: OutcomeStatus::Success,
            texts,
            error: None,
            attempts,
        }
    }

    pub fn no_text(source: impl Into<PathBuf>, output: impl Into<PathBuf>, attempts: u32) -> Self {
        Self {
            source_path: source.into(),
            output_path: output.into(),
            status: OutcomeStatus::NoTextFound,
            texts: Vec::new(),
            error: None,
            attempts,
        }
    }

    pub fn failed(
        source: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        error: String,
        attempts: u32,
    ) -> Self {
        Self {
            source_path: source.into(),
            output_path: output.into(),
            status: OutcomeStatus::Error,
            texts: Vec::new(),
            error: Some(error),
            attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

/// Everything a finished batch produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Records in completion order.
    pub outcomes: Vec<OutcomeRecord>,
    /// Location of the persisted report; `None` when nothing was discovered
    /// or the report could not be written.
    pub report_path: Option<PathBuf>,
    /// Wall-clock duration of the whole batch.
    pub duration_ms: u64,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.count(OutcomeStatus::Success)
    }

    pub fn no_text(&self) -> usize {
        self.count(OutcomeStatus::NoTextFound)
    }

    pub fn failed(&self) -> usize {
        self.count(OutcomeStatus::Error)
    }

    /// Record for a given source path, if the batch produced one.
    pub fn find(&self, source: &Path) -> Option<&OutcomeRecord> {
        self.outcomes.iter().find(|r| r.source_path == source)
    }

    fn count(&self, status: OutcomeStatus) -> usize {
        self.outcomes.iter().filter(|r| r.status == status).count()
    }
}
