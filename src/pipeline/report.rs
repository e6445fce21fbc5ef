//! The batch report: every outcome, serialised once at the end of a run.

use crate::error::OcrBatchError;
use crate::output::OutcomeRecord;
use crate::pipeline::persist;
use std::path::{Path, PathBuf};
use tracing::info;

/// Write `outcomes` as a pretty-printed JSON array to
/// `<output_dir>/<file_name>`, replacing any earlier report.
///
/// Non-ASCII text is written as-is, not `\u` escaped.
pub async fn write_report(
    outcomes: &[OutcomeRecord],
    output_dir: &Path,
    file_name: &str,
) -> Result<PathBuf, OcrBatchError> {
    let path = output_dir.join(file_name);

    let mut json =
        serde_json::to_string_pretty(outcomes).map_err(|e| OcrBatchError::ReportWriteFailed {
            path: path.clone(),
            detail: e.to_string(),
        })?;
    json.push('\n');

    persist::write_atomic(&path, json.into_bytes())
        .await
        .map_err(|e| OcrBatchError::ReportWriteFailed {
            path: path.clone(),
            detail: e.to_string(),
        })?;

    info!("Report with {} records → {}", outcomes.len(), path.display());
    Ok(path)
}
