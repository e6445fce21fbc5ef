//! Markdown splicing: insert recognised image text above each image
//! reference of a document.
//!
//! ```text
//! read ──▶ split lines ──▶ find ![..](..) ──┬─ none ──▶ copy verbatim
//!                                           └─ some ──▶ OCR each (retry)
//!                                                        ──▶ rebuild lines by span
//!                                                        ──▶ write + copy images/
//! ```
//!
//! Documents are handled as raw bytes, so every byte outside the inserted
//! blocks is written back unchanged, whatever the document's encoding.
//!
//! Replacement is positional: every reference remembers the byte span it
//! occupies in its line, and lines are rebuilt by walking those spans. Two
//! identical references on one line are therefore annotated independently.
//!
//! A reference that already starts its line right after a closing marker was
//! annotated by an earlier run and is left alone, so running twice over the
//! same tree does not stack blocks.

use crate::config::{BatchConfig, SpliceMarkers};
use crate::engine::{ImageRecognizer, RecognizerFactory};
use crate::error::RecognitionError;
use crate::output::OutcomeRecord;
use crate::pipeline::discover::WorkItem;
use crate::pipeline::persist;
use crate::pipeline::retry::{self, Attempted, RetryPolicy};
use once_cell::sync::Lazy;
use regex::bytes::Regex;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

// `(?-u)`: `.` matches any byte but `\n`, so non-UTF-8 alt text still matches.
static RE_IMAGE_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?-u)!\[.*?\]\((.*?)\)").unwrap());

/// One `![alt](path)` occurrence whose target exists on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Target resolved against the document's directory.
    pub image_path: PathBuf,
    /// The `![..](..)` text, for logs. Splicing copies the original bytes.
    pub snippet: String,
    /// Index into the document's lines.
    pub line_index: usize,
    /// Byte range of the reference within its line.
    pub span: Range<usize>,
}

/// Split `bytes` into lines, each keeping its `\n`.
pub fn split_lines(bytes: &[u8]) -> Vec<&[u8]> {
    bytes.split_inclusive(|b| *b == b'\n').collect()
}

/// Every resolvable image reference, in line-scan order.
///
/// References whose target does not exist relative to `doc_dir` are skipped.
pub fn extract_references(lines: &[&[u8]], doc_dir: &Path) -> Vec<ImageReference> {
    let mut refs = Vec::new();
    for (line_index, line) in lines.iter().enumerate() {
        for caps in RE_IMAGE_REF.captures_iter(line) {
            let (Some(whole), Some(target)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let snippet = String::from_utf8_lossy(whole.as_bytes()).into_owned();
            let Ok(target) = std::str::from_utf8(target.as_bytes()) else {
                debug!("Ignoring non-UTF-8 image path in {}", snippet);
                continue;
            };
            let image_path = doc_dir.join(target.trim());
            if !image_path.is_file() {
                debug!("Ignoring unresolved reference {}", snippet);
                continue;
            }
            refs.push(ImageReference {
                image_path,
                snippet,
                line_index,
                span: whole.range(),
            });
        }
    }
    refs
}

/// Whether `reference` already sits directly under a closing marker.
pub fn already_annotated(
    lines: &[&[u8]],
    reference: &ImageReference,
    markers: &SpliceMarkers,
) -> bool {
    if reference.span.start != 0 || reference.line_index == 0 {
        return false;
    }
    let mut previous = lines[reference.line_index - 1];
    while let [rest @ .., b'\r' | b'\n'] = previous {
        previous = rest;
    }
    previous.ends_with(markers.close.as_bytes())
}

/// Rebuild the document with a marker block before every annotated
/// reference. All other bytes are copied unchanged.
///
/// `annotated` must be in line-scan order, as produced by
/// [`extract_references`].
pub fn splice_lines(
    lines: &[&[u8]],
    annotated: &[(ImageReference, Vec<String>)],
    markers: &SpliceMarkers,
) -> Vec<u8> {
    let extra: usize = annotated
        .iter()
        .map(|(_, texts)| texts.iter().map(|t| t.len() + 1).sum::<usize>() + 64)
        .sum();
    let mut out = Vec::with_capacity(lines.iter().map(|l| l.len()).sum::<usize>() + extra);
    let mut pending = annotated.iter().peekable();

    for (index, line) in lines.iter().enumerate() {
        let mut cursor = 0;
        while let Some((reference, texts)) = pending.next_if(|(r, _)| r.line_index == index) {
            out.extend_from_slice(&line[cursor..reference.span.start]);
            out.extend_from_slice(markers.block(texts).as_bytes());
            out.extend_from_slice(&line[reference.span.clone()]);
            cursor = reference.span.end;
        }
        out.extend_from_slice(&line[cursor..]);
    }
    out
}

/// Per-item function of the markdown batch.
///
/// Reads `item.source`, annotates it and writes the result to `item.output`.
/// Images inside one document are recognised one after the other.
pub async fn annotate_document<F>(
    item: &WorkItem,
    factory: &F,
    policy: &RetryPolicy,
    config: &BatchConfig,
) -> OutcomeRecord
where
    F: RecognizerFactory,
{
    match annotate(item, factory, policy, config).await {
        Ok(texts) if texts.is_empty() => OutcomeRecord::no_text(&item.source, &item.output, 1),
        Ok(texts) => OutcomeRecord::success(&item.source, &item.output, texts, 1),
        Err(e) => {
            warn!("{}: {}", item.source.display(), e);
            OutcomeRecord::failed(&item.source, &item.output, e.to_string(), 1)
        }
    }
}

/// Returns every text line that was inserted.
async fn annotate<F>(
    item: &WorkItem,
    factory: &F,
    policy: &RetryPolicy,
    config: &BatchConfig,
) -> Result<Vec<String>, RecognitionError>
where
    F: RecognizerFactory,
{
    let bytes = tokio::fs::read(&item.source).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            RecognitionError::SourceMissing {
                path: item.source.clone(),
            }
        } else {
            RecognitionError::io(&item.source, e)
        }
    })?;
    let lines = split_lines(&bytes);
    let doc_dir = item.source.parent().unwrap_or(Path::new("."));

    let found = extract_references(&lines, doc_dir);
    if found.is_empty() {
        debug!("{}: no image references, copying", item.source.display());
        persist::write_atomic(&item.output, bytes.clone())
            .await
            .map_err(|e| RecognitionError::io(&item.output, e))?;
        return Ok(Vec::new());
    }

    let total = found.len();
    let mut annotated = Vec::new();
    let mut inserted = Vec::new();

    for reference in found {
        if already_annotated(&lines, &reference, &config.markers) {
            debug!("{}: already annotated", reference.snippet);
            continue;
        }

        let label = format!(
            "{} [{}]",
            item.source.display(),
            reference.image_path.display()
        );
        let image = reference.image_path.as_path();
        let result = retry::execute(policy, &label, move |_| async move {
            let engine = factory.create()?;
            engine.text_only(image).await
        })
        .await;

        match result {
            Attempted::Found { value, .. } => {
                inserted.extend(value.iter().cloned());
                annotated.push((reference, value));
            }
            Attempted::Empty { .. } => debug!("{}: no text", label),
            Attempted::Failed { error, attempts } => warn!(
                "{}: left unannotated after {} attempts: {}",
                label, attempts, error
            ),
        }
    }

    let rewritten = splice_lines(&lines, &annotated, &config.markers);
    persist::write_atomic(&item.output, rewritten)
        .await
        .map_err(|e| RecognitionError::io(&item.output, e))?;

    let assets = doc_dir.join(&config.images_dir_name);
    if assets.is_dir() {
        let dest = item
            .output
            .parent()
            .unwrap_or(Path::new("."))
            .join(&config.images_dir_name);
        persist::copy_dir_merge(&assets, &dest)
            .await
            .map_err(|e| RecognitionError::io(&dest, e))?;
    }

    info!(
        "{}: annotated {}/{} images → {}",
        item.source.display(),
        annotated.len(),
        total,
        item.output.display()
    );
    Ok(inserted)
}
