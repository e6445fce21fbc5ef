//! Batch entry points.
//!
//! Each entry point validates its input, discovers work, runs it through the
//! parallel runner and writes the report once at the end:
//!
//! | Function | Input | Per-item artifact |
//! |----------|-------|-------------------|
//! | [`ocr_images`] | folder of images | `<stem>.txt`, mirrored tree |
//! | [`annotate_markdown`] | markdown tree | annotated `.md` + copied `images/` |
//! | [`convert_pdfs`] | one or more folders of PDFs | `<dir label>/<stem>/<stem>.md` + `images/` |
//!
//! A missing input directory or a misconfigured engine is a fatal `Err`.
//! Everything that goes wrong with a single item ends up in that item's
//! [`OutcomeRecord`] instead; the batch always runs to completion.
//!
//! The `*_with` variants take the [`RecognizerFactory`] explicitly, which is
//! how tests and embedders plug in their own engines.

use crate::config::BatchConfig;
use crate::document::DocumentAnalyzer;
use crate::engine::{EngineFactory, RecognizerFactory};
use crate::error::{OcrBatchError, RecognitionError};
use crate::output::{BatchSummary, OutcomeRecord};
use crate::pipeline::discover::{self, InputKind, WorkItem};
use crate::pipeline::retry::{self, Attempted};
use crate::pipeline::{batch, report, splice};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// OCR every image under `input_dir`, writing one `.txt` per image under
/// `output_dir` and `processing_report.json` next to them.
///
/// # Example
/// ```rust,no_run
/// use edgequake_ocrbatch::{ocr_images, BatchConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = BatchConfig::builder().worker_count(4).build()?;
/// let summary = ocr_images("scans", "output/ocr_results/scans", &config).await?;
/// eprintln!("{}/{} images succeeded", summary.succeeded(), summary.total());
/// # Ok(())
/// # }
/// ```
pub async fn ocr_images(
    input_dir: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &BatchConfig,
) -> Result<BatchSummary, OcrBatchError> {
    discover::ensure_input_dir(input_dir.as_ref())?;
    let factory = EngineFactory::new(config);
    factory.preflight()?;
    ocr_images_with(input_dir, output_dir, config, factory).await
}

/// [`ocr_images`] with a caller-supplied engine factory.
pub async fn ocr_images_with<F>(
    input_dir: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &BatchConfig,
    factory: F,
) -> Result<BatchSummary, OcrBatchError>
where
    F: RecognizerFactory + 'static,
{
    let start = Instant::now();
    let (input_dir, output_dir) = (input_dir.as_ref(), output_dir.as_ref());
    info!(
        "OCR images: {} → {}",
        input_dir.display(),
        output_dir.display()
    );

    let items = image_items(input_dir, output_dir)?;
    if items.is_empty() {
        warn!("No images found under {}", input_dir.display());
        return Ok(empty_summary(start));
    }
    create_output_dir(output_dir).await?;

    let factory = Arc::new(factory);
    let policy = config.retry_policy();
    let outcomes = batch::run(
        items,
        config.worker_count,
        config.progress_callback.clone(),
        move |item| {
            let factory = Arc::clone(&factory);
            let policy = policy.clone();
            async move { retry::process_image(&item, &*factory, &policy).await }
        },
    )
    .await;

    Ok(finish(outcomes, output_dir, config, start).await)
}

/// Work items for an image folder, in discovery order.
pub(crate) fn image_items(
    input_dir: &Path,
    output_dir: &Path,
) -> Result<Vec<WorkItem>, OcrBatchError> {
    Ok(discover::discover(input_dir, InputKind::Image)?
        .into_iter()
        .map(|image| {
            let output = discover::text_output_path(&image, input_dir, output_dir);
            WorkItem::new(image, output)
        })
        .collect())
}

/// Annotate every markdown document under `input_dir` with the text of the
/// images it references, mirroring the tree into `output_dir`.
pub async fn annotate_markdown(
    input_dir: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &BatchConfig,
) -> Result<BatchSummary, OcrBatchError> {
    discover::ensure_input_dir(input_dir.as_ref())?;
    let factory = EngineFactory::new(config);
    factory.preflight()?;
    annotate_markdown_with(input_dir, output_dir, config, factory).await
}

/// [`annotate_markdown`] with a caller-supplied engine factory.
pub async fn annotate_markdown_with<F>(
    input_dir: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &BatchConfig,
    factory: F,
) -> Result<BatchSummary, OcrBatchError>
where
    F: RecognizerFactory + 'static,
{
    let start = Instant::now();
    let (input_dir, output_dir) = (input_dir.as_ref(), output_dir.as_ref());
    info!(
        "Annotate markdown: {} → {}",
        input_dir.display(),
        output_dir.display()
    );

    let items: Vec<WorkItem> = discover::discover(input_dir, InputKind::Markdown)?
        .into_iter()
        .map(|doc| {
            let output = discover::mirrored_path(&doc, input_dir, output_dir);
            WorkItem::new(doc, output)
        })
        .collect();
    if items.is_empty() {
        warn!("No markdown documents found under {}", input_dir.display());
        return Ok(empty_summary(start));
    }
    create_output_dir(output_dir).await?;

    let factory = Arc::new(factory);
    let shared = Arc::new(config.clone());
    let outcomes = batch::run(
        items,
        config.worker_count,
        config.progress_callback.clone(),
        move |item| {
            let factory = Arc::clone(&factory);
            let config = Arc::clone(&shared);
            async move {
                let policy = config.retry_policy();
                splice::annotate_document(&item, &*factory, &policy, &config).await
            }
        },
    )
    .await;

    Ok(finish(outcomes, output_dir, config, start).await)
}

/// Convert every PDF under each of `input_dirs` into Markdown.
///
/// Every input directory must exist; one missing directory stops the whole
/// call before any work starts. Each directory's PDFs go under a folder named
/// after it; same-named directories get `-2`, `-3`, … suffixes. The report goes to
/// `<output_root>/processing_report.json`.
pub async fn convert_pdfs<P>(
    input_dirs: &[P],
    output_root: impl AsRef<Path>,
    config: &BatchConfig,
) -> Result<BatchSummary, OcrBatchError>
where
    P: AsRef<Path>,
{
    let start = Instant::now();
    let output_root = output_root.as_ref();

    for dir in input_dirs {
        discover::ensure_input_dir(dir.as_ref())?;
    }

    let labels = discover::dir_labels(input_dirs);
    let mut items = Vec::new();
    for (dir, label) in input_dirs.iter().zip(&labels) {
        let dir = dir.as_ref();
        info!("Scanning {} for PDFs → {}/", dir.display(), label);
        for pdf in discover::discover(dir, InputKind::Pdf)? {
            let output = discover::pdf_output_path(&pdf, dir, label, output_root);
            items.push(WorkItem::new(pdf, output));
        }
    }
    if items.is_empty() {
        warn!("No PDF files found");
        return Ok(empty_summary(start));
    }
    create_output_dir(output_root).await?;

    let shared = Arc::new(config.clone());
    let outcomes = batch::run(
        items,
        config.worker_count,
        config.progress_callback.clone(),
        move |item| {
            let config = Arc::clone(&shared);
            async move { process_pdf(&item, &config).await }
        },
    )
    .await;

    Ok(finish(outcomes, output_root, config, start).await)
}

/// Per-item function of the PDF batch: analyse the whole document, retrying
/// it as one unit.
async fn process_pdf(item: &WorkItem, config: &BatchConfig) -> OutcomeRecord {
    let source = item.source.as_path();
    // item.output is <root>/<stem>/<stem>.md; the analyzer wants <root>.
    let root = item
        .output
        .parent()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let root = root.as_path();
    let label = source.display().to_string();

    let result = retry::execute(&config.retry_policy(), &label, move |_| async move {
        let analyzer = DocumentAnalyzer::from_config(config);
        let doc = analyzer.analyze(source, root).await?;
        Ok::<_, RecognitionError>(Some(doc))
    })
    .await;

    match result {
        Attempted::Found { value, attempts } if value.pages == 0 => {
            OutcomeRecord::no_text(source, &value.markdown_path, attempts)
        }
        Attempted::Found { value, attempts } => {
            OutcomeRecord::success(source, &value.markdown_path, Vec::new(), attempts)
        }
        Attempted::Empty { attempts } => OutcomeRecord::no_text(source, &item.output, attempts),
        Attempted::Failed { error, attempts } => {
            OutcomeRecord::failed(source, &item.output, error.to_string(), attempts)
        }
    }
}

async fn create_output_dir(dir: &Path) -> Result<(), OcrBatchError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| OcrBatchError::OutputWriteFailed {
            path: dir.to_path_buf(),
            source: e,
        })
}

fn empty_summary(start: Instant) -> BatchSummary {
    BatchSummary {
        outcomes: Vec::new(),
        report_path: None,
        duration_ms: start.elapsed().as_millis() as u64,
    }
}

/// Persist the report and package the summary. A report failure is logged,
/// not returned: the per-item artifacts are already on disk.
async fn finish(
    outcomes: Vec<OutcomeRecord>,
    output_dir: &Path,
    config: &BatchConfig,
    start: Instant,
) -> BatchSummary {
    let report_path = match report::write_report(&outcomes, output_dir, &config.report_file_name)
        .await
    {
        Ok(path) => Some(path),
        Err(e) => {
            error!("{}", e);
            None
        }
    };

    let summary = BatchSummary {
        outcomes,
        report_path,
        duration_ms: start.elapsed().as_millis() as u64,
    };
    info!(
        "Done: {} succeeded, {} without text, {} failed in {}ms",
        summary.succeeded(),
        summary.no_text(),
        summary.failed(),
        summary.duration_ms
    );
    summary
}

// ── Synchronous wrappers ─────────────────────────────────────────────────

fn runtime() -> Result<tokio::runtime::Runtime, OcrBatchError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| OcrBatchError::Internal(format!("Failed to create tokio runtime: {}", e)))
}

/// Synchronous wrapper around [`ocr_images`].
///
/// Creates a temporary tokio runtime internally.
pub fn ocr_images_sync(
    input_dir: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &BatchConfig,
) -> Result<BatchSummary, OcrBatchError> {
    runtime()?.block_on(ocr_images(input_dir, output_dir, config))
}

/// Synchronous wrapper around [`annotate_markdown`].
pub fn annotate_markdown_sync(
    input_dir: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &BatchConfig,
) -> Result<BatchSummary, OcrBatchError> {
    runtime()?.block_on(annotate_markdown(input_dir, output_dir, config))
}

/// Synchronous wrapper around [`convert_pdfs`].
pub fn convert_pdfs_sync<P: AsRef<Path>>(
    input_dirs: &[P],
    output_root: impl AsRef<Path>,
    config: &BatchConfig,
) -> Result<BatchSummary, OcrBatchError> {
    runtime()?.block_on(convert_pdfs(input_dirs, output_root, config))
}
