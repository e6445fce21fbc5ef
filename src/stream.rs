//! Streaming image batch: emit outcomes as items complete.
//!
//! Unlike [`crate::convert::ocr_images`], which returns after the whole batch
//! and writes the report, [`ocr_images_stream`] yields each
//! [`OutcomeRecord`] as soon as its item finishes. Records arrive in
//! completion order. No report is written; collect the records and call
//! [`crate::pipeline::report::write_report`] if you need one.
//!
//! The progress callback receives `on_batch_complete` once the last record
//! has been yielded; a stream dropped early never sends it.

use crate::config::BatchConfig;
use crate::convert::image_items;
use crate::engine::{EngineFactory, RecognizerFactory};
use crate::error::OcrBatchError;
use crate::output::OutcomeRecord;
use crate::pipeline::{batch, discover, retry};
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of outcome records.
pub type OutcomeStream = Pin<Box<dyn Stream<Item = OutcomeRecord> + Send>>;

/// OCR every image under `input_dir`, streaming outcomes.
///
/// # Example
/// ```rust,no_run
/// use edgequake_ocrbatch::{ocr_images_stream, BatchConfig};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = BatchConfig::default();
/// let mut outcomes = ocr_images_stream("scans", "out", &config).await?;
/// while let Some(record) = outcomes.next().await {
///     println!("{}: {:?}", record.source_path.display(), record.status);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn ocr_images_stream(
    input_dir: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &BatchConfig,
) -> Result<OutcomeStream, OcrBatchError> {
    discover::ensure_input_dir(input_dir.as_ref())?;
    let factory = EngineFactory::new(config);
    factory.preflight()?;
    ocr_images_stream_with(input_dir, output_dir, config, factory).await
}

/// [`ocr_images_stream`] with a caller-supplied engine factory.
pub async fn ocr_images_stream_with<F>(
    input_dir: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &BatchConfig,
    factory: F,
) -> Result<OutcomeStream, OcrBatchError>
where
    F: RecognizerFactory + 'static,
{
    let (input_dir, output_dir) = (input_dir.as_ref(), output_dir.as_ref());
    info!(
        "Streaming OCR: {} → {}",
        input_dir.display(),
        output_dir.display()
    );

    let items = image_items(input_dir, output_dir)?;
    let total = items.len();
    let progress = config.progress_callback.clone();
    if let Some(ref cb) = progress {
        cb.on_batch_start(total);
    }

    let factory = Arc::new(factory);
    let policy = config.retry_policy();
    let succeeded = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&succeeded);
    let outcomes = batch::dispatch(items, config.worker_count, progress.clone(), move |item| {
        let factory = Arc::clone(&factory);
        let policy = policy.clone();
        async move { retry::process_image(&item, &*factory, &policy).await }
    })
    .inspect(move |record| {
        if record.is_success() {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    // Emits nothing; fires the completion event after the last record.
    let finished = stream::once(async move {
        if let Some(cb) = progress {
            cb.on_batch_complete(total, succeeded.load(Ordering::SeqCst));
        }
    })
    .filter_map(|()| async { None::<OutcomeRecord> });

    Ok(Box::pin(outcomes.chain(finished)))
}
