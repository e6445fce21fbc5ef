//! Parallel batch runner.
//!
//! Every work item becomes its own `tokio::spawn`ed task, and at most
//! `worker_count` of them are in flight at once (`buffer_unordered`). Outcomes
//! come back in completion order. A task that panics is reported as an error
//! record for its item, so the batch always yields exactly one record per
//! submitted item.

use crate::error::RecognitionError;
use crate::output::{OutcomeRecord, OutcomeStatus};
use crate::pipeline::discover::WorkItem;
use crate::progress::ProgressCallback;
use futures::stream::{self, Stream, StreamExt};
use std::future::Future;
use tracing::{error, info};

/// Run `per_item` over `items` with bounded parallelism, yielding each
/// outcome as soon as its item completes.
pub fn dispatch<F, Fut>(
    items: Vec<WorkItem>,
    worker_count: usize,
    progress: Option<ProgressCallback>,
    per_item: F,
) -> impl Stream<Item = OutcomeRecord> + Send
where
    F: Fn(WorkItem) -> Fut + Send + 'static,
    Fut: Future<Output = OutcomeRecord> + Send + 'static,
{
    stream::iter(items)
        .map(move |item| {
            let progress = progress.clone();
            let task = per_item(item.clone());
            async move {
                if let Some(ref cb) = progress {
                    cb.on_item_start(&item.source);
                }

                let record = match tokio::spawn(task).await {
                    Ok(record) => record,
                    Err(e) => {
                        error!("Worker for {} aborted: {}", item.source.display(), e);
                        let err = RecognitionError::TaskPanicked {
                            detail: e.to_string(),
                        };
                        OutcomeRecord::failed(item.source, item.output, err.to_string(), 1)
                    }
                };

                if let Some(ref cb) = progress {
                    cb.on_item_complete(&record);
                }
                record
            }
        })
        .buffer_unordered(worker_count.max(1))
}

/// [`dispatch`] to completion, with batch-level progress events.
pub async fn run<F, Fut>(
    items: Vec<WorkItem>,
    worker_count: usize,
    progress: Option<ProgressCallback>,
    per_item: F,
) -> Vec<OutcomeRecord>
where
    F: Fn(WorkItem) -> Fut + Send + 'static,
    Fut: Future<Output = OutcomeRecord> + Send + 'static,
{
    let total = items.len();
    info!("Processing {} items with {} workers", total, worker_count.max(1));
    if let Some(ref cb) = progress {
        cb.on_batch_start(total);
    }

    let outcomes: Vec<OutcomeRecord> = dispatch(items, worker_count, progress.clone(), per_item)
        .collect()
        .await;

    let succeeded = outcomes
        .iter()
        .filter(|r| r.status == OutcomeStatus::Success)
        .count();
    info!("Batch complete: {}/{} succeeded", succeeded, total);
    if let Some(ref cb) = progress {
        cb.on_batch_complete(total, succeeded);
    }
    outcomes
}
