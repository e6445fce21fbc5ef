//! Bounded retry around one unit of work.
//!
//! [`execute`] drives an attempt closure up to `max_retries` times and always
//! comes back with an [`Attempted`] value, never a panic or a bare error.
//! The closure is expected to build its engine *inside* the attempt future:
//! when an attempt fails, its future is dropped and the engine with it, so
//! the next attempt starts from a clean instance.
//!
//! ```text
//! attempt 1 ──Err──▶ sleep(delay) ──▶ attempt 2 ──Err──▶ … ──▶ Failed
//!     │                                  │
//!     ├─ Ok(Some) ──▶ Found              ├─ Ok(Some) ──▶ Found
//!     └─ Ok(None) ──▶ Empty              └─ Ok(None) ──▶ Empty
//! ```
//!
//! "Nothing found" is a result, not a failure, and is never retried.

use crate::engine::{ImageRecognizer, RecognizerFactory};
use crate::error::RecognitionError;
use crate::output::OutcomeRecord;
use crate::pipeline::discover::WorkItem;
use crate::pipeline::persist;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per item. `0` behaves like `1`.
    pub max_retries: u32,
    /// Fixed pause after a failed attempt.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// A policy with no pause between attempts.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            delay: Duration::ZERO,
        }
    }

    fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }
}

/// Terminal result of [`execute`].
#[derive(Debug, Clone, PartialEq)]
pub enum Attempted<T> {
    /// An attempt produced a value.
    Found { value: T, attempts: u32 },
    /// An attempt completed but found nothing.
    Empty { attempts: u32 },
    /// Every attempt failed, or the error was not retryable.
    Failed {
        error: RecognitionError,
        attempts: u32,
    },
}

impl<T> Attempted<T> {
    pub fn attempts(&self) -> u32 {
        match self {
            Attempted::Found { attempts, .. }
            | Attempted::Empty { attempts }
            | Attempted::Failed { attempts, .. } => *attempts,
        }
    }
}

/// Run `attempt` until it succeeds, finds nothing, or the policy runs out.
///
/// `attempt` receives the 1-based attempt number. `label` only appears in
/// log lines.
pub async fn execute<T, F, Fut>(policy: &RetryPolicy, label: &str, mut attempt: F) -> Attempted<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<T>, RecognitionError>>,
{
    let max = policy.attempts();
    let mut n = 0;

    loop {
        n += 1;
        debug!("{}: attempt {}/{}", label, n, max);

        match attempt(n).await {
            Ok(Some(value)) => return Attempted::Found { value, attempts: n },
            Ok(None) => return Attempted::Empty { attempts: n },
            Err(error) if !error.is_retryable() => {
                warn!("{}: {}", label, error);
                return Attempted::Failed { error, attempts: n };
            }
            Err(error) if n >= max => {
                warn!("{}: giving up after {} attempts: {}", label, n, error);
                return Attempted::Failed { error, attempts: n };
            }
            Err(error) => {
                warn!(
                    "{}: attempt {}/{} failed: {}; retrying in {:?}",
                    label, n, max, error, policy.delay
                );
                if !policy.delay.is_zero() {
                    tokio::time::sleep(policy.delay).await;
                }
            }
        }
    }
}

/// Per-item function of the image batch.
///
/// Each attempt builds a fresh engine, recognises `item.source` and, when
/// text was found, writes it to `item.output` before the record is produced.
pub async fn process_image<F>(item: &WorkItem, factory: &F, policy: &RetryPolicy) -> OutcomeRecord
where
    F: RecognizerFactory,
{
    let source = item.source.as_path();
    let output = item.output.as_path();
    let label = source.display().to_string();

    let result = execute(policy, &label, move |_| async move {
        let engine = factory.create()?;
        let Some(texts) = engine.text_only(source).await? else {
            return Ok(None);
        };
        persist::write_lines(output, &texts).await?;
        Ok::<_, RecognitionError>(Some(texts))
    })
    .await;

    match result {
        Attempted::Found { value, attempts } => {
            info!(
                "{} → {} ({} lines)",
                source.display(),
                output.display(),
                value.len()
            );
            OutcomeRecord::success(source, output, value, attempts)
        }
        Attempted::Empty { attempts } => {
            info!("{}: no text found", source.display());
            OutcomeRecord::no_text(source, output, attempts)
        }
        Attempted::Failed { error, attempts } => {
            OutcomeRecord::failed(source, output, error.to_string(), attempts)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TextLine;
    use crate::output::OutcomeStatus;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn transient() -> RecognitionError {
        RecognitionError::Provider {
            detail: "503".into(),
        }
    }

    #[tokio::test]
    async fn always_failing_is_called_max_retries_times() {
        let calls = AtomicUsize::new(0);
        let result: Attempted<()> = execute(&RetryPolicy::immediate(3), "t", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(transient()) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(result, Attempted::Failed { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn succeeds_after_k_failures() {
        let calls = AtomicUsize::new(0);
        let result = execute(&RetryPolicy::immediate(3), "t", |n| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n <= 2 {
                    Err(transient())
                } else {
                    Ok(Some(n))
                }
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            result,
            Attempted::Found {
                value: 3,
                attempts: 3
            }
        );
    }

    #[tokio::test]
    async fn empty_is_not_retried() {
        let calls = AtomicUsize::new(0);
        let result: Attempted<()> = execute(&RetryPolicy::immediate(5), "t", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(None) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result, Attempted::Empty { attempts: 1 });
    }

    #[tokio::test]
    async fn missing_source_short_circuits() {
        let calls = AtomicUsize::new(0);
        let result: Attempted<()> = execute(&RetryPolicy::immediate(3), "t", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(RecognitionError::SourceMissing {
                    path: "gone.png".into(),
                })
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.attempts(), 1);
    }

    #[tokio::test]
    async fn zero_retries_still_attempts_once() {
        let calls = AtomicUsize::new(0);
        let _: Attempted<()> = execute(&RetryPolicy::immediate(0), "t", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(transient()) }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sleeps_between_attempts() {
        let policy = RetryPolicy {
            max_retries: 3,
            delay: Duration::from_secs(5),
        };
        let start = tokio::time::Instant::now();
        let _: Attempted<()> = execute(&policy, "t", |_| async { Err(transient()) }).await;
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    struct Flaky {
        remaining_failures: Arc<AtomicUsize>,
    }

    impl ImageRecognizer for Flaky {
        async fn recognize(&self, _image: &Path) -> Result<Vec<TextLine>, RecognitionError> {
            let left = self.remaining_failures.load(Ordering::SeqCst);
            if left > 0 {
                self.remaining_failures.fetch_sub(1, Ordering::SeqCst);
                return Err(transient());
            }
            Ok(vec![TextLine::plain("Hello"), TextLine::plain("World")])
        }
    }

    #[tokio::test]
    async fn process_image_writes_text_after_retry() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.png");
        std::fs::write(&source, b"png").unwrap();
        let item = WorkItem::new(&source, dir.path().join("out/a.txt"));

        let failures = Arc::new(AtomicUsize::new(1));
        let created = Arc::new(AtomicUsize::new(0));
        let factory = {
            let failures = Arc::clone(&failures);
            let created = Arc::clone(&created);
            move || {
                created.fetch_add(1, Ordering::SeqCst);
                Ok::<_, RecognitionError>(Flaky {
                    remaining_failures: Arc::clone(&failures),
                })
            }
        };

        let record = process_image(&item, &factory, &RetryPolicy::immediate(3)).await;

        assert_eq!(record.status, OutcomeStatus::Success);
        assert_eq!(record.attempts, 2);
        assert_eq!(created.load(Ordering::SeqCst), 2, "one engine per attempt");
        assert_eq!(
            std::fs::read_to_string(&item.output).unwrap(),
            "Hello\nWorld\n"
        );
    }

    #[tokio::test]
    async fn process_image_missing_source_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let item = WorkItem::new(dir.path().join("gone.png"), dir.path().join("gone.txt"));
        let factory = || {
            Ok::<_, RecognitionError>(Flaky {
                remaining_failures: Arc::new(AtomicUsize::new(0)),
            })
        };

        let record = process_image(&item, &factory, &RetryPolicy::immediate(3)).await;

        assert_eq!(record.status, OutcomeStatus::Error);
        assert_eq!(record.attempts, 1);
        assert!(record.error.unwrap().contains("source not found"));
        assert!(!item.output.exists());
    }
}
