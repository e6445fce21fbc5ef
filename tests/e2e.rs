//! End-to-end tests for edgequake-ocrbatch.
//!
//! The offline tests drive the public batch entry points with in-process fake
//! recognizers over temporary directories, so they always run.
//!
//! The live tests make real vision-LLM calls and need libpdfium plus the
//! files in `./test_cases/`. They are gated behind `E2E_ENABLED`:
//!
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture

use edgequake_ocrbatch::{
    annotate_markdown_with, convert_pdfs, ocr_images, ocr_images_stream_with, ocr_images_with,
    BatchConfig, BatchProgressCallback, EngineKind, ImageRecognizer, OcrBatchError,
    OutcomeRecord, OutcomeStatus, RecognitionError, TextLine,
};
use futures::StreamExt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP — test input not found: {}", p.display());
            return;
        }
        p
    }};
}

fn fast_config() -> BatchConfig {
    BatchConfig::builder()
        .worker_count(2)
        .max_retries(3)
        .retry_delay_ms(0)
        .build()
        .unwrap()
}

fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, b"not really an image").unwrap();
}

/// Answers by file name:
/// * `blank*`  → nothing found
/// * `broken*` → provider error on every call
/// * `panic*`  → panics
/// * `first*`  → deletes `second.png` next to it, then answers normally
/// * anything else → "Hello", "World"
struct ByName;

impl ImageRecognizer for ByName {
    async fn recognize(&self, image: &Path) -> Result<Vec<TextLine>, RecognitionError> {
        let name = image.file_name().unwrap().to_string_lossy().into_owned();
        if name.starts_with("blank") {
            Ok(Vec::new())
        } else if name.starts_with("broken") {
            Err(RecognitionError::Provider {
                detail: "503 overloaded".into(),
            })
        } else if name.starts_with("panic") {
            panic!("engine crashed on {name}");
        } else {
            if name.starts_with("first") {
                let _ = fs::remove_file(image.with_file_name("second.png"));
            }
            Ok(vec![TextLine::plain("Hello"), TextLine::plain("World")])
        }
    }
}

fn by_name() -> Result<ByName, RecognitionError> {
    Ok(ByName)
}

// ── Image batch (offline) ────────────────────────────────────────────────────

#[tokio::test]
async fn test_images_mirror_tree_and_write_report() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    touch(&input.path().join("a.png"));
    touch(&input.path().join("nested/deeper/b.JPG"));
    touch(&input.path().join("blank.png"));
    touch(&input.path().join("notes.txt"));

    let summary = ocr_images_with(input.path(), output.path(), &fast_config(), by_name)
        .await
        .expect("batch should run");

    assert_eq!(summary.total(), 3, "notes.txt is not an image");
    assert_eq!(summary.succeeded(), 2);
    assert_eq!(summary.no_text(), 1);

    let a = fs::read_to_string(output.path().join("a.txt")).unwrap();
    assert_eq!(a, "Hello\nWorld\n");
    assert!(output.path().join("nested/deeper/b.txt").is_file());
    assert!(
        !output.path().join("blank.txt").exists(),
        "no artifact for an image without text"
    );

    let report_path = summary.report_path.clone().expect("report written");
    assert_eq!(report_path, output.path().join("processing_report.json"));
    let records: Vec<OutcomeRecord> =
        serde_json::from_str(&fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.attempts == 1));
}

#[tokio::test]
async fn test_images_failures_are_recorded_not_raised() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    touch(&input.path().join("broken.png"));
    touch(&input.path().join("ok.png"));

    let summary = ocr_images_with(input.path(), output.path(), &fast_config(), by_name)
        .await
        .unwrap();

    let broken = summary
        .find(&input.path().join("broken.png"))
        .expect("record for broken.png");
    assert_eq!(broken.status, OutcomeStatus::Error);
    assert_eq!(broken.attempts, 3);
    assert!(broken.error.as_deref().unwrap().contains("503 overloaded"));

    let ok = summary.find(&input.path().join("ok.png")).unwrap();
    assert_eq!(ok.status, OutcomeStatus::Success);
}

#[tokio::test]
async fn test_image_vanishing_after_discovery_is_an_error_record() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    touch(&input.path().join("first.png"));
    touch(&input.path().join("second.png"));

    // One worker: first.png runs, and removes second.png, before second.png starts.
    let config = BatchConfig::builder()
        .worker_count(1)
        .retry_delay_ms(0)
        .build()
        .unwrap();
    let summary = ocr_images_with(input.path(), output.path(), &config, by_name)
        .await
        .unwrap();

    let second = summary.find(&input.path().join("second.png")).unwrap();
    assert_eq!(second.status, OutcomeStatus::Error);
    assert_eq!(second.attempts, 1, "a missing source is not retried");
    assert!(!output.path().join("second.txt").exists());
    assert!(output.path().join("first.txt").exists());
}

#[tokio::test]
async fn test_panicking_engine_does_not_abort_batch() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    touch(&input.path().join("panic.png"));
    touch(&input.path().join("a.png"));
    touch(&input.path().join("b.png"));

    let summary = ocr_images_with(input.path(), output.path(), &fast_config(), by_name)
        .await
        .unwrap();

    assert_eq!(summary.total(), 3);
    assert_eq!(summary.succeeded(), 2);
    let panicked = summary.find(&input.path().join("panic.png")).unwrap();
    assert_eq!(panicked.status, OutcomeStatus::Error);
    assert!(summary.report_path.is_some());
}

#[tokio::test]
async fn test_report_keeps_non_ascii_text() {
    struct Invoice;
    impl ImageRecognizer for Invoice {
        async fn recognize(&self, _image: &Path) -> Result<Vec<TextLine>, RecognitionError> {
            Ok(vec![TextLine::plain("发票号码"), TextLine::plain("12345")])
        }
    }

    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    touch(&input.path().join("invoice.png"));

    let summary = ocr_images_with(input.path(), output.path(), &fast_config(), || {
        Ok::<_, RecognitionError>(Invoice)
    })
    .await
    .unwrap();

    let raw = fs::read_to_string(summary.report_path.unwrap()).unwrap();
    assert!(raw.contains("发票号码"), "report must not escape UTF-8: {raw}");
}

#[tokio::test]
async fn test_missing_input_dir_is_fatal() {
    let output = tempfile::tempdir().unwrap();
    let err = ocr_images_with("/definitely/not/here", output.path(), &fast_config(), by_name)
        .await
        .unwrap_err();
    assert!(matches!(err, OcrBatchError::InputNotFound { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_empty_input_dir_writes_no_report() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();

    let summary = ocr_images_with(input.path(), output.path(), &fast_config(), by_name)
        .await
        .unwrap();
    assert_eq!(summary.total(), 0);
    assert!(summary.report_path.is_none());
    assert!(!output.path().join("processing_report.json").exists());
}

#[tokio::test]
async fn test_progress_callback_sees_every_item() {
    #[derive(Default)]
    struct Counts {
        started: AtomicUsize,
        completed: AtomicUsize,
        total: AtomicUsize,
    }
    impl BatchProgressCallback for Counts {
        fn on_batch_start(&self, total_items: usize) {
            self.total.store(total_items, Ordering::SeqCst);
        }
        fn on_item_start(&self, _source: &Path) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }
        fn on_item_complete(&self, _record: &OutcomeRecord) {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }
    }

    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    for i in 0..5 {
        touch(&input.path().join(format!("img{i}.png")));
    }

    let counts = Arc::new(Counts::default());
    let config = BatchConfig::builder()
        .retry_delay_ms(0)
        .progress_callback(counts.clone())
        .build()
        .unwrap();
    ocr_images_with(input.path(), output.path(), &config, by_name)
        .await
        .unwrap();

    assert_eq!(counts.total.load(Ordering::SeqCst), 5);
    assert_eq!(counts.started.load(Ordering::SeqCst), 5);
    assert_eq!(counts.completed.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_stream_yields_one_record_per_image() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    touch(&input.path().join("a.png"));
    touch(&input.path().join("blank.png"));
    touch(&input.path().join("c.gif"));

    let stream = ocr_images_stream_with(input.path(), output.path(), &fast_config(), by_name)
        .await
        .unwrap();
    let records: Vec<OutcomeRecord> = stream.collect().await;

    assert_eq!(records.len(), 3);
    assert_eq!(records.iter().filter(|r| r.is_success()).count(), 2);
    assert!(
        !output.path().join("processing_report.json").exists(),
        "streaming never writes the report"
    );
}

#[tokio::test]
async fn test_stream_reports_batch_completion_after_last_record() {
    #[derive(Default)]
    struct Finish {
        yielded_before: AtomicUsize,
        seen: AtomicUsize,
        calls: AtomicUsize,
        succeeded: AtomicUsize,
    }
    impl BatchProgressCallback for Finish {
        fn on_item_complete(&self, _record: &OutcomeRecord) {
            self.seen.fetch_add(1, Ordering::SeqCst);
        }
        fn on_batch_complete(&self, _total_items: usize, succeeded: usize) {
            self.yielded_before
                .store(self.seen.load(Ordering::SeqCst), Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.succeeded.store(succeeded, Ordering::SeqCst);
        }
    }

    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    touch(&input.path().join("a.png"));
    touch(&input.path().join("b.png"));
    touch(&input.path().join("blank.png"));

    let finish = Arc::new(Finish::default());
    let config = BatchConfig::builder()
        .retry_delay_ms(0)
        .progress_callback(finish.clone())
        .build()
        .unwrap();
    let records: Vec<OutcomeRecord> =
        ocr_images_stream_with(input.path(), output.path(), &config, by_name)
            .await
            .unwrap()
            .collect()
            .await;

    assert_eq!(records.len(), 3);
    assert_eq!(finish.calls.load(Ordering::SeqCst), 1);
    assert_eq!(finish.yielded_before.load(Ordering::SeqCst), 3);
    assert_eq!(finish.succeeded.load(Ordering::SeqCst), 2);
}

#[cfg(unix)]
#[tokio::test]
async fn test_command_engine_through_public_entry_point() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    touch(&input.path().join("scan.png"));

    let config = BatchConfig::builder()
        .engine(EngineKind::Command)
        .ocr_command("sh")
        .ocr_args([
            "-c",
            r#"echo '[[[0,0],[9,0],[9,9],[0,9]], ["Total", 0.98]]'; echo '{"text": "42"}'"#,
            "sh",
            "{image}",
        ])
        .retry_delay_ms(0)
        .build()
        .unwrap();

    let summary = ocr_images(input.path(), output.path(), &config).await.unwrap();
    assert_eq!(summary.succeeded(), 1);
    let text = fs::read_to_string(output.path().join("scan.txt")).unwrap();
    assert_eq!(text, "Total\n42\n");
}

// ── Markdown batch (offline) ─────────────────────────────────────────────────

#[tokio::test]
async fn test_markdown_annotation_mirrors_tree() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let docs = input.path().join("guide");
    touch(&docs.join("images/fig.png"));
    fs::write(
        docs.join("intro.md"),
        "# Intro\n\nSee ![a](images/fig.png) and ![b](images/fig.png)\nEnd\n",
    )
    .unwrap();
    fs::write(input.path().join("plain.md"), "no images here\r\n").unwrap();

    let summary = annotate_markdown_with(input.path(), output.path(), &fast_config(), by_name)
        .await
        .unwrap();
    assert_eq!(summary.total(), 2);

    let annotated = fs::read_to_string(output.path().join("guide/intro.md")).unwrap();
    let block = "\"\"\"图片\nHello\nWorld\n图片\"\"\"\n";
    assert_eq!(
        annotated,
        format!("# Intro\n\nSee {block}![a](images/fig.png) and {block}![b](images/fig.png)\nEnd\n")
    );
    assert!(output.path().join("guide/images/fig.png").is_file());

    let plain = fs::read(output.path().join("plain.md")).unwrap();
    assert_eq!(plain, b"no images here\r\n");

    let intro = summary.find(&docs.join("intro.md")).unwrap();
    assert_eq!(intro.status, OutcomeStatus::Success);
    assert_eq!(intro.texts.len(), 4);
    let plain = summary.find(&input.path().join("plain.md")).unwrap();
    assert_eq!(plain.status, OutcomeStatus::NoTextFound);
    assert!(output.path().join("processing_report.json").is_file());
}

#[tokio::test]
async fn test_markdown_rerun_on_output_is_stable() {
    let input = tempfile::tempdir().unwrap();
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    touch(&input.path().join("images/x.png"));
    fs::write(input.path().join("doc.md"), "![x](images/x.png)\n").unwrap();

    annotate_markdown_with(input.path(), first.path(), &fast_config(), by_name)
        .await
        .unwrap();
    annotate_markdown_with(first.path(), second.path(), &fast_config(), by_name)
        .await
        .unwrap();

    let once = fs::read_to_string(first.path().join("doc.md")).unwrap();
    let twice = fs::read_to_string(second.path().join("doc.md")).unwrap();
    assert_eq!(once, twice, "annotating twice must not stack blocks");
}

// ── PDF batch (offline) ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_pdf_missing_input_dir_is_fatal() {
    let existing = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let dirs = [existing.path().to_path_buf(), PathBuf::from("/no/such/pdfs")];

    let err = convert_pdfs(&dirs, output.path(), &fast_config())
        .await
        .unwrap_err();
    assert!(matches!(err, OcrBatchError::InputNotFound { .. }), "got {err:?}");
    assert!(!output.path().join("processing_report.json").exists());
}

#[tokio::test]
async fn test_pdf_same_named_input_dirs_do_not_share_outputs() {
    let root = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let first = root.path().join("a/reports");
    let second = root.path().join("b/reports");
    fs::create_dir_all(&first).unwrap();
    fs::create_dir_all(&second).unwrap();
    fs::write(first.join("q1.pdf"), b"%PDF-1.4 garbage").unwrap();
    fs::write(second.join("q1.pdf"), b"%PDF-1.4 garbage").unwrap();

    let config = BatchConfig::builder()
        .max_retries(1)
        .retry_delay_ms(0)
        .build()
        .unwrap();
    let summary = convert_pdfs(&[&first, &second], output.path(), &config)
        .await
        .unwrap();

    assert_eq!(summary.total(), 2);
    let a = summary.find(&first.join("q1.pdf")).unwrap();
    let b = summary.find(&second.join("q1.pdf")).unwrap();
    assert_eq!(a.output_path, output.path().join("reports/q1/q1.md"));
    assert_eq!(b.output_path, output.path().join("reports-2/q1/q1.md"));
}

#[tokio::test]
async fn test_pdf_corrupt_file_is_an_error_record() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP — needs libpdfium; set E2E_ENABLED=1");
        return;
    }
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    fs::write(input.path().join("junk.pdf"), b"%PDF-1.4 garbage").unwrap();

    let config = BatchConfig::builder()
        .max_retries(2)
        .retry_delay_ms(0)
        .build()
        .unwrap();
    let summary = convert_pdfs(&[input.path()], output.path(), &config)
        .await
        .unwrap();

    assert_eq!(summary.failed(), 1);
    assert!(summary.report_path.is_some());
}

// ── Live tests (E2E_ENABLED) ─────────────────────────────────────────────────

#[tokio::test]
async fn test_live_vision_ocr_on_sample_images() {
    let dir = e2e_skip_unless_ready!(test_cases_dir().join("images"));
    let output = tempfile::tempdir().unwrap();

    let config = BatchConfig::builder()
        .worker_count(2)
        .retry_delay_ms(1000)
        .build()
        .unwrap();
    let summary = ocr_images(&dir, output.path(), &config)
        .await
        .expect("provider should be configured");

    println!(
        "{} ok / {} empty / {} failed in {}ms",
        summary.succeeded(),
        summary.no_text(),
        summary.failed(),
        summary.duration_ms
    );
    assert!(summary.total() > 0);
    assert_eq!(summary.failed(), 0, "{:#?}", summary.outcomes);
}

#[tokio::test]
async fn test_live_pdf_conversion() {
    let dir = e2e_skip_unless_ready!(test_cases_dir().join("pdfs"));
    let output = tempfile::tempdir().unwrap();

    let summary = convert_pdfs(&[&dir], output.path(), &fast_config())
        .await
        .unwrap();

    assert!(summary.total() > 0);
    for record in summary.outcomes.iter().filter(|r| r.is_success()) {
        let md = fs::read_to_string(&record.output_path).unwrap();
        assert!(!md.trim().is_empty(), "{} is empty", record.output_path.display());
    }
}
