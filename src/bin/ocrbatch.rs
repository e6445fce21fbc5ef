//! CLI binary for edgequake-ocrbatch.
//!
//! A thin shim over the library crate that maps CLI flags to `BatchConfig`,
//! runs one of the three batch modes and prints a summary.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_ocrbatch::{
    annotate_markdown, convert_pdfs, ocr_images, BatchConfig, BatchProgressCallback,
    BatchSummary, EngineKind, OcrBatchError, OutcomeRecord, OutcomeStatus, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Live progress bar with one log line per finished item. Items complete out
/// of order, so every line names its source.
struct CliProgressCallback {
    bar: ProgressBar,
    unit: &'static str,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new(unit: &'static str) -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Scanning");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            unit,
            errors: AtomicUsize::new(0),
        })
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_items: usize) {
        let style = ProgressStyle::with_template(&format!(
            "{{spinner:.cyan}} {{prefix:.bold}}  \
             [{{bar:42.green/238}}] {{pos:>4}}/{{len}} {}  \
             ⏱ {{elapsed_precise}}  ETA {{eta_precise}}",
            self.unit
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total_items as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Processing");
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {total_items} {}…", self.unit))
        ));
    }

    fn on_item_start(&self, source: &Path) {
        self.bar.set_message(display_name(source));
    }

    fn on_item_complete(&self, record: &OutcomeRecord) {
        let name = display_name(&record.source_path);
        let line = match record.status {
            OutcomeStatus::Success => format!(
                "  {} {}  {}",
                green("✓"),
                name,
                dim(&format!("{} lines", record.texts.len()))
            ),
            OutcomeStatus::NoTextFound => {
                format!("  {} {}  {}", yellow("○"), name, dim("no text"))
            }
            OutcomeStatus::Error => {
                self.errors.fetch_add(1, Ordering::SeqCst);
                let error = record.error.as_deref().unwrap_or("unknown error");
                let msg = if error.chars().count() > 80 {
                    format!("{}\u{2026}", error.chars().take(79).collect::<String>())
                } else {
                    error.to_string()
                };
                format!(
                    "  {} {}  {}  {}",
                    red("✗"),
                    name,
                    red(&msg),
                    dim(&format!("{} attempts", record.attempts))
                )
            }
        };
        self.bar.println(line);
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_items: usize, succeeded: usize) {
        self.bar.finish_and_clear();
        let errors = self.errors.load(Ordering::SeqCst);
        if errors == 0 {
            eprintln!(
                "{} {}/{} {} processed",
                green("✔"),
                bold(&succeeded.to_string()),
                total_items,
                self.unit
            );
        } else {
            eprintln!(
                "{} {}/{} {} succeeded  ({} failed)",
                if errors == total_items {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&succeeded.to_string()),
                total_items,
                self.unit,
                red(&errors.to_string()),
            );
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # OCR a folder of images (vision LLM, provider from the environment)
  ocrbatch images scans/
  #   → output/ocr_results/scans/<same tree>/<stem>.txt + processing_report.json

  # Annotate every markdown document with the text of its images
  ocrbatch markdown docs/ -o docs_with_ocr/

  # Convert several folders of PDFs
  ocrbatch pdf reports/ invoices/ -o output/

  # Use a local PaddleOCR wrapper on the GPU, 4 workers
  ocrbatch --engine command --ocr-command paddle-lines --ocr-arg '{image}' \
           --gpu -w 4 images scans/

COMMAND ENGINE PROTOCOL:
  The program is run once per attempt with the image path (or the `{image}`
  placeholder substituted). It prints one text segment per stdout line,
  either plain text, a JSON object {"text": ..., "box": ..., "confidence": ...}
  or a PaddleOCR line [[[x,y],…], ["text", score]]. A non-zero exit status is
  a failed attempt. OCRBATCH_USE_GPU is set to 1 or 0.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_PROVIDER      Same as --provider
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium for the `pdf` subcommand
  OCRBATCH_*              Fallback for every flag, e.g. OCRBATCH_WORKERS=4
"#;

/// Fault-tolerant batch OCR for image folders, markdown trees and PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "ocrbatch",
    version,
    about = "Fault-tolerant batch OCR for image folders, markdown trees and PDFs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// OCR every image into a mirrored tree of .txt files.
    Images {
        /// Folder of images (jpg, jpeg, png, bmp, tiff, gif), searched recursively.
        input_dir: PathBuf,

        /// Output folder. Default: output/ocr_results/<input folder name>.
        #[arg(short, long, env = "OCRBATCH_OUTPUT")]
        output: Option<PathBuf>,
    },

    /// Insert recognised image text above every image reference.
    Markdown {
        /// Folder of markdown documents, searched recursively.
        input_dir: PathBuf,

        /// Output folder for the annotated tree.
        #[arg(short, long, env = "OCRBATCH_OUTPUT", default_value = "output_with_ocr")]
        output: PathBuf,
    },

    /// Convert every PDF to Markdown plus an images folder.
    Pdf {
        /// One or more folders of PDFs.
        #[arg(required = true)]
        input_dirs: Vec<PathBuf>,

        /// Output root.
        #[arg(short, long, env = "OCRBATCH_OUTPUT", default_value = "output")]
        output: PathBuf,

        /// Rendering DPI for scanned pages (72–400).
        #[arg(long, env = "OCRBATCH_DPI", default_value_t = 150,
              value_parser = clap::value_parser!(u32).range(72..=400))]
        dpi: u32,

        /// PDF user password for encrypted documents.
        #[arg(long, env = "OCRBATCH_PASSWORD")]
        password: Option<String>,

        /// Average non-whitespace characters per page needed to use the text
        /// layer instead of OCR.
        #[arg(long, env = "OCRBATCH_TEXT_THRESHOLD", default_value_t = 32)]
        text_threshold: usize,
    },
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Ask the OCR engine to use the GPU.
    #[arg(long, global = true, env = "OCRBATCH_GPU")]
    gpu: bool,

    /// Items processed in parallel; every worker runs its own engine.
    #[arg(short, long, global = true, env = "OCRBATCH_WORKERS", default_value_t = 2)]
    workers: usize,

    /// Attempts per item before it is recorded as an error.
    #[arg(long, global = true, env = "OCRBATCH_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Seconds to wait between two attempts of the same item.
    #[arg(long, global = true, env = "OCRBATCH_RETRY_DELAY", default_value_t = 5.0)]
    retry_delay: f64,

    /// OCR engine for images.
    #[arg(long, global = true, env = "OCRBATCH_ENGINE", value_enum, default_value = "vision")]
    engine: EngineArg,

    /// Program run by the command engine.
    #[arg(long, global = true, env = "OCRBATCH_OCR_COMMAND")]
    ocr_command: Option<String>,

    /// Argument for --ocr-command; repeatable. `{image}` and `{gpu}` are substituted.
    #[arg(long = "ocr-arg", global = true, allow_hyphen_values = true)]
    ocr_args: Vec<String>,

    /// LLM model ID for the vision engine (e.g. gpt-4.1-nano, gpt-4.1).
    #[arg(long, global = true, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, global = true, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Path to a text file containing a custom OCR prompt.
    #[arg(long, global = true, env = "OCRBATCH_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Print the batch summary as JSON on stdout.
    #[arg(long, global = true, env = "OCRBATCH_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "OCRBATCH_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "OCRBATCH_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "OCRBATCH_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum EngineArg {
    Vision,
    Command,
}

impl From<EngineArg> for EngineKind {
    fn from(v: EngineArg) -> Self {
        match v {
            EngineArg::Vision => EngineKind::Vision,
            EngineArg::Command => EngineKind::Command,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let common = &cli.common;

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; --verbose brings them back.
    let show_progress = !common.quiet && !common.no_progress && !common.json;
    let filter = if common.verbose {
        "debug"
    } else if common.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let unit = match cli.command {
        Command::Images { .. } => "images",
        Command::Markdown { .. } => "documents",
        Command::Pdf { .. } => "PDFs",
    };
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new(unit) as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };

    let mut config = build_config(common, progress_cb).await?;

    let result = match &cli.command {
        Command::Images { input_dir, output } => {
            let output = output
                .clone()
                .unwrap_or_else(|| default_images_output(input_dir));
            ocr_images(input_dir, &output, &config).await
        }
        Command::Markdown { input_dir, output } => {
            annotate_markdown(input_dir, output, &config).await
        }
        Command::Pdf {
            input_dirs,
            output,
            dpi,
            password,
            text_threshold,
        } => {
            config.dpi = *dpi;
            config.password = password.clone();
            config.text_mode_min_chars = *text_threshold;
            convert_pdfs(input_dirs.as_slice(), output, &config).await
        }
    };

    let summary = match result {
        Ok(summary) => summary,
        Err(e @ (OcrBatchError::InputNotFound { .. } | OcrBatchError::NotADirectory { .. })) => {
            eprintln!("{} {}", red("error:"), e);
            std::process::exit(1);
        }
        Err(e) => return Err(e).context("Batch failed"),
    };

    if common.json {
        let json =
            serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?;
        println!("{json}");
    } else if !common.quiet {
        print_summary(&summary, show_progress);
    }

    Ok(())
}

/// `output/ocr_results/<input folder name>`.
fn default_images_output(input_dir: &Path) -> PathBuf {
    let name = input_dir
        .canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_os_string()))
        .or_else(|| input_dir.file_name().map(|n| n.to_os_string()))
        .unwrap_or_else(|| "input".into());
    PathBuf::from("output").join("ocr_results").join(name)
}

fn print_summary(summary: &BatchSummary, progress_shown: bool) {
    if summary.total() == 0 {
        eprintln!("{} nothing to process", yellow("○"));
        return;
    }
    if !progress_shown {
        eprintln!(
            "Processed {} items in {}ms: {} succeeded, {} without text, {} failed",
            summary.total(),
            summary.duration_ms,
            summary.succeeded(),
            summary.no_text(),
            summary.failed()
        );
    }
    match summary.report_path {
        Some(ref path) => eprintln!("   report  →  {}", bold(&path.display().to_string())),
        None => eprintln!("   {}", red("report could not be written")),
    }
}

/// Map CLI args to `BatchConfig`.
async fn build_config(
    common: &CommonArgs,
    progress: Option<ProgressCallback>,
) -> Result<BatchConfig> {
    let system_prompt = if let Some(ref path) = common.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    if !common.retry_delay.is_finite() || common.retry_delay < 0.0 {
        anyhow::bail!("--retry-delay must be a non-negative number of seconds");
    }

    let mut builder = BatchConfig::builder()
        .use_gpu(common.gpu)
        .worker_count(common.workers)
        .max_retries(common.max_retries)
        .retry_delay_ms((common.retry_delay * 1000.0).round() as u64)
        .engine(common.engine.into())
        .ocr_args(common.ocr_args.iter().cloned());

    if let Some(ref program) = common.ocr_command {
        builder = builder.ocr_command(program.clone());
    }
    if let Some(ref model) = common.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = common.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(prompt) = system_prompt {
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
