//! Configuration types for batch OCR runs.
//!
//! All batch behaviour is controlled through [`BatchConfig`], built via its
//! [`BatchConfigBuilder`]. The same config drives the three entry points
//! (image folders, markdown trees, PDF folders); fields that only matter to
//! one of them are simply ignored by the others.

use crate::error::OcrBatchError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for a batch run.
///
/// Built via [`BatchConfig::builder()`] or using [`BatchConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_ocrbatch::{BatchConfig, EngineKind};
///
/// let config = BatchConfig::builder()
///     .worker_count(4)
///     .max_retries(2)
///     .engine(EngineKind::Command)
///     .ocr_command("paddleocr-lines")
///     .build()
///     .unwrap();
/// assert_eq!(config.worker_count, 4);
/// ```
#[derive(Clone)]
pub struct BatchConfig {
    /// Number of items processed at the same time. Default: 2.
    ///
    /// Every worker hosts its own engine instance, so memory and GPU pressure
    /// grow linearly with this value.
    pub worker_count: usize,

    /// Attempts per item before it is recorded as an error. Default: 3.
    pub max_retries: u32,

    /// Fixed delay between two attempts of the same item. Default: 5000 ms.
    pub retry_delay_ms: u64,

    /// Ask the engine to use the GPU. Default: false.
    ///
    /// Forwarded to the command engine as `{gpu}` and `OCRBATCH_USE_GPU`;
    /// the vision engine ignores it.
    pub use_gpu: bool,

    /// Which OCR engine recognises images. Default: [`EngineKind::Vision`].
    pub engine: EngineKind,

    /// LLM model identifier for the vision engine, e.g. "gpt-4.1-nano".
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for vision calls. Default: 0.0.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate per image or page. Default: 4096.
    pub max_tokens: usize,

    /// Custom prompt for image OCR. If None, uses the built-in default.
    pub system_prompt: Option<String>,

    /// Program run by the command engine, once per attempt.
    pub ocr_command: Option<String>,

    /// Arguments for `ocr_command`. `{image}` and `{gpu}` are substituted;
    /// without an `{image}` placeholder the image path is appended.
    pub ocr_args: Vec<String>,

    /// Markers surrounding the text spliced into markdown.
    pub markers: SpliceMarkers,

    /// Name of the asset directory that sits next to each markdown document.
    /// Default: "images".
    pub images_dir_name: String,

    /// File name of the JSON report in the output directory.
    /// Default: "processing_report.json".
    pub report_file_name: String,

    /// Rendering DPI for OCR-mode PDF pages. Range: 72–400. Default: 150.
    pub dpi: u32,

    /// Longest edge of a rendered PDF page in pixels. Default: 2000.
    pub max_rendered_pixels: u32,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Average non-whitespace characters per page at or above which a PDF is
    /// parsed from its text layer instead of OCR. Default: 32.
    pub text_mode_min_chars: usize,

    /// Optional per-item progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            worker_count: 2,
            max_retries: 3,
            retry_delay_ms: 5000,
            use_gpu: false,
            engine: EngineKind::default(),
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 4096,
            system_prompt: None,
            ocr_command: None,
            ocr_args: Vec::new(),
            markers: SpliceMarkers::default(),
            images_dir_name: "images".to_string(),
            report_file_name: "processing_report.json".to_string(),
            dpi: 150,
            max_rendered_pixels: 2000,
            password: None,
            text_mode_min_chars: 32,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for BatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchConfig")
            .field("worker_count", &self.worker_count)
            .field("max_retries", &self.max_retries)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("use_gpu", &self.use_gpu)
            .field("engine", &self.engine)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("ocr_command", &self.ocr_command)
            .field("ocr_args", &self.ocr_args)
            .field("markers", &self.markers)
            .field("images_dir_name", &self.images_dir_name)
            .field("report_file_name", &self.report_file_name)
            .field("dpi", &self.dpi)
            .field("text_mode_min_chars", &self.text_mode_min_chars)
            .finish()
    }
}

impl BatchConfig {
    /// Create a new builder for `BatchConfig`.
    pub fn builder() -> BatchConfigBuilder {
        BatchConfigBuilder {
            config: Self::default(),
        }
    }

    /// The retry policy derived from `max_retries` and `retry_delay_ms`.
    pub fn retry_policy(&self) -> crate::pipeline::retry::RetryPolicy {
        crate::pipeline::retry::RetryPolicy {
            max_retries: self.max_retries,
            delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

/// Builder for [`BatchConfig`].
#[derive(Debug)]
pub struct BatchConfigBuilder {
    config: BatchConfig,
}

impl BatchConfigBuilder {
    pub fn worker_count(mut self, n: usize) -> Self {
        self.config.worker_count = n.max(1);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n.max(1);
        self
    }

    pub fn retry_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry_delay_ms = ms;
        self
    }

    pub fn use_gpu(mut self, v: bool) -> Self {
        self.config.use_gpu = v;
        self
    }

    pub fn engine(mut self, kind: EngineKind) -> Self {
        self.config.engine = kind;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn ocr_command(mut self, program: impl Into<String>) -> Self {
        self.config.ocr_command = Some(program.into());
        self
    }

    pub fn ocr_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.ocr_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn markers(mut self, markers: SpliceMarkers) -> Self {
        self.config.markers = markers;
        self
    }

    pub fn images_dir_name(mut self, name: impl Into<String>) -> Self {
        self.config.images_dir_name = name.into();
        self
    }

    pub fn report_file_name(mut self, name: impl Into<String>) -> Self {
        self.config.report_file_name = name.into();
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn text_mode_min_chars(mut self, n: usize) -> Self {
        self.config.text_mode_min_chars = n;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<BatchConfig, OcrBatchError> {
        let c = &self.config;
        if c.worker_count == 0 {
            return Err(OcrBatchError::InvalidConfig(
                "worker count must be ≥ 1".into(),
            ));
        }
        if c.engine == EngineKind::Command
            && c.ocr_command.as_deref().is_none_or(|p| p.trim().is_empty())
        {
            return Err(OcrBatchError::InvalidConfig(
                "the command engine needs an OCR program (--ocr-command)".into(),
            ));
        }
        if c.markers.open.is_empty() || c.markers.close.is_empty() {
            return Err(OcrBatchError::InvalidConfig(
                "splice markers must not be empty".into(),
            ));
        }
        if c.report_file_name.contains(['/', '\\']) {
            return Err(OcrBatchError::InvalidConfig(format!(
                "report file name must be a plain file name, got '{}'",
                c.report_file_name
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// OCR engine used for images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// Vision LLM through `edgequake-llm` (default).
    #[default]
    Vision,
    /// External OCR program, one process per attempt.
    Command,
}

/// Markers written around recognised text in annotated markdown.
///
/// The block inserted before an image reference is
/// `{open}\n{text}\n{close}\n`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpliceMarkers {
    pub open: String,
    pub close: String,
}

impl Default for SpliceMarkers {
    fn default() -> Self {
        Self {
            open: "\"\"\"图片".to_string(),
            close: "图片\"\"\"".to_string(),
        }
    }
}

impl SpliceMarkers {
    /// The block inserted before a reference, ending in a newline.
    pub fn block(&self, texts: &[String]) -> String {
        format!("{}\n{}\n{}\n", self.open, texts.join("\n"), self.close)
    }

    /// Render the block followed by `snippet`.
    pub fn render(&self, texts: &[String], snippet: &str) -> String {
        format!("{}{}", self.block(texts), snippet)
    }
}
