//! Image recognition engines.
//!
//! An engine turns one image into text segments and nothing more: no retry,
//! no parallelism. Those live in [`crate::pipeline`].
//!
//! ```text
//! RecognizerFactory ──create()──▶ ImageRecognizer ──recognize()──▶ Vec<TextLine>
//!   (one per batch)                (one per attempt)
//! ```
//!
//! Engines are cheap wrappers but are still built fresh for every attempt, so
//! whatever state a failed attempt left behind (a half-dead child process, a
//! poisoned client) is dropped with it.
//!
//! * [`vision`] : vision LLM through `edgequake-llm`
//! * [`command`]: external OCR program, one OS process per call
//! * [`encode`] : image file → base64 PNG for the vision engine

pub mod command;
pub mod encode;
pub mod vision;

use crate::config::{BatchConfig, EngineKind};
use crate::error::{OcrBatchError, RecognitionError};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::Path;

pub use command::CommandRecognizer;
pub use vision::VisionRecognizer;

/// Quadrilateral text box, clockwise from the top-left corner.
pub type Quad = [[f32; 2]; 4];

/// One recognised text segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    pub text: String,
    /// Box around the segment, when the engine reports one.
    #[serde(rename = "box", default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Quad>,
    /// Engine confidence in `[0, 1]`, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl TextLine {
    /// A segment without geometry or confidence.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bbox: None,
            confidence: None,
        }
    }
}

/// A single-image recognition call.
pub trait ImageRecognizer: Send + Sync {
    /// Recognise every text segment in `image`.
    fn recognize(
        &self,
        image: &Path,
    ) -> impl Future<Output = Result<Vec<TextLine>, RecognitionError>> + Send;

    /// Text-only projection of [`recognize`](Self::recognize).
    ///
    /// Returns `Ok(None)` when nothing legible was found and
    /// [`RecognitionError::SourceMissing`] when `image` does not exist.
    fn text_only(
        &self,
        image: &Path,
    ) -> impl Future<Output = Result<Option<Vec<String>>, RecognitionError>> + Send {
        async move {
            if !image.exists() {
                return Err(RecognitionError::SourceMissing {
                    path: image.to_path_buf(),
                });
            }
            let texts: Vec<String> = self
                .recognize(image)
                .await?
                .into_iter()
                .map(|line| line.text)
                .filter(|text| !text.trim().is_empty())
                .collect();
            Ok((!texts.is_empty()).then_some(texts))
        }
    }
}

/// Builds one engine per attempt.
pub trait RecognizerFactory: Send + Sync {
    type Recognizer: ImageRecognizer + 'static;

    fn create(&self) -> Result<Self::Recognizer, RecognitionError>;
}

impl<F, R> RecognizerFactory for F
where
    F: Fn() -> Result<R, RecognitionError> + Send + Sync,
    R: ImageRecognizer + 'static,
{
    type Recognizer = R;

    fn create(&self) -> Result<R, RecognitionError> {
        self()
    }
}

/// The engine selected by [`BatchConfig::engine`].
pub enum Engine {
    Vision(VisionRecognizer),
    Command(CommandRecognizer),
}

impl ImageRecognizer for Engine {
    async fn recognize(&self, image: &Path) -> Result<Vec<TextLine>, RecognitionError> {
        match self {
            Engine::Vision(v) => v.recognize(image).await,
            Engine::Command(c) => c.recognize(image).await,
        }
    }
}

/// Config-driven [`RecognizerFactory`].
#[derive(Debug, Clone)]
pub struct EngineFactory {
    config: BatchConfig,
}

impl EngineFactory {
    pub fn new(config: &BatchConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Build one engine up front so a misconfigured provider stops the batch
    /// before any item is submitted.
    pub fn preflight(&self) -> Result<(), OcrBatchError> {
        match self.config.engine {
            EngineKind::Vision => vision::resolve_provider(&self.config).map(|_| ()),
            EngineKind::Command => CommandRecognizer::from_config(&self.config)
                .map(|_| ())
                .map_err(|e| OcrBatchError::InvalidConfig(e.to_string())),
        }
    }
}

impl RecognizerFactory for EngineFactory {
    type Recognizer = Engine;

    fn create(&self) -> Result<Engine, RecognitionError> {
        match self.config.engine {
            EngineKind::Vision => VisionRecognizer::from_config(&self.config).map(Engine::Vision),
            EngineKind::Command => {
                CommandRecognizer::from_config(&self.config).map(Engine::Command)
            }
        }
    }
}
