//! Vision-LLM OCR engine.
//!
//! Sends one image per request and reads the reply as one text segment per
//! line. The engine performs exactly one provider call per `recognize`; the
//! retry loop lives in [`crate::pipeline::retry`].

use crate::config::BatchConfig;
use crate::engine::encode;
use crate::engine::{ImageRecognizer, TextLine};
use crate::error::{OcrBatchError, RecognitionError};
use crate::prompts::{IMAGE_OCR_PROMPT, NO_TEXT_SENTINEL};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Model used when neither the config nor the environment names one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// OCR through a vision-capable LLM provider.
pub struct VisionRecognizer {
    provider: Arc<dyn LLMProvider>,
    prompt: String,
    temperature: f32,
    max_tokens: usize,
}

impl VisionRecognizer {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            prompt: IMAGE_OCR_PROMPT.to_string(),
            temperature: 0.0,
            max_tokens: 4096,
        }
    }

    pub fn from_config(config: &BatchConfig) -> Result<Self, RecognitionError> {
        let provider = resolve_provider(config).map_err(|e| RecognitionError::EngineInit {
            detail: e.to_string(),
        })?;
        Ok(Self {
            provider,
            prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| IMAGE_OCR_PROMPT.to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    /// One raw provider round-trip with `system` as the instruction.
    ///
    /// Shared with OCR-mode PDF pages, which use a different prompt.
    pub(crate) async fn complete(
        &self,
        system: &str,
        image: ImageData,
    ) -> Result<String, RecognitionError> {
        let start = Instant::now();
        let messages = vec![
            ChatMessage::system(system),
            ChatMessage::user_with_images("", vec![image]),
        ];
        let options = CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| RecognitionError::Provider {
                detail: e.to_string(),
            })?;

        debug!(
            "{} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );
        Ok(response.content)
    }
}

impl ImageRecognizer for VisionRecognizer {
    async fn recognize(&self, image: &Path) -> Result<Vec<TextLine>, RecognitionError> {
        let path = image.to_path_buf();
        let data = tokio::task::spawn_blocking(move || encode::encode_image_file(&path))
            .await
            .map_err(|e| RecognitionError::TaskPanicked {
                detail: format!("image encoding task: {e}"),
            })??;

        let reply = self.complete(&self.prompt, data).await?;
        Ok(parse_reply(&reply))
    }
}

/// Split a model reply into segments.
///
/// Code-fence lines are dropped (models add them despite the prompt) and the
/// no-text sentinel yields an empty result.
pub fn parse_reply(reply: &str) -> Vec<TextLine> {
    let lines: Vec<&str> = reply
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("```"))
        .collect();

    if lines.len() == 1 && lines[0] == NO_TEXT_SENTINEL {
        return Vec::new();
    }
    lines.into_iter().map(TextLine::plain).collect()
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. **Pre-built provider** (`config.provider`)
/// 2. **Named provider + model** (`config.provider_name`)
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`)
/// 4. **OpenAI key present** (`OPENAI_API_KEY`)
/// 5. **Full auto-detection** (`ProviderFactory::from_env`)
pub(crate) fn resolve_provider(
    config: &BatchConfig,
) -> Result<Arc<dyn LLMProvider>, OcrBatchError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| OcrBatchError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or use --engine command.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, OcrBatchError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        OcrBatchError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_reply_splits_lines() {
        let lines = parse_reply("Hello\n\n  World  \n");
        let texts: Vec<_> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["Hello", "World"]);
        assert!(lines.iter().all(|l| l.bbox.is_none()));
    }

    #[test]
    fn parse_reply_sentinel_is_empty() {
        assert!(parse_reply("NO_TEXT").is_empty());
        assert!(parse_reply("  NO_TEXT \n").is_empty());
    }

    #[test]
    fn parse_reply_strips_fences() {
        let lines = parse_reply("```text\n第一行\n第二行\n```");
        let texts: Vec<_> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["第一行", "第二行"]);
    }

    #[test]
    fn sentinel_inside_longer_reply_is_text() {
        let lines = parse_reply("NO_TEXT\nactually some text");
        assert_eq!(lines.len(), 2);
    }
}
