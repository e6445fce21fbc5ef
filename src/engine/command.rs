//! External-program OCR engine.
//!
//! Every `recognize` call spawns the configured program once, so each attempt
//! gets a brand-new engine process and a crash only takes that attempt down.
//! The child is killed if the attempt future is dropped.
//!
//! ## Output protocol
//!
//! The program prints one segment per stdout line, in any of these shapes:
//!
//! ```text
//! {"text": "Total", "box": [[0,0],[80,0],[80,20],[0,20]], "confidence": 0.98}
//! [[[0,0],[80,0],[80,20],[0,20]], ["Total", 0.98]]
//! Total
//! ```
//!
//! The second form is what PaddleOCR's Python API returns per line, so a
//! three-line wrapper script around it works unchanged.

use crate::config::BatchConfig;
use crate::engine::{ImageRecognizer, Quad, TextLine};
use crate::error::RecognitionError;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

const IMAGE_PLACEHOLDER: &str = "{image}";
const GPU_PLACEHOLDER: &str = "{gpu}";

/// Environment variable set on the child process: `1` when GPU use was
/// requested, `0` otherwise.
pub const GPU_ENV_VAR: &str = "OCRBATCH_USE_GPU";

/// OCR by running an external program per image.
#[derive(Debug, Clone)]
pub struct CommandRecognizer {
    program: String,
    args: Vec<String>,
    use_gpu: bool,
}

impl CommandRecognizer {
    pub fn new(program: impl Into<String>, args: Vec<String>, use_gpu: bool) -> Self {
        Self {
            program: program.into(),
            args,
            use_gpu,
        }
    }

    pub fn from_config(config: &BatchConfig) -> Result<Self, RecognitionError> {
        let program = config
            .ocr_command
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| RecognitionError::EngineInit {
                detail: "no OCR program configured".into(),
            })?;
        Ok(Self::new(program, config.ocr_args.clone(), config.use_gpu))
    }

    /// Arguments with placeholders substituted.
    fn expand_args(&self, image: &Path) -> Vec<String> {
        let image = image.to_string_lossy();
        let gpu = if self.use_gpu { "true" } else { "false" };
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|a| a.replace(IMAGE_PLACEHOLDER, &image).replace(GPU_PLACEHOLDER, gpu))
            .collect();
        if !self.args.iter().any(|a| a.contains(IMAGE_PLACEHOLDER)) {
            args.push(image.into_owned());
        }
        args
    }
}

impl ImageRecognizer for CommandRecognizer {
    async fn recognize(&self, image: &Path) -> Result<Vec<TextLine>, RecognitionError> {
        let args = self.expand_args(image);
        debug!("Running {} {:?}", self.program, args);

        let output = Command::new(&self.program)
            .args(&args)
            .env(GPU_ENV_VAR, if self.use_gpu { "1" } else { "0" })
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| RecognitionError::CommandFailed {
                status: format!("cannot spawn '{}'", self.program),
                stderr: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(RecognitionError::CommandFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(parse_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parse the program's stdout into segments.
pub fn parse_output(stdout: &str) -> Vec<TextLine> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(parse_line)
        .collect()
}

fn parse_line(line: &str) -> TextLine {
    if line.starts_with('{') {
        if let Ok(parsed) = serde_json::from_str::<TextLine>(line) {
            return parsed;
        }
    }
    if line.starts_with('[') {
        if let Ok((bbox, (text, confidence))) = serde_json::from_str::<(Quad, (String, f32))>(line)
        {
            return TextLine {
                text,
                bbox: Some(bbox),
                confidence: Some(confidence),
            };
        }
    }
    TextLine::plain(line)
}
