//! PDF document analysis: one PDF in, one Markdown file plus an images
//! directory out.
//!
//! ```text
//! <output_root>/<stem>/
//! ├── <stem>.md
//! └── images/
//!     ├── page1_img1.png   (text mode: embedded images)
//!     └── page2.png        (OCR mode: rendered pages)
//! ```
//!
//! The mode is chosen per document from the density of its text layer:
//!
//! * **Text**: born-digital PDFs. Page text is taken from pdfium and every
//!   embedded raster image is exported and referenced inline.
//! * **OCR**: scans. Each page is rendered and sent to the vision model,
//!   which returns Markdown for the page.
//!
//! The analyzer makes a single pass and does not retry; the batch layer
//! retries whole documents.

pub mod cleanup;
pub(crate) mod render;

use crate::config::BatchConfig;
use crate::engine::{encode, VisionRecognizer};
use crate::error::RecognitionError;
use crate::pipeline::persist;
use crate::prompts::PAGE_TO_MARKDOWN_PROMPT;
use render::{Extracted, RenderOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// How a document's content was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseMode {
    Text,
    Ocr,
}

/// Artifacts produced by [`DocumentAnalyzer::analyze`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzedDocument {
    pub markdown_path: PathBuf,
    pub images_dir: PathBuf,
    pub mode: ParseMode,
    pub pages: usize,
    /// Image files written to `images_dir`.
    pub images: usize,
}

/// Converts one PDF into Markdown.
pub struct DocumentAnalyzer {
    options: RenderOptions,
    config: BatchConfig,
}

impl DocumentAnalyzer {
    pub fn from_config(config: &BatchConfig) -> Self {
        Self {
            options: RenderOptions {
                dpi: config.dpi,
                max_rendered_pixels: config.max_rendered_pixels,
                password: config.password.clone(),
                text_mode_min_chars: config.text_mode_min_chars,
                images_dir_name: config.images_dir_name.clone(),
            },
            config: config.clone(),
        }
    }

    /// Analyse `pdf` into `<output_root>/<stem>/`.
    pub async fn analyze(
        &self,
        pdf: &Path,
        output_root: &Path,
    ) -> Result<AnalyzedDocument, RecognitionError> {
        if !pdf.is_file() {
            return Err(RecognitionError::SourceMissing {
                path: pdf.to_path_buf(),
            });
        }

        let stem = pdf
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        let out_dir = output_root.join(&stem);
        let images_dir = out_dir.join(&self.options.images_dir_name);
        tokio::fs::create_dir_all(&images_dir)
            .await
            .map_err(|e| RecognitionError::io(&images_dir, e))?;

        let extracted = {
            let (pdf, images_dir, opts) =
                (pdf.to_path_buf(), images_dir.clone(), self.options.clone());
            tokio::task::spawn_blocking(move || render::extract(&pdf, &images_dir, &opts))
                .await
                .map_err(|e| RecognitionError::TaskPanicked {
                    detail: format!("pdf task: {e}"),
                })??
        };

        let (mode, pages, images) = match extracted {
            Extracted::Text { pages, images } => (ParseMode::Text, pages, images),
            Extracted::Ocr { page_images } => {
                let count = page_images.len();
                (ParseMode::Ocr, self.recognize_pages(&page_images).await?, count)
            }
        };

        let mut markdown = pages
            .iter()
            .map(|p| p.trim_end())
            .collect::<Vec<_>>()
            .join("\n\n");
        markdown.push('\n');

        let markdown_path = out_dir.join(format!("{stem}.md"));
        persist::write_atomic(&markdown_path, markdown.into_bytes())
            .await
            .map_err(|e| RecognitionError::io(&markdown_path, e))?;

        info!(
            "{} → {} ({:?} mode, {} pages, {} images)",
            pdf.display(),
            markdown_path.display(),
            mode,
            pages.len(),
            images
        );
        Ok(AnalyzedDocument {
            markdown_path,
            images_dir,
            mode,
            pages: pages.len(),
            images,
        })
    }

    async fn recognize_pages(
        &self,
        page_images: &[PathBuf],
    ) -> Result<Vec<String>, RecognitionError> {
        let vision = VisionRecognizer::from_config(&self.config)?;
        let mut pages = Vec::with_capacity(page_images.len());
        for (index, path) in page_images.iter().enumerate() {
            let owned = path.clone();
            let data = tokio::task::spawn_blocking(move || encode::encode_image_file(&owned))
                .await
                .map_err(|e| RecognitionError::TaskPanicked {
                    detail: format!("page encoding task: {e}"),
                })??;
            let reply = vision.complete(PAGE_TO_MARKDOWN_PROMPT, data).await?;
            debug!("Page {}: {} chars", index + 1, reply.len());
            pages.push(cleanup::clean_page(&reply));
        }
        Ok(pages)
    }
}
