//! pdfium plumbing for document analysis.
//!
//! Everything here is blocking and must run inside `spawn_blocking`: pdfium
//! keeps thread-local state and is not safe to drive from async tasks.
//!
//! The library is bound at runtime, in this order:
//!
//! 1. `PDFIUM_LIB_PATH`, a full path to the shared library
//! 2. the platform library name in the working directory
//! 3. the system library search path

use crate::document::ParseMode;
use crate::error::RecognitionError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Rasterisation and parsing knobs, copied out of the batch config so they
/// can move into a blocking task.
#[derive(Debug, Clone)]
pub(crate) struct RenderOptions {
    pub dpi: u32,
    pub max_rendered_pixels: u32,
    pub password: Option<String>,
    pub text_mode_min_chars: usize,
    pub images_dir_name: String,
}

/// What the blocking pass produced.
#[derive(Debug)]
pub(crate) enum Extracted {
    /// Markdown for every page, built from the text layer.
    Text { pages: Vec<String>, images: usize },
    /// One rendered PNG per page, still to be recognised.
    Ocr { page_images: Vec<PathBuf> },
}

pub(crate) fn bind_pdfium() -> Result<Pdfium, RecognitionError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) if !path.is_empty() => Pdfium::bind_to_library(&path),
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| RecognitionError::EngineInit {
        detail: format!("cannot load pdfium: {e:?}"),
    })?;
    Ok(Pdfium::new(bindings))
}

/// Open `pdf`, pick a mode and do all the pdfium work for it.
pub(crate) fn extract(
    pdf: &Path,
    images_dir: &Path,
    opts: &RenderOptions,
) -> Result<Extracted, RecognitionError> {
    let pdf_err = |detail: String| RecognitionError::Pdf {
        path: pdf.to_path_buf(),
        detail,
    };

    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_file(pdf, opts.password.as_deref())
        .map_err(|e| pdf_err(format!("{e:?}")))?;
    let pages = document.pages();
    info!("{}: {} pages", pdf.display(), pages.len());

    let mut texts = Vec::with_capacity(pages.len() as usize);
    for page in pages.iter() {
        let text = page.text().map_err(|e| pdf_err(format!("{e:?}")))?.all();
        texts.push(text);
    }

    let mode = classify(&texts, opts.text_mode_min_chars);
    debug!("{}: {:?} mode", pdf.display(), mode);

    match mode {
        ParseMode::Text => {
            let mut markdown = Vec::with_capacity(texts.len());
            let mut images = 0;
            for (index, (page, text)) in pages.iter().zip(texts).enumerate() {
                let page_no = index + 1;
                let mut body = text.trim_end().to_string();
                let mut img_no = 0;
                for object in page.objects().iter() {
                    let Some(image_object) = object.as_image_object() else {
                        continue;
                    };
                    let raw = match image_object.get_raw_image() {
                        Ok(raw) => raw,
                        Err(e) => {
                            warn!(
                                "{}: page {} image unreadable: {:?}",
                                pdf.display(),
                                page_no,
                                e
                            );
                            continue;
                        }
                    };
                    img_no += 1;
                    let name = format!("page{page_no}_img{img_no}.png");
                    save_png(&raw, &images_dir.join(&name))?;
                    body.push_str(&format!("\n\n![]({}/{})", opts.images_dir_name, name));
                    images += 1;
                }
                markdown.push(body);
            }
            Ok(Extracted::Text {
                pages: markdown,
                images,
            })
        }
        ParseMode::Ocr => {
            let config = PdfRenderConfig::new()
                .scale_page_by_factor(opts.dpi as f32 / 72.0)
                .set_maximum_width(opts.max_rendered_pixels as i32)
                .set_maximum_height(opts.max_rendered_pixels as i32);

            let mut page_images = Vec::with_capacity(pages.len() as usize);
            for (index, page) in pages.iter().enumerate() {
                let page_no = index + 1;
                let bitmap = page
                    .render_with_config(&config)
                    .map_err(|e| pdf_err(format!("page {page_no}: {e:?}")))?;
                let image = bitmap.as_image();
                debug!(
                    "Rendered page {} → {}x{} px",
                    page_no,
                    image.width(),
                    image.height()
                );
                let path = images_dir.join(format!("page{page_no}.png"));
                save_png(&image, &path)?;
                page_images.push(path);
            }
            Ok(Extracted::Ocr { page_images })
        }
    }
}

/// Text mode when the average page carries at least `min_chars`
/// non-whitespace characters.
pub(crate) fn classify(page_texts: &[String], min_chars: usize) -> ParseMode {
    if page_texts.is_empty() {
        return ParseMode::Text;
    }
    let chars: usize = page_texts
        .iter()
        .map(|t| t.chars().filter(|c| !c.is_whitespace()).count())
        .sum();
    if chars / page_texts.len() >= min_chars {
        ParseMode::Text
    } else {
        ParseMode::Ocr
    }
}

fn save_png(image: &DynamicImage, path: &Path) -> Result<(), RecognitionError> {
    image
        .save_with_format(path, image::ImageFormat::Png)
        .map_err(|e| RecognitionError::Io {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
}
