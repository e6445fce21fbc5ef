//! Prompts for the vision engine.
//!
//! Callers can override the image prompt via
//! [`crate::config::BatchConfig::system_prompt`]; the page prompt used for
//! OCR-mode PDFs is fixed.

/// Reply the model must give when an image contains no legible text.
pub const NO_TEXT_SENTINEL: &str = "NO_TEXT";

/// Default system prompt for reading the text out of one image.
///
/// The reply is parsed line by line: every non-empty line becomes one text
/// segment of the recognition result.
pub const IMAGE_OCR_PROMPT: &str = r#"You are an OCR engine. Transcribe every piece of text visible in the image.

Rules:
- Output one text segment per line, in natural reading order (top to bottom, left to right).
- Keep the original language and spelling. Do not translate, summarise or correct.
- Text inside charts, tables, stamps and diagrams counts; transcribe it too.
- Do not add commentary, numbering, bullet points or code fences.
- If the image contains no legible text, reply with exactly: NO_TEXT"#;

/// System prompt for converting a rasterised PDF page to Markdown.
pub const PAGE_TO_MARKDOWN_PROMPT: &str = r#"You are an expert document converter. Convert this PDF page image to clean Markdown.

1. Preserve ALL text in reading order; do not summarise.
2. Use # / ## / ### for headings, - and 1. for lists, **bold** and *italic* for emphasis.
3. Convert tables to GFM pipe tables; fall back to HTML for merged cells.
4. Render formulas with LaTeX: $inline$ and $$display$$.
5. Ignore page numbers and running headers/footers.
6. Output ONLY the Markdown. Do NOT wrap it in ``` fences and do NOT add commentary."#;
