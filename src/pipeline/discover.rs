//! Work discovery: enumerate input files and map them to output paths.
//!
//! The walk is fully recursive and sorted by file name within each directory,
//! so two runs over the same tree submit items in the same order and produce
//! comparable logs.

use crate::error::OcrBatchError;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Image extensions accepted by the image batch.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "gif"];

/// What a batch is looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Image,
    Pdf,
    Markdown,
}

impl InputKind {
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            InputKind::Image => IMAGE_EXTENSIONS,
            InputKind::Pdf => &["pdf"],
            InputKind::Markdown => &["md"],
        }
    }

    /// Case-insensitive extension check.
    pub fn matches(self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| self.extensions().contains(&ext.as_str()))
    }
}

/// One unit of work: a source file and the artifact it produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub source: PathBuf,
    pub output: PathBuf,
}

impl WorkItem {
    pub fn new(source: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            output: output.into(),
        }
    }
}

/// Fail fast when `dir` is missing or is a plain file.
pub fn ensure_input_dir(dir: &Path) -> Result<(), OcrBatchError> {
    if !dir.exists() {
        return Err(OcrBatchError::InputNotFound {
            path: dir.to_path_buf(),
        });
    }
    if !dir.is_dir() {
        return Err(OcrBatchError::NotADirectory {
            path: dir.to_path_buf(),
        });
    }
    Ok(())
}

/// Every file of `kind` under `root`, recursively.
///
/// Unreadable subdirectories are logged and skipped; only a failure on
/// `root` itself is fatal.
pub fn discover(root: &Path, kind: InputKind) -> Result<Vec<PathBuf>, OcrBatchError> {
    ensure_input_dir(root)?;

    let mut found = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(OcrBatchError::Discovery {
                    path: root.to_path_buf(),
                    detail: e.to_string(),
                })
            }
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };

        if entry.file_type().is_file() && kind.matches(entry.path()) {
            found.push(entry.into_path());
        }
    }

    debug!(
        "Discovered {} {:?} files under {}",
        found.len(),
        kind,
        root.display()
    );
    Ok(found)
}

/// `source` relative to `input_root`, falling back to its file name.
fn relative(source: &Path, input_root: &Path) -> PathBuf {
    match source.strip_prefix(input_root) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => source.file_name().map(PathBuf::from).unwrap_or_default(),
    }
}

/// Same relative position under `output_root` as `source` has under
/// `input_root`.
pub fn mirrored_path(source: &Path, input_root: &Path, output_root: &Path) -> PathBuf {
    output_root.join(relative(source, input_root))
}

/// `<output_root>/<rel parent>/<stem>.txt` for an image.
pub fn text_output_path(image: &Path, input_root: &Path, output_root: &Path) -> PathBuf {
    mirrored_path(image, input_root, output_root).with_extension("txt")
}

/// Name used for an input directory inside the output root.
///
/// Falls back to the canonical path's last component for inputs like `.`.
pub fn dir_label(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .or_else(|| {
            dir.canonicalize()
                .ok()
                .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        })
        .unwrap_or_else(|| "input".to_string())
}

/// One output label per input directory, in the same order.
///
/// Directories sharing a name get `-2`, `-3`, … suffixes so their PDFs never
/// land in the same output folder.
pub fn dir_labels<P: AsRef<Path>>(dirs: &[P]) -> Vec<String> {
    let mut taken = HashSet::new();
    dirs.iter()
        .map(|dir| {
            let base = dir_label(dir.as_ref());
            let mut label = base.clone();
            let mut n = 1;
            while !taken.insert(label.clone()) {
                n += 1;
                label = format!("{base}-{n}");
            }
            label
        })
        .collect()
}

/// Directory a PDF's analysis is written into:
/// `<output_root>/<label>/<rel parent>/<stem>/`.
pub fn pdf_output_dir(pdf: &Path, input_dir: &Path, label: &str, output_root: &Path) -> PathBuf {
    let mirrored = mirrored_path(pdf, input_dir, &output_root.join(label));
    mirrored.with_extension("")
}

/// The markdown file produced for a PDF: `<pdf_output_dir>/<stem>.md`.
pub fn pdf_output_path(pdf: &Path, input_dir: &Path, label: &str, output_root: &Path) -> PathBuf {
    let stem = pdf
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    pdf_output_dir(pdf, input_dir, label, output_root).join(format!("{stem}.md"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"dummy").unwrap();
    }

    #[test]
    fn finds_images_recursively_in_name_order() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("b.png"));
        touch(&root.join("a.JPG"));
        touch(&root.join("notes.txt"));
        touch(&root.join("sub/c.tiff"));
        touch(&root.join("sub/deeper/d.gif"));

        let found = discover(root, InputKind::Image).unwrap();
        let rel: Vec<_> = found
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
            .collect();

        assert_eq!(
            rel,
            vec![
                PathBuf::from("a.JPG"),
                PathBuf::from("b.png"),
                PathBuf::from("sub/c.tiff"),
                PathBuf::from("sub/deeper/d.gif"),
            ]
        );
    }

    #[test]
    fn markdown_and_pdf_kinds() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("doc.md"));
        touch(&dir.path().join("doc.MD"));
        touch(&dir.path().join("paper.Pdf"));

        assert_eq!(discover(dir.path(), InputKind::Markdown).unwrap().len(), 2);
        assert_eq!(discover(dir.path(), InputKind::Pdf).unwrap().len(), 1);
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempdir().unwrap();
        let err = discover(&dir.path().join("nope"), InputKind::Image).unwrap_err();
        assert!(matches!(err, OcrBatchError::InputNotFound { .. }));
    }

    #[test]
    fn file_root_is_an_error() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.png");
        touch(&file);
        let err = discover(&file, InputKind::Image).unwrap_err();
        assert!(matches!(err, OcrBatchError::NotADirectory { .. }));
    }

    #[test]
    fn text_output_mirrors_tree() {
        let out = text_output_path(
            Path::new("/in/scans/2024/a.b.png"),
            Path::new("/in/scans"),
            Path::new("/out"),
        );
        assert_eq!(out, PathBuf::from("/out/2024/a.b.txt"));
    }

    #[test]
    fn pdf_output_layout() {
        let md = pdf_output_path(
            Path::new("/data/reports/q1.pdf"),
            Path::new("/data/reports"),
            "reports",
            Path::new("/out"),
        );
        assert_eq!(md, PathBuf::from("/out/reports/q1/q1.md"));

        let nested = pdf_output_path(
            Path::new("/data/reports/2023/q4.pdf"),
            Path::new("/data/reports"),
            "reports",
            Path::new("/out"),
        );
        assert_eq!(nested, PathBuf::from("/out/reports/2023/q4/q4.md"));
    }

    #[test]
    fn same_named_input_dirs_get_distinct_labels() {
        let dirs = [
            PathBuf::from("/a/reports"),
            PathBuf::from("/b/reports"),
            PathBuf::from("/c/reports-2"),
            PathBuf::from("/d/invoices"),
            PathBuf::from("/e/reports"),
        ];
        let labels = dir_labels(&dirs);
        assert_eq!(
            labels,
            vec!["reports", "reports-2", "reports-2-2", "invoices", "reports-3"]
        );

        let a = pdf_output_path(&dirs[0].join("q1.pdf"), &dirs[0], &labels[0], Path::new("/out"));
        let b = pdf_output_path(&dirs[1].join("q1.pdf"), &dirs[1], &labels[1], Path::new("/out"));
        assert_ne!(a, b);
        assert_eq!(b, PathBuf::from("/out/reports-2/q1/q1.md"));
    }
}
