//! Filesystem helpers shared by the pipeline stages.
//!
//! Every artifact is written to a temporary file in the destination directory
//! and then renamed over the target, so a crash never leaves a half-written
//! `.txt`, `.md` or report behind.

use crate::error::RecognitionError;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Write `contents` to `path` atomically, creating parent directories.
pub async fn write_atomic(path: &Path, contents: Vec<u8>) -> io::Result<()> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || write_atomic_blocking(&path, &contents))
        .await
        .map_err(io::Error::other)?
}

fn write_atomic_blocking(path: &Path, contents: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Write one segment per line, each terminated by `\n`.
pub async fn write_lines(path: &Path, lines: &[String]) -> Result<(), RecognitionError> {
    let body: String = lines.iter().map(|l| format!("{l}\n")).collect();
    write_atomic(path, body.into_bytes())
        .await
        .map_err(|e| RecognitionError::io(path, e))
}

/// Recursively copy `src` into `dst`, merging with whatever `dst` already
/// holds. Files present in both are overwritten. Returns the number of files
/// copied.
pub async fn copy_dir_merge(src: &Path, dst: &Path) -> io::Result<usize> {
    let (src, dst) = (src.to_path_buf(), dst.to_path_buf());
    tokio::task::spawn_blocking(move || copy_dir_merge_blocking(&src, &dst))
        .await
        .map_err(io::Error::other)?
}

fn copy_dir_merge_blocking(src: &Path, dst: &Path) -> io::Result<usize> {
    let mut copied = 0;
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(io::Error::other)?;
        let rel = match entry.path().strip_prefix(src) {
            Ok(rel) => rel,
            Err(_) => continue,
        };
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    debug!("Copied {} files {} → {}", copied, src.display(), dst.display());
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_atomic_creates_parents_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/c.txt");

        write_atomic(&path, b"first".to_vec()).await.unwrap();
        write_atomic(&path, b"second".to_vec()).await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
        let leftovers = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1, "temporary file left behind");
    }

    #[tokio::test]
    async fn write_lines_terminates_every_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        write_lines(&path, &["Hello".into(), "World".into()])
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Hello\nWorld\n");
    }

    #[tokio::test]
    async fn copy_merges_into_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        std::fs::create_dir_all(src.join("nested")).unwrap();
        std::fs::create_dir_all(&dst).unwrap();
        std::fs::write(src.join("1.png"), b"new").unwrap();
        std::fs::write(src.join("nested/2.png"), b"two").unwrap();
        std::fs::write(dst.join("1.png"), b"old").unwrap();
        std::fs::write(dst.join("keep.png"), b"keep").unwrap();

        let copied = copy_dir_merge(&src, &dst).await.unwrap();

        assert_eq!(copied, 2);
        assert_eq!(std::fs::read(dst.join("1.png")).unwrap(), b"new");
        assert_eq!(std::fs::read(dst.join("nested/2.png")).unwrap(), b"two");
        assert_eq!(std::fs::read(dst.join("keep.png")).unwrap(), b"keep");
    }
}
