//! Durable storage capability for merged output.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Trait for destinations merged PDFs are saved to
#[async_trait]
pub trait OutputStore: Send + Sync {
    /// Store the file at `source` under `file_name` and return its locator.
    ///
    /// Either the destination is complete and non-empty, or an error is
    /// returned and nothing is left under `file_name`.
    async fn save(&self, file_name: &str, source: &Path) -> Result<String>;

    /// Remove a previously saved output. Returns whether something was removed.
    async fn discard(&self, locator: &str) -> Result<bool>;
}

/// Saves into a user-visible directory
#[derive(Debug, Clone)]
pub struct DirectoryOutput {
    dir: PathBuf,
}

impl DirectoryOutput {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Locators handed out by this store are plain paths inside `dir`
    fn owned_path(&self, locator: &str) -> Option<PathBuf> {
        let path = PathBuf::from(locator.strip_prefix("file://").unwrap_or(locator));
        (path.parent() == Some(self.dir.as_path())).then_some(path)
    }
}

fn save_error(file_name: &str, reason: impl std::fmt::Display) -> Error {
    Error::Save(format!("{file_name}: {reason}"))
}

fn write_atomically(dir: &Path, file_name: &str, source: &Path) -> Result<PathBuf> {
    if file_name.is_empty() || file_name.contains(['/', '\\']) {
        return Err(save_error(file_name, "invalid file name"));
    }

    std::fs::create_dir_all(dir).map_err(|e| save_error(file_name, e))?;

    let mut input = std::fs::File::open(source)
        .map_err(|e| save_error(file_name, format!("cannot read merged file: {e}")))?;
    let mut staged = tempfile::NamedTempFile::new_in(dir).map_err(|e| save_error(file_name, e))?;

    let copied = std::io::copy(&mut input, &mut staged).map_err(|e| save_error(file_name, e))?;
    if copied == 0 {
        return Err(save_error(file_name, "merged file is empty"));
    }
    staged
        .as_file()
        .sync_all()
        .map_err(|e| save_error(file_name, e))?;

    let target = dir.join(file_name);
    staged
        .persist_noclobber(&target)
        .map_err(|e| save_error(file_name, e.error))?;

    Ok(target)
}

#[async_trait]
impl OutputStore for DirectoryOutput {
    async fn save(&self, file_name: &str, source: &Path) -> Result<String> {
        let dir = self.dir.clone();
        let name = file_name.to_string();
        let source = source.to_path_buf();

        let target = tokio::task::spawn_blocking(move || write_atomically(&dir, &name, &source))
            .await
            .map_err(|e| Error::Task(e.to_string()))??;

        info!("Saved merged PDF to {}", target.display());
        Ok(target.to_string_lossy().into_owned())
    }

    async fn discard(&self, locator: &str) -> Result<bool> {
        let Some(path) = self.owned_path(locator) else {
            debug!("Not discarding {}: outside {}", locator, self.dir.display());
            return Ok(false);
        };

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Discarded {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_writes_under_name() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("merged.pdf");
        std::fs::write(&src, b"%PDF-1.5 body").unwrap();

        let out_dir = dir.path().join("out");
        let store = DirectoryOutput::new(&out_dir);
        let locator = store.save("Scans_1700.pdf", &src).await.unwrap();

        assert_eq!(PathBuf::from(&locator), out_dir.join("Scans_1700.pdf"));
        assert_eq!(std::fs::read(&locator).unwrap(), b"%PDF-1.5 body");
    }

    #[tokio::test]
    async fn test_empty_source_fails_and_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("merged.pdf");
        std::fs::write(&src, b"").unwrap();

        let out_dir = dir.path().join("out");
        let store = DirectoryOutput::new(&out_dir);
        let err = store.save("Scans_1700.pdf", &src).await.unwrap_err();

        assert!(matches!(err, Error::Save(_)));
        assert_eq!(std::fs::read_dir(&out_dir).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_large_file_copied_byte_for_byte() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("merged.pdf");
        let body: Vec<u8> = (0..3 * 1024 * 1024 + 17).map(|i| (i % 251) as u8).collect();
        std::fs::write(&src, &body).unwrap();

        let store = DirectoryOutput::new(dir.path().join("out"));
        let locator = store.save("Big_1700.pdf", &src).await.unwrap();

        assert_eq!(std::fs::read(&locator).unwrap(), body);
        assert_eq!(std::fs::read_dir(dir.path().join("out")).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_existing_file_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("merged.pdf");
        std::fs::write(&src, b"new").unwrap();
        std::fs::write(dir.path().join("taken.pdf"), b"old").unwrap();

        let store = DirectoryOutput::new(dir.path());
        assert!(store.save("taken.pdf", &src).await.is_err());
        assert_eq!(std::fs::read(dir.path().join("taken.pdf")).unwrap(), b"old");
    }

    #[tokio::test]
    async fn test_name_with_separator_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("merged.pdf");
        std::fs::write(&src, b"data").unwrap();

        let store = DirectoryOutput::new(dir.path());
        assert!(store.save("../escape.pdf", &src).await.is_err());
    }

    #[tokio::test]
    async fn test_discard_only_touches_own_files() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("merged.pdf");
        std::fs::write(&src, b"data").unwrap();

        let store = DirectoryOutput::new(dir.path().join("out"));
        let locator = store.save("a.pdf", &src).await.unwrap();

        assert!(!store.discard(src.to_str().unwrap()).await.unwrap());
        assert!(src.exists());
        assert!(store.discard(&locator).await.unwrap());
        assert!(!store.discard(&locator).await.unwrap());
    }
}
