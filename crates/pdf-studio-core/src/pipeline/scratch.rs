use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Error, Result, display_name};
use crate::source::DocumentSource;

/// Longest source-name fragment kept in a scratch file name
const MAX_STEM_LEN: usize = 20;

/// Private per-run directory holding staged inputs and the engine's output.
///
/// Every file is registered before it is written, so [`ScratchSpace::cleanup`]
/// also removes partially copied files.
pub struct ScratchSpace {
    dir: TempDir,
    /// Locator to staged copy
    staged: HashMap<String, PathBuf>,
    files: Vec<PathBuf>,
}

impl ScratchSpace {
    pub fn new(parent: &Path) -> Result<Self> {
        std::fs::create_dir_all(parent)?;
        let dir = tempfile::Builder::new()
            .prefix("pdf-studio-merge-")
            .tempdir_in(parent)?;
        debug!("Scratch directory {}", dir.path().display());

        Ok(Self {
            dir,
            staged: HashMap::new(),
            files: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Number of distinct sources copied so far
    pub fn staged_count(&self) -> usize {
        self.staged.len()
    }

    /// Copy a source document into the scratch directory, once per locator.
    pub async fn stage(&mut self, source: &dyn DocumentSource, locator: &str) -> Result<PathBuf> {
        if let Some(path) = self.staged.get(locator) {
            return Ok(path.clone());
        }

        let path = self.reserve(&format!(
            "input_{}_{}.pdf",
            scratch_stem(locator),
            Uuid::new_v4().simple()
        ));

        let read_error = |reason: String| Error::SourceRead {
            locator: locator.to_string(),
            reason,
        };

        let mut reader = source.open(locator).await?;
        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| read_error(format!("cannot create scratch copy: {e}")))?;
        let copied = tokio::io::copy(&mut reader, &mut file)
            .await
            .map_err(|e| read_error(e.to_string()))?;
        file.flush().await.map_err(|e| read_error(e.to_string()))?;

        debug!("Staged {} ({} bytes) as {}", locator, copied, path.display());
        self.staged.insert(locator.to_string(), path.clone());
        Ok(path)
    }

    /// Register a path inside the scratch directory for cleanup
    pub fn reserve(&mut self, file_name: &str) -> PathBuf {
        let path = self.dir.path().join(file_name);
        self.files.push(path.clone());
        path
    }

    /// Register a file written elsewhere inside the scratch directory
    pub fn track(&mut self, path: PathBuf) -> bool {
        if path.starts_with(self.dir.path()) && !self.files.contains(&path) {
            self.files.push(path);
            return true;
        }
        false
    }

    /// Delete every registered file, then the directory. Failures are logged only.
    pub fn cleanup(self) {
        for file in &self.files {
            match std::fs::remove_file(file) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to delete scratch file {}: {}", file.display(), e),
            }
        }

        let dir = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            warn!("Failed to delete scratch directory {}: {}", dir.display(), e);
        }
    }
}

/// Filesystem-safe, shortened stem of a locator's last segment
fn scratch_stem(locator: &str) -> String {
    let name = display_name(locator);
    let name = name.strip_suffix(".pdf").unwrap_or(name);
    let stem: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .take(MAX_STEM_LEN)
        .collect();
    if stem.is_empty() {
        "source".to_string()
    } else {
        stem
    }
}
