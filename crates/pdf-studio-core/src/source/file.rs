use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

use super::{DocumentSource, SourceReader};
use crate::error::{Error, Result};
use crate::pdf::{PageSize, PdfDocument, render_page_from_file};
use crate::preview::Preview;

const FILE_SCHEME: &str = "file://";

/// Local-filesystem document source.
///
/// Accepts plain paths and `file://` locators. Parsing and rendering run
/// on the blocking thread pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSource;

impl FileSource {
    pub const fn new() -> Self {
        Self
    }

    /// Map a locator to a filesystem path
    pub fn resolve(locator: &str) -> Result<PathBuf> {
        if let Some(path) = locator.strip_prefix(FILE_SCHEME) {
            return Ok(PathBuf::from(path));
        }
        if locator.contains("://") {
            return Err(Error::UnsupportedLocator(locator.to_string()));
        }
        Ok(PathBuf::from(locator))
    }
}

fn read_error(locator: &str, e: &Error) -> Error {
    Error::SourceRead {
        locator: locator.to_string(),
        reason: e.to_string(),
    }
}

#[async_trait]
impl DocumentSource for FileSource {
    async fn page_sizes(&self, locator: &str) -> Result<Vec<PageSize>> {
        let path = Self::resolve(locator)?;

        let sizes = tokio::task::spawn_blocking(move || {
            PdfDocument::from_file(&path).and_then(|doc| doc.page_sizes())
        })
        .await
        .map_err(|e| Error::Task(e.to_string()))?
        .map_err(|e| read_error(locator, &e))?;

        debug!("{} has {} pages", locator, sizes.len());
        Ok(sizes)
    }

    async fn render_page(
        &self,
        locator: &str,
        page: u32,
        width: u32,
        height: u32,
    ) -> Result<Preview> {
        let path = Self::resolve(locator)?;

        tokio::task::spawn_blocking(move || render_page_from_file(&path, page, width, height))
            .await
            .map_err(|e| Error::Task(e.to_string()))?
    }

    async fn open(&self, locator: &str) -> Result<SourceReader> {
        let path = Self::resolve(locator)?;
        let file = tokio::fs::File::open(&path).await.map_err(|e| Error::SourceRead {
            locator: locator.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Box::new(file))
    }
}
