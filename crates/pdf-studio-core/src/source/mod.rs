//! Document source capability: page geometry, page rasters and raw bytes
//! for an opaque locator.

mod file;

pub use file::FileSource;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::error::Result;
use crate::pdf::PageSize;
use crate::preview::Preview;

/// Byte stream of a whole source document
pub type SourceReader = Box<dyn AsyncRead + Send + Unpin>;

/// Trait for platforms that hand out source documents
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Size of every page, in page order. The length is the page count.
    async fn page_sizes(&self, locator: &str) -> Result<Vec<PageSize>>;

    /// Render one page to a PNG of `width` × `height` pixels
    async fn render_page(
        &self,
        locator: &str,
        page: u32,
        width: u32,
        height: u32,
    ) -> Result<Preview>;

    /// Open the document's bytes for copying
    async fn open(&self, locator: &str) -> Result<SourceReader>;
}
