//! On-demand page previews at two resolutions.
//!
//! List thumbnails are cached on the [`PageItem`] they belong to; full-size
//! previews are rendered on every request and never cached. A failed render
//! yields `None` and leaves the item's slot empty, so the next request retries.

use bytes::Bytes;
use std::sync::Arc;
use tracing::warn;

use crate::arrangement::PageItem;
use crate::config::PreviewConfig;
use crate::source::DocumentSource;

/// A rendered page, PNG-encoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub width: u32,
    pub height: u32,
    pub png: Bytes,
}

/// Renders previews through a [`DocumentSource`]
#[derive(Clone)]
pub struct PreviewCache {
    source: Arc<dyn DocumentSource>,
    config: PreviewConfig,
}

impl PreviewCache {
    pub fn new(source: Arc<dyn DocumentSource>, config: PreviewConfig) -> Self {
        Self { source, config }
    }

    /// Pixel size a preview of `item` is rendered at
    pub fn target_size(&self, item: &PageItem, high_res: bool) -> (u32, u32) {
        let divisor = if high_res {
            self.config.full_divisor
        } else {
            self.config.thumbnail_divisor
        }
        .max(1);
        ((item.width / divisor).max(1), (item.height / divisor).max(1))
    }

    /// Preview of `item`, from the item's cache slot when possible.
    pub async fn get_preview(&self, item: &mut PageItem, high_res: bool) -> Option<Arc<Preview>> {
        if !high_res
            && let Some(cached) = &item.thumbnail
        {
            return Some(Arc::clone(cached));
        }

        let (width, height) = self.target_size(item, high_res);
        match self
            .source
            .render_page(&item.source_uri, item.page_index, width, height)
            .await
        {
            Ok(preview) => {
                let preview = Arc::new(preview);
                if !high_res {
                    item.thumbnail = Some(Arc::clone(&preview));
                }
                Some(preview)
            }
            Err(e) => {
                warn!(
                    "Preview of {} page {} failed: {}",
                    item.source_uri, item.page_index, e
                );
                None
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::pdf::PageSize;
    use crate::source::SourceReader;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSource {
        renders: AtomicUsize,
        failing: AtomicBool,
        last_size: Mutex<(u32, u32)>,
    }

    #[async_trait]
    impl DocumentSource for CountingSource {
        async fn page_sizes(&self, _locator: &str) -> Result<Vec<PageSize>> {
            Ok(Vec::new())
        }

        async fn render_page(
            &self,
            locator: &str,
            page: u32,
            width: u32,
            height: u32,
        ) -> Result<Preview> {
            self.renders.fetch_add(1, Ordering::SeqCst);
            *self.last_size.lock().unwrap() = (width, height);
            if self.failing.load(Ordering::SeqCst) {
                return Err(Error::PdfRender {
                    page: page as usize,
                    reason: format!("{locator} is corrupt"),
                });
            }
            Ok(Preview {
                width,
                height,
                png: Bytes::from_static(b"png"),
            })
        }

        async fn open(&self, locator: &str) -> Result<SourceReader> {
            Err(Error::UnsupportedLocator(locator.to_string()))
        }
    }

    fn setup() -> (Arc<CountingSource>, PreviewCache, PageItem) {
        let source = Arc::new(CountingSource::default());
        let cache = PreviewCache::new(source.clone(), PreviewConfig::default());
        let item = PageItem::new("a.pdf", 0, 612, 792);
        (source, cache, item)
    }

    #[tokio::test]
    async fn test_thumbnail_is_cached_on_item() {
        let (source, cache, mut item) = setup();

        let first = cache.get_preview(&mut item, false).await.unwrap();
        let second = cache.get_preview(&mut item, false).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.renders.load(Ordering::SeqCst), 1);
        assert_eq!(*source.last_size.lock().unwrap(), (102, 132));
    }

    #[tokio::test]
    async fn test_high_res_always_renders_and_is_not_cached() {
        let (source, cache, mut item) = setup();
        cache.get_preview(&mut item, false).await.unwrap();

        let full = cache.get_preview(&mut item, true).await.unwrap();
        cache.get_preview(&mut item, true).await.unwrap();

        assert_eq!((full.width, full.height), (306, 396));
        assert_eq!(source.renders.load(Ordering::SeqCst), 3);
        assert_eq!(item.thumbnail.as_ref().unwrap().width, 102);
    }

    #[tokio::test]
    async fn test_failed_render_leaves_slot_empty_for_retry() {
        let (source, cache, mut item) = setup();
        source.failing.store(true, Ordering::SeqCst);

        assert!(cache.get_preview(&mut item, false).await.is_none());
        assert!(item.thumbnail.is_none());

        source.failing.store(false, Ordering::SeqCst);
        assert!(cache.get_preview(&mut item, false).await.is_some());
        assert_eq!(source.renders.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_target_size_never_zero() {
        let (_, cache, _) = setup();
        let tiny = PageItem::new("a.pdf", 0, 3, 2);
        assert_eq!(cache.target_size(&tiny, false), (1, 1));
    }
}
