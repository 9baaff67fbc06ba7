use std::sync::Arc;
use uuid::Uuid;

use crate::model::{PagePlacement, PageReference, RowId};
use crate::preview::Preview;

/// Reconciliation key of a page item.
///
/// Pages loaded from or written to the store are keyed by their durable row
/// id, which survives reorders and reloads. Pages added in this session are
/// keyed by a fresh ephemeral id until their first successful persist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKey {
    Durable(RowId),
    Ephemeral(Uuid),
}

/// One page of the arrangement being edited
#[derive(Debug, Clone)]
pub struct PageItem {
    /// Identity for the lifetime of the editing session
    pub session_id: Uuid,
    pub key: ItemKey,
    pub source_uri: String,
    pub page_index: u32,
    pub width: u32,
    pub height: u32,
    /// Position as of the last persist; the list position is authoritative
    pub display_order: u32,
    /// Cached list thumbnail, filled lazily
    pub thumbnail: Option<Arc<Preview>>,
}

impl PageItem {
    /// A page that has not been persisted yet
    pub fn new(source_uri: impl Into<String>, page_index: u32, width: u32, height: u32) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            key: ItemKey::Ephemeral(Uuid::new_v4()),
            source_uri: source_uri.into(),
            page_index,
            width,
            height,
            display_order: 0,
            thumbnail: None,
        }
    }

    pub fn from_reference(page: &PageReference) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            key: ItemKey::Durable(page.id),
            source_uri: page.source_uri.clone(),
            page_index: page.page_index,
            width: page.width,
            height: page.height,
            display_order: page.display_order,
            thumbnail: None,
        }
    }

    pub const fn row_id(&self) -> Option<RowId> {
        match self.key {
            ItemKey::Durable(id) => Some(id),
            ItemKey::Ephemeral(_) => None,
        }
    }

    pub(crate) fn placement(&self) -> PagePlacement {
        PagePlacement {
            row_id: self.row_id(),
            source_uri: self.source_uri.clone(),
            page_index: self.page_index,
            width: self.width,
            height: self.height,
        }
    }
}
