//! Arrangement Engine: the ordered page list of one workspace being edited.
//!
//! The in-memory list is authoritative while a session is active. Every
//! structural change re-derives display orders from list positions and
//! persists the whole list through [`Store::replace`]; if that fails the
//! list is rolled back. Observers get [`EditorState`] snapshots through a
//! `tokio::sync::watch` channel.

mod item;
mod state;

pub use item::{ItemKey, PageItem};
pub use state::EditorState;

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::Workspace;
use crate::pdf::PageSize;
use crate::pipeline::{MergeOutcome, MergePipeline, MergeStage, Progress};
use crate::preview::{Preview, PreviewCache};
use crate::source::DocumentSource;
use crate::store::Store;

/// Outcome of [`Arrangement::add_documents`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddReport {
    pub pages_added: usize,
    /// Locators that could not be read
    pub failed: Vec<String>,
}

/// Editing session of one workspace.
///
/// Mutating operations take `&mut self`; callers serialize them.
pub struct Arrangement {
    store: Store,
    source: Arc<dyn DocumentSource>,
    previews: PreviewCache,
    workspace: Workspace,
    items: Vec<PageItem>,
    state: watch::Sender<EditorState>,
    closed: bool,
}

impl Arrangement {
    /// Session over `workspace` with an empty list; call [`Arrangement::load`] next.
    pub fn new(
        store: Store,
        source: Arc<dyn DocumentSource>,
        previews: PreviewCache,
        workspace: Workspace,
    ) -> Self {
        let (state, _) = watch::channel(EditorState {
            workspace_id: Some(workspace.id),
            workspace_name: workspace.name.clone(),
            ..EditorState::default()
        });

        Self {
            store,
            source,
            previews,
            workspace,
            items: Vec::new(),
            state,
            closed: false,
        }
    }

    /// Create a session and load its pages
    pub fn open(
        store: Store,
        source: Arc<dyn DocumentSource>,
        previews: PreviewCache,
        workspace: Workspace,
    ) -> Result<Self> {
        let mut arrangement = Self::new(store, source, previews, workspace);
        arrangement.load()?;
        Ok(arrangement)
    }

    pub const fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn items(&self) -> &[PageItem] {
        &self.items
    }

    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn snapshot(&self) -> EditorState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<EditorState> {
        self.state.subscribe()
    }

    /// Post a transient notification
    pub fn notify(&self, message: impl Into<String>) {
        let message = message.into();
        self.state.send_modify(|s| s.notice = Some(message));
    }

    /// Clear the notification once it has been shown
    pub fn clear_notice(&self) {
        self.state.send_if_modified(|s| s.notice.take().is_some());
    }

    /// Rebuild the list from the store, in stored display order.
    ///
    /// Items whose key matches an item of the previous list keep that item's
    /// session id and cached thumbnail.
    pub fn load(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.state.send_modify(|s| s.is_loading = true);

        let result = self.reload();
        self.state.send_modify(|s| s.is_loading = false);
        result?;

        self.publish();
        Ok(())
    }

    fn reload(&mut self) -> Result<()> {
        let workspace = self
            .store
            .workspace(self.workspace.id)?
            .ok_or(Error::WorkspaceNotFound(self.workspace.id))?;
        let rows = self.store.pages(workspace.id)?;

        let mut previous: HashMap<ItemKey, PageItem> = self
            .items
            .drain(..)
            .map(|item| (item.key, item))
            .collect();

        let mut reused = 0;
        self.items = rows
            .iter()
            .map(|row| {
                let mut item = PageItem::from_reference(row);
                if let Some(prev) = previous.remove(&item.key) {
                    item.session_id = prev.session_id;
                    item.thumbnail = prev.thumbnail;
                    reused += 1;
                }
                item
            })
            .collect();
        self.workspace = workspace;

        debug!(
            "Loaded {} pages of {} ({} reconciled)",
            self.items.len(),
            self.workspace.id,
            reused
        );
        Ok(())
    }

    /// Append every page of each source, in input order.
    ///
    /// A source that cannot be read is reported and skipped; the others are
    /// still added. The combined list is persisted once at the end.
    pub async fn add_documents<S: AsRef<str>>(&mut self, locators: &[S]) -> Result<AddReport> {
        self.ensure_open()?;

        let mut report = AddReport::default();
        let mut added = Vec::new();

        for locator in locators {
            let locator = locator.as_ref();
            let read = self
                .source
                .page_sizes(locator)
                .await
                .and_then(|sizes| source_items(locator, sizes.into_iter()));
            match read {
                Ok(items) => {
                    debug!("Read {} pages from {}", items.len(), locator);
                    added.extend(items);
                }
                Err(e) => {
                    warn!("Skipping {}: {}", locator, e);
                    self.notify(e.user_message());
                    report.failed.push(locator.to_string());
                }
            }
        }

        report.pages_added = added.len();
        if added.is_empty() {
            return Ok(report);
        }

        let previous = self.items.clone();
        self.items.extend(added);
        self.persist_or_rollback(previous)?;

        info!(
            "Added {} pages to '{}' ({} sources failed)",
            report.pages_added,
            self.workspace.name,
            report.failed.len()
        );
        Ok(report)
    }

    /// Move the item at `from` to `to`.
    ///
    /// Equal or out-of-range indices leave the list untouched and persist
    /// nothing; the result is then `false`.
    pub fn reorder(&mut self, from: usize, to: usize) -> Result<bool> {
        self.ensure_open()?;
        let len = self.items.len();
        if from == to || from >= len || to >= len {
            return Ok(false);
        }

        let previous = self.items.clone();
        let item = self.items.remove(from);
        self.items.insert(to, item);
        self.persist_or_rollback(previous)?;

        debug!("Moved page {} -> {} in {}", from, to, self.workspace.id);
        Ok(true)
    }

    /// Remove the item with `session_id`. Returns `false` if there is none.
    pub fn remove(&mut self, session_id: Uuid) -> Result<bool> {
        self.ensure_open()?;
        let Some(position) = self.items.iter().position(|i| i.session_id == session_id) else {
            return Ok(false);
        };

        let previous = self.items.clone();
        self.items.remove(position);
        self.persist_or_rollback(previous)?;

        debug!("Removed page at {} from {}", position, self.workspace.id);
        Ok(true)
    }

    /// Rename the workspace. Empty or unchanged names are ignored.
    pub fn rename(&mut self, name: &str) -> Result<bool> {
        self.ensure_open()?;
        let name = name.trim();
        if name.is_empty() || name == self.workspace.name {
            return Ok(false);
        }

        self.workspace = self.store.rename_workspace(self.workspace.id, name)?;
        self.publish();
        Ok(true)
    }

    /// Preview of one item; thumbnails are cached on the item.
    pub async fn preview(&mut self, session_id: Uuid, high_res: bool) -> Option<Arc<Preview>> {
        let item = self.items.iter_mut().find(|i| i.session_id == session_id)?;
        let had_thumbnail = item.thumbnail.is_some();

        let preview = self.previews.get_preview(item, high_res).await;
        if !had_thumbnail && item.thumbnail.is_some() {
            self.publish();
        }
        preview
    }

    /// Merge the current list and close the session on success.
    ///
    /// On failure the session stays open with its pages untouched, and the
    /// error's user message is posted as a notice.
    pub async fn merge(
        &mut self,
        pipeline: &MergePipeline,
        progress: Option<Progress<'_>>,
    ) -> Result<MergeOutcome> {
        self.ensure_open()?;
        if self.items.is_empty() {
            self.notify(Error::NothingToMerge.user_message());
            return Err(Error::NothingToMerge);
        }

        self.state.send_modify(|s| {
            s.is_saving = true;
            s.processing_message = Some(MergeStage::StagingInputs.to_string());
        });

        let state = &self.state;
        let track: Progress<'_> = &|stage: MergeStage| {
            if !matches!(stage, MergeStage::Done | MergeStage::Error) {
                state.send_modify(|s| s.processing_message = Some(stage.to_string()));
            }
            if let Some(progress) = progress {
                progress(stage);
            }
        };

        let result = pipeline.run(&self.workspace, &self.items, Some(track)).await;

        match &result {
            Ok(outcome) => {
                self.closed = true;
                self.items.clear();
                let notice = format!("Saved {}", outcome.file_name);
                self.state.send_modify(|s| {
                    s.pages.clear();
                    s.is_saving = false;
                    s.processing_message = None;
                    s.notice = Some(notice);
                });
            }
            Err(e) => {
                let notice = e.user_message();
                self.state.send_modify(|s| {
                    s.is_saving = false;
                    s.processing_message = None;
                    s.notice = Some(notice);
                });
            }
        }

        result
    }

    const fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::WorkspaceClosed);
        }
        Ok(())
    }

    /// Persist the list in its current order, restoring `previous` on failure.
    fn persist_or_rollback(&mut self, previous: Vec<PageItem>) -> Result<()> {
        let placements: Vec<_> = self.items.iter().map(PageItem::placement).collect();

        match self.store.replace(self.workspace.id, &placements) {
            Ok(rows) => {
                for (item, row) in self.items.iter_mut().zip(&rows) {
                    item.key = ItemKey::Durable(row.id);
                    item.display_order = row.display_order;
                }
                if let Ok(Some(workspace)) = self.store.workspace(self.workspace.id) {
                    self.workspace = workspace;
                }
                self.publish();
                Ok(())
            }
            Err(e) => {
                warn!("Failed to save arrangement of {}: {}", self.workspace.id, e);
                self.items = previous;
                self.publish();
                self.notify(e.user_message());
                Err(e)
            }
        }
    }

    fn publish(&self) {
        let pages = self.items.clone();
        let name = self.workspace.name.clone();
        self.state.send_modify(|s| {
            s.workspace_name = name;
            s.pages = pages;
        });
    }
}

/// One item per page of `locator`, in page order.
fn source_items<I>(locator: &str, sizes: I) -> Result<Vec<PageItem>>
where
    I: ExactSizeIterator<Item = PageSize>,
{
    if u32::try_from(sizes.len()).is_err() {
        return Err(Error::PdfOpen(format!("{locator} has too many pages")));
    }
    Ok(sizes
        .zip(0u32..)
        .map(|(size, page_index)| PageItem::new(locator, page_index, size.width, size.height))
        .collect())
}
