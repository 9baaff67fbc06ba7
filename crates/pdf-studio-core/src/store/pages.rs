//! Page Reference Store: per-workspace ordered page rows.

use sled::Transactional;
use sled::transaction::{ConflictableTransactionError, abort};
use tracing::debug;

use super::{Store, decode, encode, page_key, page_keys, transaction_error, workspace_record};
use crate::error::{Error, Result};
use crate::model::{PagePlacement, PageReference, WorkspaceId};
use crate::util::now_millis;

/// Lazy, display-order-ascending iterator over one workspace's page rows.
///
/// Each call to [`Store::list_ordered`] starts a fresh scan that reflects the
/// latest committed state.
pub struct PageIter {
    inner: sled::Iter,
}

impl Iterator for PageIter {
    type Item = Result<PageReference>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|entry| {
            let (_, value) = entry.map_err(|e| Error::StoreRead(e.to_string()))?;
            decode(&value)
        })
    }
}

impl Store {
    /// Replace a workspace's whole arrangement.
    ///
    /// Deletes every existing row, inserts `pages` with display orders
    /// `0..pages.len()` taken from their position, and stamps the workspace's
    /// last-modified time and row count, all in one transaction. The rows to
    /// delete are derived from the count read inside that transaction.
    /// Placements carrying a row id keep it; the others get a fresh one.
    /// Returns the committed rows.
    pub fn replace(
        &self,
        workspace: WorkspaceId,
        pages: &[PagePlacement],
    ) -> Result<Vec<PageReference>> {
        let mut rows = Vec::with_capacity(pages.len());
        for (position, placement) in pages.iter().enumerate() {
            let id = match placement.row_id {
                Some(id) => id,
                None => self.generate_id()?,
            };
            let display_order = u32::try_from(position).map_err(|_| {
                Error::StoreWrite(format!("too many pages in workspace ({position})"))
            })?;
            rows.push(PageReference {
                id,
                workspace_id: workspace,
                source_uri: placement.source_uri.clone(),
                page_index: placement.page_index,
                display_order,
                width: placement.width,
                height: placement.height,
            });
        }

        let encoded = rows
            .iter()
            .map(|row| Ok((page_key(workspace, row.display_order), encode(row)?)))
            .collect::<Result<Vec<_>>>()?;
        let count = u32::try_from(rows.len())
            .map_err(|_| Error::StoreWrite(format!("too many pages in workspace ({})", rows.len())))?;
        let now = now_millis();

        let previous = (&self.workspaces, &self.pages)
            .transaction(|(workspaces, page_rows)| {
                let Some(mut record) = workspace_record(workspaces, workspace)? else {
                    return abort(Error::WorkspaceNotFound(workspace));
                };
                let previous = record.page_count;

                for key in page_keys(workspace, previous) {
                    page_rows.remove(key)?;
                }
                for (key, value) in &encoded {
                    page_rows.insert(key.as_slice(), value.as_slice())?;
                }

                record.page_count = count;
                record.last_modified = now;
                let record = encode(&record).map_err(ConflictableTransactionError::Abort)?;
                workspaces.insert(workspace.as_bytes().as_slice(), record)?;
                Ok(previous)
            })
            .map_err(transaction_error)?;

        debug!(
            "Replaced arrangement of {} ({} -> {} pages)",
            workspace, previous, count
        );

        Ok(rows)
    }

    /// Page rows of a workspace, display order ascending.
    pub fn list_ordered(&self, workspace: WorkspaceId) -> PageIter {
        PageIter {
            inner: self.pages.scan_prefix(workspace.as_bytes()),
        }
    }

    /// Collect [`Store::list_ordered`] into a vector.
    pub fn pages(&self, workspace: WorkspaceId) -> Result<Vec<PageReference>> {
        self.list_ordered(workspace).collect()
    }

    pub fn page_count(&self, workspace: WorkspaceId) -> usize {
        self.pages.scan_prefix(workspace.as_bytes()).count()
    }
}
