//! Workspace Registry: workspace identities and merged-document records.

use sled::Transactional;
use sled::transaction::{ConflictableTransactionError, abort};
use tracing::{debug, info};
use uuid::Uuid;

use super::{Store, decode, encode, page_keys, transaction_error, workspace_record};
use crate::error::{Error, Result};
use crate::model::{MergedDocument, PagePlacement, SourceLink, Workspace, WorkspaceId};
use crate::util::now_millis;

/// Name of a clone whose source had nothing to copy
pub const MISSING_SOURCE_NAME: &str = "Re-edit Workspace (Source Missing)";

impl Store {
    // =========================================================================
    // Workspaces
    // =========================================================================

    pub fn create_workspace(&self, name: &str) -> Result<Workspace> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::EmptyName);
        }

        let workspace = Workspace::new(name);
        self.workspaces
            .insert(workspace.id.as_bytes(), encode(&workspace)?)
            .map_err(|e| Error::StoreWrite(e.to_string()))?;

        info!("Created workspace {} ({})", workspace.name, workspace.id);
        Ok(workspace)
    }

    pub fn workspace(&self, id: WorkspaceId) -> Result<Option<Workspace>> {
        self.workspaces
            .get(id.as_bytes())
            .map_err(|e| Error::StoreRead(e.to_string()))?
            .map(|raw| decode(&raw))
            .transpose()
    }

    /// All workspaces, most recently modified first.
    pub fn workspaces(&self) -> Result<Vec<Workspace>> {
        let mut all = self
            .workspaces
            .iter()
            .values()
            .map(|value| decode::<Workspace>(&value.map_err(|e| Error::StoreRead(e.to_string()))?))
            .collect::<Result<Vec<_>>>()?;
        all.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        Ok(all)
    }

    /// Rename a workspace and bump its last-modified time.
    pub fn rename_workspace(&self, id: WorkspaceId, name: &str) -> Result<Workspace> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::EmptyName);
        }

        let now = now_millis();
        let workspace = self
            .workspaces
            .transaction(|workspaces| {
                let Some(mut record) = workspace_record(workspaces, id)? else {
                    return abort(Error::WorkspaceNotFound(id));
                };
                record.name = name.to_string();
                record.last_modified = now;
                let encoded = encode(&record).map_err(ConflictableTransactionError::Abort)?;
                workspaces.insert(id.as_bytes().as_slice(), encoded)?;
                Ok(record)
            })
            .map_err(transaction_error)?;

        debug!("Renamed workspace {} to {}", id, workspace.name);
        Ok(workspace)
    }

    /// Delete a workspace and, in the same transaction, all of its page rows.
    ///
    /// Merged documents pointing back at the workspace are left untouched.
    /// Returns `false` if the workspace did not exist.
    pub fn delete_workspace(&self, id: WorkspaceId) -> Result<bool> {
        let removed = (&self.workspaces, &self.pages)
            .transaction(|(workspaces, page_rows)| {
                let Some(record) = workspace_record(workspaces, id)? else {
                    return Ok(None);
                };
                for key in page_keys(id, record.page_count) {
                    page_rows.remove(key)?;
                }
                workspaces.remove(id.as_bytes().as_slice())?;
                Ok::<_, ConflictableTransactionError<Error>>(Some(record.page_count))
            })
            .map_err(transaction_error)?;

        match removed {
            Some(pages) => {
                info!("Deleted workspace {} ({} pages)", id, pages);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Create a new workspace holding a copy of another workspace's pages.
    ///
    /// The copy is named "Copy of <name>". If the source is gone or has no
    /// pages, an empty workspace named [`MISSING_SOURCE_NAME`] is created
    /// instead.
    pub fn clone_workspace(&self, source: WorkspaceId) -> Result<Workspace> {
        let pages = self.pages(source)?;
        let Some(original) = self.workspace(source)?.filter(|_| !pages.is_empty()) else {
            return self.create_workspace(MISSING_SOURCE_NAME);
        };

        let copy = self.create_workspace(&format!("Copy of {}", original.name))?;
        let placements: Vec<PagePlacement> = pages
            .iter()
            .map(|page| PagePlacement {
                row_id: None,
                ..PagePlacement::from(page)
            })
            .collect();
        self.replace(copy.id, &placements)?;

        self.workspace(copy.id)?.ok_or(Error::WorkspaceNotFound(copy.id))
    }

    // =========================================================================
    // Merged documents
    // =========================================================================

    /// Record a merged document and delete its source workspace atomically.
    ///
    /// Either the record exists and the workspace with all its pages is gone,
    /// or nothing changed.
    pub fn finalize_merge(&self, merged: &MergedDocument, workspace: WorkspaceId) -> Result<()> {
        let record = encode(merged)?;

        (&self.workspaces, &self.pages, &self.merged)
            .transaction(|(workspaces, page_rows, merged_rows)| {
                let Some(closed) = workspace_record(workspaces, workspace)? else {
                    return abort(Error::WorkspaceNotFound(workspace));
                };
                workspaces.remove(workspace.as_bytes().as_slice())?;
                for key in page_keys(workspace, closed.page_count) {
                    page_rows.remove(key)?;
                }
                merged_rows.insert(merged.id.as_bytes().as_slice(), record.as_slice())?;
                Ok::<_, ConflictableTransactionError<Error>>(())
            })
            .map_err(transaction_error)?;

        info!(
            "Recorded merged document {} and closed workspace {}",
            merged.name, workspace
        );
        Ok(())
    }

    /// Insert a merged-document record on its own.
    pub fn add_merged_document(&self, merged: &MergedDocument) -> Result<()> {
        self.merged
            .insert(merged.id.as_bytes(), encode(merged)?)
            .map_err(|e| Error::StoreWrite(e.to_string()))?;
        Ok(())
    }

    pub fn merged_document(&self, id: Uuid) -> Result<Option<MergedDocument>> {
        self.merged
            .get(id.as_bytes())
            .map_err(|e| Error::StoreRead(e.to_string()))?
            .map(|raw| decode(&raw))
            .transpose()
    }

    /// All merged documents, newest first.
    pub fn merged_documents(&self) -> Result<Vec<MergedDocument>> {
        let mut all = self
            .merged
            .iter()
            .values()
            .map(|value| {
                decode::<MergedDocument>(&value.map_err(|e| Error::StoreRead(e.to_string()))?)
            })
            .collect::<Result<Vec<_>>>()?;
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    /// Remove a merged-document record, returning it if it existed.
    pub fn delete_merged_document(&self, id: Uuid) -> Result<Option<MergedDocument>> {
        self.merged
            .remove(id.as_bytes())
            .map_err(|e| Error::StoreWrite(e.to_string()))?
            .map(|raw| decode(&raw))
            .transpose()
    }

    /// Resolve a merged document's back-reference.
    ///
    /// Missing or dangling ids resolve to [`SourceLink::Unknown`].
    pub fn merge_source(&self, merged: &MergedDocument) -> Result<SourceLink> {
        let Some(id) = merged.source_workspace_id else {
            return Ok(SourceLink::Unknown);
        };
        Ok(self
            .workspace(id)?
            .map_or(SourceLink::Unknown, SourceLink::Workspace))
    }
}
