//! Durable store for workspaces, page arrangements and merged documents.
//!
//! Three sled trees mirror the persisted schema:
//!
//! | tree                | key                                    | value            |
//! |---------------------|----------------------------------------|------------------|
//! | `workspaces`        | workspace uuid (16 bytes)              | `Workspace`      |
//! | `page_arrangements` | workspace uuid ++ display order (u32 BE) | `PageReference` |
//! | `merged_pdfs`       | merged document uuid (16 bytes)        | `MergedDocument` |
//!
//! Page keys share the workspace uuid as a fixed-length prefix, so a prefix
//! scan is both the per-workspace index and a display-order-ascending listing.
//! Every change touching more than one row runs in a multi-tree transaction.

mod pages;
mod registry;

pub use pages::PageIter;

use serde::Serialize;
use serde::de::DeserializeOwned;
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
    TransactionalTree,
};
use sled::{Db, Tree};
use std::path::Path;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{Workspace, WorkspaceId};

const WORKSPACES_TREE: &str = "workspaces";
const PAGES_TREE: &str = "page_arrangements";
const MERGED_TREE: &str = "merged_pdfs";

/// Handle to the durable store. Cheap to clone; clones share the database.
#[derive(Clone)]
pub struct Store {
    db: Db,
    workspaces: Tree,
    pages: Tree,
    merged: Tree,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::StoreInit(format!(
                    "Failed to create data directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let db = sled::open(path).map_err(|e| {
            let err_str = e.to_string();
            // Detect lock errors and provide actionable fix
            if err_str.contains("WouldBlock") || err_str.contains("lock") {
                Error::StoreInit(format!(
                    "Store locked at {}\n\n\
                    Another process is using the workspace database, or a previous instance crashed.\n\
                    To fix: rm {}/db/LOCK",
                    path.display(),
                    path.display()
                ))
            } else {
                Error::StoreInit(format!("Failed to open store at {}: {}", path.display(), e))
            }
        })?;

        debug!("Opened workspace store at {}", path.display());

        Self::from_db(db)
    }

    /// In-memory store removed on drop. Used by tests and dry runs.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| Error::StoreInit(e.to_string()))?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> Result<Self> {
        let open_tree = |name: &str| {
            db.open_tree(name)
                .map_err(|e| Error::StoreInit(format!("Failed to open tree {name}: {e}")))
        };

        Ok(Self {
            workspaces: open_tree(WORKSPACES_TREE)?,
            pages: open_tree(PAGES_TREE)?,
            merged: open_tree(MERGED_TREE)?,
            db,
        })
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> Result<()> {
        self.db
            .flush()
            .map_err(|e| Error::StoreWrite(format!("Flush failed: {e}")))?;
        Ok(())
    }

    fn generate_id(&self) -> Result<u64> {
        self.db
            .generate_id()
            .map_err(|e| Error::StoreWrite(format!("Failed to generate row id: {e}")))
    }
}

/// Page row key: workspace uuid followed by the big-endian display order.
fn page_key(workspace: WorkspaceId, display_order: u32) -> Vec<u8> {
    let mut key = Vec::with_capacity(20);
    key.extend_from_slice(workspace.as_bytes());
    key.extend_from_slice(&display_order.to_be_bytes());
    key
}

/// Keys of a workspace's page rows, given the count on its record.
fn page_keys(workspace: WorkspaceId, page_count: u32) -> impl Iterator<Item = Vec<u8>> {
    (0..page_count).map(move |order| page_key(workspace, order))
}

/// Read a workspace record inside a transaction so its page count is part of
/// the transaction's read set.
fn workspace_record(
    workspaces: &TransactionalTree,
    id: WorkspaceId,
) -> ConflictableTransactionResult<Option<Workspace>, Error> {
    workspaces
        .get(id.as_bytes())?
        .map(|raw| decode(&raw).map_err(ConflictableTransactionError::Abort))
        .transpose()
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| Error::StoreWrite(format!("Failed to encode row: {e}")))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| Error::StoreCorrupt(e.to_string()))
}

fn transaction_error(e: TransactionError<Error>) -> Error {
    match e {
        TransactionError::Abort(inner) => inner,
        TransactionError::Storage(storage) => Error::StoreWrite(storage.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_keys_sort_by_display_order() {
        let ws = WorkspaceId::new();
        let mut keys = vec![page_key(ws, 10), page_key(ws, 2), page_key(ws, 256)];
        keys.sort();
        assert_eq!(keys, vec![page_key(ws, 2), page_key(ws, 10), page_key(ws, 256)]);
    }

    #[test]
    fn test_page_key_starts_with_workspace_prefix() {
        let ws = WorkspaceId::new();
        let key = page_key(ws, 7);
        assert_eq!(key.len(), 20);
        assert!(key.starts_with(ws.as_bytes()));
    }

    #[test]
    fn test_page_keys_cover_counted_rows() {
        let ws = WorkspaceId::new();
        let keys: Vec<_> = page_keys(ws, 3).collect();
        assert_eq!(keys, vec![page_key(ws, 0), page_key(ws, 1), page_key(ws, 2)]);
        assert_eq!(page_keys(ws, 0).count(), 0);
    }
}
