//! Durable records: workspaces, page references and merged documents.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;
use crate::util::now_millis;

/// Opaque workspace identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkspaceId(Uuid);

impl WorkspaceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Raw bytes, used as the store key and page-row key prefix.
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for WorkspaceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for WorkspaceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| Error::ConfigInvalid {
                field: "workspace id".to_string(),
                reason: e.to_string(),
            })
    }
}

/// A user-named, in-progress collection of page references awaiting merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: WorkspaceId,
    pub name: String,
    /// Unix milliseconds
    pub created_at: i64,
    /// Unix milliseconds, bumped on every arrangement change and rename
    pub last_modified: i64,
    /// Number of page rows; they are keyed by display order `0..page_count`
    pub page_count: u32,
}

impl Workspace {
    pub fn new(name: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            id: WorkspaceId::new(),
            name: name.into(),
            created_at: now,
            last_modified: now,
            page_count: 0,
        }
    }
}

/// Durable row id of a page reference.
pub type RowId = u64;

/// One durable (source document, page index, order) record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageReference {
    pub id: RowId,
    pub workspace_id: WorkspaceId,
    /// Opaque locator of the source document; owned by the platform, never copied.
    pub source_uri: String,
    /// Zero-based page index within the source document
    pub page_index: u32,
    /// Zero-based rank within the workspace; dense 0..N-1 after every replace
    pub display_order: u32,
    /// Page width captured at import time
    pub width: u32,
    /// Page height captured at import time
    pub height: u32,
}

/// A page to be written by a replace.
///
/// The display order is not part of a placement: it is the placement's
/// position in the list handed to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagePlacement {
    /// Row id to keep, or `None` for a page that was never persisted
    pub row_id: Option<RowId>,
    pub source_uri: String,
    pub page_index: u32,
    pub width: u32,
    pub height: u32,
}

impl From<&PageReference> for PagePlacement {
    fn from(page: &PageReference) -> Self {
        Self {
            row_id: Some(page.id),
            source_uri: page.source_uri.clone(),
            page_index: page.page_index,
            width: page.width,
            height: page.height,
        }
    }
}

/// Record of a completed merge. Created once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedDocument {
    pub id: Uuid,
    pub name: String,
    /// Locator of the saved output
    pub output_locator: String,
    /// Unix milliseconds
    pub created_at: i64,
    /// Lookup-only back-reference; may dangle once the workspace is gone.
    pub source_workspace_id: Option<WorkspaceId>,
}

impl MergedDocument {
    pub fn new(
        name: impl Into<String>,
        output_locator: impl Into<String>,
        source_workspace_id: Option<WorkspaceId>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            output_locator: output_locator.into(),
            created_at: now_millis(),
            source_workspace_id,
        }
    }
}

/// Resolution of a merged document's back-reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLink {
    Workspace(Workspace),
    Unknown,
}
