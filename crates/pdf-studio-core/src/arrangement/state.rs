use super::PageItem;
use crate::model::WorkspaceId;

/// What an editor view observes about one editing session
#[derive(Debug, Clone, Default)]
pub struct EditorState {
    pub workspace_id: Option<WorkspaceId>,
    pub workspace_name: String,
    /// Pages in display order
    pub pages: Vec<PageItem>,
    pub is_loading: bool,
    /// A merge is in flight; the merge trigger should be disabled
    pub is_saving: bool,
    /// Label of the running merge stage
    pub processing_message: Option<String>,
    /// Transient notification, shown once and then cleared by the viewer
    pub notice: Option<String>,
}
