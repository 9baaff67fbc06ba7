use thiserror::Error;

use crate::model::WorkspaceId;

/// Unified error type for pdf-studio-core
///
/// This enum encompasses all error cases that can occur in the library:
/// - Durable store operations (opening, reading, writing, transactions)
/// - Workspace editing (missing or closed workspaces, invalid names)
/// - Source documents (locators, opening, reading, rendering)
/// - Merging and saving the merged output
/// - Configuration operations (loading, validation)
/// - General I/O operations
#[derive(Error, Debug)]
pub enum Error {
    // ==========================================================================
    // Store Errors
    // ==========================================================================
    /// Failed to open the durable store
    #[error("failed to open store: {0}")]
    StoreInit(String),

    /// Failed to read from the durable store
    #[error("failed to read from store: {0}")]
    StoreRead(String),

    /// Failed to write to the durable store
    #[error("failed to write to store: {0}")]
    StoreWrite(String),

    /// A stored row could not be decoded
    #[error("corrupt store row: {0}")]
    StoreCorrupt(String),

    // ==========================================================================
    // Workspace Errors
    // ==========================================================================
    /// The workspace does not exist (never created, deleted or merged)
    #[error("workspace {0} not found")]
    WorkspaceNotFound(WorkspaceId),

    /// The editing session was closed by a successful merge
    #[error("workspace session is closed")]
    WorkspaceClosed,

    /// A workspace name was empty
    #[error("workspace name must not be empty")]
    EmptyName,

    // ==========================================================================
    // Document Errors
    // ==========================================================================
    /// The locator scheme is not understood by the document source
    #[error("unsupported document locator: {0}")]
    UnsupportedLocator(String),

    /// Failed to read the bytes of a source document
    #[error("failed to read {locator}: {reason}")]
    SourceRead { locator: String, reason: String },

    /// Failed to open or parse a PDF file
    #[error("failed to open PDF: {0}")]
    PdfOpen(String),

    /// Invalid page number requested
    #[error("invalid page number {page} (document has {total} pages)")]
    PdfInvalidPage { page: usize, total: usize },

    /// Failed to render a PDF page
    #[error("failed to render page {page}: {reason}")]
    PdfRender { page: usize, reason: String },

    /// Error from the lopdf library
    #[error("lopdf error: {0}")]
    Lopdf(String),

    // ==========================================================================
    // Merge Errors
    // ==========================================================================
    /// The arrangement has no pages
    #[error("no pages to merge")]
    NothingToMerge,

    /// The merge engine could not be started
    #[error("failed to start merge engine: {0}")]
    EngineStart(String),

    /// The merge engine reported a failure
    #[error("merge failed: {0}")]
    MergeFailed(String),

    /// The merge engine answered with something other than a (success, message) pair
    #[error("unexpected response from merge engine: {0}")]
    MalformedReply(String),

    /// Failed to write the merged output to durable storage
    #[error("failed to save merged PDF: {0}")]
    Save(String),

    // ==========================================================================
    // Configuration Errors
    // ==========================================================================
    /// Failed to load configuration file
    #[error("failed to load config: {0}")]
    ConfigLoad(String),

    /// Invalid configuration value
    #[error("invalid config value for '{field}': {reason}")]
    ConfigInvalid { field: String, reason: String },

    // ==========================================================================
    // Runtime Errors
    // ==========================================================================
    /// A blocking task panicked or was cancelled
    #[error("background task failed: {0}")]
    Task(String),

    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Short message suitable for a transient user notification.
    pub fn user_message(&self) -> String {
        match self {
            Self::NothingToMerge => "No pages to merge.".to_string(),
            Self::MergeFailed(reason) => format!("Merge failed: {reason}"),
            Self::MalformedReply(_) | Self::Task(_) => {
                "Error: the PDF could not be processed.".to_string()
            }
            Self::Save(reason) => format!("Save failed: {reason}"),
            Self::SourceRead { locator, .. } => format!("Error reading {}", display_name(locator)),
            other => format!("Error: {other}"),
        }
    }
}

/// Last path segment of a locator, for notifications.
pub(crate) fn display_name(locator: &str) -> &str {
    locator
        .trim_end_matches('/')
        .rsplit(['/', '\\'])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(locator)
}

pub type Result<T> = std::result::Result<T, Error>;
