//! PDF Studio Core Library
//!
//! This library provides the core functionality for arranging and merging
//! PDF pages:
//! - Durable workspaces of page references, backed by sled
//! - An editing session that adds, reorders and removes pages
//! - On-demand page previews
//! - A merge pipeline over pluggable source, merge and output capabilities

pub mod arrangement;
pub mod config;
pub mod error;
pub mod merge;
pub mod model;
pub mod output;
pub mod pdf;
pub mod pipeline;
pub mod preview;
pub mod source;
pub mod store;
pub mod util;

pub use arrangement::{AddReport, Arrangement, EditorState, ItemKey, PageItem};
pub use config::{AppConfig, DEFAULT_WORKSPACE_NAME, EngineKind, MergeConfig, PreviewConfig};
pub use error::{Error, Result};
pub use merge::{BuiltinEngine, CommandEngine, MergeEngine, MergeReply, MergeSource, create_engine};
pub use model::{MergedDocument, PageReference, SourceLink, Workspace, WorkspaceId};
pub use output::{DirectoryOutput, OutputStore};
pub use pdf::PageSize;
pub use pipeline::{MergeOutcome, MergePipeline, MergeStage};
pub use preview::{Preview, PreviewCache};
pub use source::{DocumentSource, FileSource};
pub use store::Store;

use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Name of the workspace created when a requested one no longer exists
pub const RESTORED_WORKSPACE_NAME: &str = "Workspace (Restored)";

/// Notice posted alongside [`RESTORED_WORKSPACE_NAME`]
pub const RESTORED_WORKSPACE_NOTICE: &str = "Original workspace not found. Created new.";

/// Entry point that wires the store and capabilities together
pub struct Studio {
    store: Store,
    source: Arc<dyn DocumentSource>,
    previews: PreviewCache,
    pipeline: MergePipeline,
    config: AppConfig,
}

impl Studio {
    /// Open the store and default capabilities described by `config`
    pub fn open(config: AppConfig) -> Result<Self> {
        config.validate()?;
        let store = Store::open(config.storage.store_path())?;
        let engine = create_engine(&config.merge)?;
        let output = Arc::new(DirectoryOutput::new(config.storage.output_path()));

        Ok(Self::with_components(
            config,
            store,
            Arc::new(FileSource::new()),
            engine,
            output,
        ))
    }

    /// Create with custom capabilities
    pub fn with_components(
        config: AppConfig,
        store: Store,
        source: Arc<dyn DocumentSource>,
        engine: Arc<dyn MergeEngine>,
        output: Arc<dyn OutputStore>,
    ) -> Self {
        let previews = PreviewCache::new(Arc::clone(&source), config.preview);
        let pipeline = MergePipeline::new(
            store.clone(),
            Arc::clone(&source),
            engine,
            output,
            config.storage.scratch_path(),
        );

        Self {
            store,
            source,
            previews,
            pipeline,
            config,
        }
    }

    /// Start the merge engine. Call once at process entry.
    pub async fn start(&self) -> Result<()> {
        merge::ensure_started(self.pipeline.engine().as_ref()).await
    }

    pub const fn store(&self) -> &Store {
        &self.store
    }

    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    pub const fn pipeline(&self) -> &MergePipeline {
        &self.pipeline
    }

    /// Create an empty workspace, named from config when `name` is `None`
    pub fn create_workspace(&self, name: Option<&str>) -> Result<Workspace> {
        self.store
            .create_workspace(name.unwrap_or(&self.config.default_workspace_name))
    }

    /// Start an editing session.
    ///
    /// `None` opens a new workspace. An id that no longer exists opens a new
    /// "Workspace (Restored)" workspace and posts a notice saying so.
    pub fn open_workspace(&self, id: Option<WorkspaceId>) -> Result<Arrangement> {
        let existing = match id {
            Some(id) => self.store.workspace(id)?,
            None => None,
        };

        let (workspace, restored) = match (id, existing) {
            (_, Some(workspace)) => (workspace, false),
            (Some(missing), None) => {
                warn!("Workspace {} not found, creating a new one", missing);
                (self.store.create_workspace(RESTORED_WORKSPACE_NAME)?, true)
            }
            (None, None) => (self.create_workspace(None)?, false),
        };

        let arrangement = Arrangement::open(
            self.store.clone(),
            Arc::clone(&self.source),
            self.previews.clone(),
            workspace,
        )?;
        if restored {
            arrangement.notify(RESTORED_WORKSPACE_NOTICE);
        }
        Ok(arrangement)
    }

    /// Remove a merged document's output, then its record.
    ///
    /// Failing to remove the file is logged and does not keep the record.
    pub async fn delete_merged_document(&self, id: Uuid) -> Result<bool> {
        let Some(merged) = self.store.merged_document(id)? else {
            return Ok(false);
        };

        if let Err(e) = self.pipeline.output().discard(&merged.output_locator).await {
            warn!("Failed to remove {}: {}", merged.output_locator, e);
        }
        self.store.delete_merged_document(id)?;

        info!("Deleted merged document {}", merged.name);
        Ok(true)
    }
}
