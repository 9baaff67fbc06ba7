//! Merge Pipeline: stage inputs, merge, save, finalize, clean up.
//!
//! ```text
//! Idle -> StagingInputs -> Merging -> SavingOutput -> Finalizing -> Done
//!              \______________\____________\______________\-------> Error
//! ```
//!
//! The workspace is deleted if and only if `Finalizing` commits. Scratch
//! files are removed whatever the outcome.

mod scratch;

pub use scratch::ScratchSpace;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::arrangement::PageItem;
use crate::error::{Error, Result};
use crate::merge::{MergeEngine, MergeReply, MergeSource, ensure_started};
use crate::model::{MergedDocument, Workspace};
use crate::output::OutputStore;
use crate::source::DocumentSource;
use crate::store::Store;
use crate::util::{now_millis, output_file_name};

/// File name the engine is asked to write inside the scratch directory
const ENGINE_OUTPUT_NAME: &str = "merged_output.pdf";

/// Progress of one pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStage {
    Idle,
    StagingInputs,
    Merging,
    SavingOutput,
    Finalizing,
    Done,
    Error,
}

impl fmt::Display for MergeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "Idle",
            Self::StagingInputs => "Preparing documents...",
            Self::Merging => "Merging PDFs...",
            Self::SavingOutput => "Saving PDF...",
            Self::Finalizing => "Finalizing...",
            Self::Done => "Done",
            Self::Error => "Failed",
        };
        f.write_str(label)
    }
}

/// Stage observer
pub type Progress<'a> = &'a (dyn Fn(MergeStage) + Send + Sync);

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub merged: MergedDocument,
    pub file_name: String,
    /// Number of distinct source documents copied to scratch storage
    pub staged_inputs: usize,
}

/// Runs merges against injected capabilities
#[derive(Clone)]
pub struct MergePipeline {
    store: Store,
    source: Arc<dyn DocumentSource>,
    engine: Arc<dyn MergeEngine>,
    output: Arc<dyn OutputStore>,
    scratch_dir: PathBuf,
}

impl MergePipeline {
    pub fn new(
        store: Store,
        source: Arc<dyn DocumentSource>,
        engine: Arc<dyn MergeEngine>,
        output: Arc<dyn OutputStore>,
        scratch_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            source,
            engine,
            output,
            scratch_dir: scratch_dir.into(),
        }
    }

    pub fn engine(&self) -> &Arc<dyn MergeEngine> {
        &self.engine
    }

    pub fn output(&self) -> &Arc<dyn OutputStore> {
        &self.output
    }

    /// Merge `pages`, in order, into one saved PDF and retire `workspace`.
    ///
    /// Must not run concurrently for the same workspace.
    pub async fn run(
        &self,
        workspace: &Workspace,
        pages: &[PageItem],
        progress: Option<Progress<'_>>,
    ) -> Result<MergeOutcome> {
        if pages.is_empty() {
            return Err(Error::NothingToMerge);
        }

        let report = |stage: MergeStage| {
            debug!("Merge of {}: {:?}", workspace.id, stage);
            if let Some(progress) = progress {
                progress(stage);
            }
        };

        report(MergeStage::StagingInputs);
        let mut scratch = match ScratchSpace::new(&self.scratch_dir) {
            Ok(scratch) => scratch,
            Err(e) => {
                report(MergeStage::Error);
                return Err(e);
            }
        };

        let result = self.execute(&mut scratch, workspace, pages, &report).await;
        scratch.cleanup();

        match &result {
            Ok(outcome) => {
                report(MergeStage::Done);
                info!(
                    "Merged {} pages of '{}' into {}",
                    pages.len(),
                    workspace.name,
                    outcome.merged.output_locator
                );
            }
            Err(e) => {
                report(MergeStage::Error);
                warn!("Merge of '{}' failed: {}", workspace.name, e);
            }
        }

        result
    }

    async fn execute(
        &self,
        scratch: &mut ScratchSpace,
        workspace: &Workspace,
        pages: &[PageItem],
        report: &(dyn Fn(MergeStage) + Sync),
    ) -> Result<MergeOutcome> {
        ensure_started(self.engine.as_ref()).await?;

        let mut sources = Vec::with_capacity(pages.len());
        for page in pages {
            let file_path = scratch.stage(self.source.as_ref(), &page.source_uri).await?;
            sources.push(MergeSource {
                file_path,
                page_index: page.page_index,
            });
        }
        let staged_inputs = scratch.staged_count();

        report(MergeStage::Merging);
        let requested = scratch.reserve(ENGINE_OUTPUT_NAME);
        let merged_path = match self.engine.merge(&requested, &sources).await? {
            MergeReply::Success(path) => path,
            MergeReply::Failure(reason) => return Err(Error::MergeFailed(reason)),
        };
        if merged_path != requested {
            scratch.track(merged_path.clone());
        }

        report(MergeStage::SavingOutput);
        let file_name = output_file_name(&workspace.name, now_millis());
        let locator = self.output.save(&file_name, &merged_path).await?;

        report(MergeStage::Finalizing);
        let merged = MergedDocument::new(&file_name, &locator, Some(workspace.id));
        if let Err(e) = self.store.finalize_merge(&merged, workspace.id) {
            if let Err(discard) = self.output.discard(&locator).await {
                warn!("Failed to discard unrecorded output {}: {}", locator, discard);
            }
            return Err(e);
        }

        Ok(MergeOutcome {
            merged,
            file_name,
            staged_inputs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_labels() {
        assert_eq!(MergeStage::Merging.to_string(), "Merging PDFs...");
        assert_eq!(MergeStage::SavingOutput.to_string(), "Saving PDF...");
    }
}
