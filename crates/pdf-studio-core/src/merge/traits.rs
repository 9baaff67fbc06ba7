use async_trait::async_trait;
use std::path::Path;

use super::{MergeReply, MergeSource};
use crate::error::Result;

/// Information about a merge backend
#[derive(Debug, Clone)]
pub struct EngineInfo {
    /// Human-readable name
    pub name: &'static str,
    /// Whether merging happens inside this process
    pub in_process: bool,
}

/// Trait for merge backends.
///
/// An engine is started once, at process entry, and then shared by
/// reference with every pipeline run.
#[async_trait]
pub trait MergeEngine: Send + Sync {
    /// Get information about this engine
    fn info(&self) -> EngineInfo;

    /// Get the engine name (convenience method)
    fn name(&self) -> &'static str {
        self.info().name
    }

    fn is_started(&self) -> bool;

    /// Bring the engine up. Calling it on a started engine is a no-op.
    async fn start(&self) -> Result<()>;

    /// Write the pages `sources` names, in that order, into `output`.
    ///
    /// A failure the engine itself reports comes back as
    /// [`MergeReply::Failure`]; `Err` means the engine could not be asked or
    /// answered with something unreadable.
    async fn merge(&self, output: &Path, sources: &[MergeSource]) -> Result<MergeReply>;
}
