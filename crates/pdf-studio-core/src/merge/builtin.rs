use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

use super::traits::{EngineInfo, MergeEngine};
use super::{MergeReply, MergeSource};
use crate::error::{Error, Result};
use crate::pdf::assemble_pages;

/// In-process merge with lopdf
#[derive(Debug, Default)]
pub struct BuiltinEngine {
    started: AtomicBool,
}

impl BuiltinEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MergeEngine for BuiltinEngine {
    fn info(&self) -> EngineInfo {
        EngineInfo {
            name: "builtin",
            in_process: true,
        }
    }

    fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    async fn start(&self) -> Result<()> {
        self.started.store(true, Ordering::Release);
        Ok(())
    }

    async fn merge(&self, output: &Path, sources: &[MergeSource]) -> Result<MergeReply> {
        if !self.is_started() {
            return Err(Error::EngineStart("builtin engine not started".to_string()));
        }

        let output_path = output.to_path_buf();
        let selections: Vec<(PathBuf, u32)> = sources
            .iter()
            .map(|s| (s.file_path.clone(), s.page_index))
            .collect();

        let result = tokio::task::spawn_blocking(move || {
            let borrowed: Vec<(&Path, u32)> = selections
                .iter()
                .map(|(path, page)| (path.as_path(), *page))
                .collect();
            assemble_pages(&borrowed, &output_path)
        })
        .await
        .map_err(|e| Error::Task(e.to_string()))?;

        Ok(match result {
            Ok(pages) => {
                debug!("Builtin engine wrote {} pages to {}", pages, output.display());
                MergeReply::Success(output.to_path_buf())
            }
            Err(Error::MergeFailed(reason)) => MergeReply::Failure(reason),
            Err(e) => MergeReply::Failure(e.to_string()),
        })
    }
}
