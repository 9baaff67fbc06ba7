use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use super::traits::{EngineInfo, MergeEngine};
use super::{MergeReply, MergeSource};
use crate::error::{Error, Result};

/// External merge program.
///
/// Invoked once per merge as `<command> <args...> <output>`. The request is
/// written to stdin as `{"output": ..., "sources": [{"file_path", "page_index"}]}`
/// and the program answers on stdout with `[success, path_or_message]`.
#[derive(Debug)]
pub struct CommandEngine {
    /// Program to run
    pub program: String,
    /// Arguments placed before the output path
    pub args: Vec<String>,
    started: AtomicBool,
}

#[derive(Debug, Serialize)]
struct MergeRequest<'a> {
    output: &'a Path,
    sources: &'a [MergeSource],
}

impl CommandEngine {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            started: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl MergeEngine for CommandEngine {
    fn info(&self) -> EngineInfo {
        EngineInfo {
            name: "command",
            in_process: false,
        }
    }

    fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    async fn start(&self) -> Result<()> {
        let program = Path::new(&self.program);
        if program.components().count() > 1 && !program.is_file() {
            return Err(Error::EngineStart(format!(
                "merge command not found: {}",
                self.program
            )));
        }
        self.started.store(true, Ordering::Release);
        Ok(())
    }

    async fn merge(&self, output: &Path, sources: &[MergeSource]) -> Result<MergeReply> {
        if !self.is_started() {
            return Err(Error::EngineStart(format!("{} not started", self.program)));
        }

        let request = serde_json::to_vec(&MergeRequest { output, sources })
            .map_err(|e| Error::MergeFailed(format!("Failed to encode request: {e}")))?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(output)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::EngineStart(format!("Failed to run {}: {}", self.program, e)))?;

        // Stdin is fed while stdout and stderr drain, so a program that talks
        // before it reads cannot stall on a full pipe.
        let stdin = child.stdin.take();
        let program = self.program.as_str();
        let send = async move {
            let Some(mut stdin) = stdin else {
                return;
            };
            if let Err(e) = stdin.write_all(&request).await {
                // The program may exit without reading its input; its reply still decides.
                warn!("Failed to write merge request to {}: {}", program, e);
            }
        };

        let ((), result) = tokio::join!(send, child.wait_with_output());
        let result = result?;
        let stderr = String::from_utf8_lossy(&result.stderr);

        if !result.status.success() {
            let reason = stderr.trim();
            return Ok(MergeReply::Failure(if reason.is_empty() {
                format!("{} exited with {}", self.program, result.status)
            } else {
                reason.to_string()
            }));
        }

        if !stderr.trim().is_empty() {
            debug!("{} stderr: {}", self.program, stderr.trim());
        }

        let value: serde_json::Value = serde_json::from_slice(&result.stdout).map_err(|e| {
            Error::MalformedReply(format!(
                "{e}: {}",
                String::from_utf8_lossy(&result.stdout).trim()
            ))
        })?;

        MergeReply::from_value(&value)
    }
}
