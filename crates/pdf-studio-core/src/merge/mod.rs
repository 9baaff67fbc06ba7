//! Merge capability: combine (file, page index) pairs into one PDF.

mod builtin;
mod command;
mod traits;

pub use builtin::BuiltinEngine;
pub use command::CommandEngine;
pub use traits::{EngineInfo, MergeEngine};

use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{EngineKind, MergeConfig};
use crate::error::{Error, Result};

/// One page handed to a merge engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeSource {
    /// Staged local copy of the source document
    pub file_path: PathBuf,
    /// Zero-based page index within that file
    pub page_index: u32,
}

/// What a merge engine reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeReply {
    /// Merged output written to this path
    Success(PathBuf),
    /// Human-readable reason
    Failure(String),
}

impl MergeReply {
    /// Read a `[success, path_or_message]` pair.
    ///
    /// Anything else (wrong arity, wrong types, not an array) is a
    /// [`Error::MalformedReply`].
    pub fn from_value(value: &Value) -> Result<Self> {
        match value.as_array().map(Vec::as_slice) {
            Some([Value::Bool(true), Value::String(path)]) if !path.is_empty() => {
                Ok(Self::Success(PathBuf::from(path)))
            }
            Some([Value::Bool(false), Value::String(message)]) => {
                Ok(Self::Failure(message.clone()))
            }
            _ => Err(Error::MalformedReply(value.to_string())),
        }
    }
}

/// Start `engine` unless it already is
pub async fn ensure_started(engine: &dyn MergeEngine) -> Result<()> {
    if !engine.is_started() {
        engine.start().await?;
        tracing::info!("Started merge engine: {}", engine.name());
    }
    Ok(())
}

/// Create a merge engine from configuration
pub fn create_engine(config: &MergeConfig) -> Result<Arc<dyn MergeEngine>> {
    match config.engine {
        EngineKind::Builtin => Ok(Arc::new(BuiltinEngine::new())),
        EngineKind::Command => {
            let program = config
                .command
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .ok_or_else(|| Error::ConfigInvalid {
                    field: "merge.command".to_string(),
                    reason: "required when merge.engine = \"command\"".to_string(),
                })?;
            Ok(Arc::new(CommandEngine::new(program, config.args.clone())))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reply_success() {
        let reply = MergeReply::from_value(&json!([true, "/tmp/out.pdf"])).unwrap();
        assert_eq!(reply, MergeReply::Success(PathBuf::from("/tmp/out.pdf")));
    }

    #[test]
    fn test_reply_failure_keeps_message() {
        let reply = MergeReply::from_value(&json!([false, "bad page"])).unwrap();
        assert_eq!(reply, MergeReply::Failure("bad page".to_string()));
    }

    #[test]
    fn test_malformed_replies() {
        for value in [
            json!([true]),
            json!([true, "/a.pdf", "extra"]),
            json!(["true", "/a.pdf"]),
            json!([true, 7]),
            json!([true, ""]),
            json!({"success": true, "path": "/a.pdf"}),
            json!(null),
        ] {
            let err = MergeReply::from_value(&value).unwrap_err();
            assert!(matches!(err, Error::MalformedReply(_)), "{value}");
        }
    }

    #[test]
    fn test_merge_source_wire_format() {
        let source = MergeSource {
            file_path: PathBuf::from("/scratch/a.pdf"),
            page_index: 2,
        };
        assert_eq!(
            serde_json::to_value(&source).unwrap(),
            json!({"file_path": "/scratch/a.pdf", "page_index": 2})
        );
    }

    #[test]
    fn test_create_engine_from_config() {
        let builtin = create_engine(&MergeConfig::default()).unwrap();
        assert!(builtin.info().in_process);

        let config = MergeConfig {
            engine: EngineKind::Command,
            command: Some("pdf-merge".to_string()),
            args: Vec::new(),
        };
        assert_eq!(create_engine(&config).unwrap().name(), "command");

        let missing = MergeConfig {
            engine: EngineKind::Command,
            ..MergeConfig::default()
        };
        assert!(create_engine(&missing).is_err());
    }

    #[tokio::test]
    async fn test_ensure_started_is_idempotent() {
        let engine = BuiltinEngine::new();
        assert!(!engine.is_started());
        ensure_started(&engine).await.unwrap();
        ensure_started(&engine).await.unwrap();
        assert!(engine.is_started());
    }
}
