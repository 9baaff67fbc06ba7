use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Name given to workspaces created without one
pub const DEFAULT_WORKSPACE_NAME: &str = "New Workspace";

/// Storage locations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Workspace database directory (defaults to ~/.local/share/pdf-studio/db)
    pub data_dir: Option<PathBuf>,

    /// Where merged PDFs are saved (defaults to ~/Documents/PDFStudio)
    pub output_dir: Option<PathBuf>,

    /// Parent of per-merge scratch directories (defaults to the system temp dir)
    pub scratch_dir: Option<PathBuf>,
}

impl StorageConfig {
    pub fn store_path(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(crate::util::default_store_path)
    }

    pub fn output_path(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(crate::util::default_output_dir)
    }

    pub fn scratch_path(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Preview sizing, as divisors of the page size captured at import
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PreviewConfig {
    /// List thumbnails render at width/divisor × height/divisor
    #[serde(default = "default_thumbnail_divisor")]
    pub thumbnail_divisor: u32,

    /// Full-screen previews render at width/divisor × height/divisor
    #[serde(default = "default_full_divisor")]
    pub full_divisor: u32,
}

const fn default_thumbnail_divisor() -> u32 {
    6
}

const fn default_full_divisor() -> u32 {
    2
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            thumbnail_divisor: default_thumbnail_divisor(),
            full_divisor: default_full_divisor(),
        }
    }
}

/// Which merge engine backs the pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// In-process merge with lopdf
    #[default]
    Builtin,
    /// External program speaking the JSON merge protocol
    Command,
}

/// Merge engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeConfig {
    #[serde(default)]
    pub engine: EngineKind,

    /// Program to run when `engine = "command"`
    pub command: Option<String>,

    /// Extra arguments passed before the output path
    #[serde(default)]
    pub args: Vec<String>,
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub preview: PreviewConfig,

    #[serde(default)]
    pub merge: MergeConfig,

    /// Name given to new workspaces
    #[serde(default = "default_workspace_name")]
    pub default_workspace_name: String,
}

fn default_workspace_name() -> String {
    DEFAULT_WORKSPACE_NAME.to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            preview: PreviewConfig::default(),
            merge: MergeConfig::default(),
            default_workspace_name: default_workspace_name(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, crate::error::Error> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            crate::error::Error::ConfigLoad(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, crate::error::Error> {
        let config: Self = toml::from_str(content).map_err(|e| {
            crate::error::Error::ConfigLoad(format!("Failed to parse config: {e}"))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the rest of the crate cannot work with
    pub fn validate(&self) -> Result<(), crate::error::Error> {
        if self.preview.thumbnail_divisor == 0 {
            return Err(crate::error::Error::ConfigInvalid {
                field: "preview.thumbnail_divisor".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.preview.full_divisor == 0 {
            return Err(crate::error::Error::ConfigInvalid {
                field: "preview.full_divisor".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.merge.engine == EngineKind::Command
            && self.merge.command.as_deref().is_none_or(|c| c.trim().is_empty())
        {
            return Err(crate::error::Error::ConfigInvalid {
                field: "merge.command".to_string(),
                reason: "required when merge.engine = \"command\"".to_string(),
            });
        }
        if self.default_workspace_name.trim().is_empty() {
            return Err(crate::error::Error::ConfigInvalid {
                field: "default_workspace_name".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Load from default locations (~/.config/pdf-studio/config.toml, ./config.toml)
    pub fn load() -> Self {
        // Try user config
        if let Some(config_dir) = crate::util::config_dir() {
            let user_config = config_dir.join("pdf-studio").join("config.toml");
            if user_config.exists() {
                match Self::from_file(&user_config) {
                    Ok(config) => {
                        tracing::debug!("Loaded config from {}", user_config.display());
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // Try local config
        let local_config = std::path::PathBuf::from("config.toml");
        if local_config.exists() {
            match Self::from_file(&local_config) {
                Ok(config) => {
                    tracing::debug!("Loaded config from ./config.toml");
                    return config;
                }
                Err(e) => {
                    tracing::warn!("Failed to load ./config.toml: {}", e);
                }
            }
        }

        tracing::debug!("No config file found, using defaults");
        Self::default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.preview.thumbnail_divisor, 6);
        assert_eq!(config.preview.full_divisor, 2);
        assert_eq!(config.merge.engine, EngineKind::Builtin);
        assert_eq!(config.default_workspace_name, "New Workspace");
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [storage]
            output_dir = "/tmp/out"

            [preview]
            thumbnail_divisor = 4
            "#,
        )
        .unwrap();
        assert_eq!(config.storage.output_path(), PathBuf::from("/tmp/out"));
        assert_eq!(config.preview.thumbnail_divisor, 4);
        assert_eq!(config.preview.full_divisor, 2);
    }

    #[test]
    fn test_command_engine_requires_command() {
        let err = AppConfig::from_toml("[merge]\nengine = \"command\"\n").unwrap_err();
        assert!(err.to_string().contains("merge.command"));
    }

    #[test]
    fn test_zero_divisor_rejected() {
        assert!(AppConfig::from_toml("[preview]\nfull_divisor = 0\n").is_err());
    }
}
