//! Settings of a SafeScale daemon

use crate::scerr::Result;
use crate::temporal::Timeouts;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Daemon settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Timeouts and delays
    #[serde(default)]
    pub timeouts: Timeouts,
    /// Where cluster metadata is kept
    #[serde(default)]
    pub metadata: MetadataSettings,
    /// Log output
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Metadata backend selection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum MetadataSettings {
    /// Volatile, in-process storage
    #[default]
    Memory,
    /// Sled database at `path`
    Sled {
        /// Database directory
        #[serde(default = "default_metadata_path")]
        path: PathBuf,
    },
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Filter directive used when `RUST_LOG` is not set
    #[serde(default = "default_level")]
    pub level: String,
    /// Print the target of each event
    #[serde(default)]
    pub with_target: bool,
    /// Colored output
    #[serde(default = "default_true")]
    pub ansi: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            with_target: false,
            ansi: true,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

/// Default location of the metadata database
pub fn default_metadata_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("safescale")
        .join("metadata")
}

impl Settings {
    /// Load settings from a YAML (`.yaml`/`.yml`) or JSON file
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        use async_fs::File;
        use futures::io::AsyncReadExt;

        let mut file = File::open(path.as_ref()).await?;
        let mut contents = String::new();
        file.read_to_string(&mut contents).await?;

        match path.as_ref().extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => Ok(serde_yaml::from_str(&contents)?),
            _ => Ok(serde_json::from_str(&contents)?),
        }
    }

    /// Load from `path` when given, defaults otherwise, then apply environment overrides
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::from_file(path).await?,
            None => Self::default(),
        };
        settings
            .timeouts
            .apply_overrides(|key| std::env::var(key).ok());
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    #[smol_potat::test]
    async fn test_from_yaml_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("safescaled.yaml");
        std::fs::write(
            &path,
            "timeouts:\n  host: 10m\nmetadata:\n  backend: sled\n  path: /var/lib/safescale\nlogging:\n  level: debug\n",
        )
        .unwrap();

        let settings = Settings::from_file(&path).await.unwrap();
        assert_eq!(settings.timeouts.host, Duration::from_secs(600));
        assert_eq!(
            settings.metadata,
            MetadataSettings::Sled {
                path: PathBuf::from("/var/lib/safescale")
            }
        );
        assert_eq!(settings.logging.level, "debug");
        assert!(settings.logging.ansi);
    }

    #[smol_potat::test]
    async fn test_from_json_file_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("safescaled.json");
        std::fs::write(&path, r#"{"metadata": {"backend": "memory"}}"#).unwrap();

        let settings = Settings::from_file(&path).await.unwrap();
        assert_eq!(settings.metadata, MetadataSettings::Memory);
        assert_eq!(settings.timeouts, Timeouts::default());
    }

    #[smol_potat::test]
    async fn test_missing_file() {
        let err = Settings::from_file("/nonexistent/safescaled.yaml")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::scerr::ErrorKind::NotFound);
    }
}
