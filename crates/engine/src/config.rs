//! Engine configuration.
//!
//! Project-level settings live in `.stageflow/config.json` under the
//! workspace root. Missing or unparseable config falls back to defaults
//! with a warning rather than failing the engine.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Directory under the workspace root holding all engine state.
pub const STAGEFLOW_DIR: &str = ".stageflow";
const CONFIG_FILE: &str = "config.json";

/// Settings controlling engine behavior for one workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Workspace root the engine operates in.
    #[serde(skip)]
    pub root: PathBuf,
    /// Whether the optional scaffolding phase is inserted between planning
    /// and coding. Evaluated once, at the planning/coding boundary.
    #[serde(default)]
    pub scaffolding_enabled: bool,
    /// Directory with user template overrides, relative to the stageflow dir.
    #[serde(default = "default_templates_dir")]
    pub templates_dir: String,
    /// Backing file for the local task source, relative to the stageflow dir.
    #[serde(default = "default_tasks_file")]
    pub tasks_file: String,
}

fn default_templates_dir() -> String {
    "templates".to_string()
}

fn default_tasks_file() -> String {
    "tasks.json".to_string()
}

impl EngineConfig {
    /// Config with defaults for the given workspace root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            scaffolding_enabled: false,
            templates_dir: default_templates_dir(),
            tasks_file: default_tasks_file(),
        }
    }

    /// Read config from the workspace root, falling back to defaults.
    pub fn read(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let config_path = root.join(STAGEFLOW_DIR).join(CONFIG_FILE);

        if !config_path.exists() {
            debug!(path = %config_path.display(), "Config file does not exist, using defaults");
            return Self::new(root);
        }

        match fs::read_to_string(&config_path) {
            Ok(content) => match serde_json::from_str::<EngineConfig>(&content) {
                Ok(mut config) => {
                    debug!(path = %config_path.display(), "Config loaded successfully");
                    config.root = root.to_path_buf();
                    config
                }
                Err(e) => {
                    warn!(path = %config_path.display(), error = %e, "Failed to parse config, using defaults");
                    Self::new(root)
                }
            },
            Err(e) => {
                warn!(path = %config_path.display(), error = %e, "Failed to read config file, using defaults");
                Self::new(root)
            }
        }
    }

    /// Write config to the workspace root.
    pub fn write(&self) -> std::io::Result<()> {
        let dir = self.stageflow_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(dir.join(CONFIG_FILE), content)?;
        debug!(path = %dir.join(CONFIG_FILE).display(), "Config saved");
        Ok(())
    }

    pub fn stageflow_dir(&self) -> PathBuf {
        self.root.join(STAGEFLOW_DIR)
    }

    pub fn templates_path(&self) -> PathBuf {
        self.stageflow_dir().join(&self.templates_dir)
    }

    pub fn tasks_path(&self) -> PathBuf {
        self.stageflow_dir().join(&self.tasks_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_defaults_when_missing() {
        let temp = TempDir::new().unwrap();
        let config = EngineConfig::read(temp.path());
        assert!(!config.scaffolding_enabled);
        assert_eq!(config.templates_dir, "templates");
    }

    #[test]
    fn test_config_write_and_read() {
        let temp = TempDir::new().unwrap();
        let mut config = EngineConfig::new(temp.path());
        config.scaffolding_enabled = true;
        config.write().unwrap();

        let loaded = EngineConfig::read(temp.path());
        assert!(loaded.scaffolding_enabled);
        assert_eq!(loaded.root, temp.path());
    }

    #[test]
    fn test_config_defaults_on_parse_error() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(STAGEFLOW_DIR);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(CONFIG_FILE), "{ not json").unwrap();

        let config = EngineConfig::read(temp.path());
        assert!(!config.scaffolding_enabled);
    }
}
