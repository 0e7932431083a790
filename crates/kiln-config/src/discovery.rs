//! File-based config discovery for CLI use.
//!
//! Searches the project root for a kiln configuration and loads it. Library
//! users should construct [`ProjectConfig`] directly or go through
//! `ProjectConfig::from_value`.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::{ConfigError, Result};
use crate::project::ProjectConfig;

/// Searches for a kiln configuration file in conventional locations.
///
/// Search order:
/// 1. `kiln.toml`
/// 2. `package.json` with a `"kiln"` field
pub struct ConfigDiscovery {
    root: PathBuf,
}

impl ConfigDiscovery {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Find a config file in the root directory, if any.
    pub fn find(&self) -> Option<PathBuf> {
        let toml_path = self.root.join("kiln.toml");
        if toml_path.exists() {
            return Some(toml_path);
        }

        let pkg_path = self.root.join("package.json");
        if pkg_path.exists() {
            if let Ok(content) = fs::read_to_string(&pkg_path) {
                if let Ok(parsed) = serde_json::from_str::<Value>(&content) {
                    if parsed.get("kiln").is_some_and(|v| !v.is_null()) {
                        return Some(pkg_path);
                    }
                }
            }
        }

        None
    }

    /// Load config from the discovered file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if no config file is found.
    pub fn load(&self) -> Result<ProjectConfig> {
        let path = self.find().ok_or(ConfigError::NotFound)?;
        self.load_from(&path)
    }

    fn load_from(&self, path: &Path) -> Result<ProjectConfig> {
        if path.file_name() == Some(std::ffi::OsStr::new("package.json")) {
            return self.load_from_package_json(path);
        }

        let content = fs::read_to_string(path)?;
        let mut config: ProjectConfig =
            toml::from_str(&content).map_err(|e| ConfigError::InvalidValue {
                field: "kiln.toml".to_string(),
                hint: e.to_string(),
            })?;
        config.root = self.root.clone();
        Ok(config)
    }

    fn load_from_package_json(&self, path: &Path) -> Result<ProjectConfig> {
        let content = fs::read_to_string(path)?;
        let parsed: Value =
            serde_json::from_str(&content).map_err(|e| ConfigError::InvalidValue {
                field: "package.json".to_string(),
                hint: e.to_string(),
            })?;

        let kiln_value = parsed
            .get("kiln")
            .filter(|v| !v.is_null())
            .cloned()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "kiln".to_string(),
                hint: "add a 'kiln' field to your package.json".to_string(),
            })?;

        ProjectConfig::from_value(kiln_value, self.root.clone())
    }
}
