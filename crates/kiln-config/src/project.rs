//! Project-level configuration: layout plus the list of build variants.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigError, Result};
use crate::variant::BuildVariant;

/// A parsed kiln project configuration.
///
/// `root` is not part of the config file; it is filled in by the loader
/// with the directory the config was discovered in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project root directory. Relative layout paths resolve against it.
    #[serde(skip)]
    pub root: PathBuf,

    /// The application shell document.
    #[serde(default = "default_entrypoint")]
    pub entrypoint: PathBuf,

    /// Directories holding the project's own files.
    #[serde(default = "default_sources")]
    pub sources: Vec<PathBuf>,

    /// Directories holding resolved external dependency files. Missing
    /// directories are treated as an empty origin.
    #[serde(default = "default_dependencies")]
    pub dependencies: Vec<PathBuf>,

    /// One entry per requested build output.
    #[serde(default)]
    pub builds: Vec<BuildVariant>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            entrypoint: default_entrypoint(),
            sources: default_sources(),
            dependencies: default_dependencies(),
            builds: Vec::new(),
        }
    }
}

impl ProjectConfig {
    /// Create from a `serde_json::Value` (for programmatic configuration).
    pub fn from_value(value: Value, root: impl Into<PathBuf>) -> Result<Self> {
        let mut config: ProjectConfig =
            serde_json::from_value(value).map_err(|e| ConfigError::InvalidValue {
                field: "config".to_string(),
                hint: e.to_string(),
            })?;
        config.root = root.into();
        Ok(config)
    }

}

fn default_entrypoint() -> PathBuf {
    PathBuf::from("index.html")
}

fn default_sources() -> Vec<PathBuf> {
    vec![PathBuf::from("src")]
}

fn default_dependencies() -> Vec<PathBuf> {
    vec![PathBuf::from("vendor")]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_builds_list_from_toml() {
        let config: ProjectConfig = toml::from_str(
            r#"
            entrypoint = "index.html"
            sources = ["src", "assets"]

            [[builds]]
            name = "es5"
            js = { compile = true }

            [[builds]]
            name = "prod"
            bundle = true
            js = { compile = true, minify = true }
            css = { minify = true }
            html = { minify = true }
            add_service_worker = true
            "#,
        )
        .unwrap();

        assert_eq!(config.builds.len(), 2);
        assert_eq!(config.builds[0].name, "es5");
        assert!(config.builds[0].js.compile);
        assert!(!config.builds[0].js.minify);
        assert!(config.builds[1].bundle.is_enabled());
        assert!(config.builds[1].add_service_worker);
        assert_eq!(config.sources, vec![PathBuf::from("src"), PathBuf::from("assets")]);
    }

    #[test]
    fn from_value_fills_root() {
        let config = ProjectConfig::from_value(
            serde_json::json!({
                "builds": [{"name": "dev"}]
            }),
            "/tmp/app",
        )
        .unwrap();
        assert_eq!(config.root, PathBuf::from("/tmp/app"));
        assert_eq!(config.entrypoint, PathBuf::from("index.html"));
        assert_eq!(config.builds[0].name, "dev");
    }
}
