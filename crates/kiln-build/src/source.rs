//! Enumeration of the two asset origins: project sources and resolved
//! external dependencies.
//!
//! One [`SourceScan`] is shared by every variant of a build run. The scan is
//! performed lazily and cached on success; each variant calls [`fork`] to
//! receive a value-independent copy of the listing, so no variant can
//! observe another's content mutations. A failed scan is not cached: the
//! error surfaces in the variant that triggered it and the next variant
//! retries, keeping enumeration failures fatal per pipeline rather than per
//! run.
//!
//! [`fork`]: SourceScan::fork

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;
use walkdir::WalkDir;

use kiln_config::ProjectConfig;

use crate::asset::Asset;
use crate::{Error, Result};

/// Shared, lazily cached enumeration of a project's source and dependency
/// origins.
pub struct SourceScan {
    root: PathBuf,
    entrypoint: PathBuf,
    source_dirs: Vec<PathBuf>,
    dependency_dirs: Vec<PathBuf>,
    cache: Mutex<Option<Arc<Vec<Asset>>>>,
}

impl SourceScan {
    pub fn new(config: &ProjectConfig) -> Self {
        Self {
            root: config.root.clone(),
            entrypoint: config.entrypoint.clone(),
            source_dirs: config.sources.clone(),
            dependency_dirs: config.dependencies.clone(),
            cache: Mutex::new(None),
        }
    }

    /// A value-independent copy of the merged source + dependency listing.
    pub fn fork(&self) -> Result<Vec<Asset>> {
        let mut cache = self.cache.lock();
        if let Some(cached) = cache.as_ref() {
            return Ok(cached.as_ref().clone());
        }
        let scanned = Arc::new(self.scan()?);
        *cache = Some(Arc::clone(&scanned));
        Ok(scanned.as_ref().clone())
    }

    fn scan(&self) -> Result<Vec<Asset>> {
        if !self.root.is_dir() {
            return Err(Error::SourceEnumeration {
                root: self.root.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "project root is not a directory",
                ),
            });
        }

        let mut assets = Vec::new();

        // The entrypoint document lives at the project root, outside the
        // source directories.
        let entry_abs = self.root.join(&self.entrypoint);
        if entry_abs.is_file() {
            assets.push(self.read_asset(&entry_abs, &self.entrypoint)?);
        }

        for dir in self.source_dirs.iter().chain(&self.dependency_dirs) {
            self.walk_origin(dir, &mut assets)?;
        }

        debug!(
            root = %self.root.display(),
            count = assets.len(),
            "enumerated project sources and dependencies"
        );
        Ok(assets)
    }

    /// Missing origin directories are an empty origin, not an error;
    /// anything else that fails mid-walk aborts the scan.
    fn walk_origin(&self, dir: &Path, assets: &mut Vec<Asset>) -> Result<()> {
        let abs = self.root.join(dir);
        if !abs.exists() {
            return Ok(());
        }
        for entry in WalkDir::new(&abs).follow_links(false) {
            let entry = entry.map_err(|e| Error::SourceEnumeration {
                root: abs.clone(),
                source: e.into(),
            })?;
            let rel = dir.join(
                entry
                    .path()
                    .strip_prefix(&abs)
                    .expect("walkdir yields children of its root"),
            );
            if entry.file_type().is_dir() {
                if entry.path() != abs {
                    assets.push(Asset::directory(rel));
                }
            } else {
                assets.push(self.read_asset(entry.path(), &rel)?);
            }
        }
        Ok(())
    }

    fn read_asset(&self, abs: &Path, rel: &Path) -> Result<Asset> {
        let contents = fs::read(abs).map_err(|source| Error::SourceEnumeration {
            root: abs.to_path_buf(),
            source,
        })?;
        Ok(Asset::new(rel.to_path_buf(), contents))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project(temp: &TempDir) -> ProjectConfig {
        ProjectConfig {
            root: temp.path().to_path_buf(),
            ..Default::default()
        }
    }

    fn write(temp: &TempDir, rel: &str, contents: &str) {
        let path = temp.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn merges_entrypoint_sources_and_dependencies() {
        let temp = TempDir::new().unwrap();
        write(&temp, "index.html", "<html></html>");
        write(&temp, "src/app.js", "let x = 1;");
        write(&temp, "vendor/lib/lib.js", "var lib;");

        let scan = SourceScan::new(&project(&temp));
        let assets = scan.fork().unwrap();
        let paths: Vec<String> = assets.iter().map(|a| a.path_str()).collect();
        assert!(paths.contains(&"index.html".to_string()));
        assert!(paths.contains(&"src/app.js".to_string()));
        assert!(paths.contains(&"vendor/lib/lib.js".to_string()));
        // the lib directory itself appears as a marker
        assert!(assets.iter().any(|a| a.contents.is_none() && a.path_str() == "vendor/lib"));
    }

    #[test]
    fn missing_dependency_dir_is_empty_origin() {
        let temp = TempDir::new().unwrap();
        write(&temp, "index.html", "<html></html>");

        let scan = SourceScan::new(&project(&temp));
        let assets = scan.fork().unwrap();
        assert_eq!(assets.len(), 1);
    }

    #[test]
    fn forks_are_value_independent() {
        let temp = TempDir::new().unwrap();
        write(&temp, "src/app.js", "original");

        let scan = SourceScan::new(&project(&temp));
        let mut first = scan.fork().unwrap();
        let second = scan.fork().unwrap();

        let idx = first.iter().position(|a| a.path_str() == "src/app.js").unwrap();
        first[idx].set_text("mutated".to_string());

        let other = second.iter().find(|a| a.path_str() == "src/app.js").unwrap();
        assert_eq!(other.contents_utf8().unwrap(), "original");
    }

    #[test]
    fn missing_root_fails_enumeration() {
        let config = ProjectConfig {
            root: PathBuf::from("/nonexistent/kiln-test-root"),
            ..Default::default()
        };
        let scan = SourceScan::new(&config);
        assert!(matches!(scan.fork(), Err(Error::SourceEnumeration { .. })));
    }
}
