//! Multi-variant build orchestration.
//!
//! One independent pipeline per configured variant, each running as its own
//! tokio task over its own forked copy of the source listing. The result is
//! a mapping from variant name to a [`BuildHandle`]; await one handle or
//! [`wait_all`] for the whole run. A variant failing, structurally or at
//! enumeration, leaves its siblings' results usable.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, info_span};

use kiln_config::{BuildVariant, ProjectConfig};

use crate::asset::Asset;
use crate::pipeline::Pipeline;
use crate::service_worker::{
    DEFAULT_PRECACHE_CONFIG, SERVICE_WORKER_PATH, generate_service_worker, load_precache_config,
};
use crate::source::SourceScan;
use crate::stages::assemble_stages;
use crate::{Error, Result};

/// Run-wide build options.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Directory the variant output trees are written under.
    pub build_dir: PathBuf,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            build_dir: PathBuf::from("build"),
        }
    }
}

/// What one completed variant produced.
#[derive(Debug)]
pub struct BuildSummary {
    pub name: String,
    pub output_dir: PathBuf,
    /// Root-relative paths of every file written, including the service
    /// worker when one was requested.
    pub written: Vec<PathBuf>,
}

/// A running variant build: its identity plus the completion primitive.
pub struct BuildHandle {
    pub name: String,
    pub output_dir: PathBuf,
    task: JoinHandle<Result<BuildSummary>>,
}

impl BuildHandle {
    /// Resolves when this variant's stream reaches end-of-stream and its
    /// derived artifact (if requested) is written; rejects on the first
    /// unrecovered stream-level error.
    pub async fn wait(self) -> Result<BuildSummary> {
        self.task
            .await
            .map_err(|e| Error::BuildTask(e.to_string()))?
    }
}

/// Construct and start one pipeline per configured variant.
///
/// Duplicate variant names are last-write-wins in the returned mapping;
/// configuration validation upstream warns about them.
pub fn create_builds(
    config: &ProjectConfig,
    options: &BuildOptions,
) -> HashMap<String, BuildHandle> {
    let scan = Arc::new(SourceScan::new(config));
    let mut handles = HashMap::new();
    for variant in &config.builds {
        let handle = spawn_build(Arc::clone(&scan), config, variant.clone(), options);
        handles.insert(handle.name.clone(), handle);
    }
    handles
}

/// Await every variant, collecting per-variant results so one failure
/// leaves the others' outputs usable.
pub async fn wait_all(
    handles: HashMap<String, BuildHandle>,
) -> HashMap<String, Result<BuildSummary>> {
    let mut results = HashMap::new();
    for (name, handle) in handles {
        results.insert(name, handle.wait().await);
    }
    results
}

fn spawn_build(
    scan: Arc<SourceScan>,
    config: &ProjectConfig,
    variant: BuildVariant,
    options: &BuildOptions,
) -> BuildHandle {
    let name = variant.display_name().to_string();
    let output_dir = options.build_dir.join(variant.dir_name());
    let entrypoint = config.entrypoint.clone();
    let precache_config_path = config.root.join(
        variant
            .sw_precache_config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PRECACHE_CONFIG)),
    );

    let span = info_span!("build", variant = %name);
    let task_output_dir = output_dir.clone();
    let task_name = name.clone();
    let task = tokio::spawn(
        async move {
            run_variant(
                scan,
                variant,
                entrypoint,
                precache_config_path,
                task_output_dir,
                task_name,
            )
            .await
        }
        .instrument(span),
    );

    BuildHandle {
        name,
        output_dir,
        task,
    }
}

async fn run_variant(
    scan: Arc<SourceScan>,
    variant: BuildVariant,
    entrypoint: PathBuf,
    precache_config_path: PathBuf,
    output_dir: PathBuf,
    name: String,
) -> Result<BuildSummary> {
    debug!(?variant, output_dir = %output_dir.display(), "building with options");

    // Start the side-config load before driving the pipeline so the file
    // read overlaps build time.
    let precache_load = variant
        .add_service_worker
        .then(|| tokio::spawn(load_precache_config(precache_config_path)));
    let bundled = variant.bundle.is_enabled();

    let inputs = scan.fork()?;
    info!("({name}) building...");

    let stages = assemble_stages(&variant, &entrypoint);
    let outputs = Pipeline::new(stages).run(inputs)?;

    let mut written = write_assets(&output_dir, &outputs)?;

    if let Some(load) = precache_load {
        let precache_config = load.await.map_err(|e| Error::BuildTask(e.to_string()))?;
        debug!("generating service worker...");
        let source = generate_service_worker(&output_dir, precache_config.as_ref(), bundled)?;
        fs::write(output_dir.join(SERVICE_WORKER_PATH), source)?;
        written.push(PathBuf::from(SERVICE_WORKER_PATH));
    }

    info!(files = written.len(), "({name}) build complete");
    Ok(BuildSummary {
        name,
        output_dir,
        written,
    })
}

/// Flush the drained stream to disk under the variant's output directory.
fn write_assets(output_dir: &Path, assets: &[Asset]) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(output_dir)?;
    let mut written = Vec::new();
    for asset in assets {
        let dest = output_dir.join(&asset.path);
        match &asset.contents {
            None => fs::create_dir_all(&dest)?,
            Some(contents) => {
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&dest, contents)?;
                written.push(asset.path.clone());
            }
        }
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn project(temp: &TempDir, builds: &str) -> ProjectConfig {
        let mut config: ProjectConfig = toml::from_str(builds).unwrap();
        config.root = temp.path().to_path_buf();
        config
    }

    #[tokio::test]
    async fn named_and_default_variants_use_their_own_output_dirs() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "index.html", "<html><body>hi</body></html>");
        let config = project(
            &temp,
            r#"
            [[builds]]
            [[builds]]
            name = "es5"
            "#,
        );

        let options = BuildOptions {
            build_dir: temp.path().join("build"),
        };
        let results = wait_all(create_builds(&config, &options)).await;
        assert_eq!(results.len(), 2);

        let default = results["default"].as_ref().unwrap();
        assert_eq!(default.output_dir, temp.path().join("build"));
        assert!(temp.path().join("build/index.html").is_file());

        let es5 = results["es5"].as_ref().unwrap();
        assert_eq!(es5.output_dir, temp.path().join("build/es5"));
        assert!(temp.path().join("build/es5/index.html").is_file());
    }

    #[tokio::test]
    async fn duplicate_names_are_last_write_wins() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "index.html", "<html></html>");
        let config = project(
            &temp,
            r#"
            [[builds]]
            name = "prod"
            [[builds]]
            name = "prod"
            add_push_manifest = true
            "#,
        );

        let handles = create_builds(&config, &BuildOptions {
            build_dir: temp.path().join("build"),
        });
        assert_eq!(handles.len(), 1);
        let results = wait_all(handles).await;
        let summary = results["prod"].as_ref().unwrap();
        assert!(summary
            .written
            .iter()
            .any(|p| p == Path::new("push-manifest.json")));
    }

    #[tokio::test]
    async fn enumeration_failure_rejects_only_that_run() {
        let config = ProjectConfig {
            root: PathBuf::from("/nonexistent/kiln-orchestrator-test"),
            builds: vec![BuildVariant::default()],
            ..Default::default()
        };
        let results = wait_all(create_builds(&config, &BuildOptions::default())).await;
        assert!(matches!(
            results["default"],
            Err(Error::SourceEnumeration { .. })
        ));
    }
}
