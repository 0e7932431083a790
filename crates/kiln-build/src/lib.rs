//! # kiln-build
//!
//! Multi-variant build pipeline engine for web projects.
//!
//! kiln turns a project's sources and vendored dependencies into one or
//! more optimized output trees. Each configured variant gets its own
//! pipeline: the merged source stream is forked, composite HTML documents
//! are split into independently transformable fragments, the enabled
//! optimize stages run (script downleveling and minification via oxc,
//! style minification via lightningcss, markup minification), documents
//! are reassembled, document-level extras apply (legacy shims, bundling,
//! prefetch links, base-path rewrite, push manifest), the tree is written,
//! and, when requested, a service worker is generated from the final
//! output.
//!
//! ## Quick start
//!
//! ```no_run
//! use kiln_build::{BuildOptions, create_builds, wait_all};
//! use kiln_config::ConfigDiscovery;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigDiscovery::new(".").load()?;
//! kiln_config::validate(&config)?;
//!
//! let handles = create_builds(&config, &BuildOptions::default());
//! for (name, result) in wait_all(handles).await {
//!     match result {
//!         Ok(summary) => println!("{name}: {} files", summary.written.len()),
//!         Err(error) => eprintln!("{name}: {error}"),
//!     }
//! }
//! # Ok(()) }
//! ```
//!
//! kiln emits `tracing` events; install your own subscriber, or enable the
//! `logging` feature for the convenience initializers.

pub mod asset;
pub mod build;
pub mod bundle;
pub mod document;
pub mod pipeline;
pub mod push_manifest;
pub mod service_worker;
pub mod source;
pub mod split;
pub mod stages;
pub mod transform;

// Logging utilities (optional, enabled with "logging" feature)
#[cfg(feature = "logging")]
pub mod logging;

#[cfg(feature = "logging")]
pub use logging::{LogLevel, init_logging};

pub use asset::{Asset, AssetKind, FragmentInfo, FragmentKind};
pub use build::{BuildHandle, BuildOptions, BuildSummary, create_builds, wait_all};
pub use bundle::BundleStage;
pub use document::{BaseTagStage, InjectScriptStage, PrefetchLinksStage};
pub use pipeline::{Pipeline, Stage};
pub use push_manifest::PushManifestStage;
pub use service_worker::{
    PrecacheConfig, SERVICE_WORKER_PATH, generate_service_worker, load_precache_config,
};
pub use source::SourceScan;
pub use split::HtmlSplitter;
pub use stages::assemble_stages;
pub use transform::{
    Transform, TransformStage, compile_scripts, minify_markup, minify_scripts, minify_styles,
};

use std::path::PathBuf;

/// Error types for kiln-build operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Reading a source or dependency origin failed.
    #[error("source enumeration failed under {root}: {source}")]
    SourceEnumeration {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A fragment arrived for a document the splitter never registered.
    #[error("fragment {path} has no registered parent document {parent}")]
    OrphanFragment { path: PathBuf, parent: PathBuf },

    /// A document never completed: its shell or some of its fragments were
    /// still outstanding at end-of-stream.
    #[error(
        "document {path} never completed: received {received} of {expected} fragments (shell present: {shell_present})"
    )]
    IncompleteDocument {
        path: PathBuf,
        expected: usize,
        received: usize,
        shell_present: bool,
    },

    /// A split marker was gone from its shell at rejoin time.
    #[error("split marker {index} missing from document {path}")]
    MissingSplitMarker { path: PathBuf, index: usize },

    /// Service-worker generation failed after the stream drained.
    #[error("service worker generation failed: {0}")]
    ServiceWorker(String),

    /// A variant's build task failed to join.
    #[error("build task failed: {0}")]
    BuildTask(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from configuration handling.
    #[error("configuration error: {0}")]
    Config(#[from] kiln_config::ConfigError),
}

/// Result type alias for kiln-build operations.
pub type Result<T> = std::result::Result<T, Error>;

impl miette::Diagnostic for Error {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        Some(Box::new(match self {
            Error::SourceEnumeration { .. } => "SOURCE_ENUMERATION",
            Error::OrphanFragment { .. } => "ORPHAN_FRAGMENT",
            Error::IncompleteDocument { .. } => "INCOMPLETE_DOCUMENT",
            Error::MissingSplitMarker { .. } => "MISSING_SPLIT_MARKER",
            Error::ServiceWorker(_) => "SERVICE_WORKER",
            Error::BuildTask(_) => "BUILD_TASK",
            Error::Io(_) => "IO_ERROR",
            Error::Config(_) => "CONFIG_ERROR",
        }))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(miette::Severity::Error)
    }

    fn help(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        match self {
            Error::SourceEnumeration { root, .. } => Some(Box::new(format!(
                "Check that '{}' exists and is readable.",
                root.display()
            ))),
            Error::IncompleteDocument { path, .. } => Some(Box::new(format!(
                "The stream ended while '{}' still had outstanding fragments. \
                 A stage between split and rejoin dropped or renamed records.",
                path.display()
            ))),
            Error::MissingSplitMarker { path, .. } => Some(Box::new(format!(
                "A transform removed a split marker from '{}'. Markup \
                 transforms must leave script and style bodies intact.",
                path.display()
            ))),
            _ => None,
        }
    }
}
