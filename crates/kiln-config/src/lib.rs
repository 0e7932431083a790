//! # kiln-config
//!
//! Project and build-variant configuration for kiln.
//!
//! A kiln project is described by a `kiln.toml` file (or a `"kiln"` field in
//! `package.json`) listing the project layout and one build variant per
//! requested output tree:
//!
//! ```toml
//! entrypoint = "index.html"
//! sources = ["src"]
//! dependencies = ["vendor"]
//!
//! [[builds]]
//! name = "prod"
//! bundle = true
//! add_service_worker = true
//! js = { compile = true, minify = true }
//! html = { minify = true }
//! ```
//!
//! Library users can build a [`ProjectConfig`] programmatically or parse one
//! from a `serde_json::Value`; the CLI goes through [`ConfigDiscovery`].

pub mod discovery;
pub mod error;
pub mod project;
pub mod validation;
pub mod variant;

pub use discovery::ConfigDiscovery;
pub use error::{ConfigError, Result};
pub use project::ProjectConfig;
pub use validation::validate;
pub use variant::{
    BasePathOption, BuildVariant, BundleOption, BundleOverrides, MarkupOptions, ScriptOptions,
    StyleOptions,
};
