//! Build-variant configuration.
//!
//! One [`BuildVariant`] describes one requested output tree: which optimize
//! passes run, whether documents are bundled, and which document-level
//! extras (base tag, prefetch links, push manifest, service worker) are
//! produced. Field shapes follow the project config file one-to-one, so the
//! whole struct derives `Deserialize` with per-field defaults.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for one named build output.
///
/// Every optimize flag defaults to off; a variant with no flags set copies
/// the project through unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildVariant {
    /// Unique key into the build-stream mapping. An empty name selects the
    /// default variant, which writes directly into the build root.
    #[serde(default)]
    pub name: String,

    /// Script optimize flags.
    #[serde(default)]
    pub js: ScriptOptions,

    /// Style optimize flags.
    #[serde(default)]
    pub css: StyleOptions,

    /// Markup optimize flags.
    #[serde(default)]
    pub html: MarkupOptions,

    /// Bundling: off, on with defaults, or a table of overrides.
    #[serde(default)]
    pub bundle: BundleOption,

    /// Base-path rewrite: off, `true` (use the variant name), or an
    /// explicit path segment.
    #[serde(default)]
    pub base_path: BasePathOption,

    /// Insert `<link rel="prefetch">` entries for referenced resources.
    #[serde(default)]
    pub insert_prefetch_links: bool,

    /// Generate `push-manifest.json` from document references.
    #[serde(default)]
    pub add_push_manifest: bool,

    /// Generate `service-worker.js` once the output tree is written.
    #[serde(default)]
    pub add_service_worker: bool,

    /// Override path to the service-worker precache config, resolved
    /// relative to the project root. Defaults to `sw-precache.toml`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sw_precache_config: Option<PathBuf>,
}

impl BuildVariant {
    /// The directory name this variant writes into. The default (unnamed)
    /// variant writes into the build root itself.
    pub fn dir_name(&self) -> &str {
        if self.name.is_empty() { "" } else { &self.name }
    }

    /// Display name used in logs and the build-stream mapping.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            "default"
        } else {
            &self.name
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ScriptOptions {
    /// Downlevel scripts for legacy browsers.
    #[serde(default)]
    pub compile: bool,

    /// Minify scripts. Runs after compilation so it observes final code.
    #[serde(default)]
    pub minify: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StyleOptions {
    #[serde(default)]
    pub minify: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MarkupOptions {
    #[serde(default)]
    pub minify: bool,
}

/// `bundle = true` or a table of overrides merged over the defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BundleOption {
    #[default]
    Off,
    Enabled(bool),
    Overrides(BundleOverrides),
}

impl BundleOption {
    pub fn is_enabled(&self) -> bool {
        match self {
            BundleOption::Off => false,
            BundleOption::Enabled(on) => *on,
            BundleOption::Overrides(_) => true,
        }
    }

    /// Resolve to concrete overrides, merging a table over the defaults.
    pub fn overrides(&self) -> Option<BundleOverrides> {
        match self {
            BundleOption::Off | BundleOption::Enabled(false) => None,
            BundleOption::Enabled(true) => Some(BundleOverrides::default()),
            BundleOption::Overrides(o) => Some(o.clone()),
        }
    }
}

/// Bundler knobs a variant may override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleOverrides {
    /// Inline locally referenced scripts into their documents.
    #[serde(default = "default_true")]
    pub inline_scripts: bool,

    /// Inline locally referenced stylesheets into their documents.
    #[serde(default = "default_true")]
    pub inline_css: bool,

    /// Rewrite relative `url(...)` references when inlining styles from a
    /// different directory than the document.
    #[serde(default = "default_true")]
    pub rewrite_urls_in_templates: bool,
}

impl Default for BundleOverrides {
    fn default() -> Self {
        Self {
            inline_scripts: true,
            inline_css: true,
            rewrite_urls_in_templates: true,
        }
    }
}

/// `base_path = true` uses the variant name as the path segment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BasePathOption {
    #[default]
    Off,
    Enabled(bool),
    Path(String),
}

impl BasePathOption {
    /// Resolve to the normalized base path for this variant, always with a
    /// leading and trailing slash.
    pub fn resolve(&self, variant_name: &str) -> Option<String> {
        let raw = match self {
            BasePathOption::Off | BasePathOption::Enabled(false) => return None,
            BasePathOption::Enabled(true) => variant_name,
            BasePathOption::Path(p) => p.as_str(),
        };
        let mut path = raw.trim_matches('/').to_string();
        path.insert(0, '/');
        path.push('/');
        Some(path)
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundle_option_bool_and_table() {
        let v: BuildVariant = toml::from_str("bundle = true").unwrap();
        assert!(v.bundle.is_enabled());
        assert!(v.bundle.overrides().unwrap().inline_scripts);

        let v: BuildVariant = toml::from_str("bundle = { inline_css = false }").unwrap();
        let overrides = v.bundle.overrides().unwrap();
        assert!(!overrides.inline_css);
        assert!(overrides.inline_scripts);
        assert!(overrides.rewrite_urls_in_templates);

        let v: BuildVariant = toml::from_str("").unwrap();
        assert!(!v.bundle.is_enabled());
    }

    #[test]
    fn base_path_normalization() {
        let v: BuildVariant = toml::from_str(r#"base_path = "es5""#).unwrap();
        assert_eq!(v.base_path.resolve("prod").unwrap(), "/es5/");

        let v: BuildVariant = toml::from_str(r#"base_path = "/already/slashed/""#).unwrap();
        assert_eq!(v.base_path.resolve("prod").unwrap(), "/already/slashed/");

        let v: BuildVariant = toml::from_str("base_path = true").unwrap();
        assert_eq!(v.base_path.resolve("prod").unwrap(), "/prod/");

        let v: BuildVariant = toml::from_str("base_path = false").unwrap();
        assert!(v.base_path.resolve("prod").is_none());
    }

    #[test]
    fn variant_defaults_are_all_off() {
        let v: BuildVariant = toml::from_str(r#"name = "dev""#).unwrap();
        assert!(!v.js.compile);
        assert!(!v.js.minify);
        assert!(!v.css.minify);
        assert!(!v.html.minify);
        assert!(!v.bundle.is_enabled());
        assert!(!v.add_service_worker);
        assert_eq!(v.display_name(), "dev");
    }

    #[test]
    fn unnamed_variant_uses_build_root() {
        let v = BuildVariant::default();
        assert_eq!(v.dir_name(), "");
        assert_eq!(v.display_name(), "default");
    }
}
