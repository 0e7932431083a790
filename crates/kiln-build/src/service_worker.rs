//! Service-worker generation: the derived artifact produced after a
//! variant's primary stream has drained and its output tree is on disk.
//!
//! The precache configuration load is started concurrently with pipeline
//! execution, so the file read overlaps the I/O latency with build time. A missing config file is not an error; a present but
//! unparsable one logs a warning and proceeds as if absent. The build is
//! never aborted for a malformed side-config.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::asset::path_to_slash;
use crate::{Error, Result};

pub const SERVICE_WORKER_PATH: &str = "service-worker.js";
pub const DEFAULT_PRECACHE_CONFIG: &str = "sw-precache.toml";

/// Optional precache configuration, read from `sw-precache.toml` at the
/// project root (overridable per variant).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrecacheConfig {
    /// Cache-name prefix; defaults to "kiln".
    #[serde(default)]
    pub cache_id: Option<String>,

    /// Document served for navigation requests that miss the cache.
    #[serde(default)]
    pub navigate_fallback: Option<String>,

    /// Path substrings excluded from the precache list.
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
}

/// Load the precache configuration, if any.
///
/// Absence is the common case and not worth a log line; a file that exists
/// but fails to parse is warned about and treated as absent.
pub async fn load_precache_config(path: PathBuf) -> Option<PrecacheConfig> {
    let text = match tokio::fs::read_to_string(&path).await {
        Ok(text) => text,
        Err(_) => return None,
    };
    match toml::from_str(&text) {
        Ok(config) => Some(config),
        Err(error) => {
            warn!(
                path = %path.display(),
                %error,
                "precache config was found but could not be loaded, continuing with defaults"
            );
            None
        }
    }
}

/// Generate the service-worker source from a written output tree.
///
/// Must run strictly after the variant's stream has drained and flushed:
/// the precache list reflects the complete, final output directory.
/// `bundled` builds precache everything they serve, so the worker answers
/// cache-first only; unbundled builds add runtime caching of same-origin
/// fetches for the files a page pulls in lazily.
pub fn generate_service_worker(
    build_root: &Path,
    config: Option<&PrecacheConfig>,
    bundled: bool,
) -> Result<String> {
    let default_config = PrecacheConfig::default();
    let config = config.unwrap_or(&default_config);

    let mut entries: Vec<(String, String)> = Vec::new();
    for entry in WalkDir::new(build_root).follow_links(false) {
        let entry = entry.map_err(|e| Error::ServiceWorker(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(build_root)
            .expect("walkdir yields children of its root");
        let rel = path_to_slash(rel);
        if rel == SERVICE_WORKER_PATH {
            continue;
        }
        if config.ignore_patterns.iter().any(|p| rel.contains(p.as_str())) {
            continue;
        }
        let contents = std::fs::read(entry.path()).map_err(Error::Io)?;
        let revision = blake3::hash(&contents).to_hex().to_string();
        entries.push((format!("/{rel}"), revision[..12].to_string()));
    }
    entries.sort();
    debug!(count = entries.len(), "precaching output files");

    let cache_id = config.cache_id.as_deref().unwrap_or("kiln");
    let mut digest = blake3::Hasher::new();
    for (url, revision) in &entries {
        digest.update(url.as_bytes());
        digest.update(revision.as_bytes());
    }
    let cache_name = format!("{cache_id}-{}", &digest.finalize().to_hex()[..12]);

    let precache_json = serde_json::to_string(
        &entries
            .iter()
            .map(|(url, _)| url.as_str())
            .collect::<Vec<_>>(),
    )
    .expect("string list serializes without error");

    let navigate_fallback = match &config.navigate_fallback {
        Some(fallback) => format!(
            "if(e.request.mode==='navigate'){{return caches.match('{fallback}').then(function(r){{return r||fetch(e.request)}})}}",
        ),
        None => String::new(),
    };
    let runtime_caching = if bundled {
        "return fetch(e.request);"
    } else {
        "return fetch(e.request).then(function(response){\
         if(response.ok&&e.request.url.indexOf(self.location.origin)===0){\
         var copy=response.clone();\
         caches.open(CACHE_NAME).then(function(cache){cache.put(e.request,copy)})}\
         return response});"
    };

    Ok(format!(
        "'use strict';\n\
         var CACHE_NAME='{cache_name}';\n\
         var PRECACHE={precache_json};\n\
         self.addEventListener('install',function(e){{\
         e.waitUntil(caches.open(CACHE_NAME)\
         .then(function(cache){{return cache.addAll(PRECACHE)}})\
         .then(function(){{return self.skipWaiting()}}))}});\n\
         self.addEventListener('activate',function(e){{\
         e.waitUntil(caches.keys().then(function(keys){{\
         return Promise.all(keys.filter(function(k){{return k!==CACHE_NAME}})\
         .map(function(k){{return caches.delete(k)}}))}})\
         .then(function(){{return self.clients.claim()}}))}});\n\
         self.addEventListener('fetch',function(e){{\
         e.respondWith(caches.match(e.request).then(function(cached){{\
         if(cached){{return cached}}\
         {navigate_fallback}\
         {runtime_caching}}}))}});\n"
    ))
}
