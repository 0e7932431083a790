//! HTTP/2 push manifest generation.
//!
//! Records every document's local script/style references as the stream
//! passes and emits `push-manifest.json` at flush.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::asset::{Asset, AssetKind};
use crate::document::{local_refs, resolve_ref};
use crate::pipeline::Stage;
use crate::Result;

pub const PUSH_MANIFEST_PATH: &str = "push-manifest.json";

#[derive(Debug, Serialize)]
struct PushEntry {
    #[serde(rename = "type")]
    kind: &'static str,
    weight: u32,
}

/// Collects per-document resource references into `push-manifest.json`.
pub struct PushManifestStage {
    entries: BTreeMap<String, BTreeMap<String, PushEntry>>,
}

impl PushManifestStage {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl Stage for PushManifestStage {
    fn name(&self) -> &'static str {
        "push-manifest"
    }

    fn process(&mut self, asset: Asset, out: &mut Vec<Asset>) -> Result<()> {
        if asset.kind() == AssetKind::Html && !asset.is_fragment() {
            if let Some(html) = asset.contents_utf8() {
                let mut resources = BTreeMap::new();
                for (reference, kind) in local_refs(&html) {
                    if let Some(resolved) = resolve_ref(&asset.path, &reference) {
                        resources.insert(
                            resolved,
                            PushEntry {
                                kind: kind.as_str(),
                                weight: 1,
                            },
                        );
                    }
                }
                self.entries.insert(asset.path_str(), resources);
            }
        }
        out.push(asset);
        Ok(())
    }

    fn flush(&mut self, out: &mut Vec<Asset>) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.entries)
            .expect("string-keyed maps serialize without error");
        out.push(Asset::text(PUSH_MANIFEST_PATH, json));
        Ok(())
    }
}
