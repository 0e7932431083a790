//! Deterministic stage assembly for one build variant.
//!
//! Ordering matters and later stages assume earlier invariants: compilation
//! precedes every minifier, minifiers run while documents are still split
//! so fragments are reachable, rejoin precedes every document-level stage,
//! and the base-path rewrite runs after bundling so inlined references are
//! already gone. Disabled stages are skipped entirely rather than inserted
//! as no-ops.

use std::path::Path;

use kiln_config::BuildVariant;

use crate::bundle::BundleStage;
use crate::document::{BaseTagStage, InjectScriptStage, PrefetchLinksStage};
use crate::pipeline::Stage;
use crate::push_manifest::PushManifestStage;
use crate::split::HtmlSplitter;
use crate::transform::{
    TransformStage, compile_scripts, minify_markup, minify_scripts, minify_styles,
};

/// Build the ordered stage list for one variant.
pub fn assemble_stages(variant: &BuildVariant, entrypoint: &Path) -> Vec<Box<dyn Stage>> {
    let splitter = HtmlSplitter::new();
    let mut stages: Vec<Box<dyn Stage>> = vec![Box::new(splitter.split_stage())];

    if variant.js.compile {
        stages.push(Box::new(TransformStage::new(compile_scripts())));
    }
    if variant.html.minify {
        stages.push(Box::new(TransformStage::new(minify_markup())));
    }
    if variant.css.minify {
        stages.push(Box::new(TransformStage::new(minify_styles())));
    }
    if variant.js.minify {
        stages.push(Box::new(TransformStage::new(minify_scripts())));
    }

    stages.push(Box::new(splitter.rejoin_stage()));

    if variant.js.compile {
        stages.push(Box::new(InjectScriptStage::runtime_helpers(entrypoint)));
        stages.push(Box::new(InjectScriptStage::custom_elements_adapter(entrypoint)));
    }
    if let Some(overrides) = variant.bundle.overrides() {
        stages.push(Box::new(BundleStage::new(overrides)));
    }
    if variant.insert_prefetch_links {
        stages.push(Box::new(PrefetchLinksStage));
    }
    if let Some(base) = variant.base_path.resolve(variant.display_name()) {
        stages.push(Box::new(BaseTagStage::new(base, entrypoint)));
    }
    if variant.add_push_manifest {
        stages.push(Box::new(PushManifestStage::new()));
    }

    stages
}
