//! Document bundling: inlines locally referenced scripts and stylesheets
//! into their documents and drops the inlined files from the output tree.
//!
//! The stage buffers the entire stream and does its work at flush, since a
//! document may arrive before the resources it references.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use kiln_config::BundleOverrides;

use crate::asset::{Asset, AssetKind};
use crate::document::{clean_local_ref, resolve_ref};
use crate::pipeline::Stage;
use crate::Result;

static SCRIPT_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b([^>]*)>\s*</script\s*>").unwrap());
static SRC_VALUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bsrc\s*=\s*["']([^"']+)["']"#).unwrap());
static LINK_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<link\b[^>]*>").unwrap());
static REL_ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\brel\s*=\s*["']?([^"'\s>]+)"#).unwrap());
static HREF_ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bhref\s*=\s*["']([^"']+)["']"#).unwrap());
static CSS_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"url\(\s*['"]?([^'")]+?)['"]?\s*\)"#).unwrap());

/// Merges documents' resources by inlining referenced files.
pub struct BundleStage {
    options: BundleOverrides,
    buffer: Vec<Asset>,
}

impl BundleStage {
    pub fn new(options: BundleOverrides) -> Self {
        Self {
            options,
            buffer: Vec::new(),
        }
    }
}

impl Stage for BundleStage {
    fn name(&self) -> &'static str {
        "bundle"
    }

    fn process(&mut self, asset: Asset, _out: &mut Vec<Asset>) -> Result<()> {
        self.buffer.push(asset);
        Ok(())
    }

    fn flush(&mut self, out: &mut Vec<Asset>) -> Result<()> {
        let assets = std::mem::take(&mut self.buffer);
        let by_path: FxHashMap<String, usize> = assets
            .iter()
            .enumerate()
            .map(|(i, a)| (a.path_str(), i))
            .collect();
        let mut consumed: FxHashSet<usize> = FxHashSet::default();
        let mut rewritten: FxHashMap<usize, String> = FxHashMap::default();

        for (doc_idx, doc) in assets.iter().enumerate() {
            if doc.kind() != AssetKind::Html || doc.contents.is_none() {
                continue;
            }
            let mut html = doc.contents_utf8().expect("checked above").into_owned();

            if self.options.inline_scripts {
                html = SCRIPT_TAG_RE
                    .replace_all(&html, |caps: &Captures<'_>| {
                        inline_script(caps, doc, &assets, &by_path, &mut consumed)
                    })
                    .into_owned();
            }
            if self.options.inline_css {
                let rewrite_urls = self.options.rewrite_urls_in_templates;
                html = LINK_TAG_RE
                    .replace_all(&html, |caps: &Captures<'_>| {
                        inline_stylesheet(caps, doc, &assets, &by_path, &mut consumed, rewrite_urls)
                    })
                    .into_owned();
            }
            rewritten.insert(doc_idx, html);
        }

        debug!(inlined = consumed.len(), "bundled document resources");
        for (idx, mut asset) in assets.into_iter().enumerate() {
            if consumed.contains(&idx) {
                continue;
            }
            if let Some(html) = rewritten.remove(&idx) {
                asset.set_text(html);
            }
            out.push(asset);
        }
        Ok(())
    }
}

fn inline_script(
    caps: &Captures<'_>,
    doc: &Asset,
    assets: &[Asset],
    by_path: &FxHashMap<String, usize>,
    consumed: &mut FxHashSet<usize>,
) -> String {
    let original = caps[0].to_string();
    let Some(src) = SRC_VALUE_RE.captures(&caps[1]) else {
        return original;
    };
    let Some(target) = lookup(doc, &src[1], assets, by_path, AssetKind::Script) else {
        return original;
    };
    consumed.insert(target);
    let body = assets[target]
        .contents_utf8()
        .map(|c| c.into_owned())
        .unwrap_or_default();
    format!("<script>{body}</script>")
}

fn inline_stylesheet(
    caps: &Captures<'_>,
    doc: &Asset,
    assets: &[Asset],
    by_path: &FxHashMap<String, usize>,
    consumed: &mut FxHashSet<usize>,
    rewrite_urls: bool,
) -> String {
    let original = caps[0].to_string();
    let tag = &caps[0];
    let rel = REL_ATTR_RE
        .captures(tag)
        .map(|c| c[1].to_ascii_lowercase())
        .unwrap_or_default();
    if rel != "stylesheet" && rel != "import" {
        return original;
    }
    let Some(href) = HREF_ATTR_RE.captures(tag) else {
        return original;
    };
    let reference = href[1].to_string();
    let Some(target) = lookup(doc, &reference, assets, by_path, AssetKind::Style) else {
        return original;
    };
    consumed.insert(target);
    let mut body = assets[target]
        .contents_utf8()
        .map(|c| c.into_owned())
        .unwrap_or_default();
    if rewrite_urls {
        if let Some((prefix, _)) = reference.rsplit_once('/') {
            body = rewrite_css_urls(&body, prefix);
        }
    }
    format!("<style>{body}</style>")
}

fn lookup(
    doc: &Asset,
    reference: &str,
    assets: &[Asset],
    by_path: &FxHashMap<String, usize>,
    want: AssetKind,
) -> Option<usize> {
    let cleaned = clean_local_ref(reference)?;
    let resolved = resolve_ref(&doc.path, &cleaned)?;
    let idx = *by_path.get(&resolved)?;
    (assets[idx].kind() == want && assets[idx].contents.is_some()).then_some(idx)
}

/// Prefix relative `url(...)` references with the stylesheet's directory,
/// keeping them valid from the document's location.
fn rewrite_css_urls(css: &str, prefix: &str) -> String {
    CSS_URL_RE
        .replace_all(css, |caps: &Captures<'_>| {
            let target = caps[1].trim();
            if target.starts_with('/')
                || target.starts_with("data:")
                || target.contains("://")
            {
                caps[0].to_string()
            } else {
                format!("url({prefix}/{target})")
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle(assets: Vec<Asset>, options: BundleOverrides) -> Vec<Asset> {
        let mut stage = BundleStage::new(options);
        for asset in assets {
            stage.process(asset, &mut Vec::new()).unwrap();
        }
        let mut out = Vec::new();
        stage.flush(&mut out).unwrap();
        out
    }

    #[test]
    fn inlines_local_scripts_and_styles_and_drops_them() {
        let out = bundle(
            vec![
                Asset::text(
                    "index.html",
                    "<head><link rel=\"stylesheet\" href=\"style.css\"></head>\
                     <body><script src=\"app.js\"></script></body>",
                ),
                Asset::text("app.js", "var a=1;"),
                Asset::text("style.css", "body{color:red}"),
            ],
            BundleOverrides::default(),
        );
        assert_eq!(out.len(), 1);
        let html = out[0].contents_utf8().unwrap().into_owned();
        assert!(html.contains("<script>var a=1;</script>"));
        assert!(html.contains("<style>body{color:red}</style>"));
    }

    #[test]
    fn remote_references_are_left_alone() {
        let out = bundle(
            vec![Asset::text(
                "index.html",
                "<script src=\"https://cdn.example.com/x.js\"></script>",
            )],
            BundleOverrides::default(),
        );
        let html = out[0].contents_utf8().unwrap().into_owned();
        assert!(html.contains("cdn.example.com"));
    }

    #[test]
    fn disabled_inlining_keeps_assets_separate() {
        let out = bundle(
            vec![
                Asset::text("index.html", "<script src=\"app.js\"></script>"),
                Asset::text("app.js", "var a=1;"),
            ],
            BundleOverrides {
                inline_scripts: false,
                ..Default::default()
            },
        );
        assert_eq!(out.len(), 2);
        assert!(out[0].contents_utf8().unwrap().contains("src=\"app.js\""));
    }

    #[test]
    fn inlined_css_urls_are_rewritten_against_the_document() {
        let out = bundle(
            vec![
                Asset::text(
                    "index.html",
                    "<link rel=\"stylesheet\" href=\"styles/app.css\">",
                ),
                Asset::text("styles/app.css", "div{background:url(bg.png)}"),
            ],
            BundleOverrides::default(),
        );
        let html = out[0].contents_utf8().unwrap().into_owned();
        assert!(html.contains("url(styles/bg.png)"), "got: {html}");
    }

    #[test]
    fn missing_target_keeps_the_reference() {
        let out = bundle(
            vec![Asset::text("index.html", "<script src=\"gone.js\"></script>")],
            BundleOverrides::default(),
        );
        assert!(out[0].contents_utf8().unwrap().contains("src=\"gone.js\""));
    }
}
