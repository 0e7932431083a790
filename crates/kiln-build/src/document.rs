//! Document-level post stages: shim injection, prefetch links, and base-tag
//! rewriting, plus the reference scanning shared with bundling and the push
//! manifest.
//!
//! These run after rejoin, so every asset they see is a whole document
//! again.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::asset::{Asset, AssetKind};
use crate::pipeline::Stage;
use crate::Result;

static HEAD_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<head[^>]*>").unwrap());
static HEAD_CLOSE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</head\s*>").unwrap());
static BASE_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<base\b[^>]*>").unwrap());
static SCRIPT_SRC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<script\b[^>]*\bsrc\s*=\s*["']([^"']+)["']"#).unwrap());
static LINK_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<link\b[^>]*>").unwrap());
static REL_ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\brel\s*=\s*["']?([^"'\s>]+)"#).unwrap());
static HREF_ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bhref\s*=\s*["']([^"']+)["']"#).unwrap());
static SCHEME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[a-z][a-z0-9+.-]*:").unwrap());

/// Minimal helper shims referenced by downleveled class/spread output.
const RUNTIME_HELPERS: &str = "(function(){window.__kilnHelpers=window.__kilnHelpers||\
{assign:Object.assign||function(t){for(var i=1;i<arguments.length;i++){var s=arguments[i];\
for(var k in s)Object.prototype.hasOwnProperty.call(s,k)&&(t[k]=s[k])}return t}};})();";

/// The standard ES5 constructor adapter for the custom-elements polyfill:
/// downleveled ES5 classes cannot extend native HTMLElement without it.
const CUSTOM_ELEMENTS_ES5_ADAPTER: &str = "(function(){if(void 0===window.customElements)return;\
var a=window.HTMLElement;window.HTMLElement=function(){return Reflect.construct(a,[],\
this.constructor)};HTMLElement.prototype=a.prototype;HTMLElement.prototype.constructor=\
HTMLElement;Object.setPrototypeOf(HTMLElement,a)})();";

/// What a document reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RefKind {
    Script,
    Style,
}

impl RefKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            RefKind::Script => "script",
            RefKind::Style => "style",
        }
    }
}

/// Scan a document for locally referenced scripts and stylesheets, in
/// document order, as written (unresolved).
pub(crate) fn local_refs(html: &str) -> Vec<(String, RefKind)> {
    let mut refs = Vec::new();
    for caps in SCRIPT_SRC_RE.captures_iter(html) {
        if let Some(cleaned) = clean_local_ref(&caps[1]) {
            refs.push((cleaned, RefKind::Script));
        }
    }
    for tag in LINK_TAG_RE.find_iter(html) {
        let tag = tag.as_str();
        let rel = REL_ATTR_RE
            .captures(tag)
            .map(|c| c[1].to_ascii_lowercase())
            .unwrap_or_default();
        if rel != "stylesheet" && rel != "import" {
            continue;
        }
        if let Some(href) = HREF_ATTR_RE.captures(tag) {
            if let Some(cleaned) = clean_local_ref(&href[1]) {
                refs.push((cleaned, RefKind::Style));
            }
        }
    }
    refs
}

/// Strip query/fragment and reject remote or scheme-qualified references.
pub(crate) fn clean_local_ref(reference: &str) -> Option<String> {
    let cleaned = reference
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim();
    if cleaned.is_empty() || cleaned.starts_with("//") || SCHEME_RE.is_match(cleaned) {
        return None;
    }
    Some(cleaned.to_string())
}

/// Resolve a document-relative reference to a normalized root-relative
/// path. Returns `None` for references escaping the tree.
pub(crate) fn resolve_ref(doc: &Path, reference: &str) -> Option<String> {
    let mut segments: Vec<&str> = if reference.starts_with('/') {
        Vec::new()
    } else {
        doc.parent()
            .map(|p| {
                p.components()
                    .filter_map(|c| c.as_os_str().to_str())
                    .collect()
            })
            .unwrap_or_default()
    };
    for segment in reference.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }
    if segments.is_empty() {
        return None;
    }
    Some(segments.join("/"))
}

fn insert_in_head(html: &str, snippet: &str) -> String {
    if let Some(m) = HEAD_OPEN_RE.find(html) {
        let mut result = String::with_capacity(html.len() + snippet.len());
        result.push_str(&html[..m.end()]);
        result.push_str(snippet);
        result.push_str(&html[m.end()..]);
        result
    } else {
        format!("{snippet}{html}")
    }
}

fn insert_before_head_close(html: &str, snippet: &str) -> String {
    if let Some(m) = HEAD_CLOSE_RE.find(html) {
        let mut result = String::with_capacity(html.len() + snippet.len());
        result.push_str(&html[..m.start()]);
        result.push_str(snippet);
        result.push_str(&html[m.start()..]);
        result
    } else {
        format!("{html}{snippet}")
    }
}

/// Injects one inline script into the entrypoint document.
pub struct InjectScriptStage {
    name: &'static str,
    target: PathBuf,
    snippet: &'static str,
}

impl InjectScriptStage {
    /// Shared runtime helpers, injected when script compilation ran.
    pub fn runtime_helpers(entrypoint: &Path) -> Self {
        Self {
            name: "inject-runtime-helpers",
            target: entrypoint.to_path_buf(),
            snippet: RUNTIME_HELPERS,
        }
    }

    /// Adapter for the custom-elements polyfill, injected when script
    /// compilation ran.
    pub fn custom_elements_adapter(entrypoint: &Path) -> Self {
        Self {
            name: "inject-custom-elements-adapter",
            target: entrypoint.to_path_buf(),
            snippet: CUSTOM_ELEMENTS_ES5_ADAPTER,
        }
    }
}

impl Stage for InjectScriptStage {
    fn name(&self) -> &'static str {
        self.name
    }

    fn process(&mut self, mut asset: Asset, out: &mut Vec<Asset>) -> Result<()> {
        if asset.path == self.target && asset.contents.is_some() {
            let html = asset.contents_utf8().expect("checked above").into_owned();
            asset.set_text(insert_in_head(&html, &format!("<script>{}</script>", self.snippet)));
        }
        out.push(asset);
        Ok(())
    }
}

static PREFETCH_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<link\b[^>]*\brel\s*=\s*["']?prefetch["']?[^>]*>"#).unwrap());

/// Inserts `<link rel="prefetch">` entries for every locally referenced
/// script and stylesheet not already prefetched.
pub struct PrefetchLinksStage;

impl Stage for PrefetchLinksStage {
    fn name(&self) -> &'static str {
        "prefetch-links"
    }

    fn process(&mut self, mut asset: Asset, out: &mut Vec<Asset>) -> Result<()> {
        if asset.kind() != AssetKind::Html || asset.is_fragment() || asset.contents.is_none() {
            out.push(asset);
            return Ok(());
        }
        let html = asset.contents_utf8().expect("checked above").into_owned();

        let existing: Vec<String> = PREFETCH_LINK_RE
            .find_iter(&html)
            .filter_map(|m| HREF_ATTR_RE.captures(m.as_str()).map(|c| c[1].to_string()))
            .collect();

        let mut links = String::new();
        for (reference, _) in local_refs(&html) {
            let Some(resolved) = resolve_ref(&asset.path, &reference) else {
                continue;
            };
            let href = format!("/{resolved}");
            if existing.iter().any(|e| e == &href || e == &resolved) {
                continue;
            }
            links.push_str(&format!("<link rel=\"prefetch\" href=\"{href}\">"));
        }
        if !links.is_empty() {
            asset.set_text(insert_before_head_close(&html, &links));
        }
        out.push(asset);
        Ok(())
    }
}

/// Rewrites an existing `<base>` tag in any document and inserts one into
/// the entrypoint; the base path always begins and ends with a slash.
pub struct BaseTagStage {
    base: String,
    entrypoint: PathBuf,
}

impl BaseTagStage {
    pub fn new(base: String, entrypoint: &Path) -> Self {
        Self {
            base,
            entrypoint: entrypoint.to_path_buf(),
        }
    }
}

impl Stage for BaseTagStage {
    fn name(&self) -> &'static str {
        "update-base-tag"
    }

    fn process(&mut self, mut asset: Asset, out: &mut Vec<Asset>) -> Result<()> {
        if asset.kind() != AssetKind::Html || asset.is_fragment() || asset.contents.is_none() {
            out.push(asset);
            return Ok(());
        }
        let html = asset.contents_utf8().expect("checked above").into_owned();
        let tag = format!("<base href=\"{}\">", self.base);

        if BASE_TAG_RE.is_match(&html) {
            asset.set_text(BASE_TAG_RE.replace(&html, tag.as_str()).into_owned());
        } else if asset.path == self.entrypoint {
            asset.set_text(insert_in_head(&html, &tag));
        }
        out.push(asset);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_and_absolute_references() {
        let doc = Path::new("pages/about.html");
        assert_eq!(resolve_ref(doc, "app.js").unwrap(), "pages/app.js");
        assert_eq!(resolve_ref(doc, "../app.js").unwrap(), "app.js");
        assert_eq!(resolve_ref(doc, "/lib/x.css").unwrap(), "lib/x.css");
        assert_eq!(resolve_ref(doc, "./a/./b.js").unwrap(), "pages/a/b.js");
        assert!(resolve_ref(Path::new("index.html"), "../../escape.js").is_none());
    }

    #[test]
    fn ref_scan_finds_scripts_and_stylesheets_only_locally() {
        let html = r#"<script src="app.js?v=2"></script>
            <script src="https://cdn.example.com/x.js"></script>
            <link rel="stylesheet" href="style.css">
            <link rel="icon" href="favicon.ico">
            <link href="more.css" rel="import">"#;
        let refs = local_refs(html);
        assert_eq!(
            refs,
            vec![
                ("app.js".to_string(), RefKind::Script),
                ("style.css".to_string(), RefKind::Style),
                ("more.css".to_string(), RefKind::Style),
            ]
        );
    }

    #[test]
    fn inject_targets_only_the_entrypoint() {
        let mut stage = InjectScriptStage::runtime_helpers(Path::new("index.html"));
        let mut out = Vec::new();
        stage
            .process(Asset::text("index.html", "<head></head>"), &mut out)
            .unwrap();
        stage
            .process(Asset::text("other.html", "<head></head>"), &mut out)
            .unwrap();
        assert!(out[0].contents_utf8().unwrap().contains("__kilnHelpers"));
        assert_eq!(out[1].contents_utf8().unwrap(), "<head></head>");
    }

    #[test]
    fn prefetch_links_inserted_once() {
        let mut stage = PrefetchLinksStage;
        let html = "<head><link rel=\"prefetch\" href=\"/app.js\">\
                    <script src=\"app.js\"></script>\
                    <link rel=\"stylesheet\" href=\"style.css\"></head>";
        let mut out = Vec::new();
        stage.process(Asset::text("index.html", html), &mut out).unwrap();
        let text = out[0].contents_utf8().unwrap().into_owned();
        assert!(text.contains("<link rel=\"prefetch\" href=\"/style.css\">"));
        assert_eq!(text.matches("href=\"/app.js\"").count(), 1);
    }

    #[test]
    fn base_tag_replaced_or_inserted() {
        let mut stage = BaseTagStage::new("/prod/".to_string(), Path::new("index.html"));
        let mut out = Vec::new();
        stage
            .process(
                Asset::text("page.html", "<head><base href=\"/old/\"></head>"),
                &mut out,
            )
            .unwrap();
        stage
            .process(Asset::text("index.html", "<head></head>"), &mut out)
            .unwrap();
        stage
            .process(Asset::text("bare.html", "<head></head>"), &mut out)
            .unwrap();
        assert!(out[0].contents_utf8().unwrap().contains("<base href=\"/prod/\">"));
        assert!(out[1].contents_utf8().unwrap().contains("<base href=\"/prod/\">"));
        assert!(!out[2].contents_utf8().unwrap().contains("<base"));
    }
}
