//! Content transformers and the fault-isolating stage that runs them.
//!
//! A [`Transform`] is a strategy value: a name for diagnostics, a
//! type-filter over assets, and a content function with its options already
//! bound. The stock constructors wire up the external collaborators (oxc
//! for script downleveling and minification, lightningcss for style
//! minification) plus a small regex-based markup minifier.
//!
//! [`TransformStage`] applies one transform to every matching asset. A
//! transformer raising an error on one record is recovered locally: the
//! failure is logged with the transformer name and the affected path, and
//! the original content passes through unmodified. One bad file never
//! aborts the build.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::anyhow;
use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_minifier::{Minifier, MinifierOptions};
use oxc_parser::Parser;
use oxc_semantic::SemanticBuilder;
use oxc_span::SourceType;
use oxc_transformer::{TransformOptions, Transformer};
use regex::Regex;
use tracing::warn;

use crate::asset::{Asset, AssetKind};
use crate::pipeline::Stage;
use crate::Result;

/// Files under the custom-elements polyfill tree carry an ES6 shim that
/// must never be downleveled or otherwise rewritten.
const RUNTIME_SHIM_DIR: &str = "webcomponentsjs";

type ApplyFn = Box<dyn Fn(&str) -> anyhow::Result<String> + Send>;
type MatchFn = Box<dyn Fn(&Asset) -> bool + Send>;

/// A named content transformer bound to a type filter.
pub struct Transform {
    name: &'static str,
    applies: MatchFn,
    apply: ApplyFn,
}

impl Transform {
    pub fn new(
        name: &'static str,
        applies: impl Fn(&Asset) -> bool + Send + 'static,
        apply: impl Fn(&str) -> anyhow::Result<String> + Send + 'static,
    ) -> Self {
        Self {
            name,
            applies: Box::new(applies),
            apply: Box::new(apply),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Applies one transform to every matching asset, isolating per-record
/// failures from the stream.
pub struct TransformStage {
    transform: Transform,
}

impl TransformStage {
    pub fn new(transform: Transform) -> Self {
        Self { transform }
    }
}

impl Stage for TransformStage {
    fn name(&self) -> &'static str {
        self.transform.name
    }

    fn process(&mut self, mut asset: Asset, out: &mut Vec<Asset>) -> Result<()> {
        let skip = asset.contents.is_none()
            || is_runtime_shim(&asset.path)
            || !(self.transform.applies)(&asset);
        if skip {
            out.push(asset);
            return Ok(());
        }

        let text = asset
            .contents_utf8()
            .expect("contents checked above")
            .into_owned();
        match (self.transform.apply)(&text) {
            Ok(optimized) => asset.set_text(optimized),
            Err(error) => warn!(
                transformer = self.transform.name,
                path = %asset.path.display(),
                %error,
                "unable to optimize, passing original through"
            ),
        }
        out.push(asset);
        Ok(())
    }
}

fn is_runtime_shim(path: &Path) -> bool {
    path.components()
        .any(|c| c.as_os_str() == RUNTIME_SHIM_DIR)
}

fn is_script(asset: &Asset) -> bool {
    asset.kind() == AssetKind::Script
}

fn is_style(asset: &Asset) -> bool {
    asset.kind() == AssetKind::Style
}

fn is_markup(asset: &Asset) -> bool {
    asset.kind() == AssetKind::Html
}

/// Downlevel scripts to ES2015 via oxc. Applies to standalone scripts and
/// script fragments alike.
pub fn compile_scripts() -> Transform {
    Transform::new(".js-compile", is_script, |source| {
        let allocator = Allocator::default();
        let mut program = parse_script(&allocator, source)?;
        let options = TransformOptions::from_target("es2015")
            .map_err(|errors| anyhow!("invalid transform target: {errors:?}"))?;
        let scoping = SemanticBuilder::new()
            .build(&program)
            .semantic
            .into_scoping();
        let transformed = Transformer::new(&allocator, Path::new(""), &options)
            .build_with_scoping(scoping, &mut program);
        if !transformed.errors.is_empty() {
            return Err(anyhow!("transform failed: {:?}", transformed.errors[0]));
        }
        Ok(Codegen::new().build(&program).code)
    })
}

/// Minify scripts via oxc. Ordered after compilation so it observes final
/// script content.
pub fn minify_scripts() -> Transform {
    Transform::new(".js-minify", is_script, |source| {
        let allocator = Allocator::default();
        let mut program = parse_script(&allocator, source)?;
        let minified = Minifier::new(MinifierOptions::default()).minify(&allocator, &mut program);
        let code = Codegen::new()
            .with_options(CodegenOptions {
                minify: true,
                ..Default::default()
            })
            .with_scoping(minified.scoping)
            .build(&program)
            .code;
        Ok(code)
    })
}

fn parse_script<'a>(
    allocator: &'a Allocator,
    source: &'a str,
) -> anyhow::Result<oxc_ast::ast::Program<'a>> {
    let ret = Parser::new(allocator, source, SourceType::cjs()).parse();
    if let Some(error) = ret.errors.first() {
        return Err(anyhow!("parse failed: {error:?}"));
    }
    Ok(ret.program)
}

/// Minify styles via lightningcss. One predicate covers standalone style
/// assets and inline style fragments, since fragments carry `.css` paths.
pub fn minify_styles() -> Transform {
    use lightningcss::printer::PrinterOptions;
    use lightningcss::stylesheet::{MinifyOptions, ParserOptions, StyleSheet};

    Transform::new("css-minify", is_style, |source| {
        let mut stylesheet = StyleSheet::parse(source, ParserOptions::default())
            .map_err(|e| anyhow!("failed to parse css: {e}"))?;
        stylesheet
            .minify(MinifyOptions::default())
            .map_err(|e| anyhow!("failed to minify css: {e}"))?;
        let result = stylesheet
            .to_css(PrinterOptions {
                minify: true,
                ..Default::default()
            })
            .map_err(|e| anyhow!("failed to print css: {e}"))?;
        Ok(result.code)
    })
}

static HTML_COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static INTER_TAG_WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r">\s+<").unwrap());

/// Collapse whitespace and strip comments from markup. Runs on document
/// shells, whose inline regions have already been split out.
pub fn minify_markup() -> Transform {
    Transform::new("html-minify", is_markup, |source| {
        let stripped = HTML_COMMENT_RE.replace_all(source, "");
        let collapsed = INTER_TAG_WS_RE.replace_all(&stripped, "><");
        Ok(collapsed.trim().to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(transform: Transform, asset: Asset) -> Asset {
        let mut out = Vec::new();
        TransformStage::new(transform)
            .process(asset, &mut out)
            .unwrap();
        assert_eq!(out.len(), 1);
        out.pop().unwrap()
    }

    #[test]
    fn failure_passes_original_through() {
        let failing = Transform::new("boom", is_script, |_| Err(anyhow!("bad input")));
        let out = run(failing, Asset::text("app.js", "var a = 1;"));
        assert_eq!(out.contents_utf8().unwrap(), "var a = 1;");
    }

    #[test]
    fn non_matching_assets_bypass_the_transformer() {
        let exploding = Transform::new("boom", is_script, |_| panic!("must not run"));
        let out = run(exploding, Asset::text("style.css", "a{}"));
        assert_eq!(out.contents_utf8().unwrap(), "a{}");
    }

    #[test]
    fn directory_markers_pass_untouched() {
        let exploding = Transform::new("boom", |_: &Asset| true, |_| panic!("must not run"));
        let out = run(exploding, Asset::directory("src"));
        assert!(out.contents.is_none());
    }

    #[test]
    fn runtime_shim_files_are_never_transformed() {
        let exploding = Transform::new("boom", is_script, |_| panic!("must not run"));
        let out = run(
            exploding,
            Asset::text("vendor/webcomponentsjs/custom-elements.js", "class A {}"),
        );
        assert_eq!(out.contents_utf8().unwrap(), "class A {}");
    }

    #[test]
    fn markup_minify_strips_comments_and_inter_tag_whitespace() {
        let out = run(
            minify_markup(),
            Asset::text(
                "index.html",
                "<html>\n  <!-- banner -->\n  <body>\n    <p>hi</p>\n  </body>\n</html>",
            ),
        );
        let text = out.contents_utf8().unwrap().into_owned();
        assert!(!text.contains("banner"));
        assert!(text.contains("<html><body><p>hi</p></body></html>"));
    }

    #[test]
    fn style_minify_collapses_whitespace() {
        let out = run(
            minify_styles(),
            Asset::text("app.css", "body {\n  color: #ff0000;\n}\n"),
        );
        let text = out.contents_utf8().unwrap().into_owned();
        assert!(text.len() < "body {\n  color: #ff0000;\n}\n".len());
        assert!(text.contains("body"));
    }

    #[test]
    fn markup_minifier_preserves_split_markers() {
        let out = run(
            minify_markup(),
            Asset::text(
                "index.html",
                "<head>\n  <style>@@kiln-split:0@@</style>\n</head>",
            ),
        );
        assert!(out
            .contents_utf8()
            .unwrap()
            .contains("<style>@@kiln-split:0@@</style>"));
    }
}
