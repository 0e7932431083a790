//! Structural split and rejoin of composite HTML documents.
//!
//! Inline `<script>` and `<style>` regions must be transformed by the
//! script/style stage sets, not the markup set. The splitter replaces each
//! region's body with a marker token and emits one synthetic fragment asset
//! per region; fragments carry synthetic `.js`/`.css` extensions so the
//! type-filtered stages downstream pick them up like standalone files. The
//! rejoiner buffers shells and fragments by parent path (the stream is not
//! ordered across type classes) and emits a document only once every
//! fragment recorded at split time has arrived.
//!
//! Both stage halves share one per-pipeline state map; nothing is shared
//! across pipelines.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::LazyLock;

use parking_lot::Mutex;
use regex::Regex;
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::asset::{Asset, AssetKind, FragmentInfo, FragmentKind};
use crate::pipeline::Stage;
use crate::{Error, Result};

static SCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b([^>]*)>(.*?)</script\s*>").unwrap());
static STYLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style\b[^>]*>(.*?)</style\s*>").unwrap());
static SRC_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bsrc\s*=").unwrap());
static TYPE_ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\btype\s*=\s*["']?([^"'\s>]+)"#).unwrap());

fn marker(index: usize) -> String {
    format!("@@kiln-split:{index}@@")
}

/// Tracks one split document until the rejoiner closes it.
struct SplitDocument {
    expected: usize,
    shell: Option<Asset>,
    fragments: FxHashMap<usize, Vec<u8>>,
}

type SplitState = Arc<Mutex<FxHashMap<PathBuf, SplitDocument>>>;

/// Hands out the split/rejoin stage pair over shared per-pipeline state.
pub struct HtmlSplitter {
    state: SplitState,
}

impl HtmlSplitter {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FxHashMap::default())),
        }
    }

    pub fn split_stage(&self) -> SplitStage {
        SplitStage {
            state: Arc::clone(&self.state),
        }
    }

    pub fn rejoin_stage(&self) -> RejoinStage {
        RejoinStage {
            state: Arc::clone(&self.state),
        }
    }
}

/// One extracted inline region, in document order.
struct Region {
    body_start: usize,
    body_end: usize,
    kind: FragmentKind,
}

fn find_regions(html: &str) -> Vec<Region> {
    let mut regions = Vec::new();
    for caps in SCRIPT_RE.captures_iter(html) {
        let attrs = caps.get(1).map_or("", |m| m.as_str());
        if SRC_ATTR_RE.is_match(attrs) {
            continue;
        }
        if let Some(type_caps) = TYPE_ATTR_RE.captures(attrs) {
            let script_type = type_caps[1].to_ascii_lowercase();
            if !matches!(
                script_type.as_str(),
                "text/javascript" | "application/javascript" | "module"
            ) {
                continue;
            }
        }
        let body = caps.get(2).unwrap();
        regions.push(Region {
            body_start: body.start(),
            body_end: body.end(),
            kind: FragmentKind::Script,
        });
    }
    for caps in STYLE_RE.captures_iter(html) {
        let body = caps.get(1).unwrap();
        regions.push(Region {
            body_start: body.start(),
            body_end: body.end(),
            kind: FragmentKind::Style,
        });
    }
    regions.sort_by_key(|r| r.body_start);
    // A tag literal inside a script body can produce a phantom nested
    // region; keep the outermost match only.
    let mut last_end = 0;
    regions.retain(|r| {
        if r.body_start < last_end {
            return false;
        }
        last_end = r.body_end;
        true
    });
    regions
}

/// Decomposes composite documents into a shell plus synthetic fragments.
pub struct SplitStage {
    state: SplitState,
}

impl Stage for SplitStage {
    fn name(&self) -> &'static str {
        "split"
    }

    fn process(&mut self, asset: Asset, out: &mut Vec<Asset>) -> Result<()> {
        if asset.kind() != AssetKind::Html || asset.is_fragment() {
            out.push(asset);
            return Ok(());
        }
        let Some(html) = asset.contents_utf8() else {
            out.push(asset);
            return Ok(());
        };
        let html = html.into_owned();

        let regions = find_regions(&html);
        // Register before emitting anything so the rejoiner can account for
        // every fragment, whatever order the stream delivers them in.
        self.state.lock().insert(
            asset.path.clone(),
            SplitDocument {
                expected: regions.len(),
                shell: None,
                fragments: FxHashMap::default(),
            },
        );
        trace!(path = %asset.path.display(), fragments = regions.len(), "split document");

        let parent_str = asset.path_str();
        let mut shell = String::with_capacity(html.len());
        let mut cursor = 0;
        for (index, region) in regions.iter().enumerate() {
            let (tag, ext) = match region.kind {
                FragmentKind::Script => ("script", "js"),
                FragmentKind::Style => ("style", "css"),
            };
            shell.push_str(&html[cursor..region.body_start]);
            shell.push_str(&marker(index));
            cursor = region.body_end;

            out.push(Asset {
                path: PathBuf::from(format!("{parent_str}_{tag}_{index}.{ext}")),
                contents: Some(html[region.body_start..region.body_end].as_bytes().to_vec()),
                fragment: Some(FragmentInfo {
                    parent: asset.path.clone(),
                    index,
                    kind: region.kind,
                }),
            });
        }
        shell.push_str(&html[cursor..]);

        out.push(Asset {
            path: asset.path,
            contents: Some(shell.into_bytes()),
            fragment: None,
        });
        Ok(())
    }
}

/// Buffers shells and fragments until each document is complete, then
/// substitutes fragment contents back into their recorded positions.
pub struct RejoinStage {
    state: SplitState,
}

impl RejoinStage {
    fn try_close(&mut self, parent: &PathBuf, out: &mut Vec<Asset>) -> Result<()> {
        let mut state = self.state.lock();
        let complete = state
            .get(parent)
            .is_some_and(|doc| doc.shell.is_some() && doc.fragments.len() == doc.expected);
        if !complete {
            return Ok(());
        }
        let doc = state.remove(parent).expect("checked above");
        drop(state);

        let shell = doc.shell.expect("checked above");
        let mut text = shell
            .contents_utf8()
            .expect("shells are buffered with contents")
            .into_owned();
        for index in 0..doc.expected {
            let token = marker(index);
            let body = doc
                .fragments
                .get(&index)
                .expect("fragment count matched expected");
            let replacement = String::from_utf8_lossy(body);
            if !text.contains(&token) {
                return Err(Error::MissingSplitMarker {
                    path: parent.clone(),
                    index,
                });
            }
            text = text.replacen(&token, &replacement, 1);
        }
        trace!(path = %parent.display(), "rejoined document");
        out.push(Asset::text(shell.path, text));
        Ok(())
    }
}

impl Stage for RejoinStage {
    fn name(&self) -> &'static str {
        "rejoin"
    }

    fn process(&mut self, asset: Asset, out: &mut Vec<Asset>) -> Result<()> {
        if let Some(info) = asset.fragment.clone() {
            {
                let mut state = self.state.lock();
                let Some(doc) = state.get_mut(&info.parent) else {
                    return Err(Error::OrphanFragment {
                        path: asset.path,
                        parent: info.parent,
                    });
                };
                doc.fragments
                    .insert(info.index, asset.contents.unwrap_or_default());
            }
            return self.try_close(&info.parent, out);
        }

        if asset.kind() == AssetKind::Html && asset.contents.is_some() {
            let registered = {
                let mut state = self.state.lock();
                match state.get_mut(&asset.path) {
                    Some(doc) => {
                        doc.shell = Some(asset.clone());
                        true
                    }
                    None => false,
                }
            };
            if registered {
                let parent = asset.path;
                return self.try_close(&parent, out);
            }
        }

        out.push(asset);
        Ok(())
    }

    /// Any document still open at end-of-stream is a structural failure:
    /// either its shell never arrived or its fragment count never matched.
    fn flush(&mut self, _out: &mut Vec<Asset>) -> Result<()> {
        let state = self.state.lock();
        if let Some((path, doc)) = state.iter().next() {
            return Err(Error::IncompleteDocument {
                path: path.clone(),
                expected: doc.expected,
                received: doc.fragments.len(),
                shell_present: doc.shell.is_some(),
            });
        }
        Ok(())
    }
}
