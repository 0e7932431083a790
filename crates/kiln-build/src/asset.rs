//! The in-memory file record flowing through a pipeline.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

/// One file flowing through a build pipeline.
///
/// Paths are logical: relative to the project root, forward-slash separated
/// on every platform. `contents` of `None` marks a directory entry, which
/// every stage passes through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub path: PathBuf,
    pub contents: Option<Vec<u8>>,
    /// Present iff this asset is a synthetic fragment extracted from a
    /// composite document by the splitter.
    pub fragment: Option<FragmentInfo>,
}

/// Where a synthetic fragment came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentInfo {
    /// Path of the document the fragment was extracted from.
    pub parent: PathBuf,
    /// Ordinal position among the parent's extracted regions.
    pub index: usize,
    pub kind: FragmentKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    Script,
    Style,
}

/// Content type, derived from the file extension. Fragments carry synthetic
/// `.js` / `.css` extensions, so they classify like standalone files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Html,
    Script,
    Style,
    Other,
}

impl Asset {
    pub fn new(path: impl Into<PathBuf>, contents: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            contents: Some(contents),
            fragment: None,
        }
    }

    pub fn text(path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        Self::new(path, contents.into().into_bytes())
    }

    /// A directory marker: no contents, passes through every stage.
    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            contents: None,
            fragment: None,
        }
    }

    pub fn kind(&self) -> AssetKind {
        match self
            .path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("html") | Some("htm") => AssetKind::Html,
            Some("js") | Some("mjs") => AssetKind::Script,
            Some("css") => AssetKind::Style,
            _ => AssetKind::Other,
        }
    }

    pub fn is_fragment(&self) -> bool {
        self.fragment.is_some()
    }

    /// Contents decoded as UTF-8 (lossily). `None` for directory markers.
    pub fn contents_utf8(&self) -> Option<Cow<'_, str>> {
        self.contents
            .as_deref()
            .map(|bytes| String::from_utf8_lossy(bytes))
    }

    pub fn set_text(&mut self, text: String) {
        self.contents = Some(text.into_bytes());
    }

    /// Logical path as a forward-slash string, for reference matching and
    /// manifest output.
    pub fn path_str(&self) -> String {
        path_to_slash(&self.path)
    }
}

pub(crate) fn path_to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
