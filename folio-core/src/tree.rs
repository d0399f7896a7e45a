use std::path::{Path, PathBuf};

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Serialize;
use walkdir::WalkDir;

/// Characters left alone by `encodeURIComponent`; everything else in a
/// path segment gets percent-encoded.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub const MARKDOWN_EXTENSION: &str = "md";

#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error("failed to read directory {path}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TreeError {
    fn read_dir(path: &Path, source: std::io::Error) -> Self {
        TreeError::ReadDir {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Directory,
    File,
}

/// One entry of the catalog tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TreeNode {
    Directory {
        name: String,
        path: PathBuf,
        url: String,
        children: Vec<TreeNode>,
    },
    File {
        name: String,
        path: PathBuf,
        url: String,
    },
}

impl TreeNode {
    pub fn name(&self) -> &str {
        match self {
            TreeNode::Directory { name, .. } | TreeNode::File { name, .. } => name,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            TreeNode::Directory { path, .. } | TreeNode::File { path, .. } => path,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            TreeNode::Directory { url, .. } | TreeNode::File { url, .. } => url,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            TreeNode::Directory { .. } => NodeKind::Directory,
            TreeNode::File { .. } => NodeKind::File,
        }
    }

    pub fn children(&self) -> &[TreeNode] {
        match self {
            TreeNode::Directory { children, .. } => children,
            TreeNode::File { .. } => &[],
        }
    }
}

/// An immediate child of a directory, as shown on a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub url: String,
}

/// Walk `root` and return its children, recursing into every subdirectory.
///
/// Only directories and markdown files make it into the tree. Any directory
/// that cannot be read fails the whole walk.
pub fn walk<P: AsRef<Path>>(root: P) -> Result<Vec<TreeNode>, TreeError> {
    walk_dir(root.as_ref(), Path::new(""))
}

fn walk_dir(dir: &Path, relative: &Path) -> Result<Vec<TreeNode>, TreeError> {
    let mut nodes = Vec::new();

    for entry in sorted_entries(dir)? {
        let full_path = entry.path();
        let file_name = entry.file_name().to_string_lossy().to_string();
        let relative_path = relative.join(&file_name);

        if full_path.is_dir() {
            let children = walk_dir(&full_path, &relative_path)?;
            nodes.push(TreeNode::Directory {
                url: url_for(&relative_path),
                name: file_name,
                path: relative_path,
                children,
            });
        } else if is_markdown(&full_path) {
            let stripped = relative_path.with_extension("");
            nodes.push(TreeNode::File {
                name: display_name(&full_path),
                url: url_for(&stripped),
                path: relative_path,
            });
        }
    }

    Ok(nodes)
}

/// Entries of `dir` in file name order.
fn sorted_entries(dir: &Path) -> Result<Vec<std::fs::DirEntry>, TreeError> {
    let mut entries = std::fs::read_dir(dir)
        .and_then(|entries| entries.collect::<Result<Vec<_>, _>>())
        .map_err(|e| TreeError::read_dir(dir, e))?;
    entries.sort_by_key(|entry| entry.file_name());
    Ok(entries)
}

/// List the immediate directories and markdown files of `root/relative`.
pub fn list_directory<P: AsRef<Path>>(
    root: P,
    relative: &Path,
) -> Result<Vec<ListingEntry>, TreeError> {
    let dir = root.as_ref().join(relative);
    let mut entries = Vec::new();

    for entry in sorted_entries(&dir)? {
        let full_path = entry.path();
        let file_name = entry.file_name().to_string_lossy().to_string();
        let relative_path = relative.join(&file_name);

        if full_path.is_dir() {
            entries.push(ListingEntry {
                name: file_name,
                kind: NodeKind::Directory,
                url: url_for(&relative_path),
            });
        } else if is_markdown(&full_path) {
            entries.push(ListingEntry {
                name: display_name(&full_path),
                kind: NodeKind::File,
                url: url_for(&relative_path.with_extension("")),
            });
        }
    }

    Ok(entries)
}

/// Every directory and markdown file below `root`, relative to it. The root
/// itself is not included.
pub fn markdown_files<P: AsRef<Path>>(root: P) -> Result<Vec<(NodeKind, PathBuf)>, TreeError> {
    let root = root.as_ref();
    let mut found = Vec::new();

    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            TreeError::ReadDir {
                path,
                source: e.into(),
            }
        })?;
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };

        if entry.file_type().is_dir() {
            found.push((NodeKind::Directory, relative.to_path_buf()));
        } else if is_markdown(entry.path()) {
            found.push((NodeKind::File, relative.to_path_buf()));
        }
    }

    Ok(found)
}

pub fn is_markdown(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case(MARKDOWN_EXTENSION))
        .unwrap_or(false)
}

fn display_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Build the route for a catalog-relative path: a leading slash followed by
/// the percent-encoded segments.
pub fn url_for(relative: &Path) -> String {
    let segments: Vec<String> = relative
        .components()
        .map(|c| utf8_percent_encode(&c.as_os_str().to_string_lossy(), SEGMENT).to_string())
        .collect();

    format!("/{}", segments.join("/"))
}
