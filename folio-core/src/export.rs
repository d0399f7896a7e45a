//! Static export: render every page of the catalog into an output directory.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{info, warn};
use walkdir::WalkDir;

use crate::site::{Outcome, Site};
use crate::tree::{self, NodeKind, TreeError};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to scan the catalog")]
    Tree(#[from] TreeError),
    #[error("failed to write {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExportError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        ExportError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub pages_written: usize,
    pub assets_copied: usize,
    /// Routes that rendered as an error page, with what went wrong.
    pub failures: Vec<(String, Outcome)>,
}

/// Render the root, every directory and every document of `site` into
/// `output_dir/<route>/index.html`, then copy the public assets next to them.
///
/// Pages that render as error pages are still written and reported in
/// [`ExportReport::failures`]; only IO problems abort the export.
pub fn export_site<P: AsRef<Path>, O: AsRef<Path>>(
    site: &Site,
    public_dir: P,
    output_dir: O,
) -> Result<ExportReport, ExportError> {
    let output_dir = output_dir.as_ref();
    let mut report = ExportReport::default();

    let entries = tree::markdown_files(site.content_dir())?;
    let directories: HashSet<PathBuf> = entries
        .iter()
        .filter(|(kind, _)| *kind == NodeKind::Directory)
        .map(|(_, path)| path.clone())
        .collect();

    let mut routes = vec![PathBuf::new()];
    for (kind, path) in entries {
        match kind {
            NodeKind::Directory => routes.push(path),
            NodeKind::File => {
                let stripped = path.with_extension("");
                // a directory with the same name wins, like it does when serving
                if !directories.contains(&stripped) {
                    routes.push(stripped);
                }
            }
        }
    }

    for route in routes {
        let url = tree::url_for(&route);
        let page = site.render(&url);
        if !page.outcome.is_success() {
            warn!("{url} rendered as {:?}", page.outcome);
            report.failures.push((url.clone(), page.outcome));
        }

        let target = output_dir.join(&route).join("index.html");
        write_file(&target, page.body.as_bytes())?;
        report.pages_written += 1;
    }

    let public_dir = public_dir.as_ref();
    if public_dir.is_dir() {
        report.assets_copied = copy_assets(public_dir, output_dir, site.templates().dir())?;
    }

    info!(
        "exported {} pages and {} assets to {}",
        report.pages_written,
        report.assets_copied,
        output_dir.display()
    );

    Ok(report)
}

fn copy_assets(public_dir: &Path, output_dir: &Path, templates_dir: &Path) -> Result<usize, ExportError> {
    let templates_dir = templates_dir.canonicalize().ok();
    let mut copied = 0;

    let walker = WalkDir::new(public_dir).min_depth(1).into_iter().filter_entry(|entry| {
        // templates are inputs, not assets
        let canonical = entry.path().canonicalize().ok();
        canonical.is_none() || canonical != templates_dir
    });

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(public_dir).to_path_buf();
            ExportError::Io {
                path,
                source: e.into(),
            }
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(public_dir) else {
            continue;
        };

        let target = output_dir.join(relative);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ExportError::io(parent, e))?;
        }
        std::fs::copy(entry.path(), &target).map_err(|e| ExportError::io(&target, e))?;
        copied += 1;
    }

    Ok(copied)
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), ExportError> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ExportError::io(parent, e))?;
    }
    std::fs::write(path, contents).map_err(|e| ExportError::io(path, e))
}
