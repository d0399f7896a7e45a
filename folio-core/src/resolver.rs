//! Maps a decoded request path onto the catalog.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use crate::tree::{MARKDOWN_EXTENSION, is_markdown};

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("invalid request path `{0}`")]
    InvalidPath(String),
    #[error("failed to inspect {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where a request path ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Nothing matched. `resolved` is the last candidate that was tried.
    NotFound { requested: String, resolved: PathBuf },
    Directory { relative: PathBuf, full: PathBuf },
    Document { relative: PathBuf, full: PathBuf },
    /// An existing file that is not markdown.
    InvalidType { relative: PathBuf, full: PathBuf },
}

impl Resolution {
    pub fn full_path(&self) -> &Path {
        match self {
            Resolution::NotFound { resolved, .. } => resolved,
            Resolution::Directory { full, .. }
            | Resolution::Document { full, .. }
            | Resolution::InvalidType { full, .. } => full,
        }
    }
}

/// Turn a decoded request path into a path relative to the content root.
///
/// Leading slashes and `.` segments are dropped; `..` or anything that would
/// leave the root is rejected.
pub fn relative_request_path(request_path: &str) -> Result<PathBuf, ResolveError> {
    let mut relative = PathBuf::new();

    for component in Path::new(request_path.trim_start_matches('/')).components() {
        match component {
            Component::Normal(segment) => relative.push(segment),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ResolveError::InvalidPath(request_path.to_string()));
            }
        }
    }

    Ok(relative)
}

pub fn resolve(root: &Path, request_path: &str) -> Result<Resolution, ResolveError> {
    let mut relative = relative_request_path(request_path)?;
    let mut full = root.join(&relative);
    let mut metadata = probe(&full)?;

    // `x.md.md` is served at `/x.md`, so the fallback runs even for `.md` paths
    if metadata.is_none() {
        if let Some((name, meta)) = markdown_candidate(&full)? {
            tracing::debug!("resolved {} to {}", full.display(), name.to_string_lossy());
            full.set_file_name(&name);
            relative.set_file_name(&name);
            metadata = Some(meta);
        } else if let Some(name) = full.file_name().filter(|_| !is_markdown(&full)) {
            // report the `.md` candidate, like the first fallback tried
            let mut with_ext = name.to_os_string();
            with_ext.push(".");
            with_ext.push(MARKDOWN_EXTENSION);
            full.set_file_name(with_ext);
        }
    }

    let Some(metadata) = metadata else {
        return Ok(Resolution::NotFound {
            requested: request_path.to_string(),
            resolved: full,
        });
    };

    if metadata.is_dir() {
        Ok(Resolution::Directory { relative, full })
    } else if is_markdown(&full) {
        Ok(Resolution::Document { relative, full })
    } else {
        Ok(Resolution::InvalidType { relative, full })
    }
}

/// `Ok(None)` when nothing exists at `path`.
fn probe(path: &Path) -> Result<Option<std::fs::Metadata>, ResolveError> {
    match std::fs::metadata(path) {
        Ok(meta) => Ok(Some(meta)),
        Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory | ErrorKind::InvalidInput) => {
            Ok(None)
        }
        Err(source) => Err(ResolveError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Look for `<name>.md`, then for a sibling whose extension only differs in
/// case (`<name>.MD`).
fn markdown_candidate(full: &Path) -> Result<Option<(OsString, std::fs::Metadata)>, ResolveError> {
    let Some(name) = full.file_name() else {
        return Ok(None);
    };

    let mut exact = name.to_os_string();
    exact.push(".");
    exact.push(MARKDOWN_EXTENSION);
    if let Some(meta) = probe(&full.with_file_name(&exact))? {
        return Ok(Some((exact, meta)));
    }

    let Some(parent) = full.parent() else {
        return Ok(None);
    };
    let Ok(entries) = std::fs::read_dir(parent) else {
        return Ok(None);
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if is_markdown(&path) && path.file_stem() == Some(name) {
            if let Some(meta) = probe(&path)? {
                return Ok(Some((entry.file_name(), meta)));
            }
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn catalog() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("guide")).unwrap();
        fs::write(dir.path().join("intro.md"), "# Intro").unwrap();
        fs::write(dir.path().join("guide/setup.md"), "# Setup").unwrap();
        fs::write(dir.path().join("guide/LOUD.MD"), "# Loud").unwrap();
        fs::write(dir.path().join("guide/v1.2.md"), "# v1.2").unwrap();
        fs::write(dir.path().join("logo.png"), [0u8; 4]).unwrap();
        dir
    }

    #[test]
    fn test_root_is_directory() {
        let dir = catalog();
        for path in ["", "/"] {
            let resolution = resolve(dir.path(), path).unwrap();
            assert_eq!(
                resolution,
                Resolution::Directory {
                    relative: PathBuf::new(),
                    full: dir.path().to_path_buf(),
                }
            );
        }
    }

    #[test]
    fn test_extension_is_appended() {
        let dir = catalog();
        let resolution = resolve(dir.path(), "/guide/setup").unwrap();
        assert_eq!(
            resolution,
            Resolution::Document {
                relative: PathBuf::from("guide/setup.md"),
                full: dir.path().join("guide/setup.md"),
            }
        );
    }

    #[test]
    fn test_exact_markdown_path() {
        let dir = catalog();
        let resolution = resolve(dir.path(), "intro.md").unwrap();
        assert!(matches!(resolution, Resolution::Document { .. }));
    }

    #[test]
    fn test_dotted_and_uppercase_names() {
        let dir = catalog();
        assert!(matches!(
            resolve(dir.path(), "/guide/v1.2").unwrap(),
            Resolution::Document { .. }
        ));
        assert_eq!(
            resolve(dir.path(), "/guide/LOUD").unwrap().full_path(),
            dir.path().join("guide/LOUD.MD")
        );
    }

    #[test]
    fn test_double_extension_resolves_by_its_url() {
        let dir = catalog();
        fs::write(dir.path().join("x.md.md"), "# x").unwrap();
        assert_eq!(
            resolve(dir.path(), "/x.md").unwrap(),
            Resolution::Document {
                relative: PathBuf::from("x.md.md"),
                full: dir.path().join("x.md.md"),
            }
        );
        // a missing `.md` path reports itself, not `.md.md`
        assert_eq!(
            resolve(dir.path(), "/gone.md").unwrap().full_path(),
            dir.path().join("gone.md")
        );
    }

    #[test]
    fn test_not_found_reports_candidate() {
        let dir = catalog();
        let resolution = resolve(dir.path(), "/guide/missing").unwrap();
        assert_eq!(
            resolution,
            Resolution::NotFound {
                requested: "/guide/missing".into(),
                resolved: dir.path().join("guide/missing.md"),
            }
        );
    }

    #[test]
    fn test_below_a_file_is_not_found() {
        let dir = catalog();
        assert!(matches!(
            resolve(dir.path(), "/intro.md/child").unwrap(),
            Resolution::NotFound { .. }
        ));
    }

    #[test]
    fn test_non_markdown_file_is_invalid_type() {
        let dir = catalog();
        assert!(matches!(
            resolve(dir.path(), "/logo.png").unwrap(),
            Resolution::InvalidType { .. }
        ));
    }

    #[test]
    fn test_parent_segments_are_rejected() {
        let dir = catalog();
        assert!(matches!(
            resolve(dir.path(), "/guide/../../etc/passwd"),
            Err(ResolveError::InvalidPath(_))
        ));
        assert_eq!(relative_request_path("/./guide/./setup").unwrap(), PathBuf::from("guide/setup"));
    }
}
