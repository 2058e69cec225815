//! Resolution of untrusted request path segments
//!
//! Segments arrive already URL-decoded. Each one must name exactly one
//! visible entry: no separators, no `.`/`..`, no dotfiles, no absolute paths.
//! The joined path is canonicalized and has to stay under the canonical
//! content root, so symlinks cannot escape it either.

use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Validate a single path segment
pub fn check_segment(segment: &str) -> Result<&str> {
    if segment.is_empty() {
        return Err(Error::PathSecurity("empty path segment".into()));
    }
    // Covers `.`, `..` and hidden files such as `.metadata.json`
    if segment.starts_with('.') {
        return Err(Error::PathSecurity(format!("dot-prefixed segment {:?}", segment)));
    }
    if segment.contains(['/', '\\', '\0']) {
        return Err(Error::PathSecurity(format!("separator in segment {:?}", segment)));
    }

    let mut components = Path::new(segment).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(segment),
        _ => Err(Error::PathSecurity(format!("segment {:?} is not a plain name", segment))),
    }
}

/// Canonicalize `candidate` and make sure it lives under `root`.
fn contain(root: &Path, candidate: &Path) -> Result<PathBuf> {
    let root = root.canonicalize().map_err(|e| not_found_or_io(e, root))?;
    let target = candidate
        .canonicalize()
        .map_err(|e| not_found_or_io(e, candidate))?;

    if !target.starts_with(&root) {
        return Err(Error::PathSecurity(format!("{:?} escapes the content root", candidate)));
    }
    Ok(target)
}

/// Whether `path` resolves to a location under `canonical_root`.
///
/// Unresolvable paths (dangling symlinks, permission errors) count as outside.
pub fn is_within(canonical_root: &Path, path: &Path) -> bool {
    path.canonicalize()
        .map(|target| target.starts_with(canonical_root))
        .unwrap_or(false)
}

fn not_found_or_io(e: io::Error, path: &Path) -> Error {
    if e.kind() == io::ErrorKind::NotFound {
        Error::NotFound(path.display().to_string())
    } else {
        Error::Io(e)
    }
}

fn require_file(path: PathBuf) -> Result<PathBuf> {
    if path.is_file() {
        Ok(path)
    } else {
        Err(Error::NotFound(path.display().to_string()))
    }
}

/// Resolve `root/directory/file` to an existing regular file.
pub fn resolve(root: &Path, directory: &str, file: &str) -> Result<PathBuf> {
    let directory = check_segment(directory)?;
    let file = check_segment(file)?;
    require_file(contain(root, &root.join(directory).join(file))?)
}

/// Resolve a file directly inside the root, e.g. `favicon.ico`.
pub fn resolve_named(root: &Path, name: &str) -> Result<PathBuf> {
    let name = check_segment(name)?;
    require_file(contain(root, &root.join(name))?)
}

/// Resolve an immediate subdirectory of the root.
pub fn resolve_dir(root: &Path, directory: &str) -> Result<PathBuf> {
    let directory = check_segment(directory)?;
    let path = contain(root, &root.join(directory))?;
    if path.is_dir() {
        Ok(path)
    } else {
        Err(Error::NotFound(path.display().to_string()))
    }
}
