//! Content catalog built from the directory tree
//!
//! Layout of a content root:
//!
//! ```text
//! root/
//!   AlbumA/
//!     .metadata.json   <- makes AlbumA an album
//!     song1.mp3
//!     song2.mp3
//!   Junk/              <- no metadata: invisible to the catalog,
//!     file.mp3            but still servable by direct path
//! ```
//!
//! Symlinks are followed only while they stay inside the content root, the
//! same boundary file delivery enforces.
//!
//! The catalog is rebuilt on every request; nothing here is cached.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::paths;

/// Per-album metadata file name
pub const METADATA_FILE: &str = ".metadata.json";

/// Author or artist credited in an album's metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Author {
    pub name: String,
    pub website: String,
    pub email: String,
    /// Song titles attributed to this author. Not checked against the files.
    pub songs: Vec<String>,
}

/// Contents of `.metadata.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlbumMetadata {
    pub name: String,
    pub cover: String,
    pub authors: Vec<Author>,
}

impl AlbumMetadata {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// A cataloged album
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    /// Directory name, unique within the root
    pub dir: String,
    pub name: String,
    pub cover: String,
    /// Visible files in filesystem enumeration order
    pub files: Vec<String>,
    pub authors: Vec<Author>,
}

/// Result of one catalog walk
#[derive(Debug, Default, Serialize)]
pub struct CatalogSnapshot {
    pub albums: Vec<Album>,
    /// Sum of all cataloged file sizes in bytes
    pub size: u64,
    /// Albums that were skipped, and why
    #[serde(skip)]
    pub issues: Vec<Error>,
}

impl CatalogSnapshot {
    pub fn album(&self, dir: &str) -> Option<&Album> {
        self.albums.iter().find(|a| a.dir == dir)
    }
}

fn catalog_error(path: &Path, reason: impl ToString) -> Error {
    Error::CatalogIo {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Walk `root` and build a snapshot.
///
/// Never fails: a missing root gives an empty snapshot and a broken album is
/// recorded in [`CatalogSnapshot::issues`] while the walk continues.
pub fn build(root: &Path) -> CatalogSnapshot {
    let mut snapshot = CatalogSnapshot::default();

    if !root.is_dir() {
        debug!("Content root {:?} does not exist", root);
        return snapshot;
    }
    let canonical_root = match root.canonicalize() {
        Ok(path) => path,
        Err(e) => {
            warn!("Failed to resolve content root {:?}: {}", root, e);
            snapshot.issues.push(catalog_error(root, e));
            return snapshot;
        }
    };

    for entry in WalkDir::new(root).min_depth(1).max_depth(1).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().unwrap_or(root).to_path_buf();
                warn!("Failed to read {:?}: {}", path, e);
                snapshot.issues.push(catalog_error(&path, e));
                continue;
            }
        };

        if !entry.file_type().is_dir() {
            continue;
        }
        let dir = entry.path();
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        if entry.path_is_symlink() && !paths::is_within(&canonical_root, dir) {
            warn!("Skipping {:?}: links outside the content root", dir);
            continue;
        }
        if !dir.join(METADATA_FILE).is_file() {
            debug!("No {} in {:?}, not an album", METADATA_FILE, dir);
            continue;
        }

        match read_album(&canonical_root, dir) {
            Ok((album, size)) => {
                debug!("Album {:?}: {} files, {} bytes", album.dir, album.files.len(), size);
                snapshot.size += size;
                snapshot.albums.push(album);
            }
            Err(e) => {
                warn!("Skipping album: {}", e);
                snapshot.issues.push(e);
            }
        }
    }

    snapshot
}

fn read_album(canonical_root: &Path, dir: &Path) -> Result<(Album, u64)> {
    let name = dir
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| catalog_error(dir, "directory name is not valid UTF-8"))?;

    let metadata = AlbumMetadata::load(dir.join(METADATA_FILE))
        .map_err(|e| catalog_error(&dir.join(METADATA_FILE), e))?;
    let (files, size) = list_files(canonical_root, dir)?;

    let album = Album {
        dir: name.to_string(),
        name: metadata.name,
        cover: metadata.cover,
        files,
        authors: metadata.authors,
    };
    Ok((album, size))
}

/// List the visible regular files directly inside `dir` and their total size.
///
/// Dotfiles (including the metadata file), subdirectories and symlinks that
/// leave `canonical_root` are excluded.
pub fn list_files(canonical_root: &Path, dir: &Path) -> Result<(Vec<String>, u64)> {
    let mut files = Vec::new();
    let mut size = 0u64;

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true) {
        let entry = entry.map_err(|e| catalog_error(dir, e))?;
        let Some(name) = entry.file_name().to_str() else {
            debug!("Skipping non UTF-8 file name in {:?}", dir);
            continue;
        };
        if name.starts_with('.') || name == METADATA_FILE {
            continue;
        }
        if entry.path_is_symlink() && !paths::is_within(canonical_root, entry.path()) {
            debug!("Skipping {:?}: links outside the content root", entry.path());
            continue;
        }
        let meta = entry.metadata().map_err(|e| catalog_error(entry.path(), e))?;
        if !meta.is_file() {
            continue;
        }
        size += meta.len();
        files.push(name.to_string());
    }

    Ok((files, size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{write_album, write_sized};
    use tempfile::TempDir;

    fn sorted(mut v: Vec<String>) -> Vec<String> {
        v.sort();
        v
    }

    #[test]
    fn test_album_and_junk_scenario() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write_album(
            root,
            "AlbumA",
            r#"{"name":"Foo","cover":"c.jpg","authors":[]}"#,
            &[("song1.mp3", 1000), ("song2.mp3", 2000)],
        );
        write_sized(&root.join("Junk").join("noise.mp3"), 500);

        let snapshot = build(root);
        assert_eq!(snapshot.albums.len(), 1);
        let album = &snapshot.albums[0];
        assert_eq!(album.dir, "AlbumA");
        assert_eq!(album.name, "Foo");
        assert_eq!(album.cover, "c.jpg");
        assert_eq!(sorted(album.files.clone()), vec!["song1.mp3", "song2.mp3"]);
        assert_eq!(snapshot.size, 3000);
        assert!(snapshot.issues.is_empty());
    }

    #[test]
    fn test_top_level_file_does_not_change_total() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write_album(root, "AlbumA", r#"{"name":"A"}"#, &[("a.flac", 4096)]);
        let before = build(root).size;

        write_sized(&root.join("loose.mp3"), 12345);
        assert_eq!(build(root).size, before);
    }

    #[test]
    fn test_malformed_metadata_isolated() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write_album(root, "One", r#"{"name":"One"}"#, &[("1.mp3", 10)]);
        write_album(root, "Two", r#"{"name": "Two", "#, &[("2.mp3", 20)]);
        write_album(root, "Three", r#"{"name":"Three"}"#, &[("3.mp3", 30)]);

        let snapshot = build(root);
        let mut dirs: Vec<_> = snapshot.albums.iter().map(|a| a.dir.clone()).collect();
        dirs.sort();
        assert_eq!(dirs, vec!["One", "Three"]);
        assert_eq!(snapshot.size, 40);
        assert_eq!(snapshot.issues.len(), 1);
        assert!(matches!(snapshot.issues[0], Error::CatalogIo { .. }));
    }

    #[test]
    fn test_wrong_types_are_malformed() {
        let tmp = TempDir::new().unwrap();
        write_album(tmp.path(), "Bad", r#"{"name": 42}"#, &[("x.mp3", 1)]);
        let snapshot = build(tmp.path());
        assert!(snapshot.albums.is_empty());
        assert_eq!(snapshot.size, 0);
        assert_eq!(snapshot.issues.len(), 1);
    }

    #[test]
    fn test_authors_parsed() {
        let tmp = TempDir::new().unwrap();
        let meta = r#"{
            "name": "Night Drive",
            "cover": "night",
            "authors": [
                {"name": "Kei", "website": "https://kei.example", "email": "kei@example.org", "songs": ["Intro", "Outro"]},
                {"name": "Ren"}
            ]
        }"#;
        write_album(tmp.path(), "night", meta, &[("intro.opus", 5)]);

        let snapshot = build(tmp.path());
        let album = snapshot.album("night").unwrap();
        assert_eq!(album.authors.len(), 2);
        assert_eq!(album.authors[0].songs, vec!["Intro", "Outro"]);
        assert!(album.authors[1].songs.is_empty());
        assert_eq!(album.authors[1].website, "");
    }

    #[test]
    fn test_dotfiles_and_subdirs_excluded() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write_album(root, "A", r#"{"name":"A"}"#, &[("track.mp3", 100), (".DS_Store", 999)]);
        write_sized(&root.join("A").join("bonus").join("hidden.mp3"), 50);

        let snapshot = build(root);
        assert_eq!(snapshot.albums[0].files, vec!["track.mp3"]);
        assert_eq!(snapshot.size, 100);
    }

    #[test]
    fn test_hidden_album_directory_skipped() {
        let tmp = TempDir::new().unwrap();
        write_album(tmp.path(), ".trash", r#"{"name":"T"}"#, &[("x.mp3", 7)]);
        let snapshot = build(tmp.path());
        assert!(snapshot.albums.is_empty());
        assert_eq!(snapshot.size, 0);
        assert!(snapshot.issues.is_empty());
    }

    #[test]
    fn test_missing_and_empty_root() {
        let tmp = TempDir::new().unwrap();
        let snapshot = build(&tmp.path().join("nowhere"));
        assert!(snapshot.albums.is_empty());
        assert_eq!(snapshot.size, 0);
        assert!(snapshot.issues.is_empty());

        let snapshot = build(tmp.path());
        assert!(snapshot.albums.is_empty());
        assert_eq!(snapshot.size, 0);
    }

    #[test]
    fn test_build_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write_album(root, "X", r#"{"name":"X"}"#, &[("a", 1), ("b", 2)]);
        write_album(root, "Y", r#"{"name":"Y"}"#, &[("c", 3)]);

        let first = build(root);
        let second = build(root);
        let dirs = |s: &CatalogSnapshot| {
            let mut d: Vec<_> = s.albums.iter().map(|a| (a.dir.clone(), sorted(a.files.clone()))).collect();
            d.sort();
            d
        };
        assert_eq!(dirs(&first), dirs(&second));
        assert_eq!(first.size, second.size);
        assert_eq!(first.size, 6);
    }

    #[test]
    fn test_list_files() {
        let tmp = TempDir::new().unwrap();
        write_album(tmp.path(), "A", "{}", &[("one.mp3", 3), ("two.mp3", 4)]);
        let root = tmp.path().canonicalize().unwrap();
        let (files, size) = list_files(&root, &root.join("A")).unwrap();
        assert_eq!(sorted(files), vec!["one.mp3", "two.mp3"]);
        assert_eq!(size, 7);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_album_outside_root_skipped() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("root");
        write_album(&root, "Inside", r#"{"name":"In"}"#, &[("in.mp3", 10)]);
        write_album(tmp.path(), "outside", r#"{"name":"Out"}"#, &[("x.mp3", 777)]);
        std::os::unix::fs::symlink(tmp.path().join("outside"), root.join("Ext")).unwrap();

        let snapshot = build(&root);
        let dirs: Vec<_> = snapshot.albums.iter().map(|a| a.dir.as_str()).collect();
        assert_eq!(dirs, vec!["Inside"]);
        assert_eq!(snapshot.size, 10);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_file_outside_root_skipped() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("root");
        write_album(&root, "A", r#"{"name":"A"}"#, &[("a.mp3", 100)]);
        write_sized(&tmp.path().join("secret.flac"), 4096);
        std::os::unix::fs::symlink(tmp.path().join("secret.flac"), root.join("A").join("leak.flac")).unwrap();

        let snapshot = build(&root);
        assert_eq!(snapshot.albums[0].files, vec!["a.mp3"]);
        assert_eq!(snapshot.size, 100);

        let canonical = root.canonicalize().unwrap();
        let (files, _) = list_files(&canonical, &root.join("A")).unwrap();
        assert_eq!(files, vec!["a.mp3"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_inside_root_followed() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write_album(root, "Real", r#"{"name":"Real"}"#, &[("r.mp3", 5)]);
        std::os::unix::fs::symlink(root.join("Real"), root.join("Alias")).unwrap();
        std::os::unix::fs::symlink(root.join("Real").join("r.mp3"), root.join("Real").join("again.mp3")).unwrap();

        let snapshot = build(root);
        assert_eq!(snapshot.albums.len(), 2);
        assert_eq!(sorted(snapshot.album("Alias").unwrap().files.clone()), vec!["again.mp3", "r.mp3"]);
        assert_eq!(snapshot.size, 20);
    }

    #[test]
    fn test_snapshot_serialization_omits_issues() {
        let tmp = TempDir::new().unwrap();
        write_album(tmp.path(), "Broken", "nope", &[]);
        let snapshot = build(tmp.path());
        assert_eq!(snapshot.issues.len(), 1);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["size"], 0);
        assert!(json.get("issues").is_none());
    }
}
