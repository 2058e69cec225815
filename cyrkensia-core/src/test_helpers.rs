//! Filesystem fixtures shared by unit tests.

use std::fs;
use std::path::Path;

/// Write a file of exactly `size` bytes, creating parent directories.
pub fn write_sized(path: &Path, size: usize) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, vec![0x55u8; size]).unwrap();
}

/// Create `root/dir` with a metadata file and the given `(name, size)` files.
pub fn write_album(root: &Path, dir: &str, metadata: &str, files: &[(&str, usize)]) {
    let album = root.join(dir);
    fs::create_dir_all(&album).unwrap();
    fs::write(album.join(crate::catalog::METADATA_FILE), metadata).unwrap();
    for (name, size) in files {
        write_sized(&album.join(name), *size);
    }
}
