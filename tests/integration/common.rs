#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A reconciliation root with a manifest next to it.
pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("root")).unwrap();
        Self { dir }
    }

    pub fn root(&self) -> PathBuf {
        self.dir.path().join("root")
    }

    pub fn path(&self, member: &str) -> PathBuf {
        self.root().join(member)
    }

    /// Write a file under the root, creating parent directories.
    pub fn file(&self, member: &str, content: &str) -> PathBuf {
        let path = self.path(member);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    /// Hardlink `new` to `existing`, both under the root.
    pub fn link(&self, existing: &str, new: &str) {
        let target = self.path(new);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::hard_link(self.path(existing), target).unwrap();
    }

    /// Write a manifest from `(hash, size, path)` rows, in the given order.
    pub fn manifest(&self, rows: &[(&str, &str, &str)]) -> PathBuf {
        let text: String = rows
            .iter()
            .map(|(hash, size, path)| format!("{hash}\t{size}\t{path}\n"))
            .collect();
        self.raw_manifest(&text)
    }

    pub fn raw_manifest(&self, text: &str) -> PathBuf {
        let path = self.dir.path().join("hashes_sorted.txt");
        fs::write(&path, text).unwrap();
        path
    }
}

#[cfg(unix)]
pub fn same_file(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    let (a, b) = (fs::metadata(a).unwrap(), fs::metadata(b).unwrap());
    a.dev() == b.dev() && a.ino() == b.ino()
}

#[cfg(unix)]
pub fn link_count(path: &Path) -> u64 {
    use std::os::unix::fs::MetadataExt;
    fs::metadata(path).unwrap().nlink()
}
