//! Path comparison keys for link names.
//!
//! Link names come back from the OS while group members come from the
//! manifest, so the same directory entry can be spelled differently:
//!
//! - `root/./a.txt` vs `root/a.txt` (lexical noise)
//! - `café.txt` NFC vs `cafe\u{0301}.txt` NFD (macOS stores NFD)
//! - `C:\Data\A.TXT` vs `c:\data\a.txt` (Windows is case-insensitive)
//!
//! [`path_key`] folds those differences away. It never touches the
//! filesystem, so it does not resolve `..` or symlinks.
//!
//! # Example
//!
//! ```
//! use relink::links::path_utils::{path_key, paths_equal};
//! use std::path::Path;
//!
//! assert_eq!(path_key(Path::new("root/./café.txt")), path_key(Path::new("root/cafe\u{0301}.txt")));
//! assert!(paths_equal(Path::new("a//b"), Path::new("a/b")));
//! ```

use std::path::{Component, Path, PathBuf};

use unicode_normalization::UnicodeNormalization;

/// Normalize a string to NFC (Composed) form.
#[must_use]
pub fn normalize_path_str(s: &str) -> String {
    s.nfc().collect()
}

/// Drop `.` components and redundant separators.
#[must_use]
pub fn lexical_normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Join a manifest-relative member path onto the reconciliation root.
///
/// Leading separators are stripped so `/a/b` in a manifest still lands under
/// `root` instead of replacing it.
#[must_use]
pub fn resolve_member(root: &Path, member: &str) -> PathBuf {
    root.join(member.trim_start_matches(std::path::is_separator))
}

/// Create a comparison key for a path.
///
/// Invalid UTF-8 is converted lossily; two such paths only collide if they
/// differ solely in the invalid bytes.
#[must_use]
pub fn path_key(path: &Path) -> String {
    let key = normalize_path_str(&lexical_normalize(path).to_string_lossy());
    if cfg!(windows) {
        key.to_lowercase()
    } else {
        key
    }
}

/// Check if two paths name the same directory entry, by [`path_key`].
#[must_use]
pub fn paths_equal(a: &Path, b: &Path) -> bool {
    path_key(a) == path_key(b)
}
