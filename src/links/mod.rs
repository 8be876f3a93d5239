//! Hardlink enumeration.
//!
//! This module answers one question: given a path, which names currently
//! refer to the same underlying file?
//!
//! # Architecture
//!
//! - [`search`]: the platform-neutral multi-call driver. It owns buffer
//!   negotiation, sentinel termination and scoped handle release.
//! - [`unix`]: identity walk over a directory subtree, matching `(dev, ino)`.
//! - [`windows`]: `FindFirstFileNameW` / `FindNextFileNameW`.
//! - [`path_utils`]: path keys used to compare link names with manifest paths.
//!
//! The reconciler is written against [`LinkEnumerator`], so it never sees
//! which platform search is underneath.
//!
//! # Example
//!
//! ```no_run
//! use relink::links::{native_search, HardlinkEnumerator, LinkEnumerator, SearchScope};
//! use std::path::Path;
//!
//! let mut enumerator = HardlinkEnumerator::new(native_search(SearchScope::Volume));
//! for name in enumerator.enumerate(Path::new("/data/file.bin")).unwrap().iter() {
//!     println!("{}", name.display());
//! }
//! ```

pub mod path_utils;
pub mod search;
#[cfg(unix)]
pub mod unix;
#[cfg(windows)]
pub mod windows;

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub use search::{collect_links, FirstStep, LinkSearch, SearchStep};

#[cfg(not(any(unix, windows)))]
compile_error!("relink has no link search provider for this platform");

/// Initial name buffer length (in platform units) for worker enumerators.
pub const DEFAULT_BUFFER_LEN: usize = 512;

/// Error type for link enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    /// The queried path does not exist.
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// The queried path or its volume could not be accessed.
    #[error("access denied: {0}")]
    Access(PathBuf),

    /// Any other OS failure, with the raw error code when one is available.
    #[error("link search failed for {path}: {message}")]
    Other {
        path: PathBuf,
        code: Option<i32>,
        message: String,
    },
}

impl LinkError {
    /// Classify an I/O error raised while searching `path`.
    #[must_use]
    pub fn from_io(path: &Path, error: &io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::Access(path.to_path_buf()),
            _ => Self::Other {
                path: path.to_path_buf(),
                code: error.raw_os_error(),
                message: error.to_string(),
            },
        }
    }

    /// Classify a raw OS error code raised while searching `path`.
    #[must_use]
    pub fn from_os_code(path: &Path, code: i32) -> Self {
        Self::from_io(path, &io::Error::from_raw_os_error(code))
    }

    /// Path the failed query was made for.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound(p) | Self::Access(p) | Self::Other { path: p, .. } => p,
        }
    }

    /// Whether this is the expected "path does not exist" outcome.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Names the filesystem reported as sharing one file identity.
///
/// A snapshot taken at enumeration time: other processes (or other workers on
/// unrelated groups) may change the filesystem right after.
#[derive(Debug, Clone, Default)]
pub struct LinkSet {
    names: Vec<PathBuf>,
    keys: HashSet<String>,
}

impl LinkSet {
    /// Build a link set from names in the order they were reported.
    #[must_use]
    pub fn new(names: Vec<PathBuf>) -> Self {
        let keys = names.iter().map(|n| path_utils::path_key(n)).collect();
        Self { names, keys }
    }

    /// Number of names reported.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Whether `path` names the same directory entry as one in this set.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.keys.contains(&path_utils::path_key(path))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.names.iter().map(PathBuf::as_path)
    }

    #[must_use]
    pub fn into_names(self) -> Vec<PathBuf> {
        self.names
    }
}

impl PartialEq for LinkSet {
    fn eq(&self, other: &Self) -> bool {
        self.names == other.names
    }
}

impl Eq for LinkSet {}

/// Capability: list every name linking to the same file as `path`.
///
/// Takes `&mut self` so implementations can reuse buffers between calls.
/// One enumerator is owned by each worker.
pub trait LinkEnumerator {
    /// Enumerate the link names of `path`.
    ///
    /// # Errors
    ///
    /// [`LinkError::NotFound`] when `path` does not exist, [`LinkError::Access`]
    /// when it cannot be queried, [`LinkError::Other`] otherwise.
    fn enumerate(&mut self, path: &Path) -> Result<LinkSet, LinkError>;
}

/// [`LinkEnumerator`] over any [`LinkSearch`], owning a growable name buffer.
///
/// The buffer persists across calls and only ever grows, so a worker pays for
/// a long name once.
#[derive(Debug)]
pub struct HardlinkEnumerator<S: LinkSearch> {
    search: S,
    buffer: Vec<S::Unit>,
}

impl<S: LinkSearch> HardlinkEnumerator<S> {
    /// Create an enumerator with the default buffer length.
    #[must_use]
    pub fn new(search: S) -> Self {
        Self::with_buffer_len(search, DEFAULT_BUFFER_LEN)
    }

    /// Create an enumerator whose buffer starts at `len` units (minimum 1).
    #[must_use]
    pub fn with_buffer_len(search: S, len: usize) -> Self {
        Self {
            search,
            buffer: vec![S::Unit::default(); len.max(1)],
        }
    }

    /// Current buffer length in platform units.
    #[must_use]
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    #[must_use]
    pub fn search(&self) -> &S {
        &self.search
    }
}

impl<S: LinkSearch> LinkEnumerator for HardlinkEnumerator<S> {
    fn enumerate(&mut self, path: &Path) -> Result<LinkSet, LinkError> {
        collect_links(&self.search, path, &mut self.buffer).map(LinkSet::new)
    }
}

/// Where the native search looks for other names of a file.
///
/// Only meaningful for the Unix identity walk; Windows asks the volume
/// directly and ignores the scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchScope {
    /// Walk this directory subtree (the reconciliation root).
    Root(PathBuf),
    /// Walk the whole mounted volume the queried file lives on.
    Volume,
}

/// The link search for the current platform.
#[cfg(unix)]
pub type NativeSearch = unix::IdentityWalk;

/// The link search for the current platform.
#[cfg(windows)]
pub type NativeSearch = windows::FileNameSearch;

/// Construct the link search for the current platform.
#[cfg(unix)]
#[must_use]
pub fn native_search(scope: SearchScope) -> NativeSearch {
    unix::IdentityWalk::new(scope)
}

/// Construct the link search for the current platform.
#[cfg(windows)]
#[must_use]
pub fn native_search(_scope: SearchScope) -> NativeSearch {
    windows::FileNameSearch
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_io_not_found() {
        let err = io::Error::from(io::ErrorKind::NotFound);
        let link_err = LinkError::from_io(Path::new("/x"), &err);
        assert!(link_err.is_not_found());
        assert_eq!(link_err.path(), Path::new("/x"));
    }

    #[test]
    fn test_from_io_permission_denied() {
        let err = io::Error::from(io::ErrorKind::PermissionDenied);
        assert_eq!(
            LinkError::from_io(Path::new("/x"), &err),
            LinkError::Access(PathBuf::from("/x"))
        );
    }

    #[test]
    fn test_from_io_other_keeps_code() {
        let err = io::Error::from_raw_os_error(5);
        match LinkError::from_io(Path::new("/x"), &err) {
            LinkError::Other { code, .. } => assert_eq!(code, Some(5)),
            LinkError::Access(_) | LinkError::NotFound(_) => {
                // Some platforms map code 5 to a known kind; either way it is classified.
            }
        }
    }

    #[test]
    fn test_link_set_contains_by_key() {
        let set = LinkSet::new(vec![PathBuf::from("root/./a.txt"), PathBuf::from("root/b.txt")]);
        assert_eq!(set.len(), 2);
        assert!(set.contains(Path::new("root/a.txt")));
        assert!(set.contains(Path::new("root/b.txt")));
        assert!(!set.contains(Path::new("root/c.txt")));
    }

    #[test]
    fn test_link_set_preserves_order() {
        let names = vec![PathBuf::from("z"), PathBuf::from("a")];
        let set = LinkSet::new(names.clone());
        assert_eq!(set.into_names(), names);
    }

    #[test]
    fn test_enumerator_buffer_minimum() {
        struct Nothing;
        impl LinkSearch for Nothing {
            type Unit = u8;
            type Handle = ();
            fn find_first(&self, path: &Path, _: &mut [u8]) -> Result<FirstStep<()>, LinkError> {
                Err(LinkError::NotFound(path.to_path_buf()))
            }
            fn find_next(&self, _: &mut (), _: &mut [u8]) -> Result<SearchStep, LinkError> {
                Ok(SearchStep::End)
            }
            fn close(&self, _: ()) {}
            fn decode(&self, _: &Path, _: &[u8]) -> PathBuf {
                PathBuf::new()
            }
        }

        let mut enumerator = HardlinkEnumerator::with_buffer_len(Nothing, 0);
        assert_eq!(enumerator.buffer_len(), 1);
        assert!(enumerator.enumerate(Path::new("missing")).unwrap_err().is_not_found());
    }
}
