//! Link search by file identity for Unix.
//!
//! # Overview
//!
//! Unix has no call that lists the names of an inode, so this search derives
//! them: the queried path is the first name, then a lazy [`walkdir`] walk of
//! the search scope yields every other regular file with the same
//! `(dev, ino)`. The walk stops as soon as `nlink - 1` other names were found,
//! and never starts for files with a single link.
//!
//! Hardlinks cannot cross devices, so the walk starts at the mount holding
//! the file when that mount lies inside the root, and never descends into a
//! directory on another device. It does not follow symlinks. Unreadable
//! directories are skipped.
//!
//! Each group whose representative has more than one link costs one walk,
//! so the size of the root bounds the cost of a run. With the default root
//! `/` that is a walk of the whole mount per linked group; point `--root`
//! at the tree the manifest covers.
//!
//! Names are handed back through the same buffer protocol as the Windows
//! search: raw path bytes, with `Grow` when a path does not fit.

use std::ffi::OsStr;
use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use walkdir::{DirEntry, FilterEntry, WalkDir};

use super::path_utils::path_key;
use super::search::{FirstStep, LinkSearch, SearchStep};
use super::{LinkError, SearchScope};

/// Identity-walk link search.
#[derive(Debug, Clone)]
pub struct IdentityWalk {
    scope: SearchScope,
}

impl IdentityWalk {
    #[must_use]
    pub fn new(scope: SearchScope) -> Self {
        Self { scope }
    }

    #[must_use]
    pub fn scope(&self) -> &SearchScope {
        &self.scope
    }

    /// Name to report first for `path`, plus the directory to walk.
    fn anchor(&self, path: &Path, dev: u64) -> Result<(PathBuf, PathBuf), LinkError> {
        match &self.scope {
            SearchScope::Root(root) => {
                let mount = mount_root(path, dev);
                let walk = if !mount.as_os_str().is_empty() && mount.starts_with(root) {
                    mount
                } else {
                    root.clone()
                };
                Ok((path.to_path_buf(), walk))
            }
            SearchScope::Volume => {
                let absolute = absolute_entry(path).map_err(|e| LinkError::from_io(path, &e))?;
                let mount = mount_root(&absolute, dev);
                Ok((absolute, mount))
            }
        }
    }
}

/// Canonicalize the parent of `path` but keep its final component, so a
/// symlink is reported as itself rather than as its target.
fn absolute_entry(path: &Path) -> std::io::Result<PathBuf> {
    let name = path.file_name();
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    match (parent, name) {
        (Some(parent), Some(name)) => Ok(fs::canonicalize(parent)?.join(name)),
        (None, Some(name)) => Ok(std::env::current_dir()?.join(name)),
        _ => fs::canonicalize(path),
    }
}

/// Topmost ancestor of `path` that is still on device `dev`.
fn mount_root(path: &Path, dev: u64) -> PathBuf {
    let mut root = path.parent().unwrap_or(path).to_path_buf();
    for ancestor in path.ancestors().skip(1) {
        match fs::symlink_metadata(ancestor) {
            Ok(meta) if meta.dev() == dev => root = ancestor.to_path_buf(),
            _ => break,
        }
    }
    root
}

/// Whether the walk should keep `entry`: directories only when they are on
/// `dev`, everything else always. The walk root is always kept.
fn on_device(entry: &DirEntry, dev: u64) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return true;
    }
    entry.metadata().is_ok_and(|meta| meta.dev() == dev)
}

/// Copy `name` into `buf`, or report the length it needs.
fn put(name: &OsStr, buf: &mut [u8]) -> Result<usize, usize> {
    let bytes = name.as_bytes();
    match buf.get_mut(..bytes.len()) {
        Some(slot) => {
            slot.copy_from_slice(bytes);
            Ok(bytes.len())
        }
        None => Err(bytes.len()),
    }
}

type DevicePrune = Box<dyn FnMut(&DirEntry) -> bool>;

/// Open identity walk.
pub struct WalkHandle {
    dev: u64,
    ino: u64,
    query_key: String,
    /// Other names still expected, from the link count.
    remaining: u64,
    entries: FilterEntry<walkdir::IntoIter, DevicePrune>,
    /// A found name that did not fit the buffer yet.
    pending: Option<PathBuf>,
    visited: u64,
}

impl std::fmt::Debug for WalkHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalkHandle")
            .field("dev", &self.dev)
            .field("ino", &self.ino)
            .field("remaining", &self.remaining)
            .field("pending", &self.pending)
            .field("visited", &self.visited)
            .finish_non_exhaustive()
    }
}

impl WalkHandle {
    /// Advance the walk to the next other name of the file.
    fn advance(&mut self) -> Option<PathBuf> {
        if self.remaining == 0 {
            return None;
        }
        for entry in self.entries.by_ref() {
            let entry = match entry {
                Ok(entry) => {
                    self.visited += 1;
                    entry
                }
                Err(e) => {
                    log::debug!("Skipping unreadable entry during link search: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(meta) = entry.metadata() else {
                continue;
            };
            if meta.dev() != self.dev || meta.ino() != self.ino {
                continue;
            }
            if path_key(entry.path()) == self.query_key {
                continue;
            }
            self.remaining -= 1;
            if self.remaining == 0 {
                log::debug!("Link search found every name after {} entries", self.visited);
            }
            return Some(entry.into_path());
        }
        if self.remaining > 0 {
            log::debug!(
                "Link search ended after {} entries with {} name(s) outside the search scope",
                self.visited,
                self.remaining
            );
        }
        None
    }
}

impl LinkSearch for IdentityWalk {
    type Unit = u8;
    type Handle = WalkHandle;

    fn find_first(&self, path: &Path, buf: &mut [u8]) -> Result<FirstStep<WalkHandle>, LinkError> {
        let meta = fs::symlink_metadata(path).map_err(|e| LinkError::from_io(path, &e))?;
        let (first, walk_root) = self.anchor(path, meta.dev())?;

        let len = match put(first.as_os_str(), buf) {
            Ok(len) => len,
            Err(required) => return Ok(FirstStep::Grow(required)),
        };

        let remaining = if meta.is_dir() {
            0
        } else {
            meta.nlink().saturating_sub(1)
        };
        log::trace!(
            "{}: nlink {}, searching {}",
            path.display(),
            meta.nlink(),
            walk_root.display()
        );

        let dev = meta.dev();
        let handle = WalkHandle {
            dev,
            ino: meta.ino(),
            query_key: path_key(&first),
            remaining,
            entries: WalkDir::new(walk_root)
                .follow_links(false)
                .into_iter()
                .filter_entry(Box::new(move |entry: &DirEntry| on_device(entry, dev))),
            pending: None,
            visited: 0,
        };
        Ok(FirstStep::Found { handle, len })
    }

    fn find_next(&self, handle: &mut WalkHandle, buf: &mut [u8]) -> Result<SearchStep, LinkError> {
        if handle.pending.is_none() {
            handle.pending = handle.advance();
        }
        let Some(name) = handle.pending.as_ref() else {
            return Ok(SearchStep::End);
        };
        match put(name.as_os_str(), buf) {
            Ok(len) => {
                handle.pending = None;
                Ok(SearchStep::Name(len))
            }
            Err(required) => Ok(SearchStep::Grow(required)),
        }
    }

    fn close(&self, handle: WalkHandle) {
        log::trace!("Closing link search for inode {}", handle.ino);
        drop(handle);
    }

    fn decode(&self, _query: &Path, name: &[u8]) -> PathBuf {
        PathBuf::from(OsStr::from_bytes(name))
    }
}
