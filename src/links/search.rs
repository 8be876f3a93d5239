//! Multi-call link-name search with buffer negotiation.
//!
//! # Overview
//!
//! OS link enumeration is a cursor protocol: a first call returns one name
//! and an opaque handle, each next call returns one more name, and a sentinel
//! ends the sequence. Every call writes into a caller-supplied buffer and may
//! instead report the buffer length it needs.
//!
//! [`LinkSearch`] describes one platform's version of that protocol and
//! [`collect_links`] drives it:
//!
//! - `Grow(n)` resizes the buffer to `n` units and retries the same step
//! - `End` finishes successfully
//! - the handle sits in a guard that releases it exactly once, on success,
//!   error or unwind

use std::fmt::Debug;
use std::path::{Path, PathBuf};

use super::LinkError;

/// Outcome of the first search call.
#[derive(Debug)]
pub enum FirstStep<H> {
    /// The first name (of `len` units) is in the buffer and `handle` is open.
    Found { handle: H, len: usize },
    /// The buffer must hold at least this many units; nothing was opened.
    Grow(usize),
}

/// Outcome of a continuation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStep {
    /// A name of this many units is in the buffer.
    Name(usize),
    /// The buffer must hold at least this many units; retry the same step.
    Grow(usize),
    /// No more names.
    End,
}

/// One platform's link-name cursor.
pub trait LinkSearch {
    /// Buffer element: UTF-16 code units on Windows, bytes on Unix.
    type Unit: Copy + Default + Debug;
    /// Open search state between calls.
    type Handle;

    /// Start a search for `path`, writing the first name into `buf`.
    ///
    /// # Errors
    ///
    /// Any failure other than a too-small buffer.
    fn find_first(&self, path: &Path, buf: &mut [Self::Unit])
        -> Result<FirstStep<Self::Handle>, LinkError>;

    /// Write the next name into `buf`.
    ///
    /// # Errors
    ///
    /// Any failure other than a too-small buffer or the end of the sequence.
    fn find_next(
        &self,
        handle: &mut Self::Handle,
        buf: &mut [Self::Unit],
    ) -> Result<SearchStep, LinkError>;

    /// Release a handle returned by [`find_first`](Self::find_first).
    fn close(&self, handle: Self::Handle);

    /// Turn a name reported for `query` into a path.
    fn decode(&self, query: &Path, name: &[Self::Unit]) -> PathBuf;
}

/// An open search; closes its handle when dropped.
struct OpenSearch<'s, S: LinkSearch> {
    search: &'s S,
    handle: Option<S::Handle>,
}

impl<S: LinkSearch> OpenSearch<'_, S> {
    fn next(&mut self, buf: &mut [S::Unit]) -> Result<SearchStep, LinkError> {
        match self.handle.as_mut() {
            Some(handle) => self.search.find_next(handle, buf),
            None => Ok(SearchStep::End),
        }
    }
}

impl<S: LinkSearch> Drop for OpenSearch<'_, S> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.search.close(handle);
        }
    }
}

/// Resize `buf` to the length the OS asked for.
///
/// Always grows by at least one unit so a misreported size cannot spin.
fn grow<U: Copy + Default>(buf: &mut Vec<U>, required: usize) {
    let len = required.max(buf.len() + 1);
    log::trace!("Growing link name buffer from {} to {} units", buf.len(), len);
    buf.resize(len, U::default());
}

/// Collect every link name of `path` using `search`.
///
/// `buf` is reused and grown as needed; after the call it is at least as
/// large as the longest name seen.
///
/// # Errors
///
/// Propagates the first error from the search. The handle is released
/// before returning either way.
pub fn collect_links<S: LinkSearch>(
    search: &S,
    path: &Path,
    buf: &mut Vec<S::Unit>,
) -> Result<Vec<PathBuf>, LinkError> {
    if buf.is_empty() {
        buf.push(S::Unit::default());
    }

    let (handle, len) = loop {
        match search.find_first(path, buf)? {
            FirstStep::Found { handle, len } => break (handle, len),
            FirstStep::Grow(required) => grow(buf, required),
        }
    };

    let mut open = OpenSearch {
        search,
        handle: Some(handle),
    };
    let mut names = vec![search.decode(path, &buf[..len])];

    loop {
        match open.next(buf)? {
            SearchStep::Name(len) => names.push(search.decode(path, &buf[..len])),
            SearchStep::Grow(required) => grow(buf, required),
            SearchStep::End => break,
        }
    }

    log::trace!("{}: {} link name(s)", path.display(), names.len());
    Ok(names)
}
