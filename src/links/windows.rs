//! Link search using `FindFirstFileNameW` / `FindNextFileNameW`.
//!
//! NTFS keeps the list of names for each file record, and these calls walk
//! it. Names come back relative to the volume root (`\dir\file.txt`); they
//! are rebased onto the prefix and root of the queried path so they compare
//! against manifest paths joined onto the reconciliation root.
//!
//! Buffer negotiation: on `ERROR_MORE_DATA` the string length parameter holds
//! the required length in UTF-16 units. `ERROR_HANDLE_EOF` from the next call
//! is the end-of-sequence sentinel.

use std::ffi::OsString;
use std::iter;
use std::os::windows::ffi::{OsStrExt, OsStringExt};
use std::path::{Component, Path, PathBuf};

use windows_sys::Win32::Foundation::{
    GetLastError, ERROR_HANDLE_EOF, ERROR_MORE_DATA, HANDLE, INVALID_HANDLE_VALUE,
};
use windows_sys::Win32::Storage::FileSystem::{FindClose, FindFirstFileNameW, FindNextFileNameW};

use super::search::{FirstStep, LinkSearch, SearchStep};
use super::LinkError;

/// Native NTFS link search.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileNameSearch;

/// Open `FindFirstFileNameW` search.
#[derive(Debug)]
pub struct FindHandle {
    raw: HANDLE,
    query: PathBuf,
}

fn to_wide(path: &Path) -> Vec<u16> {
    path.as_os_str().encode_wide().chain(iter::once(0)).collect()
}

fn capacity(buf: &[u16]) -> u32 {
    u32::try_from(buf.len()).unwrap_or(u32::MAX)
}

/// Length of the name in `buf`, stopping at the terminating NUL if the
/// reported length includes it.
fn name_len(buf: &[u16], reported: u32) -> usize {
    let reported = (reported as usize).min(buf.len());
    buf[..reported]
        .iter()
        .position(|&unit| unit == 0)
        .unwrap_or(reported)
}

/// `\\?\C:\`, `C:\` or `\` of the queried path.
fn volume_of(query: &Path) -> PathBuf {
    query
        .components()
        .take_while(|c| matches!(c, Component::Prefix(_) | Component::RootDir))
        .collect()
}

impl LinkSearch for FileNameSearch {
    type Unit = u16;
    type Handle = FindHandle;

    fn find_first(&self, path: &Path, buf: &mut [u16]) -> Result<FirstStep<FindHandle>, LinkError> {
        let name = to_wide(path);
        let mut len = capacity(buf);

        // SAFETY: `name` is NUL-terminated and outlives the call; `buf` is
        // valid for writes of `len` units.
        let raw = unsafe { FindFirstFileNameW(name.as_ptr(), 0, &mut len, buf.as_mut_ptr()) };
        if raw == INVALID_HANDLE_VALUE {
            // SAFETY: reads the calling thread's last-error value.
            let code = unsafe { GetLastError() };
            if code == ERROR_MORE_DATA {
                return Ok(FirstStep::Grow(len as usize));
            }
            return Err(LinkError::from_os_code(path, code as i32));
        }

        Ok(FirstStep::Found {
            handle: FindHandle {
                raw,
                query: path.to_path_buf(),
            },
            len: name_len(buf, len),
        })
    }

    fn find_next(&self, handle: &mut FindHandle, buf: &mut [u16]) -> Result<SearchStep, LinkError> {
        let mut len = capacity(buf);

        // SAFETY: `handle.raw` is an open search handle owned by this search;
        // `buf` is valid for writes of `len` units.
        let ok = unsafe { FindNextFileNameW(handle.raw, &mut len, buf.as_mut_ptr()) };
        if ok != 0 {
            return Ok(SearchStep::Name(name_len(buf, len)));
        }

        // SAFETY: reads the calling thread's last-error value.
        match unsafe { GetLastError() } {
            ERROR_HANDLE_EOF => Ok(SearchStep::End),
            ERROR_MORE_DATA => Ok(SearchStep::Grow(len as usize)),
            code => Err(LinkError::from_os_code(&handle.query, code as i32)),
        }
    }

    fn close(&self, handle: FindHandle) {
        // SAFETY: the handle came from FindFirstFileNameW and is closed once,
        // here, because `close` takes it by value.
        if unsafe { FindClose(handle.raw) } == 0 {
            log::warn!("FindClose failed for {}", handle.query.display());
        }
    }

    fn decode(&self, query: &Path, name: &[u16]) -> PathBuf {
        let name = PathBuf::from(OsString::from_wide(name));
        volume_of(query).join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::links::{HardlinkEnumerator, LinkEnumerator};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_name_len_stops_at_nul() {
        let buf = [b'a' as u16, b'b' as u16, 0, b'x' as u16];
        assert_eq!(name_len(&buf, 3), 2);
        assert_eq!(name_len(&buf, 2), 2);
        assert_eq!(name_len(&buf, 99), 2);
    }

    #[test]
    fn test_volume_of_drive_path() {
        assert_eq!(volume_of(Path::new(r"C:\data\a.txt")), PathBuf::from(r"C:\"));
        assert_eq!(volume_of(Path::new(r"\data\a.txt")), PathBuf::from(r"\"));
    }

    #[test]
    fn test_enumerates_hardlinks() {
        let dir = TempDir::new().unwrap();
        // Long, prefixed form so names compare against what NTFS reports.
        let base = fs::canonicalize(dir.path()).unwrap();
        let a = base.join("a.txt");
        let b = base.join("b.txt");
        fs::write(&a, "content").unwrap();
        if fs::hard_link(&a, &b).is_err() {
            eprintln!("Skipping: volume does not support hardlinks");
            return;
        }

        let mut enumerator = HardlinkEnumerator::with_buffer_len(FileNameSearch, 2);
        let links = enumerator.enumerate(&a).unwrap();
        assert_eq!(links.len(), 2);
        assert!(links.contains(&a));
        assert!(links.contains(&b));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let mut enumerator = HardlinkEnumerator::new(FileNameSearch);
        let err = enumerator.enumerate(&dir.path().join("gone.txt")).unwrap_err();
        assert!(err.is_not_found());
    }
}
