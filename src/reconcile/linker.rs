//! Hardlink creation.
//!
//! # Overview
//!
//! [`LinkCreator`] is the one filesystem mutation the reconciler performs:
//! make `new` another name for the file at `existing`. [`FsLinker`] does it
//! for real, or only logs the intent in dry-run mode.
//!
//! Creation is never retried. A name that already exists is reported as
//! [`LinkCreateError::AlreadyExists`] and left untouched.
//!
//! # Example
//!
//! ```no_run
//! use relink::reconcile::linker::{FsLinker, LinkCreator};
//! use std::path::Path;
//!
//! let linker = FsLinker::new();
//! linker.create(Path::new("/data/a.bin"), Path::new("/data/copy/a.bin")).unwrap();
//! ```

use std::fs;
use std::io;
use std::path::Path;

use thiserror::Error;

/// Error type for link creation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkCreateError {
    /// Something already exists at the new path.
    #[error("target already exists")]
    AlreadyExists,

    /// The directory that should hold the new link does not exist.
    #[error("parent directory missing")]
    ParentMissing,

    /// Permission denied for the new path or its directory.
    #[error("permission denied - try running with elevated privileges")]
    Access,

    /// Any other failure (cross-device, link limit, representative vanished, ...).
    #[error("{message}")]
    Other { code: Option<i32>, message: String },
}

impl LinkCreateError {
    /// Classify an I/O error from `hard_link`.
    #[must_use]
    pub fn from_io(error: &io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::AlreadyExists => Self::AlreadyExists,
            io::ErrorKind::PermissionDenied => Self::Access,
            _ => Self::Other {
                code: error.raw_os_error(),
                message: error.to_string(),
            },
        }
    }
}

/// Capability: create a hardlink at `new` for the file at `existing`.
pub trait LinkCreator {
    /// Create the link.
    ///
    /// # Errors
    ///
    /// See [`LinkCreateError`].
    fn create(&self, existing: &Path, new: &Path) -> Result<(), LinkCreateError>;

    /// Whether links are only reported, not created.
    fn is_dry_run(&self) -> bool {
        false
    }
}

/// Filesystem link creator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FsLinker {
    dry_run: bool,
}

impl FsLinker {
    /// Create links for real.
    #[must_use]
    pub fn new() -> Self {
        Self { dry_run: false }
    }

    /// Log each link instead of creating it.
    #[must_use]
    pub fn dry_run() -> Self {
        Self { dry_run: true }
    }

    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

impl LinkCreator for FsLinker {
    fn create(&self, existing: &Path, new: &Path) -> Result<(), LinkCreateError> {
        if self.dry_run {
            log::info!(
                "[dry-run] would link {} -> {}",
                new.display(),
                existing.display()
            );
            return Ok(());
        }
        fs::hard_link(existing, new).map_err(|e| LinkCreateError::from_io(&e))?;
        log::debug!("Linked {} -> {}", new.display(), existing.display());
        Ok(())
    }

    fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}
