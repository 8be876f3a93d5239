//! Manifest input.
//!
//! This module provides:
//! - [`record`]: tab-separated record decoding (`hash`, `size`, `path`)
//! - [`groups`]: streaming duplicate grouping over hash-sorted records
//!
//! The manifest is produced and sorted upstream; nothing here hashes files
//! or walks directories.

pub mod groups;
pub mod record;

pub use groups::{DuplicateGroup, GroupStream};
pub use record::{ManifestError, ManifestReader, ManifestRecord, FIELDS_PER_RECORD};
