//! Per-group filesystem reconciliation.
//!
//! # Overview
//!
//! For one [`DuplicateGroup`], [`GroupReconciler::reconcile`]:
//!
//! 1. **Locate**: enumerates members in manifest order. The first member that
//!    exists becomes the representative and its link set the baseline.
//!    `NotFound` moves on to the next member; any other error aborts the
//!    group. If nothing exists the group is [`ReconciliationOutcome::AllMissing`].
//! 2. **Compare**: if the link count equals the member count the group is
//!    already complete. Otherwise every member not in the link set is missing.
//! 3. **Repair**: each missing member gets a hardlink to the representative.
//!    Failures are collected per link and never stop the remaining links.
//!
//! The representative is the first existing member, not the newest or
//! largest: the manifest carries nothing better to choose by, and the first
//! is reproducible.
//!
//! # Example
//!
//! ```no_run
//! use relink::links::{native_search, HardlinkEnumerator, SearchScope};
//! use relink::manifest::DuplicateGroup;
//! use relink::reconcile::{linker::FsLinker, GroupReconciler, Reconcile};
//!
//! let root = std::path::PathBuf::from("/data");
//! let enumerator = HardlinkEnumerator::new(native_search(SearchScope::Root(root.clone())));
//! let mut reconciler = GroupReconciler::new(root, enumerator, FsLinker::new());
//!
//! let group = DuplicateGroup::new("h1", "100", vec!["a.txt".into(), "b.txt".into()]);
//! println!("{}", reconciler.reconcile(&group));
//! ```

pub mod linker;

use std::fmt;
use std::path::{Path, PathBuf};

use crate::links::path_utils::{path_key, resolve_member};
use crate::links::{LinkEnumerator, LinkError, LinkSet};
use crate::manifest::DuplicateGroup;

use linker::{LinkCreateError, LinkCreator};

/// One missing member that could not be linked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkFailure {
    /// Path the link should have been created at
    pub path: PathBuf,
    /// Why it was not
    pub error: LinkCreateError,
}

/// Why a group ended in [`ReconciliationOutcome::PartialFailure`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Enumerating a member failed with something other than `NotFound`.
    Enumerate { path: PathBuf, error: LinkError },
    /// Some missing links could not be created.
    Links {
        representative: PathBuf,
        linked: usize,
        failures: Vec<LinkFailure>,
    },
    /// The group reached reconciliation with fewer than two members.
    Undersized { members: usize },
}

/// Result of reconciling one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationOutcome {
    /// Every member already shares one file identity.
    AlreadyComplete,
    /// This many missing links were created (or planned, in dry-run).
    LinkedMissing(usize),
    /// No member exists on disk; the manifest is stale for this group.
    AllMissing { candidates: Vec<PathBuf> },
    /// The group could not be brought to full linkage.
    PartialFailure(FailureReason),
}

impl ReconciliationOutcome {
    /// Whether this outcome should count against a clean exit.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::AllMissing { .. } | Self::PartialFailure(_))
    }

    /// Links created by this reconciliation.
    #[must_use]
    pub fn links_created(&self) -> usize {
        match self {
            Self::LinkedMissing(n) => *n,
            Self::PartialFailure(FailureReason::Links { linked, .. }) => *linked,
            _ => 0,
        }
    }
}

impl fmt::Display for ReconciliationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyComplete => write!(f, "all hardlinks ok"),
            Self::LinkedMissing(n) => write!(f, "created {n} missing link(s)"),
            Self::AllMissing { candidates } => {
                write!(f, "all files of the group are missing on disk:")?;
                for candidate in candidates {
                    write!(f, "\n  {}", candidate.display())?;
                }
                Ok(())
            }
            Self::PartialFailure(FailureReason::Enumerate { path, error }) => {
                write!(f, "cannot enumerate hardlinks of {}: {error}", path.display())
            }
            Self::PartialFailure(FailureReason::Links {
                representative,
                linked,
                failures,
            }) => {
                write!(
                    f,
                    "linked {linked}, failed {} (representative {})",
                    failures.len(),
                    representative.display()
                )?;
                for failure in failures {
                    write!(f, "\n  {}: {}", failure.path.display(), failure.error)?;
                }
                Ok(())
            }
            Self::PartialFailure(FailureReason::Undersized { members }) => {
                write!(f, "internal error: group has only {members} member(s)")
            }
        }
    }
}

/// Anything that can reconcile groups; one instance per worker.
pub trait Reconcile {
    /// Bring `group` to full linkage as far as possible.
    ///
    /// [`GroupReconciler`] treats a group as complete when the
    /// representative's link count equals the member count. That is a count
    /// check, not a membership check: a name outside the group can make up
    /// for a missing member.
    fn reconcile(&mut self, group: &DuplicateGroup) -> ReconciliationOutcome;
}

/// The reconciler: resolves members under `root`, enumerates with `E`,
/// creates links with `L`.
#[derive(Debug)]
pub struct GroupReconciler<E, L> {
    root: PathBuf,
    enumerator: E,
    linker: L,
}

impl<E: LinkEnumerator, L: LinkCreator> GroupReconciler<E, L> {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, enumerator: E, linker: L) -> Self {
        Self {
            root: root.into(),
            enumerator,
            linker,
        }
    }

    /// Root that member paths are resolved against.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Step 1: first existing member and its link set.
    fn locate(&mut self, group: &DuplicateGroup) -> Result<(PathBuf, LinkSet), ReconciliationOutcome> {
        let mut candidates = Vec::with_capacity(group.len());
        for member in &group.members {
            let path = resolve_member(&self.root, member);
            match self.enumerator.enumerate(&path) {
                Ok(links) => return Ok((path, links)),
                Err(LinkError::NotFound(_)) => {
                    log::trace!("group {}: {} not on disk", group.hash, path.display());
                    candidates.push(path);
                }
                Err(error) => {
                    return Err(ReconciliationOutcome::PartialFailure(
                        FailureReason::Enumerate { path, error },
                    ))
                }
            }
        }
        Err(ReconciliationOutcome::AllMissing { candidates })
    }

    /// Step 3: link every member absent from `links` to `representative`.
    fn link_missing(
        &self,
        group: &DuplicateGroup,
        representative: &Path,
        links: &LinkSet,
    ) -> ReconciliationOutcome {
        let representative_key = path_key(representative);
        let mut linked = 0;
        let mut failures = Vec::new();

        for path in group.member_paths(&self.root) {
            if links.contains(&path) || path_key(&path) == representative_key {
                continue;
            }

            let parent_exists = path
                .parent()
                .is_none_or(|p| p.as_os_str().is_empty() || p.is_dir());
            let result = if parent_exists {
                self.linker.create(representative, &path)
            } else {
                Err(LinkCreateError::ParentMissing)
            };

            match result {
                Ok(()) => linked += 1,
                Err(error) => failures.push(LinkFailure { path, error }),
            }
        }

        if failures.is_empty() {
            ReconciliationOutcome::LinkedMissing(linked)
        } else {
            ReconciliationOutcome::PartialFailure(FailureReason::Links {
                representative: representative.to_path_buf(),
                linked,
                failures,
            })
        }
    }
}

impl<E: LinkEnumerator, L: LinkCreator> Reconcile for GroupReconciler<E, L> {
    fn reconcile(&mut self, group: &DuplicateGroup) -> ReconciliationOutcome {
        if !group.has_duplicates() {
            return ReconciliationOutcome::PartialFailure(FailureReason::Undersized {
                members: group.len(),
            });
        }

        let (representative, links) = match self.locate(group) {
            Ok(found) => found,
            Err(outcome) => return outcome,
        };

        if links.len() == group.len() {
            return ReconciliationOutcome::AlreadyComplete;
        }

        log::debug!(
            "group {}: linking to {} ({} existing name(s))",
            group.hash,
            representative.display(),
            links.len()
        );
        self.link_missing(group, &representative, &links)
    }
}
