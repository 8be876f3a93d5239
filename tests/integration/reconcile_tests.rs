#![cfg(unix)]

use super::common::{link_count, same_file, Fixture};
use relink::links::{native_search, HardlinkEnumerator, NativeSearch, SearchScope};
use relink::manifest::DuplicateGroup;
use relink::reconcile::linker::{FsLinker, LinkCreateError};
use relink::reconcile::{FailureReason, GroupReconciler, Reconcile, ReconciliationOutcome};
use std::fs;

fn reconciler(fixture: &Fixture, linker: FsLinker) -> GroupReconciler<HardlinkEnumerator<NativeSearch>, FsLinker> {
    let search = native_search(SearchScope::Root(fixture.root()));
    GroupReconciler::new(fixture.root(), HardlinkEnumerator::new(search), linker)
}

fn group(members: &[&str]) -> DuplicateGroup {
    DuplicateGroup::new("h1", "7", members.iter().map(|m| (*m).to_string()).collect())
}

#[test]
fn test_fully_linked_group_is_left_alone() {
    let fixture = Fixture::new();
    fixture.file("a.txt", "content");
    fixture.link("a.txt", "b.txt");
    fixture.link("a.txt", "sub/c.txt");

    let mut reconciler = reconciler(&fixture, FsLinker::new());
    let group = group(&["a.txt", "b.txt", "sub/c.txt"]);

    assert_eq!(reconciler.reconcile(&group), ReconciliationOutcome::AlreadyComplete);
    assert_eq!(reconciler.reconcile(&group), ReconciliationOutcome::AlreadyComplete);
    assert_eq!(link_count(&fixture.path("a.txt")), 3);
}

#[test]
fn test_single_file_gets_every_missing_link() {
    let fixture = Fixture::new();
    let a = fixture.file("a.txt", "content");
    fs::create_dir_all(fixture.path("x/y")).unwrap();

    let mut reconciler = reconciler(&fixture, FsLinker::new());
    let outcome = reconciler.reconcile(&group(&["a.txt", "b.txt", "x/y/c.txt"]));

    assert_eq!(outcome, ReconciliationOutcome::LinkedMissing(2));
    assert!(same_file(&a, &fixture.path("b.txt")));
    assert!(same_file(&a, &fixture.path("x/y/c.txt")));

    // A second pass finds nothing to do.
    let again = reconciler.reconcile(&group(&["a.txt", "b.txt", "x/y/c.txt"]));
    assert_eq!(again, ReconciliationOutcome::AlreadyComplete);
}

#[test]
fn test_later_member_can_be_representative() {
    let fixture = Fixture::new();
    let b = fixture.file("b.txt", "content");

    let mut reconciler = reconciler(&fixture, FsLinker::new());
    let outcome = reconciler.reconcile(&group(&["a.txt", "b.txt", "c.txt"]));

    assert_eq!(outcome, ReconciliationOutcome::LinkedMissing(2));
    assert!(same_file(&b, &fixture.path("a.txt")));
    assert!(same_file(&b, &fixture.path("c.txt")));
}

#[test]
fn test_nothing_on_disk_is_all_missing() {
    let fixture = Fixture::new();

    let mut reconciler = reconciler(&fixture, FsLinker::new());
    let outcome = reconciler.reconcile(&group(&["a.txt", "b.txt"]));

    assert_eq!(
        outcome,
        ReconciliationOutcome::AllMissing {
            candidates: vec![fixture.path("a.txt"), fixture.path("b.txt")],
        }
    );
    assert!(fs::read_dir(fixture.root()).unwrap().next().is_none());
}

#[test]
fn test_unlinked_copy_is_reported_not_replaced() {
    let fixture = Fixture::new();
    fixture.file("a.txt", "content");
    fixture.file("b.txt", "content");

    let mut reconciler = reconciler(&fixture, FsLinker::new());
    let outcome = reconciler.reconcile(&group(&["a.txt", "b.txt"]));

    match outcome {
        ReconciliationOutcome::PartialFailure(FailureReason::Links { linked, failures, .. }) => {
            assert_eq!(linked, 0);
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].path, fixture.path("b.txt"));
            assert_eq!(failures[0].error, LinkCreateError::AlreadyExists);
        }
        other => panic!("expected link failure, got {other:?}"),
    }
    assert!(!same_file(&fixture.path("a.txt"), &fixture.path("b.txt")));
}

#[test]
fn test_missing_parent_does_not_block_other_links() {
    let fixture = Fixture::new();
    let a = fixture.file("a.txt", "content");

    let mut reconciler = reconciler(&fixture, FsLinker::new());
    let outcome = reconciler.reconcile(&group(&["a.txt", "gone/b.txt", "c.txt"]));

    match outcome {
        ReconciliationOutcome::PartialFailure(FailureReason::Links { linked, failures, .. }) => {
            assert_eq!(linked, 1);
            assert_eq!(failures[0].path, fixture.path("gone/b.txt"));
            assert_eq!(failures[0].error, LinkCreateError::ParentMissing);
        }
        other => panic!("expected link failure, got {other:?}"),
    }
    assert!(same_file(&a, &fixture.path("c.txt")));
    assert!(!fixture.path("gone").exists());
}

#[test]
fn test_dry_run_creates_nothing() {
    let fixture = Fixture::new();
    fixture.file("a.txt", "content");

    let mut reconciler = reconciler(&fixture, FsLinker::dry_run());
    let outcome = reconciler.reconcile(&group(&["a.txt", "b.txt", "c.txt"]));

    assert_eq!(outcome, ReconciliationOutcome::LinkedMissing(2));
    assert!(!fixture.path("b.txt").exists());
    assert!(!fixture.path("c.txt").exists());
}

#[test]
fn test_tiny_buffer_gives_same_outcome() {
    let fixture = Fixture::new();
    fixture.file("deeply/nested/directory/a.txt", "content");
    fixture.link("deeply/nested/directory/a.txt", "b.txt");

    let search = native_search(SearchScope::Root(fixture.root()));
    let mut reconciler = GroupReconciler::new(
        fixture.root(),
        HardlinkEnumerator::with_buffer_len(search, 1),
        FsLinker::new(),
    );
    let outcome = reconciler.reconcile(&group(&["deeply/nested/directory/a.txt", "b.txt", "c.txt"]));

    assert_eq!(outcome, ReconciliationOutcome::LinkedMissing(1));
    assert!(same_file(&fixture.path("b.txt"), &fixture.path("c.txt")));
}
