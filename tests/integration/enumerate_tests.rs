use super::common::Fixture;
use relink::links::{native_search, HardlinkEnumerator, LinkEnumerator, SearchScope};
use relink::print_links;

#[test]
fn test_single_link_file_lists_itself() {
    let fixture = Fixture::new();
    let a = fixture.file("a.txt", "alone");

    let mut out = Vec::new();
    let count = print_links(&a, &mut out).unwrap();

    assert_eq!(count, 1);
    let text = String::from_utf8(out).unwrap();
    assert_eq!(text.lines().count(), 1);
    assert!(text.trim_end().ends_with("a.txt"));
}

#[cfg(unix)]
#[test]
fn test_every_name_is_printed() {
    let fixture = Fixture::new();
    let a = fixture.file("a.txt", "shared");
    fixture.link("a.txt", "nested/b.txt");

    let mut out = Vec::new();
    let count = print_links(&a, &mut out).unwrap();

    assert_eq!(count, 2);
    let text = String::from_utf8(out).unwrap();
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("a.txt"));
    assert!(lines[1].ends_with("b.txt"));
}

#[test]
fn test_missing_path_is_an_error() {
    let fixture = Fixture::new();
    let mut out = Vec::new();
    let err = print_links(&fixture.path("nope.txt"), &mut out).unwrap_err();
    assert!(format!("{err:#}").contains("nope.txt"));
    assert!(out.is_empty());
}

#[cfg(unix)]
#[test]
fn test_root_scope_reports_query_path_first() {
    let fixture = Fixture::new();
    fixture.file("z.txt", "shared");
    fixture.link("z.txt", "a.txt");
    fixture.link("z.txt", "m/b.txt");

    let mut enumerator = HardlinkEnumerator::new(native_search(SearchScope::Root(fixture.root())));
    let links = enumerator.enumerate(&fixture.path("m/b.txt")).unwrap();

    assert_eq!(links.len(), 3);
    assert_eq!(links.iter().next(), Some(fixture.path("m/b.txt").as_path()));
    assert!(links.contains(&fixture.path("a.txt")));
    assert!(links.contains(&fixture.path("z.txt")));
}
