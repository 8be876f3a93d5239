use super::common::Fixture;
use clap::Parser;
use relink::cli::Cli;
use relink::error::ExitCode;
use relink::run_app;
use std::ffi::OsString;
use std::fs;
use std::path::Path;

fn cli(fixture: &Fixture, manifest: &Path, extra: &[&str]) -> Cli {
    let mut args: Vec<OsString> = vec![
        "relink".into(),
        "-f".into(),
        manifest.as_os_str().to_owned(),
        "-r".into(),
        fixture.root().into_os_string(),
        "-w".into(),
        "2".into(),
        "-q".into(),
    ];
    args.extend(extra.iter().map(OsString::from));
    Cli::try_parse_from(args).unwrap()
}

#[test]
fn test_run_links_duplicates() {
    let fixture = Fixture::new();
    fixture.file("a/one.bin", "first");
    fixture.file("b/two.bin", "second");
    fs::create_dir_all(fixture.path("copy")).unwrap();
    let manifest = fixture.manifest(&[
        ("aaa", "5", "a/one.bin"),
        ("aaa", "5", "copy/one.bin"),
        ("bbb", "6", "b/two.bin"),
        ("bbb", "6", "copy/two.bin"),
        ("ccc", "1", "single.bin"),
    ]);

    let code = run_app(cli(&fixture, &manifest, &[])).unwrap();

    assert_eq!(code, ExitCode::Success);
    assert_eq!(fs::read_to_string(fixture.path("copy/one.bin")).unwrap(), "first");
    assert_eq!(fs::read_to_string(fixture.path("copy/two.bin")).unwrap(), "second");
    #[cfg(unix)]
    {
        use super::common::same_file;
        assert!(same_file(&fixture.path("a/one.bin"), &fixture.path("copy/one.bin")));
        assert!(same_file(&fixture.path("b/two.bin"), &fixture.path("copy/two.bin")));
    }
    assert!(!fixture.path("single.bin").exists());
}

#[test]
fn test_second_run_is_a_no_op() {
    let fixture = Fixture::new();
    fixture.file("one.bin", "data");
    let manifest = fixture.manifest(&[("aaa", "4", "one.bin"), ("aaa", "4", "two.bin")]);

    assert_eq!(run_app(cli(&fixture, &manifest, &[])).unwrap(), ExitCode::Success);
    assert_eq!(run_app(cli(&fixture, &manifest, &[])).unwrap(), ExitCode::Success);
    assert!(fixture.path("two.bin").exists());
}

#[test]
fn test_malformed_manifest_names_the_line() {
    let fixture = Fixture::new();
    let manifest = fixture.raw_manifest("aaa\t4\tone.bin\nbroken line\n");

    let err = run_app(cli(&fixture, &manifest, &[])).unwrap_err();
    assert!(format!("{err:#}").contains("line 2"), "{err:#}");
}

#[test]
fn test_missing_manifest_is_fatal() {
    let fixture = Fixture::new();
    let manifest = fixture.dir.path().join("absent.txt");
    assert!(run_app(cli(&fixture, &manifest, &[])).is_err());
}

#[test]
fn test_all_missing_group_is_partial_success() {
    let fixture = Fixture::new();
    fixture.file("here.bin", "data");
    let manifest = fixture.manifest(&[
        ("aaa", "4", "gone1.bin"),
        ("aaa", "4", "gone2.bin"),
        ("bbb", "4", "here.bin"),
        ("bbb", "4", "there.bin"),
    ]);

    let code = run_app(cli(&fixture, &manifest, &[])).unwrap();

    assert_eq!(code, ExitCode::PartialSuccess);
    assert!(fixture.path("there.bin").exists());
    assert!(!fixture.path("gone1.bin").exists());
}

#[test]
fn test_dry_run_touches_nothing() {
    let fixture = Fixture::new();
    fixture.file("one.bin", "data");
    let manifest = fixture.manifest(&[("aaa", "4", "one.bin"), ("aaa", "4", "two.bin")]);

    let code = run_app(cli(&fixture, &manifest, &["--dry-run"])).unwrap();

    assert_eq!(code, ExitCode::Success);
    assert!(!fixture.path("two.bin").exists());
}

#[test]
fn test_report_is_written() {
    let fixture = Fixture::new();
    fixture.file("one.bin", "data");
    let manifest = fixture.manifest(&[
        ("aaa", "4", "one.bin"),
        ("aaa", "4", "two.bin"),
        ("bbb", "4", "x.bin"),
        ("bbb", "4", "y.bin"),
    ]);
    let report = fixture.dir.path().join("report.csv");
    let report_arg = report.to_str().unwrap();

    let code = run_app(cli(&fixture, &manifest, &["--report", report_arg])).unwrap();
    assert_eq!(code, ExitCode::PartialSuccess);

    let text = fs::read_to_string(&report).unwrap();
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines[0], "hash,size,outcome,path,detail");
    assert!(lines.contains(&"aaa,4,linked,one.bin,1"));
    assert_eq!(lines.iter().filter(|l| l.contains("all_missing")).count(), 2);
}

#[test]
fn test_missing_config_file_is_fatal() {
    let fixture = Fixture::new();
    let manifest = fixture.manifest(&[]);
    let config = fixture.dir.path().join("absent.toml");
    let config_arg = config.to_str().unwrap();

    assert!(run_app(cli(&fixture, &manifest, &["--config", config_arg])).is_err());
}

#[test]
fn test_empty_manifest_succeeds() {
    let fixture = Fixture::new();
    let manifest = fixture.manifest(&[]);
    assert_eq!(run_app(cli(&fixture, &manifest, &[])).unwrap(), ExitCode::Success);
}
