use super::common::Fixture;
use clap::Parser;
use relink::cli::Cli;
use relink::config::Config;
use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;

#[test]
fn test_explicit_file_is_loaded() {
    let fixture = Fixture::new();
    let path = fixture.dir.path().join("relink.toml");
    fs::write(
        &path,
        "channel_capacity = 16\nmanifest = \"list.txt\"\ninitial_buffer = 32\n",
    )
    .unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.channel_capacity, 16);
    assert_eq!(config.manifest, PathBuf::from("list.txt"));
    assert_eq!(config.initial_buffer, 32);
}

#[test]
fn test_cli_wins_over_file() {
    let fixture = Fixture::new();
    let path = fixture.dir.path().join("relink.toml");
    fs::write(&path, "workers = 2\nroot = \"/from/file\"\n").unwrap();

    let root = fixture.root();
    let args: Vec<OsString> = vec![
        "relink".into(),
        "-r".into(),
        root.clone().into_os_string(),
        "--channel-capacity".into(),
        "9".into(),
    ];
    let cli = Cli::try_parse_from(args).unwrap();
    let config = Config::load(Some(&path)).unwrap().apply_cli(&cli);

    assert_eq!(config.workers, 2);
    assert_eq!(config.root, root);
    assert_eq!(config.channel_capacity, 9);
}

#[test]
fn test_zero_counts_in_file_are_clamped() {
    let fixture = Fixture::new();
    let path = fixture.dir.path().join("relink.toml");
    fs::write(&path, "workers = 0\nchannel_capacity = 0\ninitial_buffer = 0\n").unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.workers, 1);
    assert_eq!(config.channel_capacity, 1);
    assert_eq!(config.initial_buffer, 1);
}

#[test]
fn test_missing_explicit_file_is_fatal() {
    let fixture = Fixture::new();
    assert!(Config::load(Some(&fixture.dir.path().join("absent.toml"))).is_err());
}

#[test]
fn test_malformed_file_is_fatal() {
    let fixture = Fixture::new();
    let path = fixture.dir.path().join("relink.toml");
    fs::write(&path, "workers = [").unwrap();
    assert!(Config::load(Some(&path)).is_err());
}

#[test]
fn test_relative_root_in_file_is_resolved() {
    let fixture = Fixture::new();
    let path = fixture.dir.path().join("relink.toml");
    fs::write(&path, "root = \"tree/below\"\n").unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert!(config.root.is_absolute());
    assert!(config.root.starts_with(std::env::current_dir().unwrap()));
    assert!(config.root.ends_with(PathBuf::from("tree").join("below")));
}
