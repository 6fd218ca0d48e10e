#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! Build and inspect round trips through the command layer

use clap::Parser;
use pretty_assertions::assert_eq;
use slotdb_cli::cli::{BuildArgs, Cli, InspectArgs};
use slotdb_cli::{build, inspect, run};
use std::fs;
use std::path::Path;

fn write_dump(dir: &Path, lines: &[&str]) -> std::path::PathBuf {
    let path = dir.join("dump.tsv");
    fs::write(&path, lines.join("\n")).unwrap();
    path
}

#[test]
fn test_build_then_inspect() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_dump(
        dir.path(),
        &["# sample", "01\taabb", "0203\tcc", "0204\tcc", "", "\t00"],
    );
    let output = dir.path().join("store.slotdb");

    let summary = build(&BuildArgs {
        input,
        output: output.clone(),
        load_factor: Some(0.5),
        tmp_dir: Some(dir.path().to_path_buf()),
        settings: None,
    })
    .unwrap();
    assert_eq!(summary.key_count, 4);
    assert_eq!(summary.value_count, 3);

    let report = inspect(&InspectArgs {
        store: output.clone(),
        json: false,
    })
    .unwrap();
    assert_eq!(report.format_version, "SLOTDB_V1");
    assert_eq!(report.key_count, 4);
    assert_eq!(report.key_length_count, 3);
    assert_eq!(report.max_key_length, 2);
    assert_eq!(
        report.lengths.iter().map(|l| l.key_length).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
    assert_eq!(report.lengths[2].slot_count, 4);

    // Only the dump and the store are left behind
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    assert_eq!(
        fs::metadata(&output).unwrap().len(),
        summary.bytes_written
    );
}

#[test]
fn test_run_prints_reports() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_dump(dir.path(), &["0a\t0b"]);
    let output = dir.path().join("one.slotdb");

    let mut stdout = Vec::new();
    let cli = Cli::try_parse_from([
        "slotdb",
        "build",
        "-i",
        input.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
    ])
    .unwrap();
    run(cli, &mut stdout).unwrap();
    assert!(String::from_utf8(stdout).unwrap().starts_with("Wrote 1 keys"));

    let mut stdout = Vec::new();
    let cli =
        Cli::try_parse_from(["slotdb", "inspect", output.to_str().unwrap(), "--json"]).unwrap();
    run(cli, &mut stdout).unwrap();

    let json: serde_json::Value = serde_json::from_slice(&stdout).unwrap();
    assert_eq!(json["key_count"], 1);
    assert_eq!(json["lengths"][0]["key_length"], 1);

    let mut stdout = Vec::new();
    let cli = Cli::try_parse_from(["slotdb", "inspect", output.to_str().unwrap()]).unwrap();
    run(cli, &mut stdout).unwrap();
    assert!(String::from_utf8(stdout).unwrap().contains("Format version:   SLOTDB_V1"));
}

#[test]
fn test_bad_dump_leaves_no_store() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_dump(dir.path(), &["01\t02", "not-a-pair"]);
    let output = dir.path().join("bad.slotdb");

    let err = build(&BuildArgs {
        input,
        output: output.clone(),
        load_factor: None,
        tmp_dir: Some(dir.path().to_path_buf()),
        settings: None,
    })
    .unwrap_err();

    assert!(format!("{err:#}").contains("line 2"));
    assert!(!output.exists());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn test_inspect_rejects_foreign_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("foreign.bin");
    fs::write(&path, b"\x00\x08OTHERDB1rest").unwrap();

    let err = inspect(&InspectArgs {
        store: path,
        json: false,
    })
    .unwrap_err();
    assert!(format!("{err:#}").contains("Unsupported format version"));
}
