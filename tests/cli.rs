use std::collections::BTreeSet;
use std::fs;

use assert_cmd::Command;
use tempfile::tempdir;

fn ids_in_output(output: &str) -> BTreeSet<String> {
    output
        .lines()
        .filter(|line| line.starts_with('>'))
        .map(|line| line.trim_start_matches('>').to_string())
        .collect()
}

fn run_nr(args: &[&str], tmp_dir: &std::path::Path) -> String {
    let assert = Command::cargo_bin("nr")
        .unwrap()
        .args(args)
        .args(&["-d", tmp_dir.to_str().unwrap()])
        .assert()
        .success();
    String::from_utf8(assert.get_output().stdout.clone()).unwrap()
}

#[test]
fn subset_elimination() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.faa");
    fs::write(&input, ">a\nABCDEF\n>b\nXABCDEFY\n").unwrap();

    let out = run_nr(&["-f", "4", "-r", "3", input.to_str().unwrap()], dir.path());
    assert_eq!(ids_in_output(&out), BTreeSet::from(["b".to_string()]));
}

#[test]
fn equal_length_id_tie_break() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.faa");
    fs::write(&input, ">a\nABCDEFG\n>b\nABCDEFG\n").unwrap();

    let out = run_nr(&["-f", "4", "-r", "3", input.to_str().unwrap()], dir.path());
    assert_eq!(ids_in_output(&out), BTreeSet::from(["b".to_string()]));
}

#[test]
fn independent_sequences_both_survive() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.faa");
    fs::write(&input, ">a\nABCDEFGH\n>b\nMNOPQRST\n").unwrap();

    let out = run_nr(&["-f", "4", "-r", "3", input.to_str().unwrap()], dir.path());
    assert_eq!(
        ids_in_output(&out),
        BTreeSet::from(["a".to_string(), "b".to_string()])
    );
}

#[test]
fn excessive_x_is_rejected() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.faa");
    fs::write(&input, ">a\nXXXXXXXXXX\n>b\nABCDEFGHIJ\n").unwrap();

    let out = run_nr(&["-f", "4", "-r", "3", input.to_str().unwrap()], dir.path());
    assert_eq!(ids_in_output(&out), BTreeSet::from(["b".to_string()]));
}

#[test]
fn cross_file_non_redundantising_with_load_only_first_file() {
    let dir = tempdir().unwrap();
    let f1 = dir.path().join("f1.faa");
    let f2 = dir.path().join("f2.faa");
    fs::write(&f1, ">a\nABCDEFGHIJ\n").unwrap();
    fs::write(&f2, ">b\nXYABCDEFGHIJZ\n").unwrap();

    let out = run_nr(
        &[
            "-n",
            "-f",
            "4",
            "-r",
            "3",
            f1.to_str().unwrap(),
            f2.to_str().unwrap(),
        ],
        dir.path(),
    );
    assert_eq!(ids_in_output(&out), BTreeSet::from(["b".to_string()]));
}

#[test]
fn three_way_identical_keeps_greatest_id() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.faa");
    fs::write(&input, ">a\nABCDE\n>b\nABCDE\n>c\nABCDE\n").unwrap();

    let out = run_nr(&["-f", "3", "-r", "2", input.to_str().unwrap()], dir.path());
    assert_eq!(ids_in_output(&out), BTreeSet::from(["c".to_string()]));
}

#[test]
fn output_file_flag_writes_to_disk_instead_of_stdout() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.faa");
    let out_path = dir.path().join("out.faa");
    fs::write(&input, ">a\nABCDEFGH\n").unwrap();

    Command::cargo_bin("nr")
        .unwrap()
        .args(&[
            "-f",
            "4",
            "-r",
            "3",
            "-o",
            out_path.to_str().unwrap(),
            "-d",
            dir.path().to_str().unwrap(),
            input.to_str().unwrap(),
        ])
        .assert()
        .success();

    let written = fs::read_to_string(&out_path).unwrap();
    assert_eq!(ids_in_output(&written), BTreeSet::from(["a".to_string()]));
}

#[test]
fn pathological_fragment_size_of_two_does_not_crash() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.faa");
    fs::write(&input, ">a\nABCDE\n>b\nFGHIJ\n").unwrap();

    // -f 2 gives an effective fragment length of 1: every single residue
    // is its own fragment window. Degenerate, but must still run to
    // completion rather than panicking on an empty/zero-length slice.
    let out = run_nr(&["-f", "2", "-r", "1", input.to_str().unwrap()], dir.path());
    assert!(!ids_in_output(&out).is_empty());
}

#[test]
fn unreadable_input_file_is_skipped_not_fatal() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("does-not-exist.faa");
    let present = dir.path().join("in.faa");
    fs::write(&present, ">a\nABCDEFGH\n").unwrap();

    let out = run_nr(
        &[
            "-f",
            "4",
            "-r",
            "3",
            missing.to_str().unwrap(),
            present.to_str().unwrap(),
        ],
        dir.path(),
    );
    assert_eq!(ids_in_output(&out), BTreeSet::from(["a".to_string()]));
}
