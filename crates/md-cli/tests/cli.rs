//! End-to-end tests driving the `mdls` binary as a subprocess, the same
//! "point it at a scratch `tempfile::TempDir`, assert on stdout" approach
//! `blz-cli`'s integration tests use, adapted here to `std::process::Command`
//! directly against `CARGO_BIN_EXE_mdls` rather than `assert_cmd` (not part
//! of this workspace's dependency stack).

use std::fs;
use std::process::Command;
use tempfile::tempdir;

fn mdls() -> Command {
    Command::new(env!("CARGO_BIN_EXE_mdls"))
}

#[test]
fn toc_prints_headings_in_order() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("doc.md"), "# Title\n\ntext\n\n## Sub\n").unwrap();

    let output = mdls()
        .args(["--root", dir.path().to_str().unwrap(), "toc", "doc.md"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Title"));
    assert!(stdout.contains("Sub"));
    assert!(stdout.find("Title").unwrap() < stdout.find("Sub").unwrap());
}

#[test]
fn diagnose_reports_missing_reference_and_exits_nonzero() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("doc.md"), "[a][missing]\n").unwrap();

    let output = mdls()
        .args(["--root", dir.path().to_str().unwrap(), "diagnose", "doc.md"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("NoSuchReference"));
}

#[test]
fn diagnose_is_clean_when_reference_is_defined() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("doc.md"), "[a][b]\n\n[b]: http://example.com\n").unwrap();

    let output = mdls()
        .args(["--root", dir.path().to_str().unwrap(), "diagnose", "doc.md"])
        .output()
        .unwrap();
    assert!(output.status.success());
}

#[test]
fn organize_sorts_and_removes_unused_definitions() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("doc.md");
    fs::write(&path, "text [a] text [link][c]\n\n[c]: http://c\n[b]: http://b\n[a]: http://a\n").unwrap();

    let status = mdls()
        .args(["--root", dir.path().to_str().unwrap(), "organize", "doc.md", "--remove-unused"])
        .status()
        .unwrap();
    assert!(status.success());

    let result = fs::read_to_string(&path).unwrap();
    assert_eq!(result, "text [a] text [link][c]\n\n[a]: http://a\n[c]: http://c\n");
}

#[test]
fn rename_rewrites_links_and_moves_the_file() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("doc.md"), "[link](old.md)\n").unwrap();
    fs::write(dir.path().join("old.md"), "# Old\n").unwrap();

    let status = mdls()
        .args(["--root", dir.path().to_str().unwrap(), "rename", "old.md", "new.md"])
        .status()
        .unwrap();
    assert!(status.success());

    assert!(!dir.path().join("old.md").exists());
    assert!(dir.path().join("new.md").exists());
    let doc = fs::read_to_string(dir.path().join("doc.md")).unwrap();
    assert_eq!(doc, "[link](new.md)\n");
}

#[test]
fn rename_dry_run_leaves_files_untouched() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("doc.md"), "[link](old.md)\n").unwrap();
    fs::write(dir.path().join("old.md"), "# Old\n").unwrap();

    let status = mdls()
        .args([
            "--root",
            dir.path().to_str().unwrap(),
            "rename",
            "old.md",
            "new.md",
            "--dry-run",
        ])
        .status()
        .unwrap();
    assert!(status.success());

    assert!(dir.path().join("old.md").exists());
    assert!(!dir.path().join("new.md").exists());
    let doc = fs::read_to_string(dir.path().join("doc.md")).unwrap();
    assert_eq!(doc, "[link](old.md)\n");
}
