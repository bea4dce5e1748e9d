// Regression tests for the command-line interface.
// Requires: assert_cmd, predicates, tempfile in [dev-dependencies]

use std::{fs, path::Path};

use assert_cmd::Command;
use predicates::{prelude::PredicateBooleanExt, str::contains};

const ORDER_TEST: &str = "import mockit.*;

class OrderTest {
    @Mocked Repo repo;

    void places() {
        new Expectations() {{
            repo.find(1); result = \"order\";
        }};
        assertEquals(\"order\", repo.find(1));
    }
}

interface Repo {
    String find(int id);
}
";

fn write(dir: &Path, name: &str, text: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, text).unwrap();
    path
}

fn mockshift(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("mockshift").unwrap();
    cmd.current_dir(dir).env("NO_COLOR", "1").env_remove("RUST_LOG");
    cmd
}

#[test]
fn rewrite_prints_a_diff_and_leaves_files_alone() {
    let dir = tempfile::tempdir().unwrap();
    let file = write(dir.path(), "src/OrderTest.java", ORDER_TEST);

    mockshift(dir.path())
        .args(["rewrite", "src"])
        .assert()
        .success()
        .stdout(
            contains("-        new Expectations() {{")
                .and(contains("+        when(repo.find(1)).thenReturn(\"order\");")),
        );
    assert_eq!(fs::read_to_string(file).unwrap(), ORDER_TEST);
}

#[test]
fn rewrite_write_updates_files_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let file = write(dir.path(), "OrderTest.java", ORDER_TEST);

    mockshift(dir.path())
        .args(["rewrite", "--write", "OrderTest.java"])
        .assert()
        .success();
    let text = fs::read_to_string(file).unwrap();
    assert!(text.contains("        when(repo.find(1)).thenReturn(\"order\");\n        assertEquals"));
    assert!(!text.contains("new Expectations"));
}

#[test]
fn rewrite_json_reports_changes_and_diagnostics() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "OrderTest.java", ORDER_TEST);
    write(
        dir.path(),
        "LoopTest.java",
        "import mockit.*;\nclass LoopTest {\n    @Mocked Repo repo;\n    void t() {\n        new Expectations() {{ while (true) { repo.find(1); } }};\n    }\n}\n",
    );

    let output = mockshift(dir.path()).args(["rewrite", "--json", "."]).output().unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let files = report["files"].as_array().unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0]["changed"], false);
    assert_eq!(files[0]["diagnostics"][0]["kind"], "unsupported-shape");
    assert_eq!(files[0]["diagnostics"][0]["severity"], "skip");
    assert_eq!(files[1]["changed"], true);
    assert!(report["failures"].as_array().unwrap().is_empty());
}

#[test]
fn scan_lists_blocks_per_method() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "OrderTest.java", ORDER_TEST);

    mockshift(dir.path())
        .args(["scan", "OrderTest.java"])
        .assert()
        .success()
        .stdout(contains("OrderTest.places (line 6)").and(contains("Expectations [stub-strict] emitted")));
}

#[test]
fn parse_failures_are_reported_with_miette_and_fail_the_run() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "OrderTest.java", ORDER_TEST);
    write(dir.path(), "Broken.java", "class Broken { void t() { ");

    mockshift(dir.path())
        .args(["rewrite", "."])
        .assert()
        .failure()
        .code(1)
        .stdout(contains("thenReturn"))
        .stderr(contains("mockshift::parse"));
}

#[test]
fn bad_configuration_stops_before_any_file() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "OrderTest.java", ORDER_TEST);
    write(dir.path(), "mockshift.yaml", "policy:\n  duplicate_verification: sometimes\n");

    mockshift(dir.path())
        .args(["rewrite", "OrderTest.java"])
        .assert()
        .failure()
        .code(2)
        .stderr(contains("mockshift::config"));
}
