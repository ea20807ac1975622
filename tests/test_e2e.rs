#![cfg(unix)]

mod common;

use std::fs;
use std::process::Command;

use camino::Utf8Path;
use serde_json::json;
use tempfile::TempDir;

use common::*;

fn mutdiff_bin() -> &'static str {
    env!("CARGO_BIN_EXE_mutdiff")
}

fn materialize_a_sol(root: &Utf8Path) -> camino::Utf8PathBuf {
    let sources = root.join("src");
    fs::create_dir_all(&sources).unwrap();
    fs::write(sources.join("A.sol"), CONTRACT_50).unwrap();
    let feed = root.join("feed.json");
    let feed_json = json!({
        "A.sol": [
            candidate_json(2, 5, "ntr", "XYZ", "AOR"),
            candidate_json(10, 14, " { u", "WXYZ", "BOR"),
            candidate_json(30, 33, "y =", "QRS", "AOR"),
        ]
    });
    fs::write(&feed, feed_json.to_string()).unwrap();

    let corpus = root.join("mutants");
    let output = Command::new(mutdiff_bin())
        .args(["materialize", sources.as_str(), "--feed", feed.as_str(), "-n", "3", "-o", corpus.as_str()])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "materialize failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    corpus
}

#[test]
fn e2e_invalid_backend_exits_2() {
    let dir = TempDir::new().unwrap();
    let root = utf8_dir(&dir);
    fs::create_dir_all(root.join("mutants")).unwrap();

    let output = Command::new(mutdiff_bin())
        .args(["run", root.join("mutants").as_str(), "meld"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid diff tool 'meld'"), "stderr: {stderr}");
}

#[test]
fn e2e_missing_corpus_exits_2() {
    let dir = TempDir::new().unwrap();
    let root = utf8_dir(&dir);

    let output = Command::new(mutdiff_bin())
        .args(["run", root.join("absent").as_str(), "GT"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Corpus not found"));
}

#[test]
fn e2e_zero_mutations_exits_2() {
    let dir = TempDir::new().unwrap();
    let root = utf8_dir(&dir);

    let output = Command::new(mutdiff_bin())
        .args(["materialize", root.as_str(), "--feed", "feed.json", "-n", "0"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn e2e_materialize_run_and_stats() {
    let dir = TempDir::new().unwrap();
    let root = utf8_dir(&dir);
    let corpus = materialize_a_sol(&root);
    assert!(corpus.join("A").join("original").join("A.sol").is_file());
    assert!(corpus.join("A").join("3").join("A.sol").is_file());

    let out = root.join("results");
    let output = Command::new(mutdiff_bin())
        .args(["run", corpus.as_str(), "GT", "-o", out.as_str(), "-w", "2", "--json"])
        .env("MUTDIFF_GUMTREE", fake_gumtree(&root))
        .output()
        .unwrap();
    assert!(output.status.success(), "run failed: {}", String::from_utf8_lossy(&output.stderr));

    let printed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(printed["A"].as_array().unwrap().len(), 3);
    assert_eq!(printed["A"][0]["all"]["kind"], "tree_diff");
    assert!(printed["A"][2]["all"]["actions"].as_u64().unwrap() >= 3);

    let results_file = out.join("results_GT.json");
    assert!(results_file.is_file());
    let times: serde_json::Value = serde_json::from_str(&fs::read_to_string(out.join("running_time.json")).unwrap()).unwrap();
    assert!(times["GT"].is_number());

    let output = Command::new(mutdiff_bin())
        .args(["stats", results_file.as_str(), "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let table: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(table["backend"], "GT");
    assert_eq!(table["buckets"].as_array().unwrap().len(), 3);
    assert_eq!(table["failures"], 0);
}

#[test]
fn e2e_failed_tool_still_writes_results() {
    let dir = TempDir::new().unwrap();
    let root = utf8_dir(&dir);
    let corpus = materialize_a_sol(&root);
    let out = root.join("results");

    let output = Command::new(mutdiff_bin())
        .args(["run", corpus.as_str(), "difft", "-o", out.as_str(), "-q"])
        .env("MUTDIFF_DIFFT", failing_tool(&root))
        .output()
        .unwrap();
    assert!(output.status.success());

    let saved: serde_json::Value = serde_json::from_str(&fs::read_to_string(out.join("results_difft.json")).unwrap()).unwrap();
    for bucket in saved["A"].as_array().unwrap() {
        assert_eq!(bucket["all"]["kind"], "failure");
        assert_eq!(bucket["all"]["failure"], "tool_invocation");
    }
}

#[test]
fn e2e_inspect_shows_line_diff() {
    let dir = TempDir::new().unwrap();
    let root = utf8_dir(&dir);
    let corpus = materialize_a_sol(&root);

    let output = Command::new(mutdiff_bin())
        .args(["inspect", corpus.as_str(), "A", "2"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("- contract A {"));
    assert!(stdout.contains("+ coXYZact AWXYZint"));

    let output = Command::new(mutdiff_bin())
        .args(["inspect", corpus.as_str(), "A", "9"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}
