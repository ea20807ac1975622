#![cfg(unix)]

mod common;

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use mutdiff::config::{MaterializeConfig, RunConfig, ToolConfig};
use mutdiff::corpus;
use mutdiff::diff::{Backend, DiffOutcome, FailureKind};
use mutdiff::driver::{self, CancelToken, RunError};
use mutdiff::feed;
use mutdiff::materialize::{self, MutationFeed};
use mutdiff::results;
use serde_json::json;
use tempfile::TempDir;

use common::*;

const B_SOL: &str = "contract B {\n    uint total = 10;\n    bool open = true;\n}\n";

/// Two files partitioned by operator: A has AOR up to n=2 and BOR at n=1;
/// B has AOR and BROKEN at n=1.
fn build_corpus(root: &Utf8Path) -> Utf8PathBuf {
    let sources = root.join("src");
    fs::create_dir_all(&sources).unwrap();
    fs::write(sources.join("A.sol"), CONTRACT_50).unwrap();
    fs::write(sources.join("B.sol"), B_SOL).unwrap();

    let feed_json = json!({
        "A.sol": [
            candidate_json(2, 5, "ntr", "XYZ", "AOR"),
            candidate_json(10, 14, " { u", "WXYZ", "BOR"),
            candidate_json(30, 33, "y =", "QRS", "AOR"),
        ],
        "B.sol": [
            candidate_json(30, 32, "10", "11", "AOR"),
            candidate_json(50, 54, "true", "fals", "BROKEN"),
        ],
    });
    let feed_path = root.join("feed.json");
    fs::write(&feed_path, feed_json.to_string()).unwrap();
    let feed = MutationFeed::Characters(feed::load_candidates(&feed_path).unwrap());

    let out = root.join("mutants");
    let mut config = MaterializeConfig::new(&out, 2);
    config.by_operator = true;
    materialize::materialize(&sources, &feed, &config).unwrap();
    out
}

fn run_config(root: &Utf8Path, backend: Backend, workers: usize) -> RunConfig {
    RunConfig {
        workers,
        tools: ToolConfig {
            gumtree: fake_gumtree(root),
            difft: fake_difft(root),
            ..ToolConfig::default()
        },
        ..RunConfig::new(backend)
    }
}

fn magnitudes(set: &results::ResultSet) -> Vec<(String, usize, String, Option<usize>)> {
    set.records()
        .map(|r| (r.file.to_string(), r.count, r.operator.to_string(), r.outcome.magnitude()))
        .collect()
}

#[test]
fn tree_diff_over_corpus_records_every_mutant() {
    let dir = TempDir::new().unwrap();
    let root = utf8_dir(&dir);
    let corpus_root = build_corpus(&root);

    let set = driver::run(&corpus_root, &run_config(&root, Backend::GumTree, 2), &CancelToken::new()).unwrap();
    assert_eq!(set.len(), 2);

    let a = &set.files["A"];
    assert_eq!(a.len(), 2);
    assert_eq!(a[0].keys().collect::<Vec<_>>(), vec!["AOR", "BOR"]);
    assert_eq!(a[1].keys().collect::<Vec<_>>(), vec!["AOR"]);
    assert_eq!(set.get("A", 1, "AOR").and_then(DiffOutcome::magnitude), Some(3));
    assert_eq!(set.get("A", 2, "AOR").and_then(DiffOutcome::magnitude), Some(6));
    assert!(set.get("A", 2, "BOR").is_none());
}

#[test]
fn one_failing_mutant_does_not_stop_the_run() {
    let dir = TempDir::new().unwrap();
    let root = utf8_dir(&dir);
    let corpus_root = build_corpus(&root);

    let set = driver::run(&corpus_root, &run_config(&root, Backend::GumTree, 2), &CancelToken::new()).unwrap();
    let broken = set.get("B", 1, "BROKEN").unwrap();
    assert!(matches!(broken, DiffOutcome::Failure { failure: FailureKind::ToolInvocation, .. }));
    assert_eq!(set.get("B", 1, "AOR").and_then(DiffOutcome::magnitude), Some(1));
}

#[test]
fn worker_count_does_not_change_results() {
    let dir = TempDir::new().unwrap();
    let root = utf8_dir(&dir);
    let corpus_root = build_corpus(&root);

    let serial = driver::run(&corpus_root, &run_config(&root, Backend::GumTree, 1), &CancelToken::new()).unwrap();
    let parallel = driver::run(&corpus_root, &run_config(&root, Backend::GumTree, 8), &CancelToken::new()).unwrap();
    assert_eq!(magnitudes(&serial), magnitudes(&parallel));
}

#[test]
fn token_diff_over_corpus() {
    let dir = TempDir::new().unwrap();
    let root = utf8_dir(&dir);
    let corpus_root = build_corpus(&root);

    let set = driver::run(&corpus_root, &run_config(&root, Backend::Difftastic, 2), &CancelToken::new()).unwrap();
    for record in set.records() {
        assert!(matches!(record.outcome, DiffOutcome::TokenDiff { changes: 1, .. }));
    }
    assert_eq!(set.records().count(), 5);
}

#[test]
fn file_dir_without_mutants_maps_to_empty_list() {
    let dir = TempDir::new().unwrap();
    let root = utf8_dir(&dir);
    let corpus_root = build_corpus(&root);
    let lonely = corpus::original_path(&corpus_root, "C.sol");
    fs::create_dir_all(lonely.parent().unwrap()).unwrap();
    fs::write(&lonely, "contract C {}").unwrap();
    fs::create_dir_all(corpus_root.join("D")).unwrap();

    let set = driver::run(&corpus_root, &run_config(&root, Backend::GumTree, 2), &CancelToken::new()).unwrap();
    assert_eq!(set.len(), 4);
    assert!(set.files["C"].is_empty());
    assert!(set.files["D"].is_empty());
}

#[test]
fn cancelled_run_returns_cancelled() {
    let dir = TempDir::new().unwrap();
    let root = utf8_dir(&dir);
    let corpus_root = build_corpus(&root);
    let cancel = CancelToken::new();
    cancel.cancel();

    let err = driver::run(&corpus_root, &run_config(&root, Backend::GumTree, 2), &cancel);
    assert!(matches!(err, Err(RunError::Cancelled)));
}

#[test]
fn missing_corpus_is_an_error() {
    let dir = TempDir::new().unwrap();
    let root = utf8_dir(&dir);
    let err = driver::run(&root.join("nope"), &run_config(&root, Backend::GumTree, 1), &CancelToken::new());
    assert!(matches!(err, Err(RunError::MissingCorpus(_))));
}

#[test]
fn jsonl_gets_one_record_per_file() {
    let dir = TempDir::new().unwrap();
    let root = utf8_dir(&dir);
    let corpus_root = build_corpus(&root);
    let jsonl = results::jsonl_path(&root.join("results"), Backend::GumTree);
    let mut config = run_config(&root, Backend::GumTree, 2);
    config.jsonl = Some(jsonl.clone());

    let set = driver::run(&corpus_root, &config, &CancelToken::new()).unwrap();
    let text = fs::read_to_string(&jsonl).unwrap();
    assert_eq!(text.lines().count(), 2);
    assert_eq!(magnitudes(&results::load(&jsonl).unwrap()), magnitudes(&set));
}

#[test]
fn per_mutant_files_mirror_the_result_set() {
    let dir = TempDir::new().unwrap();
    let root = utf8_dir(&dir);
    let corpus_root = build_corpus(&root);
    let out = root.join("results");
    let mut config = run_config(&root, Backend::GumTree, 2);
    config.per_mutant = Some(out.clone());

    let set = driver::run(&corpus_root, &config, &CancelToken::new()).unwrap();
    for record in set.records() {
        let path = results::mutant_result_path(&out, record.file, record.count, record.operator, Backend::GumTree);
        let saved: DiffOutcome = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved.magnitude(), record.outcome.magnitude());
    }

    let broken = fs::read_to_string(out.join("B/1/BROKEN/diff_result_GT.json")).unwrap();
    let broken: serde_json::Value = serde_json::from_str(&broken).unwrap();
    assert_eq!(broken["kind"], "failure");
    assert!(!out.join("A/2/BOR").exists());
}
