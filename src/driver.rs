//! Concurrent diffing of a whole mutant corpus.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use camino::{Utf8Path, Utf8PathBuf};
use parking_lot::Mutex;
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::RunConfig;
use crate::corpus::{self, FileEntry};
use crate::diff;
use crate::output;
use crate::results::{self, FileResults, JsonlWriter, ResultSet};

/// Cooperative stop signal shared between the caller and the workers.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("corpus root not found: {0}")]
    MissingCorpus(Utf8PathBuf),
    #[error("failed to read corpus {path}: {source}")]
    Corpus {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to open {path}: {source}")]
    Jsonl {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error("run cancelled")]
    Cancelled,
}

/// Diff every mutant under `corpus_root` with the configured backend.
///
/// One task per file directory runs on a pool of `config.workers` threads.
/// Per-mutant failures are recorded in place and never stop the run.
pub fn run(corpus_root: &Utf8Path, config: &RunConfig, cancel: &CancelToken) -> Result<ResultSet, RunError> {
    if !corpus_root.is_dir() {
        return Err(RunError::MissingCorpus(corpus_root.to_path_buf()));
    }
    let dirs = corpus::list_file_dirs(corpus_root).map_err(|source| RunError::Corpus {
        path: corpus_root.to_path_buf(),
        source,
    })?;

    let jsonl = match &config.jsonl {
        Some(path) => Some(Mutex::new(JsonlWriter::open(path).map_err(|source| RunError::Jsonl {
            path: path.clone(),
            source,
        })?)),
        None => None,
    };

    let total = dirs.len();
    let done = AtomicUsize::new(0);
    let results: Mutex<BTreeMap<String, FileResults>> = Mutex::new(BTreeMap::new());

    info!(files = total, workers = config.workers, backend = %config.backend, "diffing corpus");
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.workers.max(1))
        .build()?;

    pool.install(|| {
        dirs.par_iter().for_each(|dir| {
            if cancel.is_cancelled() {
                return;
            }
            let name = dir.file_name().unwrap_or(dir.as_str()).to_string();
            let file_results = match corpus::scan_file_dir(dir) {
                Ok(entry) => diff_file(&entry, config, cancel),
                Err(e) => {
                    warn!(file = %name, error = %e, "unreadable file directory, recording no mutants");
                    Some(Vec::new())
                }
            };
            let Some(file_results) = file_results else {
                return;
            };

            if let Some(writer) = &jsonl {
                if let Err(e) = writer.lock().append(&name, &file_results) {
                    warn!(file = %name, error = %e, "failed to append JSON Lines record");
                }
            }
            results.lock().insert(name, file_results);

            let finished = done.fetch_add(1, Ordering::SeqCst) + 1;
            debug!(finished, total, "file done");
            if config.progress {
                output::print_progress(finished, total);
            }
        });
    });

    if cancel.is_cancelled() {
        return Err(RunError::Cancelled);
    }
    Ok(ResultSet::from(results.into_inner()))
}

/// Diff all buckets of one file in count order. Returns `None` when the run
/// was cancelled part way through.
pub fn diff_file(entry: &FileEntry, config: &RunConfig, cancel: &CancelToken) -> Option<FileResults> {
    let mut file_results = Vec::with_capacity(entry.buckets.len());
    for bucket in &entry.buckets {
        if cancel.is_cancelled() {
            debug!(file = %entry.name, count = bucket.count, "cancelled");
            return None;
        }
        let mut diffs = BTreeMap::new();
        for mutant in &bucket.mutants {
            let outcome = diff::diff(&entry.original, &mutant.path, config.backend, &config.tools);
            if let diff::DiffOutcome::Failure { failure, detail } = &outcome {
                warn!(
                    file = %entry.name,
                    count = bucket.count,
                    operator = %mutant.operator,
                    kind = ?failure,
                    "diff failed: {detail}"
                );
            }
            if let Some(dir) = &config.per_mutant {
                let path =
                    results::mutant_result_path(dir, &entry.name, bucket.count, &mutant.operator, config.backend);
                if let Err(e) = results::save_outcome(&outcome, &path) {
                    warn!(file = %entry.name, count = bucket.count, operator = %mutant.operator, "{e:#}");
                }
            }
            diffs.insert(mutant.operator.clone(), outcome);
        }
        file_results.push(diffs);
    }
    Some(file_results)
}
