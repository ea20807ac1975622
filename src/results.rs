use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::diff::{Backend, DiffOutcome};

/// Outcomes of one file, indexed by mutation count minus one, keyed by operator.
pub type FileResults = Vec<BTreeMap<String, DiffOutcome>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultSet {
    pub files: BTreeMap<String, FileResults>,
}

impl From<BTreeMap<String, FileResults>> for ResultSet {
    fn from(files: BTreeMap<String, FileResults>) -> Self {
        Self { files }
    }
}

/// One diffed mutant, as seen by the aggregations.
#[derive(Debug, Clone, Copy)]
pub struct MutantRecord<'a> {
    pub file: &'a str,
    pub count: usize,
    pub operator: &'a str,
    pub outcome: &'a DiffOutcome,
}

impl ResultSet {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn get(&self, file: &str, count: usize, operator: &str) -> Option<&DiffOutcome> {
        self.files.get(file)?.get(count.checked_sub(1)?)?.get(operator)
    }

    pub fn records(&self) -> impl Iterator<Item = MutantRecord<'_>> {
        self.files.iter().flat_map(|(file, buckets)| {
            buckets.iter().enumerate().flat_map(move |(i, ops)| {
                ops.iter().map(move |(operator, outcome)| MutantRecord {
                    file,
                    count: i + 1,
                    operator,
                    outcome,
                })
            })
        })
    }

    /// Fold `other` into `self`. Entries of `other` replace entries with the
    /// same (file, count, operator).
    pub fn merge(&mut self, other: ResultSet) {
        for (file, buckets) in other.files {
            let mine = self.files.entry(file).or_default();
            if mine.len() < buckets.len() {
                mine.resize_with(buckets.len(), BTreeMap::new);
            }
            for (slot, ops) in mine.iter_mut().zip(buckets) {
                slot.extend(ops);
            }
        }
    }
}

pub fn results_path(dir: &Utf8Path, backend: Backend) -> Utf8PathBuf {
    dir.join(format!("results_{}.json", backend.name()))
}

pub fn jsonl_path(dir: &Utf8Path, backend: Backend) -> Utf8PathBuf {
    dir.join(format!("results_{}.jsonl", backend.name()))
}

/// `<dir>/<file>/<n>/<operator>/diff_result_<backend>.json`
pub fn mutant_result_path(dir: &Utf8Path, file: &str, count: usize, operator: &str, backend: Backend) -> Utf8PathBuf {
    dir.join(file)
        .join(count.to_string())
        .join(operator)
        .join(format!("diff_result_{}.json", backend.name()))
}

/// Write one mutant's outcome on its own.
pub fn save_outcome(outcome: &DiffOutcome, path: &Utf8Path) -> Result<()> {
    write_json_atomic(path, outcome)
}

/// Write `set` as JSON, replacing `path` atomically.
pub fn save(set: &ResultSet, path: &Utf8Path) -> Result<()> {
    write_json_atomic(path, set)
}

/// Load a result set from `.json`, or from `.jsonl` where every line holds
/// one or more files.
pub fn load(path: &Utf8Path) -> Result<ResultSet> {
    let data = fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?;
    if path.extension() == Some("jsonl") {
        let mut set = ResultSet::default();
        for (i, line) in data.lines().enumerate().filter(|(_, l)| !l.trim().is_empty()) {
            let part: ResultSet = serde_json::from_str(line)
                .with_context(|| format!("invalid record on line {} of {path}", i + 1))?;
            set.merge(part);
        }
        Ok(set)
    } else {
        serde_json::from_str(&data).with_context(|| format!("invalid result set {path}"))
    }
}

/// Appends one `{"<file>": [...]}` record per line.
pub struct JsonlWriter {
    out: BufWriter<File>,
}

impl JsonlWriter {
    pub fn open(path: &Utf8Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { out: BufWriter::new(file) })
    }

    pub fn append(&mut self, file: &str, results: &FileResults) -> std::io::Result<()> {
        let record = BTreeMap::from([(file, results)]);
        serde_json::to_writer(&mut self.out, &record)?;
        self.out.write_all(b"\n")?;
        self.out.flush()
    }
}

/// Set `backend`'s total run time in the running-time ledger, keeping other
/// backends' entries.
pub fn record_running_time(path: &Utf8Path, backend: Backend, seconds: f64) -> Result<()> {
    let mut times: BTreeMap<String, f64> = BTreeMap::new();
    if let Ok(data) = fs::read_to_string(path) {
        if !data.trim().is_empty() {
            match serde_json::from_str(&data) {
                Ok(existing) => times = existing,
                Err(e) => warn!(path = %path, error = %e, "unreadable running-time file, starting fresh"),
            }
        }
    }
    times.insert(backend.name().to_string(), seconds);
    write_json_atomic(path, &times)
}

fn write_json_atomic<T: Serialize>(path: &Utf8Path, value: &T) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_str().is_empty() => p,
        _ => Utf8Path::new("."),
    };
    fs::create_dir_all(dir).with_context(|| format!("failed to create {dir}"))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).with_context(|| format!("failed to create temp file in {dir}"))?;
    serde_json::to_writer_pretty(&mut tmp, value).with_context(|| format!("failed to serialize {path}"))?;
    tmp.write_all(b"\n")?;
    tmp.persist(path).with_context(|| format!("failed to write {path}"))?;
    Ok(())
}
