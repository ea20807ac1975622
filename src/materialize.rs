use std::collections::{BTreeMap, BTreeSet};
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::apply;
use crate::config::MaterializeConfig;
use crate::corpus;
use crate::feed::{CandidateFeed, LineFeed};
use crate::lines;
use crate::mutants::ApplyOutcome;

/// Mutations read from an upstream engine, in either granularity.
#[derive(Debug, Clone)]
pub enum MutationFeed {
    Characters(CandidateFeed),
    Lines(LineFeed),
}

impl MutationFeed {
    pub fn contains(&self, filename: &str) -> bool {
        match self {
            MutationFeed::Characters(feed) => feed.contains_key(filename),
            MutationFeed::Lines(feed) => feed.contains_key(filename),
        }
    }

    pub fn file_names(&self) -> Vec<&str> {
        match self {
            MutationFeed::Characters(feed) => feed.keys().map(String::as_str).collect(),
            MutationFeed::Lines(feed) => feed.keys().map(String::as_str).collect(),
        }
    }

    pub fn operators(&self, filename: &str) -> BTreeSet<String> {
        match self {
            MutationFeed::Characters(feed) => feed
                .get(filename)
                .into_iter()
                .flatten()
                .map(|c| c.operator.clone())
                .collect(),
            MutationFeed::Lines(feed) => feed
                .get(filename)
                .into_iter()
                .flatten()
                .map(|m| m.operator.clone())
                .collect(),
        }
    }

    /// Build cumulative mutants of `text`, optionally restricted to one operator.
    pub fn apply(
        &self,
        filename: &str,
        text: &str,
        operator: Option<&str>,
        config: &MaterializeConfig,
    ) -> ApplyOutcome {
        let keep = |op: &str| operator.is_none_or(|wanted| wanted == op);
        match self {
            MutationFeed::Characters(feed) => {
                let candidates: Vec<_> = feed
                    .get(filename)
                    .into_iter()
                    .flatten()
                    .filter(|c| keep(c.operator.as_str()))
                    .cloned()
                    .collect();
                apply::apply(text, &candidates, config.mutations)
            }
            MutationFeed::Lines(feed) => {
                let mutations: Vec<_> = feed
                    .get(filename)
                    .into_iter()
                    .flatten()
                    .filter(|m| keep(m.operator.as_str()))
                    .cloned()
                    .collect();
                lines::apply_lines(
                    text,
                    &mutations,
                    config.mutations,
                    config.line_policy,
                    config.line_adjust,
                )
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("source directory not found: {0}")]
    MissingSources(Utf8PathBuf),
    #[error("failed to read {path}: {source}")]
    Read {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Mutants produced for one file (and operator, when partitioned).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub file: String,
    pub operator: Option<String>,
    pub requested: usize,
    pub produced: usize,
}

impl ReportRow {
    /// Fewer non-overlapping mutations were available than requested.
    pub fn is_short(&self) -> bool {
        self.produced < self.requested
    }
}

#[derive(Debug, Clone, Default)]
pub struct MaterializeReport {
    pub rows: Vec<ReportRow>,
    /// Feed entries whose source file could not be found.
    pub skipped: Vec<String>,
    /// Feed entries left out because another file shares their stem.
    pub conflicts: Vec<String>,
}

impl MaterializeReport {
    pub fn shortfalls(&self) -> impl Iterator<Item = &ReportRow> {
        self.rows.iter().filter(|r| r.is_short())
    }
}

/// Materialize mutants for every eligible file of `sources` that has feed entries.
pub fn materialize(
    sources: &Utf8Path,
    feed: &MutationFeed,
    config: &MaterializeConfig,
) -> Result<MaterializeReport, MaterializeError> {
    if !sources.is_dir() {
        return Err(MaterializeError::MissingSources(sources.to_path_buf()));
    }

    let mut present: BTreeSet<String> = BTreeSet::new();
    let entries = sources.read_dir_utf8().map_err(|source| MaterializeError::Read {
        path: sources.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| MaterializeError::Read {
            path: sources.to_path_buf(),
            source,
        })?;
        let is_file = entry.file_type().is_ok_and(|ft| ft.is_file());
        if is_file && crate::detect_language(entry.path().as_std_path()).is_some() {
            present.insert(entry.file_name().to_string());
        }
    }

    let names = feed.file_names();
    let colliding = colliding_stems(names.iter().copied().filter(|f| present.contains(*f)));

    let mut report = MaterializeReport::default();
    for filename in names {
        if !present.contains(filename) {
            warn!(file = filename, "no source file for feed entry, skipping");
            report.skipped.push(filename.to_string());
            continue;
        }
        if colliding.contains(filename) {
            warn!(
                file = filename,
                stem = corpus::file_stem(filename),
                "another source file shares this stem, skipping"
            );
            report.conflicts.push(filename.to_string());
            continue;
        }
        let path = sources.join(filename);
        let text = fs::read_to_string(&path).map_err(|source| MaterializeError::Read {
            path: path.clone(),
            source,
        })?;
        let rows = materialize_file(filename, &text, feed, config)?;
        report.rows.extend(rows);
    }

    for filename in present.iter().filter(|f| !feed.contains(f)) {
        debug!(file = %filename, "source file has no mutations in feed");
    }

    Ok(report)
}

/// File names that map to the same `<out>/<stem>/` directory as another one.
fn colliding_stems<'a>(names: impl Iterator<Item = &'a str>) -> BTreeSet<&'a str> {
    let mut by_stem: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for name in names {
        by_stem.entry(corpus::file_stem(name)).or_default().push(name);
    }
    by_stem.into_values().filter(|group| group.len() > 1).flatten().collect()
}

/// Write the original and all cumulative mutants of one file. Any previous
/// output for the file is replaced.
pub fn materialize_file(
    filename: &str,
    text: &str,
    feed: &MutationFeed,
    config: &MaterializeConfig,
) -> Result<Vec<ReportRow>, MaterializeError> {
    let root = &config.out_dir;
    let file_dir = root.join(corpus::file_stem(filename));
    if file_dir.exists() {
        fs::remove_dir_all(&file_dir).map_err(|source| MaterializeError::Write {
            path: file_dir.clone(),
            source,
        })?;
    }
    write_file(&corpus::original_path(root, filename), text)?;

    let operators: Vec<Option<String>> = if config.by_operator {
        feed.operators(filename).into_iter().map(Some).collect()
    } else {
        vec![None]
    };

    let mut rows = Vec::with_capacity(operators.len());
    for operator in operators {
        let segment = match operator.as_deref() {
            None => None,
            Some(op) => match corpus::operator_dir(op) {
                Some(dir) => Some(dir),
                None => {
                    warn!(file = filename, operator = op, "operator label is not a directory name, skipping");
                    continue;
                }
            },
        };
        let outcome = feed.apply(filename, text, operator.as_deref(), config);
        for (i, snapshot) in outcome.snapshots.iter().enumerate() {
            let path = corpus::mutant_path(root, filename, i + 1, segment);
            write_file(&path, &snapshot.text)?;
        }

        let row = ReportRow {
            file: filename.to_string(),
            operator,
            requested: outcome.requested,
            produced: outcome.produced(),
        };
        if row.is_short() {
            warn!(
                file = filename,
                operator = row.operator.as_deref().unwrap_or("-"),
                produced = row.produced,
                requested = row.requested,
                "not enough non-overlapping mutations"
            );
        } else {
            info!(
                file = filename,
                operator = row.operator.as_deref().unwrap_or("-"),
                produced = row.produced,
                "mutants written"
            );
        }
        rows.push(row);
    }

    Ok(rows)
}

fn write_file(path: &Utf8Path, contents: &str) -> Result<(), MaterializeError> {
    let write = || -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)
    };
    write().map_err(|source| MaterializeError::Write {
        path: path.to_path_buf(),
        source,
    })
}
