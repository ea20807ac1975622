use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::mutants::{LineMutation, MutationCandidate};

/// Mutation candidates per source file name.
pub type CandidateFeed = BTreeMap<String, Vec<MutationCandidate>>;

/// Line mutations per source file name.
pub type LineFeed = BTreeMap<String, Vec<LineMutation>>;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("mutation feed not found: {path}")]
    Missing { path: Utf8PathBuf },
    #[error("failed to read mutation feed {path}: {source}")]
    Read {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("mutation feed {path} is not valid JSON: {source}")]
    Json {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub fn load_candidates(path: &Utf8Path) -> Result<CandidateFeed, FeedError> {
    load(path)
}

pub fn load_lines(path: &Utf8Path) -> Result<LineFeed, FeedError> {
    load(path)
}

fn load<T: DeserializeOwned>(path: &Utf8Path) -> Result<T, FeedError> {
    if !path.is_file() {
        return Err(FeedError::Missing { path: path.to_path_buf() });
    }
    let data = std::fs::read_to_string(path).map_err(|source| FeedError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&data).map_err(|source| FeedError::Json {
        path: path.to_path_buf(),
        source,
    })
}
