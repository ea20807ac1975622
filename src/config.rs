use std::time::Duration;

use camino::Utf8PathBuf;

use crate::diff::Backend;
use crate::lines::LineCollision;

/// Settings for writing a mutant corpus.
#[derive(Debug, Clone)]
pub struct MaterializeConfig {
    pub out_dir: Utf8PathBuf,
    /// Number of cumulative mutants to produce per file (and per operator).
    pub mutations: usize,
    /// Apply each operator's candidates independently into `<n>/<operator>/`.
    pub by_operator: bool,
    pub line_policy: LineCollision,
    /// Added to line numbers reported by line-anchored engines.
    pub line_adjust: i64,
}

impl MaterializeConfig {
    pub fn new(out_dir: impl Into<Utf8PathBuf>, mutations: usize) -> Self {
        Self {
            out_dir: out_dir.into(),
            mutations,
            by_operator: false,
            line_policy: LineCollision::default(),
            line_adjust: 0,
        }
    }
}

/// How to reach the external diff tools.
#[derive(Debug, Clone)]
pub struct ToolConfig {
    /// GumTree command; may carry leading arguments (`java -jar gumtree.jar`).
    pub gumtree: String,
    pub difft: String,
    pub timeout: Option<Duration>,
    /// Keep the raw backend payload in each outcome.
    pub keep_detail: bool,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            gumtree: "gumtree".to_string(),
            difft: "difft".to_string(),
            timeout: None,
            keep_detail: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub backend: Backend,
    pub tools: ToolConfig,
    pub workers: usize,
    /// Append each finished file to this JSON Lines file.
    pub jsonl: Option<Utf8PathBuf>,
    /// Also write every outcome to its own file under this directory.
    pub per_mutant: Option<Utf8PathBuf>,
    pub progress: bool,
}

impl RunConfig {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            tools: ToolConfig::default(),
            workers: default_workers(),
            jsonl: None,
            per_mutant: None,
            progress: false,
        }
    }
}

pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(usize::from)
        .unwrap_or(1)
}
