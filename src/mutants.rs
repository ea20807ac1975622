use serde::{Deserialize, Serialize};

/// A character-level substitution proposed by an upstream mutation engine.
/// Offsets index Unicode scalar values of the unmutated source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationCandidate {
    pub start: usize,
    pub end: usize,
    #[serde(default)]
    pub original: String,
    #[serde(rename = "replace")]
    pub replacement: String,
    #[serde(default)]
    pub start_line: Option<usize>,
    #[serde(default)]
    pub end_line: Option<usize>,
    #[serde(default)]
    pub operator: String,
}

impl MutationCandidate {
    pub fn spans_lines(&self) -> bool {
        matches!((self.start_line, self.end_line), (Some(a), Some(b)) if a != b)
    }
}

/// A whole-line replacement reported by a line-anchored engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineMutation {
    pub line: usize,
    pub replacement: String,
    #[serde(default)]
    pub operator: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    MultiLine,
    Overlap,
    OutOfOrder,
    OutOfBounds,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub index: usize,
    pub reason: RejectReason,
}

/// Cumulative text after one more accepted mutation.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub text: String,
    pub index: usize,
    pub operator: String,
}

#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    pub requested: usize,
    pub snapshots: Vec<Snapshot>,
    pub rejected: Vec<Rejection>,
}

impl ApplyOutcome {
    pub(crate) fn new(requested: usize) -> Self {
        Self {
            requested,
            snapshots: Vec::with_capacity(requested),
            rejected: Vec::new(),
        }
    }

    pub fn produced(&self) -> usize {
        self.snapshots.len()
    }

    /// Number of mutants missing to reach the requested count.
    pub fn shortfall(&self) -> usize {
        self.requested.saturating_sub(self.produced())
    }

    pub fn is_complete(&self) -> bool {
        self.shortfall() == 0
    }

    pub(crate) fn is_full(&self) -> bool {
        self.snapshots.len() >= self.requested
    }
}
