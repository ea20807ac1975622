//! Change counting for difftastic's JSON output.
//!
//! difftastic reports the two sides of a replacement as separate spans that
//! usually describe the same edit. Within one line, a span only counts when
//! none of its character indices were already claimed by an earlier span of
//! either side. This is an approximation: partially overlapping spans count
//! once, and spans are never merged across lines or hunks.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSpan {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineSide {
    #[serde(default)]
    pub line_number: Option<u64>,
    #[serde(default)]
    pub changes: Vec<ChangeSpan>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkLine {
    #[serde(default)]
    pub lhs: Option<LineSide>,
    #[serde(default)]
    pub rhs: Option<LineSide>,
}

/// A hunk is a list of aligned lines.
pub type Chunk = Vec<ChunkLine>;

pub fn count_changes(chunks: &[Chunk]) -> usize {
    chunks
        .iter()
        .flatten()
        .map(|line| {
            let lhs = line.lhs.as_ref().map(|s| s.changes.as_slice()).unwrap_or_default();
            let rhs = line.rhs.as_ref().map(|s| s.changes.as_slice()).unwrap_or_default();
            count_line(lhs, rhs)
        })
        .sum()
}

/// Count the spans of one line, `first` side before `second`.
pub fn count_line(first: &[ChangeSpan], second: &[ChangeSpan]) -> usize {
    let mut used: HashSet<usize> = HashSet::new();
    let mut count = 0;
    for span in first.iter().chain(second) {
        let range = span.start..span.end;
        if range.clone().any(|i| used.contains(&i)) {
            continue;
        }
        used.extend(range);
        count += 1;
    }
    count
}
