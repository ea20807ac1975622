//! Cumulative application of character-level mutation candidates.
//!
//! Candidates come from an external engine and may overlap. Each accepted
//! candidate is spliced into the running text; every later candidate is mapped
//! into current coordinates through the accumulated length drift and checked
//! against the set of characters already touched.

use tracing::{debug, warn};

use crate::mutants::{ApplyOutcome, MutationCandidate, RejectReason, Rejection, Snapshot};

/// Sorted, disjoint, half-open ranges of characters already rewritten.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UsedRanges {
    ranges: Vec<(usize, usize)>,
}

impl UsedRanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ranges(&self) -> &[(usize, usize)] {
        &self.ranges
    }

    /// True when no character of `[start, end)` has been touched.
    /// An empty range is always free.
    pub fn is_free(&self, start: usize, end: usize) -> bool {
        if start >= end {
            return true;
        }
        let idx = self.ranges.partition_point(|&(_, b)| b <= start);
        match self.ranges.get(idx) {
            Some(&(a, _)) => a >= end,
            None => true,
        }
    }

    /// Record that `[start, start + old_len)` was replaced by `new_len`
    /// characters. Later ranges move with the text; the new span is marked used.
    pub fn splice(&mut self, start: usize, old_len: usize, new_len: usize) {
        let old_end = start + old_len;
        for range in &mut self.ranges {
            if range.0 >= old_end {
                range.0 = shift(range.0, old_len, new_len);
                range.1 = shift(range.1, old_len, new_len);
            } else if range.1 > start {
                range.1 = shift(range.1, old_len, new_len).max(range.0);
            }
        }
        self.ranges.retain(|&(a, b)| a < b);
        if new_len > 0 {
            self.insert(start, start + new_len);
        }
    }

    fn insert(&mut self, start: usize, end: usize) {
        let idx = self.ranges.partition_point(|&(_, b)| b < start);
        let mut merged = (start, end);
        let mut last = idx;
        while let Some(&(a, b)) = self.ranges.get(last) {
            if a > merged.1 {
                break;
            }
            merged.0 = merged.0.min(a);
            merged.1 = merged.1.max(b);
            last += 1;
        }
        self.ranges.splice(idx..last, [merged]);
    }
}

fn shift(pos: usize, old_len: usize, new_len: usize) -> usize {
    (pos + new_len).saturating_sub(old_len)
}

/// Apply up to `k` candidates to `text`, returning one snapshot per accepted
/// candidate. Candidates are sorted by `start` (stable) before application.
pub fn apply(text: &str, candidates: &[MutationCandidate], k: usize) -> ApplyOutcome {
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by_key(|&i| candidates[i].start);

    let mut outcome = ApplyOutcome::new(k);
    let mut current: Vec<char> = text.chars().collect();
    let mut used = UsedRanges::new();
    let mut offset: isize = 0;
    let mut prev_start: Option<usize> = None;

    for index in order {
        if outcome.is_full() {
            break;
        }
        let candidate = &candidates[index];

        if candidate.spans_lines() {
            debug!(index, operator = %candidate.operator, "skipping multi-line mutation");
            outcome.rejected.push(Rejection { index, reason: RejectReason::MultiLine });
            continue;
        }

        let bounds = shifted(candidate.start, offset).zip(shifted(candidate.end, offset));
        let (mut_start, mut_end) = match bounds {
            Some((s, e)) if s <= e && e <= current.len() => (s, e),
            _ => {
                debug!(index, start = candidate.start, end = candidate.end, "mutation out of bounds");
                outcome.rejected.push(Rejection { index, reason: RejectReason::OutOfBounds });
                continue;
            }
        };

        if !used.is_free(mut_start, mut_end) {
            debug!(index, mut_start, mut_end, "mutation overlaps an applied one");
            outcome.rejected.push(Rejection { index, reason: RejectReason::Overlap });
            continue;
        }
        if prev_start.is_some_and(|prev| mut_start <= prev) {
            debug!(index, mut_start, "mutation out of order after offset");
            outcome.rejected.push(Rejection { index, reason: RejectReason::OutOfOrder });
            continue;
        }

        let replaced: String = current[mut_start..mut_end].iter().collect();
        if !candidate.original.is_empty() && replaced != candidate.original {
            warn!(
                index,
                expected = %candidate.original,
                found = %replaced,
                "mutation original text does not match source"
            );
        }

        let replacement: Vec<char> = candidate.replacement.chars().collect();
        let old_len = mut_end - mut_start;
        let new_len = replacement.len();
        current.splice(mut_start..mut_end, replacement);
        used.splice(mut_start, old_len, new_len);
        offset += new_len as isize - old_len as isize;
        prev_start = Some(mut_start);

        debug!(
            index,
            operator = %candidate.operator,
            mut_start,
            mut_end,
            "{} --> {}",
            candidate.original,
            candidate.replacement
        );

        outcome.snapshots.push(Snapshot {
            text: current.iter().collect(),
            index,
            operator: candidate.operator.clone(),
        });
    }

    outcome
}

fn shifted(pos: usize, offset: isize) -> Option<usize> {
    pos.checked_add_signed(offset)
}
