//! Line-anchored mutant construction for engines that only report a line
//! number and a full replacement line.

use std::collections::HashSet;

use tracing::debug;

use crate::mutants::{ApplyOutcome, LineMutation, RejectReason, Rejection, Snapshot};

/// What to do when a second mutation targets a line that was already rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineCollision {
    /// Insert the new line as an adjacent statement. A line opening a block
    /// gets a closing `}`; trailing whitespace after the `{` is ignored.
    #[default]
    Insert,
    /// Drop the mutation.
    Skip,
}

/// Apply up to `k` line mutations cumulatively. `line_adjust` is added to the
/// reported line number to obtain the 0-based index into the original text.
pub fn apply_lines(
    text: &str,
    mutations: &[LineMutation],
    k: usize,
    policy: LineCollision,
    line_adjust: i64,
) -> ApplyOutcome {
    let mut order: Vec<usize> = (0..mutations.len()).collect();
    order.sort_by_key(|&i| mutations[i].line);

    let mut outcome = ApplyOutcome::new(k);
    let mut lines: Vec<String> = text.split('\n').map(str::to_string).collect();
    let mut used_lines: HashSet<usize> = HashSet::new();
    let mut inserts = 0usize;

    for index in order {
        if outcome.is_full() {
            break;
        }
        let mutation = &mutations[index];

        let Some(line) = adjusted(mutation.line, line_adjust) else {
            outcome.rejected.push(Rejection { index, reason: RejectReason::OutOfBounds });
            continue;
        };
        let target = line + inserts;

        if !used_lines.contains(&line) {
            let Some(slot) = lines.get_mut(target) else {
                debug!(index, line, "line mutation beyond end of file");
                outcome.rejected.push(Rejection { index, reason: RejectReason::OutOfBounds });
                continue;
            };
            debug!(index, line = target, "line mutated with {}", mutation.replacement);
            *slot = mutation.replacement.clone();
            used_lines.insert(line);
        } else {
            match policy {
                LineCollision::Skip => {
                    debug!(index, line, "line already mutated, skipping");
                    outcome.rejected.push(Rejection { index, reason: RejectReason::Overlap });
                    continue;
                }
                LineCollision::Insert => {
                    if target > lines.len() {
                        outcome.rejected.push(Rejection { index, reason: RejectReason::OutOfBounds });
                        continue;
                    }
                    let mut inserted = mutation.replacement.clone();
                    if inserted.trim_end().ends_with('{') {
                        inserted.push('}');
                    }
                    debug!(index, line = target, "line already mutated, inserting {}", inserted);
                    lines.insert(target, inserted);
                    inserts += 1;
                }
            }
        }

        outcome.snapshots.push(Snapshot {
            text: lines.join("\n"),
            index,
            operator: mutation.operator.clone(),
        });
    }

    outcome
}

fn adjusted(line: usize, adjust: i64) -> Option<usize> {
    let adjust = isize::try_from(adjust).ok()?;
    line.checked_add_signed(adjust)
}
