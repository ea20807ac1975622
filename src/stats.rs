//! Per-bucket and per-operator averages over completed result sets, and the
//! linear correlation between two backends.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::warn;

use crate::diff::Backend;
use crate::results::ResultSet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Accum {
    pub sum: f64,
    pub count: usize,
}

impl Accum {
    pub fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Which operators take part in an aggregation. An empty include set admits
/// every operator not excluded.
#[derive(Debug, Clone, Default)]
pub struct OperatorFilter {
    pub include: BTreeSet<String>,
    pub exclude: BTreeSet<String>,
}

impl OperatorFilter {
    pub fn allows(&self, operator: &str) -> bool {
        (self.include.is_empty() || self.include.contains(operator)) && !self.exclude.contains(operator)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregateTable {
    pub backend: Option<Backend>,
    /// Index `i` holds mutants with `i + 1` mutations.
    pub buckets: Vec<Accum>,
    pub operators: BTreeMap<String, Vec<Accum>>,
    pub failures: usize,
    /// Outcomes from a different backend than the first one seen; excluded.
    pub mismatched: usize,
}

impl AggregateTable {
    pub fn means(&self) -> Vec<Option<f64>> {
        self.buckets.iter().map(Accum::mean).collect()
    }

    pub fn operator_means(&self, operator: &str) -> Option<Vec<Option<f64>>> {
        self.operators
            .get(operator)
            .map(|accs| accs.iter().map(Accum::mean).collect())
    }

    pub fn successes(&self) -> usize {
        self.buckets.iter().map(|a| a.count).sum()
    }
}

fn slot(accs: &mut Vec<Accum>, count: usize) -> &mut Accum {
    if accs.len() < count {
        accs.resize(count, Accum::default());
    }
    &mut accs[count - 1]
}

/// Average magnitudes per mutation count and per operator. Failed diffs are
/// left out of both sum and count.
pub fn aggregate(set: &ResultSet, filter: &OperatorFilter) -> AggregateTable {
    let mut table = AggregateTable::default();
    for record in set.records().filter(|r| filter.allows(r.operator)) {
        let (Some(magnitude), Some(backend)) = (record.outcome.magnitude(), record.outcome.backend()) else {
            table.failures += 1;
            continue;
        };
        match table.backend {
            None => table.backend = Some(backend),
            Some(seen) if seen != backend => {
                table.mismatched += 1;
                continue;
            }
            Some(_) => {}
        }
        let value = magnitude as f64;
        slot(&mut table.buckets, record.count).add(value);
        let per_op = table.operators.entry(record.operator.to_string()).or_default();
        slot(per_op, record.count).add(value);
    }
    if table.mismatched > 0 {
        warn!(mismatched = table.mismatched, "result set mixes backends, extra outcomes ignored");
    }
    table
}

/// Pearson correlation coefficient; `None` with fewer than two pairs or zero variance.
pub fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for &(x, y) in pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    let denom = (var_x * var_y).sqrt();
    (denom > 0.0).then(|| cov / denom)
}

/// Magnitudes of mutants diffed successfully in both sets.
pub fn paired_magnitudes(left: &ResultSet, right: &ResultSet, filter: &OperatorFilter) -> Vec<(f64, f64)> {
    left.records()
        .filter(|r| filter.allows(r.operator))
        .filter_map(|r| {
            let a = r.outcome.magnitude()?;
            let b = right.get(r.file, r.count, r.operator)?.magnitude()?;
            Some((a as f64, b as f64))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub left: AggregateTable,
    pub right: AggregateTable,
    /// Mutants diffed successfully by both backends.
    pub pairs: usize,
    pub mutant_correlation: Option<f64>,
    /// Correlation of the per-bucket means.
    pub bucket_correlation: Option<f64>,
}

pub fn compare(left: &ResultSet, right: &ResultSet, filter: &OperatorFilter) -> Comparison {
    let left_table = aggregate(left, filter);
    let right_table = aggregate(right, filter);
    let pairs = paired_magnitudes(left, right, filter);
    let bucket_pairs: Vec<(f64, f64)> = left_table
        .means()
        .into_iter()
        .zip(right_table.means())
        .filter_map(|(a, b)| Some((a?, b?)))
        .collect();

    Comparison {
        pairs: pairs.len(),
        mutant_correlation: pearson(&pairs),
        bucket_correlation: pearson(&bucket_pairs),
        left: left_table,
        right: right_table,
    }
}
