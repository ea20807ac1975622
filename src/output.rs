use console::Style;
use std::io::Write;

use crate::materialize::MaterializeReport;
use crate::results::ResultSet;
use crate::stats::{AggregateTable, Comparison};

pub fn print_error(msg: &str) {
    let style = Style::new().red().bold();
    eprintln!("{} {}", style.apply_to("✗"), msg);
}

pub fn print_success(msg: &str) {
    let style = Style::new().green().bold();
    println!("{} {}", style.apply_to("✓"), msg);
}

pub fn print_warning(msg: &str) {
    let style = Style::new().yellow().bold();
    eprintln!("{} {}", style.apply_to("!"), msg);
}

/// Overwrite the current stderr line with a files-done counter.
pub fn print_progress(done: usize, total: usize) {
    let dim = Style::new().dim();
    let mut err = std::io::stderr().lock();
    let _ = write!(err, "\r{} Files done: {}/{}", dim.apply_to("·"), done, total);
    if done == total {
        let _ = writeln!(err);
    }
    let _ = err.flush();
}

pub fn print_materialize_report(report: &MaterializeReport) {
    let files = report.rows.iter().map(|r| r.file.as_str()).collect::<std::collections::BTreeSet<_>>();
    let produced: usize = report.rows.iter().map(|r| r.produced).sum();
    print_success(&format!("{} mutants written for {} files", produced, files.len()));

    let dim = Style::new().dim();
    for row in report.shortfalls() {
        let label = match &row.operator {
            Some(op) => format!("{} [{}]", row.file, op),
            None => row.file.clone(),
        };
        print_warning(&format!(
            "insufficient candidates for {}: {}/{} mutants",
            label, row.produced, row.requested
        ));
    }
    for name in &report.skipped {
        println!("  {} {} has no source file, skipped", dim.apply_to("·"), name);
    }
    for name in &report.conflicts {
        print_warning(&format!("{name} shares its stem with another source file, skipped"));
    }
}

pub fn print_run_summary(set: &ResultSet, backend: &str, seconds: f64) {
    let total = set.records().count();
    let failed = set.records().filter(|r| r.outcome.is_failure()).count();

    if failed == 0 {
        print_success(&format!(
            "{}: {} mutants diffed across {} files in {:.1}s",
            backend,
            total,
            set.len(),
            seconds
        ));
        return;
    }

    let style = Style::new().yellow().bold();
    println!(
        "{} {}: {} mutants diffed across {} files, {} failed in {:.1}s",
        style.apply_to("!"),
        backend,
        total,
        set.len(),
        failed,
        seconds
    );
    let dim = Style::new().dim();
    for record in set.records().filter(|r| r.outcome.is_failure()) {
        println!(
            "  {} {} n={} [{}]",
            dim.apply_to("·"),
            record.file,
            record.count,
            record.operator
        );
    }
}

fn fmt_mean(mean: Option<f64>) -> String {
    mean.map(|m| format!("{m:.2}")).unwrap_or_else(|| "-".to_string())
}

pub fn print_table(label: &str, table: &AggregateTable, per_operator: bool) {
    let head = Style::new().cyan().bold();
    let dim = Style::new().dim();
    let backend = table.backend.map(|b| b.name()).unwrap_or("?");

    println!("{} ({})", head.apply_to(label), backend);
    let means: Vec<String> = table.means().into_iter().map(fmt_mean).collect();
    let counts: Vec<String> = table.buckets.iter().map(|a| a.count.to_string()).collect();
    println!("  mean per n: [{}]", means.join(", "));
    println!("  {}", dim.apply_to(format!("mutants:    [{}]", counts.join(", "))));
    if table.failures > 0 {
        println!("  {}", dim.apply_to(format!("{} failed diffs excluded", table.failures)));
    }

    if per_operator {
        let op_style = Style::new().magenta();
        for (op, accs) in &table.operators {
            let means: Vec<String> = accs.iter().map(|a| fmt_mean(a.mean())).collect();
            println!("  {} [{}]", op_style.apply_to(format!("{op:>8}")), means.join(", "));
        }
    }
}

pub fn print_comparison(cmp: &Comparison, per_operator: bool) {
    print_table("left", &cmp.left, per_operator);
    println!();
    print_table("right", &cmp.right, per_operator);
    println!();
    println!(
        "Paired mutants: {}, correlation: {}, bucket-mean correlation: {}",
        cmp.pairs,
        fmt_mean(cmp.mutant_correlation),
        fmt_mean(cmp.bucket_correlation)
    );
}

/// `-`/`+` lines for every changed line between two texts.
pub fn line_diff(original: &str, mutated: &str) -> String {
    use similar::TextDiff;
    let diff = TextDiff::from_lines(original, mutated);
    let mut output = String::new();
    for change in diff.iter_all_changes() {
        match change.tag() {
            similar::ChangeTag::Delete => {
                output.push_str(&format!("- {}", change));
            }
            similar::ChangeTag::Insert => {
                output.push_str(&format!("+ {}", change));
            }
            _ => {}
        }
    }
    output
}

pub fn print_mutant_diff(label: &str, original: &str, mutated: &str) {
    let ref_style = Style::new().cyan().bold();
    println!("{}", ref_style.apply_to(label));
    println!();

    let diff = line_diff(original, mutated);
    if diff.is_empty() {
        println!("  {}", Style::new().dim().apply_to("(identical to original)"));
        return;
    }
    for line in diff.lines() {
        if line.starts_with('-') {
            let del_style = Style::new().red();
            println!("  {}", del_style.apply_to(line));
        } else if line.starts_with('+') {
            let add_style = Style::new().green();
            println!("  {}", add_style.apply_to(line));
        }
    }
}
