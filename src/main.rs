use mutdiff::config::{self, MaterializeConfig, RunConfig, ToolConfig};
use mutdiff::corpus;
use mutdiff::diff::Backend;
use mutdiff::driver::{self, CancelToken, RunError};
use mutdiff::feed;
use mutdiff::lines::LineCollision;
use mutdiff::materialize::{self, MutationFeed};
use mutdiff::output;
use mutdiff::results;
use mutdiff::stats::{self, OperatorFilter};

use std::process;
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "mutdiff", version, about = "Measure how diff tools size injected mutations")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write cumulative mutants for every source file in a directory
    Materialize {
        /// Directory holding the unmutated source files
        sources: Utf8PathBuf,
        /// Mutation feed (JSON, file name -> mutations)
        #[arg(short, long)]
        feed: Utf8PathBuf,
        /// Number of cumulative mutants per file
        #[arg(short = 'n', long)]
        mutations: usize,
        /// Corpus output directory
        #[arg(short, long, default_value = "mutants")]
        out: Utf8PathBuf,
        /// Apply each operator's mutations separately into <n>/<operator>/
        #[arg(long)]
        by_operator: bool,
        /// Feed holds line mutations ({line, replacement}) instead of character spans
        #[arg(long)]
        lines: bool,
        /// Added to reported line numbers to get 0-based indices (Gambit: 2)
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        line_adjust: i64,
        /// Drop line mutations hitting an already mutated line instead of inserting
        #[arg(long)]
        skip_used_lines: bool,
    },
    /// Diff every mutant of a corpus against its original
    Run {
        /// Corpus root produced by `materialize`
        corpus: Utf8PathBuf,
        /// Diff tool: GT (GumTree) or difft (difftastic)
        backend: String,
        /// Directory for result files
        #[arg(short, long, default_value = "results")]
        out: Utf8PathBuf,
        /// Worker threads (default: available parallelism)
        #[arg(short, long, env = "MUTDIFF_WORKERS")]
        workers: Option<usize>,
        /// GumTree command
        #[arg(long, env = "MUTDIFF_GUMTREE", default_value = "gumtree")]
        gumtree: String,
        /// difftastic command
        #[arg(long, env = "MUTDIFF_DIFFT", default_value = "difft")]
        difft: String,
        /// Per-invocation timeout in seconds
        #[arg(long, env = "MUTDIFF_TOOL_TIMEOUT")]
        timeout: Option<f64>,
        /// Keep the raw tool output of every diff
        #[arg(long)]
        keep_detail: bool,
        /// Also append each finished file to results_<backend>.jsonl
        #[arg(long)]
        jsonl: bool,
        /// Also write each outcome to <out>/<file>/<n>/<operator>/diff_result_<backend>.json
        #[arg(long)]
        per_mutant: bool,
        /// Print the result set as JSON on stdout
        #[arg(long)]
        json: bool,
        /// No progress or summary output
        #[arg(short, long)]
        quiet: bool,
    },
    /// Average magnitudes per mutation count and operator
    Stats {
        /// Result set (.json or .jsonl); repeat to merge several runs
        #[arg(required = true)]
        results: Vec<Utf8PathBuf>,
        /// Result set of the other backend to compare against; repeat to merge
        #[arg(long)]
        against: Vec<Utf8PathBuf>,
        /// Only these operators
        #[arg(long = "operator")]
        operators: Vec<String>,
        /// Leave out these operators
        #[arg(long)]
        exclude: Vec<String>,
        /// Break means down per operator
        #[arg(long)]
        per_operator: bool,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the line diff between an original and one of its mutants
    Inspect {
        corpus: Utf8PathBuf,
        /// File directory name (source file stem)
        file: String,
        /// Mutation count
        count: usize,
        /// Operator subdirectory
        #[arg(long)]
        operator: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit_code = match cli.command {
        Commands::Materialize {
            sources,
            feed,
            mutations,
            out,
            by_operator,
            lines,
            line_adjust,
            skip_used_lines,
        } => {
            let config = MaterializeConfig {
                out_dir: out,
                mutations,
                by_operator,
                line_policy: if skip_used_lines { LineCollision::Skip } else { LineCollision::Insert },
                line_adjust,
            };
            cmd_materialize(sources, feed, lines, config)
        }
        Commands::Run {
            corpus,
            backend,
            out,
            workers,
            gumtree,
            difft,
            timeout,
            keep_detail,
            jsonl,
            per_mutant,
            json,
            quiet,
        } => {
            let tools = ToolConfig {
                gumtree,
                difft,
                timeout: timeout.filter(|t| *t > 0.0).map(Duration::from_secs_f64),
                keep_detail,
            };
            cmd_run(corpus, backend, out, workers, tools, jsonl, per_mutant, json, quiet)
        }
        Commands::Stats {
            results,
            against,
            operators,
            exclude,
            per_operator,
            json,
        } => {
            let filter = OperatorFilter {
                include: operators.into_iter().collect(),
                exclude: exclude.into_iter().collect(),
            };
            cmd_stats(results, against, filter, per_operator, json)
        }
        Commands::Inspect {
            corpus,
            file,
            count,
            operator,
        } => cmd_inspect(corpus, file, count, operator),
    };

    process::exit(exit_code);
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn cmd_materialize(sources: Utf8PathBuf, feed_path: Utf8PathBuf, lines: bool, config: MaterializeConfig) -> i32 {
    if config.mutations == 0 {
        output::print_error("Number of mutations must be at least 1.");
        return 2;
    }

    let loaded = if lines {
        feed::load_lines(&feed_path).map(MutationFeed::Lines)
    } else {
        feed::load_candidates(&feed_path).map(MutationFeed::Characters)
    };
    let feed = match loaded {
        Ok(f) => f,
        Err(e) => {
            output::print_error(&e.to_string());
            return 2;
        }
    };

    match materialize::materialize(&sources, &feed, &config) {
        Ok(report) => {
            output::print_materialize_report(&report);
            0
        }
        Err(materialize::MaterializeError::MissingSources(path)) => {
            output::print_error(&format!("Source directory not found: {path}. Check the path and try again."));
            2
        }
        Err(e) => {
            output::print_error(&e.to_string());
            3
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_run(
    corpus: Utf8PathBuf,
    backend: String,
    out: Utf8PathBuf,
    workers: Option<usize>,
    tools: ToolConfig,
    jsonl: bool,
    per_mutant: bool,
    json_mode: bool,
    quiet: bool,
) -> i32 {
    let backend: Backend = match backend.parse() {
        Ok(b) => b,
        Err(e) => {
            output::print_error(&format!("{e}"));
            return 2;
        }
    };
    if !corpus.is_dir() {
        output::print_error(&format!("Corpus not found: {corpus}. Run `mutdiff materialize` first."));
        return 2;
    }

    let config = RunConfig {
        backend,
        tools,
        workers: workers.filter(|w| *w > 0).unwrap_or_else(config::default_workers),
        jsonl: jsonl.then(|| results::jsonl_path(&out, backend)),
        per_mutant: per_mutant.then(|| out.clone()),
        progress: !quiet && !json_mode,
    };

    let start = Instant::now();
    let set = match driver::run(&corpus, &config, &CancelToken::new()) {
        Ok(set) => set,
        Err(RunError::MissingCorpus(path)) => {
            output::print_error(&format!("Corpus not found: {path}."));
            return 2;
        }
        Err(e) => {
            output::print_error(&format!("Diff run failed: {e}"));
            return 3;
        }
    };
    let seconds = start.elapsed().as_secs_f64();

    let results_file = results::results_path(&out, backend);
    if let Err(e) = results::save(&set, &results_file) {
        output::print_error(&format!("{e:#}"));
        return 3;
    }
    if let Err(e) = results::record_running_time(&out.join("running_time.json"), backend, seconds) {
        output::print_warning(&format!("{e:#}"));
    }

    if json_mode {
        match serde_json::to_string(&set) {
            Ok(s) => println!("{s}"),
            Err(e) => {
                output::print_error(&format!("Failed to serialize results: {e}"));
                return 3;
            }
        }
    } else if !quiet {
        output::print_run_summary(&set, backend.name(), seconds);
        println!("Results written to {results_file}");
    }
    0
}

fn load_merged(paths: &[Utf8PathBuf]) -> anyhow::Result<results::ResultSet> {
    let mut merged = results::ResultSet::default();
    for path in paths {
        merged.merge(results::load(path)?);
    }
    Ok(merged)
}

fn cmd_stats(
    left: Vec<Utf8PathBuf>,
    right: Vec<Utf8PathBuf>,
    filter: OperatorFilter,
    per_operator: bool,
    json_mode: bool,
) -> i32 {
    let left = match load_merged(&left) {
        Ok(s) => s,
        Err(e) => {
            output::print_error(&format!("{e:#}"));
            return 2;
        }
    };

    let rendered = if right.is_empty() {
        let table = stats::aggregate(&left, &filter);
        if !json_mode {
            output::print_table("results", &table, per_operator);
            return 0;
        }
        serde_json::to_string(&table)
    } else {
        let right = match load_merged(&right) {
            Ok(s) => s,
            Err(e) => {
                output::print_error(&format!("{e:#}"));
                return 2;
            }
        };
        let comparison = stats::compare(&left, &right, &filter);
        if !json_mode {
            output::print_comparison(&comparison, per_operator);
            return 0;
        }
        serde_json::to_string(&comparison)
    };

    match rendered {
        Ok(s) => {
            println!("{s}");
            0
        }
        Err(e) => {
            output::print_error(&format!("Failed to serialize statistics: {e}"));
            3
        }
    }
}

fn cmd_inspect(corpus_root: Utf8PathBuf, file: String, count: usize, operator: Option<String>) -> i32 {
    let entry = match corpus::scan_file_dir(&corpus_root.join(&file)) {
        Ok(e) => e,
        Err(e) => {
            output::print_error(&format!("Cannot read {file} in {corpus_root}: {e}"));
            return 2;
        }
    };
    let Some(bucket) = entry.buckets.iter().find(|b| b.count == count) else {
        output::print_error(&format!(
            "No mutant with {} mutations for {}. Available: 1..={}",
            count,
            file,
            entry.buckets.len()
        ));
        return 2;
    };

    let mutant = match &operator {
        Some(op) => bucket.mutants.iter().find(|m| &m.operator == op),
        None => bucket.mutants.first(),
    };
    let Some(mutant) = mutant else {
        let valid: Vec<_> = bucket.mutants.iter().map(|m| m.operator.as_str()).collect();
        output::print_error(&format!(
            "Operator {} not found. Valid operators: {}",
            operator.as_deref().unwrap_or("-"),
            valid.join(", ")
        ));
        return 2;
    };

    let read = |path: &camino::Utf8Path| std::fs::read_to_string(path);
    match (read(&entry.original), read(&mutant.path)) {
        (Ok(original), Ok(mutated)) => {
            let label = format!("{} n={} [{}]", entry.filename, count, mutant.operator);
            output::print_mutant_diff(&label, &original, &mutated);
            0
        }
        (Err(e), _) | (_, Err(e)) => {
            output::print_error(&format!("Failed to read mutant: {e}"));
            3
        }
    }
}
