//! Invocation of the external diff tools and normalization of their output.

use std::fmt;
use std::io::Read;
use std::process::{Command, Stdio};
use std::str::FromStr;
use std::thread;
use std::time::{Duration, Instant};

use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ToolConfig;
use crate::normalize::{self, Chunk};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Backend {
    /// GumTree tree differencing, edit actions as magnitude.
    #[serde(rename = "GT")]
    GumTree,
    /// difftastic structural diff, deduplicated change spans as magnitude.
    #[serde(rename = "difft")]
    Difftastic,
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::GumTree => "GT",
            Backend::Difftastic => "difft",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid diff tool '{0}', expected one of: GT, difft")]
pub struct InvalidBackend(pub String);

impl FromStr for Backend {
    type Err = InvalidBackend;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GT" => Ok(Backend::GumTree),
            "difft" => Ok(Backend::Difftastic),
            other => Err(InvalidBackend(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ToolInvocation,
    Parse,
    MissingMutant,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiffFailure {
    #[error("{tool} could not be run: {reason}")]
    ToolInvocation { tool: String, reason: String },
    #[error("{tool} output could not be parsed: {reason}")]
    Parse { tool: String, reason: String },
    #[error("mutant file not found: {0}")]
    MissingMutant(String),
}

impl DiffFailure {
    pub fn kind(&self) -> FailureKind {
        match self {
            DiffFailure::ToolInvocation { .. } => FailureKind::ToolInvocation,
            DiffFailure::Parse { .. } => FailureKind::Parse,
            DiffFailure::MissingMutant(_) => FailureKind::MissingMutant,
        }
    }
}

/// Result of diffing one mutant against its original. Magnitudes of the two
/// backends measure different things and must not be mixed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiffOutcome {
    TreeDiff {
        actions: usize,
        matches: usize,
        timing_secs: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    TokenDiff {
        changes: usize,
        /// The tool reported no change.
        #[serde(default)]
        unchanged: bool,
        timing_secs: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<serde_json::Value>,
    },
    Failure {
        failure: FailureKind,
        detail: String,
    },
}

impl DiffOutcome {
    /// Edit actions or change spans; `None` for a failed diff.
    pub fn magnitude(&self) -> Option<usize> {
        match self {
            DiffOutcome::TreeDiff { actions, .. } => Some(*actions),
            DiffOutcome::TokenDiff { changes, .. } => Some(*changes),
            DiffOutcome::Failure { .. } => None,
        }
    }

    pub fn backend(&self) -> Option<Backend> {
        match self {
            DiffOutcome::TreeDiff { .. } => Some(Backend::GumTree),
            DiffOutcome::TokenDiff { .. } => Some(Backend::Difftastic),
            DiffOutcome::Failure { .. } => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, DiffOutcome::Failure { .. })
    }
}

impl From<DiffFailure> for DiffOutcome {
    fn from(failure: DiffFailure) -> Self {
        DiffOutcome::Failure {
            failure: failure.kind(),
            detail: failure.to_string(),
        }
    }
}

/// Diff `mutant` against `original`. Failures are folded into the outcome.
pub fn diff(original: &Utf8Path, mutant: &Utf8Path, backend: Backend, tools: &ToolConfig) -> DiffOutcome {
    try_diff(original, mutant, backend, tools).unwrap_or_else(DiffOutcome::from)
}

pub fn try_diff(
    original: &Utf8Path,
    mutant: &Utf8Path,
    backend: Backend,
    tools: &ToolConfig,
) -> Result<DiffOutcome, DiffFailure> {
    if !mutant.is_file() {
        return Err(DiffFailure::MissingMutant(mutant.to_string()));
    }

    match backend {
        Backend::GumTree => {
            let out = run_tool(
                &tools.gumtree,
                &["textdiff", "-f", "XML", original.as_str(), mutant.as_str()],
                &[],
                tools.timeout,
            )?;
            let tree = parse_gumtree(&out.stdout)?;
            debug!(mutant = %mutant, actions = tree.actions, "tree diff");
            Ok(DiffOutcome::TreeDiff {
                actions: tree.actions,
                matches: tree.matches,
                timing_secs: out.elapsed.as_secs_f64(),
                detail: tools.keep_detail.then_some(tree.detail),
            })
        }
        Backend::Difftastic => {
            let out = run_tool(
                &tools.difft,
                &["--display", "json", original.as_str(), mutant.as_str()],
                &[("DFT_UNSTABLE", "yes")],
                tools.timeout,
            )?;
            let token = parse_difft(&out.stdout)?;
            if token.unchanged && files_differ(original, mutant) {
                warn!(mutant = %mutant, "difft failed to detect change");
            }
            debug!(mutant = %mutant, changes = token.changes, "token diff");
            Ok(DiffOutcome::TokenDiff {
                changes: token.changes,
                unchanged: token.unchanged,
                timing_secs: out.elapsed.as_secs_f64(),
                detail: tools.keep_detail.then_some(token.chunks),
            })
        }
    }
}

fn files_differ(a: &Utf8Path, b: &Utf8Path) -> bool {
    match (std::fs::read(a), std::fs::read(b)) {
        (Ok(x), Ok(y)) => x != y,
        _ => true,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeDiff {
    pub actions: usize,
    pub matches: usize,
    /// Serialized `actions` element.
    pub detail: String,
}

/// Parse GumTree's XML report. The report is a declaration followed by
/// sibling `matches` and `actions` elements, so it is wrapped in a synthetic
/// root first.
pub fn parse_gumtree(output: &str) -> Result<TreeDiff, DiffFailure> {
    let parse_err = |reason: String| DiffFailure::Parse {
        tool: "gumtree".to_string(),
        reason,
    };

    let trimmed = output.trim_start();
    let body = match trimmed.strip_prefix("<?xml") {
        Some(decl) => decl.split_once("?>").map(|(_, rest)| rest).unwrap_or(""),
        None => trimmed,
    };
    let wrapped = format!("<X>{body}</X>");
    let doc = roxmltree::Document::parse(&wrapped).map_err(|e| parse_err(e.to_string()))?;
    let root = doc.root_element();

    let child = |name: &str| root.children().find(|n| n.has_tag_name(name));
    let actions = child("actions").ok_or_else(|| parse_err("no <actions> element".to_string()))?;
    let count = |node: roxmltree::Node| node.children().filter(|n| n.is_element()).count();

    Ok(TreeDiff {
        actions: count(actions),
        matches: child("matches").map(count).unwrap_or(0),
        detail: wrapped[actions.range()].to_string(),
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenDiff {
    pub changes: usize,
    pub unchanged: bool,
    /// Raw `chunks` value.
    pub chunks: serde_json::Value,
}

/// Parse difftastic's JSON report (`--display json`).
pub fn parse_difft(output: &str) -> Result<TokenDiff, DiffFailure> {
    let parse_err = |reason: String| DiffFailure::Parse {
        tool: "difft".to_string(),
        reason,
    };

    let value: serde_json::Value = serde_json::from_str(output).map_err(|e| parse_err(e.to_string()))?;
    let status = value
        .get("status")
        .and_then(|s| s.as_str())
        .ok_or_else(|| parse_err("missing status".to_string()))?;
    let raw_chunks = value
        .get("chunks")
        .cloned()
        .unwrap_or_else(|| serde_json::Value::Array(vec![]));

    if status == "unchanged" {
        return Ok(TokenDiff {
            changes: 0,
            unchanged: true,
            chunks: raw_chunks,
        });
    }

    let chunks: Vec<Chunk> =
        serde_json::from_value(raw_chunks.clone()).map_err(|e| parse_err(format!("bad chunks: {e}")))?;
    Ok(TokenDiff {
        changes: normalize::count_changes(&chunks),
        unchanged: false,
        chunks: raw_chunks,
    })
}

/// Split a tool command into program and leading arguments.
pub fn split_command(cmd: &str) -> (String, Vec<String>) {
    let parts: Vec<&str> = cmd.split_whitespace().collect();
    match parts.split_first() {
        Some((program, rest)) => (program.to_string(), rest.iter().map(|s| s.to_string()).collect()),
        None => (cmd.to_string(), vec![]),
    }
}

struct ToolOutput {
    stdout: String,
    elapsed: Duration,
}

fn run_tool(
    cmd: &str,
    args: &[&str],
    envs: &[(&str, &str)],
    timeout: Option<Duration>,
) -> Result<ToolOutput, DiffFailure> {
    let (program, first_args) = split_command(cmd);
    let invocation_err = |reason: String| DiffFailure::ToolInvocation {
        tool: program.clone(),
        reason,
    };

    let start = Instant::now();
    let mut child = Command::new(&program)
        .args(&first_args)
        .args(args)
        .envs(envs.iter().copied())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| invocation_err(e.to_string()))?;

    // Drain both pipes while waiting so large reports cannot block the child.
    let stdout_reader = child.stdout.take().map(|mut s| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = s.read_to_end(&mut buf);
            buf
        })
    });
    let stderr_reader = child.stderr.take().map(|mut s| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = s.read_to_end(&mut buf);
            buf
        })
    });

    let status = match timeout {
        None => child.wait().map_err(|e| invocation_err(e.to_string()))?,
        Some(limit) => loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if start.elapsed() > limit {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(invocation_err(format!("timed out after {:.1}s", limit.as_secs_f64())));
                    }
                    thread::sleep(Duration::from_millis(10));
                }
                Err(e) => return Err(invocation_err(e.to_string())),
            }
        },
    };
    let elapsed = start.elapsed();

    let stdout = stdout_reader.and_then(|h| h.join().ok()).unwrap_or_default();
    let stderr = stderr_reader.and_then(|h| h.join().ok()).unwrap_or_default();

    if !status.success() {
        let stderr = String::from_utf8_lossy(&stderr);
        return Err(invocation_err(format!("exited with {}: {}", status, stderr.trim())));
    }
    let stdout = String::from_utf8_lossy(&stdout).into_owned();
    if stdout.trim().is_empty() {
        return Err(invocation_err("empty output".to_string()));
    }

    Ok(ToolOutput { stdout, elapsed })
}
