#![allow(dead_code)]

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::TempDir;

pub fn utf8_dir(dir: &TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("temp dir is not UTF-8")
}

/// Write a shell script and return a command line that runs it through `sh`,
/// so the script never needs the executable bit.
pub fn script(dir: &Utf8Path, name: &str, body: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
    format!("sh {path}")
}

/// Stand-in for `gumtree textdiff -f XML a b`: one action per differing byte.
pub fn fake_gumtree(dir: &Utf8Path) -> String {
    script(
        dir,
        "gumtree.sh",
        r#"case "$5" in */BROKEN/*) exit 1 ;; esac
n=$(( $(cmp -l "$4" "$5" 2>/dev/null | wc -l) ))
echo '<?xml version="1.0" encoding="UTF-8"?>'
echo '<matches>'
echo '  <match src="CompilationUnit [0,50]" dest="CompilationUnit [0,50]"/>'
echo '</matches>'
echo '<actions>'
i=0
while [ "$i" -lt "$n" ]; do
  echo '  <action type="update-node" tree="Identifier [2,5]" label="x"/>'
  i=$((i+1))
done
echo '</actions>'
"#,
    )
}

/// Stand-in for `difft --display json a b`: one replaced span when the files
/// differ, `unchanged` otherwise.
pub fn fake_difft(dir: &Utf8Path) -> String {
    script(
        dir,
        "difft.sh",
        r#"[ "$DFT_UNSTABLE" = "yes" ] || { echo "DFT_UNSTABLE not set" >&2; exit 2; }
if cmp -s "$3" "$4"; then
  echo '{"status":"unchanged","chunks":[]}'
else
  echo '{"chunks":[[{"lhs":{"line_number":0,"changes":[{"start":2,"end":5,"content":"abc","highlight":"normal"}]},"rhs":{"line_number":0,"changes":[{"start":2,"end":5,"content":"xyz","highlight":"normal"}]}}]],"language":"Solidity","status":"changed"}'
fi
"#,
    )
}

pub fn failing_tool(dir: &Utf8Path) -> String {
    script(dir, "fail.sh", "echo 'boom' >&2\nexit 1\n")
}

pub fn silent_tool(dir: &Utf8Path) -> String {
    script(dir, "silent.sh", "exit 0\n")
}

pub fn garbage_tool(dir: &Utf8Path) -> String {
    script(dir, "garbage.sh", "echo 'not a report'\n")
}

/// Fifty characters of Solidity.
pub const CONTRACT_50: &str = "contract A { uint x = 1; uint y = 2; uint z = 3; }";

pub fn candidate_json(start: usize, end: usize, original: &str, replace: &str, operator: &str) -> serde_json::Value {
    serde_json::json!({
        "start": start,
        "end": end,
        "original": original,
        "replace": replace,
        "startLine": 1,
        "endLine": 1,
        "operator": operator,
    })
}
