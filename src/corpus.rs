//! On-disk layout of a mutant corpus:
//!
//! ```text
//! root/<stem>/original/<filename>
//! root/<stem>/<n>/<filename>              (unpartitioned)
//! root/<stem>/<n>/<operator>/<filename>   (partitioned by operator)
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use tracing::warn;

pub const ORIGINAL_DIR: &str = "original";

/// Operator key used for mutants stored directly under `<n>/`.
pub const UNPARTITIONED: &str = "all";

/// Directory for candidates that carry no operator label.
pub const UNKNOWN_OPERATOR: &str = "unknown";

pub fn file_stem(filename: &str) -> &str {
    Utf8Path::new(filename).file_stem().unwrap_or(filename)
}

pub fn original_path(root: &Utf8Path, filename: &str) -> Utf8PathBuf {
    root.join(file_stem(filename)).join(ORIGINAL_DIR).join(filename)
}

/// Directory segment for an operator label. Unlabelled candidates go to
/// `unknown/`; labels that are not a single plain path component give `None`.
pub fn operator_dir(operator: &str) -> Option<&str> {
    if operator.is_empty() {
        return Some(UNKNOWN_OPERATOR);
    }
    let invalid = operator == "." || operator == ".." || operator.contains(['/', '\\']);
    (!invalid).then_some(operator)
}

pub fn mutant_path(root: &Utf8Path, filename: &str, count: usize, operator: Option<&str>) -> Utf8PathBuf {
    let mut path = root.join(file_stem(filename)).join(count.to_string());
    if let Some(op) = operator {
        path.push(op);
    }
    path.join(filename)
}

/// One mutant of a bucket, ready to diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutantEntry {
    pub operator: String,
    pub path: Utf8PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    pub count: usize,
    pub mutants: Vec<MutantEntry>,
}

/// Everything the diff driver needs for one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    pub filename: String,
    pub original: Utf8PathBuf,
    pub buckets: Vec<Bucket>,
}

/// Top-level file directories of a corpus, sorted by name.
pub fn list_file_dirs(root: &Utf8Path) -> std::io::Result<Vec<Utf8PathBuf>> {
    let mut dirs = Vec::new();
    for entry in root.read_dir_utf8()? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path().to_path_buf());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Read the layout of one file directory. Buckets are contiguous from 1; a
/// missing `<n>/` ends the list.
pub fn scan_file_dir(dir: &Utf8Path) -> std::io::Result<FileEntry> {
    let name = dir.file_name().unwrap_or(dir.as_str()).to_string();

    let original_dir = dir.join(ORIGINAL_DIR);
    let mut originals: Vec<String> = Vec::new();
    for entry in original_dir.read_dir_utf8()? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            originals.push(entry.file_name().to_string());
        }
    }
    originals.sort();
    let filename = originals.into_iter().next().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no original file in {}", original_dir),
        )
    })?;

    let mut buckets = Vec::new();
    let mut count = 1;
    loop {
        let bucket_dir = dir.join(count.to_string());
        if !bucket_dir.is_dir() {
            break;
        }
        buckets.push(scan_bucket(&bucket_dir, &filename, count)?);
        count += 1;
    }

    let highest = highest_numeric_dir(dir)?;
    if highest.is_some_and(|h| h >= count) {
        warn!(file = %name, missing = count, "gap in mutation counts, later buckets ignored");
    }

    Ok(FileEntry {
        name,
        original: original_dir.join(&filename),
        filename,
        buckets,
    })
}

fn scan_bucket(bucket_dir: &Utf8Path, filename: &str, count: usize) -> std::io::Result<Bucket> {
    let mut mutants = Vec::new();
    for entry in bucket_dir.read_dir_utf8()? {
        let entry = entry?;
        let ft = entry.file_type()?;
        if ft.is_dir() {
            mutants.push(MutantEntry {
                operator: entry.file_name().to_string(),
                path: entry.path().join(filename),
            });
        } else if ft.is_file() && entry.file_name() == filename {
            mutants.push(MutantEntry {
                operator: UNPARTITIONED.to_string(),
                path: entry.path().to_path_buf(),
            });
        }
    }
    mutants.sort_by(|a, b| a.operator.cmp(&b.operator));
    Ok(Bucket { count, mutants })
}

fn highest_numeric_dir(dir: &Utf8Path) -> std::io::Result<Option<usize>> {
    let mut highest = None;
    for entry in dir.read_dir_utf8()? {
        let entry = entry?;
        if let Ok(n) = entry.file_name().parse::<usize>() {
            highest = highest.max(Some(n));
        }
    }
    Ok(highest)
}
