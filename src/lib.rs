pub mod apply;
pub mod config;
pub mod corpus;
pub mod diff;
pub mod driver;
pub mod feed;
pub mod lines;
pub mod materialize;
pub mod mutants;
pub mod normalize;
pub mod output;
pub mod results;
pub mod stats;

use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Solidity,
    Python,
    JavaScript,
    TypeScript,
    Rust,
}

pub fn detect_language(path: &Path) -> Option<Language> {
    match path.extension()?.to_str()? {
        "sol" => Some(Language::Solidity),
        "py" => Some(Language::Python),
        "js" | "mjs" | "cjs" | "jsx" => Some(Language::JavaScript),
        "ts" | "mts" | "cts" | "tsx" => Some(Language::TypeScript),
        "rs" => Some(Language::Rust),
        _ => None,
    }
}
