use crate::config::Config;
use crate::db::Db;
use crate::error::{GraphError, Result};
use crate::model::SymbolCompact;
use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::Regex;
use serde::Serialize;
use tracing::info;

/// Dunder-style lifecycle hooks (`__init__`, `_init_`) and the JavaScript
/// `constructor`; these are invoked by the runtime, never by name.
pub const DEFAULT_MAGIC_PATTERN: &str =
    r"^(?:_{1,2}[A-Za-z0-9]+(?:_[A-Za-z0-9]+)*_{1,2}|constructor)$";

pub const DEFAULT_TEST_PATTERNS: &[&str] = &["*test*"];

const CANDIDATE_KINDS: &[&str] = &["function", "method", "class"];

pub const CAVEAT: &str = "Candidates only: no resolved call reaches these functions, methods or \
     classes, but they may still be used through dynamic dispatch, reflection, framework hooks or \
     external callers. Variables and modules are never reported.";

#[derive(Debug, Clone)]
pub struct DeadCodeOptions {
    pub limit: usize,
    pub magic_pattern: String,
    /// Globs for test files; symbols defined there are never reported.
    pub test_patterns: Vec<String>,
    /// Extra globs for files to leave out.
    pub exclude: Vec<String>,
}

impl Default for DeadCodeOptions {
    fn default() -> Self {
        Self {
            limit: Config::get().dead_code_limit,
            magic_pattern: DEFAULT_MAGIC_PATTERN.to_string(),
            test_patterns: DEFAULT_TEST_PATTERNS.iter().map(|p| p.to_string()).collect(),
            exclude: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct DeadCodeReport {
    pub symbols: Vec<SymbolCompact>,
    /// Candidates before the limit was applied.
    pub total: usize,
    pub truncated: bool,
    pub caveat: &'static str,
}

/// Functions, methods and classes that no resolved call targets, minus magic
/// names and anything defined in test or excluded files. Ordered by file,
/// then name. Variables and modules are not call targets and are never
/// reported.
pub fn find_dead_code(db: &Db, project_id: i64, options: &DeadCodeOptions) -> Result<DeadCodeReport> {
    let magic = Regex::new(&options.magic_pattern).map_err(|e| GraphError::InvalidPattern {
        pattern: options.magic_pattern.clone(),
        message: e.to_string(),
    })?;
    let mut patterns = options.test_patterns.clone();
    patterns.extend(options.exclude.iter().cloned());
    let excluded = build_glob_set(&patterns)?;

    let mut symbols: Vec<SymbolCompact> = db
        .uncalled_symbols(project_id, CANDIDATE_KINDS)?
        .into_iter()
        .filter(|symbol| !magic.is_match(&symbol.name))
        .filter(|symbol| !excluded.is_match(&symbol.file_path))
        .map(SymbolCompact::from)
        .collect();

    let total = symbols.len();
    let truncated = total > options.limit;
    symbols.truncate(options.limit);
    info!(total, reported = symbols.len(), "dead code candidates");
    Ok(DeadCodeReport {
        symbols,
        total,
        truncated,
        caveat: CAVEAT,
    })
}

fn build_glob_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();

    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| GraphError::InvalidPattern {
            pattern: pattern.clone(),
            message: e.to_string(),
        })?;
        builder.add(glob);
    }

    builder.build().map_err(|e| GraphError::InvalidPattern {
        pattern: "<combined>".to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_pattern_matches_lifecycle_hooks_only() {
        let magic = Regex::new(DEFAULT_MAGIC_PATTERN).unwrap();
        for name in ["__init__", "_init_", "__post_init__", "__call__", "constructor"] {
            assert!(magic.is_match(name), "{name} should be magic");
        }
        for name in ["helper", "_private", "__mangled", "init__x", "constructors"] {
            assert!(!magic.is_match(name), "{name} should not be magic");
        }
    }

    #[test]
    fn test_glob_matches_anywhere_in_path() {
        let set = build_glob_set(&["*test*".to_string()]).unwrap();
        assert!(set.is_match("tests/test_utils.py"));
        assert!(set.is_match("pkg/utils_test.py"));
        assert!(!set.is_match("libs/utils.py"));
    }

    #[test]
    fn invalid_globs_are_reported() {
        let err = build_glob_set(&["a[".to_string()]).unwrap_err();
        assert!(matches!(err, GraphError::InvalidPattern { ref pattern, .. } if pattern == "a["));
    }
}
