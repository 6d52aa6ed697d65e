use anyhow::Result;
use ignore::WalkBuilder;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub rel_path: String,
    pub abs_path: PathBuf,
    pub size: u64,
    pub language: String,
}

#[derive(Debug, Clone)]
struct LanguageSpec {
    name: &'static str,
    extensions: &'static [&'static str],
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOptions {
    pub no_ignore: bool,
}

impl ScanOptions {
    pub fn new(no_ignore: bool) -> Self {
        Self { no_ignore }
    }
}

static LANGUAGE_SPECS: &[LanguageSpec] = &[
    LanguageSpec {
        name: "python",
        extensions: &["py", "pyi"],
    },
    LanguageSpec {
        name: "javascript",
        extensions: &["js", "jsx", "mjs", "cjs"],
    },
];

/// Directories never descended into: VCS metadata, editor settings,
/// dependency and vendor trees, build output, virtual environments.
pub const IGNORED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    ".github",
    ".idea",
    ".vscode",
    ".codeseer",
    "node_modules",
    "site-packages",
    "vendor",
    "__pycache__",
    "build",
    "dist",
    "target",
    "venv",
    ".venv",
    "env",
    ".env",
    ".tox",
    ".mypy_cache",
];

pub fn scan_repo(repo_root: &Path) -> Result<Vec<ScannedFile>> {
    scan_repo_with_options(repo_root, ScanOptions::default())
}

pub fn scan_repo_with_options(repo_root: &Path, options: ScanOptions) -> Result<Vec<ScannedFile>> {
    let mut files = Vec::new();
    let mut builder = WalkBuilder::new(repo_root);
    if options.no_ignore {
        builder
            .ignore(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .parents(false);
    } else {
        builder
            .ignore(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .parents(true)
            .require_git(false);
    }
    let walker = builder
        .hidden(false)
        .filter_entry(|entry| !is_ignored_entry(entry))
        .build();

    for entry in walker {
        let entry = match entry {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, "walk error");
                continue;
            }
        };
        if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }
        let path = entry.path();
        let language = match detect_language(path) {
            Some(value) => value,
            None => continue,
        };
        let rel_path = crate::util::normalize_rel_path(repo_root, path)?;
        let size = match fs::metadata(path) {
            Ok(metadata) => metadata.len(),
            Err(err) => {
                warn!(path = %rel_path, error = %err, "stat error");
                continue;
            }
        };
        files.push(ScannedFile {
            rel_path,
            abs_path: path.to_path_buf(),
            size,
            language: language.to_string(),
        });
    }
    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(files)
}

fn is_ignored_entry(entry: &ignore::DirEntry) -> bool {
    let Some(name) = entry.file_name().to_str() else {
        return false;
    };
    let is_dir = entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false);
    if is_dir {
        // depth 0 is the repository root itself, whatever it is called
        return entry.depth() > 0 && IGNORED_DIRS.contains(&name);
    }
    name.starts_with('.')
}

fn detect_language(path: &Path) -> Option<&'static str> {
    let ext = path.extension().and_then(|ext| ext.to_str())?;
    for spec in LANGUAGE_SPECS {
        if spec.extensions.iter().any(|candidate| *candidate == ext) {
            return Some(spec.name);
        }
    }
    None
}

pub fn language_for_path(path: &Path) -> Option<&'static str> {
    detect_language(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x = 1\n").unwrap();
    }

    #[test]
    fn skips_ignored_directories_and_hidden_files() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        touch(root, "app.py");
        touch(root, "pkg/core.py");
        touch(root, "web/index.js");
        touch(root, "venv/lib/site.py");
        touch(root, "node_modules/left-pad/index.js");
        touch(root, "pkg/__pycache__/core.py");
        touch(root, ".hidden.py");
        touch(root, "notes.txt");

        let files = scan_repo(root).unwrap();
        let paths: Vec<_> = files.iter().map(|f| f.rel_path.as_str()).collect();
        assert_eq!(paths, vec!["app.py", "pkg/core.py", "web/index.js"]);
        assert_eq!(files[2].language, "javascript");
    }

    #[test]
    fn detects_languages_by_extension() {
        assert_eq!(language_for_path(Path::new("a/b.pyi")), Some("python"));
        assert_eq!(language_for_path(Path::new("a/b.cjs")), Some("javascript"));
        assert_eq!(language_for_path(Path::new("a/b.rs")), None);
    }
}
