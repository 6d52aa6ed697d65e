use anyhow::{Context, Result};
use std::fs;
use std::path::{Component, Path};

pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}

pub fn normalize_rel_path(repo_root: &Path, path: &Path) -> Result<String> {
    let rel = path.strip_prefix(repo_root).with_context(|| {
        format!(
            "strip prefix {} from {}",
            repo_root.display(),
            path.display()
        )
    })?;
    Ok(normalize_path(rel))
}

pub fn normalize_path(path: &Path) -> String {
    let mut parts = Vec::new();
    for comp in path.components() {
        match comp {
            Component::Normal(os) => parts.push(os.to_string_lossy().to_string()),
            Component::ParentDir => parts.push("..".to_string()),
            Component::CurDir => {}
            _ => {}
        }
    }
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

/// Join `rel` onto the directory `base` (both `/`-separated, repository
/// relative) and fold `.` and `..` segments. `None` if the result escapes
/// the repository root.
pub fn join_rel(base: &str, rel: &str) -> Option<String> {
    let mut parts: Vec<&str> = base.split('/').filter(|p| !p.is_empty() && *p != ".").collect();
    for segment in rel.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Parent directory of a repository-relative file path, `""` at the root.
pub fn parent_dir(rel_path: &str) -> &str {
    rel_path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// `path` is `candidate` or ends with `/candidate`.
pub fn path_matches(path: &str, candidate: &str) -> bool {
    let candidate = candidate.trim_start_matches("./");
    if candidate.is_empty() {
        return false;
    }
    path == candidate
        || (path.len() > candidate.len()
            && path.ends_with(candidate)
            && path.as_bytes()[path.len() - candidate.len() - 1] == b'/')
}

/// Lines `line - radius ..= line + radius` of `content` (1-based, clamped).
pub fn context_lines(content: &str, line: i64, radius: i64) -> Vec<(i64, String)> {
    let start = (line - radius).max(1);
    let end = line + radius;
    content
        .lines()
        .enumerate()
        .map(|(idx, text)| (idx as i64 + 1, text))
        .skip_while(|(num, _)| *num < start)
        .take_while(|(num, _)| *num <= end)
        .map(|(num, text)| (num, text.trim_end().to_string()))
        .collect()
}

pub fn truncate_str_bytes(value: &str, max_bytes: usize) -> String {
    if value.len() <= max_bytes {
        return value.to_string();
    }
    let mut end = max_bytes.min(value.len());
    while end > 0 && !value.is_char_boundary(end) {
        end -= 1;
    }
    value[..end].to_string()
}

/// Collapse runs of whitespace into single spaces.
pub fn squash_whitespace(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_space = false;
    for ch in raw.chars() {
        if ch.is_whitespace() {
            if !last_space {
                out.push(' ');
                last_space = true;
            }
        } else {
            out.push(ch);
            last_space = false;
        }
    }
    out.trim().to_string()
}

pub fn file_url(path: &Path) -> String {
    format!("file://{}", normalize_abs(path))
}

fn normalize_abs(path: &Path) -> String {
    let rel = normalize_path(path);
    if path.has_root() && !rel.starts_with('/') {
        format!("/{rel}")
    } else {
        rel
    }
}
