//! Plain-text renderings for the CLI.

use crate::deadcode::DeadCodeReport;
use crate::impact::ImpactReport;
use crate::util;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

const DIRECT_MARKER: &str = "!!";
const RIPPLE_MARKER: &str = "~";
const MAX_SNIPPET_BYTES: usize = 120;

/// Impact tree, one line per caller. Direct callers get the calling line
/// read from `repo_root` when the file is still there.
pub fn render_impact(report: &ImpactReport, repo_root: Option<&Path>) -> String {
    let mut out = String::new();
    let target = &report.target;
    let _ = writeln!(
        out,
        "Impact of {} ({}) at {}:{}",
        target.name, target.kind, target.file_path, target.start_line
    );
    if report.ambiguous_with > 0 {
        let _ = writeln!(
            out,
            "  {} other symbol(s) share this name; pass --file to pick another",
            report.ambiguous_with
        );
    }
    if report.entries.is_empty() {
        let _ = writeln!(out, "\nNo callers within depth {}.", report.max_depth);
        return out;
    }

    let mut sources: HashMap<&str, Option<String>> = HashMap::new();
    out.push('\n');
    for entry in &report.entries {
        let indent = "  ".repeat(entry.depth);
        if entry.is_direct() {
            let _ = writeln!(
                out,
                "{indent}{DIRECT_MARKER} {} ({}:{})",
                entry.caller.name, entry.file_path, entry.line
            );
            let source = sources
                .entry(entry.file_path.as_str())
                .or_insert_with(|| {
                    repo_root.and_then(|root| util::read_to_string(&root.join(&entry.file_path)).ok())
                });
            if let Some(snippet) = source
                .as_deref()
                .and_then(|content| snippet_at(content, entry.line))
            {
                let _ = writeln!(out, "{indent}     {:>5} | {snippet}", entry.line);
            }
        } else {
            let _ = writeln!(
                out,
                "{indent}{RIPPLE_MARKER} [{}] {} ({}:{})",
                entry.depth, entry.caller.name, entry.file_path, entry.line
            );
        }
    }
    let _ = writeln!(
        out,
        "\n{} caller(s): {} direct, {} ripple",
        report.entries.len(),
        report.direct,
        report.ripple
    );
    if report.truncated {
        let _ = writeln!(out, "Traversal stopped early; results are incomplete.");
    }
    out
}

fn snippet_at(content: &str, line: i64) -> Option<String> {
    let (_, text) = util::context_lines(content, line, 0).into_iter().next()?;
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some(util::truncate_str_bytes(text, MAX_SNIPPET_BYTES))
}

pub fn render_dead_code(report: &DeadCodeReport) -> String {
    let mut out = String::new();
    if report.symbols.is_empty() {
        let _ = writeln!(out, "No unused symbols found.");
        return out;
    }
    for symbol in &report.symbols {
        let _ = writeln!(
            out,
            "{}:{}  {} {}",
            symbol.file_path, symbol.start_line, symbol.kind, symbol.name
        );
    }
    let _ = writeln!(
        out,
        "\nShowing {} of {} candidate(s){}",
        report.symbols.len(),
        report.total,
        if report.truncated { "; raise --limit to see more" } else { "" }
    );
    let _ = writeln!(out, "{}", report.caveat);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impact::types::ImpactEntry;
    use crate::model::SymbolCompact;
    use std::fs;
    use tempfile::TempDir;

    fn compact(id: i64, name: &str, file_path: &str) -> SymbolCompact {
        SymbolCompact {
            id,
            kind: "function".to_string(),
            name: name.to_string(),
            file_path: file_path.to_string(),
            start_line: 1,
            signature: None,
        }
    }

    #[test]
    fn impact_text_marks_direct_and_ripple_callers() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("app.py"), "import x\n\n    result = parse(data)\n").unwrap();
        let report = ImpactReport {
            target: compact(1, "parse", "libs/utils.py"),
            ambiguous_with: 1,
            max_depth: 5,
            entries: vec![
                ImpactEntry {
                    caller: compact(2, "main", "app.py"),
                    file_path: "app.py".to_string(),
                    line: 3,
                    depth: 1,
                    callee_id: 1,
                },
                ImpactEntry {
                    caller: compact(3, "run", "cli.py"),
                    file_path: "cli.py".to_string(),
                    line: 9,
                    depth: 2,
                    callee_id: 2,
                },
            ],
            direct: 1,
            ripple: 1,
            by_depth: Vec::new(),
            truncated: false,
            duration_ms: 0,
        };
        let text = render_impact(&report, Some(dir.path()));
        assert!(text.contains("Impact of parse (function) at libs/utils.py:1"));
        assert!(text.contains("1 other symbol(s)"));
        assert!(text.contains("!! main (app.py:3)"));
        assert!(text.contains("    3 | result = parse(data)"));
        assert!(text.contains("~ [2] run (cli.py:9)"));
        assert!(text.contains("2 caller(s): 1 direct, 1 ripple"));
    }

    #[test]
    fn dead_code_text_mentions_truncation() {
        let report = DeadCodeReport {
            symbols: vec![compact(1, "helper", "libs/utils.py")],
            total: 3,
            truncated: true,
            caveat: crate::deadcode::CAVEAT,
        };
        let text = render_dead_code(&report);
        assert!(text.starts_with("libs/utils.py:1  function helper"));
        assert!(text.contains("Showing 1 of 3"));
        assert!(text.contains("raise --limit"));
    }
}
