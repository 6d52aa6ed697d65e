use crate::error::{GraphError, Result};
use crate::indexer::{javascript, python, scan};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use tree_sitter::Node;

/// File-local identifier handed out by an extractor. Only unique within one
/// `extract` call; the ingestion step maps it to a stored id.
pub type TempId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Module,
    Class,
    Function,
    Method,
    Variable,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Module => "module",
            SymbolKind::Class => "class",
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Variable => "variable",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SymbolInput {
    pub temp_id: TempId,
    pub parent: Option<TempId>,
    pub kind: SymbolKind,
    pub name: String,
    pub signature: Option<String>,
    pub start_line: i64,
    pub end_line: i64,
    pub start_byte: i64,
    pub end_byte: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportInput {
    pub module: String,
    pub name: String,
    /// Local name the import is bound to when it differs from `name`: an
    /// explicit `as` alias, or the dotted path of `import a.b`.
    pub binding: Option<String>,
    pub line: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallInput {
    /// Enclosing symbol of the call site.
    pub source: TempId,
    pub callee: String,
    pub line: i64,
}

#[derive(Debug, Default)]
pub struct ExtractedFile {
    /// Parents always precede their children.
    pub symbols: Vec<SymbolInput>,
    pub imports: Vec<ImportInput>,
    pub calls: Vec<CallInput>,
}

pub trait LanguageExtractor: Send {
    fn language(&self) -> &'static str;

    fn extract(&mut self, rel_path: &str, source: &str) -> Result<ExtractedFile>;

    /// Repository-relative files that may define `name` when imported from
    /// `module` by `importing_file`, most likely first. Matched as path suffixes.
    fn import_candidates(&self, importing_file: &str, module: &str, name: &str) -> Vec<String>;
}

/// Extractors keyed by language name. Parsers are stateful, so every worker
/// thread owns its own registry.
pub struct ExtractorRegistry {
    extractors: HashMap<&'static str, Box<dyn LanguageExtractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> anyhow::Result<Self> {
        let boxed: [Box<dyn LanguageExtractor>; 2] = [
            Box::new(python::PythonExtractor::new()?),
            Box::new(javascript::JavascriptExtractor::new()?),
        ];
        let extractors = boxed
            .into_iter()
            .map(|extractor| (extractor.language(), extractor))
            .collect();
        Ok(Self { extractors })
    }

    pub fn for_path_mut(&mut self, path: &str) -> Option<&mut (dyn LanguageExtractor + 'static)> {
        let language = scan::language_for_path(Path::new(path))?;
        self.extractors.get_mut(language).map(|boxed| boxed.as_mut())
    }

    pub fn for_path(&self, path: &str) -> Option<&dyn LanguageExtractor> {
        let language = scan::language_for_path(Path::new(path))?;
        self.extractors.get(language).map(|boxed| boxed.as_ref())
    }

    pub fn languages(&self) -> Vec<&'static str> {
        let mut languages: Vec<_> = self.extractors.keys().copied().collect();
        languages.sort_unstable();
        languages
    }
}

pub(crate) fn node_text(node: Node<'_>, source: &str) -> String {
    source
        .get(node.start_byte()..node.end_byte())
        .unwrap_or("")
        .trim()
        .to_string()
}

/// 1-based line a node starts on.
pub(crate) fn start_line(node: Node<'_>) -> i64 {
    node.start_position().row as i64 + 1
}

pub(crate) fn end_line(node: Node<'_>) -> i64 {
    node.end_position().row as i64 + 1
}

/// Error when the tree contains an ERROR or MISSING node.
pub(crate) fn syntax_error(rel_path: &str, root: Node<'_>) -> Option<GraphError> {
    let bad = first_error_node(root)?;
    let pos = bad.start_position();
    Some(GraphError::parse(
        rel_path,
        format!("syntax error at line {}, column {}", pos.row + 1, pos.column + 1),
    ))
}

fn first_error_node(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(found) = first_error_node(child) {
            return Some(found);
        }
    }
    Some(node)
}

/// Callee text made only of identifiers joined by dots (`f`, `self.save`, `pkg.mod.run`).
pub(crate) fn is_simple_call_target(raw: &str) -> bool {
    !raw.is_empty()
        && raw
            .split('.')
            .all(|part| !part.is_empty() && part.chars().all(|ch| ch.is_alphanumeric() || ch == '_' || ch == '$'))
}

pub(crate) fn line_count(source: &str) -> i64 {
    let count = source.lines().count();
    if count == 0 { 1 } else { count as i64 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_dispatches_by_extension() {
        let registry = ExtractorRegistry::new().unwrap();
        assert_eq!(registry.languages(), vec!["javascript", "python"]);
        assert_eq!(
            registry.for_path("pkg/core.py").map(|e| e.language()),
            Some("python")
        );
        assert_eq!(
            registry.for_path("web/app.mjs").map(|e| e.language()),
            Some("javascript")
        );
        assert!(registry.for_path("README.md").is_none());
    }

    #[test]
    fn simple_call_targets() {
        assert!(is_simple_call_target("parse"));
        assert!(is_simple_call_target("self.save"));
        assert!(is_simple_call_target("pkg.mod.run"));
        assert!(!is_simple_call_target("get()().x"));
        assert!(!is_simple_call_target("items[0].run"));
        assert!(!is_simple_call_target(".x"));
    }
}
