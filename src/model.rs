use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub repo_url: String,
    pub created: i64,
}

#[derive(Debug, Serialize, Clone)]
pub struct Symbol {
    pub id: i64,
    pub project_id: i64,
    pub parent_id: Option<i64>,
    pub file_path: String,
    pub name: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    pub start_line: i64,
    pub end_line: i64,
    pub start_byte: i64,
    pub end_byte: i64,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct SymbolCompact {
    pub id: i64,
    pub kind: String,
    pub name: String,
    pub file_path: String,
    pub start_line: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl From<&Symbol> for SymbolCompact {
    fn from(s: &Symbol) -> Self {
        SymbolCompact {
            id: s.id,
            kind: s.kind.clone(),
            name: s.name.clone(),
            file_path: s.file_path.clone(),
            start_line: s.start_line,
            signature: s.signature.clone(),
        }
    }
}

impl From<Symbol> for SymbolCompact {
    fn from(s: Symbol) -> Self {
        SymbolCompact {
            id: s.id,
            kind: s.kind,
            name: s.name,
            file_path: s.file_path,
            start_line: s.start_line,
            signature: s.signature,
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct Import {
    pub id: i64,
    pub project_id: i64,
    pub file_path: String,
    pub module: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binding: Option<String>,
    pub line: i64,
    pub resolved_symbol_id: Option<i64>,
    pub is_resolved: bool,
}

impl Import {
    /// Name the importing file uses for the imported symbol.
    pub fn local_name(&self) -> &str {
        self.binding.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct Call {
    pub id: i64,
    pub project_id: i64,
    pub file_path: String,
    pub source_symbol_id: i64,
    pub callee_name: String,
    pub line_number: i64,
    pub resolved_symbol_id: Option<i64>,
}

#[derive(Debug, Serialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionStats {
    pub total: usize,
    pub resolved: usize,
    pub newly_resolved: usize,
}

#[derive(Debug, Serialize, Clone, Default)]
pub struct IngestSummary {
    pub project_id: i64,
    pub files_scanned: usize,
    pub files_processed: usize,
    pub files_failed: usize,
    pub symbols: usize,
    pub orphans_skipped: usize,
    pub conflicts: usize,
    pub imports: ResolutionStats,
    pub calls: ResolutionStats,
    pub duration_ms: u64,
}

#[derive(Debug, Serialize, Clone)]
pub struct ProjectOverview {
    pub project: Project,
    pub files: usize,
    pub symbols: usize,
    pub symbols_by_kind: BTreeMap<String, usize>,
    pub imports: ResolutionStats,
    pub calls: ResolutionStats,
}
