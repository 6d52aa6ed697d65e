//! Query and result types for impact analysis.

use crate::error::{GraphError, Result};
use crate::model::SymbolCompact;
use serde::Serialize;

/// Which symbol to analyze and how far to follow its callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImpactQuery {
    pub symbol: String,
    /// Narrows the name lookup to a file (exact path or path suffix).
    pub file: Option<String>,
    /// Defaults to the configured depth when unset.
    pub max_depth: Option<usize>,
}

impl ImpactQuery {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            file: None,
            max_depth: None,
        }
    }

    pub fn in_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }
}

/// A caller reached by the traversal.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ImpactEntry {
    pub caller: SymbolCompact,
    /// File of the call site.
    pub file_path: String,
    pub line: i64,
    /// 1 for direct callers.
    pub depth: usize,
    /// Symbol the caller invokes at this site.
    pub callee_id: i64,
}

impl ImpactEntry {
    pub fn is_direct(&self) -> bool {
        self.depth == 1
    }
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct DepthSummary {
    pub depth: usize,
    pub callers: usize,
}

#[derive(Debug, Serialize, Clone)]
pub struct ImpactReport {
    pub target: SymbolCompact,
    /// Other symbols that matched the same name and were passed over.
    pub ambiguous_with: usize,
    pub max_depth: usize,
    pub entries: Vec<ImpactEntry>,
    pub direct: usize,
    pub ripple: usize,
    pub by_depth: Vec<DepthSummary>,
    /// Traversal stopped early on the time or result budget.
    pub truncated: bool,
    pub duration_ms: u64,
}

#[derive(Debug, Serialize, Clone)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImpactOutcome {
    NotFound { symbol: String },
    Found(ImpactReport),
}

impl ImpactOutcome {
    pub fn into_result(self) -> Result<ImpactReport> {
        match self {
            ImpactOutcome::Found(report) => Ok(report),
            ImpactOutcome::NotFound { symbol } => Err(GraphError::NotFound { symbol }),
        }
    }
}
