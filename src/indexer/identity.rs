//! Maps the file-local temp ids an extractor hands out to stored symbol ids.
//!
//! A scope lives for exactly one file ingestion. Symbols arrive parents
//! first, so a parent's stored id is always known before its children are
//! written; a child whose parent never made it into the scope is an orphan.

use crate::error::{GraphError, Result};
use crate::indexer::extract::{SymbolInput, TempId};
use std::collections::HashMap;
use tracing::warn;

/// Storage side of the identity mapping.
pub trait SymbolSink {
    fn upsert_symbol(&mut self, parent_id: Option<i64>, symbol: &SymbolInput) -> Result<i64>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentLink {
    Root,
    Resolved(i64),
    Missing(TempId),
}

#[derive(Debug, Default)]
pub struct IdentityScope {
    ids: HashMap<TempId, i64>,
}

impl IdentityScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parent_link(&self, symbol: &SymbolInput) -> ParentLink {
        match symbol.parent {
            None => ParentLink::Root,
            Some(parent) => match self.ids.get(&parent) {
                Some(id) => ParentLink::Resolved(*id),
                None => ParentLink::Missing(parent),
            },
        }
    }

    pub fn record(&mut self, temp_id: TempId, id: i64) {
        self.ids.insert(temp_id, id);
    }

    pub fn resolve(&self, temp_id: TempId) -> Option<i64> {
        self.ids.get(&temp_id).copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PersistStats {
    pub stored: usize,
    pub orphans_skipped: usize,
    pub conflicts: usize,
}

/// Write `symbols` in order through `sink`. Orphans and kind conflicts are
/// skipped and counted; any other storage error aborts.
pub fn persist_symbols<S>(
    sink: &mut S,
    file_path: &str,
    symbols: &[SymbolInput],
) -> Result<(IdentityScope, PersistStats)>
where
    S: SymbolSink + ?Sized,
{
    let mut scope = IdentityScope::new();
    let mut stats = PersistStats::default();
    for symbol in symbols {
        let parent_id = match scope.parent_link(symbol) {
            ParentLink::Root => None,
            ParentLink::Resolved(id) => Some(id),
            ParentLink::Missing(parent) => {
                warn!(
                    file = file_path,
                    name = %symbol.name,
                    parent,
                    "skipping symbol whose parent was not stored"
                );
                stats.orphans_skipped += 1;
                continue;
            }
        };
        match sink.upsert_symbol(parent_id, symbol) {
            Ok(id) => {
                scope.record(symbol.temp_id, id);
                stats.stored += 1;
            }
            Err(err @ GraphError::StorageConflict { .. }) => {
                warn!(file = file_path, error = %err, "skipping conflicting symbol");
                stats.conflicts += 1;
            }
            Err(err) => return Err(err),
        }
    }
    Ok((scope, stats))
}
