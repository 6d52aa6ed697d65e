use crate::config::Config;
use crate::db::Db;
use crate::error::Result;
use crate::indexer::extract::ExtractorRegistry;
use crate::model::{Import, ResolutionStats, Symbol};
use crate::util;
use std::collections::HashMap;
use tracing::{debug, info};

/// Link every unresolved import of the project to the symbol it names.
///
/// Imports are read in id order, one page of `resolve_batch_size` at a
/// time, and each page is committed on its own. Rows already resolved are
/// never revisited, so running this again only picks up what is still open.
pub fn resolve_imports(
    db: &Db,
    project_id: i64,
    registry: &ExtractorRegistry,
) -> Result<ResolutionStats> {
    let batch_size = Config::get().resolve_batch_size;
    let mut by_name: HashMap<String, Vec<Symbol>> = HashMap::new();
    let mut last_id = 0;
    let mut newly_resolved = 0;

    loop {
        let batch = db.unresolved_imports_batch(project_id, last_id, batch_size)?;
        let Some(last) = batch.last() else {
            break;
        };
        last_id = last.id;

        let mut resolutions = Vec::new();
        for import in &batch {
            if !by_name.contains_key(&import.name) {
                let symbols = db.symbols_named(project_id, &import.name)?;
                by_name.insert(import.name.clone(), symbols);
            }
            let symbols = by_name.get(&import.name).map(Vec::as_slice).unwrap_or(&[]);
            match resolve_import(registry, import, symbols) {
                Some(symbol_id) => resolutions.push((import.id, symbol_id)),
                None => debug!(
                    file = %import.file_path,
                    module = %import.module,
                    name = %import.name,
                    "import left unresolved"
                ),
            }
        }
        newly_resolved += db.apply_import_resolutions(&resolutions)?;
    }

    let mut stats = db.import_stats(project_id)?;
    stats.newly_resolved = newly_resolved;
    info!(
        total = stats.total,
        resolved = stats.resolved,
        newly_resolved,
        "imports resolved"
    );
    Ok(stats)
}

/// `symbols` are every symbol called `import.name`, already in tie-break
/// order (shortest path, path, start line, id).
fn resolve_import(registry: &ExtractorRegistry, import: &Import, symbols: &[Symbol]) -> Option<i64> {
    if symbols.is_empty() {
        return None;
    }
    let extractor = registry.for_path(&import.file_path)?;
    let candidates = extractor.import_candidates(&import.file_path, &import.module, &import.name);
    pick_candidate(&candidates, symbols)
}

/// First symbol living in a candidate file, trying candidates in order.
pub fn pick_candidate(candidates: &[String], symbols: &[Symbol]) -> Option<i64> {
    candidates.iter().find_map(|candidate| {
        symbols
            .iter()
            .find(|symbol| util::path_matches(&symbol.file_path, candidate))
            .map(|symbol| symbol.id)
    })
}
