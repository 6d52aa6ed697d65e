//! Blast-radius analysis: who calls this symbol, directly or through other
//! callers, up to a bounded depth.
//!
//! The traversal walks resolved call edges backwards one level at a time.
//! Each symbol is expanded at most once, at the shallowest depth it was
//! reached, so call cycles terminate without relying on the depth cap alone.

pub mod graph;
pub mod types;

pub use types::{DepthSummary, ImpactEntry, ImpactOutcome, ImpactQuery, ImpactReport};

use crate::config::Config;
use crate::db::Db;
use crate::error::Result;
use crate::model::SymbolCompact;
use std::collections::{BTreeMap, HashSet};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Budgets that cut a traversal short.
#[derive(Debug, Clone, Copy)]
pub struct TraversalLimits {
    pub timeout: Duration,
    pub max_results: usize,
}

impl TraversalLimits {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout: Duration::from_millis(config.impact_timeout_ms),
            max_results: config.impact_max_results,
        }
    }
}

pub fn analyze_impact(db: &Db, project_id: i64, query: &ImpactQuery) -> Result<ImpactOutcome> {
    analyze_impact_with_limits(
        db,
        project_id,
        query,
        TraversalLimits::from_config(Config::get()),
    )
}

pub fn analyze_impact_with_limits(
    db: &Db,
    project_id: i64,
    query: &ImpactQuery,
    limits: TraversalLimits,
) -> Result<ImpactOutcome> {
    let start = Instant::now();
    let max_depth = query
        .max_depth
        .unwrap_or(Config::get().impact_max_depth);

    // already in tie-break order: shortest path, path, start line, id
    let matches = db.find_symbols_by_name(project_id, &query.symbol, query.file.as_deref())?;
    let Some(target) = matches.first() else {
        debug!(symbol = %query.symbol, "impact target not found");
        return Ok(ImpactOutcome::NotFound {
            symbol: query.symbol.clone(),
        });
    };
    let target = SymbolCompact::from(target);
    let ambiguous_with = matches.len() - 1;

    let mut entries: Vec<ImpactEntry> = Vec::new();
    let mut seen_sites: HashSet<(i64, String, i64)> = HashSet::new();
    let mut expanded: HashSet<i64> = HashSet::from([target.id]);
    let mut frontier = vec![target.id];
    let mut truncated = false;

    for depth in 1..=max_depth {
        if frontier.is_empty() {
            break;
        }
        if start.elapsed() > limits.timeout {
            truncated = true;
            break;
        }
        let edges = db.callers_of(project_id, &frontier)?;
        let mut next = Vec::new();
        for edge in edges {
            if entries.len() >= limits.max_results {
                truncated = true;
                break;
            }
            // levels only grow, so the first sighting carries the smallest depth
            if !seen_sites.insert((edge.caller.id, edge.file_path.clone(), edge.line)) {
                continue;
            }
            if expanded.insert(edge.caller.id) {
                next.push(edge.caller.id);
            }
            entries.push(ImpactEntry {
                caller: edge.caller,
                file_path: edge.file_path,
                line: edge.line,
                depth,
                callee_id: edge.callee_id,
            });
        }
        if truncated {
            break;
        }
        frontier = next;
    }

    entries.sort_by(|a, b| {
        a.depth
            .cmp(&b.depth)
            .then_with(|| a.file_path.cmp(&b.file_path))
            .then_with(|| a.caller.name.cmp(&b.caller.name))
            .then_with(|| a.line.cmp(&b.line))
            .then_with(|| a.caller.id.cmp(&b.caller.id))
    });

    let mut per_depth: BTreeMap<usize, usize> = BTreeMap::new();
    for entry in &entries {
        *per_depth.entry(entry.depth).or_default() += 1;
    }
    let by_depth = per_depth
        .into_iter()
        .map(|(depth, callers)| DepthSummary { depth, callers })
        .collect();
    let direct = entries.iter().filter(|entry| entry.is_direct()).count();
    let ripple = entries.len() - direct;
    let duration_ms = start.elapsed().as_millis() as u64;

    info!(
        symbol = %target.name,
        file = %target.file_path,
        direct,
        ripple,
        truncated,
        duration_ms,
        "impact analyzed"
    );

    Ok(ImpactOutcome::Found(ImpactReport {
        target,
        ambiguous_with,
        max_depth,
        entries,
        direct,
        ripple,
        by_depth,
        truncated,
        duration_ms,
    }))
}
