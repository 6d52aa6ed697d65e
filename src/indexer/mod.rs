use crate::config::Config;
use crate::db::Db;
use crate::error::{GraphError, Result as GraphResult};
use crate::indexer::extract::ExtractorRegistry;
use crate::model::{IngestSummary, ResolutionStats};
use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info, warn};

pub mod calls;
pub mod extract;
pub mod identity;
pub mod imports;
pub mod javascript;
pub mod python;
pub mod scan;

/// What one file contributed to the graph.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FileStats {
    pub symbols: usize,
    pub orphans_skipped: usize,
    pub conflicts: usize,
    pub imports: usize,
    /// Call sites newly stored; repeats of known sites are not counted.
    pub calls: usize,
    /// Call sites whose enclosing symbol was skipped.
    pub calls_dropped: usize,
}

#[derive(Debug)]
enum FileOutcome {
    Ingested(FileStats),
    Skipped,
    Failed,
    Aborted(GraphError),
}

/// Extract `content` and store its symbols, imports and call sites in one
/// transaction. Parse failures leave the store untouched.
pub fn ingest_file(
    db: &Db,
    registry: &mut ExtractorRegistry,
    project_id: i64,
    rel_path: &str,
    content: &str,
) -> GraphResult<FileStats> {
    let extractor = registry
        .for_path_mut(rel_path)
        .ok_or_else(|| GraphError::parse(rel_path, "no extractor for this file type"))?;
    let extracted = extractor.extract(rel_path, content)?;

    db.write_file(project_id, rel_path, |writer| {
        let (scope, persisted) = identity::persist_symbols(writer, rel_path, &extracted.symbols)?;
        let mut stats = FileStats {
            symbols: persisted.stored,
            orphans_skipped: persisted.orphans_skipped,
            conflicts: persisted.conflicts,
            ..FileStats::default()
        };
        for import in &extracted.imports {
            writer.upsert_import(import)?;
            stats.imports += 1;
        }
        for call in &extracted.calls {
            let Some(source_id) = scope.resolve(call.source) else {
                stats.calls_dropped += 1;
                continue;
            };
            if writer.insert_call(source_id, call)? {
                stats.calls += 1;
            }
        }
        Ok(stats)
    })
}

/// Run both resolver passes: imports first, then calls.
pub fn link(
    db: &Db,
    project_id: i64,
    registry: &ExtractorRegistry,
) -> GraphResult<(ResolutionStats, ResolutionStats)> {
    let imports = imports::resolve_imports(db, project_id, registry)?;
    let calls = calls::resolve_calls(db, project_id)?;
    Ok((imports, calls))
}

pub struct Indexer {
    repo_root: PathBuf,
    db: Db,
    scan_options: scan::ScanOptions,
    workers: usize,
}

impl Indexer {
    pub fn new(repo_root: PathBuf, db_path: PathBuf) -> Result<Self> {
        Self::new_with_options(repo_root, db_path, scan::ScanOptions::default())
    }

    pub fn new_with_options(
        repo_root: PathBuf,
        db_path: PathBuf,
        scan_options: scan::ScanOptions,
    ) -> Result<Self> {
        let repo_root = std::fs::canonicalize(&repo_root).unwrap_or(repo_root);
        let db = Db::new(&db_path).context("open graph database")?;
        Ok(Self {
            repo_root,
            db,
            scan_options,
            workers: Config::get().ingest_workers,
        })
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    /// Build the graph for the repository: extract every file in parallel,
    /// then resolve imports, then resolve calls.
    pub fn ingest(&self, project_name: &str, repo_url: &str) -> Result<IngestSummary> {
        let started = Instant::now();
        let config = Config::get();
        let registry = ExtractorRegistry::new()?;
        let project = self.db.ensure_project(project_name, repo_url)?;
        info!(
            project = project.id,
            repo = %self.repo_root.display(),
            workers = self.workers,
            "ingest started"
        );

        let scanned = scan::scan_repo_with_options(&self.repo_root, self.scan_options)?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
            .context("build ingest worker pool")?;
        let outcomes: Vec<FileOutcome> = pool.install(|| {
            scanned
                .par_iter()
                .map_init(ExtractorRegistry::new, |registry, file| {
                    self.process_file(registry, project.id, file, config.max_file_bytes)
                })
                .collect()
        });

        let mut summary = IngestSummary {
            project_id: project.id,
            files_scanned: scanned.len(),
            ..IngestSummary::default()
        };
        for outcome in outcomes {
            match outcome {
                FileOutcome::Ingested(stats) => {
                    summary.files_processed += 1;
                    summary.symbols += stats.symbols;
                    summary.orphans_skipped += stats.orphans_skipped;
                    summary.conflicts += stats.conflicts;
                }
                FileOutcome::Skipped => {}
                FileOutcome::Failed => summary.files_failed += 1,
                FileOutcome::Aborted(err) => {
                    return Err(err).context("store extracted file");
                }
            }
        }
        info!(
            processed = summary.files_processed,
            failed = summary.files_failed,
            symbols = summary.symbols,
            "extraction finished"
        );

        let (imports, calls) = link(&self.db, project.id, &registry)?;
        summary.imports = imports;
        summary.calls = calls;
        summary.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            project = project.id,
            files = summary.files_processed,
            duration_ms = summary.duration_ms,
            "ingest finished"
        );
        Ok(summary)
    }

    fn process_file(
        &self,
        registry: &mut Result<ExtractorRegistry>,
        project_id: i64,
        file: &scan::ScannedFile,
        max_file_bytes: u64,
    ) -> FileOutcome {
        let registry = match registry {
            Ok(registry) => registry,
            Err(err) => {
                warn!(path = %file.rel_path, error = %err, "no extractors on this worker");
                return FileOutcome::Failed;
            }
        };
        if file.size > max_file_bytes {
            warn!(path = %file.rel_path, size = file.size, "skipping large file");
            return FileOutcome::Skipped;
        }
        let source = match crate::util::read_to_string(&file.abs_path) {
            Ok(source) => source,
            Err(err) => {
                warn!(path = %file.rel_path, error = %err, "read error");
                return FileOutcome::Failed;
            }
        };
        match ingest_file(&self.db, registry, project_id, &file.rel_path, &source) {
            Ok(stats) => {
                debug!(
                    path = %file.rel_path,
                    symbols = stats.symbols,
                    imports = stats.imports,
                    calls = stats.calls,
                    "file ingested"
                );
                FileOutcome::Ingested(stats)
            }
            Err(err) if err.is_recoverable() => {
                warn!(path = %file.rel_path, error = %err, "skipping file");
                FileOutcome::Failed
            }
            Err(err) => FileOutcome::Aborted(err),
        }
    }
}
