use crate::config::Config;
use crate::error::{GraphError, Result};
use crate::indexer::extract::{CallInput, ImportInput, SymbolInput};
use crate::indexer::identity::SymbolSink;
use crate::model::{Call, Import, Project, ProjectOverview, ResolutionStats, Symbol, SymbolCompact};
use anyhow::Context;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

mod migrations;

pub use migrations::SCHEMA_VERSION;

const SYMBOL_COLUMNS: &str = "s.id, s.project_id, s.parent_id, s.file_path, s.name, s.kind, \
     s.signature, s.start_line, s.end_line, s.start_byte, s.end_byte";

const IMPORT_COLUMNS: &str =
    "id, project_id, file_path, module, name, binding, line, resolved_symbol_id, is_resolved";

const CALL_COLUMNS: &str =
    "id, project_id, file_path, source_symbol_id, callee_name, line_number, resolved_symbol_id";

/// Upper bound on bound parameters per `IN (...)` list.
const IN_CHUNK: usize = 500;

#[derive(Debug)]
struct ConnectionCustomizer;

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for ConnectionCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.busy_timeout(Duration::from_secs(30))?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        Ok(())
    }

    fn on_release(&self, _conn: Connection) {}
}

/// One resolved call edge seen from the callee side.
#[derive(Debug, Clone)]
pub struct CallerEdge {
    pub callee_id: i64,
    pub caller: SymbolCompact,
    /// File of the call site.
    pub file_path: String,
    pub line: i64,
}

pub struct Db {
    db_path: PathBuf,
    write_conn: Arc<Mutex<Connection>>,
    read_pool: Pool<SqliteConnectionManager>,
}

impl Db {
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create db directory {}", parent.display()))?;
        }

        let config = Config::get();
        debug!(
            path = %db_path.display(),
            pool_size = config.pool_size,
            min_idle = config.pool_min_idle,
            "opening database"
        );

        // migrations run on the write connection before the pool opens
        let write_conn = Connection::open(db_path)
            .with_context(|| format!("open sqlite db at {}", db_path.display()))?;
        write_conn.busy_timeout(Duration::from_secs(30))?;
        write_conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            ",
        )?;
        migrations::migrate(&write_conn)?;

        let write_conn = Arc::new(Mutex::new(write_conn));

        let manager = SqliteConnectionManager::file(db_path);
        let read_pool = Pool::builder()
            .max_size(config.pool_size.max(1))
            .min_idle(Some(config.pool_min_idle.min(config.pool_size)))
            .connection_timeout(Duration::from_secs(30))
            .connection_customizer(Box::new(ConnectionCustomizer))
            .build(manager)
            .with_context(|| "create connection pool")?;

        Ok(Self {
            db_path: db_path.to_path_buf(),
            write_conn,
            read_pool,
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn read_conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        Ok(self.read_pool.get()?)
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.write_conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn ensure_project(&self, name: &str, repo_url: &str) -> Result<Project> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO projects (name, repo_url, created) VALUES (?, ?, ?)
             ON CONFLICT(repo_url) DO NOTHING",
            params![name, repo_url, now_epoch()],
        )?;
        let project = conn.query_row(
            "SELECT id, name, repo_url, created FROM projects WHERE repo_url = ?",
            [repo_url],
            project_from_row,
        )?;
        Ok(project)
    }

    pub fn find_project_by_url(&self, repo_url: &str) -> Result<Option<Project>> {
        let conn = self.read_conn()?;
        let project = conn
            .query_row(
                "SELECT id, name, repo_url, created FROM projects WHERE repo_url = ?",
                [repo_url],
                project_from_row,
            )
            .optional()?;
        Ok(project)
    }

    /// Project for `repo_url`, or `ProjectNotIndexed`.
    pub fn require_project(&self, repo_url: &str) -> Result<Project> {
        self.find_project_by_url(repo_url)?
            .ok_or_else(|| GraphError::ProjectNotIndexed {
                url: repo_url.to_string(),
            })
    }

    /// Run `f` inside one write transaction scoped to `file_path`. Nothing is
    /// committed when `f` fails.
    pub fn write_file<T, F>(&self, project_id: i64, file_path: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut FileWriter<'_>) -> Result<T>,
    {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let value = {
            let mut writer = FileWriter {
                tx: &tx,
                project_id,
                file_path,
            };
            f(&mut writer)?
        };
        tx.commit()?;
        Ok(value)
    }

    pub fn symbol(&self, id: i64) -> Result<Option<Symbol>> {
        let conn = self.read_conn()?;
        let sql = format!("SELECT {SYMBOL_COLUMNS} FROM symbols s WHERE s.id = ?");
        let symbol = conn.query_row(&sql, [id], symbol_from_row).optional()?;
        Ok(symbol)
    }

    /// Symbols called `name`, shortest path first, then path, start line, id.
    pub fn symbols_named(&self, project_id: i64, name: &str) -> Result<Vec<Symbol>> {
        let conn = self.read_conn()?;
        let sql = format!(
            "SELECT {SYMBOL_COLUMNS} FROM symbols s
             WHERE s.project_id = ? AND s.name = ?
             ORDER BY length(s.file_path), s.file_path, s.start_line, s.id"
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(params![project_id, name], symbol_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Name lookup optionally narrowed to a file (exact or path suffix).
    pub fn find_symbols_by_name(
        &self,
        project_id: i64,
        name: &str,
        file: Option<&str>,
    ) -> Result<Vec<Symbol>> {
        let symbols = self.symbols_named(project_id, name)?;
        Ok(match file {
            Some(file) => symbols
                .into_iter()
                .filter(|symbol| crate::util::path_matches(&symbol.file_path, file))
                .collect(),
            None => symbols,
        })
    }

    pub fn symbols_in_file(&self, project_id: i64, file_path: &str) -> Result<Vec<Symbol>> {
        let conn = self.read_conn()?;
        let sql = format!(
            "SELECT {SYMBOL_COLUMNS} FROM symbols s
             WHERE s.project_id = ? AND s.file_path = ?
             ORDER BY s.start_line, s.id"
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(params![project_id, file_path], symbol_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn imports_in_file(&self, project_id: i64, file_path: &str) -> Result<Vec<Import>> {
        let conn = self.read_conn()?;
        let sql = format!(
            "SELECT {IMPORT_COLUMNS} FROM imports
             WHERE project_id = ? AND file_path = ?
             ORDER BY line, id"
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(params![project_id, file_path], import_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Next page of unresolved imports after `after_id`, in id order.
    pub fn unresolved_imports_batch(
        &self,
        project_id: i64,
        after_id: i64,
        limit: usize,
    ) -> Result<Vec<Import>> {
        let conn = self.read_conn()?;
        let sql = format!(
            "SELECT {IMPORT_COLUMNS} FROM imports
             WHERE project_id = ? AND is_resolved = 0 AND id > ?
             ORDER BY id
             LIMIT ?"
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(params![project_id, after_id, limit as i64], import_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Next page of calls without a resolved target after `after_id`.
    pub fn unresolved_calls_batch(
        &self,
        project_id: i64,
        after_id: i64,
        limit: usize,
    ) -> Result<Vec<Call>> {
        let conn = self.read_conn()?;
        let sql = format!(
            "SELECT {CALL_COLUMNS} FROM calls
             WHERE project_id = ? AND resolved_symbol_id IS NULL AND id > ?
             ORDER BY id
             LIMIT ?"
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(params![project_id, after_id, limit as i64], call_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Mark imports resolved in one transaction. Already-resolved rows are
    /// left alone; returns how many rows changed.
    pub fn apply_import_resolutions(&self, resolutions: &[(i64, i64)]) -> Result<usize> {
        if resolutions.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let mut changed = 0;
        {
            let mut stmt = tx.prepare_cached(
                "UPDATE imports SET resolved_symbol_id = ?, is_resolved = 1
                 WHERE id = ? AND is_resolved = 0",
            )?;
            for (import_id, symbol_id) in resolutions {
                changed += stmt.execute(params![symbol_id, import_id])?;
            }
        }
        tx.commit()?;
        Ok(changed)
    }

    /// Same contract as [`Db::apply_import_resolutions`] for calls.
    pub fn apply_call_resolutions(&self, resolutions: &[(i64, i64)]) -> Result<usize> {
        if resolutions.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let mut changed = 0;
        {
            let mut stmt = tx.prepare_cached(
                "UPDATE calls SET resolved_symbol_id = ?
                 WHERE id = ? AND resolved_symbol_id IS NULL",
            )?;
            for (call_id, symbol_id) in resolutions {
                changed += stmt.execute(params![symbol_id, call_id])?;
            }
        }
        tx.commit()?;
        Ok(changed)
    }

    pub fn import_stats(&self, project_id: i64) -> Result<ResolutionStats> {
        let conn = self.read_conn()?;
        let (total, resolved): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(is_resolved), 0) FROM imports WHERE project_id = ?",
            [project_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(ResolutionStats {
            total: total as usize,
            resolved: resolved as usize,
            newly_resolved: 0,
        })
    }

    pub fn call_stats(&self, project_id: i64) -> Result<ResolutionStats> {
        let conn = self.read_conn()?;
        let (total, resolved): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COUNT(resolved_symbol_id) FROM calls WHERE project_id = ?",
            [project_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(ResolutionStats {
            total: total as usize,
            resolved: resolved as usize,
            newly_resolved: 0,
        })
    }

    /// Resolved calls whose target is one of `callee_ids`, joined with the
    /// calling symbol.
    pub fn callers_of(&self, project_id: i64, callee_ids: &[i64]) -> Result<Vec<CallerEdge>> {
        let conn = self.read_conn()?;
        let mut out = Vec::new();
        for chunk in callee_ids.chunks(IN_CHUNK) {
            let placeholders = chunk.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            let sql = format!(
                "SELECT c.resolved_symbol_id, c.file_path, c.line_number,
                        s.id, s.kind, s.name, s.file_path, s.start_line, s.signature
                 FROM calls c
                 JOIN symbols s ON s.id = c.source_symbol_id
                 WHERE c.project_id = ? AND c.resolved_symbol_id IN ({placeholders})
                 ORDER BY c.file_path, c.line_number, s.id"
            );
            let mut bound: Vec<&dyn rusqlite::ToSql> = vec![&project_id];
            for id in chunk {
                bound.push(id);
            }
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(bound.as_slice(), |row| {
                Ok(CallerEdge {
                    callee_id: row.get(0)?,
                    file_path: row.get(1)?,
                    line: row.get(2)?,
                    caller: SymbolCompact {
                        id: row.get(3)?,
                        kind: row.get(4)?,
                        name: row.get(5)?,
                        file_path: row.get(6)?,
                        start_line: row.get(7)?,
                        signature: row.get(8)?,
                    },
                })
            })?;
            for row in rows {
                out.push(row?);
            }
        }
        Ok(out)
    }

    /// Symbols of the given kinds with no inbound resolved call, ordered by
    /// file then name.
    pub fn uncalled_symbols(&self, project_id: i64, kinds: &[&str]) -> Result<Vec<Symbol>> {
        if kinds.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.read_conn()?;
        let placeholders = kinds.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT {SYMBOL_COLUMNS} FROM symbols s
             WHERE s.project_id = ? AND s.kind IN ({placeholders})
               AND NOT EXISTS (
                   SELECT 1 FROM calls c WHERE c.resolved_symbol_id = s.id
               )
             ORDER BY s.file_path, s.name, s.id"
        );
        let mut bound: Vec<&dyn rusqlite::ToSql> = vec![&project_id];
        for kind in kinds {
            bound.push(kind);
        }
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(bound.as_slice(), symbol_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn overview(&self, project: Project) -> Result<ProjectOverview> {
        let project_id = project.id;
        let (files, symbols, symbols_by_kind) = {
            let conn = self.read_conn()?;
            let (files, symbols): (i64, i64) = conn.query_row(
                "SELECT COUNT(DISTINCT file_path), COUNT(*) FROM symbols WHERE project_id = ?",
                [project_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            let mut stmt = conn.prepare(
                "SELECT kind, COUNT(*) FROM symbols WHERE project_id = ? GROUP BY kind",
            )?;
            let rows = stmt.query_map([project_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            let mut by_kind = BTreeMap::new();
            for row in rows {
                let (kind, count) = row?;
                by_kind.insert(kind, count as usize);
            }
            (files as usize, symbols as usize, by_kind)
        };
        Ok(ProjectOverview {
            project,
            files,
            symbols,
            symbols_by_kind,
            imports: self.import_stats(project_id)?,
            calls: self.call_stats(project_id)?,
        })
    }
}

/// Write access for one file's ingestion transaction.
pub struct FileWriter<'a> {
    tx: &'a Transaction<'a>,
    project_id: i64,
    file_path: &'a str,
}

impl FileWriter<'_> {
    /// Upsert keyed on `(project, file, parent, name)`. Updates the signature
    /// and location of an existing row of the same kind; a row of a
    /// different kind is a `StorageConflict`.
    pub fn upsert_symbol(&mut self, parent_id: Option<i64>, symbol: &SymbolInput) -> Result<i64> {
        let parent_key = parent_id.unwrap_or(0);
        let kind = symbol.kind.as_str();
        let id: Option<i64> = {
            let mut stmt = self.tx.prepare_cached(
                "INSERT INTO symbols
                 (project_id, parent_id, parent_key, file_path, name, kind, signature,
                  start_line, end_line, start_byte, end_byte)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(project_id, file_path, parent_key, name) DO UPDATE SET
                     signature = excluded.signature,
                     start_line = excluded.start_line,
                     end_line = excluded.end_line,
                     start_byte = excluded.start_byte,
                     end_byte = excluded.end_byte
                 WHERE symbols.kind = excluded.kind
                 RETURNING id",
            )?;
            stmt.query_row(
                params![
                    self.project_id,
                    parent_id,
                    parent_key,
                    self.file_path,
                    symbol.name,
                    kind,
                    symbol.signature,
                    symbol.start_line,
                    symbol.end_line,
                    symbol.start_byte,
                    symbol.end_byte,
                ],
                |row| row.get(0),
            )
            .optional()?
        };
        if let Some(id) = id {
            return Ok(id);
        }
        let existing_kind: String = self.tx.query_row(
            "SELECT kind FROM symbols
             WHERE project_id = ? AND file_path = ? AND parent_key = ? AND name = ?",
            params![self.project_id, self.file_path, parent_key, symbol.name],
            |row| row.get(0),
        )?;
        Err(GraphError::StorageConflict {
            file_path: self.file_path.to_string(),
            name: symbol.name.clone(),
            existing_kind,
            kind: kind.to_string(),
        })
    }

    /// Insert or refresh an import. Resolution state survives re-ingestion.
    pub fn upsert_import(&mut self, import: &ImportInput) -> Result<()> {
        let mut stmt = self.tx.prepare_cached(
            "INSERT INTO imports (project_id, file_path, module, name, binding, line)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(project_id, file_path, module, name) DO UPDATE SET
                 binding = excluded.binding,
                 line = excluded.line",
        )?;
        stmt.execute(params![
            self.project_id,
            self.file_path,
            import.module,
            import.name,
            import.binding,
            import.line,
        ])?;
        Ok(())
    }

    /// Returns false when the call site was already stored.
    pub fn insert_call(&mut self, source_symbol_id: i64, call: &CallInput) -> Result<bool> {
        let mut stmt = self.tx.prepare_cached(
            "INSERT INTO calls (project_id, file_path, source_symbol_id, callee_name, line_number)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(project_id, source_symbol_id, callee_name, line_number) DO NOTHING",
        )?;
        let inserted = stmt.execute(params![
            self.project_id,
            self.file_path,
            source_symbol_id,
            call.callee,
            call.line,
        ])?;
        Ok(inserted > 0)
    }
}

impl SymbolSink for FileWriter<'_> {
    fn upsert_symbol(&mut self, parent_id: Option<i64>, symbol: &SymbolInput) -> Result<i64> {
        FileWriter::upsert_symbol(self, parent_id, symbol)
    }
}

fn now_epoch() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        repo_url: row.get(2)?,
        created: row.get(3)?,
    })
}

fn symbol_from_row(row: &Row<'_>) -> rusqlite::Result<Symbol> {
    Ok(Symbol {
        id: row.get(0)?,
        project_id: row.get(1)?,
        parent_id: row.get(2)?,
        file_path: row.get(3)?,
        name: row.get(4)?,
        kind: row.get(5)?,
        signature: row.get(6)?,
        start_line: row.get(7)?,
        end_line: row.get(8)?,
        start_byte: row.get(9)?,
        end_byte: row.get(10)?,
    })
}

fn import_from_row(row: &Row<'_>) -> rusqlite::Result<Import> {
    Ok(Import {
        id: row.get(0)?,
        project_id: row.get(1)?,
        file_path: row.get(2)?,
        module: row.get(3)?,
        name: row.get(4)?,
        binding: row.get(5)?,
        line: row.get(6)?,
        resolved_symbol_id: row.get(7)?,
        is_resolved: row.get::<_, i64>(8)? != 0,
    })
}

fn call_from_row(row: &Row<'_>) -> rusqlite::Result<Call> {
    Ok(Call {
        id: row.get(0)?,
        project_id: row.get(1)?,
        file_path: row.get(2)?,
        source_symbol_id: row.get(3)?,
        callee_name: row.get(4)?,
        line_number: row.get(5)?,
        resolved_symbol_id: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::extract::SymbolKind;
    use tempfile::TempDir;

    fn open() -> (TempDir, Db) {
        let dir = TempDir::new().unwrap();
        let db = Db::new(&dir.path().join("graph.sqlite")).unwrap();
        (dir, db)
    }

    fn input(kind: SymbolKind, name: &str, line: i64) -> SymbolInput {
        SymbolInput {
            temp_id: 0,
            parent: None,
            kind,
            name: name.to_string(),
            signature: Some("()".to_string()),
            start_line: line,
            end_line: line + 1,
            start_byte: 0,
            end_byte: 10,
        }
    }

    #[test]
    fn ensure_project_is_lookup_or_create() {
        let (_dir, db) = open();
        let first = db.ensure_project("demo", "file:///repo").unwrap();
        let second = db.ensure_project("renamed", "file:///repo").unwrap();
        assert_eq!(first, second);
        assert_eq!(second.name, "demo");
        assert!(db.find_project_by_url("file:///other").unwrap().is_none());
        assert!(matches!(
            db.require_project("file:///other"),
            Err(GraphError::ProjectNotIndexed { .. })
        ));
    }

    #[test]
    fn symbol_upsert_updates_in_place() {
        let (_dir, db) = open();
        let project = db.ensure_project("demo", "file:///repo").unwrap();
        let first = db
            .write_file(project.id, "a.py", |w| {
                w.upsert_symbol(None, &input(SymbolKind::Function, "f", 1))
            })
            .unwrap();
        let second = db
            .write_file(project.id, "a.py", |w| {
                w.upsert_symbol(None, &input(SymbolKind::Function, "f", 7))
            })
            .unwrap();
        assert_eq!(first, second);
        let stored = db.symbol(first).unwrap().unwrap();
        assert_eq!(stored.start_line, 7);
        assert_eq!(db.symbols_in_file(project.id, "a.py").unwrap().len(), 1);
    }

    #[test]
    fn same_name_under_different_parents_is_distinct() {
        let (_dir, db) = open();
        let project = db.ensure_project("demo", "file:///repo").unwrap();
        db.write_file(project.id, "a.py", |w| {
            let a = w.upsert_symbol(None, &input(SymbolKind::Class, "A", 1))?;
            let b = w.upsert_symbol(None, &input(SymbolKind::Class, "B", 5))?;
            let first = w.upsert_symbol(Some(a), &input(SymbolKind::Method, "run", 2))?;
            let second = w.upsert_symbol(Some(b), &input(SymbolKind::Method, "run", 6))?;
            assert_ne!(first, second);
            Ok(())
        })
        .unwrap();
        assert_eq!(db.symbols_named(project.id, "run").unwrap().len(), 2);
    }

    #[test]
    fn kind_change_is_a_storage_conflict() {
        let (_dir, db) = open();
        let project = db.ensure_project("demo", "file:///repo").unwrap();
        db.write_file(project.id, "a.py", |w| {
            w.upsert_symbol(None, &input(SymbolKind::Function, "thing", 1))
        })
        .unwrap();
        let err = db
            .write_file(project.id, "a.py", |w| {
                w.upsert_symbol(None, &input(SymbolKind::Class, "thing", 1))
            })
            .unwrap_err();
        match err {
            GraphError::StorageConflict {
                existing_kind,
                kind,
                ..
            } => {
                assert_eq!(existing_kind, "function");
                assert_eq!(kind, "class");
            }
            other => panic!("unexpected error: {other}"),
        }
        let stored = db.symbols_named(project.id, "thing").unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].kind, "function");
    }

    #[test]
    fn calls_are_deduplicated_and_resolution_is_monotonic() {
        let (_dir, db) = open();
        let project = db.ensure_project("demo", "file:///repo").unwrap();
        let (caller, callee) = db
            .write_file(project.id, "a.py", |w| {
                let caller = w.upsert_symbol(None, &input(SymbolKind::Function, "g", 1))?;
                let callee = w.upsert_symbol(None, &input(SymbolKind::Function, "h", 5))?;
                let call = CallInput {
                    source: 0,
                    callee: "h".to_string(),
                    line: 2,
                };
                assert!(w.insert_call(caller, &call)?);
                assert!(!w.insert_call(caller, &call)?);
                Ok((caller, callee))
            })
            .unwrap();

        let pending = db.unresolved_calls_batch(project.id, 0, 10).unwrap();
        assert_eq!(pending.len(), 1);
        let call_id = pending[0].id;
        assert_eq!(db.apply_call_resolutions(&[(call_id, callee)]).unwrap(), 1);
        // a second resolution never overwrites the first
        assert_eq!(db.apply_call_resolutions(&[(call_id, caller)]).unwrap(), 0);

        let edges = db.callers_of(project.id, &[callee]).unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].caller.name, "g");
        assert_eq!(edges[0].line, 2);
        assert_eq!(db.call_stats(project.id).unwrap().resolved, 1);
    }

    #[test]
    fn import_upsert_keeps_resolution() {
        let (_dir, db) = open();
        let project = db.ensure_project("demo", "file:///repo").unwrap();
        let import = ImportInput {
            module: "libs.utils".to_string(),
            name: "parse".to_string(),
            binding: None,
            line: 1,
        };
        let target = db
            .write_file(project.id, "libs/utils.py", |w| {
                w.upsert_symbol(None, &input(SymbolKind::Function, "parse", 1))
            })
            .unwrap();
        db.write_file(project.id, "app.py", |w| w.upsert_import(&import))
            .unwrap();
        let pending = db.unresolved_imports_batch(project.id, 0, 10).unwrap();
        assert_eq!(pending.len(), 1);
        db.apply_import_resolutions(&[(pending[0].id, target)])
            .unwrap();

        let moved = ImportInput { line: 3, ..import };
        db.write_file(project.id, "app.py", |w| w.upsert_import(&moved))
            .unwrap();
        let imports = db.imports_in_file(project.id, "app.py").unwrap();
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].line, 3);
        assert!(imports[0].is_resolved);
        assert_eq!(imports[0].resolved_symbol_id, Some(target));
    }

    #[test]
    fn uncalled_symbols_filters_by_kind() {
        let (_dir, db) = open();
        let project = db.ensure_project("demo", "file:///repo").unwrap();
        db.write_file(project.id, "a.py", |w| {
            w.upsert_symbol(None, &input(SymbolKind::Function, "f", 1))?;
            w.upsert_symbol(None, &input(SymbolKind::Variable, "X", 3))?;
            Ok(())
        })
        .unwrap();
        let names: Vec<_> = db
            .uncalled_symbols(project.id, &["function", "method", "class"])
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["f"]);
    }
}
