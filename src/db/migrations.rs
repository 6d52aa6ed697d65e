use anyhow::{Result, bail};
use rusqlite::{Connection, OptionalExtension};

pub const SCHEMA_VERSION: i64 = 1;

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        ",
    )?;

    let existing = schema_version(conn)?;
    if existing > SCHEMA_VERSION {
        bail!(
            "database schema version {existing} is newer than supported version {SCHEMA_VERSION}"
        );
    }

    if existing < 1 {
        conn.execute_batch(
            "
            BEGIN;
            CREATE TABLE IF NOT EXISTS projects (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                repo_url TEXT NOT NULL UNIQUE,
                created INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS symbols (
                id INTEGER PRIMARY KEY,
                project_id INTEGER NOT NULL,
                parent_id INTEGER,
                parent_key INTEGER NOT NULL DEFAULT 0,
                file_path TEXT NOT NULL,
                name TEXT NOT NULL,
                kind TEXT NOT NULL,
                signature TEXT,
                start_line INTEGER NOT NULL,
                end_line INTEGER NOT NULL,
                start_byte INTEGER NOT NULL,
                end_byte INTEGER NOT NULL,
                FOREIGN KEY(project_id) REFERENCES projects(id) ON DELETE CASCADE,
                FOREIGN KEY(parent_id) REFERENCES symbols(id) ON DELETE SET NULL,
                UNIQUE(project_id, file_path, parent_key, name)
            );

            CREATE INDEX IF NOT EXISTS idx_symbols_name ON symbols(project_id, name);
            CREATE INDEX IF NOT EXISTS idx_symbols_file ON symbols(project_id, file_path);
            CREATE INDEX IF NOT EXISTS idx_symbols_parent ON symbols(parent_id);

            CREATE TABLE IF NOT EXISTS imports (
                id INTEGER PRIMARY KEY,
                project_id INTEGER NOT NULL,
                file_path TEXT NOT NULL,
                module TEXT NOT NULL,
                name TEXT NOT NULL,
                binding TEXT,
                line INTEGER NOT NULL DEFAULT 0,
                resolved_symbol_id INTEGER,
                is_resolved INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY(project_id) REFERENCES projects(id) ON DELETE CASCADE,
                FOREIGN KEY(resolved_symbol_id) REFERENCES symbols(id) ON DELETE SET NULL,
                UNIQUE(project_id, file_path, module, name)
            );

            CREATE INDEX IF NOT EXISTS idx_imports_unresolved ON imports(project_id, is_resolved);
            CREATE INDEX IF NOT EXISTS idx_imports_file ON imports(project_id, file_path);

            CREATE TABLE IF NOT EXISTS calls (
                id INTEGER PRIMARY KEY,
                project_id INTEGER NOT NULL,
                file_path TEXT NOT NULL,
                source_symbol_id INTEGER NOT NULL,
                callee_name TEXT NOT NULL,
                line_number INTEGER NOT NULL,
                resolved_symbol_id INTEGER,
                FOREIGN KEY(project_id) REFERENCES projects(id) ON DELETE CASCADE,
                FOREIGN KEY(source_symbol_id) REFERENCES symbols(id) ON DELETE CASCADE,
                FOREIGN KEY(resolved_symbol_id) REFERENCES symbols(id) ON DELETE SET NULL,
                UNIQUE(project_id, source_symbol_id, callee_name, line_number)
            );

            CREATE INDEX IF NOT EXISTS idx_calls_target ON calls(resolved_symbol_id);
            CREATE INDEX IF NOT EXISTS idx_calls_source ON calls(source_symbol_id);
            CREATE INDEX IF NOT EXISTS idx_calls_project_target ON calls(project_id, resolved_symbol_id);
            COMMIT;
            ",
        )?;
    }

    if existing < SCHEMA_VERSION {
        conn.execute(
            "INSERT INTO meta (key, value) VALUES ('schema_version', ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            [SCHEMA_VERSION.to_string()],
        )?;
    }

    Ok(())
}

fn schema_version(conn: &Connection) -> Result<i64> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(raw.and_then(|value| value.parse().ok()).unwrap_or(0))
}
