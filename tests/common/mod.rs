#![allow(dead_code)]

use codeseer::db::Db;
use codeseer::indexer::Indexer;
use codeseer::model::{IngestSummary, Symbol};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const REPO_URL: &str = "file:///fixture";

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn copy_dir(src: &Path, dst: &Path) {
    std::fs::create_dir_all(dst).unwrap();
    for entry in std::fs::read_dir(src).unwrap() {
        let entry = entry.unwrap();
        let path = entry.path();
        let target = dst.join(entry.file_name());
        if entry.file_type().unwrap().is_dir() {
            copy_dir(&path, &target);
        } else {
            std::fs::copy(&path, &target).unwrap();
        }
    }
}

/// Fixture copied into a scratch directory, with the database inside it.
pub struct Repo {
    pub dir: TempDir,
    pub indexer: Indexer,
}

impl Repo {
    pub fn new(fixture: &str) -> Self {
        let dir = TempDir::new().unwrap();
        copy_dir(&fixture_path(fixture), dir.path());
        let db_path = dir.path().join(".codeseer").join("codeseer.sqlite");
        let indexer = Indexer::new(dir.path().to_path_buf(), db_path)
            .unwrap()
            .with_workers(2);
        Self { dir, indexer }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, rel_path: &str, content: &str) {
        let path = self.root().join(rel_path);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    pub fn ingest(&self) -> IngestSummary {
        self.indexer.ingest("fixture", REPO_URL).unwrap()
    }

    pub fn db(&self) -> &Db {
        self.indexer.db()
    }

    pub fn project_id(&self) -> i64 {
        self.db().require_project(REPO_URL).unwrap().id
    }

    /// The single symbol called `name` defined in `file`.
    pub fn symbol(&self, name: &str, file: &str) -> Symbol {
        let mut found = self
            .db()
            .find_symbols_by_name(self.project_id(), name, Some(file))
            .unwrap();
        assert_eq!(found.len(), 1, "expected one {name} in {file}");
        found.remove(0)
    }
}
