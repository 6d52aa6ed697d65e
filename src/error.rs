use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Error, Debug)]
pub enum GraphError {
    /// File unreadable or syntactically invalid. The file is skipped, the run continues.
    #[error("parse error in {path}: {message}")]
    Parse { path: String, message: String },

    #[error("symbol not found: {symbol}")]
    NotFound { symbol: String },

    /// Upsert key already held by a symbol of another kind.
    #[error("storage conflict for {file_path}:{name}: existing {existing_kind}, incoming {kind}")]
    StorageConflict {
        file_path: String,
        name: String,
        existing_kind: String,
        kind: String,
    },

    #[error("project not indexed: {url}")]
    ProjectNotIndexed { url: String },

    #[error("invalid pattern {pattern}: {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("sqlite error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GraphError {
    pub fn parse(path: impl Into<String>, message: impl Into<String>) -> Self {
        GraphError::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Errors isolated to a single file or record; the run carries on past them.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            GraphError::Parse { .. } | GraphError::StorageConflict { .. }
        )
    }
}
