use rusqlite::ErrorCode;

use crate::types::ItemId;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Delayed action queue is empty")]
    EmptyQueue,

    #[error("Lock timeout: {0}")]
    LockTimeout(String),

    #[error("Item not found: {0}")]
    ItemNotFound(ItemId),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Gave up after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<IndexError>,
    },
}

impl IndexError {
    /// Returns true for failures a retry may clear (busy or locked backend).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Backend(_) => true,
            Self::Sqlite(rusqlite::Error::SqliteFailure(failure, _)) => matches!(
                failure.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;
