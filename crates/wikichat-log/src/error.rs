use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LogError>;

#[derive(Debug, Error)]
pub enum LogError {
    #[error("chat log I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chat log operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid chat record: {0}")]
    InvalidRecord(#[from] RecordError),

    #[error("no chat entry with id {0}")]
    NotFound(u64),

    #[error("chat entry {0} cannot take any more votes")]
    CountOverflow(u64),
}

/// Why a single log line could not be encoded or decoded.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("field `{field}` is not a number: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("field `{field}` contains a forbidden character")]
    ForbiddenChar { field: &'static str },
}
