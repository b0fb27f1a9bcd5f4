//! Storage error types.

use std::fmt;

use windlass_common::ErrorCode;

use super::codec::CodecError;

/// Storage error type.
#[derive(Debug)]
pub enum StorageError {
    /// Operation on a table that has not been initialized.
    NotInitialized(String),
    /// Operation on a table whose `init` failed.
    InitFailed(String),
    /// Row buffer exceeds the configured maximum size.
    RowTooLarge {
        /// Table name.
        table: String,
        /// Size of the rejected row.
        size: usize,
        /// Configured limit.
        limit: usize,
    },
    /// Table not found in the catalog.
    TableNotFound(String),
    /// Table already registered in the catalog.
    TableExists(String),
    /// Row buffer could not be decoded.
    Codec(CodecError),
}

impl StorageError {
    /// Returns the stable error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            StorageError::TableNotFound(_) => ErrorCode::NotFound,
            StorageError::TableExists(_) => ErrorCode::InvalidArgument,
            StorageError::Codec(_) => ErrorCode::CodecError,
            _ => ErrorCode::StorageError,
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::NotInitialized(name) => write!(f, "Table not initialized: {}", name),
            StorageError::InitFailed(msg) => write!(f, "Table init failed: {}", msg),
            StorageError::RowTooLarge { table, size, limit } => write!(
                f,
                "Row of {} bytes exceeds limit of {} bytes in table {}",
                size, limit, table
            ),
            StorageError::TableNotFound(name) => write!(f, "Table not found: {}", name),
            StorageError::TableExists(name) => write!(f, "Table already exists: {}", name),
            StorageError::Codec(e) => write!(f, "Codec error: {}", e),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Codec(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CodecError> for StorageError {
    fn from(e: CodecError) -> Self {
        StorageError::Codec(e)
    }
}

/// Storage result type.
pub type StorageResult<T> = Result<T, StorageError>;
