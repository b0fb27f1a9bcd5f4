//! Engine error type.

use thiserror::Error;
use windlass_common::{ErrorCode, Status};
use windlass_sql::codegen::ExecutionError;
use windlass_sql::{CompileError, ParseError, PlanError, StorageError};

/// Any failure of `Engine::get` or `RunSession::run`.
///
/// Each variant keeps the originating layer's error so callers can match
/// on it; [`EngineError::code`] flattens it to a stable code.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Script parse failure.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Resolution or frame failure.
    #[error("plan error: {0}")]
    Plan(#[from] PlanError),

    /// Catalog or table store failure.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Backend failure or compile timeout.
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),

    /// Failure inside the compiled callable.
    #[error("execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// Invalid engine configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl EngineError {
    /// Returns the stable error code of the originating failure.
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::Parse(e) => e.code(),
            EngineError::Plan(e) => e.code(),
            EngineError::Storage(e) => e.code(),
            EngineError::Compile(e) => e.code(),
            EngineError::Execution(e) => e.code(),
            EngineError::Config(_) => ErrorCode::InvalidArgument,
        }
    }

    /// Converts into a status value.
    pub fn status(&self) -> Status {
        Status::error(self.code(), self.to_string())
    }
}

impl From<EngineError> for Status {
    fn from(err: EngineError) -> Self {
        err.status()
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_follow_origin() {
        let err = EngineError::from(PlanError::ColumnNotFound("c9".into()));
        assert_eq!(err.code(), ErrorCode::ResolutionError);

        let err = EngineError::from(PlanError::UnsupportedFrame("RANGE".into()));
        assert_eq!(err.code(), ErrorCode::UnsupportedFrame);

        let err = EngineError::from(ParseError::EmptyQuery);
        assert_eq!(err.code(), ErrorCode::SyntaxError);

        let err = EngineError::from(StorageError::TableNotFound("db.t9".into()));
        assert_eq!(err.code(), ErrorCode::NotFound);

        let err = EngineError::from(CompileError::UnknownBackend("llvm".into()));
        assert_eq!(err.code(), ErrorCode::CompileError);
    }

    #[test]
    fn test_status_carries_message() {
        let status: Status = EngineError::from(PlanError::ColumnNotFound("c9".into())).into();
        assert!(!status.is_ok());
        assert_eq!(status.code(), ErrorCode::ResolutionError);
        assert_eq!(status.message(), "plan error: Column not found: c9");
    }
}
