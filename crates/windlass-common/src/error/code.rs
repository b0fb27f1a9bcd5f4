//! Stable error codes and the status value returned to callers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error codes for categorizing errors.
///
/// These codes can be used for programmatic error handling and
/// are stable across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum ErrorCode {
    // General errors (0x0000 - 0x00FF)
    /// Operation completed successfully.
    Ok = 0x0000,
    /// Invalid argument provided.
    InvalidArgument = 0x0003,
    /// Requested object does not exist.
    NotFound = 0x0004,

    // Storage errors (0x0200 - 0x02FF)
    /// Table store failure: not initialized, failed init, oversized row.
    StorageError = 0x0200,
    /// Row buffer does not match the schema layout.
    CodecError = 0x0201,

    // Query errors (0x0600 - 0x06FF)
    /// Malformed UDF block or SQL text.
    SyntaxError = 0x0600,
    /// Unknown column, function, or window reference.
    ResolutionError = 0x0601,
    /// Window frame outside the supported shape.
    UnsupportedFrame = 0x0602,

    // Codegen errors (0x0700 - 0x07FF)
    /// Backend failed to produce a callable.
    CompileError = 0x0700,

    // Execution errors (0x0800 - 0x08FF)
    /// Runtime failure inside a compiled callable.
    ExecutionError = 0x0800,
}

impl ErrorCode {
    /// Returns the numeric code.
    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns the error category name.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match (*self as u16) >> 8 {
            0x00 => "General",
            0x02 => "Storage",
            0x06 => "Query",
            0x07 => "Codegen",
            0x08 => "Execution",
            _ => "Unknown",
        }
    }

    /// Returns true for the success code.
    #[inline]
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, ErrorCode::Ok)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Status-plus-message value reported to the immediate caller.
///
/// # Example
///
/// ```rust
/// use windlass_common::error::{ErrorCode, Status};
///
/// let status = Status::error(ErrorCode::ResolutionError, "column 'c9' not found");
/// assert!(!status.is_ok());
/// assert_eq!(status.code().category(), "Query");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    code: ErrorCode,
    message: String,
}

impl Status {
    /// Successful status with an empty message.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            code: ErrorCode::Ok,
            message: String::new(),
        }
    }

    /// Failed status carrying the originating error kind.
    #[must_use]
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Returns the status code.
    #[inline]
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Returns the message (empty on success).
    #[inline]
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns true when the status carries no error.
    #[inline]
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.code.is_ok()
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::ok()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            write!(f, "OK")
        } else {
            write!(f, "{} [{}]: {}", self.code, self.code.category(), self.message)
        }
    }
}
