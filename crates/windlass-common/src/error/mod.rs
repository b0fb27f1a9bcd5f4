//! Error reporting shared by every Windlass layer.
//!
//! Each layer defines its own `thiserror` enum; all of them map onto an
//! [`ErrorCode`] so that callers see one stable taxonomy, and onto a
//! [`Status`] when the error crosses the engine boundary.

mod code;

pub use code::{ErrorCode, Status};
