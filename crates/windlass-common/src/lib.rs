//! # windlass-common
//!
//! Common types, errors, and configuration for the Windlass query engine.
//!
//! This crate provides the foundational pieces shared by the SQL front end,
//! the code generator and the engine facade:
//!
//! - **Types**: `Timestamp` and `PartitionKey`, the two halves of a row's
//!   storage address
//! - **Errors**: stable `ErrorCode`s and the `Status` value reported to callers
//! - **Config**: table, compile, and engine configuration loadable from TOML
//! - **Memory**: an index-based arena for tree-shaped, single-owner structures
//!
//! ## Example
//!
//! ```rust
//! use windlass_common::types::{PartitionKey, Timestamp};
//! use windlass_common::config::EngineConfig;
//!
//! let key = PartitionKey::from_str("user:42");
//! let ts = Timestamp::new(7);
//! let config = EngineConfig::default();
//! assert!(config.validate().is_ok());
//! assert_eq!(key.len(), 7);
//! assert_eq!(ts.as_u64(), 7);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod memory;
pub mod types;

pub use error::{ErrorCode, Status};
pub use types::{PartitionKey, Timestamp};
