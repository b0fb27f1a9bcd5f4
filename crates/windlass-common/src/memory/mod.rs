//! Memory management utilities.
//!
//! Expression trees for UDF bodies and query plans are acyclic and owned by
//! a single plan. They are stored in an [`Arena`] and linked by [`NodeId`]
//! indices instead of boxed pointers.

mod arena;

pub use arena::{Arena, NodeId};
