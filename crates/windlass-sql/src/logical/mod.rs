//! Logical query planning.
//!
//! The planner resolves a parsed script against a table schema and produces
//! a [`QueryPlan`]: a flat projection list whose scalar expressions live in
//! a plan-local arena, plus the normalized window frame and row limit.

mod builder;
mod expr;
mod plan;
mod schema;

pub use builder::*;
pub use expr::*;
pub use plan::*;
pub use schema::*;
