//! Code generation.
//!
//! A [`QueryPlan`](crate::logical::QueryPlan) is lowered into an
//! [`IrModule`]: a straight-line, SSA-style instruction list that reads
//! the current row, evaluates inlined UDF bodies, folds window aggregates
//! over the current frame, and names the registers that form the output
//! row. A [`CodeBackend`] compiles the module into a [`Callable`].
//!
//! The built-in [`ClosureBackend`] specializes every instruction into a
//! typed closure at compile time.

mod backend;
mod ir;
mod lower;

pub use backend::{
    backend_by_name, Callable, ClosureBackend, CodeBackend, CompileError, ExecutionError,
    ExecutionResult, FrameInput,
};
pub use ir::{Inst, IrModule, Reg};
pub use lower::lower;
