//! Resolved scalar expressions.
//!
//! Nodes are stored in the owning plan's arena and reference each other by
//! [`PlanExprId`]. Every node is typed; implicit conversions are explicit
//! `Cast` nodes.

use windlass_common::memory::NodeId;

use crate::parser::{BinaryOperator, DataType};
use crate::storage::Value;

/// Handle to a node in a plan arena.
pub type PlanExprId = NodeId<PlanExpr>;

/// A typed expression node.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanExpr {
    /// Node kind.
    pub kind: PlanExprKind,
    /// Result type.
    pub data_type: DataType,
}

impl PlanExpr {
    /// Creates a node.
    pub fn new(kind: PlanExprKind, data_type: DataType) -> Self {
        Self { kind, data_type }
    }
}

/// Expression node kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanExprKind {
    /// Input column by schema position.
    Column(usize),
    /// Typed constant.
    Literal(Value),
    /// Binary arithmetic; both operands already have the node's type.
    Binary {
        /// Operator.
        op: BinaryOperator,
        /// Left operand.
        left: PlanExprId,
        /// Right operand.
        right: PlanExprId,
    },
    /// Numeric negation.
    Negate(PlanExprId),
    /// Numeric conversion to the node's type.
    Cast(PlanExprId),
    /// UDF call; arguments already have the parameter types.
    Call {
        /// Index into the plan's function list.
        function: usize,
        /// Arguments in parameter order.
        args: Vec<PlanExprId>,
    },
}
