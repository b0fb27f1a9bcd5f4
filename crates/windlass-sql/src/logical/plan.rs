//! The resolved query plan.

use std::fmt;
use std::ops::Range;

use windlass_common::memory::Arena;

use crate::parser::{AggregateFunction, DataType, FunctionAst};

use super::expr::{PlanExpr, PlanExprId, PlanExprKind};
use super::schema::SchemaRef;

/// Normalized `ROWS BETWEEN k PRECEDING AND CURRENT ROW` frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowFrameSpec {
    /// Declared window name.
    pub name: String,
    /// PARTITION BY column position in the input schema.
    pub partition_by: usize,
    /// ORDER BY column position in the input schema.
    pub order_by: usize,
    /// Rows before the current row included in the frame.
    pub preceding: u32,
}

impl WindowFrameSpec {
    /// Returns the frame of the row at `position` within its partition.
    ///
    /// The frame always ends at (and includes) the current row.
    pub fn frame(&self, position: usize) -> Range<usize> {
        position.saturating_sub(self.preceding as usize)..position + 1
    }
}

/// A windowed aggregate bound to the plan's frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowAggregate {
    /// Aggregate function.
    pub func: AggregateFunction,
    /// Input column position; `None` for `count(*)`.
    pub column: Option<usize>,
    /// Type of the input column.
    pub input_type: Option<DataType>,
}

/// How one output column is produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectionKind {
    /// Copy of an input column.
    Column(usize),
    /// Scalar expression evaluated on the current row.
    Scalar(PlanExprId),
    /// Aggregate folded over the current row's frame.
    Window(WindowAggregate),
}

/// One output column.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    /// Output column name.
    pub name: String,
    /// Output column type.
    pub data_type: DataType,
    /// Producer.
    pub kind: ProjectionKind,
}

/// A resolved query: what to read, how to compute each output column,
/// and how many rows to produce.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    /// Source table name.
    pub table: String,
    /// Source table id.
    pub table_id: u32,
    /// Schema of the source rows.
    pub input_schema: SchemaRef,
    /// Output columns in order.
    pub projections: Vec<Projection>,
    /// Window frame, for windowed queries.
    pub window: Option<WindowFrameSpec>,
    /// LIMIT clause.
    pub limit: Option<u64>,
    /// Schema of the produced rows.
    pub output_schema: SchemaRef,
    /// UDFs referenced by `Call` nodes, by index.
    pub functions: Vec<FunctionAst>,
    pub(crate) nodes: Arena<PlanExpr>,
}

impl QueryPlan {
    /// Returns an expression node.
    pub fn expr(&self, id: PlanExprId) -> &PlanExpr {
        &self.nodes[id]
    }

    /// Returns the number of expression nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if rows are evaluated partition by partition.
    pub fn is_windowed(&self) -> bool {
        self.window.is_some()
    }

    /// Returns the row cap for a run: the smaller of `max_rows` and LIMIT.
    pub fn row_cap(&self, max_rows: usize) -> usize {
        match self.limit {
            Some(limit) => max_rows.min(usize::try_from(limit).unwrap_or(usize::MAX)),
            None => max_rows,
        }
    }

    fn fmt_expr(&self, id: PlanExprId, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = &self.nodes[id];
        match &node.kind {
            PlanExprKind::Column(i) => match self.input_schema.field(*i) {
                Some(field) => write!(f, "{}", field.name),
                None => write!(f, "#{}", i),
            },
            PlanExprKind::Literal(v) => write!(f, "{}", v),
            PlanExprKind::Binary { op, left, right } => {
                write!(f, "(")?;
                self.fmt_expr(*left, f)?;
                write!(f, " {} ", op)?;
                self.fmt_expr(*right, f)?;
                write!(f, ")")
            }
            PlanExprKind::Negate(inner) => {
                write!(f, "-")?;
                self.fmt_expr(*inner, f)
            }
            PlanExprKind::Cast(inner) => {
                write!(f, "CAST(")?;
                self.fmt_expr(*inner, f)?;
                write!(f, " AS {})", node.data_type)
            }
            PlanExprKind::Call { function, args } => {
                let name = self
                    .functions
                    .get(*function)
                    .map_or("?", |func| func.name.as_str());
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    self.fmt_expr(*arg, f)?;
                }
                write!(f, ")")
            }
        }
    }

    fn column_name(&self, index: usize) -> &str {
        self.input_schema
            .field(index)
            .map_or("?", |field| field.name.as_str())
    }
}

impl fmt::Display for QueryPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut depth = 0usize;
        if let Some(limit) = self.limit {
            writeln!(f, "Limit: fetch={}", limit)?;
            depth += 1;
        }

        writeln!(f, "{}Projection: {}", "  ".repeat(depth), self.output_schema)?;
        for projection in &self.projections {
            write!(f, "{}  {} := ", "  ".repeat(depth), projection.name)?;
            match &projection.kind {
                ProjectionKind::Column(i) => write!(f, "{}", self.column_name(*i))?,
                ProjectionKind::Scalar(id) => self.fmt_expr(*id, f)?,
                ProjectionKind::Window(agg) => match agg.column {
                    Some(col) => write!(f, "{}({}) OVER frame", agg.func, self.column_name(col))?,
                    None => write!(f, "{}(*) OVER frame", agg.func)?,
                },
            }
            writeln!(f)?;
        }
        depth += 1;

        if let Some(window) = &self.window {
            writeln!(
                f,
                "{}Window: {} partition_by={} order_by={} rows={} preceding",
                "  ".repeat(depth),
                window.name,
                self.column_name(window.partition_by),
                self.column_name(window.order_by),
                window.preceding
            )?;
            depth += 1;
        }

        write!(
            f,
            "{}Scan: {} {}",
            "  ".repeat(depth),
            self.table,
            self.input_schema
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(preceding: u32) -> WindowFrameSpec {
        WindowFrameSpec {
            name: "w".to_string(),
            partition_by: 0,
            order_by: 1,
            preceding,
        }
    }

    #[test]
    fn test_frame_bounds() {
        let w = spec(3);
        assert_eq!(w.frame(0), 0..1);
        assert_eq!(w.frame(2), 0..3);
        assert_eq!(w.frame(3), 0..4);
        assert_eq!(w.frame(4), 1..5);
        assert_eq!(w.frame(10), 7..11);
    }

    #[test]
    fn test_zero_preceding_is_current_row() {
        let w = spec(0);
        for i in 0..5 {
            assert_eq!(w.frame(i), i..i + 1);
        }
    }
}
