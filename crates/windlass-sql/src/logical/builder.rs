//! Plan builder: resolves a parsed script against a table schema.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;
use windlass_common::memory::Arena;
use windlass_common::ErrorCode;

use crate::parser::{
    AggregateCall, AggregateFunction, DataType, Expr, FunctionAst, FunctionCall, Literal,
    NamedWindow, ParsedScript, SelectItem, WindowFrame, WindowFrameBound, WindowFrameUnits,
};
use crate::storage::{TableHandle, Value};

use super::expr::{PlanExpr, PlanExprId, PlanExprKind};
use super::plan::{Projection, ProjectionKind, QueryPlan, WindowAggregate, WindowFrameSpec};
use super::schema::{Field, Schema};

/// Errors that can occur during planning.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    /// Unknown column.
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    /// Two output or schema columns share a name.
    #[error("Duplicate column name: {0}")]
    DuplicateColumn(String),

    /// Call to a function the UDF block does not define.
    #[error("Function not found: {0}")]
    FunctionNotFound(String),

    /// Call whose arguments do not fit the function's parameters.
    #[error("Argument mismatch in call to {function}: {message}")]
    ArgumentMismatch {
        /// Called function.
        function: String,
        /// Description.
        message: String,
    },

    /// Operand or aggregate input of the wrong type.
    #[error("Type error: {0}")]
    TypeError(String),

    /// Aggregate referencing a window that is not declared.
    #[error("Window not found: {0}")]
    WindowNotFound(String),

    /// Frame other than `ROWS BETWEEN k PRECEDING AND CURRENT ROW`.
    #[error("Unsupported window frame: {0}")]
    UnsupportedFrame(String),
}

impl PlanError {
    /// Returns the engine error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            PlanError::UnsupportedFrame(_) => ErrorCode::UnsupportedFrame,
            _ => ErrorCode::ResolutionError,
        }
    }
}

/// Result type for plan building.
pub type PlanResult<T> = Result<T, PlanError>;

/// Builds a query plan for `script` over the resolved table.
pub fn build_plan(script: &ParsedScript, handle: &TableHandle) -> PlanResult<QueryPlan> {
    let select = &script.select;
    let schema = handle.schema.as_ref();

    let window = select
        .window
        .as_ref()
        .map(|w| resolve_window(w, schema))
        .transpose()?;

    let mut ctx = PlanContext {
        schema,
        functions: &script.functions,
        nodes: Arena::new(),
    };

    let mut projections = Vec::with_capacity(select.projection.len());
    for item in &select.projection {
        match item {
            SelectItem::Wildcard => {
                projections.extend(schema.fields().iter().enumerate().map(|(i, field)| {
                    Projection {
                        name: field.name.clone(),
                        data_type: field.data_type,
                        kind: ProjectionKind::Column(i),
                    }
                }));
            }
            SelectItem::Expr { expr, alias } => {
                let (kind, data_type) = match expr {
                    Expr::Column(name) => {
                        let index = ctx.column(name)?;
                        (ProjectionKind::Column(index), schema.fields()[index].data_type)
                    }
                    Expr::Aggregate(agg) => {
                        let resolved = ctx.aggregate(agg, window.as_ref())?;
                        let data_type = aggregate_type(&resolved);
                        (ProjectionKind::Window(resolved), data_type)
                    }
                    other => {
                        let id = ctx.expr(other)?;
                        (ProjectionKind::Scalar(id), ctx.nodes[id].data_type)
                    }
                };
                projections.push(Projection {
                    name: alias.clone().unwrap_or_else(|| expr.to_string()),
                    data_type,
                    kind,
                });
            }
        }
    }

    let output_schema = Schema::new(
        projections
            .iter()
            .map(|p| Field::new(p.name.clone(), p.data_type))
            .collect(),
    )?;

    let plan = QueryPlan {
        table: handle.name().to_string(),
        table_id: handle.table.id(),
        input_schema: Arc::clone(&handle.schema),
        projections,
        window,
        limit: select.limit,
        output_schema: Arc::new(output_schema),
        functions: script.functions.clone(),
        nodes: ctx.nodes,
    };

    debug!(
        table = %plan.table,
        columns = plan.projections.len(),
        windowed = plan.is_windowed(),
        "built query plan"
    );
    Ok(plan)
}

/// Normalizes a declared window against the input schema.
fn resolve_window(window: &NamedWindow, schema: &Schema) -> PlanResult<WindowFrameSpec> {
    let partition_by = schema
        .index_of(&window.partition_by)
        .ok_or_else(|| PlanError::ColumnNotFound(window.partition_by.clone()))?;
    let order_by = schema
        .index_of(&window.order_by)
        .ok_or_else(|| PlanError::ColumnNotFound(window.order_by.clone()))?;

    let order_type = schema.fields()[order_by].data_type;
    if !order_type.is_numeric() {
        return Err(PlanError::TypeError(format!(
            "ORDER BY column {} has type {}, which has no total order",
            window.order_by, order_type
        )));
    }
    if window.descending {
        return Err(PlanError::UnsupportedFrame(format!(
            "window {} orders by {} DESC",
            window.name, window.order_by
        )));
    }

    let preceding = match &window.frame {
        Some(WindowFrame {
            units: WindowFrameUnits::Rows,
            start,
            end: None | Some(WindowFrameBound::CurrentRow),
        }) => match start {
            WindowFrameBound::Preceding(Some(k)) => *k,
            WindowFrameBound::CurrentRow => 0,
            other => {
                return Err(PlanError::UnsupportedFrame(format!(
                    "ROWS frame starting at {}",
                    other
                )))
            }
        },
        Some(frame) => return Err(PlanError::UnsupportedFrame(frame.to_string())),
        None => {
            return Err(PlanError::UnsupportedFrame(format!(
                "window {} has no ROWS frame clause",
                window.name
            )))
        }
    };
    let preceding = u32::try_from(preceding)
        .map_err(|_| PlanError::UnsupportedFrame(format!("{} PRECEDING is too large", preceding)))?;

    Ok(WindowFrameSpec {
        name: window.name.clone(),
        partition_by,
        order_by,
        preceding,
    })
}

fn aggregate_type(agg: &WindowAggregate) -> DataType {
    match (agg.func, agg.input_type) {
        (AggregateFunction::Count, _) => DataType::Int64,
        (AggregateFunction::Avg, _) => DataType::Double,
        (_, Some(input)) => input,
        (_, None) => DataType::Int64,
    }
}

struct PlanContext<'a> {
    schema: &'a Schema,
    functions: &'a [FunctionAst],
    nodes: Arena<PlanExpr>,
}

impl<'a> PlanContext<'a> {
    fn column(&self, name: &str) -> PlanResult<usize> {
        self.schema
            .index_of(name)
            .ok_or_else(|| PlanError::ColumnNotFound(name.to_string()))
    }

    fn aggregate(
        &self,
        agg: &AggregateCall,
        window: Option<&WindowFrameSpec>,
    ) -> PlanResult<WindowAggregate> {
        match window {
            Some(w) if w.name == agg.window => {}
            _ => return Err(PlanError::WindowNotFound(agg.window.clone())),
        }

        let Some(name) = &agg.column else {
            return Ok(WindowAggregate {
                func: agg.func,
                column: None,
                input_type: None,
            });
        };

        let index = self.column(name)?;
        let input_type = self.schema.fields()[index].data_type;
        if agg.func != AggregateFunction::Count && !input_type.is_numeric() {
            return Err(PlanError::TypeError(format!(
                "{} over {} column {}",
                agg.func, input_type, name
            )));
        }

        Ok(WindowAggregate {
            func: agg.func,
            column: Some(index),
            input_type: Some(input_type),
        })
    }

    fn alloc(&mut self, kind: PlanExprKind, data_type: DataType) -> PlanExprId {
        self.nodes.alloc(PlanExpr::new(kind, data_type))
    }

    fn cast(&mut self, id: PlanExprId, target: DataType) -> PlanExprId {
        if self.nodes[id].data_type == target {
            id
        } else {
            self.alloc(PlanExprKind::Cast(id), target)
        }
    }

    fn expr(&mut self, expr: &Expr) -> PlanResult<PlanExprId> {
        match expr {
            Expr::Column(name) => {
                let index = self.column(name)?;
                let data_type = self.schema.fields()[index].data_type;
                Ok(self.alloc(PlanExprKind::Column(index), data_type))
            }
            Expr::Literal(lit) => {
                let value = match lit {
                    Literal::Integer(v) => match i32::try_from(*v) {
                        Ok(small) => Value::Int32(small),
                        Err(_) => Value::Int64(*v),
                    },
                    Literal::Float(v) => Value::Double(*v),
                    Literal::String(s) => Value::Varchar(s.clone()),
                };
                let data_type = value.data_type();
                Ok(self.alloc(PlanExprKind::Literal(value), data_type))
            }
            Expr::BinaryOp { left, op, right } => {
                let left = self.expr(left)?;
                let right = self.expr(right)?;
                let (lt, rt) = (self.nodes[left].data_type, self.nodes[right].data_type);
                let data_type = lt.promote(rt).ok_or_else(|| {
                    PlanError::TypeError(format!(
                        "operator {} needs numeric operands, got {} and {}",
                        op, lt, rt
                    ))
                })?;
                let left = self.cast(left, data_type);
                let right = self.cast(right, data_type);
                Ok(self.alloc(
                    PlanExprKind::Binary {
                        op: *op,
                        left,
                        right,
                    },
                    data_type,
                ))
            }
            Expr::Negate(inner) => {
                let inner = self.expr(inner)?;
                let data_type = self.nodes[inner].data_type;
                if !data_type.is_numeric() {
                    return Err(PlanError::TypeError(format!("cannot negate {}", data_type)));
                }
                Ok(self.alloc(PlanExprKind::Negate(inner), data_type))
            }
            Expr::Call(call) => self.call(call),
            Expr::Aggregate(agg) => Err(PlanError::TypeError(format!(
                "window aggregate {} must be a whole projection item",
                agg
            ))),
        }
    }

    fn call(&mut self, call: &FunctionCall) -> PlanResult<PlanExprId> {
        let functions = self.functions;
        let (index, function) = functions
            .iter()
            .enumerate()
            .find(|(_, f)| f.name == call.name)
            .ok_or_else(|| PlanError::FunctionNotFound(call.name.clone()))?;

        if call.args.len() != function.params.len() {
            return Err(PlanError::ArgumentMismatch {
                function: call.name.clone(),
                message: format!(
                    "expected {} arguments, got {}",
                    function.params.len(),
                    call.args.len()
                ),
            });
        }

        let mut args = Vec::with_capacity(call.args.len());
        for (arg, param) in call.args.iter().zip(&function.params) {
            let id = self.expr(arg)?;
            let arg_type = self.nodes[id].data_type;
            if !arg_type.coerces_to(param.data_type) {
                return Err(PlanError::ArgumentMismatch {
                    function: call.name.clone(),
                    message: format!(
                        "parameter {} is {}, argument {} is {}",
                        param.name, param.data_type, arg, arg_type
                    ),
                });
            }
            args.push(self.cast(id, param.data_type));
        }

        Ok(self.alloc(
            PlanExprKind::Call {
                function: index,
                args,
            },
            function.return_type,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::storage::Table;

    const WINDOW_SQL: &str = "SELECT sum(col1) OVER w1 as w1_col1_sum, sum(col3) OVER w1 as w1_col3_sum, \
         sum(col4) OVER w1 as w1_col4_sum, sum(col2) OVER w1 as w1_col2_sum, \
         sum(col5) OVER w1 as w1_col5_sum FROM t1 \
         WINDOW w1 AS (PARTITION BY col2 ORDER BY col5 ROWS BETWEEN 3 PRECEDING AND CURRENT ROW) limit 10;";

    fn handle() -> TableHandle {
        let schema = Schema::from_pairs(&[
            ("col1", DataType::Int32),
            ("col2", DataType::Int16),
            ("col3", DataType::Float),
            ("col4", DataType::Double),
            ("col5", DataType::Int64),
            ("col6", DataType::Varchar),
        ])
        .unwrap();
        TableHandle::new(schema, Table::new("t1", 1, 1, 1))
    }

    fn plan(text: &str) -> PlanResult<QueryPlan> {
        let script = Parser::parse_script(text).unwrap();
        build_plan(&script, &handle())
    }

    #[test]
    fn test_plan_udf_projection() {
        let text = "%%fun\ndef test(a:i32,b:i32):i32\n    c=a+b\n    d=c+1\n    return d\nend\n%%sql\nSELECT test(col1,col1), col2 , col6 FROM t1 limit 10;";
        let plan = plan(text).unwrap();

        assert_eq!(plan.projections.len(), 3);
        assert_eq!(plan.output_schema.to_string(), "[test(col1, col1): INT32, col2: INT16, col6: VARCHAR]");
        assert!(matches!(plan.projections[1].kind, ProjectionKind::Column(1)));
        assert!(matches!(plan.projections[2].kind, ProjectionKind::Column(5)));
        match &plan.projections[0].kind {
            ProjectionKind::Scalar(id) => match &plan.expr(*id).kind {
                PlanExprKind::Call { function, args } => {
                    assert_eq!(*function, 0);
                    assert_eq!(args.len(), 2);
                }
                other => panic!("expected call, got {:?}", other),
            },
            other => panic!("expected scalar, got {:?}", other),
        }
        assert_eq!(plan.limit, Some(10));
        assert_eq!(plan.row_cap(2), 2);
        assert_eq!(plan.row_cap(100), 10);
        assert!(!plan.is_windowed());
    }

    #[test]
    fn test_plan_window_sums() {
        let plan = plan(WINDOW_SQL).unwrap();
        let window = plan.window.as_ref().unwrap();
        assert_eq!(window.partition_by, 1);
        assert_eq!(window.order_by, 4);
        assert_eq!(window.preceding, 3);

        let types: Vec<DataType> = plan.output_schema.data_types().collect();
        assert_eq!(
            types,
            vec![
                DataType::Int32,
                DataType::Float,
                DataType::Double,
                DataType::Int16,
                DataType::Int64
            ]
        );
        assert_eq!(plan.output_schema.field(0).unwrap().name, "w1_col1_sum");
    }

    #[test]
    fn test_plan_aggregate_types() {
        let plan = plan(
            "SELECT count(*) OVER w, count(col6) OVER w, min(col2) OVER w, avg(col1) OVER w FROM t1 \
             WINDOW w AS (PARTITION BY col2 ORDER BY col5 ROWS 2 PRECEDING)",
        )
        .unwrap();
        let types: Vec<DataType> = plan.output_schema.data_types().collect();
        assert_eq!(
            types,
            vec![DataType::Int64, DataType::Int64, DataType::Int16, DataType::Double]
        );
        assert_eq!(plan.window.unwrap().preceding, 2);
    }

    #[test]
    fn test_unknown_column() {
        let err = plan("SELECT col9 FROM t1").unwrap_err();
        assert_eq!(err, PlanError::ColumnNotFound("col9".to_string()));
        assert_eq!(err.code(), ErrorCode::ResolutionError);
    }

    #[test]
    fn test_unknown_function() {
        let err = plan("SELECT nope(col1) FROM t1").unwrap_err();
        assert_eq!(err, PlanError::FunctionNotFound("nope".to_string()));
    }

    #[test]
    fn test_argument_checks() {
        let udf = "%%fun\ndef f(a:i32):i64\n return a\nend\n%%sql\n";

        let err = plan(&format!("{}SELECT f(col1, col1) FROM t1", udf)).unwrap_err();
        assert!(matches!(err, PlanError::ArgumentMismatch { .. }));

        let err = plan(&format!("{}SELECT f(col4) FROM t1", udf)).unwrap_err();
        assert!(matches!(err, PlanError::ArgumentMismatch { .. }));

        let err = plan(&format!("{}SELECT f(col6) FROM t1", udf)).unwrap_err();
        assert!(matches!(err, PlanError::ArgumentMismatch { .. }));

        // i16 widens to i32
        let plan = plan(&format!("{}SELECT f(col2) FROM t1", udf)).unwrap();
        assert_eq!(plan.output_schema.field(0).unwrap().data_type, DataType::Int64);
        match &plan.projections[0].kind {
            ProjectionKind::Scalar(id) => match &plan.expr(*id).kind {
                PlanExprKind::Call { args, .. } => {
                    assert!(matches!(plan.expr(args[0]).kind, PlanExprKind::Cast(_)));
                    assert_eq!(plan.expr(args[0]).data_type, DataType::Int32);
                }
                other => panic!("expected call, got {:?}", other),
            },
            other => panic!("expected scalar, got {:?}", other),
        }
    }

    #[test]
    fn test_arithmetic_promotion() {
        let plan = plan("SELECT col2 + 1 AS a, col1 * col4 AS b, -col3 AS c FROM t1").unwrap();
        let types: Vec<DataType> = plan.output_schema.data_types().collect();
        assert_eq!(types, vec![DataType::Int32, DataType::Double, DataType::Float]);
    }

    #[test]
    fn test_varchar_arithmetic_rejected() {
        let err = plan("SELECT col6 + 1 FROM t1").unwrap_err();
        assert!(matches!(err, PlanError::TypeError(_)));
    }

    #[test]
    fn test_wildcard_and_duplicates() {
        let plan_ok = plan("SELECT * FROM t1").unwrap();
        assert_eq!(plan_ok.output_schema.len(), 6);

        let err = plan("SELECT col1, col1 FROM t1").unwrap_err();
        assert_eq!(err, PlanError::DuplicateColumn("col1".to_string()));
    }

    #[test]
    fn test_window_validation() {
        let err = plan(
            "SELECT sum(col1) OVER w FROM t1 WINDOW w AS (PARTITION BY colx ORDER BY col5 ROWS 1 PRECEDING)",
        )
        .unwrap_err();
        assert_eq!(err, PlanError::ColumnNotFound("colx".to_string()));

        let err = plan(
            "SELECT sum(col1) OVER w FROM t1 WINDOW w AS (PARTITION BY col2 ORDER BY col6 ROWS 1 PRECEDING)",
        )
        .unwrap_err();
        assert!(matches!(err, PlanError::TypeError(_)));

        let err = plan(
            "SELECT sum(col6) OVER w FROM t1 WINDOW w AS (PARTITION BY col2 ORDER BY col5 ROWS 1 PRECEDING)",
        )
        .unwrap_err();
        assert!(matches!(err, PlanError::TypeError(_)));
    }

    #[test]
    fn test_unsupported_frames() {
        for frame in [
            "RANGE BETWEEN 3 PRECEDING AND CURRENT ROW",
            "ROWS BETWEEN 3 PRECEDING AND 1 FOLLOWING",
            "ROWS BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW",
            "ROWS BETWEEN 1 FOLLOWING AND CURRENT ROW",
        ] {
            let sql = format!(
                "SELECT sum(col1) OVER w FROM t1 WINDOW w AS (PARTITION BY col2 ORDER BY col5 {})",
                frame
            );
            let err = plan(&sql).unwrap_err();
            assert!(matches!(err, PlanError::UnsupportedFrame(_)), "{}: {:?}", frame, err);
            assert_eq!(err.code(), ErrorCode::UnsupportedFrame);
        }

        let err = plan("SELECT sum(col1) OVER w FROM t1 WINDOW w AS (PARTITION BY col2 ORDER BY col5)")
            .unwrap_err();
        assert!(matches!(err, PlanError::UnsupportedFrame(_)));

        let err = plan(
            "SELECT sum(col1) OVER w FROM t1 WINDOW w AS (PARTITION BY col2 ORDER BY col5 DESC ROWS 1 PRECEDING)",
        )
        .unwrap_err();
        assert!(matches!(err, PlanError::UnsupportedFrame(_)));
    }

    #[test]
    fn test_plan_display() {
        let plan = plan(WINDOW_SQL).unwrap();
        let text = plan.to_string();
        assert!(text.starts_with("Limit: fetch=10\n  Projection: [w1_col1_sum: INT32"));
        assert!(text.contains("w1_col3_sum := sum(col3) OVER frame"));
        assert!(text.contains("Window: w1 partition_by=col2 order_by=col5 rows=3 preceding"));
        assert!(text.contains("Scan: t1 [col1: INT32"));
    }
}
