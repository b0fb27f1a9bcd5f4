//! Lowering from a resolved plan to IR.
//!
//! UDF calls are inlined: parameters bind to the argument registers,
//! each assignment defines a fresh register for its local, and the
//! returned value is converted to the declared return type.

use std::collections::HashMap;

use tracing::trace;

use crate::logical::{PlanExprId, PlanExprKind, ProjectionKind, QueryPlan};
use crate::parser::{DataType, FunctionAst, Literal, UdfExprId, UdfExprKind, UdfStatement};
use crate::storage::Value;

use super::backend::CompileError;
use super::ir::{Inst, IrModule, Reg};

/// Lowers a plan into an IR module.
pub fn lower(plan: &QueryPlan) -> Result<IrModule, CompileError> {
    let mut lowering = Lowering {
        plan,
        module: IrModule::new(
            format!("query_{}", plan.table),
            plan.input_schema.data_types().collect(),
        ),
        loads: HashMap::new(),
    };
    lowering.module.frame_preceding = plan.window.as_ref().map(|w| w.preceding);

    for projection in &plan.projections {
        let reg = match &projection.kind {
            ProjectionKind::Column(column) => lowering.load(*column, projection.data_type),
            ProjectionKind::Scalar(id) => lowering.expr(*id)?,
            ProjectionKind::Window(agg) => lowering.module.push(Inst::FrameFold {
                func: agg.func,
                column: agg.column,
                input: agg.input_type,
                ty: projection.data_type,
            }),
        };
        lowering.module.emit_output(reg);
    }

    let module = lowering.module;
    trace!(module = %module.name, insts = module.insts.len(), "lowered plan");
    Ok(module)
}

struct Lowering<'a> {
    plan: &'a QueryPlan,
    module: IrModule,
    /// One load per input column.
    loads: HashMap<usize, Reg>,
}

impl<'a> Lowering<'a> {
    fn invalid(&self, message: impl Into<String>) -> CompileError {
        CompileError::InvalidModule {
            module: self.module.name.clone(),
            message: message.into(),
        }
    }

    fn load(&mut self, column: usize, ty: DataType) -> Reg {
        if let Some(reg) = self.loads.get(&column) {
            return *reg;
        }
        let reg = self.module.push(Inst::LoadColumn { column, ty });
        self.loads.insert(column, reg);
        reg
    }

    fn coerce(&mut self, reg: Reg, target: DataType) -> Result<Reg, CompileError> {
        let from = self
            .module
            .reg_type(reg)
            .ok_or_else(|| self.invalid(format!("undefined register {}", reg)))?;
        if from == target {
            Ok(reg)
        } else {
            Ok(self.module.push(Inst::Cast {
                from,
                to: target,
                src: reg,
            }))
        }
    }

    fn expr(&mut self, id: PlanExprId) -> Result<Reg, CompileError> {
        let plan = self.plan;
        let node = plan.expr(id);
        match &node.kind {
            PlanExprKind::Column(column) => Ok(self.load(*column, node.data_type)),
            PlanExprKind::Literal(value) => Ok(self.module.push(Inst::Const(value.clone()))),
            PlanExprKind::Binary { op, left, right } => {
                let lhs = self.expr(*left)?;
                let rhs = self.expr(*right)?;
                Ok(self.module.push(Inst::Binary {
                    op: *op,
                    ty: node.data_type,
                    lhs,
                    rhs,
                }))
            }
            PlanExprKind::Negate(inner) => {
                let src = self.expr(*inner)?;
                Ok(self.module.push(Inst::Neg {
                    ty: node.data_type,
                    src,
                }))
            }
            PlanExprKind::Cast(inner) => {
                let src = self.expr(*inner)?;
                self.coerce(src, node.data_type)
            }
            PlanExprKind::Call { function, args } => {
                let function = plan
                    .functions
                    .get(*function)
                    .ok_or_else(|| self.invalid(format!("unknown function index {}", function)))?;
                let args = args
                    .iter()
                    .map(|arg| self.expr(*arg))
                    .collect::<Result<Vec<_>, _>>()?;
                self.inline(function, &args)
            }
        }
    }

    fn inline(&mut self, function: &FunctionAst, args: &[Reg]) -> Result<Reg, CompileError> {
        let mut locals: Vec<Option<Reg>> = vec![None; function.locals.len()];
        for stmt in &function.body {
            match stmt {
                UdfStatement::Assign { local, value } => {
                    let reg = self.udf_expr(function, args, &locals, *value)?;
                    let slot = locals
                        .get_mut(*local)
                        .ok_or_else(|| self.invalid(format!("unknown local in {}", function.name)))?;
                    *slot = Some(reg);
                }
                UdfStatement::Return(value) => {
                    let reg = self.udf_expr(function, args, &locals, *value)?;
                    return self.coerce(reg, function.return_type);
                }
            }
        }
        Err(self.invalid(format!("function {} does not return", function.name)))
    }

    fn udf_expr(
        &mut self,
        function: &FunctionAst,
        args: &[Reg],
        locals: &[Option<Reg>],
        id: UdfExprId,
    ) -> Result<Reg, CompileError> {
        let node = function.expr(id);
        match &node.kind {
            UdfExprKind::Param(i) => args
                .get(*i)
                .copied()
                .ok_or_else(|| self.invalid(format!("missing argument {} of {}", i, function.name))),
            UdfExprKind::Local(i) => locals.get(*i).copied().flatten().ok_or_else(|| {
                self.invalid(format!("local {} of {} read before assignment", i, function.name))
            }),
            UdfExprKind::Literal(lit) => {
                let value = match (lit, node.data_type) {
                    (Literal::Integer(v), DataType::Int32) => Value::Int32(*v as i32),
                    (Literal::Integer(v), _) => Value::Int64(*v),
                    (Literal::Float(v), _) => Value::Double(*v),
                    (Literal::String(s), _) => Value::Varchar(s.clone()),
                };
                Ok(self.module.push(Inst::Const(value)))
            }
            UdfExprKind::Binary { op, left, right } => {
                let lhs = self.udf_expr(function, args, locals, *left)?;
                let lhs = self.coerce(lhs, node.data_type)?;
                let rhs = self.udf_expr(function, args, locals, *right)?;
                let rhs = self.coerce(rhs, node.data_type)?;
                Ok(self.module.push(Inst::Binary {
                    op: *op,
                    ty: node.data_type,
                    lhs,
                    rhs,
                }))
            }
            UdfExprKind::Negate(inner) => {
                let src = self.udf_expr(function, args, locals, *inner)?;
                Ok(self.module.push(Inst::Neg {
                    ty: node.data_type,
                    src,
                }))
            }
        }
    }
}
