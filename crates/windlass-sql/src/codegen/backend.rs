//! Code backends and compiled callables.
//!
//! The [`CodeBackend`] trait is the seam between the pure compile pipeline
//! and whatever turns IR into something executable. [`ClosureBackend`]
//! validates the module, then specializes each instruction into a closure
//! monomorphized over the instruction's native type, so the per-row loop
//! never switches on types.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;
use windlass_common::ErrorCode;

use crate::parser::{AggregateFunction, BinaryOperator, DataType};
use crate::storage::{encode_row, CodecError, CodecResult, RowEntry, RowLayout, RowView, Value};

use super::ir::{Inst, IrModule, Reg};

/// Errors raised while compiling an IR module.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    /// The module is internally inconsistent.
    #[error("invalid module {module}: {message}")]
    InvalidModule {
        /// Module name.
        module: String,
        /// Description.
        message: String,
    },

    /// The backend cannot compile an instruction.
    #[error("unsupported instruction in {module}: {inst}")]
    Unsupported {
        /// Module name.
        module: String,
        /// Rendered instruction.
        inst: String,
    },

    /// Compilation exceeded the configured limit.
    #[error("compiling {module} took {elapsed_ms} ms, limit is {limit_ms} ms")]
    Timeout {
        /// Module name.
        module: String,
        /// Time spent.
        elapsed_ms: u64,
        /// Configured limit.
        limit_ms: u64,
    },

    /// No backend registered under this name.
    #[error("unknown code backend: {0}")]
    UnknownBackend(String),
}

impl CompileError {
    /// Returns the engine error code.
    pub fn code(&self) -> ErrorCode {
        ErrorCode::CompileError
    }
}

/// Errors raised inside a compiled callable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    /// Reading an input row or writing the output row failed.
    #[error("row codec: {0}")]
    Codec(#[from] CodecError),

    /// Integer division or remainder by zero.
    #[error("integer {0} by zero")]
    DivisionByZero(BinaryOperator),

    /// The current row position lies outside the supplied rows.
    #[error("row position {position} outside partition of {len} rows")]
    PositionOutOfRange {
        /// Requested position.
        position: usize,
        /// Partition length.
        len: usize,
    },

    /// A register does not hold a value of the expected type.
    #[error("register {0} holds a value of the wrong type")]
    RegisterType(Reg),
}

impl ExecutionError {
    /// Returns the engine error code.
    pub fn code(&self) -> ErrorCode {
        ErrorCode::ExecutionError
    }
}

/// Result type for callable invocations.
pub type ExecutionResult<T> = Result<T, ExecutionError>;

/// Input to one callable invocation: a partition in ascending timestamp
/// order and the position of the current row within it.
#[derive(Debug, Clone, Copy)]
pub struct FrameInput<'a> {
    /// Rows of the current partition.
    pub rows: &'a [RowEntry],
    /// Position of the current row.
    pub position: usize,
}

impl<'a> FrameInput<'a> {
    /// Creates an input for the row at `position`.
    pub fn new(rows: &'a [RowEntry], position: usize) -> Self {
        Self { rows, position }
    }
}

/// A compiled query body. Each call produces one encoded output row.
pub trait Callable: Send {
    /// Column types of the rows this callable produces.
    fn output_types(&self) -> &[DataType];

    /// Evaluates the current row and returns the encoded output row.
    fn call(&self, input: FrameInput<'_>) -> ExecutionResult<Vec<u8>>;
}

/// Compiles IR modules into callables.
pub trait CodeBackend: Send + Sync {
    /// Backend name, as used in configuration.
    fn name(&self) -> &'static str;

    /// Compiles a module.
    fn compile(&self, module: &IrModule) -> Result<Box<dyn Callable>, CompileError>;
}

/// Looks up a built-in backend by its configuration name.
pub fn backend_by_name(name: &str) -> Result<Arc<dyn CodeBackend>, CompileError> {
    match name {
        ClosureBackend::NAME => Ok(Arc::new(ClosureBackend::new())),
        other => Err(CompileError::UnknownBackend(other.to_string())),
    }
}

// =============================================================================
// Native arithmetic
// =============================================================================

type ArithFn<T> = fn(T, T) -> ExecutionResult<T>;

/// Fixed-width numeric types with native (wrapping) arithmetic.
trait Native: Copy + PartialOrd + Send + Sync + 'static {
    fn zero() -> Self;
    fn read(view: &RowView<'_>, column: usize) -> CodecResult<Self>;
    fn from_value(value: &Value) -> Option<Self>;
    fn into_value(self) -> Value;
    fn to_f64(self) -> f64;
    fn negate(self) -> Self;
    fn arith(op: BinaryOperator) -> ArithFn<Self>;
}

macro_rules! native_int {
    ($t:ty, $variant:ident, $read:ident) => {
        impl Native for $t {
            fn zero() -> Self {
                0
            }

            fn read(view: &RowView<'_>, column: usize) -> CodecResult<Self> {
                view.$read(column)
            }

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(*v),
                    _ => None,
                }
            }

            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn to_f64(self) -> f64 {
                self as f64
            }

            fn negate(self) -> Self {
                self.wrapping_neg()
            }

            fn arith(op: BinaryOperator) -> ArithFn<Self> {
                match op {
                    BinaryOperator::Plus => |a: Self, b: Self| Ok(a.wrapping_add(b)),
                    BinaryOperator::Minus => |a: Self, b: Self| Ok(a.wrapping_sub(b)),
                    BinaryOperator::Multiply => |a: Self, b: Self| Ok(a.wrapping_mul(b)),
                    BinaryOperator::Divide => |a: Self, b: Self| {
                        if b == 0 {
                            Err(ExecutionError::DivisionByZero(BinaryOperator::Divide))
                        } else {
                            Ok(a.wrapping_div(b))
                        }
                    },
                    BinaryOperator::Modulo => |a: Self, b: Self| {
                        if b == 0 {
                            Err(ExecutionError::DivisionByZero(BinaryOperator::Modulo))
                        } else {
                            Ok(a.wrapping_rem(b))
                        }
                    },
                }
            }
        }
    };
}

macro_rules! native_float {
    ($t:ty, $variant:ident, $read:ident) => {
        impl Native for $t {
            fn zero() -> Self {
                0.0
            }

            fn read(view: &RowView<'_>, column: usize) -> CodecResult<Self> {
                view.$read(column)
            }

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(*v),
                    _ => None,
                }
            }

            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn to_f64(self) -> f64 {
                f64::from(self)
            }

            fn negate(self) -> Self {
                -self
            }

            fn arith(op: BinaryOperator) -> ArithFn<Self> {
                match op {
                    BinaryOperator::Plus => |a: Self, b: Self| Ok(a + b),
                    BinaryOperator::Minus => |a: Self, b: Self| Ok(a - b),
                    BinaryOperator::Multiply => |a: Self, b: Self| Ok(a * b),
                    BinaryOperator::Divide => |a: Self, b: Self| Ok(a / b),
                    BinaryOperator::Modulo => |a: Self, b: Self| Ok(a % b),
                }
            }
        }
    };
}

native_int!(i16, Int16, get_i16);
native_int!(i32, Int32, get_i32);
native_int!(i64, Int64, get_i64);
native_float!(f32, Float, get_f32);
native_float!(f64, Double, get_f64);

/// Expands `$build::<T>(args)` for the native type matching `$ty`.
macro_rules! with_native {
    ($ty:expr, $build:ident ( $($arg:expr),* ), $otherwise:expr) => {
        match $ty {
            DataType::Int16 => $build::<i16>($($arg),*),
            DataType::Int32 => $build::<i32>($($arg),*),
            DataType::Int64 => $build::<i64>($($arg),*),
            DataType::Float => $build::<f32>($($arg),*),
            DataType::Double => $build::<f64>($($arg),*),
            DataType::Varchar => return Err($otherwise),
        }
    };
}

/// Numeric conversion with `as` semantics.
fn cast_value(value: &Value, to: DataType) -> Option<Value> {
    if let Some(i) = value.as_i64() {
        return Some(match to {
            DataType::Int16 => Value::Int16(i as i16),
            DataType::Int32 => Value::Int32(i as i32),
            DataType::Int64 => Value::Int64(i),
            DataType::Float => Value::Float(i as f32),
            DataType::Double => Value::Double(i as f64),
            DataType::Varchar => return None,
        });
    }
    let f = value.as_f64()?;
    Some(match to {
        DataType::Int16 => Value::Int16(f as i16),
        DataType::Int32 => Value::Int32(f as i32),
        DataType::Int64 => Value::Int64(f as i64),
        DataType::Float => Value::Float(f as f32),
        DataType::Double => Value::Double(f),
        DataType::Varchar => return None,
    })
}

// =============================================================================
// Closure backend
// =============================================================================

/// Evaluation context of one invocation.
struct Frame<'a> {
    layout: &'a RowLayout,
    current: RowView<'a>,
    /// Frame rows, oldest first, ending with the current row.
    rows: &'a [RowEntry],
}

type Op = Box<dyn Fn(&[Value], &Frame<'_>) -> ExecutionResult<Value> + Send + Sync>;

fn operand<T: Native>(regs: &[Value], reg: Reg) -> ExecutionResult<T> {
    regs.get(reg.index())
        .and_then(T::from_value)
        .ok_or(ExecutionError::RegisterType(reg))
}

fn load_op<T: Native>(column: usize) -> Op {
    Box::new(move |_, frame| Ok(T::read(&frame.current, column)?.into_value()))
}

fn binary_op<T: Native>(op: BinaryOperator, lhs: Reg, rhs: Reg) -> Op {
    let f = T::arith(op);
    Box::new(move |regs, _| {
        let a = operand::<T>(regs, lhs)?;
        let b = operand::<T>(regs, rhs)?;
        f(a, b).map(T::into_value)
    })
}

fn neg_op<T: Native>(src: Reg) -> Op {
    Box::new(move |regs, _| Ok(operand::<T>(regs, src)?.negate().into_value()))
}

fn sum_op<T: Native>(column: usize) -> Op {
    let add = T::arith(BinaryOperator::Plus);
    Box::new(move |_, frame| {
        let mut acc = T::zero();
        for entry in frame.rows {
            let view = RowView::new(frame.layout, &entry.row)?;
            acc = add(acc, T::read(&view, column)?)?;
        }
        Ok(acc.into_value())
    })
}

fn extreme_op<T: Native>(column: usize, keep_max: bool) -> Op {
    Box::new(move |_, frame| {
        let mut acc: Option<T> = None;
        for entry in frame.rows {
            let view = RowView::new(frame.layout, &entry.row)?;
            let v = T::read(&view, column)?;
            acc = match acc {
                Some(current) if (keep_max && v > current) || (!keep_max && v < current) => Some(v),
                Some(current) => Some(current),
                None => Some(v),
            };
        }
        Ok(acc.unwrap_or_else(T::zero).into_value())
    })
}

fn avg_op<T: Native>(column: usize) -> Op {
    Box::new(move |_, frame| {
        let mut sum = 0.0f64;
        for entry in frame.rows {
            let view = RowView::new(frame.layout, &entry.row)?;
            sum += T::read(&view, column)?.to_f64();
        }
        Ok(Value::Double(sum / frame.rows.len().max(1) as f64))
    })
}

/// Built-in backend that compiles IR into typed closures.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClosureBackend;

impl ClosureBackend {
    /// Configuration name of this backend.
    pub const NAME: &'static str = "closure";

    /// Creates the backend.
    pub fn new() -> Self {
        Self
    }

    fn validate(module: &IrModule) -> Result<(), CompileError> {
        let invalid = |message: String| CompileError::InvalidModule {
            module: module.name.clone(),
            message,
        };

        for (index, inst) in module.insts.iter().enumerate() {
            for reg in inst.operands() {
                if reg.index() >= index {
                    return Err(invalid(format!("%{} reads {} before it is defined", index, reg)));
                }
            }
            let reg_type = |reg: Reg| module.insts[reg.index()].result_type();

            match inst {
                Inst::LoadColumn { column, ty } => {
                    if module.input_types.get(*column) != Some(ty) {
                        return Err(invalid(format!("%{} loads col{} as {}", index, column, ty)));
                    }
                }
                Inst::Const(_) => {}
                Inst::Binary { ty, lhs, rhs, .. } => {
                    if reg_type(*lhs) != *ty || reg_type(*rhs) != *ty {
                        return Err(invalid(format!("%{} has operands of the wrong type", index)));
                    }
                }
                Inst::Neg { ty, src } => {
                    if reg_type(*src) != *ty {
                        return Err(invalid(format!("%{} has an operand of the wrong type", index)));
                    }
                }
                Inst::Cast { from, to, src } => {
                    if reg_type(*src) != *from || !from.is_numeric() || !to.is_numeric() {
                        return Err(invalid(format!("%{} casts {} to {}", index, from, to)));
                    }
                }
                Inst::FrameFold { column, input, .. } => {
                    if module.frame_preceding.is_none() {
                        return Err(invalid(format!("%{} folds without a frame", index)));
                    }
                    if let Some(column) = column {
                        if module.input_types.get(*column) != input.as_ref() {
                            return Err(invalid(format!("%{} folds col{} with the wrong type", index, column)));
                        }
                    }
                }
            }
        }

        if module.outputs.len() != module.output_types.len() {
            return Err(invalid("output types do not match outputs".to_string()));
        }
        for (reg, ty) in module.outputs.iter().zip(&module.output_types) {
            match module.insts.get(reg.index()) {
                Some(inst) if inst.result_type() == *ty => {}
                _ => return Err(invalid(format!("output {} is not a {}", reg, ty))),
            }
        }
        Ok(())
    }

    fn compile_inst(module: &IrModule, inst: &Inst) -> Result<Op, CompileError> {
        let unsupported = || CompileError::Unsupported {
            module: module.name.clone(),
            inst: inst.to_string(),
        };

        let op: Op = match inst {
            Inst::LoadColumn {
                column,
                ty: DataType::Varchar,
            } => {
                let column = *column;
                Box::new(move |_, frame| Ok(Value::Varchar(frame.current.get_str(column)?.to_string())))
            }
            Inst::LoadColumn { column, ty } => with_native!(*ty, load_op(*column), unsupported()),
            Inst::Const(value) => {
                let value = value.clone();
                Box::new(move |_, _| Ok(value.clone()))
            }
            Inst::Binary { op, ty, lhs, rhs } => {
                with_native!(*ty, binary_op(*op, *lhs, *rhs), unsupported())
            }
            Inst::Neg { ty, src } => with_native!(*ty, neg_op(*src), unsupported()),
            Inst::Cast { to, src, .. } => {
                let (to, src) = (*to, *src);
                Box::new(move |regs, _| {
                    regs.get(src.index())
                        .and_then(|v| cast_value(v, to))
                        .ok_or(ExecutionError::RegisterType(src))
                })
            }
            Inst::FrameFold {
                func, column, input, ..
            } => match (func, column, input) {
                (AggregateFunction::Count, _, _) => {
                    Box::new(|_, frame| Ok(Value::Int64(frame.rows.len() as i64)))
                }
                (AggregateFunction::Sum, Some(col), Some(ty)) => {
                    with_native!(*ty, sum_op(*col), unsupported())
                }
                (AggregateFunction::Min, Some(col), Some(ty)) => {
                    with_native!(*ty, extreme_op(*col, false), unsupported())
                }
                (AggregateFunction::Max, Some(col), Some(ty)) => {
                    with_native!(*ty, extreme_op(*col, true), unsupported())
                }
                (AggregateFunction::Avg, Some(col), Some(ty)) => {
                    with_native!(*ty, avg_op(*col), unsupported())
                }
                _ => return Err(unsupported()),
            },
        };
        Ok(op)
    }
}

impl CodeBackend for ClosureBackend {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn compile(&self, module: &IrModule) -> Result<Box<dyn Callable>, CompileError> {
        Self::validate(module)?;
        let ops = module
            .insts
            .iter()
            .map(|inst| Self::compile_inst(module, inst))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(module = %module.name, ops = ops.len(), "compiled module");
        Ok(Box::new(ClosureCallable {
            name: module.name.clone(),
            ops,
            outputs: module.outputs.clone(),
            output_types: module.output_types.clone(),
            input_layout: RowLayout::new(module.input_types.iter().copied()),
            output_layout: RowLayout::new(module.output_types.iter().copied()),
            preceding: module.frame_preceding,
        }))
    }
}

struct ClosureCallable {
    name: String,
    ops: Vec<Op>,
    outputs: Vec<Reg>,
    output_types: Vec<DataType>,
    input_layout: RowLayout,
    output_layout: RowLayout,
    preceding: Option<u32>,
}

impl fmt::Debug for ClosureCallable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClosureCallable")
            .field("name", &self.name)
            .field("ops", &self.ops.len())
            .field("outputs", &self.outputs)
            .finish()
    }
}

impl Callable for ClosureCallable {
    fn output_types(&self) -> &[DataType] {
        &self.output_types
    }

    fn call(&self, input: FrameInput<'_>) -> ExecutionResult<Vec<u8>> {
        let position = input.position;
        let current = input
            .rows
            .get(position)
            .ok_or(ExecutionError::PositionOutOfRange {
                position,
                len: input.rows.len(),
            })?;

        let start = match self.preceding {
            Some(k) => position.saturating_sub(k as usize),
            None => position,
        };
        let frame = Frame {
            layout: &self.input_layout,
            current: RowView::new(&self.input_layout, &current.row)?,
            rows: &input.rows[start..=position],
        };

        let mut regs: Vec<Value> = Vec::with_capacity(self.ops.len());
        for op in &self.ops {
            let value = op(&regs, &frame)?;
            regs.push(value);
        }

        let values: Vec<Value> = self
            .outputs
            .iter()
            .map(|reg| regs[reg.index()].clone())
            .collect();
        Ok(encode_row(&self.output_layout, &values)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::decode_row;
    use windlass_common::Timestamp;

    fn entries(layout: &RowLayout, rows: &[Vec<Value>]) -> Vec<RowEntry> {
        rows.iter()
            .enumerate()
            .map(|(i, values)| RowEntry {
                ts: Timestamp::new(i as u64 + 1),
                row: encode_row(layout, values).unwrap().into(),
            })
            .collect()
    }

    fn window_module(preceding: u32, func: AggregateFunction, ty: DataType) -> IrModule {
        let mut module = IrModule::new("w", vec![DataType::Int32, DataType::Float]);
        module.frame_preceding = Some(preceding);
        let column = if ty == DataType::Float { 1 } else { 0 };
        let out_ty = match func {
            AggregateFunction::Count => DataType::Int64,
            AggregateFunction::Avg => DataType::Double,
            _ => ty,
        };
        let reg = module.push(Inst::FrameFold {
            func,
            column: Some(column),
            input: Some(ty),
            ty: out_ty,
        });
        module.emit_output(reg);
        module
    }

    fn run_all(module: &IrModule, rows: &[RowEntry]) -> Vec<Value> {
        let callable = ClosureBackend::new().compile(module).unwrap();
        let out_layout = RowLayout::new(module.output_types.iter().copied());
        (0..rows.len())
            .map(|i| {
                let out = callable.call(FrameInput::new(rows, i)).unwrap();
                decode_row(&out_layout, &out).unwrap().remove(0)
            })
            .collect()
    }

    fn int_rows(values: &[i32]) -> Vec<RowEntry> {
        let layout = RowLayout::new([DataType::Int32, DataType::Float]);
        let rows: Vec<Vec<Value>> = values
            .iter()
            .map(|v| vec![Value::Int32(*v), Value::Float(*v as f32)])
            .collect();
        entries(&layout, &rows)
    }

    #[test]
    fn test_sliding_sum() {
        let rows = int_rows(&[1, 2, 3, 4, 5, 6]);
        let module = window_module(2, AggregateFunction::Sum, DataType::Int32);
        let sums: Vec<Value> = run_all(&module, &rows);
        let expected: Vec<Value> = [1, 3, 6, 9, 12, 15].iter().map(|v| Value::Int32(*v)).collect();
        assert_eq!(sums, expected);
    }

    #[test]
    fn test_float_sum_is_native() {
        let layout = RowLayout::new([DataType::Int32, DataType::Float]);
        let rows = entries(
            &layout,
            &[
                vec![Value::Int32(3), Value::Float(3.3)],
                vec![Value::Int32(4), Value::Float(4.4)],
                vec![Value::Int32(5), Value::Float(5.5)],
            ],
        );
        let module = window_module(3, AggregateFunction::Sum, DataType::Float);
        let sums = run_all(&module, &rows);
        assert_eq!(sums[2], Value::Float(0.0f32 + 3.3f32 + 4.4f32 + 5.5f32));
    }

    #[test]
    fn test_other_aggregates() {
        let rows = int_rows(&[5, 1, 4, 2]);
        assert_eq!(
            run_all(&window_module(1, AggregateFunction::Min, DataType::Int32), &rows),
            vec![Value::Int32(5), Value::Int32(1), Value::Int32(1), Value::Int32(2)]
        );
        assert_eq!(
            run_all(&window_module(1, AggregateFunction::Max, DataType::Int32), &rows),
            vec![Value::Int32(5), Value::Int32(5), Value::Int32(4), Value::Int32(4)]
        );
        assert_eq!(
            run_all(&window_module(2, AggregateFunction::Count, DataType::Int32), &rows),
            vec![Value::Int64(1), Value::Int64(2), Value::Int64(3), Value::Int64(3)]
        );
        assert_eq!(
            run_all(&window_module(1, AggregateFunction::Avg, DataType::Int32), &rows),
            vec![Value::Double(5.0), Value::Double(3.0), Value::Double(2.5), Value::Double(3.0)]
        );
    }

    #[test]
    fn test_integer_arithmetic_wraps_and_checks_zero() {
        let mut module = IrModule::new("arith", vec![DataType::Int16]);
        let a = module.push(Inst::LoadColumn {
            column: 0,
            ty: DataType::Int16,
        });
        let max = module.push(Inst::Const(Value::Int16(i16::MAX)));
        let sum = module.push(Inst::Binary {
            op: BinaryOperator::Plus,
            ty: DataType::Int16,
            lhs: a,
            rhs: max,
        });
        module.emit_output(sum);

        let layout = RowLayout::new([DataType::Int16]);
        let rows = entries(&layout, &[vec![Value::Int16(1)]]);
        let callable = ClosureBackend::new().compile(&module).unwrap();
        let out = callable.call(FrameInput::new(&rows, 0)).unwrap();
        assert_eq!(
            decode_row(&layout, &out).unwrap(),
            vec![Value::Int16(i16::MIN)]
        );

        let zero = module.push(Inst::Const(Value::Int16(0)));
        let div = module.push(Inst::Binary {
            op: BinaryOperator::Divide,
            ty: DataType::Int16,
            lhs: a,
            rhs: zero,
        });
        module.emit_output(div);
        let callable = ClosureBackend::new().compile(&module).unwrap();
        let err = callable.call(FrameInput::new(&rows, 0)).unwrap_err();
        assert_eq!(err, ExecutionError::DivisionByZero(BinaryOperator::Divide));
        assert_eq!(err.code(), ErrorCode::ExecutionError);
    }

    #[test]
    fn test_casts_and_varchar_passthrough() {
        let mut module = IrModule::new("cast", vec![DataType::Int32, DataType::Varchar]);
        let a = module.push(Inst::LoadColumn {
            column: 0,
            ty: DataType::Int32,
        });
        let wide = module.push(Inst::Cast {
            from: DataType::Int32,
            to: DataType::Double,
            src: a,
        });
        let s = module.push(Inst::LoadColumn {
            column: 1,
            ty: DataType::Varchar,
        });
        module.emit_output(wide);
        module.emit_output(s);

        let layout = RowLayout::new([DataType::Int32, DataType::Varchar]);
        let rows = entries(&layout, &[vec![Value::Int32(-7), Value::Varchar("abc".into())]]);
        let callable = ClosureBackend::new().compile(&module).unwrap();
        let out = callable.call(FrameInput::new(&rows, 0)).unwrap();

        let out_layout = RowLayout::new([DataType::Double, DataType::Varchar]);
        assert_eq!(
            decode_row(&out_layout, &out).unwrap(),
            vec![Value::Double(-7.0), Value::Varchar("abc".into())]
        );
        assert_eq!(callable.output_types(), &[DataType::Double, DataType::Varchar]);
    }

    #[test]
    fn test_invalid_modules_rejected() {
        let mut module = IrModule::new("bad", vec![DataType::Int32]);
        module.push(Inst::Neg {
            ty: DataType::Int32,
            src: Reg(0),
        });
        assert!(matches!(
            ClosureBackend::new().compile(&module),
            Err(CompileError::InvalidModule { .. })
        ));

        let mut module = IrModule::new("bad", vec![DataType::Int32]);
        module.push(Inst::LoadColumn {
            column: 0,
            ty: DataType::Int64,
        });
        assert!(ClosureBackend::new().compile(&module).is_err());

        let mut module = IrModule::new("bad", vec![DataType::Int32]);
        module.push(Inst::FrameFold {
            func: AggregateFunction::Sum,
            column: Some(0),
            input: Some(DataType::Int32),
            ty: DataType::Int32,
        });
        assert!(ClosureBackend::new().compile(&module).is_err());

        let mut module = IrModule::new("bad", vec![DataType::Varchar]);
        let s = module.push(Inst::LoadColumn {
            column: 0,
            ty: DataType::Varchar,
        });
        module.push(Inst::Binary {
            op: BinaryOperator::Plus,
            ty: DataType::Varchar,
            lhs: s,
            rhs: s,
        });
        assert!(matches!(
            ClosureBackend::new().compile(&module),
            Err(CompileError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_position_out_of_range() {
        let module = window_module(1, AggregateFunction::Sum, DataType::Int32);
        let callable = ClosureBackend::new().compile(&module).unwrap();
        let rows = int_rows(&[1]);
        assert_eq!(
            callable.call(FrameInput::new(&rows, 3)).unwrap_err(),
            ExecutionError::PositionOutOfRange { position: 3, len: 1 }
        );
    }

    #[test]
    fn test_backend_by_name() {
        assert_eq!(backend_by_name("closure").unwrap().name(), "closure");
        assert!(matches!(
            backend_by_name("llvm"),
            Err(CompileError::UnknownBackend(_))
        ));
    }
}
