//! Intermediate representation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::parser::{AggregateFunction, BinaryOperator, DataType};
use crate::storage::Value;

/// An SSA register: the result of the instruction at the same index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Reg(pub u32);

impl Reg {
    /// Returns the instruction index that defines this register.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// One IR instruction. Every instruction defines exactly one register.
#[derive(Debug, Clone, PartialEq)]
pub enum Inst {
    /// Reads a column of the current row.
    LoadColumn {
        /// Input column.
        column: usize,
        /// Column type.
        ty: DataType,
    },
    /// A constant.
    Const(Value),
    /// Arithmetic on two operands of type `ty`.
    Binary {
        /// Operator.
        op: BinaryOperator,
        /// Operand and result type.
        ty: DataType,
        /// Left operand.
        lhs: Reg,
        /// Right operand.
        rhs: Reg,
    },
    /// Numeric negation.
    Neg {
        /// Operand and result type.
        ty: DataType,
        /// Operand.
        src: Reg,
    },
    /// Numeric conversion.
    Cast {
        /// Source type.
        from: DataType,
        /// Target type.
        to: DataType,
        /// Operand.
        src: Reg,
    },
    /// Folds an aggregate over the current frame, left to right.
    FrameFold {
        /// Aggregate.
        func: AggregateFunction,
        /// Input column; `None` for `count(*)`.
        column: Option<usize>,
        /// Input column type.
        input: Option<DataType>,
        /// Result type.
        ty: DataType,
    },
}

impl Inst {
    /// Returns the type of the register this instruction defines.
    pub fn result_type(&self) -> DataType {
        match self {
            Inst::LoadColumn { ty, .. }
            | Inst::Binary { ty, .. }
            | Inst::Neg { ty, .. }
            | Inst::FrameFold { ty, .. } => *ty,
            Inst::Cast { to, .. } => *to,
            Inst::Const(value) => value.data_type(),
        }
    }

    /// Returns the registers this instruction reads.
    pub fn operands(&self) -> Vec<Reg> {
        match self {
            Inst::Binary { lhs, rhs, .. } => vec![*lhs, *rhs],
            Inst::Neg { src, .. } | Inst::Cast { src, .. } => vec![*src],
            Inst::LoadColumn { .. } | Inst::Const(_) | Inst::FrameFold { .. } => Vec::new(),
        }
    }
}

impl fmt::Display for Inst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Inst::LoadColumn { column, ty } => write!(f, "load {} col{}", ty, column),
            Inst::Const(value) => write!(f, "const {} {}", value.data_type(), value),
            Inst::Binary { op, ty, lhs, rhs } => {
                let name = match op {
                    BinaryOperator::Plus => "add",
                    BinaryOperator::Minus => "sub",
                    BinaryOperator::Multiply => "mul",
                    BinaryOperator::Divide => "div",
                    BinaryOperator::Modulo => "rem",
                };
                write!(f, "{} {} {}, {}", name, ty, lhs, rhs)
            }
            Inst::Neg { ty, src } => write!(f, "neg {} {}", ty, src),
            Inst::Cast { from, to, src } => write!(f, "cast {} -> {} {}", from, to, src),
            Inst::FrameFold {
                func, column, ty, ..
            } => match column {
                Some(col) => write!(f, "fold {} {} col{}", func, ty, col),
                None => write!(f, "fold {} {} *", func, ty),
            },
        }
    }
}

/// A compiled unit: one output row per invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct IrModule {
    /// Module name, for logs and explain output.
    pub name: String,
    /// Column types of input rows.
    pub input_types: Vec<DataType>,
    /// Column types of output rows.
    pub output_types: Vec<DataType>,
    /// Rows before the current row in each frame, for windowed modules.
    pub frame_preceding: Option<u32>,
    /// Instruction list; instruction `i` defines `Reg(i)`.
    pub insts: Vec<Inst>,
    /// Registers forming the output row, in output column order.
    pub outputs: Vec<Reg>,
}

impl IrModule {
    /// Creates an empty module.
    pub fn new(name: impl Into<String>, input_types: Vec<DataType>) -> Self {
        Self {
            name: name.into(),
            input_types,
            output_types: Vec::new(),
            frame_preceding: None,
            insts: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Appends an instruction and returns the register it defines.
    pub fn push(&mut self, inst: Inst) -> Reg {
        let reg = Reg(self.insts.len() as u32);
        self.insts.push(inst);
        reg
    }

    /// Returns the type of a register.
    pub fn reg_type(&self, reg: Reg) -> Option<DataType> {
        self.insts.get(reg.index()).map(Inst::result_type)
    }

    /// Appends an output column.
    pub fn emit_output(&mut self, reg: Reg) {
        if let Some(ty) = self.reg_type(reg) {
            self.output_types.push(ty);
            self.outputs.push(reg);
        }
    }

    /// Returns true if any instruction folds over a frame.
    pub fn is_windowed(&self) -> bool {
        self.frame_preceding.is_some()
    }
}

impl fmt::Display for IrModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let types = |tys: &[DataType]| {
            tys.iter()
                .map(|t| t.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        writeln!(
            f,
            "module {} ({}) -> ({})",
            self.name,
            types(&self.input_types),
            types(&self.output_types)
        )?;
        if let Some(k) = self.frame_preceding {
            writeln!(f, "  frame rows {} preceding", k)?;
        }
        for (i, inst) in self.insts.iter().enumerate() {
            writeln!(f, "  %{} = {}", i, inst)?;
        }
        let outputs: Vec<_> = self.outputs.iter().map(|r| r.to_string()).collect();
        write!(f, "  ret {}", outputs.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_display() {
        let mut module = IrModule::new("q_t1", vec![DataType::Int32, DataType::Int16]);
        let a = module.push(Inst::LoadColumn {
            column: 0,
            ty: DataType::Int32,
        });
        let one = module.push(Inst::Const(Value::Int32(1)));
        let sum = module.push(Inst::Binary {
            op: BinaryOperator::Plus,
            ty: DataType::Int32,
            lhs: a,
            rhs: one,
        });
        module.emit_output(sum);

        assert_eq!(module.output_types, vec![DataType::Int32]);
        assert_eq!(module.insts[sum.index()].operands(), vec![a, one]);
        assert_eq!(
            module.to_string(),
            "module q_t1 (INT32, INT16) -> (INT32)\n  %0 = load INT32 col0\n  %1 = const INT32 1\n  %2 = add INT32 %0, %1\n  ret %2"
        );
    }
}
