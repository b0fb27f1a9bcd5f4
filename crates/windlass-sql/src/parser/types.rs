//! Column data types.
//!
//! The type set is closed: every codec, planner, and codegen site matches
//! on it exhaustively.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Storage and expression types supported by Windlass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// 16-bit signed integer.
    Int16,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 32-bit floating point.
    Float,
    /// 64-bit floating point.
    Double,
    /// Variable-length UTF-8 string.
    Varchar,
}

impl DataType {
    /// All types, in promotion order followed by varchar.
    pub const ALL: [DataType; 6] = [
        DataType::Int16,
        DataType::Int32,
        DataType::Int64,
        DataType::Float,
        DataType::Double,
        DataType::Varchar,
    ];

    /// Returns true if this type is numeric.
    pub fn is_numeric(&self) -> bool {
        !matches!(self, DataType::Varchar)
    }

    /// Returns the fixed-region slot width in bytes.
    ///
    /// Varchar slots hold a 4-byte offset into the variable region.
    pub const fn slot_width(&self) -> usize {
        match self {
            DataType::Int16 => 2,
            DataType::Int32 | DataType::Float | DataType::Varchar => 4,
            DataType::Int64 | DataType::Double => 8,
        }
    }

    /// Promotion rank for numeric types: i16 < i32 < i64 < float < double.
    pub fn numeric_rank(&self) -> Option<u8> {
        match self {
            DataType::Int16 => Some(0),
            DataType::Int32 => Some(1),
            DataType::Int64 => Some(2),
            DataType::Float => Some(3),
            DataType::Double => Some(4),
            DataType::Varchar => None,
        }
    }

    /// Returns the common type of two numeric operands.
    ///
    /// Returns `None` when either side is not numeric.
    pub fn promote(self, other: DataType) -> Option<DataType> {
        let (a, b) = (self.numeric_rank()?, other.numeric_rank()?);
        Some(if a >= b { self } else { other })
    }

    /// Returns true if a value of `self` may be passed where `target` is expected.
    ///
    /// Numeric types widen upward; varchar only matches varchar.
    pub fn coerces_to(self, target: DataType) -> bool {
        match (self.numeric_rank(), target.numeric_rank()) {
            (Some(from), Some(to)) => from <= to,
            (None, None) => true,
            _ => false,
        }
    }

    /// Parses a UDF type annotation (`i16|i32|i64|float|double|varchar`).
    pub fn from_annotation(name: &str) -> Option<DataType> {
        match name {
            "i16" => Some(DataType::Int16),
            "i32" => Some(DataType::Int32),
            "i64" => Some(DataType::Int64),
            "float" => Some(DataType::Float),
            "double" => Some(DataType::Double),
            "varchar" => Some(DataType::Varchar),
            _ => None,
        }
    }

    /// Returns the UDF annotation for this type.
    pub fn annotation(&self) -> &'static str {
        match self {
            DataType::Int16 => "i16",
            DataType::Int32 => "i32",
            DataType::Int64 => "i64",
            DataType::Float => "float",
            DataType::Double => "double",
            DataType::Varchar => "varchar",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Int16 => "INT16",
            DataType::Int32 => "INT32",
            DataType::Int64 => "INT64",
            DataType::Float => "FLOAT",
            DataType::Double => "DOUBLE",
            DataType::Varchar => "VARCHAR",
        };
        write!(f, "{}", name)
    }
}
