//! SQL projection expressions.
//!
//! The projection surface is small: column references, literals,
//! arithmetic, scalar calls (UDFs), and window aggregates written as
//! `agg(col) OVER window_name`.

use std::fmt;

use serde::{Deserialize, Serialize};
use sqlparser::ast as sql_ast;

use super::{ParseError, ParseResult};

/// A SQL expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// A column reference.
    Column(String),
    /// A literal value.
    Literal(Literal),
    /// A binary arithmetic operation.
    BinaryOp {
        /// Left operand.
        left: Box<Expr>,
        /// Operator.
        op: BinaryOperator,
        /// Right operand.
        right: Box<Expr>,
    },
    /// Numeric negation.
    Negate(Box<Expr>),
    /// A scalar function call.
    Call(FunctionCall),
    /// A window aggregate.
    Aggregate(AggregateCall),
}

impl Expr {
    /// Converts from sqlparser's Expr.
    pub fn from_sql_ast(expr: sql_ast::Expr) -> ParseResult<Self> {
        match expr {
            sql_ast::Expr::Identifier(ident) => Ok(Expr::Column(ident.value)),
            sql_ast::Expr::CompoundIdentifier(mut idents) => match idents.len() {
                1 => Ok(Expr::Column(idents.remove(0).value)),
                _ => Err(ParseError::Unsupported(format!(
                    "Qualified column reference: {}",
                    sql_ast::ObjectName(idents)
                ))),
            },
            sql_ast::Expr::Value(value) => Ok(Expr::Literal(Literal::from_sql_ast(&value)?)),
            sql_ast::Expr::BinaryOp { left, op, right } => Ok(Expr::BinaryOp {
                left: Box::new(Expr::from_sql_ast(*left)?),
                op: BinaryOperator::from_sql_ast(&op)?,
                right: Box::new(Expr::from_sql_ast(*right)?),
            }),
            sql_ast::Expr::UnaryOp { op, expr } => match op {
                sql_ast::UnaryOperator::Minus => {
                    Ok(Expr::Negate(Box::new(Expr::from_sql_ast(*expr)?)))
                }
                sql_ast::UnaryOperator::Plus => Expr::from_sql_ast(*expr),
                _ => Err(ParseError::Unsupported(format!("Unary operator: {}", op))),
            },
            sql_ast::Expr::Nested(inner) => Expr::from_sql_ast(*inner),
            sql_ast::Expr::Function(func) => {
                if func.over.is_some() {
                    Ok(Expr::Aggregate(AggregateCall::from_sql_ast(func)?))
                } else {
                    Ok(Expr::Call(FunctionCall::from_sql_ast(func)?))
                }
            }
            other => Err(ParseError::Unsupported(format!("Expression: {}", other))),
        }
    }

    /// Returns true if this expression contains a window aggregate.
    pub fn contains_aggregate(&self) -> bool {
        match self {
            Expr::Aggregate(_) => true,
            Expr::Column(_) | Expr::Literal(_) => false,
            Expr::BinaryOp { left, right, .. } => {
                left.contains_aggregate() || right.contains_aggregate()
            }
            Expr::Negate(inner) => inner.contains_aggregate(),
            Expr::Call(call) => call.args.iter().any(Expr::contains_aggregate),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(name) => write!(f, "{}", name),
            Expr::Literal(lit) => write!(f, "{}", lit),
            Expr::BinaryOp { left, op, right } => write!(f, "({} {} {})", left, op, right),
            Expr::Negate(inner) => write!(f, "-{}", inner),
            Expr::Call(call) => write!(f, "{}", call),
            Expr::Aggregate(agg) => write!(f, "{}", agg),
        }
    }
}

/// A literal value in SQL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    /// Integer value.
    Integer(i64),
    /// Floating point value.
    Float(f64),
    /// String value.
    String(String),
}

impl Literal {
    /// Converts from sqlparser's Value.
    pub fn from_sql_ast(value: &sql_ast::Value) -> ParseResult<Self> {
        match value {
            sql_ast::Value::Number(n, _) => Self::parse_number(n),
            sql_ast::Value::SingleQuotedString(s) => Ok(Literal::String(s.clone())),
            _ => Err(ParseError::Unsupported(format!("Literal value: {}", value))),
        }
    }

    /// Parses a numeric lexeme. Digit-only text is an integer.
    pub fn parse_number(text: &str) -> ParseResult<Self> {
        if text.bytes().all(|b| b.is_ascii_digit()) {
            text.parse::<i64>()
                .map(Literal::Integer)
                .map_err(|_| ParseError::InvalidLiteral(format!("Integer out of range: {}", text)))
        } else {
            text.parse::<f64>()
                .map(Literal::Float)
                .map_err(|_| ParseError::InvalidLiteral(format!("Invalid number: {}", text)))
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Integer(i) => write!(f, "{}", i),
            Literal::Float(v) => write!(f, "{:?}", v),
            Literal::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

/// Binary arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOperator {
    /// Addition.
    Plus,
    /// Subtraction.
    Minus,
    /// Multiplication.
    Multiply,
    /// Division.
    Divide,
    /// Remainder.
    Modulo,
}

impl BinaryOperator {
    /// Converts from sqlparser's BinaryOperator.
    pub fn from_sql_ast(op: &sql_ast::BinaryOperator) -> ParseResult<Self> {
        match op {
            sql_ast::BinaryOperator::Plus => Ok(BinaryOperator::Plus),
            sql_ast::BinaryOperator::Minus => Ok(BinaryOperator::Minus),
            sql_ast::BinaryOperator::Multiply => Ok(BinaryOperator::Multiply),
            sql_ast::BinaryOperator::Divide => Ok(BinaryOperator::Divide),
            sql_ast::BinaryOperator::Modulo => Ok(BinaryOperator::Modulo),
            _ => Err(ParseError::Unsupported(format!("Binary operator: {}", op))),
        }
    }

    /// Maps a single-character operator symbol.
    pub fn from_symbol(c: char) -> Option<Self> {
        match c {
            '+' => Some(BinaryOperator::Plus),
            '-' => Some(BinaryOperator::Minus),
            '*' => Some(BinaryOperator::Multiply),
            '/' => Some(BinaryOperator::Divide),
            '%' => Some(BinaryOperator::Modulo),
            _ => None,
        }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryOperator::Plus => write!(f, "+"),
            BinaryOperator::Minus => write!(f, "-"),
            BinaryOperator::Multiply => write!(f, "*"),
            BinaryOperator::Divide => write!(f, "/"),
            BinaryOperator::Modulo => write!(f, "%"),
        }
    }
}

/// A scalar function call, resolved against the UDF block by the planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Function name, case preserved.
    pub name: String,
    /// Arguments.
    pub args: Vec<Expr>,
}

impl FunctionCall {
    /// Creates a new function call.
    pub fn new(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// Converts from sqlparser's Function.
    pub fn from_sql_ast(func: sql_ast::Function) -> ParseResult<Self> {
        let name = function_name(&func.name)?;
        if AggregateFunction::from_name(&name).is_some() {
            return Err(ParseError::Syntax(format!(
                "Aggregate {} requires an OVER window reference",
                name
            )));
        }
        if func.distinct {
            return Err(ParseError::Unsupported(format!("DISTINCT in call to {}", name)));
        }

        let args = func
            .args
            .into_iter()
            .map(|arg| match arg {
                sql_ast::FunctionArg::Unnamed(sql_ast::FunctionArgExpr::Expr(e)) => {
                    Expr::from_sql_ast(e)
                }
                other => Err(ParseError::Unsupported(format!(
                    "Argument {} in call to {}",
                    other, name
                ))),
            })
            .collect::<ParseResult<Vec<_>>>()?;

        Ok(Self { name, args })
    }
}

impl fmt::Display for FunctionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<_> = self.args.iter().map(|a| a.to_string()).collect();
        write!(f, "{}({})", self.name, args.join(", "))
    }
}

/// Aggregates that can be folded over a window frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregateFunction {
    /// Sum in the input's native type.
    Sum,
    /// Row count (int64).
    Count,
    /// Minimum in the input type.
    Min,
    /// Maximum in the input type.
    Max,
    /// Mean as double.
    Avg,
}

impl AggregateFunction {
    /// Looks up an aggregate by case-insensitive name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "sum" => Some(AggregateFunction::Sum),
            "count" => Some(AggregateFunction::Count),
            "min" => Some(AggregateFunction::Min),
            "max" => Some(AggregateFunction::Max),
            "avg" => Some(AggregateFunction::Avg),
            _ => None,
        }
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggregateFunction::Sum => "sum",
            AggregateFunction::Count => "count",
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
            AggregateFunction::Avg => "avg",
        };
        write!(f, "{}", name)
    }
}

/// `agg(col) OVER window` or `count(*) OVER window`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateCall {
    /// Aggregate function.
    pub func: AggregateFunction,
    /// Input column; `None` for `count(*)`.
    pub column: Option<String>,
    /// Referenced named window.
    pub window: String,
}

impl AggregateCall {
    /// Converts a sqlparser Function that carries an OVER clause.
    pub fn from_sql_ast(func: sql_ast::Function) -> ParseResult<Self> {
        let name = function_name(&func.name)?;
        let agg = AggregateFunction::from_name(&name)
            .ok_or_else(|| ParseError::Syntax(format!("Unsupported aggregate function: {}", name)))?;

        let window = match func.over {
            Some(sql_ast::WindowType::NamedWindow(ident)) => ident.value,
            Some(_) => {
                return Err(ParseError::Syntax(format!(
                    "{} OVER requires a named window declared in a WINDOW clause",
                    name
                )))
            }
            None => {
                return Err(ParseError::Syntax(format!(
                    "Aggregate {} requires an OVER window reference",
                    name
                )))
            }
        };

        if func.distinct {
            return Err(ParseError::Unsupported(format!("DISTINCT in {}", name)));
        }

        let mut args = func.args;
        if args.len() != 1 {
            return Err(ParseError::Syntax(format!(
                "{} takes exactly one argument, got {}",
                name,
                args.len()
            )));
        }
        let column = match args.remove(0) {
            sql_ast::FunctionArg::Unnamed(sql_ast::FunctionArgExpr::Wildcard)
                if agg == AggregateFunction::Count =>
            {
                None
            }
            sql_ast::FunctionArg::Unnamed(sql_ast::FunctionArgExpr::Expr(e)) => {
                match Expr::from_sql_ast(e)? {
                    Expr::Column(col) => Some(col),
                    other => {
                        return Err(ParseError::Syntax(format!(
                            "{} argument must be a column, got {}",
                            name, other
                        )))
                    }
                }
            }
            other => {
                return Err(ParseError::Syntax(format!(
                    "Invalid argument {} to {}",
                    other, name
                )))
            }
        };

        Ok(Self {
            func: agg,
            column,
            window,
        })
    }
}

impl fmt::Display for AggregateCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.column {
            Some(col) => write!(f, "{}({}) OVER {}", self.func, col, self.window),
            None => write!(f, "{}(*) OVER {}", self.func, self.window),
        }
    }
}

fn function_name(name: &sql_ast::ObjectName) -> ParseResult<String> {
    match name.0.as_slice() {
        [ident] => Ok(ident.value.clone()),
        _ => Err(ParseError::Unsupported(format!("Qualified function name: {}", name))),
    }
}
