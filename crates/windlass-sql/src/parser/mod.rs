//! Parsers for the embedded query surface.
//!
//! A query script has an optional UDF section followed by a SQL section:
//!
//! ```text
//! %%fun
//! def test(a:i32,b:i32):i32
//!     c=a+b
//!     return c
//! end
//! %%sql
//! SELECT test(col1, col1), col2 FROM t1 LIMIT 10;
//! ```
//!
//! The SQL section goes through the `sqlparser` crate (PostgreSQL dialect)
//! and is narrowed into [`SelectStatement`]. The UDF section is parsed by a
//! small hand-written recursive descent parser in [`udf`].
//!
//! # Usage
//!
//! ```
//! use windlass_sql::parser::Parser;
//!
//! let script = Parser::parse_script("SELECT col1 FROM t1 LIMIT 1").unwrap();
//! assert!(script.functions.is_empty());
//! assert_eq!(script.select.from, "t1");
//! ```

use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser as SqlParser;
use thiserror::Error;
use windlass_common::ErrorCode;

mod expr;
mod statement;
mod types;
pub mod udf;

pub use expr::*;
pub use statement::*;
pub use types::*;
pub use udf::{FunctionAst, UdfExpr, UdfExprId, UdfExprKind, UdfStatement, Variable};

/// Marker line opening the UDF section.
pub const FUN_MARKER: &str = "%%fun";
/// Marker line opening the SQL section.
pub const SQL_MARKER: &str = "%%sql";

/// Errors that can occur while parsing a query script.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// Error from the underlying sqlparser crate or a malformed clause.
    #[error("SQL syntax error: {0}")]
    Syntax(String),

    /// SQL construct outside the supported surface.
    #[error("Unsupported SQL feature: {0}")]
    Unsupported(String),

    /// Invalid literal value.
    #[error("Invalid literal: {0}")]
    InvalidLiteral(String),

    /// Empty query.
    #[error("Empty query")]
    EmptyQuery,

    /// Malformed UDF source.
    #[error("UDF syntax error at line {line}: {message}")]
    Udf {
        /// Script line number.
        line: usize,
        /// Description.
        message: String,
    },

    /// Unknown type annotation in a UDF header.
    #[error("Unknown type '{name}' at line {line}")]
    UnknownType {
        /// Script line number.
        line: usize,
        /// Annotation as written.
        name: String,
    },

    /// Identifier used before it was declared.
    #[error("Undeclared identifier '{name}' at line {line}")]
    UndeclaredIdentifier {
        /// Script line number.
        line: usize,
        /// Identifier.
        name: String,
    },

    /// Function body without a `return`.
    #[error("Function '{0}' has no return statement")]
    MissingReturn(String),

    /// Two functions with the same name in one block.
    #[error("Function '{0}' is defined more than once")]
    DuplicateFunction(String),
}

impl ParseError {
    /// Returns the engine error code. Every parse failure is a syntax error.
    pub fn code(&self) -> ErrorCode {
        ErrorCode::SyntaxError
    }
}

impl From<sqlparser::parser::ParserError> for ParseError {
    fn from(err: sqlparser::parser::ParserError) -> Self {
        ParseError::Syntax(err.to_string())
    }
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// The two sections of a query script, borrowed from the input text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Script<'a> {
    /// UDF block body, without its marker line.
    pub udf: Option<&'a str>,
    /// SQL text.
    pub sql: &'a str,
    /// Script line number of the first UDF body line.
    pub udf_first_line: usize,
}

impl<'a> Script<'a> {
    /// Splits a script into its UDF and SQL sections.
    ///
    /// Without a leading `%%fun` line the whole input is SQL. With one, a
    /// `%%sql` line must follow.
    pub fn split(text: &'a str) -> ParseResult<Self> {
        let mut offset = 0usize;
        let mut fun_start: Option<(usize, usize)> = None;

        for (index, line) in text.split_inclusive('\n').enumerate() {
            let marker = line.trim();
            let line_no = index + 1;
            let next = offset + line.len();

            match fun_start {
                None if marker.is_empty() => {}
                None if marker == FUN_MARKER => fun_start = Some((next, line_no + 1)),
                None => {
                    if marker == SQL_MARKER {
                        return Ok(Script {
                            udf: None,
                            sql: &text[next..],
                            udf_first_line: 0,
                        });
                    }
                    return Ok(Script {
                        udf: None,
                        sql: text,
                        udf_first_line: 0,
                    });
                }
                Some((start, first_line)) => {
                    if marker == SQL_MARKER {
                        return Ok(Script {
                            udf: Some(&text[start..offset]),
                            sql: &text[next..],
                            udf_first_line: first_line,
                        });
                    }
                    if marker == FUN_MARKER {
                        return Err(ParseError::Udf {
                            line: line_no,
                            message: "nested %%fun marker".to_string(),
                        });
                    }
                }
            }
            offset = next;
        }

        match fun_start {
            Some(_) => Err(ParseError::Syntax(
                "%%fun block is not followed by %%sql".to_string(),
            )),
            None => Ok(Script {
                udf: None,
                sql: text,
                udf_first_line: 0,
            }),
        }
    }
}

/// A fully parsed script.
#[derive(Debug, Clone)]
pub struct ParsedScript {
    /// UDF definitions in declaration order.
    pub functions: Vec<FunctionAst>,
    /// The SELECT statement.
    pub select: SelectStatement,
}

impl ParsedScript {
    /// Finds a function by name.
    pub fn function(&self, name: &str) -> Option<&FunctionAst> {
        self.functions.iter().find(|f| f.name == name)
    }
}

/// Entry point for both embedded languages.
pub struct Parser;

impl Parser {
    /// Parses a complete script: optional UDF block then SQL.
    pub fn parse_script(text: &str) -> ParseResult<ParsedScript> {
        let script = Script::split(text)?;
        let functions = match script.udf {
            Some(block) => udf::parse_functions(block, script.udf_first_line)?,
            None => Vec::new(),
        };
        let select = Self::parse_select(script.sql)?;
        Ok(ParsedScript { functions, select })
    }

    /// Parses a single SELECT statement.
    pub fn parse_select(sql: &str) -> ParseResult<SelectStatement> {
        if sql.trim().trim_end_matches(';').trim().is_empty() {
            return Err(ParseError::EmptyQuery);
        }

        let dialect = PostgreSqlDialect {};
        let mut ast = SqlParser::parse_sql(&dialect, sql)?;

        match ast.len() {
            0 => Err(ParseError::EmptyQuery),
            1 => SelectStatement::from_statement(ast.remove(0)),
            n => Err(ParseError::Syntax(format!("Expected 1 statement, got {}", n))),
        }
    }

    /// Parses a UDF block on its own.
    pub fn parse_functions(block: &str) -> ParseResult<Vec<FunctionAst>> {
        udf::parse_functions(block, 1)
    }
}
