//! UDF mini-language parser.
//!
//! A `%%fun` block holds one or more straight-line function definitions:
//!
//! ```text
//! def test(a:i32,b:i32):i32
//!     c=a+b
//!     d=c+1
//!     return d
//! end
//! ```
//!
//! Statements are line-oriented. Each body is a single basic block of
//! assignments terminated by exactly one `return`. Identifiers resolve at
//! parse time to parameters or previously assigned locals, and every node
//! carries its inferred type.

use std::collections::HashMap;
use std::fmt;

use windlass_common::memory::{Arena, NodeId};

use super::{BinaryOperator, DataType, Literal, ParseError, ParseResult};

// =============================================================================
// AST
// =============================================================================

/// Handle to an expression node inside a [`FunctionAst`].
pub type UdfExprId = NodeId<UdfExpr>;

/// A typed expression node.
#[derive(Debug, Clone, PartialEq)]
pub struct UdfExpr {
    /// Node kind.
    pub kind: UdfExprKind,
    /// Result type.
    pub data_type: DataType,
}

/// Expression node kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum UdfExprKind {
    /// Parameter by position.
    Param(usize),
    /// Local slot by position.
    Local(usize),
    /// Numeric literal.
    Literal(Literal),
    /// Binary arithmetic. Operands are already of `data_type`'s rank or below.
    Binary {
        /// Operator.
        op: BinaryOperator,
        /// Left operand.
        left: UdfExprId,
        /// Right operand.
        right: UdfExprId,
    },
    /// Numeric negation.
    Negate(UdfExprId),
}

/// A body statement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UdfStatement {
    /// `local = expr`.
    Assign {
        /// Local slot.
        local: usize,
        /// Assigned value.
        value: UdfExprId,
    },
    /// `return expr`.
    Return(UdfExprId),
}

/// A named, typed variable (parameter or local).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    /// Name.
    pub name: String,
    /// Type.
    pub data_type: DataType,
}

/// A parsed user-defined function.
///
/// Immutable after parse. Expression nodes live in the function's own arena.
#[derive(Debug, Clone)]
pub struct FunctionAst {
    /// Function name.
    pub name: String,
    /// Parameters in declaration order.
    pub params: Vec<Variable>,
    /// Declared return type.
    pub return_type: DataType,
    /// Locals in first-assignment order.
    pub locals: Vec<Variable>,
    /// Body statements; the last one is the only `Return`.
    pub body: Vec<UdfStatement>,
    nodes: Arena<UdfExpr>,
}

impl FunctionAst {
    /// Returns an expression node.
    pub fn expr(&self, id: UdfExprId) -> &UdfExpr {
        &self.nodes[id]
    }

    /// Returns the number of expression nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the parameter types in order.
    pub fn param_types(&self) -> Vec<DataType> {
        self.params.iter().map(|p| p.data_type).collect()
    }

    /// Returns the expression returned by the body.
    pub fn return_expr(&self) -> Option<UdfExprId> {
        match self.body.last() {
            Some(UdfStatement::Return(id)) => Some(*id),
            _ => None,
        }
    }

    fn fmt_expr(&self, id: UdfExprId, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.nodes[id].kind {
            UdfExprKind::Param(i) => write!(f, "{}", self.params[*i].name),
            UdfExprKind::Local(i) => write!(f, "{}", self.locals[*i].name),
            UdfExprKind::Literal(lit) => write!(f, "{}", lit),
            UdfExprKind::Binary { op, left, right } => {
                write!(f, "(")?;
                self.fmt_expr(*left, f)?;
                write!(f, " {} ", op)?;
                self.fmt_expr(*right, f)?;
                write!(f, ")")
            }
            UdfExprKind::Negate(inner) => {
                write!(f, "-")?;
                self.fmt_expr(*inner, f)
            }
        }
    }
}

impl fmt::Display for FunctionAst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<_> = self
            .params
            .iter()
            .map(|p| format!("{}:{}", p.name, p.data_type.annotation()))
            .collect();
        writeln!(
            f,
            "def {}({}):{}",
            self.name,
            params.join(","),
            self.return_type.annotation()
        )?;
        for stmt in &self.body {
            write!(f, "    ")?;
            match stmt {
                UdfStatement::Assign { local, value } => {
                    write!(f, "{} = ", self.locals[*local].name)?;
                    self.fmt_expr(*value, f)?;
                }
                UdfStatement::Return(value) => {
                    write!(f, "return ")?;
                    self.fmt_expr(*value, f)?;
                }
            }
            writeln!(f)?;
        }
        write!(f, "end")
    }
}

// =============================================================================
// Lexer
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(String),
    Symbol(char),
    Newline,
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    line: usize,
}

fn tokenize(input: &str, first_line: usize) -> ParseResult<Vec<Spanned>> {
    let mut out = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut line = first_line;
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        if c == '\n' {
            out.push(Spanned {
                token: Token::Newline,
                line,
            });
            line += 1;
            i += 1;
            continue;
        }
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '#' {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }
        if "(),:=+-*/%".contains(c) {
            out.push(Spanned {
                token: Token::Symbol(c),
                line,
            });
            i += 1;
            continue;
        }
        if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            if i < chars.len() && chars[i] == '.' {
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            out.push(Spanned {
                token: Token::Number(chars[start..i].iter().collect()),
                line,
            });
            continue;
        }
        if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            out.push(Spanned {
                token: Token::Ident(chars[start..i].iter().collect()),
                line,
            });
            continue;
        }

        return Err(ParseError::Udf {
            line,
            message: format!("unexpected character {:?}", c),
        });
    }

    Ok(out)
}

// =============================================================================
// Parser
// =============================================================================

/// Parses a UDF block into its function definitions.
///
/// `first_line` is the script line number of the block's first line, used
/// in error messages.
pub fn parse_functions(block: &str, first_line: usize) -> ParseResult<Vec<FunctionAst>> {
    let toks = tokenize(block, first_line)?;
    let last_line = toks.last().map_or(first_line, |t| t.line);
    let mut parser = UdfParser {
        toks,
        i: 0,
        last_line,
    };

    let mut functions: Vec<FunctionAst> = Vec::new();
    loop {
        parser.skip_newlines();
        if parser.at_end() {
            break;
        }
        let function = parser.parse_function()?;
        if functions.iter().any(|f| f.name == function.name) {
            return Err(ParseError::DuplicateFunction(function.name));
        }
        functions.push(function);
    }

    if functions.is_empty() {
        return Err(ParseError::Udf {
            line: first_line,
            message: "%%fun block defines no function".to_string(),
        });
    }
    Ok(functions)
}

struct UdfParser {
    toks: Vec<Spanned>,
    i: usize,
    last_line: usize,
}

/// Per-function scope used while parsing a body.
struct Scope {
    params: Vec<Variable>,
    locals: Vec<Variable>,
    names: HashMap<String, Binding>,
    nodes: Arena<UdfExpr>,
}

#[derive(Debug, Clone, Copy)]
enum Binding {
    Param(usize),
    Local(usize),
}

impl UdfParser {
    fn at_end(&self) -> bool {
        self.i >= self.toks.len()
    }

    fn line(&self) -> usize {
        self.toks.get(self.i).map_or(self.last_line, |t| t.line)
    }

    fn peek(&self) -> Option<&Token> {
        self.toks.get(self.i).map(|t| &t.token)
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::Udf {
            line: self.line(),
            message: message.into(),
        }
    }

    fn skip_newlines(&mut self) {
        while matches!(self.peek(), Some(Token::Newline)) {
            self.i += 1;
        }
    }

    fn peek_kw(&self, kw: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(s)) if s == kw)
    }

    fn expect_kw(&mut self, kw: &str) -> ParseResult<()> {
        if self.peek_kw(kw) {
            self.i += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected keyword {}", kw)))
        }
    }

    fn expect_ident(&mut self) -> ParseResult<String> {
        match self.peek() {
            Some(Token::Ident(s)) => {
                let s = s.clone();
                self.i += 1;
                Ok(s)
            }
            _ => Err(self.error("expected identifier")),
        }
    }

    fn expect_symbol(&mut self, symbol: char) -> ParseResult<()> {
        match self.peek() {
            Some(Token::Symbol(c)) if *c == symbol => {
                self.i += 1;
                Ok(())
            }
            _ => Err(self.error(format!("expected symbol {}", symbol))),
        }
    }

    fn consume_symbol(&mut self, symbol: char) -> bool {
        if matches!(self.peek(), Some(Token::Symbol(c)) if *c == symbol) {
            self.i += 1;
            true
        } else {
            false
        }
    }

    fn expect_line_end(&mut self) -> ParseResult<()> {
        match self.peek() {
            Some(Token::Newline) => {
                self.i += 1;
                Ok(())
            }
            None => Ok(()),
            Some(tok) => Err(self.error(format!("unexpected {:?} at end of statement", tok))),
        }
    }

    fn expect_type(&mut self) -> ParseResult<DataType> {
        let line = self.line();
        let name = self.expect_ident()?;
        DataType::from_annotation(&name).ok_or(ParseError::UnknownType { line, name })
    }

    fn parse_function(&mut self) -> ParseResult<FunctionAst> {
        self.expect_kw("def")?;
        let name = self.expect_ident()?;

        self.expect_symbol('(')?;
        let mut params: Vec<Variable> = Vec::new();
        if !self.consume_symbol(')') {
            loop {
                let line = self.line();
                let param = self.expect_ident()?;
                self.expect_symbol(':')?;
                let data_type = self.expect_type()?;
                if params.iter().any(|p| p.name == param) {
                    return Err(ParseError::Udf {
                        line,
                        message: format!("duplicate parameter {}", param),
                    });
                }
                params.push(Variable {
                    name: param,
                    data_type,
                });
                if self.consume_symbol(')') {
                    break;
                }
                self.expect_symbol(',')?;
            }
        }
        self.expect_symbol(':')?;
        let return_type = self.expect_type()?;
        self.expect_line_end()?;

        let names = params
            .iter()
            .enumerate()
            .map(|(i, p)| (p.name.clone(), Binding::Param(i)))
            .collect();
        let mut scope = Scope {
            params,
            locals: Vec::new(),
            names,
            nodes: Arena::new(),
        };

        let mut body = Vec::new();
        let mut returned = false;
        loop {
            self.skip_newlines();
            if self.at_end() {
                return Err(self.error(format!("function {} is missing 'end'", name)));
            }
            if self.peek_kw("end") {
                self.i += 1;
                self.expect_line_end()?;
                break;
            }
            if returned {
                return Err(self.error(format!(
                    "statement after return in function {}",
                    name
                )));
            }

            if self.peek_kw("return") {
                self.i += 1;
                let value = self.parse_expr(&mut scope)?;
                self.check_return_type(&scope, value, return_type, &name)?;
                body.push(UdfStatement::Return(value));
                returned = true;
            } else {
                body.push(self.parse_assignment(&mut scope)?);
            }
            self.expect_line_end()?;
        }

        if !returned {
            return Err(ParseError::MissingReturn(name));
        }

        Ok(FunctionAst {
            name,
            params: scope.params,
            return_type,
            locals: scope.locals,
            body,
            nodes: scope.nodes,
        })
    }

    fn check_return_type(
        &self,
        scope: &Scope,
        value: UdfExprId,
        return_type: DataType,
        function: &str,
    ) -> ParseResult<()> {
        let found = scope.nodes[value].data_type;
        if found.coerces_to(return_type) {
            Ok(())
        } else {
            Err(self.error(format!(
                "function {} returns {} but declares {}",
                function,
                found.annotation(),
                return_type.annotation()
            )))
        }
    }

    fn parse_assignment(&mut self, scope: &mut Scope) -> ParseResult<UdfStatement> {
        let line = self.line();
        let target = self.expect_ident()?;
        if target == "def" || target == "end" || target == "return" {
            return Err(self.error(format!("unexpected keyword {}", target)));
        }
        self.expect_symbol('=')?;
        let value = self.parse_expr(scope)?;
        let value_type = scope.nodes[value].data_type;

        let local = match scope.names.get(&target) {
            Some(Binding::Param(_)) => {
                return Err(ParseError::Udf {
                    line,
                    message: format!("cannot assign to parameter {}", target),
                })
            }
            Some(Binding::Local(slot)) => {
                let declared = scope.locals[*slot].data_type;
                if declared != value_type {
                    return Err(ParseError::Udf {
                        line,
                        message: format!(
                            "local {} is {} but assigned {}",
                            target,
                            declared.annotation(),
                            value_type.annotation()
                        ),
                    });
                }
                *slot
            }
            None => {
                let slot = scope.locals.len();
                scope.locals.push(Variable {
                    name: target.clone(),
                    data_type: value_type,
                });
                scope.names.insert(target, Binding::Local(slot));
                slot
            }
        };

        Ok(UdfStatement::Assign { local, value })
    }

    // expr := term (('+' | '-') term)*
    fn parse_expr(&mut self, scope: &mut Scope) -> ParseResult<UdfExprId> {
        let mut left = self.parse_term(scope)?;
        loop {
            let op = match self.peek() {
                Some(Token::Symbol(c @ ('+' | '-'))) => BinaryOperator::from_symbol(*c),
                _ => None,
            };
            let Some(op) = op else { break };
            self.i += 1;
            let right = self.parse_term(scope)?;
            left = self.binary(scope, op, left, right)?;
        }
        Ok(left)
    }

    // term := unary (('*' | '/' | '%') unary)*
    fn parse_term(&mut self, scope: &mut Scope) -> ParseResult<UdfExprId> {
        let mut left = self.parse_unary(scope)?;
        loop {
            let op = match self.peek() {
                Some(Token::Symbol(c @ ('*' | '/' | '%'))) => BinaryOperator::from_symbol(*c),
                _ => None,
            };
            let Some(op) = op else { break };
            self.i += 1;
            let right = self.parse_unary(scope)?;
            left = self.binary(scope, op, left, right)?;
        }
        Ok(left)
    }

    fn parse_unary(&mut self, scope: &mut Scope) -> ParseResult<UdfExprId> {
        if self.consume_symbol('-') {
            let inner = self.parse_unary(scope)?;
            let data_type = scope.nodes[inner].data_type;
            if !data_type.is_numeric() {
                return Err(self.error("cannot negate a varchar"));
            }
            return Ok(scope.nodes.alloc(UdfExpr {
                kind: UdfExprKind::Negate(inner),
                data_type,
            }));
        }
        self.parse_primary(scope)
    }

    fn parse_primary(&mut self, scope: &mut Scope) -> ParseResult<UdfExprId> {
        let line = self.line();
        match self.peek().cloned() {
            Some(Token::Number(text)) => {
                self.i += 1;
                let literal = Literal::parse_number(&text).map_err(|e| ParseError::Udf {
                    line,
                    message: e.to_string(),
                })?;
                let data_type = match literal {
                    Literal::Integer(v) if i32::try_from(v).is_ok() => DataType::Int32,
                    Literal::Integer(_) => DataType::Int64,
                    _ => DataType::Double,
                };
                Ok(scope.nodes.alloc(UdfExpr {
                    kind: UdfExprKind::Literal(literal),
                    data_type,
                }))
            }
            Some(Token::Ident(name)) => {
                self.i += 1;
                let (kind, data_type) = match scope.names.get(&name) {
                    Some(Binding::Param(i)) => (UdfExprKind::Param(*i), scope.params[*i].data_type),
                    Some(Binding::Local(i)) => (UdfExprKind::Local(*i), scope.locals[*i].data_type),
                    None => return Err(ParseError::UndeclaredIdentifier { line, name }),
                };
                Ok(scope.nodes.alloc(UdfExpr { kind, data_type }))
            }
            Some(Token::Symbol('(')) => {
                self.i += 1;
                let inner = self.parse_expr(scope)?;
                self.expect_symbol(')')?;
                Ok(inner)
            }
            _ => Err(self.error("expected expression")),
        }
    }

    fn binary(
        &self,
        scope: &mut Scope,
        op: BinaryOperator,
        left: UdfExprId,
        right: UdfExprId,
    ) -> ParseResult<UdfExprId> {
        let (lt, rt) = (scope.nodes[left].data_type, scope.nodes[right].data_type);
        let data_type = lt.promote(rt).ok_or_else(|| {
            self.error(format!(
                "operator {} needs numeric operands, got {} and {}",
                op,
                lt.annotation(),
                rt.annotation()
            ))
        })?;
        Ok(scope.nodes.alloc(UdfExpr {
            kind: UdfExprKind::Binary { op, left, right },
            data_type,
        }))
    }
}
