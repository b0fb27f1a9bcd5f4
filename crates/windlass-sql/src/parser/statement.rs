//! SELECT statement representation.
//!
//! The accepted surface is
//! `SELECT <items> FROM <table> [WINDOW <name> AS (...)] [LIMIT <n>]`.
//! Every other clause is rejected here so the planner only ever sees
//! this shape.

use std::fmt;

use serde::{Deserialize, Serialize};
use sqlparser::ast as sql_ast;

use super::{Expr, ParseError, ParseResult};

/// A parsed SELECT statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectStatement {
    /// Projection list.
    pub projection: Vec<SelectItem>,
    /// Source table name.
    pub from: String,
    /// Declared window, if any.
    pub window: Option<NamedWindow>,
    /// LIMIT value.
    pub limit: Option<u64>,
}

impl SelectStatement {
    /// Converts from sqlparser's Statement.
    pub fn from_statement(stmt: sql_ast::Statement) -> ParseResult<Self> {
        match stmt {
            sql_ast::Statement::Query(query) => Self::from_sql_ast(*query),
            other => Err(ParseError::Unsupported(format!(
                "Only SELECT queries are supported, got: {}",
                other
            ))),
        }
    }

    /// Converts from sqlparser's Query.
    pub fn from_sql_ast(query: sql_ast::Query) -> ParseResult<Self> {
        if query.with.is_some() {
            return Err(ParseError::Unsupported("WITH clause".to_string()));
        }
        if !query.order_by.is_empty() {
            return Err(ParseError::Unsupported("ORDER BY clause".to_string()));
        }
        if query.offset.is_some() || query.fetch.is_some() {
            return Err(ParseError::Unsupported("OFFSET/FETCH clause".to_string()));
        }

        let select = match *query.body {
            sql_ast::SetExpr::Select(select) => select,
            _ => {
                return Err(ParseError::Unsupported(
                    "Non-SELECT set expression".to_string(),
                ))
            }
        };

        if select.distinct.is_some() {
            return Err(ParseError::Unsupported("SELECT DISTINCT".to_string()));
        }
        if select.selection.is_some() {
            return Err(ParseError::Unsupported("WHERE clause".to_string()));
        }
        match &select.group_by {
            sql_ast::GroupByExpr::Expressions(exprs, ..) if exprs.is_empty() => {}
            _ => return Err(ParseError::Unsupported("GROUP BY clause".to_string())),
        }
        if select.having.is_some() {
            return Err(ParseError::Unsupported("HAVING clause".to_string()));
        }

        let from = match select.from.as_slice() {
            [item] if item.joins.is_empty() => match &item.relation {
                sql_ast::TableFactor::Table { name, alias: None, .. } => match name.0.as_slice() {
                    [ident] => ident.value.clone(),
                    _ => {
                        return Err(ParseError::Unsupported(format!(
                            "Qualified table name: {}",
                            name
                        )))
                    }
                },
                other => {
                    return Err(ParseError::Unsupported(format!("FROM item: {}", other)))
                }
            },
            [] => return Err(ParseError::Syntax("SELECT requires a FROM table".to_string())),
            _ => {
                return Err(ParseError::Unsupported(
                    "Joins and multiple FROM tables".to_string(),
                ))
            }
        };

        let mut windows = select
            .named_window
            .into_iter()
            .map(NamedWindow::from_sql_ast)
            .collect::<ParseResult<Vec<_>>>()?;
        if windows.len() > 1 {
            return Err(ParseError::Unsupported(
                "More than one WINDOW definition".to_string(),
            ));
        }
        let window = windows.pop();

        let projection = select
            .projection
            .into_iter()
            .map(SelectItem::from_sql_ast)
            .collect::<ParseResult<Vec<_>>>()?;
        if projection.is_empty() {
            return Err(ParseError::Syntax("Empty projection list".to_string()));
        }

        for item in &projection {
            if let SelectItem::Expr { expr, .. } = item {
                check_window_references(expr, window.as_ref(), true)?;
            }
        }

        let limit = query.limit.map(|e| extract_limit(&e)).transpose()?;

        Ok(Self {
            projection,
            from,
            window,
            limit,
        })
    }

    /// Returns true if any projection is a window aggregate.
    pub fn is_windowed(&self) -> bool {
        self.projection.iter().any(|item| match item {
            SelectItem::Expr { expr, .. } => expr.contains_aggregate(),
            SelectItem::Wildcard => false,
        })
    }
}

/// Window aggregates may only appear as a whole projection item and must
/// name the declared window.
fn check_window_references(
    expr: &Expr,
    window: Option<&NamedWindow>,
    top_level: bool,
) -> ParseResult<()> {
    match expr {
        Expr::Aggregate(agg) => {
            if !top_level {
                return Err(ParseError::Unsupported(format!(
                    "Window aggregate nested inside an expression: {}",
                    agg
                )));
            }
            match window {
                Some(w) if w.name == agg.window => Ok(()),
                _ => Err(ParseError::Syntax(format!(
                    "Window '{}' is not declared in a WINDOW clause",
                    agg.window
                ))),
            }
        }
        Expr::Column(_) | Expr::Literal(_) => Ok(()),
        Expr::BinaryOp { left, right, .. } => {
            check_window_references(left, window, false)?;
            check_window_references(right, window, false)
        }
        Expr::Negate(inner) => check_window_references(inner, window, false),
        Expr::Call(call) => call
            .args
            .iter()
            .try_for_each(|arg| check_window_references(arg, window, false)),
    }
}

impl fmt::Display for SelectStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let items: Vec<_> = self.projection.iter().map(|i| i.to_string()).collect();
        write!(f, "SELECT {} FROM {}", items.join(", "), self.from)?;
        if let Some(window) = &self.window {
            write!(f, " WINDOW {}", window)?;
        }
        if let Some(limit) = self.limit {
            write!(f, " LIMIT {}", limit)?;
        }
        Ok(())
    }
}

/// A selected item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SelectItem {
    /// An expression with optional alias.
    Expr {
        /// The expression.
        expr: Expr,
        /// Optional alias.
        alias: Option<String>,
    },
    /// `*`: every table column in schema order.
    Wildcard,
}

impl SelectItem {
    /// Creates an unaliased item.
    pub fn new(expr: Expr) -> Self {
        SelectItem::Expr { expr, alias: None }
    }

    /// Converts from sqlparser's SelectItem.
    pub fn from_sql_ast(item: sql_ast::SelectItem) -> ParseResult<Self> {
        match item {
            sql_ast::SelectItem::UnnamedExpr(expr) => Ok(SelectItem::Expr {
                expr: Expr::from_sql_ast(expr)?,
                alias: None,
            }),
            sql_ast::SelectItem::ExprWithAlias { expr, alias } => Ok(SelectItem::Expr {
                expr: Expr::from_sql_ast(expr)?,
                alias: Some(alias.value),
            }),
            sql_ast::SelectItem::Wildcard(_) => Ok(SelectItem::Wildcard),
            sql_ast::SelectItem::QualifiedWildcard(name, _) => Err(ParseError::Unsupported(
                format!("Qualified wildcard: {}.*", name),
            )),
        }
    }
}

impl fmt::Display for SelectItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectItem::Expr {
                expr,
                alias: Some(alias),
            } => write!(f, "{} AS {}", expr, alias),
            SelectItem::Expr { expr, alias: None } => write!(f, "{}", expr),
            SelectItem::Wildcard => write!(f, "*"),
        }
    }
}

/// `WINDOW name AS (PARTITION BY col ORDER BY col <frame>)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedWindow {
    /// Window name.
    pub name: String,
    /// PARTITION BY column.
    pub partition_by: String,
    /// ORDER BY column.
    pub order_by: String,
    /// True for `ORDER BY col DESC`.
    pub descending: bool,
    /// Frame clause, if present.
    pub frame: Option<WindowFrame>,
}

impl NamedWindow {
    /// Converts from sqlparser's NamedWindowDefinition.
    pub fn from_sql_ast(def: sql_ast::NamedWindowDefinition) -> ParseResult<Self> {
        let sql_ast::NamedWindowDefinition(ident, spec) = def;
        let name = ident.value;

        let partition_by = match spec.partition_by.as_slice() {
            [sql_ast::Expr::Identifier(col)] => col.value.clone(),
            [] => {
                return Err(ParseError::Syntax(format!(
                    "Window '{}' requires PARTITION BY <column>",
                    name
                )))
            }
            _ => {
                return Err(ParseError::Syntax(format!(
                    "Window '{}' must partition by exactly one column",
                    name
                )))
            }
        };

        let (order_by, descending) = match spec.order_by.as_slice() {
            [sql_ast::OrderByExpr {
                expr: sql_ast::Expr::Identifier(col),
                asc,
                ..
            }] => (col.value.clone(), *asc == Some(false)),
            [] => {
                return Err(ParseError::Syntax(format!(
                    "Window '{}' requires ORDER BY <column>",
                    name
                )))
            }
            _ => {
                return Err(ParseError::Syntax(format!(
                    "Window '{}' must order by exactly one column",
                    name
                )))
            }
        };

        let frame = spec.window_frame.map(WindowFrame::from_sql_ast).transpose()?;

        Ok(Self {
            name,
            partition_by,
            order_by,
            descending,
            frame,
        })
    }
}

impl fmt::Display for NamedWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} AS (PARTITION BY {} ORDER BY {}{}",
            self.name,
            self.partition_by,
            self.order_by,
            if self.descending { " DESC" } else { "" }
        )?;
        if let Some(frame) = &self.frame {
            write!(f, " {}", frame)?;
        }
        write!(f, ")")
    }
}

/// Window frame clause, kept as written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowFrame {
    /// Frame units.
    pub units: WindowFrameUnits,
    /// Start bound.
    pub start: WindowFrameBound,
    /// End bound (`None` when written without BETWEEN).
    pub end: Option<WindowFrameBound>,
}

impl WindowFrame {
    /// Converts from sqlparser's WindowFrame.
    pub fn from_sql_ast(frame: sql_ast::WindowFrame) -> ParseResult<Self> {
        let units = match frame.units {
            sql_ast::WindowFrameUnits::Rows => WindowFrameUnits::Rows,
            sql_ast::WindowFrameUnits::Range => WindowFrameUnits::Range,
            sql_ast::WindowFrameUnits::Groups => WindowFrameUnits::Groups,
        };
        Ok(Self {
            units,
            start: WindowFrameBound::from_sql_ast(frame.start_bound)?,
            end: frame.end_bound.map(WindowFrameBound::from_sql_ast).transpose()?,
        })
    }
}

impl fmt::Display for WindowFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.end {
            Some(end) => write!(f, "{} BETWEEN {} AND {}", self.units, self.start, end),
            None => write!(f, "{} {}", self.units, self.start),
        }
    }
}

/// Window frame units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowFrameUnits {
    /// ROWS.
    Rows,
    /// RANGE.
    Range,
    /// GROUPS.
    Groups,
}

impl fmt::Display for WindowFrameUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowFrameUnits::Rows => write!(f, "ROWS"),
            WindowFrameUnits::Range => write!(f, "RANGE"),
            WindowFrameUnits::Groups => write!(f, "GROUPS"),
        }
    }
}

/// Window frame bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowFrameBound {
    /// CURRENT ROW.
    CurrentRow,
    /// `n PRECEDING`, or UNBOUNDED PRECEDING when `None`.
    Preceding(Option<u64>),
    /// `n FOLLOWING`, or UNBOUNDED FOLLOWING when `None`.
    Following(Option<u64>),
}

impl WindowFrameBound {
    /// Converts from sqlparser's WindowFrameBound.
    pub fn from_sql_ast(bound: sql_ast::WindowFrameBound) -> ParseResult<Self> {
        match bound {
            sql_ast::WindowFrameBound::CurrentRow => Ok(WindowFrameBound::CurrentRow),
            sql_ast::WindowFrameBound::Preceding(n) => {
                Ok(WindowFrameBound::Preceding(n.map(|e| frame_offset(&e)).transpose()?))
            }
            sql_ast::WindowFrameBound::Following(n) => {
                Ok(WindowFrameBound::Following(n.map(|e| frame_offset(&e)).transpose()?))
            }
        }
    }
}

impl fmt::Display for WindowFrameBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowFrameBound::CurrentRow => write!(f, "CURRENT ROW"),
            WindowFrameBound::Preceding(None) => write!(f, "UNBOUNDED PRECEDING"),
            WindowFrameBound::Preceding(Some(n)) => write!(f, "{} PRECEDING", n),
            WindowFrameBound::Following(None) => write!(f, "UNBOUNDED FOLLOWING"),
            WindowFrameBound::Following(Some(n)) => write!(f, "{} FOLLOWING", n),
        }
    }
}

fn frame_offset(expr: &sql_ast::Expr) -> ParseResult<u64> {
    match expr {
        sql_ast::Expr::Value(sql_ast::Value::Number(n, _)) => n
            .parse()
            .map_err(|_| ParseError::InvalidLiteral(format!("Invalid frame offset: {}", n))),
        other => Err(ParseError::Syntax(format!(
            "Frame offset must be a non-negative integer, got {}",
            other
        ))),
    }
}

fn extract_limit(expr: &sql_ast::Expr) -> ParseResult<u64> {
    match expr {
        sql_ast::Expr::Value(sql_ast::Value::Number(n, _)) => n
            .parse()
            .map_err(|_| ParseError::InvalidLiteral(format!("Invalid LIMIT: {}", n))),
        other => Err(ParseError::Syntax(format!(
            "LIMIT must be a non-negative integer, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{AggregateFunction, Parser};

    #[test]
    fn test_select_with_udf_call() {
        let stmt = Parser::parse_select("SELECT test(col1,col1), col2 , col6 FROM t1 limit 10;")
            .unwrap();

        assert_eq!(stmt.from, "t1");
        assert_eq!(stmt.limit, Some(10));
        assert_eq!(stmt.projection.len(), 3);
        assert!(stmt.window.is_none());
        match &stmt.projection[0] {
            SelectItem::Expr {
                expr: Expr::Call(call),
                alias: None,
            } => {
                assert_eq!(call.name, "test");
                assert_eq!(call.args, vec![Expr::Column("col1".into()), Expr::Column("col1".into())]);
            }
            other => panic!("unexpected projection {:?}", other),
        }
    }

    #[test]
    fn test_select_with_window() {
        let sql = "SELECT sum(col1) OVER w1 as w1_col1_sum, col2 FROM t1 \
                   WINDOW w1 AS (PARTITION BY col2 ORDER BY col5 ROWS BETWEEN 3 PRECEDING AND CURRENT ROW) \
                   limit 10;";
        let stmt = Parser::parse_select(sql).unwrap();
        assert!(stmt.is_windowed());

        let window = stmt.window.as_ref().unwrap();
        assert_eq!(window.name, "w1");
        assert_eq!(window.partition_by, "col2");
        assert_eq!(window.order_by, "col5");
        assert!(!window.descending);
        assert_eq!(
            window.frame,
            Some(WindowFrame {
                units: WindowFrameUnits::Rows,
                start: WindowFrameBound::Preceding(Some(3)),
                end: Some(WindowFrameBound::CurrentRow),
            })
        );

        match &stmt.projection[0] {
            SelectItem::Expr {
                expr: Expr::Aggregate(agg),
                alias: Some(alias),
            } => {
                assert_eq!(agg.func, AggregateFunction::Sum);
                assert_eq!(agg.column.as_deref(), Some("col1"));
                assert_eq!(alias, "w1_col1_sum");
            }
            other => panic!("unexpected projection {:?}", other),
        }
    }

    #[test]
    fn test_undeclared_window_reference() {
        let err = Parser::parse_select("SELECT sum(col1) OVER w2 FROM t1").unwrap_err();
        assert!(matches!(err, ParseError::Syntax(_)));

        let sql = "SELECT sum(col1) OVER w2 FROM t1 \
                   WINDOW w1 AS (PARTITION BY col2 ORDER BY col5 ROWS BETWEEN 3 PRECEDING AND CURRENT ROW)";
        assert!(matches!(Parser::parse_select(sql), Err(ParseError::Syntax(_))));
    }

    #[test]
    fn test_unsupported_aggregate() {
        let sql = "SELECT median(col1) OVER w1 FROM t1 \
                   WINDOW w1 AS (PARTITION BY col2 ORDER BY col5 ROWS BETWEEN 3 PRECEDING AND CURRENT ROW)";
        assert!(matches!(Parser::parse_select(sql), Err(ParseError::Syntax(_))));

        let err = Parser::parse_select("SELECT sum(col1) FROM t1").unwrap_err();
        assert!(matches!(err, ParseError::Syntax(_)));
    }

    #[test]
    fn test_inline_window_rejected() {
        let sql = "SELECT sum(col1) OVER (PARTITION BY col2 ORDER BY col5) FROM t1";
        assert!(matches!(Parser::parse_select(sql), Err(ParseError::Syntax(_))));
    }

    #[test]
    fn test_frame_kept_as_written() {
        let sql = "SELECT count(*) OVER w FROM t1 \
                   WINDOW w AS (PARTITION BY a ORDER BY b DESC RANGE UNBOUNDED PRECEDING)";
        let stmt = Parser::parse_select(sql).unwrap();
        let window = stmt.window.unwrap();
        assert!(window.descending);
        assert_eq!(
            window.frame,
            Some(WindowFrame {
                units: WindowFrameUnits::Range,
                start: WindowFrameBound::Preceding(None),
                end: None,
            })
        );
    }

    #[test]
    fn test_rejected_clauses() {
        for sql in [
            "SELECT col1 FROM t1 WHERE col1 > 1",
            "SELECT col1 FROM t1 GROUP BY col1",
            "SELECT col1 FROM t1 ORDER BY col1",
            "SELECT DISTINCT col1 FROM t1",
            "SELECT col1 FROM t1 JOIN t2 ON t1.a = t2.a",
            "SELECT col1 FROM t1 LIMIT col1",
            "INSERT INTO t1 VALUES (1)",
        ] {
            assert!(Parser::parse_select(sql).is_err(), "accepted: {}", sql);
        }
    }

    #[test]
    fn test_nested_aggregate_rejected() {
        let sql = "SELECT sum(col1) OVER w + 1 FROM t1 \
                   WINDOW w AS (PARTITION BY a ORDER BY b ROWS BETWEEN 1 PRECEDING AND CURRENT ROW)";
        assert!(Parser::parse_select(sql).is_err());
    }

    #[test]
    fn test_display_round_trip_shape() {
        let stmt = Parser::parse_select("SELECT col1 + 1 AS c, * FROM t1 LIMIT 5").unwrap();
        assert_eq!(stmt.to_string(), "SELECT (col1 + 1) AS c, * FROM t1 LIMIT 5");
    }
}
