//! Expressions.

use std::fmt;

use sqlparser::ast as sql_ast;
use tabula_common::{DataType, Value, MAX_EXPR_DEPTH};

use crate::error::{ScriptError, ScriptResult};
use crate::executor::AggregateFunc;

/// A column reference (table.column or just column).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    /// Optional table or alias name.
    pub table: Option<String>,
    /// Column name.
    pub column: String,
}

impl ColumnRef {
    /// Creates a new column reference.
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            table: None,
            column: column.into(),
        }
    }

    /// Creates a column reference with a table qualifier.
    pub fn qualified(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            column: column.into(),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(table) => write!(f, "{}.{}", table, self.column),
            None => write!(f, "{}", self.column),
        }
    }
}

/// An expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A column reference.
    Column(ColumnRef),
    /// A literal value.
    Literal(Value),
    /// A binary operation (e.g., a + b, x = y).
    BinaryOp {
        /// Left operand.
        left: Box<Expr>,
        /// Operator.
        op: BinaryOperator,
        /// Right operand.
        right: Box<Expr>,
    },
    /// A unary operation (e.g., NOT x, -y).
    UnaryOp {
        /// Operator.
        op: UnaryOperator,
        /// Operand.
        expr: Box<Expr>,
    },
    /// A function call, scalar or aggregate.
    Function(FunctionCall),
    /// A CASE expression.
    Case {
        /// The operand (for simple CASE).
        operand: Option<Box<Expr>>,
        /// WHEN branches.
        when_clauses: Vec<(Expr, Expr)>,
        /// ELSE branch.
        else_clause: Option<Box<Expr>>,
    },
    /// A CAST expression.
    Cast {
        /// Expression to cast.
        expr: Box<Expr>,
        /// Target type.
        data_type: DataType,
    },
    /// IS NULL check.
    IsNull(Box<Expr>),
    /// IS NOT NULL check.
    IsNotNull(Box<Expr>),
    /// BETWEEN expression.
    Between {
        /// Expression to test.
        expr: Box<Expr>,
        /// Low bound.
        low: Box<Expr>,
        /// High bound.
        high: Box<Expr>,
        /// Whether this is NOT BETWEEN.
        negated: bool,
    },
    /// IN list expression.
    InList {
        /// Expression to test.
        expr: Box<Expr>,
        /// List of values.
        list: Vec<Expr>,
        /// Whether this is NOT IN.
        negated: bool,
    },
    /// LIKE / ILIKE pattern match.
    Like {
        /// Expression to test.
        expr: Box<Expr>,
        /// Pattern with `%` and `_` wildcards.
        pattern: Box<Expr>,
        /// Whether this is NOT LIKE.
        negated: bool,
        /// Whether this is ILIKE.
        case_insensitive: bool,
    },
    /// Wildcard (*), only valid as `COUNT(*)`'s argument.
    Wildcard,
    /// A nested expression in parentheses.
    Nested(Box<Expr>),
}

impl Expr {
    /// Creates a column expression.
    pub fn column(name: impl Into<String>) -> Self {
        Expr::Column(ColumnRef::new(name))
    }

    /// Creates a literal expression.
    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    /// Returns true if this expression is, or contains, an aggregate call.
    pub fn contains_aggregate(&self) -> bool {
        let mut found = false;
        self.walk(&mut |e| {
            if let Expr::Function(call) = e {
                if call.is_aggregate() {
                    found = true;
                }
            }
        });
        found
    }

    /// Collects every aggregate call in this expression, outermost first.
    ///
    /// Arguments of an aggregate are not searched.
    pub fn collect_aggregates(&self, out: &mut Vec<FunctionCall>) {
        match self {
            Expr::Function(call) if call.is_aggregate() => {
                if !out.contains(call) {
                    out.push(call.clone());
                }
            }
            _ => self.for_each_child(|child| child.collect_aggregates(out)),
        }
    }

    /// Returns the column name an unaliased projection of this expression
    /// produces.
    pub fn output_name(&self) -> String {
        match self {
            Expr::Column(col) => col.column.clone(),
            Expr::Function(call) => call.name.clone(),
            Expr::Cast { expr, .. } | Expr::Nested(expr) => expr.output_name(),
            other => other.to_string(),
        }
    }

    /// Visits this expression and all sub-expressions, parents first.
    pub fn walk(&self, visit: &mut impl FnMut(&Expr)) {
        visit(self);
        self.for_each_child(|child| child.walk(visit));
    }

    fn for_each_child(&self, mut f: impl FnMut(&Expr)) {
        match self {
            Expr::Column(_) | Expr::Literal(_) | Expr::Wildcard => {}
            Expr::BinaryOp { left, right, .. } => {
                f(left);
                f(right);
            }
            Expr::UnaryOp { expr, .. }
            | Expr::Cast { expr, .. }
            | Expr::IsNull(expr)
            | Expr::IsNotNull(expr)
            | Expr::Nested(expr) => f(expr),
            Expr::Function(call) => call.args.iter().for_each(f),
            Expr::Case {
                operand,
                when_clauses,
                else_clause,
            } => {
                if let Some(operand) = operand {
                    f(operand);
                }
                for (when, then) in when_clauses {
                    f(when);
                    f(then);
                }
                if let Some(else_clause) = else_clause {
                    f(else_clause);
                }
            }
            Expr::Between {
                expr, low, high, ..
            } => {
                f(expr);
                f(low);
                f(high);
            }
            Expr::InList { expr, list, .. } => {
                f(expr);
                list.iter().for_each(f);
            }
            Expr::Like { expr, pattern, .. } => {
                f(expr);
                f(pattern);
            }
        }
    }

    /// Converts from sqlparser's Expr.
    ///
    /// Expressions nested deeper than [`MAX_EXPR_DEPTH`] are rejected with
    /// `ScriptError::LimitExceeded` before any recursion happens.
    pub fn from_sql_ast(expr: sql_ast::Expr) -> ScriptResult<Self> {
        let depth = sql_expr_depth(&expr, MAX_EXPR_DEPTH);
        if depth > MAX_EXPR_DEPTH {
            return Err(ScriptError::LimitExceeded(format!(
                "expression nested deeper than {} levels",
                MAX_EXPR_DEPTH
            )));
        }
        Self::lower(expr)
    }

    fn lower(expr: sql_ast::Expr) -> ScriptResult<Self> {
        match expr {
            sql_ast::Expr::Identifier(ident) => Ok(Expr::Column(ColumnRef::new(ident.value))),
            sql_ast::Expr::CompoundIdentifier(idents) => match idents.len() {
                1 => Ok(Expr::Column(ColumnRef::new(&idents[0].value))),
                2 => Ok(Expr::Column(ColumnRef::qualified(
                    &idents[0].value,
                    &idents[1].value,
                ))),
                _ => Err(ScriptError::Unsupported(
                    "compound identifier with more than 2 parts".to_string(),
                )),
            },
            sql_ast::Expr::Value(value) => Ok(Expr::Literal(literal_from_sql_ast(&value)?)),
            sql_ast::Expr::BinaryOp { left, op, right } => Ok(Expr::BinaryOp {
                left: Box::new(Expr::lower(*left)?),
                op: BinaryOperator::from_sql_ast(&op)?,
                right: Box::new(Expr::lower(*right)?),
            }),
            sql_ast::Expr::UnaryOp { op, expr } => Ok(Expr::UnaryOp {
                op: UnaryOperator::from_sql_ast(&op)?,
                expr: Box::new(Expr::lower(*expr)?),
            }),
            sql_ast::Expr::Function(func) => Ok(Expr::Function(FunctionCall::from_sql_ast(func)?)),
            sql_ast::Expr::Cast {
                expr, data_type, ..
            } => Ok(Expr::Cast {
                expr: Box::new(Expr::lower(*expr)?),
                data_type: data_type_from_sql_ast(&data_type)?,
            }),
            sql_ast::Expr::IsNull(expr) => Ok(Expr::IsNull(Box::new(Expr::lower(*expr)?))),
            sql_ast::Expr::IsNotNull(expr) => {
                Ok(Expr::IsNotNull(Box::new(Expr::lower(*expr)?)))
            }
            sql_ast::Expr::Between {
                expr,
                negated,
                low,
                high,
            } => Ok(Expr::Between {
                expr: Box::new(Expr::lower(*expr)?),
                low: Box::new(Expr::lower(*low)?),
                high: Box::new(Expr::lower(*high)?),
                negated,
            }),
            sql_ast::Expr::InList {
                expr,
                list,
                negated,
            } => {
                let list: ScriptResult<Vec<_>> = list.into_iter().map(Expr::lower).collect();
                Ok(Expr::InList {
                    expr: Box::new(Expr::lower(*expr)?),
                    list: list?,
                    negated,
                })
            }
            sql_ast::Expr::Like {
                negated,
                expr,
                pattern,
                ..
            } => Ok(Expr::Like {
                expr: Box::new(Expr::lower(*expr)?),
                pattern: Box::new(Expr::lower(*pattern)?),
                negated,
                case_insensitive: false,
            }),
            sql_ast::Expr::ILike {
                negated,
                expr,
                pattern,
                ..
            } => Ok(Expr::Like {
                expr: Box::new(Expr::lower(*expr)?),
                pattern: Box::new(Expr::lower(*pattern)?),
                negated,
                case_insensitive: true,
            }),
            sql_ast::Expr::Case {
                operand,
                conditions,
                results,
                else_result,
            } => {
                let operand = operand
                    .map(|e| Expr::lower(*e))
                    .transpose()?
                    .map(Box::new);

                let when_clauses: ScriptResult<Vec<_>> = conditions
                    .into_iter()
                    .zip(results)
                    .map(|(cond, result)| {
                        Ok((Expr::lower(cond)?, Expr::lower(result)?))
                    })
                    .collect();

                let else_clause = else_result
                    .map(|e| Expr::lower(*e))
                    .transpose()?
                    .map(Box::new);

                Ok(Expr::Case {
                    operand,
                    when_clauses: when_clauses?,
                    else_clause,
                })
            }
            // Keyword-syntax functions the parser gives their own nodes
            sql_ast::Expr::Trim { expr, .. } => Ok(Expr::Function(FunctionCall::new(
                "trim",
                vec![Expr::lower(*expr)?],
            ))),
            sql_ast::Expr::Ceil { expr, .. } => Ok(Expr::Function(FunctionCall::new(
                "ceil",
                vec![Expr::lower(*expr)?],
            ))),
            sql_ast::Expr::Floor { expr, .. } => Ok(Expr::Function(FunctionCall::new(
                "floor",
                vec![Expr::lower(*expr)?],
            ))),
            sql_ast::Expr::Substring {
                expr,
                substring_from,
                substring_for,
                ..
            } => {
                let mut args = vec![Expr::lower(*expr)?];
                args.push(match substring_from {
                    Some(from) => Expr::lower(*from)?,
                    None => Expr::literal(1i64),
                });
                if let Some(len) = substring_for {
                    args.push(Expr::lower(*len)?);
                }
                Ok(Expr::Function(FunctionCall::new("substring", args)))
            }
            sql_ast::Expr::Nested(expr) => Ok(Expr::Nested(Box::new(Expr::lower(*expr)?))),
            _ => Err(ScriptError::Unsupported(format!("expression: {}", expr))),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(col) => write!(f, "{}", col),
            Expr::Literal(Value::Text(s)) => write!(f, "'{}'", s.replace('\'', "''")),
            Expr::Literal(v) => write!(f, "{}", v),
            Expr::BinaryOp { left, op, right } => write!(f, "{} {} {}", left, op, right),
            Expr::UnaryOp { op, expr } => match op {
                UnaryOperator::Not => write!(f, "NOT {}", expr),
                UnaryOperator::Minus => write!(f, "-{}", expr),
                UnaryOperator::Plus => write!(f, "+{}", expr),
            },
            Expr::Function(call) => write!(f, "{}", call),
            Expr::Case {
                operand,
                when_clauses,
                else_clause,
            } => {
                write!(f, "CASE")?;
                if let Some(operand) = operand {
                    write!(f, " {}", operand)?;
                }
                for (when, then) in when_clauses {
                    write!(f, " WHEN {} THEN {}", when, then)?;
                }
                if let Some(else_clause) = else_clause {
                    write!(f, " ELSE {}", else_clause)?;
                }
                write!(f, " END")
            }
            Expr::Cast { expr, data_type } => write!(f, "CAST({} AS {})", expr, data_type),
            Expr::IsNull(expr) => write!(f, "{} IS NULL", expr),
            Expr::IsNotNull(expr) => write!(f, "{} IS NOT NULL", expr),
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                let not = if *negated { "NOT " } else { "" };
                write!(f, "{} {}BETWEEN {} AND {}", expr, not, low, high)
            }
            Expr::InList {
                expr,
                list,
                negated,
            } => {
                let not = if *negated { "NOT " } else { "" };
                let items: Vec<String> = list.iter().map(ToString::to_string).collect();
                write!(f, "{} {}IN ({})", expr, not, items.join(", "))
            }
            Expr::Like {
                expr,
                pattern,
                negated,
                case_insensitive,
            } => {
                let not = if *negated { "NOT " } else { "" };
                let op = if *case_insensitive { "ILIKE" } else { "LIKE" };
                write!(f, "{} {}{} {}", expr, not, op, pattern)
            }
            Expr::Wildcard => write!(f, "*"),
            Expr::Nested(expr) => write!(f, "({})", expr),
        }
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    /// Equal (=).
    Eq,
    /// Not equal (<>, !=).
    NotEq,
    /// Less than (<).
    Lt,
    /// Less than or equal (<=).
    LtEq,
    /// Greater than (>).
    Gt,
    /// Greater than or equal (>=).
    GtEq,
    /// Addition (+).
    Plus,
    /// Subtraction (-).
    Minus,
    /// Multiplication (*).
    Multiply,
    /// Division (/).
    Divide,
    /// Modulo (%).
    Modulo,
    /// Logical AND.
    And,
    /// Logical OR.
    Or,
    /// String concatenation (||).
    Concat,
}

impl BinaryOperator {
    /// Converts from sqlparser's BinaryOperator.
    pub fn from_sql_ast(op: &sql_ast::BinaryOperator) -> ScriptResult<Self> {
        match op {
            sql_ast::BinaryOperator::Eq => Ok(BinaryOperator::Eq),
            sql_ast::BinaryOperator::NotEq => Ok(BinaryOperator::NotEq),
            sql_ast::BinaryOperator::Lt => Ok(BinaryOperator::Lt),
            sql_ast::BinaryOperator::LtEq => Ok(BinaryOperator::LtEq),
            sql_ast::BinaryOperator::Gt => Ok(BinaryOperator::Gt),
            sql_ast::BinaryOperator::GtEq => Ok(BinaryOperator::GtEq),
            sql_ast::BinaryOperator::Plus => Ok(BinaryOperator::Plus),
            sql_ast::BinaryOperator::Minus => Ok(BinaryOperator::Minus),
            sql_ast::BinaryOperator::Multiply => Ok(BinaryOperator::Multiply),
            sql_ast::BinaryOperator::Divide => Ok(BinaryOperator::Divide),
            sql_ast::BinaryOperator::Modulo => Ok(BinaryOperator::Modulo),
            sql_ast::BinaryOperator::And => Ok(BinaryOperator::And),
            sql_ast::BinaryOperator::Or => Ok(BinaryOperator::Or),
            sql_ast::BinaryOperator::StringConcat => Ok(BinaryOperator::Concat),
            _ => Err(ScriptError::Unsupported(format!("binary operator: {}", op))),
        }
    }

    /// Returns true for operators whose result is NULL when an operand is.
    pub fn propagates_null(self) -> bool {
        !matches!(self, BinaryOperator::And | BinaryOperator::Or)
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOperator::Eq => "=",
            BinaryOperator::NotEq => "<>",
            BinaryOperator::Lt => "<",
            BinaryOperator::LtEq => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::GtEq => ">=",
            BinaryOperator::Plus => "+",
            BinaryOperator::Minus => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::And => "AND",
            BinaryOperator::Or => "OR",
            BinaryOperator::Concat => "||",
        };
        f.write_str(s)
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    /// Logical NOT.
    Not,
    /// Negation (-).
    Minus,
    /// Identity (+).
    Plus,
}

impl UnaryOperator {
    /// Converts from sqlparser's UnaryOperator.
    pub fn from_sql_ast(op: &sql_ast::UnaryOperator) -> ScriptResult<Self> {
        match op {
            sql_ast::UnaryOperator::Not => Ok(UnaryOperator::Not),
            sql_ast::UnaryOperator::Minus => Ok(UnaryOperator::Minus),
            sql_ast::UnaryOperator::Plus => Ok(UnaryOperator::Plus),
            _ => Err(ScriptError::Unsupported(format!("unary operator: {}", op))),
        }
    }
}

/// A function call.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    /// Lowercase function name.
    pub name: String,
    /// Arguments.
    pub args: Vec<Expr>,
    /// Whether DISTINCT was specified (aggregates only).
    pub distinct: bool,
}

impl FunctionCall {
    /// Creates a function call.
    pub fn new(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self {
            name: name.into().to_lowercase(),
            args,
            distinct: false,
        }
    }

    /// Returns the aggregate this call computes, if it is one.
    pub fn aggregate(&self) -> Option<AggregateFunc> {
        let star = matches!(self.args.as_slice(), [Expr::Wildcard]);
        AggregateFunc::from_name(&self.name, star)
    }

    /// Returns true if this is an aggregate call.
    pub fn is_aggregate(&self) -> bool {
        self.aggregate().is_some()
    }

    /// Converts from sqlparser's Function.
    pub fn from_sql_ast(func: sql_ast::Function) -> ScriptResult<Self> {
        if func.over.is_some() {
            return Err(ScriptError::Unsupported(format!(
                "window function: {}",
                func.name
            )));
        }

        let name = func.name.to_string().to_lowercase();

        let args: ScriptResult<Vec<_>> = func
            .args
            .into_iter()
            .map(|arg| match arg {
                sql_ast::FunctionArg::Unnamed(sql_ast::FunctionArgExpr::Expr(e)) => {
                    Expr::from_sql_ast(e)
                }
                sql_ast::FunctionArg::Unnamed(sql_ast::FunctionArgExpr::Wildcard) => {
                    Ok(Expr::Wildcard)
                }
                other => Err(ScriptError::Unsupported(format!(
                    "function argument: {}",
                    other
                ))),
            })
            .collect();

        Ok(Self {
            name,
            args: args?,
            distinct: func.distinct,
        })
    }
}

impl fmt::Display for FunctionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        if self.distinct {
            write!(f, "DISTINCT ")?;
        }
        let args: Vec<_> = self.args.iter().map(|a| a.to_string()).collect();
        write!(f, "{})", args.join(", "))
    }
}

/// Converts a sqlparser literal.
pub(crate) fn literal_from_sql_ast(value: &sql_ast::Value) -> ScriptResult<Value> {
    match value {
        sql_ast::Value::Null => Ok(Value::Null),
        sql_ast::Value::Boolean(b) => Ok(Value::Boolean(*b)),
        sql_ast::Value::Number(n, _) => {
            if let Ok(i) = n.parse::<i64>() {
                Ok(Value::Int(i))
            } else {
                n.parse::<f64>()
                    .map(Value::Float)
                    .map_err(|_| ScriptError::Syntax(format!("invalid number: {}", n)))
            }
        }
        sql_ast::Value::SingleQuotedString(s) | sql_ast::Value::DoubleQuotedString(s) => {
            Ok(Value::Text(s.clone()))
        }
        other => Err(ScriptError::Unsupported(format!("literal: {}", other))),
    }
}

/// Converts a sqlparser data type by name.
pub(crate) fn data_type_from_sql_ast(data_type: &sql_ast::DataType) -> ScriptResult<DataType> {
    data_type
        .to_string()
        .parse::<DataType>()
        .map_err(|_| ScriptError::Unsupported(format!("data type: {}", data_type)))
}

/// Returns the nesting depth of `expr`, stopping early once it passes `limit`.
///
/// Walks with an explicit stack so that arbitrarily deep input cannot
/// overflow the thread stack.
fn sql_expr_depth(expr: &sql_ast::Expr, limit: usize) -> usize {
    let mut max = 0;
    let mut stack = vec![(expr, 1usize)];
    while let Some((expr, depth)) = stack.pop() {
        max = max.max(depth);
        if max > limit {
            break;
        }
        stack.extend(sql_expr_children(expr).into_iter().map(|child| (child, depth + 1)));
    }
    max
}

/// Direct subexpressions of the node kinds `Expr::lower` descends into.
fn sql_expr_children(expr: &sql_ast::Expr) -> Vec<&sql_ast::Expr> {
    use sql_ast::Expr as E;

    match expr {
        E::BinaryOp { left, right, .. } => vec![left.as_ref(), right.as_ref()],
        E::UnaryOp { expr, .. }
        | E::Cast { expr, .. }
        | E::Ceil { expr, .. }
        | E::Floor { expr, .. }
        | E::Trim { expr, .. }
        | E::IsNull(expr)
        | E::IsNotNull(expr)
        | E::Nested(expr) => vec![expr.as_ref()],
        E::Between {
            expr, low, high, ..
        } => vec![expr.as_ref(), low.as_ref(), high.as_ref()],
        E::Like { expr, pattern, .. } | E::ILike { expr, pattern, .. } => {
            vec![expr.as_ref(), pattern.as_ref()]
        }
        E::InList { expr, list, .. } => std::iter::once(expr.as_ref()).chain(list).collect(),
        E::Case {
            operand,
            conditions,
            results,
            else_result,
        } => operand
            .iter()
            .chain(else_result)
            .map(|e| e.as_ref())
            .chain(conditions)
            .chain(results)
            .collect(),
        E::Substring {
            expr,
            substring_from,
            substring_for,
            ..
        } => std::iter::once(expr)
            .chain(substring_from)
            .chain(substring_for)
            .map(|e| e.as_ref())
            .collect(),
        E::Function(func) => func
            .args
            .iter()
            .filter_map(|arg| match arg {
                sql_ast::FunctionArg::Unnamed(sql_ast::FunctionArgExpr::Expr(e))
                | sql_ast::FunctionArg::Named {
                    arg: sql_ast::FunctionArgExpr::Expr(e),
                    ..
                } => Some(e),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    #[test]
    fn test_convert_literals() {
        assert_eq!(Parser::parse_expr("42").unwrap(), Expr::literal(42i64));
        assert_eq!(Parser::parse_expr("2.5").unwrap(), Expr::literal(2.5));
        assert_eq!(Parser::parse_expr("'x'").unwrap(), Expr::literal("x"));
        assert_eq!(Parser::parse_expr("NULL").unwrap(), Expr::Literal(Value::Null));
    }

    #[test]
    fn test_convert_qualified_column() {
        let expr = Parser::parse_expr("u.name").unwrap();
        assert_eq!(expr, Expr::Column(ColumnRef::qualified("u", "name")));
    }

    #[test]
    fn test_keyword_functions() {
        let expr = Parser::parse_expr("TRIM(name)").unwrap();
        assert!(matches!(expr, Expr::Function(ref call) if call.name == "trim"));

        let expr = Parser::parse_expr("SUBSTRING(name FROM 2 FOR 3)").unwrap();
        match expr {
            Expr::Function(call) => {
                assert_eq!(call.name, "substring");
                assert_eq!(call.args.len(), 3);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_aggregate_detection() {
        let expr = Parser::parse_expr("SUM(amount) / COUNT(*)").unwrap();
        assert!(expr.contains_aggregate());

        let mut aggs = Vec::new();
        expr.collect_aggregates(&mut aggs);
        assert_eq!(aggs.len(), 2);

        let expr = Parser::parse_expr("upper(name)").unwrap();
        assert!(!expr.contains_aggregate());
    }

    #[test]
    fn test_output_name() {
        assert_eq!(Parser::parse_expr("name").unwrap().output_name(), "name");
        assert_eq!(Parser::parse_expr("count(*)").unwrap().output_name(), "count");
        assert_eq!(Parser::parse_expr("a + 1").unwrap().output_name(), "a + 1");
    }

    #[test]
    fn test_cast_type() {
        let expr = Parser::parse_expr("CAST(x AS VARCHAR(10))").unwrap();
        assert!(matches!(
            expr,
            Expr::Cast {
                data_type: DataType::Text,
                ..
            }
        ));
    }
}
