//! Expression evaluation.

use std::cmp::Ordering;

use tabula_common::{DataType, Value};

use super::functions::call_scalar;
use super::relation::{resolve, ColumnMeta};
use crate::error::{ScriptError, ScriptResult};
use crate::parser::{BinaryOperator, ColumnRef, Expr, FunctionCall, UnaryOperator};

/// Supplies column values (and, for grouped rows, aggregate results) to
/// the evaluator.
pub(crate) trait RowContext {
    /// Returns the value of a column reference.
    fn column(&self, col: &ColumnRef) -> ScriptResult<Value>;

    /// Returns the precomputed value of an aggregate call, if this context
    /// has one.
    fn aggregate(&self, _call: &FunctionCall) -> Option<Value> {
        None
    }
}

/// A context with no columns.
pub(crate) struct EmptyContext;

impl RowContext for EmptyContext {
    fn column(&self, col: &ColumnRef) -> ScriptResult<Value> {
        Err(ScriptError::UnknownColumn(col.to_string()))
    }
}

/// One row of a relation.
pub(crate) struct RowRef<'a> {
    pub columns: &'a [ColumnMeta],
    pub row: &'a [Value],
}

impl<'a> RowRef<'a> {
    pub fn new(columns: &'a [ColumnMeta], row: &'a [Value]) -> Self {
        Self { columns, row }
    }
}

impl RowContext for RowRef<'_> {
    fn column(&self, col: &ColumnRef) -> ScriptResult<Value> {
        let index = resolve(self.columns, col)?;
        Ok(self.row.get(index).cloned().unwrap_or(Value::Null))
    }
}

/// Evaluates an expression against a row context.
pub(crate) fn evaluate(expr: &Expr, ctx: &dyn RowContext) -> ScriptResult<Value> {
    match expr {
        Expr::Column(col) => ctx.column(col),
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Nested(inner) => evaluate(inner, ctx),

        Expr::BinaryOp { left, op, right } => match op {
            BinaryOperator::And => {
                let l = truth(&evaluate(left, ctx)?)?;
                if l == Some(false) {
                    return Ok(Value::Boolean(false));
                }
                let r = truth(&evaluate(right, ctx)?)?;
                Ok(match (l, r) {
                    (_, Some(false)) => Value::Boolean(false),
                    (Some(true), Some(true)) => Value::Boolean(true),
                    _ => Value::Null,
                })
            }
            BinaryOperator::Or => {
                let l = truth(&evaluate(left, ctx)?)?;
                if l == Some(true) {
                    return Ok(Value::Boolean(true));
                }
                let r = truth(&evaluate(right, ctx)?)?;
                Ok(match (l, r) {
                    (_, Some(true)) => Value::Boolean(true),
                    (Some(false), Some(false)) => Value::Boolean(false),
                    _ => Value::Null,
                })
            }
            _ => {
                let l = evaluate(left, ctx)?;
                let r = evaluate(right, ctx)?;
                binary_op(*op, &l, &r)
            }
        },

        Expr::UnaryOp { op, expr } => {
            let v = evaluate(expr, ctx)?;
            match op {
                UnaryOperator::Not => Ok(truth(&v)?.map_or(Value::Null, |b| Value::Boolean(!b))),
                UnaryOperator::Plus => match v {
                    Value::Null | Value::Int(_) | Value::Float(_) => Ok(v),
                    other => Err(type_mismatch_unary("+", &other)),
                },
                UnaryOperator::Minus => match v {
                    Value::Null => Ok(Value::Null),
                    Value::Int(i) => Ok(i.checked_neg().map_or(Value::Float(-(i as f64)), Value::Int)),
                    Value::Float(f) => Ok(Value::Float(-f)),
                    other => Err(type_mismatch_unary("-", &other)),
                },
            }
        }

        Expr::Function(call) => {
            if call.is_aggregate() {
                return ctx.aggregate(call).ok_or_else(|| {
                    ScriptError::InvalidArgument(format!(
                        "aggregate {}() is not allowed here",
                        call.name
                    ))
                });
            }
            let args = call
                .args
                .iter()
                .map(|arg| evaluate(arg, ctx))
                .collect::<ScriptResult<Vec<_>>>()?;
            call_scalar(&call.name, args)
        }

        Expr::Case {
            operand,
            when_clauses,
            else_clause,
        } => {
            let operand = operand.as_ref().map(|e| evaluate(e, ctx)).transpose()?;
            for (when, then) in when_clauses {
                let hit = match &operand {
                    Some(op) => {
                        let w = evaluate(when, ctx)?;
                        !op.is_null() && !w.is_null() && compare_values(op, &w)? == Ordering::Equal
                    }
                    None => truth(&evaluate(when, ctx)?)? == Some(true),
                };
                if hit {
                    return evaluate(then, ctx);
                }
            }
            match else_clause {
                Some(e) => evaluate(e, ctx),
                None => Ok(Value::Null),
            }
        }

        Expr::Cast { expr, data_type } => evaluate(expr, ctx)?
            .cast(*data_type)
            .map_err(ScriptError::TypeMismatch),

        Expr::IsNull(expr) => Ok(Value::Boolean(evaluate(expr, ctx)?.is_null())),
        Expr::IsNotNull(expr) => Ok(Value::Boolean(!evaluate(expr, ctx)?.is_null())),

        Expr::Between {
            expr,
            low,
            high,
            negated,
        } => {
            let v = evaluate(expr, ctx)?;
            let low = evaluate(low, ctx)?;
            let high = evaluate(high, ctx)?;
            if v.is_null() || low.is_null() || high.is_null() {
                return Ok(Value::Null);
            }
            let inside = compare_values(&v, &low)? != Ordering::Less
                && compare_values(&v, &high)? != Ordering::Greater;
            Ok(Value::Boolean(inside != *negated))
        }

        Expr::InList {
            expr,
            list,
            negated,
        } => {
            let v = evaluate(expr, ctx)?;
            if v.is_null() {
                return Ok(Value::Null);
            }
            let mut saw_null = false;
            for item in list {
                let item = evaluate(item, ctx)?;
                if item.is_null() {
                    saw_null = true;
                } else if compare_values(&v, &item)? == Ordering::Equal {
                    return Ok(Value::Boolean(!*negated));
                }
            }
            if saw_null {
                Ok(Value::Null)
            } else {
                Ok(Value::Boolean(*negated))
            }
        }

        Expr::Like {
            expr,
            pattern,
            negated,
            case_insensitive,
        } => {
            let v = evaluate(expr, ctx)?;
            let p = evaluate(pattern, ctx)?;
            match (v, p) {
                (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
                (Value::Text(s), Value::Text(p)) => {
                    Ok(Value::Boolean(like_match(&s, &p, *case_insensitive) != *negated))
                }
                (v, p) => Err(ScriptError::TypeMismatch(format!(
                    "LIKE needs text operands, got {} and {}",
                    type_name(&v),
                    type_name(&p)
                ))),
            }
        }

        Expr::Wildcard => Err(ScriptError::InvalidArgument(
            "* is only valid in COUNT(*)".to_string(),
        )),
    }
}

/// Evaluates a predicate; NULL counts as false.
pub(crate) fn predicate(expr: &Expr, ctx: &dyn RowContext) -> ScriptResult<bool> {
    Ok(truth(&evaluate(expr, ctx)?)? == Some(true))
}

/// Interprets a value as a truth value. NULL is unknown.
pub(crate) fn truth(value: &Value) -> ScriptResult<Option<bool>> {
    match value {
        Value::Null => Ok(None),
        Value::Boolean(b) => Ok(Some(*b)),
        Value::Int(i) => Ok(Some(*i != 0)),
        Value::Float(f) => Ok(Some(*f != 0.0)),
        Value::Text(s) => value.to_bool().map(Some).ok_or_else(|| {
            ScriptError::TypeMismatch(format!("'{}' is not a boolean", s))
        }),
    }
}

/// Compares two non-null values of compatible types.
pub(crate) fn compare_values(a: &Value, b: &Value) -> ScriptResult<Ordering> {
    let compatible = (a.is_numeric() && b.is_numeric()) || a.data_type() == b.data_type();
    if compatible {
        Ok(a.cmp(b))
    } else {
        Err(ScriptError::TypeMismatch(format!(
            "cannot compare {} with {}",
            type_name(a),
            type_name(b)
        )))
    }
}

/// Returns the type name of a value for error messages.
pub(crate) fn type_name(value: &Value) -> &'static str {
    value.data_type().map_or("null", DataType::name)
}

fn type_mismatch_unary(op: &str, v: &Value) -> ScriptError {
    ScriptError::TypeMismatch(format!("cannot apply unary {} to {}", op, type_name(v)))
}

fn binary_op(op: BinaryOperator, l: &Value, r: &Value) -> ScriptResult<Value> {
    if op.propagates_null() && (l.is_null() || r.is_null()) {
        return Ok(Value::Null);
    }

    match op {
        BinaryOperator::Eq => Ok(Value::Boolean(compare_values(l, r)? == Ordering::Equal)),
        BinaryOperator::NotEq => Ok(Value::Boolean(compare_values(l, r)? != Ordering::Equal)),
        BinaryOperator::Lt => Ok(Value::Boolean(compare_values(l, r)? == Ordering::Less)),
        BinaryOperator::LtEq => Ok(Value::Boolean(compare_values(l, r)? != Ordering::Greater)),
        BinaryOperator::Gt => Ok(Value::Boolean(compare_values(l, r)? == Ordering::Greater)),
        BinaryOperator::GtEq => Ok(Value::Boolean(compare_values(l, r)? != Ordering::Less)),
        BinaryOperator::Concat => Ok(Value::Text(format!(
            "{}{}",
            l.to_text().unwrap_or_default(),
            r.to_text().unwrap_or_default()
        ))),
        BinaryOperator::Plus
        | BinaryOperator::Minus
        | BinaryOperator::Multiply
        | BinaryOperator::Divide
        | BinaryOperator::Modulo => arithmetic(op, l, r),
        BinaryOperator::And | BinaryOperator::Or => Err(ScriptError::InvalidArgument(format!(
            "logical operator {} evaluated as arithmetic",
            op
        ))),
    }
}

fn arithmetic(op: BinaryOperator, l: &Value, r: &Value) -> ScriptResult<Value> {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => {
            let (a, b) = (*a, *b);
            let widened = |f: fn(f64, f64) -> f64| Value::Float(f(a as f64, b as f64));
            match op {
                BinaryOperator::Plus => Ok(a.checked_add(b).map_or_else(|| widened(|x, y| x + y), Value::Int)),
                BinaryOperator::Minus => Ok(a.checked_sub(b).map_or_else(|| widened(|x, y| x - y), Value::Int)),
                BinaryOperator::Multiply => Ok(a.checked_mul(b).map_or_else(|| widened(|x, y| x * y), Value::Int)),
                BinaryOperator::Divide if b == 0 => Err(ScriptError::DivisionByZero),
                BinaryOperator::Divide => Ok(Value::Float(a as f64 / b as f64)),
                BinaryOperator::Modulo if b == 0 => Err(ScriptError::DivisionByZero),
                _ => Ok(Value::Int(a.wrapping_rem(b))),
            }
        }
        (a, b) if a.is_numeric() && b.is_numeric() => {
            let (a, b) = (a.to_f64().unwrap_or(0.0), b.to_f64().unwrap_or(0.0));
            match op {
                BinaryOperator::Plus => Ok(Value::Float(a + b)),
                BinaryOperator::Minus => Ok(Value::Float(a - b)),
                BinaryOperator::Multiply => Ok(Value::Float(a * b)),
                BinaryOperator::Divide | BinaryOperator::Modulo if b == 0.0 => {
                    Err(ScriptError::DivisionByZero)
                }
                BinaryOperator::Divide => Ok(Value::Float(a / b)),
                _ => Ok(Value::Float(a % b)),
            }
        }
        (Value::Text(a), Value::Text(b)) if op == BinaryOperator::Plus => {
            Ok(Value::Text(format!("{}{}", a, b)))
        }
        _ => Err(ScriptError::TypeMismatch(format!(
            "cannot apply {} to {} and {}",
            op,
            type_name(l),
            type_name(r)
        ))),
    }
}

/// SQL LIKE matching: `%` matches any run of characters, `_` exactly one.
pub(crate) fn like_match(text: &str, pattern: &str, case_insensitive: bool) -> bool {
    let (t, p): (Vec<char>, Vec<char>) = if case_insensitive {
        (text.to_lowercase().chars().collect(), pattern.to_lowercase().chars().collect())
    } else {
        (text.chars().collect(), pattern.chars().collect())
    };

    let (mut ti, mut pi) = (0, 0);
    let mut star: Option<usize> = None;
    let mut mark = 0;

    while ti < t.len() {
        if pi < p.len() && p[pi] != '%' && (p[pi] == '_' || p[pi] == t[ti]) {
            ti += 1;
            pi += 1;
        } else if pi < p.len() && p[pi] == '%' {
            star = Some(pi);
            mark = ti;
            pi += 1;
        } else if let Some(s) = star {
            pi = s + 1;
            mark += 1;
            ti = mark;
        } else {
            return false;
        }
    }

    while pi < p.len() && p[pi] == '%' {
        pi += 1;
    }
    pi == p.len()
}
