//! Scalar functions.

use std::cmp::Ordering;

use tabula_common::Value;

use super::evaluator::{compare_values, type_name};
use crate::error::{ScriptError, ScriptResult};

/// Calls a scalar function by lowercase name.
pub(crate) fn call_scalar(name: &str, args: Vec<Value>) -> ScriptResult<Value> {
    match name {
        "upper" => {
            arity(name, &args, 1, 1)?;
            text_map(&args[0], |s| s.to_uppercase())
        }
        "lower" => {
            arity(name, &args, 1, 1)?;
            text_map(&args[0], |s| s.to_lowercase())
        }
        "trim" | "btrim" => {
            arity(name, &args, 1, 1)?;
            text_map(&args[0], |s| s.trim().to_string())
        }
        "ltrim" => {
            arity(name, &args, 1, 1)?;
            text_map(&args[0], |s| s.trim_start().to_string())
        }
        "rtrim" => {
            arity(name, &args, 1, 1)?;
            text_map(&args[0], |s| s.trim_end().to_string())
        }
        "length" | "char_length" | "len" => {
            arity(name, &args, 1, 1)?;
            Ok(match args[0].to_text() {
                Some(s) => Value::Int(s.chars().count() as i64),
                None => Value::Null,
            })
        }
        "concat" => {
            arity(name, &args, 1, usize::MAX)?;
            Ok(Value::Text(
                args.iter().filter_map(Value::to_text).collect::<String>(),
            ))
        }
        "substring" | "substr" => {
            arity(name, &args, 2, 3)?;
            substring(&args)
        }
        "replace" => {
            arity(name, &args, 3, 3)?;
            match (args[0].to_text(), args[1].to_text(), args[2].to_text()) {
                (Some(s), Some(from), Some(to)) => Ok(Value::Text(s.replace(&from, &to))),
                _ => Ok(Value::Null),
            }
        }
        "abs" => {
            arity(name, &args, 1, 1)?;
            match &args[0] {
                Value::Null => Ok(Value::Null),
                Value::Int(i) => Ok(i
                    .checked_abs()
                    .map_or(Value::Float((*i as f64).abs()), Value::Int)),
                Value::Float(f) => Ok(Value::Float(f.abs())),
                other => Err(not_numeric(name, other)),
            }
        }
        "round" => {
            arity(name, &args, 1, 2)?;
            let digits = match args.get(1) {
                None => 0,
                Some(Value::Int(d)) => i32::try_from(*d).map_err(|_| {
                    ScriptError::InvalidArgument(format!("round() digits out of range: {}", d))
                })?,
                Some(Value::Null) => return Ok(Value::Null),
                Some(other) => return Err(not_numeric(name, other)),
            };
            match &args[0] {
                Value::Null => Ok(Value::Null),
                Value::Int(i) => Ok(Value::Int(*i)),
                Value::Float(f) => {
                    let factor = 10f64.powi(digits);
                    let scaled = f * factor;
                    // Past f64 precision in either direction.
                    let rounded = if factor == 0.0 {
                        0.0
                    } else if !scaled.is_finite() {
                        *f
                    } else {
                        scaled.round() / factor
                    };
                    Ok(Value::Float(rounded))
                }
                other => Err(not_numeric(name, other)),
            }
        }
        "ceil" | "ceiling" | "floor" => {
            arity(name, &args, 1, 1)?;
            match &args[0] {
                Value::Null => Ok(Value::Null),
                Value::Int(i) => Ok(Value::Int(*i)),
                Value::Float(f) if name == "floor" => Ok(Value::Float(f.floor())),
                Value::Float(f) => Ok(Value::Float(f.ceil())),
                other => Err(not_numeric(name, other)),
            }
        }
        "coalesce" => {
            arity(name, &args, 1, usize::MAX)?;
            Ok(args.into_iter().find(|v| !v.is_null()).unwrap_or(Value::Null))
        }
        "nullif" => {
            arity(name, &args, 2, 2)?;
            let (a, b) = (&args[0], &args[1]);
            if !a.is_null() && !b.is_null() && compare_values(a, b)? == Ordering::Equal {
                Ok(Value::Null)
            } else {
                Ok(a.clone())
            }
        }
        _ => Err(ScriptError::UnknownFunction(name.to_string())),
    }
}

fn arity(name: &str, args: &[Value], min: usize, max: usize) -> ScriptResult<()> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            min.to_string()
        } else if max == usize::MAX {
            format!("at least {}", min)
        } else {
            format!("{} to {}", min, max)
        };
        return Err(ScriptError::InvalidArgument(format!(
            "{}() takes {} arguments, got {}",
            name,
            expected,
            args.len()
        )));
    }
    Ok(())
}

fn text_map(v: &Value, f: impl Fn(&str) -> String) -> ScriptResult<Value> {
    Ok(v.to_text().map_or(Value::Null, |s| Value::Text(f(&s))))
}

fn not_numeric(name: &str, v: &Value) -> ScriptError {
    ScriptError::TypeMismatch(format!("{}() needs a number, got {}", name, type_name(v)))
}

/// 1-based `substring(s, start [, len])`. A start before 1 eats into the
/// length.
fn substring(args: &[Value]) -> ScriptResult<Value> {
    if args.iter().any(Value::is_null) {
        return Ok(Value::Null);
    }
    let s = args[0].to_text().unwrap_or_default();
    let start = args[1]
        .to_i64()
        .ok_or_else(|| not_numeric("substring", &args[1]))?;
    let end = match args.get(2) {
        Some(len) => {
            let len = len.to_i64().ok_or_else(|| not_numeric("substring", len))?;
            if len < 0 {
                return Err(ScriptError::InvalidArgument(
                    "negative substring length".to_string(),
                ));
            }
            Some(start.saturating_add(len))
        }
        None => None,
    };

    let begin = start.max(1);
    let skip = usize::try_from(begin - 1).unwrap_or(usize::MAX);
    let out: String = match end {
        Some(end) if end <= begin => String::new(),
        Some(end) => {
            let take = usize::try_from(end - begin).unwrap_or(usize::MAX);
            s.chars().skip(skip).take(take).collect()
        }
        None => s.chars().skip(skip).collect(),
    };
    Ok(Value::Text(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: Vec<Value>) -> Value {
        call_scalar(name, args).unwrap()
    }

    #[test]
    fn test_text_functions() {
        assert_eq!(call("upper", vec![Value::text("ab")]), Value::text("AB"));
        assert_eq!(call("length", vec![Value::text("héllo")]), Value::Int(5));
        assert_eq!(call("trim", vec![Value::text("  x ")]), Value::text("x"));
        assert_eq!(
            call("concat", vec![Value::text("a"), Value::Null, Value::Int(1)]),
            Value::text("a1")
        );
        assert_eq!(
            call("replace", vec![Value::text("a-b-c"), Value::text("-"), Value::text("+")]),
            Value::text("a+b+c")
        );
        assert_eq!(call("upper", vec![Value::Null]), Value::Null);
    }

    #[test]
    fn test_substring() {
        let s = Value::text("London");
        assert_eq!(call("substr", vec![s.clone(), Value::Int(2), Value::Int(3)]), Value::text("ond"));
        assert_eq!(call("substr", vec![s.clone(), Value::Int(4)]), Value::text("don"));
        assert_eq!(call("substr", vec![s.clone(), Value::Int(0), Value::Int(2)]), Value::text("L"));
        assert_eq!(call("substr", vec![s, Value::Int(10)]), Value::text(""));
    }

    #[test]
    fn test_numeric_functions() {
        assert_eq!(call("abs", vec![Value::Int(-3)]), Value::Int(3));
        assert_eq!(call("round", vec![Value::Float(2.345), Value::Int(1)]), Value::Float(2.3));
        assert_eq!(call("round", vec![Value::Float(2.5)]), Value::Float(3.0));
        assert_eq!(call("round", vec![Value::Float(1.5), Value::Int(400)]), Value::Float(1.5));
        assert_eq!(call("round", vec![Value::Float(1.5), Value::Int(-400)]), Value::Float(0.0));
        assert_eq!(
            call("round", vec![Value::Float(1e300), Value::Int(100)]),
            Value::Float(1e300)
        );
        assert_eq!(call("floor", vec![Value::Float(-1.5)]), Value::Float(-2.0));
        assert_eq!(call("ceil", vec![Value::Float(1.1)]), Value::Float(2.0));
    }

    #[test]
    fn test_null_handling() {
        assert_eq!(call("coalesce", vec![Value::Null, Value::Int(2)]), Value::Int(2));
        assert_eq!(call("nullif", vec![Value::Int(1), Value::Int(1)]), Value::Null);
        assert_eq!(call("nullif", vec![Value::Int(1), Value::Int(2)]), Value::Int(1));
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            call_scalar("nope", vec![]),
            Err(ScriptError::UnknownFunction(_))
        ));
        assert!(matches!(
            call_scalar("upper", vec![]),
            Err(ScriptError::InvalidArgument(_))
        ));
        assert!(matches!(
            call_scalar("abs", vec![Value::text("x")]),
            Err(ScriptError::TypeMismatch(_))
        ));
    }
}
