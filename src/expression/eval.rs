use crate::domain::context::Context;
use crate::expression::display::to_display_string;
use crate::expression::parser::{BinaryOp, Builtin, Expr, Root, UnaryOp};
use crate::expression::EvalError;
use serde_json::{Map, Number, Value};
use std::borrow::Cow;
use std::cmp::Ordering;

type Eval<'c> = Result<Cow<'c, Value>, EvalError>;

pub fn evaluate(expr: &Expr, ctx: &Context) -> Result<Value, EvalError> {
    eval(expr, ctx).map(Cow::into_owned)
}

fn eval<'c>(expr: &Expr, ctx: &'c Context) -> Eval<'c> {
    match expr {
        Expr::Literal(value) => Ok(Cow::Owned(value.clone())),
        Expr::Root(Root::Input) => Ok(Cow::Borrowed(ctx.input())),
        Expr::Root(Root::Env) => Ok(Cow::Borrowed(ctx.env().as_value())),
        Expr::Array(items) => items
            .iter()
            .map(|item| evaluate(item, ctx))
            .collect::<Result<Vec<_>, _>>()
            .map(|items| Cow::Owned(Value::Array(items))),
        Expr::Map(entries) => {
            let mut map = Map::new();
            for (key, value) in entries {
                map.insert(key.clone(), evaluate(value, ctx)?);
            }
            Ok(Cow::Owned(Value::Object(map)))
        }
        Expr::Member {
            target,
            key,
            optional,
        } => {
            let base = eval(target, ctx)?;
            fetch(base, key, *optional, missing_for(target))
        }
        Expr::Index {
            target,
            index,
            optional,
        } => {
            let base = eval(target, ctx)?;
            let index = eval(index, ctx)?;
            match index.as_ref() {
                Value::String(key) => fetch(base, key, *optional, missing_for(target)),
                Value::Number(number) => element(base, number, *optional),
                other => Err(EvalError::TypeMismatch {
                    operation: "index".to_string(),
                    expected: "string or integer",
                    found: type_name(other),
                }),
            }
        }
        Expr::Unary { op, operand } => {
            let value = eval(operand, ctx)?;
            match (op, value.as_ref()) {
                (UnaryOp::Not, Value::Bool(flag)) => Ok(Cow::Owned(Value::Bool(!flag))),
                (UnaryOp::Neg, Value::Number(number)) => {
                    let negated = match number.as_i64().and_then(i64::checked_neg) {
                        Some(int) => Value::Number(int.into()),
                        None => float_value(-as_f64(number))?,
                    };
                    Ok(Cow::Owned(negated))
                }
                (UnaryOp::Not, other) => Err(EvalError::TypeMismatch {
                    operation: "!".to_string(),
                    expected: "bool",
                    found: type_name(other),
                }),
                (UnaryOp::Neg, other) => Err(EvalError::TypeMismatch {
                    operation: "-".to_string(),
                    expected: "number",
                    found: type_name(other),
                }),
            }
        }
        Expr::Binary { op, lhs, rhs } => binary(*op, lhs, rhs, ctx),
        Expr::Conditional {
            cond,
            then,
            otherwise,
        } => match eval(cond, ctx)?.as_ref() {
            Value::Bool(true) => eval(then, ctx),
            Value::Bool(false) => eval(otherwise, ctx),
            other => Err(EvalError::TypeMismatch {
                operation: "?:".to_string(),
                expected: "bool",
                found: type_name(other),
            }),
        },
        Expr::Call { func, arg } => {
            let arg = eval(arg, ctx)?;
            call(*func, arg.as_ref()).map(Cow::Owned)
        }
    }
}

/// Missing keys of `env` read as empty strings; everything else reads as nil.
fn missing_for(target: &Expr) -> Value {
    match target {
        Expr::Root(Root::Env) => Value::String(String::new()),
        _ => Value::Null,
    }
}

fn fetch<'c>(base: Cow<'c, Value>, key: &str, optional: bool, missing: Value) -> Eval<'c> {
    match base {
        Cow::Borrowed(Value::Object(map)) => {
            Ok(map.get(key).map_or(Cow::Owned(missing), Cow::Borrowed))
        }
        Cow::Owned(Value::Object(mut map)) => {
            Ok(Cow::Owned(map.remove(key).unwrap_or(missing)))
        }
        base if base.is_null() && optional => Ok(Cow::Owned(Value::Null)),
        base => Err(EvalError::CannotFetch {
            key: key.to_string(),
            from: type_name(&base),
        }),
    }
}

fn element<'c>(base: Cow<'c, Value>, number: &Number, optional: bool) -> Eval<'c> {
    if base.is_null() && optional {
        return Ok(Cow::Owned(Value::Null));
    }
    let Some(index) = number.as_i64() else {
        return Err(EvalError::TypeMismatch {
            operation: "index".to_string(),
            expected: "integer",
            found: "float",
        });
    };

    let len = match base.as_ref() {
        Value::Array(items) => items.len(),
        Value::String(text) => text.chars().count(),
        other => {
            return Err(EvalError::CannotFetch {
                key: index.to_string(),
                from: type_name(other),
            });
        }
    };
    let position = if index < 0 { index + len as i64 } else { index };
    if position < 0 || position >= len as i64 {
        return Err(EvalError::IndexOutOfRange { index, len });
    }
    let position = position as usize;

    match base {
        Cow::Borrowed(Value::Array(items)) => Ok(Cow::Borrowed(&items[position])),
        Cow::Owned(Value::Array(mut items)) => Ok(Cow::Owned(items.swap_remove(position))),
        base => {
            let ch = base
                .as_str()
                .and_then(|text| text.chars().nth(position))
                .map(String::from)
                .unwrap_or_default();
            Ok(Cow::Owned(Value::String(ch)))
        }
    }
}

fn binary<'c>(op: BinaryOp, lhs: &Expr, rhs: &Expr, ctx: &'c Context) -> Eval<'c> {
    match op {
        BinaryOp::Coalesce => {
            let left = eval(lhs, ctx)?;
            if left.is_null() {
                eval(rhs, ctx)
            } else {
                Ok(left)
            }
        }
        BinaryOp::And | BinaryOp::Or => {
            let left = expect_bool(op, eval(lhs, ctx)?.as_ref())?;
            let short_circuit = matches!((op, left), (BinaryOp::And, false) | (BinaryOp::Or, true));
            if short_circuit {
                return Ok(Cow::Owned(Value::Bool(left)));
            }
            let right = expect_bool(op, eval(rhs, ctx)?.as_ref())?;
            Ok(Cow::Owned(Value::Bool(right)))
        }
        _ => {
            let left = eval(lhs, ctx)?;
            let right = eval(rhs, ctx)?;
            apply(op, left.as_ref(), right.as_ref()).map(Cow::Owned)
        }
    }
}

fn apply(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    match op {
        BinaryOp::Eq => Ok(Value::Bool(values_equal(left, right))),
        BinaryOp::Ne => Ok(Value::Bool(!values_equal(left, right))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = compare(left, right).ok_or_else(|| invalid(op, left, right))?;
            let result = match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Le => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            };
            Ok(Value::Bool(result))
        }
        BinaryOp::In => match right {
            Value::Array(items) => Ok(Value::Bool(items.iter().any(|item| values_equal(item, left)))),
            Value::Object(map) => match left {
                Value::String(key) => Ok(Value::Bool(map.contains_key(key))),
                _ => Err(invalid(op, left, right)),
            },
            _ => Err(invalid(op, left, right)),
        },
        BinaryOp::Add => match (left, right) {
            (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
            (Value::Array(a), Value::Array(b)) => {
                Ok(Value::Array(a.iter().chain(b.iter()).cloned().collect()))
            }
            (Value::Number(a), Value::Number(b)) => {
                arithmetic(a, b, i64::checked_add, |x, y| x + y)
            }
            _ => Err(invalid(op, left, right)),
        },
        BinaryOp::Sub | BinaryOp::Mul => {
            let (Value::Number(a), Value::Number(b)) = (left, right) else {
                return Err(invalid(op, left, right));
            };
            if op == BinaryOp::Sub {
                arithmetic(a, b, i64::checked_sub, |x, y| x - y)
            } else {
                arithmetic(a, b, i64::checked_mul, |x, y| x * y)
            }
        }
        BinaryOp::Div => {
            let (Value::Number(a), Value::Number(b)) = (left, right) else {
                return Err(invalid(op, left, right));
            };
            let divisor = as_f64(b);
            if divisor == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            float_value(as_f64(a) / divisor)
        }
        BinaryOp::Mod => {
            let (Some(a), Some(b)) = (integer(left), integer(right)) else {
                return Err(invalid(op, left, right));
            };
            if b == 0 {
                return Err(EvalError::DivisionByZero);
            }
            Ok(Value::Number(a.wrapping_rem(b).into()))
        }
        BinaryOp::Coalesce | BinaryOp::And | BinaryOp::Or => Err(invalid(op, left, right)),
    }
}

fn arithmetic(
    a: &Number,
    b: &Number,
    exact: fn(i64, i64) -> Option<i64>,
    approx: fn(f64, f64) -> f64,
) -> Result<Value, EvalError> {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        if let Some(result) = exact(x, y) {
            return Ok(Value::Number(result.into()));
        }
    }
    float_value(approx(as_f64(a), as_f64(b)))
}

fn call(func: Builtin, arg: &Value) -> Result<Value, EvalError> {
    let mismatch = |expected: &'static str| EvalError::TypeMismatch {
        operation: format!("{}()", func.name()),
        expected,
        found: type_name(arg),
    };

    match func {
        Builtin::Len => match arg {
            Value::String(text) => Ok(Value::from(text.chars().count())),
            Value::Array(items) => Ok(Value::from(items.len())),
            Value::Object(map) => Ok(Value::from(map.len())),
            _ => Err(mismatch("string, array or map")),
        },
        Builtin::Upper => arg
            .as_str()
            .map(|text| Value::String(text.to_uppercase()))
            .ok_or_else(|| mismatch("string")),
        Builtin::Lower => arg
            .as_str()
            .map(|text| Value::String(text.to_lowercase()))
            .ok_or_else(|| mismatch("string")),
        Builtin::Trim => arg
            .as_str()
            .map(|text| Value::String(text.trim().to_string()))
            .ok_or_else(|| mismatch("string")),
        Builtin::String => Ok(Value::String(to_display_string(arg))),
        Builtin::Int => match arg {
            Value::Number(number) => match number.as_i64() {
                Some(int) => Ok(Value::from(int)),
                None => Ok(Value::from(as_f64(number).trunc() as i64)),
            },
            Value::String(text) => {
                let trimmed = text.trim();
                trimmed
                    .parse::<i64>()
                    .or_else(|_| trimmed.parse::<f64>().map(|f| f.trunc() as i64))
                    .map(Value::from)
                    .map_err(|_| EvalError::InvalidArgument {
                        function: func.name(),
                        message: format!("cannot parse {text:?} as int"),
                    })
            }
            _ => Err(mismatch("number or string")),
        },
        Builtin::Float => match arg {
            Value::Number(number) => float_value(as_f64(number)),
            Value::String(text) => text
                .trim()
                .parse::<f64>()
                .map_err(|_| EvalError::InvalidArgument {
                    function: func.name(),
                    message: format!("cannot parse {text:?} as float"),
                })
                .and_then(float_value),
            _ => Err(mismatch("number or string")),
        },
        Builtin::ToJson => serde_json::to_string(arg)
            .map(Value::String)
            .map_err(|e| EvalError::InvalidArgument {
                function: func.name(),
                message: e.to_string(),
            }),
        Builtin::FromJson => {
            let text = arg.as_str().ok_or_else(|| mismatch("string"))?;
            serde_json::from_str(text).map_err(|e| EvalError::InvalidArgument {
                function: func.name(),
                message: e.to_string(),
            })
        }
        Builtin::Keys => {
            let map = arg.as_object().ok_or_else(|| mismatch("map"))?;
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            Ok(Value::Array(
                keys.into_iter().map(|key| Value::String(key.clone())).collect(),
            ))
        }
        Builtin::Values => {
            let map = arg.as_object().ok_or_else(|| mismatch("map"))?;
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Ok(Value::Array(
                entries.into_iter().map(|(_, value)| value.clone()).collect(),
            ))
        }
    }
}

fn expect_bool(op: BinaryOp, value: &Value) -> Result<bool, EvalError> {
    value.as_bool().ok_or_else(|| EvalError::TypeMismatch {
        operation: op.symbol().to_string(),
        expected: "bool",
        found: type_name(value),
    })
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => as_f64(x) == as_f64(y),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(key, x)| ys.get(key).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => as_f64(x).partial_cmp(&as_f64(y)),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn integer(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
            .map(|f| f as i64)
    })
}

fn as_f64(number: &Number) -> f64 {
    number.as_f64().unwrap_or(f64::NAN)
}

/// Integral floats come back as JSON integers so `{n: input.n + 1}` encodes
/// `124`, not `124.0`.
fn float_value(value: f64) -> Result<Value, EvalError> {
    const SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;
    if value.fract() == 0.0 && value.abs() < SAFE_INTEGER {
        return Ok(Value::Number((value as i64).into()));
    }
    Number::from_f64(value)
        .map(Value::Number)
        .ok_or(EvalError::NonFiniteNumber)
}

fn invalid(op: BinaryOp, left: &Value, right: &Value) -> EvalError {
    EvalError::InvalidOperation {
        op: op.symbol(),
        lhs: type_name(left),
        rhs: type_name(right),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "nil",
        Value::Bool(_) => "bool",
        Value::Number(number) if number.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "map",
    }
}
