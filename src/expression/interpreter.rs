//! Tree-walking evaluation of parsed expressions over a JSON context.

use super::EvaluationContext;
use super::parser::{BinaryOp, Expr, UnaryOp};
use crate::error::{ExpressionError, ExpressionResult};
use serde_json::{Number, Value};
use std::cmp::Ordering;

/// Evaluate an expression tree against a context.
pub fn evaluate(expr: &Expr, context: &EvaluationContext) -> ExpressionResult<Value> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::List(items) => items
            .iter()
            .map(|item| evaluate(item, context))
            .collect::<ExpressionResult<Vec<_>>>()
            .map(Value::Array),
        Expr::Variable(name) => context
            .get(name)
            .cloned()
            .ok_or_else(|| ExpressionError::UnknownVariable { name: name.clone() }),
        Expr::Member(target, name) => member(evaluate(target, context)?, name),
        Expr::Index(target, index) => {
            let target = evaluate(target, context)?;
            let index = evaluate(index, context)?;
            index_into(target, &index)
        }
        Expr::Call(target, method, args) => {
            let target = evaluate(target, context)?;
            let args = args
                .iter()
                .map(|arg| evaluate(arg, context))
                .collect::<ExpressionResult<Vec<_>>>()?;
            call(&target, method, &args)
        }
        Expr::Unary(op, operand) => unary(*op, evaluate(operand, context)?),
        Expr::Binary(BinaryOp::And, lhs, rhs) => {
            if !as_bool(&evaluate(lhs, context)?, "&&")? {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(as_bool(&evaluate(rhs, context)?, "&&")?))
        }
        Expr::Binary(BinaryOp::Or, lhs, rhs) => {
            if as_bool(&evaluate(lhs, context)?, "||")? {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(as_bool(&evaluate(rhs, context)?, "||")?))
        }
        Expr::Binary(op, lhs, rhs) => {
            let lhs = evaluate(lhs, context)?;
            let rhs = evaluate(rhs, context)?;
            binary(*op, &lhs, &rhs)
        }
        Expr::Conditional(condition, then, otherwise) => {
            if as_bool(&evaluate(condition, context)?, "?:")? {
                evaluate(then, context)
            } else {
                evaluate(otherwise, context)
            }
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

fn as_bool(value: &Value, operation: &str) -> ExpressionResult<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Null => Err(ExpressionError::null_dereference(operation)),
        other => Err(ExpressionError::type_mismatch(
            operation,
            format!("expected boolean, got {}", type_name(other)),
        )),
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn float(value: f64, operation: &str) -> ExpressionResult<Value> {
    Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| ExpressionError::type_mismatch(operation, "result is not a finite number"))
}

fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn member(target: Value, name: &str) -> ExpressionResult<Value> {
    match target {
        Value::Object(mut map) => Ok(map.remove(name).unwrap_or(Value::Null)),
        Value::Null => Err(ExpressionError::null_dereference(format!(".{}", name))),
        other => Err(ExpressionError::type_mismatch(
            format!(".{}", name),
            format!("{} has no members", type_name(&other)),
        )),
    }
}

fn index_into(target: Value, index: &Value) -> ExpressionResult<Value> {
    match (target, index) {
        (Value::Object(mut map), key) => Ok(map.remove(&text(key)).unwrap_or(Value::Null)),
        (Value::Array(items), Value::Number(n)) => {
            let length = items.len();
            let position = n.as_i64().ok_or_else(|| {
                ExpressionError::type_mismatch("[]", "list index must be an integer")
            })?;
            usize::try_from(position)
                .ok()
                .and_then(|p| items.into_iter().nth(p))
                .ok_or(ExpressionError::IndexOutOfBounds {
                    index: position,
                    length,
                })
        }
        (Value::Null, _) => Err(ExpressionError::null_dereference("[]")),
        (other, index) => Err(ExpressionError::type_mismatch(
            "[]",
            format!("cannot index {} with {}", type_name(&other), type_name(index)),
        )),
    }
}

fn contains(container: &Value, item: &Value) -> ExpressionResult<bool> {
    match container {
        Value::Array(items) => Ok(items.iter().any(|v| loosely_equal(v, item))),
        Value::String(s) => Ok(s.contains(text(item).as_str())),
        Value::Object(map) => Ok(map.contains_key(&text(item))),
        Value::Null => Err(ExpressionError::null_dereference("contains")),
        other => Err(ExpressionError::type_mismatch(
            "contains",
            format!("{} is not a container", type_name(other)),
        )),
    }
}

fn expect_args(method: &str, args: &[Value], count: usize) -> ExpressionResult<()> {
    if args.len() == count {
        Ok(())
    } else {
        Err(ExpressionError::type_mismatch(
            format!("{}()", method),
            format!("expected {} arguments, got {}", count, args.len()),
        ))
    }
}

fn call(target: &Value, method: &str, args: &[Value]) -> ExpressionResult<Value> {
    if target.is_null() {
        return Err(ExpressionError::null_dereference(format!("{}()", method)));
    }
    let unknown = || ExpressionError::UnknownMethod {
        method: method.to_string(),
        target: type_name(target).to_string(),
    };
    match method {
        "size" | "length" => {
            expect_args(method, args, 0)?;
            let size = match target {
                Value::String(s) => s.chars().count(),
                Value::Array(items) => items.len(),
                Value::Object(map) => map.len(),
                _ => return Err(unknown()),
            };
            Ok(Value::Number(Number::from(size as u64)))
        }
        "isEmpty" => {
            expect_args(method, args, 0)?;
            match target {
                Value::String(s) => Ok(Value::Bool(s.is_empty())),
                Value::Array(items) => Ok(Value::Bool(items.is_empty())),
                Value::Object(map) => Ok(Value::Bool(map.is_empty())),
                _ => Err(unknown()),
            }
        }
        "contains" | "containsKey" => {
            expect_args(method, args, 1)?;
            Ok(Value::Bool(contains(target, &args[0])?))
        }
        "get" => {
            expect_args(method, args, 1)?;
            index_into(target.clone(), &args[0])
        }
        "startsWith" | "endsWith" => {
            expect_args(method, args, 1)?;
            let Value::String(s) = target else {
                return Err(unknown());
            };
            let affix = text(&args[0]);
            Ok(Value::Bool(if method == "startsWith" {
                s.starts_with(affix.as_str())
            } else {
                s.ends_with(affix.as_str())
            }))
        }
        "toUpperCase" | "toLowerCase" | "trim" => {
            expect_args(method, args, 0)?;
            let Value::String(s) = target else {
                return Err(unknown());
            };
            Ok(Value::String(match method {
                "toUpperCase" => s.to_uppercase(),
                "toLowerCase" => s.to_lowercase(),
                _ => s.trim().to_string(),
            }))
        }
        "toString" => {
            expect_args(method, args, 0)?;
            Ok(Value::String(text(target)))
        }
        _ => Err(unknown()),
    }
}

fn unary(op: UnaryOp, operand: Value) -> ExpressionResult<Value> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!as_bool(&operand, "!")?)),
        UnaryOp::Negate => match &operand {
            Value::Number(n) => match n.as_i64() {
                Some(i) => match i.checked_neg() {
                    Some(negated) => Ok(Value::Number(Number::from(negated))),
                    None => float(-(i as f64), "-"),
                },
                None => float(-n.as_f64().unwrap_or(0.0), "-"),
            },
            Value::Null => Err(ExpressionError::null_dereference("-")),
            other => Err(ExpressionError::type_mismatch(
                "-",
                format!("cannot negate {}", type_name(other)),
            )),
        },
    }
}

fn compare(op: BinaryOp, lhs: &Value, rhs: &Value) -> ExpressionResult<bool> {
    let ordering = match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .zip(b.as_f64())
            .and_then(|(a, b)| a.partial_cmp(&b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    };
    let ordering = ordering.ok_or_else(|| {
        ExpressionError::type_mismatch(
            format!("{:?}", op),
            format!("cannot compare {} with {}", type_name(lhs), type_name(rhs)),
        )
    })?;
    Ok(match op {
        BinaryOp::Lt => ordering == Ordering::Less,
        BinaryOp::Le => ordering != Ordering::Greater,
        BinaryOp::Gt => ordering == Ordering::Greater,
        _ => ordering != Ordering::Less,
    })
}

fn arithmetic(op: BinaryOp, lhs: &Value, rhs: &Value) -> ExpressionResult<Value> {
    let symbol = match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        _ => "%",
    };
    let (Value::Number(a), Value::Number(b)) = (lhs, rhs) else {
        return Err(ExpressionError::type_mismatch(
            symbol,
            format!("cannot apply to {} and {}", type_name(lhs), type_name(rhs)),
        ));
    };
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        let exact = match op {
            BinaryOp::Add => x.checked_add(y),
            BinaryOp::Sub => x.checked_sub(y),
            BinaryOp::Mul => x.checked_mul(y),
            BinaryOp::Div => {
                if y == 0 {
                    return Err(ExpressionError::DivisionByZero);
                }
                if x % y == 0 { x.checked_div(y) } else { None }
            }
            _ => {
                if y == 0 {
                    return Err(ExpressionError::DivisionByZero);
                }
                x.checked_rem(y)
            }
        };
        if let Some(result) = exact {
            return Ok(Value::Number(Number::from(result)));
        }
    }
    let x = a.as_f64().unwrap_or(0.0);
    let y = b.as_f64().unwrap_or(0.0);
    if matches!(op, BinaryOp::Div | BinaryOp::Rem) && y == 0.0 {
        return Err(ExpressionError::DivisionByZero);
    }
    let result = match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div => x / y,
        _ => x % y,
    };
    float(result, symbol)
}

fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> ExpressionResult<Value> {
    match op {
        BinaryOp::Eq => Ok(Value::Bool(loosely_equal(lhs, rhs))),
        BinaryOp::Ne => Ok(Value::Bool(!loosely_equal(lhs, rhs))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            Ok(Value::Bool(compare(op, lhs, rhs)?))
        }
        BinaryOp::Contains => Ok(Value::Bool(contains(lhs, rhs)?)),
        BinaryOp::Add if lhs.is_string() || rhs.is_string() => {
            Ok(Value::String(format!("{}{}", text(lhs), text(rhs))))
        }
        BinaryOp::Add if lhs.is_array() && rhs.is_array() => {
            let mut joined = lhs.as_array().cloned().unwrap_or_default();
            joined.extend(rhs.as_array().cloned().unwrap_or_default());
            Ok(Value::Array(joined))
        }
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            arithmetic(op, lhs, rhs)
        }
        BinaryOp::And | BinaryOp::Or => Ok(Value::Bool(
            as_bool(lhs, "logical operator")? && as_bool(rhs, "logical operator")?,
        )),
    }
}
