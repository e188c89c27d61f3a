//! Condition expression evaluator

use super::ast::{ArithOp, CompareOp, Expression, Literal};
use crate::error::ConditionError;
use crate::policy::record::Record;
use serde_json::{Number, Value};

/// Evaluate a condition expression against a record
///
/// Fails when the expression reads a field the record does not carry, or when
/// the record's values have types the operators cannot accept.
pub fn evaluate(expr: &Expression, record: &Record) -> Result<Value, ConditionError> {
    match expr {
        Expression::Literal(lit) => literal_value(lit),
        Expression::Field(name) => lookup(record, name).cloned(),
        Expression::List(items) => items
            .iter()
            .map(|item| evaluate(item, record))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Expression::Not(inner) => Ok(Value::Bool(!as_bool("not", &evaluate(inner, record)?)?)),
        Expression::Negate(inner) => {
            let n = as_number("-", &evaluate(inner, record)?)?;
            number(-n)
        }
        Expression::And(left, right) => {
            if !as_bool("and", &evaluate(left, record)?)? {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(as_bool("and", &evaluate(right, record)?)?))
        }
        Expression::Or(left, right) => {
            if as_bool("or", &evaluate(left, record)?)? {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(as_bool("or", &evaluate(right, record)?)?))
        }
        Expression::Compare { left, op, right } => {
            let left = evaluate(left, record)?;
            let right = evaluate(right, record)?;
            evaluate_compare(&left, *op, &right).map(Value::Bool)
        }
        Expression::Arithmetic { left, op, right } => {
            let left = evaluate(left, record)?;
            let right = evaluate(right, record)?;
            evaluate_arithmetic(&left, *op, &right)
        }
    }
}

fn literal_value(lit: &Literal) -> Result<Value, ConditionError> {
    Ok(match lit {
        Literal::String(s) => Value::String(s.clone()),
        Literal::Number(n) => number(*n)?,
        Literal::Boolean(b) => Value::Bool(*b),
        Literal::Null => Value::Null,
    })
}

/// JSON has no infinities or NaN
fn number(n: f64) -> Result<Value, ConditionError> {
    Number::from_f64(n)
        .map(Value::Number)
        .ok_or(ConditionError::NonFinite)
}

/// Get a field, walking dotted paths through nested objects when the full
/// name is not a top-level key
fn lookup<'a>(record: &'a Record, name: &str) -> Result<&'a Value, ConditionError> {
    let missing = || ConditionError::MissingField {
        name: name.to_string(),
    };

    if let Some(value) = record.get(name) {
        return Ok(value);
    }

    let mut parts = name.split('.');
    let first = parts.next().ok_or_else(missing)?;
    let mut current = record.get(first).ok_or_else(missing)?;
    for part in parts {
        current = current.get(part).ok_or_else(missing)?;
    }
    Ok(current)
}

fn as_bool(op: &str, value: &Value) -> Result<bool, ConditionError> {
    value.as_bool().ok_or_else(|| {
        ConditionError::type_mismatch(format!("'{}' expects a boolean, found {}", op, value))
    })
}

fn as_number(op: &str, value: &Value) -> Result<f64, ConditionError> {
    value.as_f64().ok_or_else(|| {
        ConditionError::type_mismatch(format!("'{}' expects a number, found {}", op, value))
    })
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => a == b,
        _ => false,
    }
}

fn evaluate_compare(left: &Value, op: CompareOp, right: &Value) -> Result<bool, ConditionError> {
    match op {
        CompareOp::Eq => Ok(values_equal(left, right)),
        CompareOp::NotEq => Ok(!values_equal(left, right)),
        CompareOp::Gt => compare_ordered(left, op, right, |o| o.is_gt()),
        CompareOp::Gte => compare_ordered(left, op, right, |o| o.is_ge()),
        CompareOp::Lt => compare_ordered(left, op, right, |o| o.is_lt()),
        CompareOp::Lte => compare_ordered(left, op, right, |o| o.is_le()),
        CompareOp::In => check_contains(right, left, op),
        CompareOp::NotIn => check_contains(right, left, op).map(|found| !found),
        CompareOp::Contains => check_contains(left, right, op),
    }
}

fn compare_ordered<F>(
    left: &Value,
    op: CompareOp,
    right: &Value,
    accept: F,
) -> Result<bool, ConditionError>
where
    F: Fn(std::cmp::Ordering) -> bool,
{
    let ordering = match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    };

    ordering.map(accept).ok_or_else(|| {
        ConditionError::type_mismatch(format!("invalid operation: {} {} {}", left, op, right))
    })
}

/// Does `haystack` contain `needle`? Strings check substrings, lists check
/// membership.
fn check_contains(haystack: &Value, needle: &Value, op: CompareOp) -> Result<bool, ConditionError> {
    match (haystack, needle) {
        (Value::String(s), Value::String(sub)) => Ok(s.contains(sub.as_str())),
        (Value::Array(items), needle) => Ok(items.iter().any(|v| values_equal(v, needle))),
        _ => Err(ConditionError::type_mismatch(format!(
            "invalid operation: {} {} {}",
            haystack, op, needle
        ))),
    }
}

fn evaluate_arithmetic(left: &Value, op: ArithOp, right: &Value) -> Result<Value, ConditionError> {
    if let (ArithOp::Add, Value::String(a), Value::String(b)) = (op, left, right) {
        return Ok(Value::String(format!("{}{}", a, b)));
    }

    let symbol = op.to_string();
    let a = as_number(&symbol, left)?;
    let b = as_number(&symbol, right)?;

    let result = match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div | ArithOp::Rem if b == 0.0 => return Err(ConditionError::DivisionByZero),
        ArithOp::Div => a / b,
        ArithOp::Rem => a % b,
    };

    number(result)
}
