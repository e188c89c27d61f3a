// SPDX-License-Identifier: MIT

//! Compile-time type checking of condition expressions against a `TypeEnv`

use super::ast::{ArithOp, CompareOp, Expression, Literal};
use crate::error::ConditionError;
use crate::policy::record::{FieldType, TypeEnv};

/// Infer the result type of an expression, rejecting unknown names and
/// operand types that can never be valid.
///
/// `FieldType::Any` is compatible with everything; such operands are only
/// checked when the condition runs.
pub fn check(expr: &Expression, env: &TypeEnv) -> Result<FieldType, ConditionError> {
    match expr {
        Expression::Literal(lit) => Ok(literal_type(lit)),
        Expression::Field(name) => resolve_field(name, env),
        Expression::List(items) => {
            for item in items {
                check(item, env)?;
            }
            Ok(FieldType::List)
        }
        Expression::Not(inner) => {
            expect_boolean("not", check(inner, env)?)?;
            Ok(FieldType::Boolean)
        }
        Expression::Negate(inner) => {
            let t = check(inner, env)?;
            if !matches!(t, FieldType::Number | FieldType::Any) {
                return Err(ConditionError::type_mismatch(format!(
                    "cannot negate a {}",
                    t
                )));
            }
            Ok(FieldType::Number)
        }
        Expression::And(left, right) | Expression::Or(left, right) => {
            let op = if matches!(expr, Expression::And(..)) {
                "and"
            } else {
                "or"
            };
            expect_boolean(op, check(left, env)?)?;
            expect_boolean(op, check(right, env)?)?;
            Ok(FieldType::Boolean)
        }
        Expression::Compare { left, op, right } => {
            check_compare(check(left, env)?, *op, check(right, env)?)?;
            Ok(FieldType::Boolean)
        }
        Expression::Arithmetic { left, op, right } => {
            check_arithmetic(check(left, env)?, *op, check(right, env)?)
        }
    }
}

fn literal_type(lit: &Literal) -> FieldType {
    match lit {
        Literal::String(_) => FieldType::String,
        Literal::Number(_) => FieldType::Number,
        Literal::Boolean(_) => FieldType::Boolean,
        Literal::Null => FieldType::Any,
    }
}

/// Look up a field, falling back to its dotted prefix when the prefix is an
/// untyped (nested) value.
fn resolve_field(name: &str, env: &TypeEnv) -> Result<FieldType, ConditionError> {
    if let Some(t) = env.get(name) {
        return Ok(t);
    }

    let mut prefix = name;
    while let Some((head, _)) = prefix.rsplit_once('.') {
        if env.get(head) == Some(FieldType::Any) {
            return Ok(FieldType::Any);
        }
        prefix = head;
    }

    Err(ConditionError::UnknownName {
        name: name.to_string(),
    })
}

fn expect_boolean(op: &str, t: FieldType) -> Result<(), ConditionError> {
    match t {
        FieldType::Boolean | FieldType::Any => Ok(()),
        other => Err(ConditionError::type_mismatch(format!(
            "'{}' expects boolean operands, found {}",
            op, other
        ))),
    }
}

fn check_compare(left: FieldType, op: CompareOp, right: FieldType) -> Result<(), ConditionError> {
    use FieldType::*;

    let ok = match op {
        CompareOp::Eq | CompareOp::NotEq => left == right || left == Any || right == Any,
        CompareOp::Gt | CompareOp::Gte | CompareOp::Lt | CompareOp::Lte => matches!(
            (left, right),
            (Number, Number) | (String, String) | (Any, _) | (_, Any)
        ),
        CompareOp::In | CompareOp::NotIn => match right {
            List | Any => true,
            String => matches!(left, String | Any),
            _ => false,
        },
        CompareOp::Contains => match left {
            List | Any => true,
            String => matches!(right, String | Any),
            _ => false,
        },
    };

    if ok {
        Ok(())
    } else {
        Err(ConditionError::type_mismatch(format!(
            "invalid operation: {} {} {}",
            left, op, right
        )))
    }
}

fn check_arithmetic(
    left: FieldType,
    op: ArithOp,
    right: FieldType,
) -> Result<FieldType, ConditionError> {
    use FieldType::*;

    match (op, left, right) {
        (_, Number, Number) => Ok(Number),
        (ArithOp::Add, String, String) => Ok(String),
        (ArithOp::Add, Any, _) | (ArithOp::Add, _, Any) => Ok(Any),
        (_, Number | Any, Number | Any) => Ok(Number),
        _ => Err(ConditionError::type_mismatch(format!(
            "invalid operation: {} {} {}",
            left, op, right
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::condition::parse;

    fn env() -> TypeEnv {
        let mut env = TypeEnv::default();
        env.insert("age", FieldType::Number);
        env.insert("income", FieldType::Number);
        env.insert("country", FieldType::String);
        env.insert("risk_flag", FieldType::Boolean);
        env.insert("tags", FieldType::List);
        env.insert("meta", FieldType::Any);
        env
    }

    fn check_text(text: &str) -> Result<FieldType, ConditionError> {
        check(&parse(text).unwrap(), &env())
    }

    #[test]
    fn test_well_typed_conditions() {
        for text in [
            "age >= 18",
            "age >= 18 && income > 1000",
            "country == 'BR'",
            "country in ['BR', 'AR']",
            "country not in ['RU']",
            "'R' in country",
            "not risk_flag",
            "tags contains 'vip'",
            "country contains 'B'",
            "income / age > 100",
            "country < 'M'",
            "meta.score > 3",
            "meta == nil",
        ] {
            assert_eq!(check_text(text), Ok(FieldType::Boolean), "{}", text);
        }
    }

    #[test]
    fn test_arithmetic_result_types() {
        assert_eq!(check_text("age + 1"), Ok(FieldType::Number));
        assert_eq!(check_text("country + '!'"), Ok(FieldType::String));
        assert_eq!(check_text("meta + 1"), Ok(FieldType::Any));
        assert_eq!(check_text("meta * 2"), Ok(FieldType::Number));
    }

    #[test]
    fn test_unknown_name() {
        assert_eq!(
            check_text("agee >= 18"),
            Err(ConditionError::UnknownName {
                name: "agee".to_string()
            })
        );
        assert!(matches!(
            check_text("age.years > 1"),
            Err(ConditionError::UnknownName { .. })
        ));
    }

    #[test]
    fn test_type_mismatches() {
        for text in [
            "age == 'eighteen'",
            "age > 'x'",
            "country > 5",
            "not age",
            "age && risk_flag",
            "age in 5",
            "age in country",
            "age contains 1",
            "country - 1",
            "risk_flag * 2",
            "-country > 1",
        ] {
            assert!(
                matches!(check_text(text), Err(ConditionError::TypeMismatch(_))),
                "{}",
                text
            );
        }
    }

    #[test]
    fn test_non_boolean_conditions_still_compile() {
        assert_eq!(check_text("age"), Ok(FieldType::Number));
        assert_eq!(check_text("country"), Ok(FieldType::String));
    }
}
