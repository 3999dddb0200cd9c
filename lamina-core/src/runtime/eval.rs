//! Expression evaluation
//!
//! Evaluation is lenient where lookups are concerned: undefined variables,
//! missing members, and out-of-range indexes all read as `Null`. Arithmetic
//! on unsuitable operands yields `Null` rather than failing; only zero
//! divisors, unknown filters, and failing filters raise errors.

use std::collections::BTreeMap;

use super::error::{RenderError, RenderErrorKind, RenderResult};
use super::scope::ScopeStack;
use crate::expr::ast::{BinaryOp, Expr, UnaryOp};
use crate::registry::FilterRegistry;
use crate::value::Value;

pub fn eval(expr: &Expr, scope: &ScopeStack<'_>, filters: &FilterRegistry) -> RenderResult<Value> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Var(name) => Ok(scope.get(name)),
        Expr::Member { object, field } => {
            let object = eval(object, scope, filters)?;
            Ok(object.get_member(field).cloned().unwrap_or(Value::Null))
        }
        Expr::Index { object, index } => {
            let object = eval(object, scope, filters)?;
            let index = eval(index, scope, filters)?;
            Ok(object.get_index(&index).cloned().unwrap_or(Value::Null))
        }
        Expr::Array(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(eval(item, scope, filters)?);
            }
            Ok(Value::Array(values))
        }
        Expr::Map(entries) => {
            let mut map = BTreeMap::new();
            for (key, value) in entries {
                map.insert(key.clone(), eval(value, scope, filters)?);
            }
            Ok(Value::Map(map))
        }
        Expr::Unary { op, operand } => {
            let operand = eval(operand, scope, filters)?;
            Ok(eval_unary(*op, &operand))
        }
        Expr::Binary { op, left, right } => eval_binary(*op, left, right, scope, filters),
        Expr::Ternary {
            cond,
            then,
            otherwise,
        } => {
            if eval(cond, scope, filters)?.is_truthy() {
                eval(then, scope, filters)
            } else {
                eval(otherwise, scope, filters)
            }
        }
        Expr::Pipe {
            input,
            filter,
            args,
        } => {
            let input = eval(input, scope, filters)?;
            let mut arg_values = Vec::with_capacity(args.len());
            for arg in args {
                arg_values.push(eval(arg, scope, filters)?);
            }
            match filters.lookup(filter) {
                Some(apply) => apply(&input, &arg_values).map_err(|err| {
                    RenderError::somewhere(RenderErrorKind::FilterFailed {
                        name: filter.clone(),
                        message: err.message,
                    })
                }),
                None => Err(RenderError::somewhere(RenderErrorKind::UnknownFilter {
                    name: filter.clone(),
                })),
            }
        }
    }
}

fn eval_unary(op: UnaryOp, operand: &Value) -> Value {
    match op {
        UnaryOp::Not => Value::Bool(!operand.is_truthy()),
        UnaryOp::Neg => match operand {
            Value::Int(i) => Value::Int(i.wrapping_neg()),
            Value::Float(f) => Value::Float(-f),
            _ => Value::Null,
        },
    }
}

fn eval_binary(
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    scope: &ScopeStack<'_>,
    filters: &FilterRegistry,
) -> RenderResult<Value> {
    // logic operators must not evaluate their right side eagerly
    match op {
        BinaryOp::And => {
            if !eval(left, scope, filters)?.is_truthy() {
                return Ok(Value::Bool(false));
            }
            return Ok(Value::Bool(eval(right, scope, filters)?.is_truthy()));
        }
        BinaryOp::Or => {
            if eval(left, scope, filters)?.is_truthy() {
                return Ok(Value::Bool(true));
            }
            return Ok(Value::Bool(eval(right, scope, filters)?.is_truthy()));
        }
        _ => {}
    }

    let left = eval(left, scope, filters)?;
    let right = eval(right, scope, filters)?;
    match op {
        BinaryOp::Add => Ok(add(&left, &right)),
        BinaryOp::Sub => Ok(numeric(&left, &right, |a, b| a.wrapping_sub(b), |a, b| a - b)),
        BinaryOp::Mul => Ok(numeric(&left, &right, |a, b| a.wrapping_mul(b), |a, b| a * b)),
        BinaryOp::Div => divide(&left, &right),
        BinaryOp::Rem => remainder(&left, &right),
        BinaryOp::Eq => Ok(Value::Bool(values_equal(&left, &right))),
        BinaryOp::Ne => Ok(Value::Bool(!values_equal(&left, &right))),
        BinaryOp::Lt => Ok(compare(&left, &right, |o| o.is_lt())),
        BinaryOp::Le => Ok(compare(&left, &right, |o| o.is_le())),
        BinaryOp::Gt => Ok(compare(&left, &right, |o| o.is_gt())),
        BinaryOp::Ge => Ok(compare(&left, &right, |o| o.is_ge())),
        BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
    }
}

/// `+` concatenates when either side is a string, otherwise adds.
fn add(left: &Value, right: &Value) -> Value {
    if matches!(left, Value::Str(_)) || matches!(right, Value::Str(_)) {
        let mut out = left.render_string();
        out.push_str(&right.render_string());
        return Value::Str(out);
    }
    numeric(left, right, |a, b| a.wrapping_add(b), |a, b| a + b)
}

/// Apply an arithmetic op, staying integral when both sides are integers.
/// Non-numeric operands yield `Null`.
fn numeric(
    left: &Value,
    right: &Value,
    int_op: impl Fn(i64, i64) -> i64,
    float_op: impl Fn(f64, f64) -> f64,
) -> Value {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Value::Int(int_op(*a, *b)),
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => Value::Float(float_op(a, b)),
            _ => Value::Null,
        },
    }
}

/// Integer division stays integral only when it is exact.
fn divide(left: &Value, right: &Value) -> RenderResult<Value> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => {
            if *b == 0 {
                return Err(RenderError::somewhere(RenderErrorKind::DivisionByZero));
            }
            if a % b == 0 {
                Ok(Value::Int(a / b))
            } else {
                Ok(Value::Float(*a as f64 / *b as f64))
            }
        }
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(_), Some(b)) if b == 0.0 => {
                Err(RenderError::somewhere(RenderErrorKind::DivisionByZero))
            }
            (Some(a), Some(b)) => Ok(Value::Float(a / b)),
            _ => Ok(Value::Null),
        },
    }
}

fn remainder(left: &Value, right: &Value) -> RenderResult<Value> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => {
            if *b == 0 {
                return Err(RenderError::somewhere(RenderErrorKind::DivisionByZero));
            }
            Ok(Value::Int(a.wrapping_rem(*b)))
        }
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(_), Some(b)) if b == 0.0 => {
                Err(RenderError::somewhere(RenderErrorKind::DivisionByZero))
            }
            (Some(a), Some(b)) => Ok(Value::Float(a % b)),
            _ => Ok(Value::Null),
        },
    }
}

/// Equality with numeric coercion: `1 == 1.0` holds. Everything else is
/// structural.
pub fn values_equal(left: &Value, right: &Value) -> bool {
    if left.is_number() && right.is_number() {
        return left.as_f64() == right.as_f64();
    }
    left == right
}

/// Ordering exists for number pairs and string pairs; every other pairing
/// compares false.
fn compare(left: &Value, right: &Value, pick: impl Fn(std::cmp::Ordering) -> bool) -> Value {
    let ordering = match (left, right) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => match (left.as_f64(), right.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
    };
    Value::Bool(ordering.map(pick).unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parser::ExprParser;

    fn eval_str(input: &str, data: &[(&str, Value)]) -> RenderResult<Value> {
        let globals = BTreeMap::new();
        let mut base = BTreeMap::new();
        for (name, value) in data {
            base.insert((*name).to_string(), value.clone());
        }
        let scope = ScopeStack::new(&globals, base);
        let filters = FilterRegistry::with_builtins();
        let expr = ExprParser::parse_expression(input, true).unwrap();
        eval(&expr, &scope, &filters)
    }

    fn ok(input: &str, data: &[(&str, Value)]) -> Value {
        eval_str(input, data).unwrap()
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(ok("1 + 2 * 3", &[]), Value::Int(7));
        assert_eq!(ok("10 - 4", &[]), Value::Int(6));
        assert_eq!(ok("2.5 + 1", &[]), Value::Float(3.5));
        assert_eq!(ok("7 % 3", &[]), Value::Int(1));
    }

    #[test]
    fn test_division_stays_exact_when_possible() {
        assert_eq!(ok("10 / 2", &[]), Value::Int(5));
        assert_eq!(ok("7 / 2", &[]), Value::Float(3.5));
        assert_eq!(ok("9.0 / 3", &[]), Value::Float(3.0));
    }

    #[test]
    fn test_division_by_zero() {
        let err = eval_str("1 / 0", &[]).unwrap_err();
        assert!(matches!(err.kind, RenderErrorKind::DivisionByZero));
        let err = eval_str("1 % 0", &[]).unwrap_err();
        assert!(matches!(err.kind, RenderErrorKind::DivisionByZero));
        let err = eval_str("1.0 / 0", &[]).unwrap_err();
        assert!(matches!(err.kind, RenderErrorKind::DivisionByZero));
    }

    #[test]
    fn test_plus_concatenates_with_strings() {
        assert_eq!(ok("'a' + 'b'", &[]), Value::from("ab"));
        assert_eq!(ok("'n=' + 3", &[]), Value::from("n=3"));
        assert_eq!(ok("1 + ' item'", &[]), Value::from("1 item"));
    }

    #[test]
    fn test_arithmetic_on_non_numbers_yields_null() {
        assert_eq!(ok("true - 1", &[]), Value::Null);
        assert_eq!(ok("-'x'", &[]), Value::Null);
        assert_eq!(ok("null * 2", &[]), Value::Null);
    }

    #[test]
    fn test_equality_coerces_numbers() {
        assert_eq!(ok("1 == 1.0", &[]), Value::Bool(true));
        assert_eq!(ok("1 != 2", &[]), Value::Bool(true));
        assert_eq!(ok("'a' == 'a'", &[]), Value::Bool(true));
        assert_eq!(ok("'1' == 1", &[]), Value::Bool(false));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(ok("1 < 2", &[]), Value::Bool(true));
        assert_eq!(ok("2 <= 2", &[]), Value::Bool(true));
        assert_eq!(ok("'apple' < 'banana'", &[]), Value::Bool(true));
        // unlike pairings are never ordered
        assert_eq!(ok("'a' < 1", &[]), Value::Bool(false));
    }

    #[test]
    fn test_logic_short_circuits() {
        // the divisions would error if evaluated
        assert_eq!(ok("false && 1 / 0", &[]), Value::Bool(false));
        assert_eq!(ok("true || 1 / 0", &[]), Value::Bool(true));
        assert_eq!(ok("true && 2", &[]), Value::Bool(true));
    }

    #[test]
    fn test_ternary_is_lazy() {
        assert_eq!(ok("true ? 1 : 1 / 0", &[]), Value::Int(1));
        assert_eq!(ok("false ? 1 / 0 : 2", &[]), Value::Int(2));
    }

    #[test]
    fn test_undefined_and_missing_lookups_read_null() {
        assert_eq!(ok("missing", &[]), Value::Null);
        assert_eq!(ok("missing.field", &[]), Value::Null);
        assert_eq!(ok("missing[0]", &[]), Value::Null);

        let user: Value = serde_json::from_str(r#"{"name": "alice"}"#).unwrap();
        assert_eq!(
            ok("user.name", &[("user", user.clone())]),
            Value::from("alice")
        );
        assert_eq!(ok("user.age", &[("user", user)]), Value::Null);
    }

    #[test]
    fn test_array_and_map_literals() {
        assert_eq!(
            ok("[1, 2][1]", &[]),
            Value::Int(2)
        );
        assert_eq!(ok("{a: 1, b: 2}.b", &[]), Value::Int(2));
    }

    #[test]
    fn test_negation_and_not() {
        assert_eq!(ok("-3", &[]), Value::Int(-3));
        assert_eq!(ok("!0", &[]), Value::Bool(true));
        assert_eq!(ok("!'text'", &[]), Value::Bool(false));
    }

    #[test]
    fn test_pipe_applies_filter() {
        assert_eq!(ok("'hi' | upper", &[]), Value::from("HI"));
        assert_eq!(ok("name | default('guest')", &[]), Value::from("guest"));
        assert_eq!(
            ok("name | default('guest')", &[("name", Value::from("kai"))]),
            Value::from("kai")
        );
    }

    #[test]
    fn test_unknown_filter_errors() {
        let err = eval_str("'x' | nope", &[]).unwrap_err();
        match err.kind {
            RenderErrorKind::UnknownFilter { name } => assert_eq!(name, "nope"),
            other => panic!("expected unknown filter, got {other:?}"),
        }
    }
}
