//! Expression evaluation over the row cache.
//!
//! Evaluates [`Expr`] trees against an [`EvalContext`], producing a single
//! [`Value`]. Arithmetic promotes INT against FLOAT and checks integer
//! overflow; comparisons involving the NULL sentinel are FALSE (there is
//! no three-valued logic); arithmetic over NULL yields NULL.

use std::cmp::Ordering;

use crate::datum::Value;
use crate::sql::{BinaryOperator, Expr, UnaryOperator};
use crate::storage::Storage;

use super::context::EvalContext;
use super::error::ExecutorError;

/// Evaluates an expression against the current row bindings.
pub fn eval<S: Storage>(expr: &Expr, ctx: &EvalContext<'_, S>) -> Result<Value, ExecutorError> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),

        Expr::ColumnRef { table, column } => ctx.resolve_column(table.as_deref(), column),

        Expr::Binary { op, left, right } => match op {
            BinaryOperator::And => {
                if !as_bool(&eval(left, ctx)?)? {
                    return Ok(Value::Boolean(false));
                }
                Ok(Value::Boolean(as_bool(&eval(right, ctx)?)?))
            }
            BinaryOperator::Or => {
                if as_bool(&eval(left, ctx)?)? {
                    return Ok(Value::Boolean(true));
                }
                Ok(Value::Boolean(as_bool(&eval(right, ctx)?)?))
            }
            BinaryOperator::Eq
            | BinaryOperator::Ne
            | BinaryOperator::Lt
            | BinaryOperator::Le
            | BinaryOperator::Gt
            | BinaryOperator::Ge => {
                let l = eval(left, ctx)?;
                let r = eval(right, ctx)?;
                eval_comparison(*op, &l, &r)
            }
            BinaryOperator::Add
            | BinaryOperator::Sub
            | BinaryOperator::Mul
            | BinaryOperator::Div
            | BinaryOperator::Mod => {
                let l = eval(left, ctx)?;
                let r = eval(right, ctx)?;
                eval_arithmetic(*op, l, r)
            }
        },

        Expr::Unary { op, operand } => {
            let v = eval(operand, ctx)?;
            match op {
                UnaryOperator::Neg => match v {
                    Value::Int(n) => n
                        .checked_neg()
                        .map(Value::Int)
                        .ok_or(ExecutorError::IntegerOverflow),
                    Value::Float(x) => Ok(Value::Float(-x)),
                    Value::Null => Ok(Value::Null),
                    other => Err(ExecutorError::TypeMismatch {
                        expected: "a numeric value".to_string(),
                        found: other.type_name().to_string(),
                    }),
                },
                UnaryOperator::Not => Ok(Value::Boolean(!as_bool(&v)?)),
            }
        }

        Expr::Aggregate { .. } => Err(ExecutorError::MisplacedAggregate),
    }
}

/// Coerces a predicate result to a boolean; anything else is an error.
pub fn as_bool(v: &Value) -> Result<bool, ExecutorError> {
    match v {
        Value::Boolean(b) => Ok(*b),
        other => Err(ExecutorError::NotBoolean {
            found: other.type_name().to_string(),
        }),
    }
}

fn eval_comparison(
    op: BinaryOperator,
    l: &Value,
    r: &Value,
) -> Result<Value, ExecutorError> {
    // NULL compares FALSE under every operator, including <>.
    if l.is_null() || r.is_null() {
        return Ok(Value::Boolean(false));
    }
    let ord = l
        .try_compare(r)
        .ok_or_else(|| ExecutorError::TypeMismatch {
            expected: l.type_name().to_string(),
            found: r.type_name().to_string(),
        })?;
    let result = match op {
        BinaryOperator::Eq => ord == Ordering::Equal,
        BinaryOperator::Ne => ord != Ordering::Equal,
        BinaryOperator::Lt => ord == Ordering::Less,
        BinaryOperator::Le => ord != Ordering::Greater,
        BinaryOperator::Gt => ord == Ordering::Greater,
        BinaryOperator::Ge => ord != Ordering::Less,
        _ => unreachable!("not a comparison operator"),
    };
    Ok(Value::Boolean(result))
}

fn eval_arithmetic(op: BinaryOperator, l: Value, r: Value) -> Result<Value, ExecutorError> {
    match (l, r) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::Int(a), Value::Int(b)) => {
            let result = match op {
                BinaryOperator::Add => a.checked_add(b),
                BinaryOperator::Sub => a.checked_sub(b),
                BinaryOperator::Mul => a.checked_mul(b),
                BinaryOperator::Div => {
                    if b == 0 {
                        return Err(ExecutorError::DivisionByZero);
                    }
                    a.checked_div(b)
                }
                BinaryOperator::Mod => {
                    if b == 0 {
                        return Err(ExecutorError::DivisionByZero);
                    }
                    a.checked_rem(b)
                }
                _ => unreachable!("not an arithmetic operator"),
            };
            result.map(Value::Int).ok_or(ExecutorError::IntegerOverflow)
        }
        (l, r) => {
            let (a, b) = match (&l, &r) {
                (Value::Float(a), Value::Float(b)) => (*a, *b),
                (Value::Int(a), Value::Float(b)) => (*a as f32, *b),
                (Value::Float(a), Value::Int(b)) => (*a, *b as f32),
                _ => {
                    return Err(ExecutorError::TypeMismatch {
                        expected: "a numeric value".to_string(),
                        found: if l.type_of().is_some_and(|t| t.is_numeric()) {
                            r.type_name().to_string()
                        } else {
                            l.type_name().to_string()
                        },
                    });
                }
            };
            match op {
                BinaryOperator::Add => Ok(Value::Float(a + b)),
                BinaryOperator::Sub => Ok(Value::Float(a - b)),
                BinaryOperator::Mul => Ok(Value::Float(a * b)),
                BinaryOperator::Div => Ok(Value::Float(a / b)),
                BinaryOperator::Mod => Err(ExecutorError::TypeMismatch {
                    expected: "INT".to_string(),
                    found: "FLOAT".to_string(),
                }),
                _ => unreachable!("not an arithmetic operator"),
            }
        }
    }
}
