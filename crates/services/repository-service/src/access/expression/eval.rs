//! Tree-walking evaluator for access expressions.
//!
//! Evaluation has no side effects; the only reachable state is the
//! [`Context`] and the helper functions in [`super::functions`].

use std::cmp::Ordering;

use super::ast::{BinaryOp, Expr, Literal};
use super::functions;
use super::value::{Context, Value};
use super::{ExpressionError, MAX_EVAL_DEPTH};

pub fn evaluate(expr: &Expr, context: &Context) -> Result<Value, ExpressionError> {
    Evaluator { context }.eval(expr, 0)
}

struct Evaluator<'a> {
    context: &'a Context,
}

impl Evaluator<'_> {
    fn eval(&self, expr: &Expr, depth: usize) -> Result<Value, ExpressionError> {
        if depth > MAX_EVAL_DEPTH {
            return Err(ExpressionError::TooDeep(MAX_EVAL_DEPTH));
        }
        let depth = depth + 1;

        match expr {
            Expr::Literal(literal) => Ok(match literal {
                Literal::Null => Value::Null,
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Int(n) => Value::Int(*n),
                Literal::Str(s) => Value::Str(s.clone()),
            }),
            Expr::Variable(name) => self.context.variable(name).cloned().ok_or_else(|| {
                ExpressionError::evaluation(format!("unknown variable '{name}'"))
            }),
            Expr::List(items) => items
                .iter()
                .map(|item| self.eval(item, depth))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            Expr::Member(target, name) => member(self.eval(target, depth)?, name),
            Expr::Index(target, key) => {
                let target = self.eval(target, depth)?;
                let key = self.eval(key, depth)?;
                index(target, &key)
            }
            Expr::Call { function, args } => {
                let args = self.eval_all(args, depth)?;
                functions::call(function, &args)
            }
            Expr::MethodCall {
                target,
                method,
                args,
            } => {
                let target = self.eval(target, depth)?;
                let args = self.eval_all(args, depth)?;
                call_method(&target, method, &args)
            }
            Expr::Not(operand) => Ok(Value::Bool(!self.eval_bool(operand, depth)?)),
            Expr::Binary(BinaryOp::And, left, right) => {
                Ok(Value::Bool(
                    self.eval_bool(left, depth)? && self.eval_bool(right, depth)?,
                ))
            }
            Expr::Binary(BinaryOp::Or, left, right) => {
                Ok(Value::Bool(
                    self.eval_bool(left, depth)? || self.eval_bool(right, depth)?,
                ))
            }
            Expr::Binary(op, left, right) => {
                let left = self.eval(left, depth)?;
                let right = self.eval(right, depth)?;
                compare(*op, &left, &right)
            }
        }
    }

    fn eval_all(&self, exprs: &[Expr], depth: usize) -> Result<Vec<Value>, ExpressionError> {
        exprs.iter().map(|expr| self.eval(expr, depth)).collect()
    }

    fn eval_bool(&self, expr: &Expr, depth: usize) -> Result<bool, ExpressionError> {
        match self.eval(expr, depth)? {
            Value::Bool(b) => Ok(b),
            other => Err(ExpressionError::evaluation(format!(
                "expected a boolean operand, got {}",
                other.type_name()
            ))),
        }
    }
}

fn member(target: Value, name: &str) -> Result<Value, ExpressionError> {
    match target {
        Value::Map(mut map) => Ok(map.remove(name).unwrap_or(Value::Null)),
        Value::Null => Ok(Value::Null),
        other => Err(ExpressionError::evaluation(format!(
            "cannot read property '{name}' of {}",
            other.type_name()
        ))),
    }
}

fn index(target: Value, key: &Value) -> Result<Value, ExpressionError> {
    match (target, key) {
        (Value::Map(mut map), Value::Str(key)) => Ok(map.remove(key).unwrap_or(Value::Null)),
        (Value::List(mut items), Value::Int(i)) => Ok(usize::try_from(*i)
            .ok()
            .filter(|&i| i < items.len())
            .map(|i| items.swap_remove(i))
            .unwrap_or(Value::Null)),
        (Value::Null, _) => Ok(Value::Null),
        (target, key) => Err(ExpressionError::evaluation(format!(
            "cannot index {} with {}",
            target.type_name(),
            key.type_name()
        ))),
    }
}

fn contains(container: &Value, needle: &Value) -> Result<bool, ExpressionError> {
    match (container, needle) {
        (Value::List(items), _) => Ok(items.iter().any(|item| item.loosely_equals(needle))),
        (Value::Str(haystack), Value::Str(needle)) => Ok(haystack.contains(needle.as_str())),
        (Value::Map(map), Value::Str(key)) => Ok(map.contains_key(key)),
        (Value::Null, _) => Ok(false),
        (container, needle) => Err(ExpressionError::evaluation(format!(
            "cannot look for {} in {}",
            needle.type_name(),
            container.type_name()
        ))),
    }
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, ExpressionError> {
    let ordering = || {
        left.compare(right).ok_or_else(|| {
            ExpressionError::evaluation(format!(
                "cannot compare {} with {}",
                left.type_name(),
                right.type_name()
            ))
        })
    };

    let result = match op {
        BinaryOp::Eq => left.loosely_equals(right),
        BinaryOp::Ne => !left.loosely_equals(right),
        BinaryOp::Lt => ordering()? == Ordering::Less,
        BinaryOp::Le => ordering()? != Ordering::Greater,
        BinaryOp::Gt => ordering()? == Ordering::Greater,
        BinaryOp::Ge => ordering()? != Ordering::Less,
        BinaryOp::In => contains(right, left)?,
        BinaryOp::And | BinaryOp::Or => unreachable!("boolean operators short-circuit in eval"),
    };
    Ok(Value::Bool(result))
}

fn call_method(target: &Value, method: &str, args: &[Value]) -> Result<Value, ExpressionError> {
    let arity = |expected: usize| {
        if args.len() == expected {
            Ok(())
        } else {
            Err(ExpressionError::evaluation(format!(
                "{method} takes {expected} argument(s), got {}",
                args.len()
            )))
        }
    };

    match (method, target) {
        ("contains", _) => {
            arity(1)?;
            Ok(Value::Bool(contains(target, &args[0])?))
        }
        ("isEmpty", _) => {
            arity(0)?;
            let empty = match target {
                Value::Null => true,
                Value::Str(s) => s.is_empty(),
                Value::List(items) => items.is_empty(),
                Value::Map(map) => map.is_empty(),
                other => return Err(unsupported(method, other)),
            };
            Ok(Value::Bool(empty))
        }
        ("size", _) => {
            arity(0)?;
            let size = match target {
                Value::Null => 0,
                Value::Str(s) => s.chars().count(),
                Value::List(items) => items.len(),
                Value::Map(map) => map.len(),
                other => return Err(unsupported(method, other)),
            };
            Ok(Value::Int(size as i64))
        }
        ("startsWith" | "endsWith" | "equalsIgnoreCase", Value::Str(s)) => {
            arity(1)?;
            let Value::Str(arg) = &args[0] else {
                return Ok(Value::Bool(false));
            };
            Ok(Value::Bool(match method {
                "startsWith" => s.starts_with(arg.as_str()),
                "endsWith" => s.ends_with(arg.as_str()),
                _ => s.to_lowercase() == arg.to_lowercase(),
            }))
        }
        ("equals", _) => {
            arity(1)?;
            Ok(Value::Bool(target.loosely_equals(&args[0])))
        }
        ("toLowerCase", Value::Str(s)) => {
            arity(0)?;
            Ok(Value::Str(s.to_lowercase()))
        }
        ("toUpperCase", Value::Str(s)) => {
            arity(0)?;
            Ok(Value::Str(s.to_uppercase()))
        }
        ("trim", Value::Str(s)) => {
            arity(0)?;
            Ok(Value::Str(s.trim().to_string()))
        }
        (_, other) => Err(unsupported(method, other)),
    }
}

fn unsupported(method: &str, target: &Value) -> ExpressionError {
    ExpressionError::evaluation(format!(
        "method '{method}' is not available on {}",
        target.type_name()
    ))
}
