//! Sandboxed boolean expression language for repository access rules.
//!
//! An expression only sees three variables (`repository`, `groups`, `claims`)
//! and the helpers `toList`, `toLowerCaseList`, `isOneOf` and
//! `isOneOfIgnoreCase`. There is no assignment, no I/O and no way to reach
//! process state.
//!
//! ```text
//! isOneOf(claims['department'], 'ops', 'sre') and groups.contains('staff')
//! #toLowerCaseList(claims.roles).contains('mirror-reader')
//! ```

mod ast;
mod eval;
mod functions;
mod parser;
mod tokenizer;
mod value;

use thiserror::Error;

pub use ast::Expr;
pub use value::{Context, Value};

/// Maximum nesting of parentheses, negations and arguments.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Maximum depth of the syntax tree.
///
/// Chains such as `a or b or c ...` nest without extra parentheses, so the
/// tree may grow deeper than the parser's nesting limit. Such a chain holds
/// at most `MAX_EVAL_DEPTH + 1` operands.
pub const MAX_EVAL_DEPTH: usize = MAX_NESTING_DEPTH * 4;

/// Errors raised while parsing or evaluating an expression.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("parse error at offset {offset}: {message}")]
    Parse { offset: usize, message: String },

    #[error("expression nested deeper than {0} levels")]
    TooDeep(usize),

    #[error("evaluation error: {0}")]
    Evaluation(String),

    #[error("expression produced {0}, expected a boolean")]
    NotBoolean(&'static str),
}

impl ExpressionError {
    pub fn evaluation(msg: impl Into<String>) -> Self {
        ExpressionError::Evaluation(msg.into())
    }
}

/// Parse an expression and check that its tree fits [`MAX_EVAL_DEPTH`].
///
/// An expression that compiles is never rejected for depth at evaluation.
pub fn compile(source: &str) -> Result<Expr, ExpressionError> {
    let expr = parser::parse(source)?;
    if expr.deeper_than(MAX_EVAL_DEPTH) {
        return Err(ExpressionError::TooDeep(MAX_EVAL_DEPTH));
    }
    Ok(expr)
}

/// Evaluate a compiled expression; only a boolean result is accepted.
pub fn evaluate_expr(expr: &Expr, context: &Context) -> Result<bool, ExpressionError> {
    match eval::evaluate(expr, context)? {
        Value::Bool(result) => Ok(result),
        other => Err(ExpressionError::NotBoolean(other.type_name())),
    }
}

/// Compile and evaluate `source`.
pub fn evaluate(source: &str, context: &Context) -> Result<bool, ExpressionError> {
    evaluate_expr(&compile(source)?, context)
}
