//! Whitelisted helper functions callable from access expressions.

use once_cell::sync::Lazy;
use regex::Regex;

use super::value::Value;
use super::ExpressionError;

static DEFAULT_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(",").expect("static regex"));

/// Dispatch a helper call by name.
pub fn call(function: &str, args: &[Value]) -> Result<Value, ExpressionError> {
    match function {
        "toList" => to_list(function, args, false),
        "toLowerCaseList" => to_list(function, args, true),
        "isOneOf" => is_one_of(function, args, false),
        "isOneOfIgnoreCase" => is_one_of(function, args, true),
        _ => Err(ExpressionError::evaluation(format!(
            "unknown function '{function}'"
        ))),
    }
}

/// `toList(s[, regex])`: split on `regex` (default `,`), trim every element
/// and drop elements that end up empty. Null input yields an empty list; a
/// list input is trimmed element-wise.
fn to_list(function: &str, args: &[Value], lower_case: bool) -> Result<Value, ExpressionError> {
    let (input, separator) = match args {
        [input] => (input, None),
        [input, Value::Str(pattern)] => (input, Some(pattern.as_str())),
        [_, other] => {
            return Err(ExpressionError::evaluation(format!(
                "{function}: separator must be a string, got {}",
                other.type_name()
            )))
        }
        _ => {
            return Err(ExpressionError::evaluation(format!(
                "{function} takes 1 or 2 arguments, got {}",
                args.len()
            )))
        }
    };

    let custom;
    let separator = match separator {
        Some(pattern) => {
            custom = Regex::new(pattern).map_err(|e| {
                ExpressionError::evaluation(format!("{function}: invalid separator: {e}"))
            })?;
            &custom
        }
        None => &*DEFAULT_SEPARATOR,
    };

    let raw: Vec<String> = match input {
        Value::Null => Vec::new(),
        Value::List(items) => items.iter().filter_map(Value::as_text).collect(),
        scalar => scalar
            .as_text()
            .map(|text| separator.split(&text).map(str::to_string).collect())
            .unwrap_or_default(),
    };

    Ok(Value::List(
        raw.iter()
            .map(|item| item.trim())
            .filter(|item| !item.is_empty())
            .map(|item| {
                if lower_case {
                    Value::Str(item.to_lowercase())
                } else {
                    Value::Str(item.to_string())
                }
            })
            .collect(),
    ))
}

/// `isOneOf(value, allowed...)`: trimmed exact membership. List arguments
/// among the allowed values are flattened.
fn is_one_of(function: &str, args: &[Value], ignore_case: bool) -> Result<Value, ExpressionError> {
    let Some((value, allowed)) = args.split_first() else {
        return Err(ExpressionError::evaluation(format!(
            "{function} needs a value to test"
        )));
    };

    let Some(value) = value.as_text() else {
        return Ok(Value::Bool(false));
    };
    let value = value.trim();

    let matches = |candidate: &Value| {
        candidate.as_text().is_some_and(|candidate| {
            let candidate = candidate.trim();
            if ignore_case {
                candidate.to_lowercase() == value.to_lowercase()
            } else {
                candidate == value
            }
        })
    };

    let found = allowed.iter().any(|candidate| match candidate {
        Value::List(items) => items.iter().any(&matches),
        other => matches(other),
    });
    Ok(Value::Bool(found))
}
