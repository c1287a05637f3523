//! Runtime values and the evaluation context.

use std::collections::BTreeMap;

use domain::{Identity, Repository};

/// A value produced while evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) | Value::Float(_) => "number",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    /// Scalar rendering used by the list helpers; `None` for null and collections.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Str(s) => Some(s.clone()),
            Value::Int(n) => Some(n.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null | Value::List(_) | Value::Map(_) => None,
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Equality with integer/float promotion.
    pub fn loosely_equals(&self, other: &Value) -> bool {
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => a == b,
            _ => self == other,
        }
    }

    pub fn compare(&self, other: &Value) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            _ => self.as_number()?.partial_cmp(&other.as_number()?),
        }
    }
}

impl From<&serde_json::Value> for Value {
    fn from(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Value::Int)
                .unwrap_or_else(|| Value::Float(n.as_f64().unwrap_or(f64::NAN))),
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => Value::List(items.iter().map(Value::from).collect()),
            serde_json::Value::Object(map) => Value::Map(
                map.iter()
                    .map(|(key, value)| (key.clone(), Value::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

fn string_list<'a>(items: impl IntoIterator<Item = &'a String>) -> Value {
    Value::List(items.into_iter().map(|s| Value::Str(s.clone())).collect())
}

/// The only names an expression can see.
#[derive(Debug, Clone)]
pub struct Context {
    repository: Value,
    groups: Value,
    claims: Value,
}

impl Context {
    pub fn new(identity: &Identity, repository: &Repository) -> Self {
        let mut repo = BTreeMap::new();
        repo.insert("name".to_string(), Value::from(repository.name.as_str()));
        repo.insert("isPublic".to_string(), Value::Bool(repository.is_public));
        repo.insert("accessGroups".to_string(), string_list(&repository.access_groups));
        repo.insert("accessUsers".to_string(), string_list(&repository.access_users));
        repo.insert(
            "indexFileName".to_string(),
            Value::from(repository.index_file_name.as_str()),
        );

        Self {
            repository: Value::Map(repo),
            groups: string_list(&identity.groups),
            claims: Value::Map(
                identity
                    .claims
                    .iter()
                    .map(|(key, value)| (key.clone(), Value::from(value)))
                    .collect(),
            ),
        }
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        match name {
            "repository" => Some(&self.repository),
            "groups" => Some(&self.groups),
            "claims" => Some(&self.claims),
            _ => None,
        }
    }
}
