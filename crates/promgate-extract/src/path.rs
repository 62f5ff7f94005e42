//! Structural queries over JSON documents.
//!
//! Configs write paths slash-delimited (`/blockchain/head/seq`). They are
//! translated by plain delimiter substitution into the dotted dialect
//! (`$.blockchain.head.seq`) and then evaluated against a
//! [`serde_json::Value`]. A `/` inside a key cannot be expressed.

use std::fmt;

use serde_json::{Map, Value};

use crate::error::{ExtractError, ExtractResult};

/// One step of a compiled query.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Key(String),
    Index(usize),
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Key(key) => write!(f, ".{key}"),
            Step::Index(idx) => write!(f, "[{idx}]"),
        }
    }
}

/// A compiled structural query in the dotted dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    query: String,
    steps: Vec<Step>,
}

/// A located value, typed by shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolved<'a> {
    Number(f64),
    String(&'a str),
    Sequence(&'a [Value]),
    Mapping(&'a Map<String, Value>),
    /// `true`, `false` or `null`.
    Other(&'a Value),
}

impl<'a> Resolved<'a> {
    /// Shape name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Resolved::Number(_) => "number",
            Resolved::String(_) => "string",
            Resolved::Sequence(_) => "sequence",
            Resolved::Mapping(_) => "mapping",
            Resolved::Other(Value::Bool(_)) => "boolean",
            Resolved::Other(_) => "null",
        }
    }
}

impl<'a> From<&'a Value> for Resolved<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::Number(n) => match n.as_f64() {
                Some(f) => Resolved::Number(f),
                None => Resolved::Other(value),
            },
            Value::String(s) => Resolved::String(s),
            Value::Array(items) => Resolved::Sequence(items),
            Value::Object(map) => Resolved::Mapping(map),
            Value::Bool(_) | Value::Null => Resolved::Other(value),
        }
    }
}

/// Translate a slash-delimited query into the dotted dialect.
///
/// `a/b/c` and `/a/b/c` both become `$.a.b.c`; an empty query or `/`
/// selects the document root (`$`).
pub fn translate(query: &str) -> String {
    let trimmed = query.strip_prefix('/').unwrap_or(query);
    if trimmed.is_empty() {
        "$".to_string()
    } else {
        format!("$.{}", trimmed.replace('/', "."))
    }
}

impl JsonPath {
    /// Compile a slash-delimited query.
    pub fn from_slashed(query: &str) -> ExtractResult<Self> {
        Self::parse(&translate(query))
    }

    /// Compile a query in the dotted dialect: `$`, then any sequence of
    /// `.key` and `[index]` steps.
    pub fn parse(query: &str) -> ExtractResult<Self> {
        let not_found = |reason: String| ExtractError::PathNotFound {
            query: query.to_string(),
            reason,
        };

        let rest = query
            .strip_prefix('$')
            .ok_or_else(|| not_found("query must start with '$'".to_string()))?;

        let mut steps = Vec::new();
        let mut chars = rest.char_indices().peekable();
        while let Some((pos, c)) = chars.next() {
            match c {
                '.' => {
                    let start = pos + 1;
                    let mut end = rest.len();
                    while let Some(&(next, nc)) = chars.peek() {
                        if nc == '.' || nc == '[' {
                            end = next;
                            break;
                        }
                        chars.next();
                    }
                    let key = &rest[start..end];
                    if key.is_empty() {
                        return Err(not_found(format!("empty segment at offset {start}")));
                    }
                    steps.push(Step::Key(key.to_string()));
                }
                '[' => {
                    let mut digits = String::new();
                    let mut closed = false;
                    for (_, nc) in chars.by_ref() {
                        if nc == ']' {
                            closed = true;
                            break;
                        }
                        digits.push(nc);
                    }
                    if !closed {
                        return Err(not_found(format!("unclosed '[' at offset {pos}")));
                    }
                    let idx = digits
                        .parse::<usize>()
                        .map_err(|_| not_found(format!("invalid index [{digits}]")))?;
                    steps.push(Step::Index(idx));
                }
                other => {
                    return Err(not_found(format!(
                        "unexpected {other:?} at offset {pos}"
                    )));
                }
            }
        }

        Ok(Self {
            query: query.to_string(),
            steps,
        })
    }

    /// The query in the dotted dialect.
    pub fn as_str(&self) -> &str {
        &self.query
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.query)
    }
}

/// Evaluate a compiled query against a document.
pub fn resolve<'a>(document: &'a Value, path: &JsonPath) -> ExtractResult<Resolved<'a>> {
    let mut current = document;
    for (depth, step) in path.steps.iter().enumerate() {
        let next = match (step, current) {
            (Step::Key(key), Value::Object(map)) => map.get(key),
            (Step::Index(idx), Value::Array(items)) => items.get(*idx),
            _ => None,
        };
        current = next.ok_or_else(|| ExtractError::PathNotFound {
            query: path.query.clone(),
            reason: format!("no {step} at depth {depth}"),
        })?;
    }
    Ok(Resolved::from(current))
}

/// Compile a slash-delimited query and evaluate it in one go.
pub fn lookup<'a>(document: &'a Value, query: &str) -> ExtractResult<Resolved<'a>> {
    resolve(document, &JsonPath::from_slashed(query)?)
}
