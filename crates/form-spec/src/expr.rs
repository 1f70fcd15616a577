//! Small condition grammar used by `show_when`, `required_when`, cross-field
//! conditions and section auto-skip.
//!
//! Supported forms, tried in this order:
//!
//! - `any(p1, p2, ...) == literal`: some listed path equals the literal.
//! - `any(e1, e2, ...)`: some comparison sub-expression holds.
//! - `path != literal` and `path == literal` (`===`/`!==` are accepted too).
//!
//! Paths missing from the flattened state make every comparison false.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::answer::coerce_number;
use crate::flatten::FlatState;

static INTEGER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^-?\d+$").expect("integer regex"));
static PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_\-]+(\.[A-Za-z0-9_\-]+|\[\d+\])*$").expect("path regex"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
    #[error("empty expression")]
    Empty,
    #[error("unbalanced parentheses in `{0}`")]
    Unbalanced(String),
    #[error("unsupported expression `{0}`")]
    Unsupported(String),
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Bool(bool),
    Integer(i64),
    Text(String),
}

impl Literal {
    /// Parses `true`, `false`, bare integers, quoted or unquoted strings.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        for quote in ['"', '\''] {
            if raw.len() >= 2 && raw.starts_with(quote) && raw.ends_with(quote) {
                return Literal::Text(raw[1..raw.len() - 1].to_string());
            }
        }
        match raw {
            "true" => Literal::Bool(true),
            "false" => Literal::Bool(false),
            _ if INTEGER.is_match(raw) => raw
                .parse::<i64>()
                .map(Literal::Integer)
                .unwrap_or_else(|_| Literal::Text(raw.to_string())),
            _ => Literal::Text(raw.to_string()),
        }
    }

    /// Strict equality, except integers compare against the stored value
    /// coerced to a number.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Literal::Bool(expected) => value.as_bool() == Some(*expected),
            Literal::Integer(expected) => {
                coerce_number(value).is_some_and(|actual| actual == *expected as f64)
            }
            Literal::Text(expected) => value.as_str() == Some(expected.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
}

/// Parsed condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Compare {
        path: String,
        op: CompareOp,
        literal: Literal,
    },
    /// `any(paths) == literal`
    AnyEquals { paths: Vec<String>, literal: Literal },
    /// `any(expr, expr, ...)`
    AnyOf(Vec<Expr>),
    /// Auto-skip reading of `any(paths)`: every listed path is explicitly false.
    AllFalse(Vec<String>),
}

impl Expr {
    /// Parses the general grammar.
    pub fn parse(text: &str) -> Result<Self, ExprError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ExprError::Empty);
        }
        if let Some((inner, tail)) = split_any_call(text)? {
            let args = split_top_level(inner);
            if tail.is_empty() {
                let exprs = args
                    .into_iter()
                    .map(Expr::parse)
                    .collect::<Result<Vec<_>, _>>()?;
                return Ok(Expr::AnyOf(exprs));
            }
            if let Some(literal) = strip_operator(tail, "==") {
                let paths = parse_paths(&args, text)?;
                return Ok(Expr::AnyEquals {
                    paths,
                    literal: Literal::parse(literal),
                });
            }
            return Err(ExprError::Unsupported(text.to_string()));
        }
        if let Some((path, literal)) = text.split_once("!=") {
            return Self::compare(text, path, CompareOp::Ne, literal);
        }
        if let Some((path, literal)) = text.split_once("==") {
            return Self::compare(text, path, CompareOp::Eq, literal);
        }
        Err(ExprError::Unsupported(text.to_string()))
    }

    /// Parses an auto-skip condition. A bare `any(p1, p2, ...)` whose
    /// arguments are all plain paths means "all listed paths are false";
    /// everything else follows the general grammar.
    pub fn parse_auto_skip(text: &str) -> Result<Self, ExprError> {
        let trimmed = text.trim();
        if let Some((inner, tail)) = split_any_call(trimmed)?
            && tail.is_empty()
        {
            let args = split_top_level(inner);
            if !args.is_empty() && args.iter().all(|arg| PATH.is_match(arg)) {
                return Ok(Expr::AllFalse(
                    args.into_iter().map(str::to_string).collect(),
                ));
            }
        }
        Self::parse(trimmed)
    }

    fn compare(text: &str, path: &str, op: CompareOp, literal: &str) -> Result<Self, ExprError> {
        let path = path.trim();
        if !PATH.is_match(path) {
            return Err(ExprError::Unsupported(text.to_string()));
        }
        Ok(Expr::Compare {
            path: path.to_string(),
            op,
            literal: Literal::parse(literal.trim_start_matches('=')),
        })
    }

    pub fn evaluate(&self, flat: &FlatState) -> bool {
        match self {
            Expr::Compare { path, op, literal } => match flat.get(path) {
                None => false,
                Some(value) => match op {
                    CompareOp::Eq => literal.matches(value),
                    CompareOp::Ne => !literal.matches(value),
                },
            },
            Expr::AnyEquals { paths, literal } => paths
                .iter()
                .filter_map(|path| flat.get(path))
                .any(|value| literal.matches(value)),
            Expr::AnyOf(exprs) => exprs.iter().any(|expr| expr.evaluate(flat)),
            Expr::AllFalse(paths) => {
                !paths.is_empty()
                    && paths
                        .iter()
                        .all(|path| flat.get(path) == Some(&Value::Bool(false)))
            }
        }
    }
}

/// Returns the argument list and trailing text of a leading `any(...)`.
fn split_any_call(text: &str) -> Result<Option<(&str, &str)>, ExprError> {
    let Some(rest) = text.strip_prefix("any(") else {
        return Ok(None);
    };
    let mut depth = 1usize;
    for (offset, ch) in rest.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(Some((&rest[..offset], rest[offset + 1..].trim())));
                }
            }
            _ => {}
        }
    }
    Err(ExprError::Unbalanced(text.to_string()))
}

fn split_top_level(inner: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (offset, ch) in inner.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(inner[start..offset].trim());
                start = offset + 1;
            }
            _ => {}
        }
    }
    parts.push(inner[start..].trim());
    parts.retain(|part| !part.is_empty());
    parts
}

fn strip_operator<'a>(tail: &'a str, op: &str) -> Option<&'a str> {
    tail.strip_prefix(op).map(|rest| rest.trim_start_matches('='))
}

fn parse_paths(args: &[&str], text: &str) -> Result<Vec<String>, ExprError> {
    args.iter()
        .map(|arg| {
            if PATH.is_match(arg) {
                Ok(arg.to_string())
            } else {
                Err(ExprError::Unsupported(text.to_string()))
            }
        })
        .collect()
}

/// Expressions parsed once and looked up by their source text.
///
/// Unparsable expressions are remembered as `None` and evaluate to false.
#[derive(Debug, Clone, Default)]
pub struct ExprCache {
    general: BTreeMap<String, Option<Expr>>,
    auto_skip: BTreeMap<String, Option<Expr>>,
}

impl ExprCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, text: &str) {
        if !self.general.contains_key(text) {
            self.general
                .insert(text.to_string(), parse_logged(text, Expr::parse));
        }
    }

    pub fn insert_auto_skip(&mut self, text: &str) {
        if !self.auto_skip.contains_key(text) {
            self.auto_skip
                .insert(text.to_string(), parse_logged(text, Expr::parse_auto_skip));
        }
    }

    pub fn evaluate(&self, text: &str, flat: &FlatState) -> bool {
        match self.general.get(text) {
            Some(parsed) => parsed.as_ref().is_some_and(|expr| expr.evaluate(flat)),
            None => {
                debug!(expression = %text, "expression not cached; parsing on demand");
                parse_logged(text, Expr::parse).is_some_and(|expr| expr.evaluate(flat))
            }
        }
    }

    pub fn evaluate_auto_skip(&self, text: &str, flat: &FlatState) -> bool {
        match self.auto_skip.get(text) {
            Some(parsed) => parsed.as_ref().is_some_and(|expr| expr.evaluate(flat)),
            None => {
                debug!(expression = %text, "auto-skip expression not cached; parsing on demand");
                parse_logged(text, Expr::parse_auto_skip).is_some_and(|expr| expr.evaluate(flat))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.general.len() + self.auto_skip.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn parse_logged(text: &str, parse: fn(&str) -> Result<Expr, ExprError>) -> Option<Expr> {
    match parse(text) {
        Ok(expr) => Some(expr),
        Err(error) => {
            warn!(expression = %text, %error, "expression ignored; it will evaluate to false");
            None
        }
    }
}
