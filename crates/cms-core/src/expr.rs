/*
 * expr.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Call-expression detection and parsing for page data fields.
 */

//! Call-expression detection and parsing.
//!
//! A field whose entire value is a string of the form
//! `name(.name)*(args)` is a call expression, e.g. `getImage()` or
//! `utils.getImage(page.key1, 'large')`. Any other value is a literal.
//!
//! Parsing is pure: it produces a [`FieldExpr`] and never looks at the
//! function registry or the resolution context.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Matches a complete call expression, anchored at both ends.
static CALL_EXPR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^[A-Za-z_$][A-Za-z0-9_$]*(?:\.[A-Za-z_$][A-Za-z0-9_$]*)*\(.*\)$")
        .expect("call expression pattern is valid")
});

/// A dotted function name, e.g. `utils.getImage`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallName {
    segments: Vec<String>,
}

impl CallName {
    /// Split a dotted name into segments.
    pub fn parse(name: &str) -> Self {
        Self {
            segments: name.split('.').map(str::to_string).collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for CallName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// A parsed call expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallExpr {
    /// Function name to look up in the registry.
    pub name: CallName,
    /// Raw argument tokens, trimmed, in call order.
    pub args: Vec<String>,
    /// The original field text.
    pub source: String,
}

/// Classification of a single field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldExpr<'a> {
    /// Passed through unchanged.
    Literal(&'a Value),
    /// Replaced by the result of calling a registered function.
    Call(CallExpr),
}

/// Whether a string is, in its entirety, a call expression.
pub fn is_call_expression(text: &str) -> bool {
    CALL_EXPR_RE.is_match(text)
}

/// Classify a field value as a literal or a call expression.
pub fn classify(value: &Value) -> FieldExpr<'_> {
    match value {
        Value::String(text) => match parse_call(text) {
            Some(call) => FieldExpr::Call(call),
            None => FieldExpr::Literal(value),
        },
        _ => FieldExpr::Literal(value),
    }
}

/// Parse a call expression, or return `None` if `text` is not one.
pub fn parse_call(text: &str) -> Option<CallExpr> {
    if !is_call_expression(text) {
        return None;
    }

    // The pattern guarantees an opening paren and a trailing closing paren.
    let open = text.find('(')?;
    let name = &text[..open];
    let inner = &text[open + 1..text.len() - 1];

    Some(CallExpr {
        name: CallName::parse(name),
        args: split_args(inner),
        source: text.to_string(),
    })
}

/// Split an argument list on top-level commas.
///
/// Commas inside single or double quotes do not separate arguments. A blank
/// list yields no arguments.
pub fn split_args(inner: &str) -> Vec<String> {
    if inner.trim().is_empty() {
        return Vec::new();
    }

    let mut args = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in inner.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match (c, quote) {
            ('\\', Some(_)) => {
                current.push(c);
                escaped = true;
            }
            ('"' | '\'', None) => {
                quote = Some(c);
                current.push(c);
            }
            (c, Some(q)) if c == q => {
                quote = None;
                current.push(c);
            }
            (',', None) => {
                args.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    args.push(current.trim().to_string());

    args
}
