/*
 * args.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Argument resolution for call expressions.
//!
//! Arguments are either dotted paths into the resolution context
//! (`page.key1`, `request.query.id`, `page.items.0`) or literals. A path
//! that does not lead anywhere resolves to `null` rather than failing the
//! request.
//!
//! The first segment must be an identifier naming a context root. Later
//! segments are object keys or array indexes and may hold any text without
//! whitespace, so `request.headers.content-type` is a path.

use serde_json::{Map, Value};

use crate::value::get_path;

/// Named roots available to argument paths for one request.
///
/// The context is built once per request and never mutated. `page` holds
/// the page data as fetched, before any call expression is resolved, so
/// arguments can never observe a sibling field's resolved value.
#[derive(Debug, Clone, Default)]
pub struct ResolutionContext {
    request: Value,
    page: Value,
    extra: Map<String, Value>,
}

impl ResolutionContext {
    pub fn new(request: Value, page: Value) -> Self {
        Self {
            request,
            page,
            extra: Map::new(),
        }
    }

    /// Expose an additional named root to argument paths.
    pub fn with_root(mut self, name: impl Into<String>, value: Value) -> Self {
        self.extra.insert(name.into(), value);
        self
    }

    pub fn request(&self) -> &Value {
        &self.request
    }

    pub fn page(&self) -> &Value {
        &self.page
    }

    /// Look up a context root by name.
    pub fn root(&self, name: &str) -> Option<&Value> {
        match name {
            "request" => Some(&self.request),
            "page" => Some(&self.page),
            _ => self.extra.get(name),
        }
    }

    /// Whether `name` is a known context root.
    pub fn has_root(&self, name: &str) -> bool {
        self.root(name).is_some()
    }
}

/// A parsed argument token.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgExpr {
    /// Path into a context root; the first segment names the root.
    Path(Vec<String>),
    /// A value passed as-is.
    Literal(Value),
}

impl ArgExpr {
    /// Parse a raw argument token against the roots known to `ctx`.
    pub fn parse(token: &str, ctx: &ResolutionContext) -> Self {
        let token = token.trim();

        if token.is_empty() {
            return ArgExpr::Literal(Value::Null);
        }

        if let Some(s) = unquote(token) {
            return ArgExpr::Literal(Value::String(s));
        }

        match token {
            "true" => return ArgExpr::Literal(Value::Bool(true)),
            "false" => return ArgExpr::Literal(Value::Bool(false)),
            "null" | "undefined" => return ArgExpr::Literal(Value::Null),
            _ => {}
        }

        if let Some(n) = parse_number(token) {
            return ArgExpr::Literal(n);
        }

        let segments: Vec<&str> = token.split('.').collect();
        let (root, rest) = (segments[0], &segments[1..]);
        if is_identifier(root) && ctx.has_root(root) && rest.iter().all(|s| is_key_segment(s)) {
            return ArgExpr::Path(segments.into_iter().map(str::to_string).collect());
        }

        ArgExpr::Literal(Value::String(token.to_string()))
    }

    /// Produce the runtime value of this argument.
    pub fn evaluate(&self, ctx: &ResolutionContext) -> Value {
        match self {
            ArgExpr::Literal(v) => v.clone(),
            ArgExpr::Path(segments) => {
                let Some((root, rest)) = segments.split_first() else {
                    return Value::Null;
                };
                ctx.root(root)
                    .and_then(|v| get_path(v, rest))
                    .cloned()
                    .unwrap_or(Value::Null)
            }
        }
    }
}

/// Resolve every raw argument token to a value.
pub fn resolve_args(tokens: &[String], ctx: &ResolutionContext) -> Vec<Value> {
    tokens
        .iter()
        .map(|t| ArgExpr::parse(t, ctx).evaluate(ctx))
        .collect()
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// A path segment after the root: an object key or an array index.
fn is_key_segment(s: &str) -> bool {
    !s.is_empty() && !s.chars().any(char::is_whitespace)
}

/// Strip matching single or double quotes and unescape the contents.
fn unquote(token: &str) -> Option<String> {
    let first = token.chars().next()?;
    if (first != '"' && first != '\'') || token.len() < 2 || !token.ends_with(first) {
        return None;
    }

    let inner = &token[1..token.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    Some(out)
}

fn parse_number(token: &str) -> Option<Value> {
    if let Ok(i) = token.parse::<i64>() {
        return Some(Value::from(i));
    }
    token
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn ctx() -> ResolutionContext {
        ResolutionContext::new(
            json!({
                "query": { "id": "42" },
                "path": "/page-one",
                "headers": { "content-type": "text/html" }
            }),
            json!({
                "key1": "value1",
                "nested": { "list": [1, 2, 3] },
                "items": [{ "name": "first" }, { "name": "second" }]
            }),
        )
    }

    #[test]
    fn test_page_path() {
        let ctx = ctx();
        assert_eq!(
            ArgExpr::parse("page.key1", &ctx),
            ArgExpr::Path(vec!["page".to_string(), "key1".to_string()])
        );
        assert_eq!(ArgExpr::parse("page.key1", &ctx).evaluate(&ctx), json!("value1"));
        assert_eq!(
            ArgExpr::parse("page.nested.list.2", &ctx).evaluate(&ctx),
            json!(3)
        );
        assert_eq!(
            ArgExpr::parse("page.items.0.name", &ctx),
            ArgExpr::Path(vec![
                "page".to_string(),
                "items".to_string(),
                "0".to_string(),
                "name".to_string()
            ])
        );
        assert_eq!(
            ArgExpr::parse("page.items.0.name", &ctx).evaluate(&ctx),
            json!("first")
        );
        assert_eq!(ArgExpr::parse("page.items.5.name", &ctx).evaluate(&ctx), Value::Null);
    }

    #[test]
    fn test_hyphenated_keys_are_paths() {
        let ctx = ctx();
        assert_eq!(
            ArgExpr::parse("request.headers.content-type", &ctx).evaluate(&ctx),
            json!("text/html")
        );
        assert_eq!(
            ArgExpr::parse("request.headers.x-missing", &ctx).evaluate(&ctx),
            Value::Null
        );
    }

    #[test]
    fn test_malformed_paths_fall_through_as_text() {
        let ctx = ctx();
        assert_eq!(ArgExpr::parse("page.", &ctx), ArgExpr::Literal(json!("page.")));
        assert_eq!(ArgExpr::parse("page..key1", &ctx), ArgExpr::Literal(json!("page..key1")));
        assert_eq!(ArgExpr::parse("page.a b", &ctx), ArgExpr::Literal(json!("page.a b")));
        assert_eq!(ArgExpr::parse("0.items", &ctx), ArgExpr::Literal(json!("0.items")));
    }

    #[test]
    fn test_request_path() {
        let ctx = ctx();
        assert_eq!(
            ArgExpr::parse("request.query.id", &ctx).evaluate(&ctx),
            json!("42")
        );
    }

    #[test]
    fn test_whole_root() {
        let ctx = ctx();
        assert_eq!(ArgExpr::parse("page", &ctx).evaluate(&ctx), *ctx.page());
    }

    #[test]
    fn test_missing_path_is_null() {
        let ctx = ctx();
        assert_eq!(ArgExpr::parse("page.nope.deeper", &ctx).evaluate(&ctx), Value::Null);
    }

    #[test]
    fn test_literals() {
        let ctx = ctx();
        assert_eq!(ArgExpr::parse("'large'", &ctx), ArgExpr::Literal(json!("large")));
        assert_eq!(ArgExpr::parse(r#""a \"b\"""#, &ctx), ArgExpr::Literal(json!("a \"b\"")));
        assert_eq!(ArgExpr::parse("12", &ctx), ArgExpr::Literal(json!(12)));
        assert_eq!(ArgExpr::parse("-1.5", &ctx), ArgExpr::Literal(json!(-1.5)));
        assert_eq!(ArgExpr::parse("true", &ctx), ArgExpr::Literal(json!(true)));
        assert_eq!(ArgExpr::parse("undefined", &ctx), ArgExpr::Literal(Value::Null));
    }

    #[test]
    fn test_unknown_identifier_falls_through_as_text() {
        let ctx = ctx();
        assert_eq!(ArgExpr::parse("hero", &ctx), ArgExpr::Literal(json!("hero")));
        assert_eq!(ArgExpr::parse("site.title", &ctx), ArgExpr::Literal(json!("site.title")));
    }

    #[test]
    fn test_extra_roots() {
        let ctx = ctx().with_root("site", json!({ "title": "Home" }));
        assert_eq!(ArgExpr::parse("site.title", &ctx).evaluate(&ctx), json!("Home"));
    }

    #[test]
    fn test_resolve_args() {
        let ctx = ctx();
        let args = vec!["page.key1".to_string(), "'x'".to_string(), "3".to_string()];
        assert_eq!(resolve_args(&args, &ctx), vec![json!("value1"), json!("x"), json!(3)]);
        assert!(resolve_args(&[], &ctx).is_empty());
    }
}
