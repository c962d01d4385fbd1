/*
 * value.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Page data value types.
//!
//! Page data is plain JSON. Objects keep insertion order so that a resolved
//! page re-serializes with its fields in the order the source wrote them.

use serde_json::{Map, Value};

/// Field name holding the template used to render a page.
pub const TEMPLATE_FIELD: &str = "_template";

/// Data for a single page, keyed by field name.
pub type PageData = Map<String, Value>;

/// Site-wide defaults merged beneath every page.
pub type GlobalData = Map<String, Value>;

/// The template name of a page, if it has a non-empty one.
pub fn template_name(data: &PageData) -> Option<&str> {
    match data.get(TEMPLATE_FIELD) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.as_str()),
        _ => None,
    }
}

/// Get a nested value by path.
///
/// Objects are indexed by key and arrays by numeric segment, so
/// `["items", "0", "name"]` reaches into the first element of `items`.
pub fn get_path<'a, S: AsRef<str>>(value: &'a Value, path: &[S]) -> Option<&'a Value> {
    let Some((first, rest)) = path.split_first() else {
        return Some(value);
    };

    let next = match value {
        Value::Object(map) => map.get(first.as_ref()),
        Value::Array(items) => first
            .as_ref()
            .parse::<usize>()
            .ok()
            .and_then(|i| items.get(i)),
        _ => None,
    };

    next.and_then(|v| get_path(v, rest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_path() {
        let value = json!({
            "employee": { "salary": 50000 },
            "items": [{ "name": "first" }, { "name": "second" }]
        });

        assert_eq!(get_path(&value, &["employee", "salary"]), Some(&json!(50000)));
        assert_eq!(get_path(&value, &["items", "1", "name"]), Some(&json!("second")));
        assert_eq!(get_path(&value, &["employee", "name"]), None);
        assert_eq!(get_path(&value, &["items", "x"]), None);
        assert_eq!(get_path(&value, &["employee", "salary", "deeper"]), None);
        assert_eq!(get_path::<&str>(&value, &[]), Some(&value));
    }

    #[test]
    fn test_template_name() {
        let mut data = PageData::new();
        assert_eq!(template_name(&data), None);

        data.insert(TEMPLATE_FIELD.to_string(), json!(""));
        assert_eq!(template_name(&data), None);

        data.insert(TEMPLATE_FIELD.to_string(), json!(42));
        assert_eq!(template_name(&data), None);

        data.insert(TEMPLATE_FIELD.to_string(), json!("page"));
        assert_eq!(template_name(&data), Some("page"));
    }
}
