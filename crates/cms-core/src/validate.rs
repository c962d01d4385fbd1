/*
 * validate.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Pluggable validation of resolved page data.
 */

//! Validation of resolved page data.
//!
//! A [`DataValidator`] receives the fully resolved page and either returns it
//! (possibly transformed) or rejects it with a [`ValidationFailure`]. A
//! rejection ends the request with a client error; no data is returned.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;

use crate::value::PageData;

/// A validator's reason for rejecting page data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationFailure {
    /// Summary of the failure.
    pub message: String,
    /// Individual problems, one per entry.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

impl ValidationFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: Vec::new(),
        }
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = details;
        self
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.details.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.message, self.details.join("; "))
        }
    }
}

impl std::error::Error for ValidationFailure {}

/// Validates and optionally transforms resolved page data.
#[async_trait]
pub trait DataValidator: Send + Sync {
    async fn validate(&self, data: PageData) -> Result<PageData, ValidationFailure>;
}

/// Accepts any object unchanged. This is the default validator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectValidator;

#[async_trait]
impl DataValidator for ObjectValidator {
    async fn validate(&self, data: PageData) -> Result<PageData, ValidationFailure> {
        Ok(data)
    }
}

/// Requires each listed field to be present and non-null.
#[derive(Debug, Clone, Default)]
pub struct RequiredFields {
    fields: Vec<String>,
}

impl RequiredFields {
    pub fn new(fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl DataValidator for RequiredFields {
    async fn validate(&self, data: PageData) -> Result<PageData, ValidationFailure> {
        let missing: Vec<String> = self
            .fields
            .iter()
            .filter(|f| matches!(data.get(f.as_str()), None | Some(Value::Null)))
            .map(|f| format!("\"{}\" is required", f))
            .collect();

        if missing.is_empty() {
            Ok(data)
        } else {
            Err(ValidationFailure::new("Invalid page data").with_details(missing))
        }
    }
}

struct FnValidator<F> {
    f: F,
}

#[async_trait]
impl<F> DataValidator for FnValidator<F>
where
    F: Fn(PageData) -> BoxFuture<'static, Result<PageData, ValidationFailure>> + Send + Sync,
{
    async fn validate(&self, data: PageData) -> Result<PageData, ValidationFailure> {
        (self.f)(data).await
    }
}

/// Wrap an async closure as a [`DataValidator`].
pub fn validator_fn<F, Fut>(f: F) -> Arc<dyn DataValidator>
where
    F: Fn(PageData) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<PageData, ValidationFailure>> + Send + 'static,
{
    Arc::new(FnValidator {
        f: move |data: PageData| -> BoxFuture<'static, Result<PageData, ValidationFailure>> {
            Box::pin(f(data))
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> PageData {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_object_validator_accepts() {
        let data = obj(json!({ "a": 1 }));
        assert_eq!(ObjectValidator.validate(data.clone()).await, Ok(data));
    }

    #[tokio::test]
    async fn test_required_fields() {
        let validator = RequiredFields::new(["title", "body"]);

        let ok = obj(json!({ "title": "T", "body": "B", "extra": 1 }));
        assert!(validator.validate(ok).await.is_ok());

        let bad = obj(json!({ "title": null }));
        let failure = validator.validate(bad).await.unwrap_err();
        assert_eq!(
            failure.details,
            vec!["\"title\" is required", "\"body\" is required"]
        );
        assert_eq!(
            failure.to_string(),
            "Invalid page data: \"title\" is required; \"body\" is required"
        );
    }

    #[tokio::test]
    async fn test_validator_fn_can_transform() {
        let validator = validator_fn(|mut data: PageData| async move {
            data.insert("validated".to_string(), json!(true));
            Ok(data)
        });
        let out = validator.validate(obj(json!({ "a": 1 }))).await.unwrap();
        assert_eq!(Value::Object(out), json!({ "a": 1, "validated": true }));
    }
}
