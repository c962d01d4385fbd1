/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for page data resolution.

use serde_json::Value;
use thiserror::Error;

use crate::registry::FunctionError;
use crate::validate::ValidationFailure;

/// An error carried over from the page-fetch collaborator.
///
/// Upstream errors may already be fully-formed HTTP errors (a 404 for an
/// unknown slug, for example). They are forwarded to the caller with their
/// status and body untouched.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Upstream error ({status}): {message}")]
pub struct UpstreamError {
    /// HTTP status to respond with.
    pub status: u16,
    /// Human-readable message.
    pub message: String,
    /// Optional response body. When absent the server builds one from `message`.
    pub body: Option<Value>,
}

impl UpstreamError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            body: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(404, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(500, message)
    }

    /// Attach an explicit response body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Errors that can occur while turning page data into a response.
#[derive(Debug, Error)]
pub enum CmsError {
    /// A required collaborator was not supplied at setup time.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A call expression names a function that is not registered.
    #[error("Unresolved function: {name}")]
    UnresolvedFunction { name: String },

    /// A registered function was called and failed.
    #[error("Failed to resolve field `{field}` ({expression}): {source}")]
    ResolutionFailure {
        field: String,
        expression: String,
        #[source]
        source: FunctionError,
    },

    /// The validator rejected the resolved data.
    #[error("Validation failed: {0}")]
    Validation(ValidationFailure),

    /// The page-fetch collaborator failed.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// Resolution was cancelled before all calls completed.
    #[error("Resolution cancelled")]
    Cancelled,
}

impl CmsError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// HTTP status code this error maps to.
    ///
    /// Validation failures are the caller's fault (400). Unresolved or failing
    /// functions mean the page is misconfigured (500). Upstream errors keep
    /// whatever status they carry.
    pub fn status_code(&self) -> u16 {
        match self {
            CmsError::Validation(_) => 400,
            CmsError::Upstream(e) => e.status,
            CmsError::Cancelled => 503,
            CmsError::Configuration(_)
            | CmsError::UnresolvedFunction { .. }
            | CmsError::ResolutionFailure { .. } => 500,
        }
    }

    /// Whether the error should be reported as a client error.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

impl From<ValidationFailure> for CmsError {
    fn from(failure: ValidationFailure) -> Self {
        CmsError::Validation(failure)
    }
}

/// Result type for page data operations.
pub type Result<T> = std::result::Result<T, CmsError>;
