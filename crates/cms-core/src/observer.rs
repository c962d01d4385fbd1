/*
 * observer.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Debug observer for call-expression resolution.
 */

//! Observer abstraction for resolution events.
//!
//! When a request asks for debug output, every resolved call expression is
//! reported through a [`ResolveObserver`]. Observers only see successful
//! resolutions; failures travel through the normal error path.

use serde_json::Value;

/// Receives debug records for resolved call expressions.
///
/// All methods have empty default implementations.
pub trait ResolveObserver: Send + Sync {
    /// Called once per call expression after its function returned.
    ///
    /// # Arguments
    ///
    /// * `field` - Name of the page data field
    /// * `expression` - The call expression as written in the page data
    /// * `value` - The value the field resolved to
    fn on_call_resolved(&self, _field: &str, _expression: &str, _value: &Value) {}
}

/// Observer that discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ResolveObserver for NoopObserver {}

/// Observer that emits `tracing` debug events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ResolveObserver for TracingObserver {
    fn on_call_resolved(&self, field: &str, expression: &str, value: &Value) {
        tracing::debug!(
            target: "cms::process_data",
            field,
            expression,
            value = %value,
            "Resolved call expression"
        );
    }
}
