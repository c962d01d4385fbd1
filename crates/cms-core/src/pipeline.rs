/*
 * pipeline.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Merge, resolve, validate, and decide how a page is answered.
 */

//! The page data pipeline.
//!
//! Once the page-fetch collaborator has produced raw page data, a request
//! moves through these states:
//!
//! ```text
//! Fetched → Merged → Resolving → Resolved → Validated → Rendered | Returned
//!                         ↘ Failed         ↘ Rejected
//! ```
//!
//! There are no retries: a failed resolution or a rejected validation ends
//! the request. The pipeline does not render anything itself. It returns a
//! [`PageOutcome`] telling the caller whether to hand the data to a template
//! renderer or return it as-is.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::args::ResolutionContext;
use crate::error::{CmsError, Result};
use crate::merge::merge_page_data;
use crate::observer::{ResolveObserver, TracingObserver};
use crate::registry::FunctionRegistry;
use crate::resolve::{ResolveOptions, resolve_data};
use crate::validate::{DataValidator, ObjectValidator};
use crate::value::{GlobalData, PageData, TEMPLATE_FIELD, template_name};

/// Where a request currently is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Fetched,
    Merged,
    Resolving,
    Resolved,
    Failed,
    Validated,
    Rejected,
    Rendered,
    Returned,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Fetched => "fetched",
            PipelineState::Merged => "merged",
            PipelineState::Resolving => "resolving",
            PipelineState::Resolved => "resolved",
            PipelineState::Failed => "failed",
            PipelineState::Validated => "validated",
            PipelineState::Rejected => "rejected",
            PipelineState::Rendered => "rendered",
            PipelineState::Returned => "returned",
        }
    }

    /// Whether the request cannot move past this state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Failed
                | PipelineState::Rejected
                | PipelineState::Rendered
                | PipelineState::Returned
        )
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-request flags taken from the query string.
#[derive(Debug, Clone, Default)]
pub struct RequestFlags {
    /// Return data even when the page has a template (`?json=1`).
    pub json: bool,
    /// Report each resolved call expression (`?debug=1`).
    pub debug: bool,
    /// Abandon resolution when the request goes away.
    pub cancel: Option<CancellationToken>,
}

/// How the caller should answer the request.
#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome {
    /// Hand `data` to the renderer using `template`.
    Render { template: String, data: Value },
    /// Return `data` directly.
    Data(Value),
}

impl PageOutcome {
    pub fn state(&self) -> PipelineState {
        match self {
            PageOutcome::Render { .. } => PipelineState::Rendered,
            PageOutcome::Data(_) => PipelineState::Returned,
        }
    }

    pub fn data(&self) -> &Value {
        match self {
            PageOutcome::Render { data, .. } | PageOutcome::Data(data) => data,
        }
    }
}

/// Merges, resolves, and validates page data.
///
/// A pipeline is built once and shared by all requests; every per-request
/// value is created inside [`PagePipeline::process`].
pub struct PagePipeline {
    registry: Arc<FunctionRegistry>,
    global_data: GlobalData,
    data_key: Option<String>,
    validator: Arc<dyn DataValidator>,
    observer: Arc<dyn ResolveObserver>,
}

impl PagePipeline {
    pub fn builder() -> PagePipelineBuilder {
        PagePipelineBuilder::default()
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    pub fn global_data(&self) -> &GlobalData {
        &self.global_data
    }

    pub fn data_key(&self) -> Option<&str> {
        self.data_key.as_deref()
    }

    /// Run fetched page data through the pipeline.
    ///
    /// # Arguments
    /// * `page` - Raw page data from the page-fetch collaborator
    /// * `request` - Description of the inbound request, exposed to call
    ///   arguments as `request`
    /// * `flags` - Query flags for this request
    pub async fn process(
        &self,
        page: PageData,
        request: Value,
        flags: &RequestFlags,
    ) -> Result<PageOutcome> {
        transition(PipelineState::Fetched);

        let merged = merge_page_data(&page, &self.global_data);
        transition(PipelineState::Merged);

        let ctx = ResolutionContext::new(request, Value::Object(page));
        let mut options = ResolveOptions::default()
            .debug(flags.debug)
            .with_observer(self.observer.clone());
        if let Some(cancel) = &flags.cancel {
            options = options.with_cancel(cancel.clone());
        }

        transition(PipelineState::Resolving);
        let resolved = match resolve_data(&merged, &self.registry, &ctx, &options).await {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::warn!(error = %e, state = %PipelineState::Failed, "Page data resolution failed");
                return Err(e);
            }
        };
        transition(PipelineState::Resolved);

        let validated = match self.validator.validate(resolved).await {
            Ok(validated) => validated,
            Err(failure) => {
                tracing::info!(error = %failure, state = %PipelineState::Rejected, "Page data rejected");
                return Err(CmsError::Validation(failure));
            }
        };
        transition(PipelineState::Validated);

        let outcome = decide(self.wrap(validated), flags.json);
        transition(outcome.state());
        Ok(outcome)
    }

    /// Nest data under the configured data key, keeping `_template` on top.
    fn wrap(&self, data: PageData) -> PageData {
        let Some(key) = &self.data_key else {
            return data;
        };

        let template = data.get(TEMPLATE_FIELD).cloned();
        let mut wrapped = PageData::new();
        wrapped.insert(key.clone(), Value::Object(data));
        if let Some(template) = template {
            wrapped.insert(TEMPLATE_FIELD.to_string(), template);
        }
        wrapped
    }
}

fn transition(state: PipelineState) {
    tracing::debug!(state = %state, "Page pipeline state");
}

/// Render when there is a template and raw data was not requested.
fn decide(data: PageData, force_json: bool) -> PageOutcome {
    match template_name(&data) {
        Some(template) if !force_json => PageOutcome::Render {
            template: template.to_string(),
            data: Value::Object(data),
        },
        _ => PageOutcome::Data(Value::Object(data)),
    }
}

/// Builder for [`PagePipeline`].
pub struct PagePipelineBuilder {
    registry: Arc<FunctionRegistry>,
    global_data: GlobalData,
    data_key: Option<String>,
    validator: Arc<dyn DataValidator>,
    observer: Arc<dyn ResolveObserver>,
}

impl Default for PagePipelineBuilder {
    fn default() -> Self {
        Self {
            registry: Arc::new(FunctionRegistry::empty()),
            global_data: GlobalData::new(),
            data_key: None,
            validator: Arc::new(ObjectValidator),
            observer: Arc::new(TracingObserver),
        }
    }
}

impl PagePipelineBuilder {
    pub fn registry(mut self, registry: Arc<FunctionRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn global_data(mut self, global_data: GlobalData) -> Self {
        self.global_data = global_data;
        self
    }

    /// Nest resolved data under `key`. Empty keys are ignored.
    pub fn data_key(mut self, key: Option<String>) -> Self {
        self.data_key = key.filter(|k| !k.is_empty());
        self
    }

    pub fn validator(mut self, validator: Arc<dyn DataValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn ResolveObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn build(self) -> PagePipeline {
        PagePipeline {
            registry: self.registry,
            global_data: self.global_data,
            data_key: self.data_key,
            validator: self.validator,
            observer: self.observer,
        }
    }
}
