//! CMS context - shared state for the server
//!
//! Holds the page pipeline and the collaborators every request uses.

use std::sync::Arc;

use cms_core::{
    CmsError, CmsFunction, DataValidator, FunctionRegistry, PagePipeline, ResolveObserver,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::CmsOptions;
use crate::error::Result;
use crate::render::ViewRenderer;
use crate::source::PageSource;

/// Address the server listens on.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Host to bind to
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "127.0.0.1".to_string(),
        }
    }
}

/// Shared context for the CMS server.
///
/// This is wrapped in `Arc` and shared across all request handlers. Nothing
/// in it changes after construction.
pub struct CmsContext {
    options: CmsOptions,
    pipeline: PagePipeline,
    source: Arc<dyn PageSource>,
    renderer: Option<Arc<dyn ViewRenderer>>,
    shutdown: CancellationToken,
}

/// Type alias for the shared context used in axum handlers.
pub type SharedContext = Arc<CmsContext>;

impl CmsContext {
    pub fn builder(options: CmsOptions) -> CmsBuilder {
        CmsBuilder::new(options)
    }

    pub fn options(&self) -> &CmsOptions {
        &self.options
    }

    pub fn pipeline(&self) -> &PagePipeline {
        &self.pipeline
    }

    pub fn source(&self) -> &dyn PageSource {
        self.source.as_ref()
    }

    pub fn renderer(&self) -> Option<&dyn ViewRenderer> {
        self.renderer.as_deref()
    }

    /// Cancelled when the server shuts down.
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }
}

/// Builder for [`CmsContext`].
///
/// A page source is required; everything else has a default.
pub struct CmsBuilder {
    options: CmsOptions,
    source: Option<Arc<dyn PageSource>>,
    renderer: Option<Arc<dyn ViewRenderer>>,
    validator: Option<Arc<dyn DataValidator>>,
    observer: Option<Arc<dyn ResolveObserver>>,
    functions: Vec<(String, Arc<dyn CmsFunction>)>,
    shutdown: CancellationToken,
}

impl CmsBuilder {
    pub fn new(options: CmsOptions) -> Self {
        Self {
            options,
            source: None,
            renderer: None,
            validator: None,
            observer: None,
            functions: Vec::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn page_source(mut self, source: Arc<dyn PageSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn ViewRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Override the validator implied by the options.
    pub fn validator(mut self, validator: Arc<dyn DataValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn ResolveObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Register a helper function under a dotted name.
    pub fn function(mut self, name: impl Into<String>, function: Arc<dyn CmsFunction>) -> Self {
        self.functions.push((name.into(), function));
        self
    }

    pub fn shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Build the context.
    ///
    /// # Errors
    ///
    /// Fails with a configuration error if no page source was supplied, or
    /// with a registry error if two functions claim the same name.
    pub fn build(self) -> Result<CmsContext> {
        let source = self.source.ok_or_else(|| {
            CmsError::configuration("the CMS route needs a page source in order to work")
        })?;

        let mut registry = self
            .options
            .register_functions(FunctionRegistry::builder())?;
        for (name, function) in self.functions {
            registry = registry.register(&name, function)?;
        }
        let registry = registry.build();
        info!(functions = ?registry.names(), "Function registry ready");

        let mut pipeline = PagePipeline::builder()
            .registry(Arc::new(registry))
            .global_data(self.options.global_data.clone())
            .data_key(self.options.data_key.clone());
        if let Some(validator) = self.validator.or_else(|| self.options.validator()) {
            pipeline = pipeline.validator(validator);
        }
        if let Some(observer) = self.observer {
            pipeline = pipeline.observer(observer);
        }

        Ok(CmsContext {
            options: self.options,
            pipeline: pipeline.build(),
            source,
            renderer: self.renderer,
            shutdown: self.shutdown,
        })
    }
}
