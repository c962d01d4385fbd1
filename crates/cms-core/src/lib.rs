/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Page data resolution engine for server-rendered CMS pages.
//!
//! Given raw page data for a slug, this crate:
//!
//! - Merges it over site-wide defaults (page fields win)
//! - Finds fields whose value is a call expression such as `getImage()` or
//!   `utils.getImage(page.key1)`
//! - Resolves each call against a [`FunctionRegistry`] of named async
//!   functions, running all calls concurrently
//! - Validates the resolved data with a pluggable [`DataValidator`]
//! - Decides whether the result should be rendered with its `_template` or
//!   returned as data
//!
//! HTTP routing, page fetching, and template rendering live outside this
//! crate; see `cms-server`.
//!
//! # Example
//!
//! ```ignore
//! use cms_core::{FunctionRegistry, PagePipeline, RequestFlags, constant};
//!
//! let registry = FunctionRegistry::builder()
//!     .register("getImage", constant(json!({ "image": "x.jpg" })))?
//!     .build();
//! let pipeline = PagePipeline::builder().registry(Arc::new(registry)).build();
//!
//! let page = json!({ "_template": "", "hero": "getImage()" });
//! let outcome = pipeline
//!     .process(page.as_object().cloned().unwrap(), json!({}), &RequestFlags::default())
//!     .await?;
//! ```

pub mod args;
pub mod error;
pub mod expr;
pub mod merge;
pub mod observer;
pub mod pipeline;
pub mod registry;
pub mod resolve;
pub mod validate;
pub mod value;

pub use args::{ArgExpr, ResolutionContext};
pub use error::{CmsError, Result, UpstreamError};
pub use expr::{CallExpr, CallName, FieldExpr};
pub use merge::merge_page_data;
pub use observer::{NoopObserver, ResolveObserver, TracingObserver};
pub use pipeline::{PageOutcome, PagePipeline, PagePipelineBuilder, PipelineState, RequestFlags};
pub use registry::{
    CmsFunction, FunctionError, FunctionRegistry, FunctionRegistryBuilder, RegistryError,
    constant, function_fn,
};
pub use resolve::{ResolveOptions, resolve_data};
pub use validate::{DataValidator, ObjectValidator, RequiredFields, ValidationFailure, validator_fn};
pub use value::{GlobalData, PageData, TEMPLATE_FIELD, template_name};
