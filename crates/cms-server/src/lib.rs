//! cms-server: HTTP route for serving CMS pages
//!
//! This crate provides:
//! - An axum router that serves pages at `{route_prefix}/{slug}`
//! - Page sources backed by a directory of JSON files or by memory
//! - minijinja view rendering for pages that name a `_template`
//! - TOML configuration for the route, global data and constant functions

pub mod config;
pub mod context;
pub mod error;
pub mod render;
pub mod server;
pub mod source;

pub use config::{CmsOptions, RouteConfig};
pub use context::{CmsBuilder, CmsContext, ServerConfig, SharedContext};
pub use error::{Error, Result};
pub use render::{RenderError, TemplateRenderer, ViewRenderer};
pub use server::{build_router, run_server};
pub use source::{EarlyResponse, FsPageSource, MemoryPageSource, PageFetch, PageSource, RequestInfo};
