//! Page sources - where raw page data comes from
//!
//! A [`PageSource`] turns a slug into page data. It may instead answer the
//! request itself (a redirect, for example), in which case the pipeline is
//! skipped entirely.

use std::collections::{BTreeMap, HashMap};
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use cms_core::{PageData, UpstreamError};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// Field that turns a stored page into a redirect.
pub const REDIRECT_FIELD: &str = "_redirect";

/// The parts of the inbound request a page source and call arguments can see.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RequestInfo {
    pub method: String,
    pub path: String,
    pub slug: String,
    pub query: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
}

impl RequestInfo {
    /// JSON form exposed to call arguments as `request`.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Whether a query flag is set to `1`.
    pub fn flag(&self, name: &str) -> bool {
        self.query.get(name).is_some_and(|v| v == "1")
    }
}

/// A complete response produced by a page source instead of page data.
#[derive(Debug, Clone, PartialEq)]
pub struct EarlyResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl EarlyResponse {
    /// A 302 redirect to `location`.
    pub fn redirect(location: impl Into<String>) -> Self {
        Self {
            status: 302,
            headers: vec![("location".to_string(), location.into())],
            body: None,
        }
    }
}

/// Result of fetching a page.
#[derive(Debug, Clone, PartialEq)]
pub enum PageFetch {
    /// Page data to run through the pipeline.
    Page(PageData),
    /// Respond immediately, bypassing merge, resolution and validation.
    Respond(EarlyResponse),
}

/// Fetches raw page data for a slug.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch the page for `slug`.
    ///
    /// Errors are forwarded to the client with their status unchanged.
    async fn get_page(&self, slug: &str, request: &RequestInfo) -> Result<PageFetch, UpstreamError>;
}

/// Turn a stored JSON document into a fetch result.
fn page_from_value(slug: &str, value: Value) -> Result<PageFetch, UpstreamError> {
    let Value::Object(page) = value else {
        return Err(UpstreamError::internal(format!(
            "Page data for `{}` is not an object",
            slug
        )));
    };

    if let Some(Value::String(location)) = page.get(REDIRECT_FIELD) {
        return Ok(PageFetch::Respond(EarlyResponse::redirect(location.clone())));
    }

    Ok(PageFetch::Page(page))
}

/// Reads pages from `<root>/<slug>.json`.
///
/// An empty slug maps to `index.json`. Slugs containing `.` or `..` segments
/// never leave the root; they are reported as not found.
#[derive(Debug, Clone)]
pub struct FsPageSource {
    root: PathBuf,
}

impl FsPageSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a slug to a file path, or `None` if the slug is not a plain relative path.
    fn page_path(&self, slug: &str) -> Option<PathBuf> {
        let slug = slug.trim_matches('/');
        let slug = if slug.is_empty() { "index" } else { slug };

        let relative = Path::new(slug);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return None;
        }

        Some(self.root.join(format!("{}.json", slug)))
    }
}

#[async_trait]
impl PageSource for FsPageSource {
    async fn get_page(&self, slug: &str, _request: &RequestInfo) -> Result<PageFetch, UpstreamError> {
        let not_found = || UpstreamError::not_found(format!("Page not found: {}", slug));

        let path = self.page_path(slug).ok_or_else(not_found)?;
        debug!(slug, path = %path.display(), "Reading page");

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
            Err(e) => {
                return Err(UpstreamError::internal(format!(
                    "Failed to read page `{}`: {}",
                    slug, e
                )));
            }
        };

        let value: Value = serde_json::from_str(&content).map_err(|e| {
            UpstreamError::internal(format!("Invalid page data for `{}`: {}", slug, e))
        })?;

        page_from_value(slug, value)
    }
}

/// Serves pages from an in-memory map. An empty slug is looked up as `index`.
#[derive(Debug, Clone, Default)]
pub struct MemoryPageSource {
    pages: HashMap<String, Result<PageFetch, UpstreamError>>,
}

impl MemoryPageSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a page. Non-object values are served as a 500.
    pub fn add(&mut self, slug: impl Into<String>, page: Value) -> &mut Self {
        let slug = slug.into();
        let fetch = page_from_value(&slug, page);
        self.pages.insert(slug, fetch);
        self
    }

    /// Answer `slug` with a redirect.
    pub fn add_redirect(&mut self, slug: impl Into<String>, location: impl Into<String>) -> &mut Self {
        self.pages.insert(
            slug.into(),
            Ok(PageFetch::Respond(EarlyResponse::redirect(location))),
        );
        self
    }

    /// Answer `slug` with an error.
    pub fn add_error(&mut self, slug: impl Into<String>, error: UpstreamError) -> &mut Self {
        self.pages.insert(slug.into(), Err(error));
        self
    }

    /// Create a source with the given pages.
    pub fn with_pages(pages: impl IntoIterator<Item = (impl Into<String>, Value)>) -> Self {
        let mut source = Self::new();
        for (slug, page) in pages {
            source.add(slug, page);
        }
        source
    }
}

#[async_trait]
impl PageSource for MemoryPageSource {
    async fn get_page(&self, slug: &str, _request: &RequestInfo) -> Result<PageFetch, UpstreamError> {
        let key = if slug.is_empty() { "index" } else { slug };
        self.pages
            .get(key)
            .cloned()
            .unwrap_or_else(|| Err(UpstreamError::not_found(format!("Page not found: {}", slug))))
    }
}
