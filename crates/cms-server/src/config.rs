//! CMS options
//!
//! Options are read from a TOML file. Every field is optional:
//!
//! ```toml
//! route_prefix = "/pages"
//! data_key = "content"
//! required_fields = ["title"]
//! health_path = "/_health"
//!
//! [route_config]
//! cors = true
//! timeout_secs = 10
//!
//! [global_data]
//! site_name = "Example"
//!
//! [functions]
//! "site.nav" = [{ label = "Home", href = "/" }]
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use cms_core::{DataValidator, FunctionRegistryBuilder, GlobalData, RequiredFields, constant};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// Extra settings applied to the CMS route only.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    /// Allow cross-origin requests.
    pub cors: bool,

    /// Abort requests that take longer than this many seconds.
    pub timeout_secs: Option<u64>,
}

/// Options controlling how pages are served.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CmsOptions {
    /// Prepended to the page route, e.g. `/pages` serves `/pages/{slug}`.
    pub route_prefix: String,

    /// Passed through to the routing layer.
    pub route_config: RouteConfig,

    /// Defaults merged beneath every page.
    pub global_data: GlobalData,

    /// Nest resolved data under this key, keeping `_template` on top.
    pub data_key: Option<String>,

    /// Fields every resolved page must have. Empty means any object is valid.
    pub required_fields: Vec<String>,

    /// Constant functions, keyed by dotted name.
    pub functions: BTreeMap<String, Value>,

    /// Serve a health check here. Off by default, since any path may be a slug.
    pub health_path: Option<String>,
}

impl CmsOptions {
    /// Load options from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))
    }

    /// The route prefix with a leading slash and no trailing slash.
    ///
    /// An empty prefix stays empty.
    pub fn normalized_prefix(&self) -> String {
        let trimmed = self.route_prefix.trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{}", trimmed)
        }
    }

    /// The health check path with a leading slash, if one is configured.
    pub fn normalized_health_path(&self) -> Option<String> {
        let trimmed = self.health_path.as_deref()?.trim_matches('/');
        if trimmed.is_empty() {
            None
        } else {
            Some(format!("/{}", trimmed))
        }
    }

    /// Register the configured constant functions.
    pub fn register_functions(
        &self,
        mut builder: FunctionRegistryBuilder,
    ) -> Result<FunctionRegistryBuilder> {
        for (name, value) in &self.functions {
            builder = builder.register(name, constant(value.clone()))?;
        }
        Ok(builder)
    }

    /// Validator implied by `required_fields`, if any.
    pub fn validator(&self) -> Option<Arc<dyn DataValidator>> {
        if self.required_fields.is_empty() {
            None
        } else {
            Some(Arc::new(RequiredFields::new(self.required_fields.clone())))
        }
    }
}
