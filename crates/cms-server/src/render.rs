//! View rendering
//!
//! Pages with a `_template` are handed to a [`ViewRenderer`] together with
//! their resolved data. [`TemplateRenderer`] renders Jinja-style templates
//! with minijinja, either from a views directory or from in-memory sources.

use std::path::Path;

use async_trait::async_trait;
use minijinja::Environment;
use serde_json::Value;

/// Extension added to template names that don't have one.
pub const DEFAULT_TEMPLATE_EXTENSION: &str = "html";

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Failed to render view `{template}`: {source}")]
    Template {
        template: String,
        #[source]
        source: minijinja::Error,
    },

    #[error("No view renderer is configured (template `{0}`)")]
    NoRenderer(String),
}

/// Renders a named template with page data.
#[async_trait]
pub trait ViewRenderer: Send + Sync {
    async fn render(&self, template: &str, data: &Value) -> Result<String, RenderError>;
}

/// minijinja-backed renderer.
pub struct TemplateRenderer {
    env: Environment<'static>,
}

impl TemplateRenderer {
    /// Load templates on demand from `dir`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let mut env = Environment::new();
        env.set_loader(minijinja::path_loader(dir.as_ref().to_path_buf()));
        Self { env }
    }

    /// Use the given `(name, source)` templates.
    ///
    /// Names are used as given, so include the extension (`page.html`).
    pub fn from_templates(
        templates: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Result<Self, RenderError> {
        let mut env = Environment::new();
        for (name, source) in templates {
            let name = name.into();
            env.add_template_owned(name.clone(), source.into())
                .map_err(|source| RenderError::Template {
                    template: name,
                    source,
                })?;
        }
        Ok(Self { env })
    }
}

/// File name for a template reference: `page` becomes `page.html`.
pub fn template_file_name(template: &str) -> String {
    if Path::new(template).extension().is_some() {
        template.to_string()
    } else {
        format!("{}.{}", template, DEFAULT_TEMPLATE_EXTENSION)
    }
}

#[async_trait]
impl ViewRenderer for TemplateRenderer {
    async fn render(&self, template: &str, data: &Value) -> Result<String, RenderError> {
        let name = template_file_name(template);
        let to_error = |source| RenderError::Template {
            template: name.clone(),
            source,
        };

        let tmpl = self.env.get_template(&name).map_err(to_error)?;
        tmpl.render(data).map_err(to_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_template_file_name() {
        assert_eq!(template_file_name("page"), "page.html");
        assert_eq!(template_file_name("feed.xml"), "feed.xml");
        assert_eq!(template_file_name("blog/post"), "blog/post.html");
    }

    #[tokio::test]
    async fn test_render_loop_from_memory() {
        let renderer = TemplateRenderer::from_templates([(
            "testTemplate.html",
            "{% for item in alphabet %}{{ item.portion }}{% endfor %}",
        )])
        .unwrap();
        let data = json!({
            "alphabet": [{ "portion": "abc" }, { "portion": "def" }, { "portion": "ghi" }]
        });
        assert_eq!(renderer.render("testTemplate", &data).await.unwrap(), "abcdefghi");
    }

    #[tokio::test]
    async fn test_render_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("page.html"), "<h1>{{ title }}</h1>").unwrap();

        let renderer = TemplateRenderer::from_dir(dir.path());
        assert_eq!(
            renderer.render("page", &json!({ "title": "Hi & bye" })).await.unwrap(),
            "<h1>Hi &amp; bye</h1>"
        );
    }

    #[tokio::test]
    async fn test_missing_template() {
        let renderer = TemplateRenderer::from_dir("/nonexistent-views");
        let err = renderer.render("page", &json!({})).await.unwrap_err();
        assert!(matches!(err, RenderError::Template { ref template, .. } if template == "page.html"));
    }
}
