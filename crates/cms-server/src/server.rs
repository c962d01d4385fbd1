//! HTTP server setup and routing

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use cms_core::{CmsError, PageOutcome, RequestFlags};
use serde::Serialize;
use serde_json::Value;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::context::{ServerConfig, SharedContext};
use crate::error::Result;
use crate::render::RenderError;
use crate::source::{EarlyResponse, PageFetch, RequestInfo};

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    route_prefix: String,
    functions: Vec<String>,
}

/// Error response, shaped like the usual `{ statusCode, error, message }` body
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    status_code: u16,
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    details: Vec<String>,
}

fn error_response(status: StatusCode, message: impl Into<String>, details: Vec<String>) -> Response {
    let body = ErrorResponse {
        status_code: status.as_u16(),
        error: status.canonical_reason().unwrap_or("Error").to_string(),
        message: message.into(),
        details,
    };
    (status, Json(body)).into_response()
}

/// Map a pipeline error to a response.
fn cms_error_response(err: CmsError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    match err {
        CmsError::Validation(failure) => {
            error_response(status, failure.message, failure.details)
        }
        CmsError::Upstream(upstream) => match upstream.body {
            Some(body) => (status, Json(body)).into_response(),
            None => error_response(status, upstream.message, Vec::new()),
        },
        other => error_response(status, other.to_string(), Vec::new()),
    }
}

fn early_response(early: EarlyResponse) -> Response {
    let status = StatusCode::from_u16(early.status).unwrap_or(StatusCode::OK);
    let mut response = match early.body {
        Some(body) => (status, Json(body)).into_response(),
        None => status.into_response(),
    };

    let headers = response.headers_mut();
    for (name, value) in early.headers {
        match (
            HeaderName::try_from(name.as_str()),
            HeaderValue::try_from(value.as_str()),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!(header = %name, "Dropping invalid header from early response"),
        }
    }
    response
}

fn request_info(method: &Method, uri: &Uri, headers: &HeaderMap, slug: String, query: BTreeMap<String, String>) -> RequestInfo {
    RequestInfo {
        method: method.to_string(),
        path: uri.path().to_string(),
        slug,
        query,
        headers: headers
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect(),
    }
}

/// Health check endpoint
async fn health(State(ctx): State<SharedContext>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        route_prefix: ctx.options().normalized_prefix(),
        functions: ctx.pipeline().registry().names(),
    })
}

/// Page at the route prefix itself (empty slug)
async fn page_index(
    State(ctx): State<SharedContext>,
    Query(query): Query<BTreeMap<String, String>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let info = request_info(&method, &uri, &headers, String::new(), query);
    serve_page(ctx, info).await
}

/// Page for a (possibly multi-segment) slug
async fn page(
    State(ctx): State<SharedContext>,
    Path(slug): Path<String>,
    Query(query): Query<BTreeMap<String, String>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let info = request_info(&method, &uri, &headers, slug, query);
    serve_page(ctx, info).await
}

/// Fetch, resolve, validate, then render or return a page.
async fn serve_page(ctx: SharedContext, info: RequestInfo) -> Response {
    let slug = info.slug.clone();

    let page = match ctx.source().get_page(&slug, &info).await {
        Ok(PageFetch::Page(page)) => page,
        Ok(PageFetch::Respond(early)) => {
            debug!(%slug, status = early.status, "Page source answered the request");
            return early_response(early);
        }
        Err(upstream) => {
            debug!(%slug, status = upstream.status, error = %upstream, "Page source failed");
            return cms_error_response(CmsError::Upstream(upstream));
        }
    };

    let flags = RequestFlags {
        json: info.flag("json"),
        debug: info.flag("debug"),
        cancel: Some(ctx.shutdown_token().child_token()),
    };

    let outcome = match ctx.pipeline().process(page, info.to_value(), &flags).await {
        Ok(outcome) => outcome,
        Err(e) => {
            if e.is_client_error() {
                info!(%slug, error = %e, "Rejected page");
            } else {
                error!(%slug, error = %e, "Failed to build page");
            }
            return cms_error_response(e);
        }
    };

    match outcome {
        PageOutcome::Data(data) => Json(data).into_response(),
        PageOutcome::Render { template, data } => render_view(&ctx, &template, &data).await,
    }
}

async fn render_view(ctx: &SharedContext, template: &str, data: &Value) -> Response {
    let result = match ctx.renderer() {
        Some(renderer) => renderer.render(template, data).await,
        None => Err(RenderError::NoRenderer(template.to_string())),
    };

    match result {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!(template, error = %e, "Failed to render view");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string(), Vec::new())
        }
    }
}

/// 404 handler
async fn not_found() -> impl IntoResponse {
    error_response(StatusCode::NOT_FOUND, "Not found", Vec::new())
}

/// Build the page routes, with the configured route layers applied.
fn page_routes(ctx: &SharedContext) -> Router<SharedContext> {
    let prefix = ctx.options().normalized_prefix();
    let index_path = if prefix.is_empty() {
        "/".to_string()
    } else {
        prefix.clone()
    };

    let mut routes = Router::new()
        .route(&index_path, get(page_index))
        .route(&format!("{}/{{*slug}}", prefix), get(page));
    if !prefix.is_empty() {
        routes = routes.route(&format!("{}/", prefix), get(page_index));
    }

    let route_config = &ctx.options().route_config;
    if let Some(secs) = route_config.timeout_secs {
        routes = routes.layer(TimeoutLayer::new(Duration::from_secs(secs)));
    }
    if route_config.cors {
        routes = routes.layer(CorsLayer::permissive());
    }
    routes
}

/// Build the axum router
///
/// The health check is only mounted when `health_path` is configured; it
/// takes precedence over a page with the same slug.
pub fn build_router(ctx: SharedContext) -> Router {
    let mut router = Router::new();
    if let Some(path) = ctx.options().normalized_health_path() {
        if path == ctx.options().normalized_prefix() {
            warn!(%path, "Health check path is the page index; not mounting it");
        } else {
            router = router.route(&path, get(health));
        }
    }

    router
        .merge(page_routes(&ctx))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

/// Run the CMS server.
///
/// This function blocks until the server is shut down via the context's
/// shutdown token.
pub async fn run_server(ctx: SharedContext, config: ServerConfig) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let shutdown = ctx.shutdown_token().clone();

    let router = build_router(Arc::clone(&ctx));

    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, prefix = %ctx.options().normalized_prefix(), "CMS server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| crate::error::Error::Server(e.to_string()))?;

    Ok(())
}
