//! CMS server binary - serves JSON pages through the page pipeline

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cms_server::{CmsContext, CmsOptions, FsPageSource, ServerConfig, TemplateRenderer, server};

#[derive(Parser, Debug)]
#[command(name = "cms-server")]
#[command(about = "Serve CMS pages with resolved page data")]
struct Args {
    /// TOML file with route, global data and function options
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory of `<slug>.json` page files
    #[arg(long, default_value = "pages")]
    pages: PathBuf,

    /// Directory of view templates (defaults to `views` if it exists)
    #[arg(long)]
    views: Option<PathBuf>,

    /// Port to listen on
    #[arg(short = 'P', long, default_value = "3000")]
    port: u16,

    /// Host to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cms_server=info,cms_core=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let options = match &args.config {
        Some(path) => {
            info!(config = %path.display(), "Loading CMS options");
            CmsOptions::load(path)?
        }
        None => CmsOptions::default(),
    };

    if !args.pages.is_dir() {
        warn!(pages = %args.pages.display(), "Pages directory does not exist");
    }

    let mut builder =
        CmsContext::builder(options).page_source(Arc::new(FsPageSource::new(args.pages.clone())));

    let views = args
        .views
        .or_else(|| Some(PathBuf::from("views")).filter(|dir| dir.is_dir()));
    match views {
        Some(dir) => {
            info!(views = %dir.display(), "Rendering views from directory");
            builder = builder.renderer(Arc::new(TemplateRenderer::from_dir(dir)));
        }
        None => info!("No views directory; pages with a template cannot be rendered"),
    }

    let ctx = Arc::new(builder.build()?);

    // Stop accepting requests and cancel in-flight resolution on Ctrl-C
    let shutdown = ctx.shutdown_token().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down");
        }
        shutdown.cancel();
    });

    let config = ServerConfig {
        port: args.port,
        host: args.host,
    };

    server::run_server(ctx, config).await?;

    Ok(())
}
