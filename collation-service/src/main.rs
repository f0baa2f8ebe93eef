mod error;
mod metrics;
mod routes;
mod state;

use axum::routing::{get, post};
use axum::Router;
use clap::Parser;
use collation_client::Collator;
use collation_core::{Config, EngineKind};
use state::{AppState, SharedState};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// HTTP service aligning textual witnesses through CollateX.
#[derive(Parser, Debug)]
#[command(name = "collation-service", version, about)]
struct Args {
    /// TOML configuration file
    #[arg(long, env = "COLLATION_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides [service].port)
    #[arg(long)]
    port: Option<u16>,

    /// Address to bind (overrides [service].bind)
    #[arg(long)]
    bind: Option<String>,

    /// CollateX server URL; selects the HTTP engine
    #[arg(long, env = "COLLATEX_URL")]
    engine_url: Option<String>,

    /// Engine timeout such as "30s" (overrides [engine].timeout)
    #[arg(long)]
    engine_timeout: Option<String>,
}

fn load_config(args: &Args) -> collation_core::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(port) = args.port {
        config.service.port = port;
    }
    if let Some(bind) = &args.bind {
        config.service.bind = bind.clone();
    }
    if let Some(url) = &args.engine_url {
        config.engine.kind = EngineKind::Http;
        config.engine.url = url.clone();
    }
    if let Some(timeout) = &args.engine_timeout {
        config.engine.timeout = timeout.clone();
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    // The HTTP engine holds a blocking client, which must be built off the
    // async executor.
    let engine_config = config.clone();
    let collator = tokio::task::spawn_blocking(move || Collator::from_config(&engine_config)).await??;
    tracing::info!(
        engine = collator.engine_name(),
        lang = %config.collation.lang,
        "Collator ready"
    );

    let state: SharedState = Arc::new(AppState::new(collator));

    let app = Router::new()
        .route("/collate", post(routes::collate))
        .route("/status", get(routes::status))
        .route("/metrics", get(metrics::metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("{}:{}", config.service.bind, config.service.port);
    tracing::info!("collation-service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
