use std::{net::SocketAddr, path::PathBuf};

use anyhow::Context;
use axum::{http::StatusCode, routing::get, Router};
use tokio::signal;
use tracing::info;

use simple_healthcheck::{healthcheck_middleware, probe, Config, Healthcheck};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;

    // When invoked as a Docker HEALTHCHECK, probe our own listener and exit.
    if std::env::args().nth(1).as_deref() == Some("--healthcheck") {
        return healthcheck(&config).await;
    }

    let default_filter = config
        .server
        .log_level
        .clone()
        .unwrap_or_else(|| "simple_healthcheck=info,healthcheck_demo=info,tower_http=warn".into());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    let hc = Healthcheck::from_config(&config.healthcheck)?;
    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .context("invalid [server] bind address")?;

    info!(%addr, path = hc.path(), "healthcheck-demo starting");

    let trace_layer = tower_http::trace::TraceLayer::new_for_http()
        .make_span_with(tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO))
        .on_response(tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO));

    let app = Router::new()
        .route("/", get(|| async { "hello" }))
        .fallback(|| async { (StatusCode::NOT_FOUND, "not found") })
        .layer(axum::middleware::from_fn_with_state(hc, healthcheck_middleware))
        .layer(trace_layer);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shutdown complete");
    Ok(())
}

/// `SHC_CONFIG` names a TOML file; without it the built-in defaults apply.
fn load_config() -> anyhow::Result<Config> {
    match std::env::var("SHC_CONFIG").map(PathBuf::from) {
        Ok(path) => Config::load(&path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        Err(_) => Ok(Config::default()),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

/// Lightweight self-probe: exit 0 on a 2xx from the health path, 1 otherwise.
async fn healthcheck(config: &Config) -> anyhow::Result<()> {
    let hc = Healthcheck::from_config(&config.healthcheck)?;
    let url = probe::local_url(config.server.port, hc.path());

    match probe::probe(&url).await {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("{e:#}");
            std::process::exit(1);
        }
    }
}
