use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use coffee_auth::{HttpJwksFetcher, JwksCache, TokenVerifier};
use coffee_catalog_server::adapter::handler::{self, AppState};
use coffee_catalog_server::adapter::repository::InMemoryDrinkRepository;
use coffee_catalog_server::infrastructure::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Config
    let config_path =
        std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/config.yaml".to_string());
    let cfg = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {config_path}"))?;

    info!(
        app_name = %cfg.app.name,
        version = %cfg.app.version,
        environment = %cfg.app.environment,
        "starting catalog server"
    );

    // Token verifier
    let jwks_url = cfg.auth.jwks_url();
    info!(
        jwks_url = %jwks_url,
        issuer = %cfg.auth.issuer,
        audience = %cfg.auth.audience,
        "initializing JWKS verifier"
    );
    let fetcher = HttpJwksFetcher::new(cfg.auth.jwks_fetch_timeout())?;
    let cache = Arc::new(
        JwksCache::new(&jwks_url, cfg.auth.jwks_cache_ttl(), Arc::new(fetcher))
            .serve_stale_on_error(cfg.auth.serve_stale_on_error),
    );
    let verifier = Arc::new(TokenVerifier::new(cfg.auth.verifier_config(), cache));

    // Repository
    let drink_repo = Arc::new(InMemoryDrinkRepository::default());

    let app = handler::router(AppState {
        drink_repo,
        verifier,
    });

    // REST server
    let addr: SocketAddr = format!("{}:{}", cfg.server.host, cfg.server.port)
        .parse()
        .context("invalid server address")?;
    info!("REST server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("catalog server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
