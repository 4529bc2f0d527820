use anyhow::Context;
use cosmetics_backend::config::Config;
use cosmetics_backend::create_app;
use cosmetics_db::Database;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Missing or malformed configuration is fatal
    let config = Config::from_env().context("failed to load configuration")?;

    // RUST_LOG wins; otherwise dev mode logs at debug
    let default_level = if config.dev_mode { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .compact()
        .init();
    tracing::info!("Starting cosmetics backend server...");
    tracing::info!(
        "Configuration: port={}, db_path={}, dev_mode={}, body_limit={}KB, timeout={}s, entries_cache={}s",
        config.port,
        config.database_path,
        config.dev_mode,
        config.request_body_limit / 1024,
        config.request_timeout.as_secs(),
        config.entries_cache_ttl.as_secs()
    );
    if config.rate_limit_enabled() {
        tracing::info!(
            "Rate limit: one request per {}ms (burst {})",
            config.rate_limit_period_ms,
            config.rate_limit_burst
        );
    }

    let db = Database::open(&config.database_path)
        .await
        .with_context(|| format!("failed to open database at {}", config.database_path))?;
    let app = create_app(db, &config);

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
