use anyhow::Context;
use db::DBService;
use server::{routes, state::AppState};
use services::services::config::Config;
use tracing::info;
use tracing_subscriber::{EnvFilter, prelude::*};
use utils::sentry::{init_once, sentry_layer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .with(sentry_layer())
        .init();
    let _sentry = init_once(std::env::var("SENTRY_DSN").ok().as_deref());

    let config = Config::load().context("loading configuration")?;
    info!(
        expose_type = %config.expose_type,
        database_url = %config.database_url,
        "Configuration loaded"
    );

    let db = DBService::new(&config.database_url)
        .await
        .context("opening database")?;
    let addr = format!("{}:{}", config.host, config.port);
    let app = routes::router(AppState::new(db, config));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("Server running on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
