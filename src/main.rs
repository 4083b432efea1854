//! YourNews - HTTP Server Entry Point
//!
//! Loads `.env`, reads configuration, and serves the search page.

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use yournews::{api, config::Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; variables may come from the environment.
    let dotenv = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "yournews=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match dotenv {
        Ok(path) => info!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!("Could not load .env: {}", e),
    }

    let config = Config::from_env()?;
    info!(
        "Loaded configuration: app={}, model={}, variant={:?}",
        config.app_name, config.crew.model, config.crew.variant
    );

    api::serve(config).await?;

    Ok(())
}
