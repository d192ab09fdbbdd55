use anyhow::Context;
use tracing_subscriber::EnvFilter;

use cms_admin_bridge::database::DatabaseManager;
use cms_admin_bridge::storage::StorageClient;
use cms_admin_bridge::{app, AppContext};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, GCS_*, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")))
        .init();

    // Initialize configuration (this loads the config singleton)
    let config = cms_admin_bridge::config::config();
    tracing::info!("Starting CMS admin bridge in {:?} mode", config.environment);

    let pool = DatabaseManager::connect_lazy(&config.database).context("failed to configure database pool")?;
    let storage = StorageClient::from_config();
    if config.storage.hmac.is_none() {
        tracing::warn!("No HMAC credentials configured; private images will have empty URLs");
    }

    let app = app(AppContext::new(pool, storage));

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("CMS admin bridge listening on http://{}", bind_addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
