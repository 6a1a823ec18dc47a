use std::sync::Arc;

use anyhow::Context;

use brigade_catalog::InMemoryCatalog;
use brigade_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;
    brigade_observability::init(config.log_format, &config.log_filter);

    let catalog = match &config.catalog_path {
        Some(path) => InMemoryCatalog::from_path(path)
            .with_context(|| format!("failed to load catalog seed from {}", path.display()))?,
        None => {
            tracing::warn!("no catalog_path configured; starting with an empty catalog");
            InMemoryCatalog::new()
        }
    };

    let app = brigade_api::app::build_app(&config, Arc::new(catalog));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}
