use anyhow::{Context, Result};
use pickup_api::{build_app, ApiConfig};
use pickup_observability::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("pickup_api");

    let config = ApiConfig::from_env();
    let bind = config.bind.clone();

    let app = build_app(config)?;

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    tracing::info!(bind = %bind, "pickup rules api started");

    axum::serve(listener, app).await?;
    Ok(())
}
