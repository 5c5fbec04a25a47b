use anyhow::{Context, Result};
use tracing::info;

use crate::core::config::load_config;
use crate::core::transport::HttpTransport;
use crate::gateway::server::create_router;
use crate::gateway::Gateway;

pub async fn run(host: Option<String>, port: Option<u16>) -> Result<()> {
    let config = load_config()?;
    let transport = HttpTransport::new(config.timeout())?;

    let host = host.unwrap_or_else(|| config.gateway.host.clone());
    let port = port.unwrap_or(config.gateway.port);
    if config.gateway.allowed_endpoints.is_empty() {
        tracing::warn!("no allowed endpoints configured, every request will be rejected");
    }

    let gateway = Gateway::new(
        transport,
        config.gateway.clone(),
        config.expansion.clone(),
        config.fields.clone(),
    );
    let app = create_router(gateway);

    let addr = format!("{}:{}", host, port);
    info!("Starting query expansion gateway on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app).await?;
    Ok(())
}
