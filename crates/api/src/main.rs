use std::sync::Arc;

use anyhow::Context;

use stockroom_infra::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("invalid configuration")?;
    stockroom_observability::init(config.log_format);

    let services = stockroom_api::app::services::build_services(&config)
        .await
        .context("failed to initialise storage")?;
    let app = stockroom_api::app::build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("server terminated")?;
    Ok(())
}
