use anyhow::Context;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    millerp_observability::init();

    let config = millerp_api::config::AppConfig::from_env()?;
    let store = config.load_store()?;

    let app = millerp_api::app::build_app(std::sync::Arc::new(store));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
