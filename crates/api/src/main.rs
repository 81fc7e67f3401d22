use anyhow::Context;

use reclaim_api::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    reclaim_observability::init();

    let config = Config::from_env();
    tracing::info!(?config, "starting reclaim-api");

    let app = reclaim_api::app::build_app(&config)
        .await
        .context("failed to wire services")?;

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
