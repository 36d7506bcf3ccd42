use anyhow::Context;
use mcsc_agent::{ServerController, Settings};
use mcsc_control::{routes, state::AppState};

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let settings = Settings::from_env();
    tracing::info!(dir = %settings.data_dir.display(), "loading server config");

    let controller = ServerController::from_settings(&settings);
    controller
        .load_configs()
        .await
        .context("load server config")?;
    let state = AppState::new(controller);

    let listener = tokio::net::TcpListener::bind((settings.host.as_str(), settings.port))
        .await
        .with_context(|| format!("bind {}:{}", settings.host, settings.port))?;
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "mcsc-control HTTP listening");

    axum::serve(listener, routes::router(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutting down");
    state.controller.stop().await?;
    state.controller.save_all().await?;
    Ok(())
}
