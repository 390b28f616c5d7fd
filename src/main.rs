use std::net::SocketAddr;
use survey_backend::{
    config::{get_config, init_config},
    routes, AppState,
};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    init_config()?;
    let config = get_config()?;

    let app_state = AppState::new(config)?;
    info!(
        "Loaded {} survey(s); decision lists: {}",
        app_state.survey_service.list().len(),
        app_state.classifier_service.list_ids().join(", ")
    );

    let app = routes::router(app_state, config.public_rps);

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
