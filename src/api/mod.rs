pub mod handlers;
pub mod routes;

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

use crate::config::Config;
use crate::error::{Result, ShopsmithError};
use crate::shop::ShopService;

pub async fn serve(
    config: Config,
    service: Arc<ShopService>,
    backends: routes::BackendInfo,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let app = routes::build(&config, service, backends);

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .map_err(|e| ShopsmithError::Config(format!("failed to bind {}: {e}", config.bind)))?;

    info!(bind = %config.bind, "API listening (HTTP)");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
        .map_err(|e| ShopsmithError::Config(format!("API server error: {e}")))?;

    Ok(())
}
