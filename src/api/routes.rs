use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use crate::config::Config;
use crate::shop::ShopService;

use super::handlers;

/// Snapshot of the model backends, taken once at startup.
#[derive(Clone, Debug, Default)]
pub struct BackendInfo {
    pub active: String,
    pub name: String,
    pub available: Vec<String>,
}

/// State shared across all routes.
#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<ShopService>,
    pub backends: BackendInfo,
}

pub fn build(config: &Config, service: Arc<ShopService>, backends: BackendInfo) -> Router {
    let state = ApiState { service, backends };

    let router = Router::new()
        // Shops
        .route("/api/shops", get(handlers::list_shops))
        .route("/api/shops/generate", post(handlers::generate_shop))
        // LLM backends
        .route("/api/llm/backends", get(handlers::llm_backends))
        .route("/healthz", get(handlers::healthz))
        .with_state(state);

    match cors_layer(&config.cors_origins) {
        Some(cors) => router.layer(cors),
        None => router,
    }
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    if origins.is_empty() {
        return None;
    }

    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|o| o == "*") {
        return Some(layer.allow_origin(Any));
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    Some(layer.allow_origin(parsed))
}
