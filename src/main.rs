mod api;
mod config;
mod error;
mod llm;
mod shop;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{error, info};

use crate::api::routes::BackendInfo;
use crate::config::Config;
use crate::llm::LlmEngine;
use crate::shop::ShopService;

#[tokio::main]
async fn main() {
    // Load .env file (if present) before anything reads env vars
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return;
    }

    if args.iter().any(|a| a == "--default-config") {
        print!("{}", Config::default_config_contents());
        return;
    }

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load config
    let config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from);

    let config = match Config::load(config_path.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!("failed to load config: {e}");
            std::process::exit(1);
        }
    };

    info!(
        bind = %config.bind,
        backend = %config.llm.backend,
        max_items = config.validation.max_items,
        "shopsmith starting"
    );

    // Build the model engine
    let engine = match LlmEngine::new(&config) {
        Ok(e) => e,
        Err(e) => {
            error!("failed to initialize LLM backend: {e}");
            std::process::exit(1);
        }
    };

    let backends = BackendInfo {
        active: engine.active_backend().to_string(),
        name: engine.backend_info().to_string(),
        available: engine.available_backends(),
    };

    // Handle --check
    if args.iter().any(|a| a == "--check") {
        run_checks(&config, &backends);
        return;
    }

    let service = Arc::new(ShopService::new(Arc::new(engine), config.validation.clone()));
    info!(backend = service.backend_name(), "shop service ready");

    // Shutdown signal
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let api_handle = {
        let config = config.clone();
        let service = service.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) = api::serve(config, service, backends, shutdown_rx).await {
                error!("API error: {e}");
                std::process::exit(1);
            }
        })
    };

    info!("shopsmith is running, press Ctrl+C to stop");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for ctrl+c: {e}");
    }

    info!("shutdown signal received, stopping...");
    let _ = shutdown_tx.send(());

    let _ = api_handle.await;
    let generated = service.list_all().await.len();
    info!(generated, "shopsmith stopped, in-memory shops discarded");
}

fn run_checks(config: &Config, backends: &BackendInfo) {
    info!("running pre-flight checks...");

    info!("config: OK");
    info!("  bind: {}", config.bind);
    info!("  cors_origins: {:?}", config.cors_origins);
    info!("  llm backend: {} ({})", backends.active, backends.name);
    info!("  available backends: [{}]", backends.available.join(", "));
    info!("  timeout_secs: {}", config.llm.timeout_secs);

    let v = &config.validation;
    info!(
        "  validation: max_items={} level_tolerance={} max_damage_per_level={} max_armor_per_level={}",
        v.max_items, v.level_tolerance, v.max_damage_per_level, v.max_armor_per_level
    );

    if v.max_damage_per_level == 0 || v.max_armor_per_level == 0 {
        error!("validation: attribute ceilings of 0 reject every weapon or armor shop");
    }
}

fn print_usage() {
    println!(
        "shopsmith: generate game shops with a hosted LLM and keep the valid ones

USAGE:
    shopsmith [OPTIONS]

OPTIONS:
    --config <PATH>     Path to config file (default: ~/.config/shopsmith/config.toml)
    --default-config    Print default config to stdout and exit
    --check             Validate config and backend selection, then exit
    -h, --help          Print this help message

LLM BACKEND:
    LLM_BACKEND           \"gemini\" (default), \"openrouter\", or \"ollama\"
    GEMINI_API_KEY        Google AI Studio key (gemini backend; GOOGLE_API_KEY also accepted)
    GEMINI_MODEL          Model name, e.g. gemini-1.5-flash (gemini backend)
    GEMINI_BASE_URL       Override the Generative Language API base URL
    OPENROUTER_API_KEY    OpenRouter key (openrouter backend)
    OPENROUTER_MODEL      Model slug, e.g. google/gemini-flash-1.5 (openrouter backend)
    OLLAMA_HOST           Ollama base URL (default: http://localhost:11434)
    OLLAMA_MODEL          Ollama model tag (default: llama3.1:8b)

HTTP API:
    POST /api/shops/generate   {{\"type\":\"weapons\",\"numberOfItems\":3,\"level\":5}}
    GET  /api/shops            all accepted shops, oldest first
    GET  /api/llm/backends     active and available backends
    GET  /healthz              liveness probe

ENVIRONMENT:
    RUST_LOG              Optional. Tracing filter (default: info).
"
    );
}
